//! # Crosscall
//!
//! Host side of an embedded contract engine: a registry of in-flight calls
//! and the gas-metered callbacks a sandboxed engine uses to reach storage,
//! address conversion, queries and other contracts.
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use crosscall::prelude::*;
//! use crosscall::host::testing::{test_binding, MockApi, MockCache, ScriptEngine, ScriptOp};
//!
//! let host = Host::new(
//!     HostConfig::default(),
//!     Arc::new(MockApi::new()),
//!     MockCache::handle(),
//!     Arc::new(ScriptEngine::new()),
//! )
//! .unwrap();
//!
//! let checksum = host.store_code(b"\0asm").unwrap();
//! let msg = ScriptEngine::msg(&[ScriptOp::Set { key: "k".into(), value: "v".into() }]);
//! let request = CallRequest { checksum, env: b"{}", msg: &msg, gas_limit: 1_000_000 };
//! let (result, gas) = host.execute(test_binding(), request, b"{}");
//! assert!(result.is_ok());
//! assert!(gas.externally_used > 0);
//! ```
//!
//! ## Architecture
//!
//! - [`memory`] - byte views and owned buffers that cross the C boundary
//! - [`config`] - gas pricing, cache options, logging, TOML loading
//! - [`storage`] - ordered key/value stores
//! - [`host`] - call registry, adapters, backend, C vtable, mocks

pub use crosscall_config as config;
pub use crosscall_host as host;
pub use crosscall_memory as memory;
pub use crosscall_storage as storage;

mod entry;
mod logging;

pub use entry::{CallRequest, Host};
pub use logging::init_tracing;

/// Common imports for embedding the host.
pub mod prelude {
    pub use crate::config::{GasConfig, HostConfig, LogConfig};
    pub use crate::host::{
        Backend, BackendApi, BasicGasMeter, CacheHandle, CallBinding, CallHandle, Checksum, Coin,
        Engine, EntryPoint, ErrorCode, GasInfo, GasMeter, HostError, HostResult, Invocation,
        ModuleCache, Querier,
    };
    pub use crate::storage::{KvStore, MemoryStore, Order};
    pub use crate::{init_tracing, CallRequest, Host};
}

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
