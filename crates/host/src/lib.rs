//! # Crosscall Host
//!
//! The host half of an embedded contract engine. The engine never sees a
//! host object directly: every capability it may use during an invocation
//! is reached through a `u64` [`CallHandle`] that indexes the
//! [`CallRegistry`].
//!
//! ## Components
//!
//! - [`CallRegistry`]: handle arena mapping handles to [`InvocationContext`]s
//! - [`Dispatcher`]: gas-metered storage, iterator, address, query and
//!   contract-resolution adapters keyed by handle
//! - [`Backend`]: the handle-bound view handed to an [`Engine`], including
//!   nested contract calls
//! - [`CacheHandle`]: shared reference to the compiled-module cache
//! - [`ffi`]: the `#[repr(C)]` callback table for a native engine
//! - [`testing`]: in-memory mocks for every collaborator

pub mod api;
pub mod backend;
pub mod binary;
pub mod cache;
pub mod capability;
pub mod context;
pub mod dispatcher;
pub mod engine;
pub mod error;
pub mod ffi;
pub mod gas;
pub mod handle;
pub mod iterator;
pub mod querier;
pub mod registry;
pub mod storage;
pub mod testing;

pub use api::{
    BackendApi, Coin, ContractCreateRequest, FnApi, FnApiBuilder, MissingCapability,
    ResolvedContract,
};
pub use backend::{Backend, CallKind, ContractCall, MessageInfo};
pub use cache::{AnalysisReport, CacheHandle, Checksum, Metrics, ModuleCache};
pub use context::{CallBinding, InvocationContext};
pub use dispatcher::{BackendResult, CallGuard, Dispatcher, ResolvedCall};
pub use engine::{Engine, EntryPoint, Invocation};
pub use error::{ErrorCode, HostError, HostResult};
pub use ffi::{HostVtable, IteratorReference, OwnedVtable};
pub use gas::{BasicGasMeter, GasInfo, GasMeter, InfiniteGasMeter};
pub use handle::{CallHandle, IteratorId};
pub use querier::{ContractResult, Querier, QuerierResult, SystemError, SystemResult};
pub use registry::CallRegistry;
