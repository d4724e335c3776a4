//! # Crosscall Storage
//!
//! Ordered byte-key/byte-value stores that back contract storage.
//!
//! - [`KvStore`]: the abstraction every backend implements
//! - [`MemoryStore`]: `BTreeMap` backend for tests and ephemeral state
//! - [`PrefixStore`]: scopes a shared store to one contract's key space
//!
//! ```rust
//! use crosscall_storage::{KvStore, MemoryStore, Order};
//!
//! let store = MemoryStore::new();
//! store.set(b"b", b"2").unwrap();
//! store.set(b"a", b"1").unwrap();
//!
//! let records = store.range(None, None, Order::Ascending).unwrap();
//! assert_eq!(records[0].0, b"a".to_vec());
//! ```

pub mod error;
pub mod memory;
pub mod prefix;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use memory::MemoryStore;
pub use prefix::PrefixStore;
pub use traits::{KvStore, Order, Record};
