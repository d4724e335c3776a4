//! # Boundary memory
//!
//! Fixed-layout descriptors for byte buffers that cross between the host and
//! the native contract engine.
//!
//! - [`ByteSliceView`]: non-owning, read-only. The side that creates it keeps
//!   the bytes alive until the call that receives the view returns.
//! - [`UnmanagedVector`]: owning. Whoever receives one must hand it back to
//!   [`destroy_unmanaged_vector`] (or [`UnmanagedVector::consume`]) exactly once.
//!
//! Both carry an explicit "absent" flag so that `None`, `Some(&[])` and
//! `Some(data)` stay distinguishable on either side.
//!
//! ```rust
//! use crosscall_memory::{ByteSliceView, UnmanagedVector};
//!
//! let data = b"key".to_vec();
//! let view = ByteSliceView::new(Some(&data));
//! assert_eq!(unsafe { view.read() }, Some(&b"key"[..]));
//!
//! let owned = UnmanagedVector::new(Some(b"value".to_vec()));
//! assert_eq!(owned.consume(), Some(b"value".to_vec()));
//! ```

#![allow(clippy::missing_safety_doc)]

mod vector;
mod view;

pub use vector::{destroy_unmanaged_vector, new_unmanaged_vector, UnmanagedVector};
pub use view::{BorrowedView, ByteSliceView};
