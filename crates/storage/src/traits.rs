use std::fmt;

use crate::error::{StoreError, StoreResult};

/// A key/value pair returned by a range scan.
pub type Record = (Vec<u8>, Vec<u8>);

/// Iteration direction of a range scan.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum Order {
    Ascending = 1,
    Descending = 2,
}

impl TryFrom<i32> for Order {
    type Error = StoreError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Order::Ascending),
            2 => Ok(Order::Descending),
            other => Err(StoreError::InvalidOrder(other)),
        }
    }
}

impl From<Order> for i32 {
    fn from(order: Order) -> Self {
        order as i32
    }
}

impl fmt::Display for Order {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Order::Ascending => f.write_str("ascending"),
            Order::Descending => f.write_str("descending"),
        }
    }
}

/// Checks that a `[start, end)` range is well formed.
///
/// Absent bounds are unbounded. `start == end` is valid and empty.
pub fn check_range(start: Option<&[u8]>, end: Option<&[u8]>) -> StoreResult<()> {
    match (start, end) {
        (Some(start), Some(end)) if start > end => Err(StoreError::InvalidRange),
        _ => Ok(()),
    }
}

/// Abstraction exposed by storage backends.
///
/// Implementations use interior mutability so a single store can be shared
/// by every invocation that is bound to it.
pub trait KvStore: Send + Sync {
    fn get(&self, key: &[u8]) -> StoreResult<Option<Vec<u8>>>;

    fn set(&self, key: &[u8], value: &[u8]) -> StoreResult<()>;

    fn delete(&self, key: &[u8]) -> StoreResult<()>;

    /// Returns every record with `start <= key < end` in the given order.
    ///
    /// The result is a snapshot; later writes do not affect it.
    fn range(
        &self,
        start: Option<&[u8]>,
        end: Option<&[u8]>,
        order: Order,
    ) -> StoreResult<Vec<Record>>;

    /// Returns the first record of `[start, end)` in the given order, or
    /// `None` when the range holds nothing.
    ///
    /// Cursors step through a range with repeated seeks, so implementations
    /// should not materialize more than the one record.
    fn seek(
        &self,
        start: Option<&[u8]>,
        end: Option<&[u8]>,
        order: Order,
    ) -> StoreResult<Option<Record>>;
}

impl<T: KvStore + ?Sized> KvStore for std::sync::Arc<T> {
    fn get(&self, key: &[u8]) -> StoreResult<Option<Vec<u8>>> {
        (**self).get(key)
    }

    fn set(&self, key: &[u8], value: &[u8]) -> StoreResult<()> {
        (**self).set(key, value)
    }

    fn delete(&self, key: &[u8]) -> StoreResult<()> {
        (**self).delete(key)
    }

    fn range(
        &self,
        start: Option<&[u8]>,
        end: Option<&[u8]>,
        order: Order,
    ) -> StoreResult<Vec<Record>> {
        (**self).range(start, end, order)
    }

    fn seek(
        &self,
        start: Option<&[u8]>,
        end: Option<&[u8]>,
        order: Order,
    ) -> StoreResult<Option<Record>> {
        (**self).seek(start, end, order)
    }
}
