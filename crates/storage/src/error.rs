use thiserror::Error;

/// Errors raised by storage backends.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("store: range start is after range end")]
    InvalidRange,

    #[error("store: unknown iteration order {0}")]
    InvalidOrder(i32),

    #[error("store: backend failure: {0}")]
    Backend(String),
}

impl StoreError {
    #[inline]
    pub fn backend(message: impl Into<String>) -> Self {
        StoreError::Backend(message.into())
    }
}

/// Result type for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;
