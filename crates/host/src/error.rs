//! Error types shared by every host adapter.

use std::fmt;

use crosscall_storage::StoreError;
use thiserror::Error;

/// Outcome code carried across the engine boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum ErrorCode {
    None = 0,
    NotFound = 1,
    OutOfGas = 2,
    Other = 3,
}

impl ErrorCode {
    pub fn is_ok(self) -> bool {
        self == ErrorCode::None
    }
}

impl From<i32> for ErrorCode {
    /// Values outside the known set are not trusted and read as `Other`.
    fn from(value: i32) -> Self {
        match value {
            0 => ErrorCode::None,
            1 => ErrorCode::NotFound,
            2 => ErrorCode::OutOfGas,
            _ => ErrorCode::Other,
        }
    }
}

impl From<ErrorCode> for i32 {
    fn from(code: ErrorCode) -> Self {
        code as i32
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCode::None => f.write_str("none"),
            ErrorCode::NotFound => f.write_str("not found"),
            ErrorCode::OutOfGas => f.write_str("out of gas"),
            ErrorCode::Other => f.write_str("other"),
        }
    }
}

/// Errors raised by the registry and the callback adapters.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum HostError {
    #[error("{what} not found")]
    NotFound { what: String },

    #[error("out of gas: limit {limit}, requested {requested}")]
    OutOfGas { limit: u64, requested: u64 },

    #[error("invalid range: start is after end")]
    InvalidRange,

    #[error(transparent)]
    Storage(StoreError),

    #[error("api: {0}")]
    Api(String),

    #[error("query: {0}")]
    Query(String),

    #[error("call depth {depth} exceeds maximum {max}")]
    CallDepthExceeded { depth: u32, max: u32 },

    #[error("checksum must be 32 bytes, got {0}")]
    InvalidChecksum(usize),

    #[error("engine: {0}")]
    Engine(String),

    #[error("{0}")]
    Other(String),
}

impl HostError {
    pub fn not_found(what: impl Into<String>) -> Self {
        HostError::NotFound { what: what.into() }
    }

    pub fn api(message: impl Into<String>) -> Self {
        HostError::Api(message.into())
    }

    pub fn query(message: impl Into<String>) -> Self {
        HostError::Query(message.into())
    }

    pub fn engine(message: impl Into<String>) -> Self {
        HostError::Engine(message.into())
    }

    pub fn other(message: impl Into<String>) -> Self {
        HostError::Other(message.into())
    }

    /// Store failures are folded so an inverted range always reads the same.
    pub fn from_store(err: StoreError) -> Self {
        match err {
            StoreError::InvalidRange => HostError::InvalidRange,
            other => HostError::Storage(other),
        }
    }

    /// The boundary code for this error. Only gas exhaustion maps to `OutOfGas`.
    pub fn code(&self) -> ErrorCode {
        match self {
            HostError::NotFound { .. } => ErrorCode::NotFound,
            HostError::OutOfGas { .. } => ErrorCode::OutOfGas,
            _ => ErrorCode::Other,
        }
    }
}

impl From<StoreError> for HostError {
    fn from(err: StoreError) -> Self {
        HostError::from_store(err)
    }
}

/// Result type for host operations.
pub type HostResult<T> = std::result::Result<T, HostError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_codes_decode_as_other() {
        assert_eq!(ErrorCode::from(0), ErrorCode::None);
        assert_eq!(ErrorCode::from(2), ErrorCode::OutOfGas);
        assert_eq!(ErrorCode::from(4), ErrorCode::Other);
        assert_eq!(ErrorCode::from(-1), ErrorCode::Other);
    }

    #[test]
    fn only_gas_exhaustion_maps_to_out_of_gas() {
        let errors = [
            HostError::not_found("call 7"),
            HostError::InvalidRange,
            HostError::Storage(StoreError::backend("disk")),
            HostError::api("bad address"),
            HostError::query("no route"),
            HostError::CallDepthExceeded { depth: 11, max: 10 },
            HostError::InvalidChecksum(20),
            HostError::engine("trap"),
            HostError::other("boom"),
        ];
        for err in &errors {
            assert_ne!(err.code(), ErrorCode::OutOfGas, "{err}");
        }
        let oog = HostError::OutOfGas {
            limit: 10,
            requested: 11,
        };
        assert_eq!(oog.code(), ErrorCode::OutOfGas);
        assert_eq!(HostError::not_found("x").code(), ErrorCode::NotFound);
    }

    #[test]
    fn inverted_store_range_folds_into_invalid_range() {
        assert_eq!(
            HostError::from_store(StoreError::InvalidRange),
            HostError::InvalidRange
        );
        assert_eq!(
            HostError::from_store(StoreError::InvalidOrder(9)).code(),
            ErrorCode::Other
        );
    }
}
