//! Compiled-module cache interface.

use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{HostError, HostResult};

/// 32-byte identifier of a stored code blob.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Checksum([u8; 32]);

impl Checksum {
    pub const LENGTH: usize = 32;

    /// SHA-256 of `code`.
    pub fn generate(code: &[u8]) -> Self {
        Checksum(Sha256::digest(code).into())
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl From<[u8; 32]> for Checksum {
    fn from(bytes: [u8; 32]) -> Self {
        Checksum(bytes)
    }
}

impl TryFrom<&[u8]> for Checksum {
    type Error = HostError;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        let bytes: [u8; 32] = bytes
            .try_into()
            .map_err(|_| HostError::InvalidChecksum(bytes.len()))?;
        Ok(Checksum(bytes))
    }
}

impl AsRef<[u8]> for Checksum {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Checksum({})", self.to_hex())
    }
}

/// Static analysis of a stored module.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub has_ibc_entry_points: bool,
    pub required_features: Vec<String>,
}

/// Cache hit counters and sizes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metrics {
    pub hits_pinned_memory_cache: u32,
    pub hits_memory_cache: u32,
    pub hits_fs_cache: u32,
    pub misses: u32,
    pub elements_pinned_memory_cache: u64,
    pub elements_memory_cache: u64,
    pub size_pinned_memory_cache: u64,
    pub size_memory_cache: u64,
}

/// Storage for compiled modules, keyed by [`Checksum`].
pub trait ModuleCache: Send + Sync {
    fn save_wasm(&self, wasm: &[u8]) -> HostResult<Checksum>;

    fn load_wasm(&self, checksum: &Checksum) -> HostResult<Vec<u8>>;

    fn pin(&self, checksum: &Checksum) -> HostResult<()>;

    fn unpin(&self, checksum: &Checksum) -> HostResult<()>;

    fn analyze_code(&self, checksum: &Checksum) -> HostResult<AnalysisReport>;

    fn metrics(&self) -> Metrics;
}

/// Shared reference to the module cache.
///
/// Created once by the host and cloned into every backend; never freed by
/// a call.
#[derive(Clone)]
pub struct CacheHandle(Arc<dyn ModuleCache>);

impl CacheHandle {
    pub fn new(cache: Arc<dyn ModuleCache>) -> Self {
        CacheHandle(cache)
    }

    pub fn ptr_eq(&self, other: &CacheHandle) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl<C: ModuleCache + 'static> From<Arc<C>> for CacheHandle {
    fn from(cache: Arc<C>) -> Self {
        CacheHandle(cache)
    }
}

impl Deref for CacheHandle {
    type Target = dyn ModuleCache;

    fn deref(&self) -> &Self::Target {
        self.0.as_ref()
    }
}

impl fmt::Debug for CacheHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CacheHandle").field(&self.0.metrics()).finish()
    }
}
