//! Crosscall Configuration Module
//!
//! This module provides configuration types for the host side of the
//! contract engine: storage gas pricing, module cache options, logging and
//! call-depth limits.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

/// Storage gas pricing defaults
pub const DEFAULT_READ_COST_FLAT: u64 = 1000;
pub const DEFAULT_READ_COST_PER_BYTE: u64 = 3;
pub const DEFAULT_WRITE_COST_FLAT: u64 = 2000;
pub const DEFAULT_WRITE_COST_PER_BYTE: u64 = 30;
pub const DEFAULT_DELETE_COST: u64 = 1000;
pub const DEFAULT_ITER_CREATE_COST: u64 = 1000;
pub const DEFAULT_ITER_NEXT_COST_FLAT: u64 = 30;
pub const DEFAULT_ADDRESS_COST_PER_BYTE: u64 = 10;

/// Maximum nesting of contract-to-contract calls
pub const DEFAULT_MAX_CALL_DEPTH: u32 = 10;

/// Module cache defaults
pub const DEFAULT_MEMORY_CACHE_SIZE_MIB: u32 = 200;
pub const DEFAULT_INSTANCE_MEMORY_LIMIT_MIB: u32 = 32;
pub const DEFAULT_CACHE_DIR: &str = "./wasm-cache";

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config: failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("config: parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("config: invalid value: {0}")]
    Invalid(String),
}

impl ConfigError {
    pub fn invalid(message: impl Into<String>) -> Self {
        ConfigError::Invalid(message.into())
    }
}

/// Gas prices applied by the storage and address adapters.
///
/// Every charge is multiplied by `gas_mul`; all arithmetic saturates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GasConfig {
    pub read_cost_flat: u64,
    pub read_cost_per_byte: u64,
    pub write_cost_flat: u64,
    pub write_cost_per_byte: u64,
    pub delete_cost: u64,
    pub iter_create_cost: u64,
    pub iter_next_cost_flat: u64,
    pub address_cost_per_byte: u64,
    pub gas_mul: u64,
}

impl Default for GasConfig {
    fn default() -> Self {
        Self {
            read_cost_flat: DEFAULT_READ_COST_FLAT,
            read_cost_per_byte: DEFAULT_READ_COST_PER_BYTE,
            write_cost_flat: DEFAULT_WRITE_COST_FLAT,
            write_cost_per_byte: DEFAULT_WRITE_COST_PER_BYTE,
            delete_cost: DEFAULT_DELETE_COST,
            iter_create_cost: DEFAULT_ITER_CREATE_COST,
            iter_next_cost_flat: DEFAULT_ITER_NEXT_COST_FLAT,
            address_cost_per_byte: DEFAULT_ADDRESS_COST_PER_BYTE,
            gas_mul: 1,
        }
    }
}

impl GasConfig {
    /// A configuration that charges nothing. Useful for queries and tests.
    pub fn free() -> Self {
        Self {
            read_cost_flat: 0,
            read_cost_per_byte: 0,
            write_cost_flat: 0,
            write_cost_per_byte: 0,
            delete_cost: 0,
            iter_create_cost: 0,
            iter_next_cost_flat: 0,
            address_cost_per_byte: 0,
            gas_mul: 1,
        }
    }

    fn scaled(&self, cost: u64) -> u64 {
        cost.saturating_mul(self.gas_mul)
    }

    fn per_byte(price: u64, len: usize) -> u64 {
        price.saturating_mul(len as u64)
    }

    /// Charged before a read: flat price plus the key bytes.
    pub fn read_cost(&self, key_len: usize) -> u64 {
        self.scaled(
            self.read_cost_flat
                .saturating_add(Self::per_byte(self.read_cost_per_byte, key_len)),
        )
    }

    /// Charged after a read or iterator step for the bytes handed back.
    pub fn read_output_cost(&self, output_len: usize) -> u64 {
        self.scaled(Self::per_byte(self.read_cost_per_byte, output_len))
    }

    pub fn write_cost(&self, key_len: usize, value_len: usize) -> u64 {
        self.scaled(self.write_cost_flat.saturating_add(Self::per_byte(
            self.write_cost_per_byte,
            key_len.saturating_add(value_len),
        )))
    }

    pub fn delete_cost(&self) -> u64 {
        self.scaled(self.delete_cost)
    }

    pub fn iter_create_cost(&self) -> u64 {
        self.scaled(self.iter_create_cost)
    }

    pub fn iter_next_cost(&self) -> u64 {
        self.scaled(self.iter_next_cost_flat)
    }

    pub fn address_cost(&self, input_len: usize) -> u64 {
        self.scaled(Self::per_byte(self.address_cost_per_byte, input_len))
    }
}

/// Options handed to the compiled-module cache when it is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheOptions {
    pub base_dir: PathBuf,
    pub capabilities: Vec<String>,
    pub memory_cache_size_mib: u32,
    pub instance_memory_limit_mib: u32,
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from(DEFAULT_CACHE_DIR),
            capabilities: capabilities_from_csv("iterator,staking"),
            memory_cache_size_mib: DEFAULT_MEMORY_CACHE_SIZE_MIB,
            instance_memory_limit_mib: DEFAULT_INSTANCE_MEMORY_LIMIT_MIB,
        }
    }
}

/// Splits a comma separated capability list, dropping empty entries.
pub fn capabilities_from_csv(csv: &str) -> Vec<String> {
    csv.split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect()
}

/// Log verbosity accepted by [`LogConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Error => write!(f, "error"),
            LogLevel::Warn => write!(f, "warn"),
            LogLevel::Info => write!(f, "info"),
            LogLevel::Debug => write!(f, "debug"),
            LogLevel::Trace => write!(f, "trace"),
        }
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "error" => Ok(LogLevel::Error),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "debug" => Ok(LogLevel::Debug),
            "trace" => Ok(LogLevel::Trace),
            _ => Err(format!("Unknown log level: {}", s)),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct LogConfig {
    pub level: LogLevel,
    pub json: bool,
}

/// Host configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    pub gas: GasConfig,
    pub cache: CacheOptions,
    pub log: LogConfig,
    pub max_call_depth: u32,
    pub print_debug: bool,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            gas: GasConfig::default(),
            cache: CacheOptions::default(),
            log: LogConfig::default(),
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
            print_debug: false,
        }
    }
}

impl HostConfig {
    /// Parses and validates a TOML document. Missing fields take defaults.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: HostConfig = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&source)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.gas.gas_mul == 0 {
            return Err(ConfigError::invalid("gas.gas_mul must be at least 1"));
        }
        if self.max_call_depth == 0 {
            return Err(ConfigError::invalid("max_call_depth must be at least 1"));
        }
        if self.cache.base_dir.as_os_str().is_empty() {
            return Err(ConfigError::invalid("cache.base_dir must not be empty"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_cost_scales_with_key() {
        let gas = GasConfig::default();
        assert_eq!(gas.read_cost(0), 1000);
        assert_eq!(gas.read_cost(10), 1030);
        assert_eq!(gas.read_output_cost(5), 15);
    }

    #[test]
    fn gas_mul_multiplies_every_charge() {
        let gas = GasConfig {
            gas_mul: 3,
            ..GasConfig::default()
        };
        assert_eq!(gas.delete_cost(), 3000);
        assert_eq!(gas.write_cost(1, 1), 3 * (2000 + 60));
        assert_eq!(gas.iter_next_cost(), 90);
    }

    #[test]
    fn charges_saturate() {
        let gas = GasConfig {
            write_cost_per_byte: u64::MAX,
            ..GasConfig::default()
        };
        assert_eq!(gas.write_cost(4, 4), u64::MAX);
    }

    #[test]
    fn free_config_charges_nothing() {
        let gas = GasConfig::free();
        assert_eq!(gas.read_cost(100), 0);
        assert_eq!(gas.write_cost(100, 100), 0);
        assert_eq!(gas.address_cost(42), 0);
    }

    #[test]
    fn capabilities_csv_drops_blanks() {
        assert_eq!(
            capabilities_from_csv(" staking, ,iterator,"),
            vec!["staking".to_string(), "iterator".to_string()]
        );
        assert!(capabilities_from_csv("").is_empty());
    }

    #[test]
    fn log_level_round_trips_through_display() {
        for level in [
            LogLevel::Error,
            LogLevel::Warn,
            LogLevel::Info,
            LogLevel::Debug,
            LogLevel::Trace,
        ] {
            assert_eq!(level.to_string().parse::<LogLevel>(), Ok(level));
        }
        assert!("verbose".parse::<LogLevel>().is_err());
    }
}
