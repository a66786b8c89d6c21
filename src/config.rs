//! # Configuration
//!
//! Construction parameters for the storage stack. Structs here can be built
//! programmatically with their `Default` impls, or loaded from an optional
//! TOML file with [`EngineConfig::load_from`], which reads a file, parses it,
//! and validates the result before handing back a usable config.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default L1 item capacity.
pub const DEFAULT_CACHE_CAPACITY_ITEMS: usize = 10_000;
/// Default bound on the CAS background write queue.
pub const DEFAULT_WRITE_QUEUE_DEPTH: usize = 4_096;
/// Default bound on the CAS async-writer error channel.
pub const DEFAULT_ERROR_QUEUE_DEPTH: usize = 256;
/// Default L1 compression threshold in bytes; entries smaller than this are
/// stored uncompressed regardless of `l1_compress`.
pub const DEFAULT_COMPRESS_THRESHOLD_BYTES: usize = 8 * 1024;

/// Configuration for the content-addressable store.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CasConfig {
    /// L1 item capacity.
    pub cache_capacity_items: usize,
    /// Bound on the async background write queue.
    pub write_queue_depth: usize,
    /// Bound on the async-writer error channel.
    pub error_queue_depth: usize,
    /// `log` target used for async-writer diagnostics.
    pub logger: String,
    /// When true, the CAS never touches L2: `store`/`load`/`exists` operate
    /// purely against L1 (and fail `load`/`exists` misses as `NotFound`).
    pub memory_only_mode: bool,
}

impl Default for CasConfig {
    fn default() -> Self {
        Self {
            cache_capacity_items: DEFAULT_CACHE_CAPACITY_ITEMS,
            write_queue_depth: DEFAULT_WRITE_QUEUE_DEPTH,
            error_queue_depth: DEFAULT_ERROR_QUEUE_DEPTH,
            logger: "helios::cas".to_string(),
            memory_only_mode: false,
        }
    }
}

/// Configuration for the L1 hot cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct L1Config {
    pub capacity_items: usize,
    /// Whether entries above `compress_threshold_bytes` are zstd-compressed
    /// at rest in the cache.
    pub compress: bool,
    pub compress_threshold_bytes: usize,
}

impl Default for L1Config {
    fn default() -> Self {
        Self {
            capacity_items: DEFAULT_CACHE_CAPACITY_ITEMS,
            compress: false,
            compress_threshold_bytes: DEFAULT_COMPRESS_THRESHOLD_BYTES,
        }
    }
}

/// Top-level engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub cas: CasConfig,
    pub l1: L1Config,
    /// Root directory for the L2 object store. Overridden at runtime by the
    /// `HELIOS_STORE_DIR` environment variable if set.
    pub store_dir: PathBuf,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cas: CasConfig::default(),
            l1: L1Config::default(),
            store_dir: default_store_dir(),
        }
    }
}

/// Default on-disk store location: `<cwd>/.helios/objects`.
pub fn default_store_dir() -> PathBuf {
    PathBuf::from(".helios").join("objects")
}

/// Resolves the effective store directory: `HELIOS_STORE_DIR` if set,
/// otherwise the config's `store_dir`.
pub fn resolve_store_dir(config: &EngineConfig) -> PathBuf {
    std::env::var_os("HELIOS_STORE_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|| config.store_dir.clone())
}

impl EngineConfig {
    /// Loads configuration from a TOML file, validating it afterwards.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: EngineConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.cas.cache_capacity_items == 0 {
            return Err(ConfigError::Validation(
                "cas.cache_capacity_items must be greater than 0".to_string(),
            ));
        }
        if self.cas.write_queue_depth == 0 {
            return Err(ConfigError::Validation(
                "cas.write_queue_depth must be greater than 0".to_string(),
            ));
        }
        if self.l1.capacity_items == 0 {
            return Err(ConfigError::Validation(
                "l1.capacity_items must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.cas.cache_capacity_items, 10_000);
        assert!(!cfg.cas.memory_only_mode);
    }

    #[test]
    fn store_dir_env_override() {
        let cfg = EngineConfig::default();
        std::env::set_var("HELIOS_STORE_DIR", "/tmp/helios-test-override");
        let dir = resolve_store_dir(&cfg);
        std::env::remove_var("HELIOS_STORE_DIR");
        assert_eq!(dir, PathBuf::from("/tmp/helios-test-override"));
    }

    #[test]
    fn load_from_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("helios.toml");
        std::fs::write(&path, "[cas]\ncache_capacity_items = 42\n").unwrap();
        let cfg = EngineConfig::load_from(&path).unwrap();
        assert_eq!(cfg.cas.cache_capacity_items, 42);
    }

    #[test]
    fn rejects_zero_capacity() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("helios.toml");
        std::fs::write(&path, "[cas]\ncache_capacity_items = 0\n").unwrap();
        assert!(EngineConfig::load_from(&path).is_err());
    }
}
