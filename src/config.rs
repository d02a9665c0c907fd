//! Cache configuration resolved from CLI arguments and environment.

use crate::Result;
use anyhow::bail;
use std::path::PathBuf;

/// Directory name used under the system temp dir when none is given.
pub const DEFAULT_CACHE_DIR_NAME: &str = "xanylabeling_cache";
pub const DEFAULT_MAX_SIZE_GB: f64 = 50.0;

/// Eviction stops once the cache is at or below this share of the limit.
pub const DEFAULT_EVICT_TARGET_RATIO: f64 = 0.8;

const BYTES_PER_GB: f64 = 1024.0 * 1024.0 * 1024.0;

#[derive(Debug, Clone, PartialEq)]
pub struct CacheConfig {
    pub cache_dir: PathBuf,
    pub max_size_bytes: u64,
    pub evict_target_ratio: f64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            cache_dir: default_cache_dir(),
            max_size_bytes: (DEFAULT_MAX_SIZE_GB * BYTES_PER_GB) as u64,
            evict_target_ratio: DEFAULT_EVICT_TARGET_RATIO,
        }
    }
}

impl CacheConfig {
    /// Build from optional overrides; `None` keeps the default.
    pub fn resolve(cache_dir: Option<PathBuf>, max_size_gb: Option<f64>) -> Result<Self> {
        let mut cfg = Self::default();
        if let Some(dir) = cache_dir {
            cfg.cache_dir = dir;
        }
        if let Some(gb) = max_size_gb {
            if !gb.is_finite() || gb <= 0.0 {
                bail!("cache size must be a positive number of GB, got {}", gb);
            }
            cfg.max_size_bytes = (gb * BYTES_PER_GB) as u64;
        }
        Ok(cfg)
    }

    pub fn with_max_size_bytes(mut self, bytes: u64) -> Self {
        self.max_size_bytes = bytes;
        self
    }

    /// Size the cache is trimmed down to once it exceeds the limit.
    pub fn evict_target_bytes(&self) -> u64 {
        (self.max_size_bytes as f64 * self.evict_target_ratio) as u64
    }
}

pub fn default_cache_dir() -> PathBuf {
    std::env::temp_dir().join(DEFAULT_CACHE_DIR_NAME)
}
