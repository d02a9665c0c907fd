//! Access-time bookkeeping persisted next to the cache entries.

use crate::cache::error::CacheError;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

pub const METADATA_FILE_NAME: &str = "metadata.json";

#[derive(Debug, Default)]
pub struct Metadata {
    path: PathBuf,
    access: BTreeMap<String, f64>,
}

impl Metadata {
    /// Load from `dir`. A missing or unreadable file yields an empty table.
    pub fn load(dir: &Path) -> Self {
        let path = dir.join(METADATA_FILE_NAME);
        let access = match fs::read_to_string(&path) {
            Ok(text) => serde_json::from_str(&text).unwrap_or_else(|e| {
                tracing::warn!(path = %path.display(), error = %e, "ignoring unreadable cache metadata");
                BTreeMap::new()
            }),
            Err(_) => BTreeMap::new(),
        };
        Self { path, access }
    }

    pub fn save(&self) -> Result<(), CacheError> {
        let json = serde_json::to_string(&self.access).map_err(|source| CacheError::Metadata {
            path: self.path.clone(),
            source,
        })?;
        fs::write(&self.path, json).map_err(|e| CacheError::io(&self.path, e))
    }

    pub fn touch(&mut self, file_name: &str) {
        self.access.insert(file_name.to_string(), now_secs());
    }

    pub fn set(&mut self, file_name: &str, at: f64) {
        self.access.insert(file_name.to_string(), at);
    }

    pub fn get(&self, file_name: &str) -> Option<f64> {
        self.access.get(file_name).copied()
    }

    pub fn remove(&mut self, file_name: &str) {
        self.access.remove(file_name);
    }

    pub fn clear(&mut self) {
        self.access.clear();
    }

    pub fn len(&self) -> usize {
        self.access.len()
    }
}

pub fn now_secs() -> f64 {
    system_time_secs(SystemTime::now())
}

pub fn system_time_secs(t: SystemTime) -> f64 {
    t.duration_since(UNIX_EPOCH).unwrap_or_default().as_secs_f64()
}
