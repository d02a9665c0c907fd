use crate::cache::error::CacheError;
use crate::cache::meta::{Metadata, system_time_secs};
use crate::config::CacheConfig;
use parking_lot::Mutex;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

const ENTRY_PREFIX: &str = "embedding_";
const ENTRY_EXT: &str = "bin";
const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// File name holding the value for `key`.
pub fn key_file_name(key: &str) -> String {
    format!("{}{:x}.{}", ENTRY_PREFIX, md5::compute(key.as_bytes()), ENTRY_EXT)
}

fn is_entry_name(name: &str) -> bool {
    name.starts_with(ENTRY_PREFIX) && name.ends_with(".bin")
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheInfo {
    pub files: usize,
    pub size_bytes: u64,
    pub size_mb: f64,
    pub size_gb: f64,
    pub cache_dir: PathBuf,
}

#[derive(Debug)]
struct EntryFile {
    path: PathBuf,
    name: String,
    size: u64,
    accessed: f64,
}

/// Thread-safe, size-bounded key/value cache backed by one file per key.
#[derive(Debug)]
pub struct PersistentCache {
    config: CacheConfig,
    metadata: Mutex<Metadata>,
}

impl PersistentCache {
    /// Create the cache directory if needed and load access metadata.
    pub fn open(config: CacheConfig) -> Result<Self, CacheError> {
        fs::create_dir_all(&config.cache_dir).map_err(|e| CacheError::io(&config.cache_dir, e))?;
        let metadata = Metadata::load(&config.cache_dir);
        tracing::debug!(dir = %config.cache_dir.display(), tracked = metadata.len(), "opened cache");
        Ok(Self {
            config,
            metadata: Mutex::new(metadata),
        })
    }

    /// Open a cache directory that must already exist. Used by read-only
    /// commands so a mistyped path is reported instead of created.
    pub fn open_existing(config: CacheConfig) -> Result<Self, CacheError> {
        if !config.cache_dir.is_dir() {
            return Err(CacheError::Missing(config.cache_dir));
        }
        let metadata = Metadata::load(&config.cache_dir);
        Ok(Self {
            config,
            metadata: Mutex::new(metadata),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.config.cache_dir
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.config.cache_dir.join(key_file_name(key))
    }

    /// Fetch the value stored under `key`.
    ///
    /// An entry that no longer decodes is deleted and reported as absent.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, CacheError> {
        let mut meta = self.metadata.lock();
        let path = self.entry_path(key);
        let name = key_file_name(key);

        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!(key, "cache miss");
                return Ok(None);
            }
            Err(e) => return Err(CacheError::io(&path, e)),
        };

        match bincode::serde::decode_from_slice::<T, _>(&bytes, bincode::config::standard()) {
            Ok((value, _)) => {
                meta.touch(&name);
                if let Err(e) = meta.save() {
                    tracing::warn!(error = %e, "failed to record cache access");
                }
                tracing::debug!(key, "cache hit");
                Ok(Some(value))
            }
            Err(e) => {
                tracing::warn!(key, path = %path.display(), error = %e, "dropping corrupt cache entry");
                if let Err(e) = fs::remove_file(&path) {
                    tracing::warn!(path = %path.display(), error = %e, "failed to remove corrupt entry");
                }
                meta.remove(&name);
                if let Err(e) = meta.save() {
                    tracing::warn!(error = %e, "failed to save cache metadata");
                }
                Ok(None)
            }
        }
    }

    /// Store `value` under `key`, replacing any previous entry, then evict if
    /// the cache has grown past its limit.
    pub fn put<T: Serialize>(&self, key: &str, value: &T) -> Result<(), CacheError> {
        let mut meta = self.metadata.lock();
        let path = self.entry_path(key);
        let tmp = path.with_extension("tmp");

        let result = write_entry(key, value, &path, &tmp);
        if result.is_err() && tmp.exists() {
            if let Err(e) = fs::remove_file(&tmp) {
                tracing::warn!(path = %tmp.display(), error = %e, "failed to remove temp entry");
            }
        }
        result?;

        meta.touch(&key_file_name(key));
        meta.save()?;
        tracing::debug!(key, "cache store");

        self.evict_locked(&mut meta)?;
        Ok(())
    }

    /// Whether an entry exists for `key` (without decoding it).
    pub fn find(&self, key: &str) -> bool {
        let _guard = self.metadata.lock();
        self.entry_path(key).is_file()
    }

    /// Delete every entry. Returns the number of entries removed.
    pub fn clear(&self) -> Result<usize, CacheError> {
        let mut meta = self.metadata.lock();
        let mut removed = 0;
        for entry in self.scan(&meta)? {
            fs::remove_file(&entry.path).map_err(|e| CacheError::io(&entry.path, e))?;
            removed += 1;
        }
        meta.clear();
        meta.save()?;
        tracing::info!(removed, dir = %self.dir().display(), "cleared cache");
        Ok(removed)
    }

    /// Entry count and total size.
    pub fn info(&self) -> Result<CacheInfo, CacheError> {
        let meta = self.metadata.lock();
        let entries = self.scan(&meta)?;
        let size_bytes: u64 = entries.iter().map(|e| e.size).sum();
        Ok(CacheInfo {
            files: entries.len(),
            size_bytes,
            size_mb: size_bytes as f64 / BYTES_PER_MB,
            size_gb: size_bytes as f64 / (BYTES_PER_MB * 1024.0),
            cache_dir: self.config.cache_dir.clone(),
        })
    }

    /// Remove the whole cache directory. Returns false if it did not exist.
    pub fn purge(dir: &Path) -> Result<bool, CacheError> {
        match fs::remove_dir_all(dir) {
            Ok(()) => {
                tracing::info!(dir = %dir.display(), "removed cache directory");
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(CacheError::io(dir, e)),
        }
    }

    /// Evict least-recently-accessed entries until the cache fits. Returns the
    /// number of entries removed.
    pub fn evict(&self) -> Result<usize, CacheError> {
        let mut meta = self.metadata.lock();
        self.evict_locked(&mut meta)
    }

    fn evict_locked(&self, meta: &mut Metadata) -> Result<usize, CacheError> {
        let mut entries = self.scan(meta)?;
        let total: u64 = entries.iter().map(|e| e.size).sum();
        if total <= self.config.max_size_bytes {
            return Ok(0);
        }

        let target = self.config.evict_target_bytes();
        entries.sort_by(|a, b| a.accessed.total_cmp(&b.accessed));

        let mut remaining = total;
        let mut removed = 0;
        for entry in entries {
            if remaining <= target {
                break;
            }
            match fs::remove_file(&entry.path) {
                Ok(()) => {
                    remaining -= entry.size;
                    removed += 1;
                    meta.remove(&entry.name);
                    tracing::debug!(file = %entry.name, size = entry.size, "evicted cache entry");
                }
                Err(e) => {
                    tracing::warn!(path = %entry.path.display(), error = %e, "failed to evict cache entry");
                }
            }
        }
        meta.save()?;
        tracing::info!(removed, before = total, after = remaining, "cache eviction");
        Ok(removed)
    }

    fn scan(&self, meta: &Metadata) -> Result<Vec<EntryFile>, CacheError> {
        let dir = &self.config.cache_dir;
        let read = fs::read_dir(dir).map_err(|e| CacheError::io(dir, e))?;

        let mut out = Vec::new();
        for entry in read {
            let entry = entry.map_err(|e| CacheError::io(dir, e))?;
            let name = match entry.file_name().into_string() {
                Ok(name) if is_entry_name(&name) => name,
                _ => continue,
            };
            let stat = entry.metadata().map_err(|e| CacheError::io(entry.path(), e))?;
            if !stat.is_file() {
                continue;
            }
            let accessed = match meta.get(&name) {
                Some(t) => t,
                None => stat.modified().map(system_time_secs).unwrap_or(0.0),
            };
            out.push(EntryFile {
                path: entry.path(),
                name,
                size: stat.len(),
                accessed,
            });
        }
        Ok(out)
    }

    #[cfg(test)]
    fn set_access_time(&self, key: &str, at: f64) {
        self.metadata.lock().set(&key_file_name(key), at);
    }
}

fn write_entry<T: Serialize>(key: &str, value: &T, path: &Path, tmp: &Path) -> Result<(), CacheError> {
    let bytes = bincode::serde::encode_to_vec(value, bincode::config::standard()).map_err(|source| {
        CacheError::Encode {
            key: key.to_string(),
            source,
        }
    })?;
    fs::write(tmp, &bytes).map_err(|e| CacheError::io(tmp, e))?;
    fs::rename(tmp, path).map_err(|e| CacheError::io(path, e))
}
