//! Batch embedding of an image folder into the persistent cache.
//!
//! Images already present in the cache are skipped, so an interrupted run can
//! simply be restarted. Failures on individual images are logged and counted
//! without stopping the batch.

use crate::Result;
use crate::cache::PersistentCache;
use anyhow::{Context, bail};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use walkdir::WalkDir;

/// Model families whose image encoder output can be cached.
pub const SUPPORTED_MODEL_TYPES: &[&str] = &[
    "segment_anything",
    "segment_anything_2",
    "sam_med2d",
    "sam_hq",
    "efficientvit_sam",
    "edge_sam",
];

const IMAGE_EXT_RE: &str = r"(?i)\.(bmp|gif|jpe?g|png|pbm|pgm|ppm|xbm|xpm|tiff?|webp)$";

/// Encoder output for one image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Embedding {
    pub shape: Vec<usize>,
    pub data: Vec<f32>,
}

/// Produces embeddings for image files.
pub trait Encoder {
    fn model_type(&self) -> &str;

    /// `Ok(None)` means this encoder cannot handle the input; it is counted as
    /// unsupported rather than failed.
    fn encode(&mut self, image: &Path) -> Result<Option<Embedding>>;
}

pub fn is_supported_model(model_type: &str) -> bool {
    SUPPORTED_MODEL_TYPES.contains(&model_type)
}

/// Cache key for an image: its canonical path, so relative and absolute
/// spellings of the same file share one entry. Paths that cannot be resolved
/// are used as given.
pub fn cache_key(image: &Path) -> String {
    match fs::canonicalize(image) {
        Ok(path) => path.to_string_lossy().into_owned(),
        Err(_) => image.to_string_lossy().into_owned(),
    }
}

/// All image files under `dir` (recursive) as canonical paths, sorted.
pub fn collect_images(dir: &Path) -> Result<Vec<PathBuf>> {
    let re = Regex::new(IMAGE_EXT_RE)?;
    let mut out = Vec::new();
    for entry in WalkDir::new(dir).follow_links(true) {
        let entry = entry.with_context(|| format!("scan image folder {}", dir.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let matches = entry
            .file_name()
            .to_str()
            .map(|name| re.is_match(name))
            .unwrap_or(false);
        if matches {
            let path = fs::canonicalize(entry.path())
                .with_context(|| format!("resolve image path {}", entry.path().display()))?;
            out.push(path);
        }
    }
    out.sort();
    Ok(out)
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStatus {
    pub total: usize,
    pub cached: usize,
    pub missing: Vec<PathBuf>,
}

/// Which of `images` already have a cache entry.
pub fn cache_status(cache: &PersistentCache, images: &[PathBuf]) -> CacheStatus {
    let mut status = CacheStatus {
        total: images.len(),
        ..Default::default()
    };
    for image in images {
        if cache.find(&cache_key(image)) {
            status.cached += 1;
        } else {
            status.missing.push(image.clone());
        }
    }
    status
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PreprocessReport {
    pub total: usize,
    pub encoded: usize,
    pub cached: usize,
    pub unsupported: usize,
    pub failed: usize,
    pub cancelled: bool,
}

/// Reported before each image is handled.
#[derive(Debug, Clone, Copy)]
pub struct Progress<'a> {
    pub index: usize,
    pub total: usize,
    pub image: &'a Path,
}

pub struct Preprocessor<'c, E> {
    cache: &'c PersistentCache,
    encoder: E,
    cancel: Arc<AtomicBool>,
}

impl<'c, E: Encoder> Preprocessor<'c, E> {
    pub fn new(cache: &'c PersistentCache, encoder: E) -> Self {
        Self {
            cache,
            encoder,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Flag that stops the run before the next image when set.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    pub fn run(
        &mut self,
        images: &[PathBuf],
        mut progress: impl FnMut(Progress<'_>),
    ) -> Result<PreprocessReport> {
        if images.is_empty() {
            bail!("no images to preprocess");
        }
        let model_type = self.encoder.model_type().to_string();
        if !is_supported_model(&model_type) {
            bail!(
                "model type {:?} does not support embedding caching (supported: {})",
                model_type,
                SUPPORTED_MODEL_TYPES.join(", ")
            );
        }

        let mut report = PreprocessReport {
            total: images.len(),
            ..Default::default()
        };
        tracing::info!(total = images.len(), model = %model_type, "preprocess started");

        for (index, image) in images.iter().enumerate() {
            if self.cancel.load(Ordering::SeqCst) {
                report.cancelled = true;
                tracing::info!(done = index, total = images.len(), "preprocess cancelled");
                break;
            }
            progress(Progress {
                index,
                total: images.len(),
                image,
            });

            let key = cache_key(image);
            if self.cache.find(&key) {
                tracing::debug!(image = %image.display(), "already cached, skipping");
                report.cached += 1;
                continue;
            }

            match self.encode_one(&key, image) {
                Ok(true) => report.encoded += 1,
                Ok(false) => {
                    tracing::warn!(image = %image.display(), "encoder produced no embedding");
                    report.unsupported += 1;
                }
                Err(e) => {
                    let error = format!("{:#}", e);
                    tracing::warn!(image = %image.display(), %error, "preprocess failed");
                    report.failed += 1;
                }
            }
        }

        tracing::info!(
            encoded = report.encoded,
            cached = report.cached,
            unsupported = report.unsupported,
            failed = report.failed,
            "preprocess finished"
        );
        Ok(report)
    }

    fn encode_one(&mut self, key: &str, image: &Path) -> Result<bool> {
        let Some(embedding) = self
            .encoder
            .encode(image)
            .with_context(|| format!("encode {}", image.display()))?
        else {
            return Ok(false);
        };
        self.cache
            .put(key, &embedding)
            .with_context(|| format!("cache embedding for {}", image.display()))?;
        Ok(true)
    }
}
