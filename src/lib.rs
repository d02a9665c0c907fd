//! Classification flag lists and the image embedding cache used while
//! labeling.
//!
//! - [`flags`]: parse `--flags` values and flag files into a [`flags::LabelSet`]
//! - [`cache`]: persistent, size-bounded embedding cache
//! - [`preprocess`]: fill the cache for a whole image folder ahead of time

pub mod cache;
pub mod config;
pub mod flags;
pub mod logging;
pub mod preprocess;

pub type Result<T> = anyhow::Result<T>;
