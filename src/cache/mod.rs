//! Persistent on-disk cache for image embeddings.
//!
//! Layout of a cache directory:
//! - `embedding_<md5 of key>.bin`: one bincode-encoded value per key
//! - `metadata.json`: entry file name -> last access time (unix seconds)
//!
//! Entries are evicted least-recently-accessed first once the directory grows
//! past its configured size.

pub mod error;
pub mod meta;
pub mod store;

pub use error::CacheError;
pub use store::{CacheInfo, PersistentCache, key_file_name};
