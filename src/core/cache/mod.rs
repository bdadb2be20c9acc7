//! # Cache Module
//!
//! Persists content hashes between runs so unchanged files are not re-read.
//!
//! ## Validity
//! An entry is reused only while the file's size and nanosecond
//! modification time both match what was recorded.
//!
//! ## Backends
//! - `JsonHashCache` - Persistent storage in a single JSON file
//! - `InMemoryCache` - For testing

mod json;
mod memory;
mod traits;

pub use json::JsonHashCache;
pub use memory::InMemoryCache;
pub use traits::CacheBackend;

use crate::error::HashError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::UNIX_EPOCH;

/// A cached hash entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashCacheEntry {
    /// File size at time of hashing
    pub size: u64,
    /// Modification time at time of hashing, nanoseconds since the epoch
    pub mtime_ns: i64,
    /// Lowercase hex digest
    pub hash: String,
}

impl HashCacheEntry {
    /// Check if this entry is still valid for a file
    pub fn is_valid_for(&self, size: u64, mtime_ns: i64) -> bool {
        self.size == size && self.mtime_ns == mtime_ns
    }
}

/// Size and modification time of a file, as compared by the cache
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStamp {
    pub size: u64,
    pub mtime_ns: i64,
}

impl FileStamp {
    /// Stat `path`
    pub fn read(path: &Path) -> Result<FileStamp, HashError> {
        let metadata = fs::metadata(path).map_err(|source| HashError::Metadata {
            path: path.to_path_buf(),
            source,
        })?;
        let mtime_ns = match metadata.modified() {
            Ok(modified) => match modified.duration_since(UNIX_EPOCH) {
                Ok(after) => after.as_nanos() as i64,
                Err(before) => -(before.duration().as_nanos() as i64),
            },
            Err(_) => 0,
        };
        Ok(FileStamp {
            size: metadata.len(),
            mtime_ns,
        })
    }
}
