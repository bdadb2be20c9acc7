//! Cache backend trait definition.

use super::HashCacheEntry;
use crate::error::CacheError;
use std::path::{Path, PathBuf};

/// Trait for hash cache backends
pub trait CacheBackend: Send + Sync {
    /// Get a cached hash if it exists and is still valid
    ///
    /// The entry is only returned if the file's size and nanosecond
    /// modification time still match what was recorded.
    fn get(
        &self,
        path: &Path,
        current_size: u64,
        current_mtime_ns: i64,
    ) -> Result<Option<HashCacheEntry>, CacheError>;

    /// Store a hash in the cache
    fn set(&self, path: &Path, entry: HashCacheEntry) -> Result<(), CacheError>;

    /// Store multiple hashes at once
    fn set_batch(&self, entries: &[(PathBuf, HashCacheEntry)]) -> Result<(), CacheError> {
        for (path, entry) in entries {
            self.set(path, entry.clone())?;
        }
        Ok(())
    }

    /// Number of entries held
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Write the cache to durable storage, if the backend has any
    fn persist(&self) -> Result<(), CacheError> {
        Ok(())
    }
}
