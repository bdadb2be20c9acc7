//! In-memory cache backend for testing.

use super::{CacheBackend, HashCacheEntry};
use crate::error::CacheError;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

/// In-memory cache backend
///
/// Useful for testing and for runs that should not touch the source tree.
pub struct InMemoryCache {
    entries: RwLock<HashMap<PathBuf, HashCacheEntry>>,
}

impl InMemoryCache {
    /// Create a new in-memory cache
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    fn poisoned() -> CacheError {
        CacheError::Poisoned {
            path: PathBuf::from("memory"),
        }
    }
}

impl Default for InMemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

impl CacheBackend for InMemoryCache {
    fn get(
        &self,
        path: &Path,
        current_size: u64,
        current_mtime_ns: i64,
    ) -> Result<Option<HashCacheEntry>, CacheError> {
        let entries = self.entries.read().map_err(|_| Self::poisoned())?;

        Ok(entries
            .get(path)
            .filter(|entry| entry.is_valid_for(current_size, current_mtime_ns))
            .cloned())
    }

    fn set(&self, path: &Path, entry: HashCacheEntry) -> Result<(), CacheError> {
        let mut entries = self.entries.write().map_err(|_| Self::poisoned())?;
        entries.insert(path.to_path_buf(), entry);
        Ok(())
    }

    fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }
}
