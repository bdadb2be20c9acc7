//! JSON file backend, rewritten in full on persist.

use super::{CacheBackend, HashCacheEntry};
use crate::error::CacheError;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use tempfile::NamedTempFile;
use tracing::{debug, warn};

/// Hash cache stored as a flat JSON object `path -> {size, mtime_ns, hash}`
pub struct JsonHashCache {
    path: PathBuf,
    entries: Mutex<HashMap<PathBuf, HashCacheEntry>>,
    dirty: AtomicBool,
}

impl JsonHashCache {
    /// Load the cache at `path`.
    ///
    /// A missing, unreadable or corrupt file yields an empty cache; the
    /// next [`persist`](CacheBackend::persist) replaces it.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = match fs::read(&path) {
            Ok(data) => match serde_json::from_slice::<HashMap<PathBuf, HashCacheEntry>>(&data) {
                Ok(entries) => {
                    debug!(path = %path.display(), entries = entries.len(), "loaded hash cache");
                    entries
                }
                Err(e) => {
                    warn!(path = %path.display(), "ignoring corrupt hash cache: {}", e);
                    HashMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => {
                warn!(path = %path.display(), "cannot read hash cache: {}", e);
                HashMap::new()
            }
        };

        Self {
            path,
            entries: Mutex::new(entries),
            dirty: AtomicBool::new(false),
        }
    }

    /// Location of the cache file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn poisoned(&self) -> CacheError {
        CacheError::Poisoned {
            path: self.path.clone(),
        }
    }

    fn write_error(&self, source: std::io::Error) -> CacheError {
        CacheError::Write {
            path: self.path.clone(),
            source,
        }
    }
}

impl CacheBackend for JsonHashCache {
    fn get(
        &self,
        path: &Path,
        current_size: u64,
        current_mtime_ns: i64,
    ) -> Result<Option<HashCacheEntry>, CacheError> {
        let entries = self.entries.lock().map_err(|_| self.poisoned())?;
        Ok(entries
            .get(path)
            .filter(|entry| entry.is_valid_for(current_size, current_mtime_ns))
            .cloned())
    }

    fn set(&self, path: &Path, entry: HashCacheEntry) -> Result<(), CacheError> {
        let mut entries = self.entries.lock().map_err(|_| self.poisoned())?;
        if entries.get(path) != Some(&entry) {
            entries.insert(path.to_path_buf(), entry);
            self.dirty.store(true, Ordering::Relaxed);
        }
        Ok(())
    }

    fn set_batch(&self, batch: &[(PathBuf, HashCacheEntry)]) -> Result<(), CacheError> {
        let mut entries = self.entries.lock().map_err(|_| self.poisoned())?;
        for (path, entry) in batch {
            if entries.get(path) != Some(entry) {
                entries.insert(path.clone(), entry.clone());
                self.dirty.store(true, Ordering::Relaxed);
            }
        }
        Ok(())
    }

    fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    fn persist(&self) -> Result<(), CacheError> {
        if !self.dirty.load(Ordering::Relaxed) && self.path.exists() {
            return Ok(());
        }

        let snapshot: BTreeMap<PathBuf, HashCacheEntry> = {
            let entries = self.entries.lock().map_err(|_| self.poisoned())?;
            entries
                .iter()
                .map(|(path, entry)| (path.clone(), entry.clone()))
                .collect()
        };
        let json = serde_json::to_vec_pretty(&snapshot)
            .map_err(|e| CacheError::SerializationFailed(e.to_string()))?;

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir).map_err(|e| self.write_error(e))?;

        let mut temp = NamedTempFile::new_in(&dir).map_err(|e| self.write_error(e))?;
        temp.write_all(&json).map_err(|e| self.write_error(e))?;
        temp.persist(&self.path)
            .map_err(|e| self.write_error(e.error))?;

        self.dirty.store(false, Ordering::Relaxed);
        debug!(path = %self.path.display(), entries = snapshot.len(), "persisted hash cache");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn entry(hash: &str) -> HashCacheEntry {
        HashCacheEntry {
            size: 10,
            mtime_ns: 1_600_000_000_123_456_789,
            hash: hash.to_string(),
        }
    }

    #[test]
    fn missing_file_is_empty_cache() {
        let dir = TempDir::new().unwrap();
        let cache = JsonHashCache::open(dir.path().join("nope.json"));
        assert!(cache.is_empty());
    }

    #[test]
    fn corrupt_file_is_empty_cache() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("hash_cache.json");
        fs::write(&path, b"{ this is not json").unwrap();

        let cache = JsonHashCache::open(&path);
        assert!(cache.is_empty());
    }

    #[test]
    fn persist_then_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state").join("hash_cache.json");

        let cache = JsonHashCache::open(&path);
        cache.set(Path::new("/src/a.jpg"), entry("aaaa")).unwrap();
        cache.set(Path::new("/src/b.jpg"), entry("bbbb")).unwrap();
        cache.persist().unwrap();

        let reloaded = JsonHashCache::open(&path);
        assert_eq!(reloaded.len(), 2);
        let hit = reloaded
            .get(Path::new("/src/a.jpg"), 10, 1_600_000_000_123_456_789)
            .unwrap();
        assert_eq!(hit.unwrap().hash, "aaaa");
    }

    #[test]
    fn batch_write_marks_dirty_and_persists() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("hash_cache.json");

        let cache = JsonHashCache::open(&path);
        cache
            .set_batch(&[
                (PathBuf::from("/src/a.jpg"), entry("aaaa")),
                (PathBuf::from("/src/b.jpg"), entry("bbbb")),
            ])
            .unwrap();
        cache.persist().unwrap();

        let reloaded = JsonHashCache::open(&path);
        assert_eq!(reloaded.len(), 2);
        let hit = reloaded
            .get(Path::new("/src/b.jpg"), 10, 1_600_000_000_123_456_789)
            .unwrap();
        assert_eq!(hit.unwrap().hash, "bbbb");
    }

    #[test]
    fn persisted_format_is_flat_object() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("hash_cache.json");

        let cache = JsonHashCache::open(&path);
        cache.set(Path::new("/src/a.jpg"), entry("aaaa")).unwrap();
        cache.persist().unwrap();

        let value: serde_json::Value = serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
        assert_eq!(value["/src/a.jpg"]["hash"], "aaaa");
        assert_eq!(value["/src/a.jpg"]["size"], 10);
        assert_eq!(value["/src/a.jpg"]["mtime_ns"], 1_600_000_000_123_456_789i64);
    }
}
