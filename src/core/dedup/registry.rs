//! Phase 1: registry build.

use super::fallback_key;
use crate::core::cache::{CacheBackend, FileStamp, HashCacheEntry};
use crate::core::hasher::ContentHasher;
use crate::core::record::{ContentIdentity, PhotoRecord, SourceFile};
use crate::core::scanner::FilePair;
use crate::events::{Event, EventSender, HashEvent, HashProgress};
use rayon::prelude::*;
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, info, warn};

/// Counters collected while building the registry
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegistryStats {
    /// Files considered
    pub files: usize,
    /// Hashes served from the cache
    pub cache_hits: usize,
    /// Hashes computed this run
    pub hashed: usize,
    /// Files kept under a fallback key
    pub hash_failures: usize,
    /// Files that could not be stat'ed
    pub skipped: usize,
}

/// Arena of unique records plus the identity-to-index map
#[derive(Debug, Default)]
pub struct Registry {
    records: Vec<PhotoRecord>,
    index: HashMap<String, usize>,
    stats: RegistryStats,
}

impl Registry {
    pub fn into_records(self) -> Vec<PhotoRecord> {
        self.records
    }

    pub fn stats(&self) -> RegistryStats {
        self.stats
    }

    fn fold(&mut self, key: String, pair: &FilePair, identity: ContentIdentity) {
        let source = SourceFile {
            path: pair.media_path.clone(),
            sidecar: pair.sidecar_path.clone(),
        };
        match self.index.get(&key) {
            Some(&idx) => {
                debug!(path = %pair.media_path.display(), "duplicate content folded");
                self.records[idx].add_source(source, pair.album.clone());
            }
            None => {
                self.index.insert(key, self.records.len());
                self.records
                    .push(PhotoRecord::new(source, pair.album.clone(), identity));
            }
        }
    }
}

enum Hashed {
    /// Stat failed; the file is left out
    Skipped,
    Done {
        stamp: FileStamp,
        hash: Option<String>,
        from_cache: bool,
    },
}

/// Build the registry from scanned pairs.
///
/// Hashing runs in parallel; folding happens afterwards in scan order so the
/// result does not depend on thread scheduling. Fresh hashes are written to
/// `cache` in one batch, which is persisted before returning. A failed persist is logged
/// and does not fail the run.
pub fn build_registry(
    pairs: &[FilePair],
    cache: &dyn CacheBackend,
    hasher: &dyn ContentHasher,
    events: &EventSender,
) -> Registry {
    let total = pairs.len();
    events.send(Event::Hash(HashEvent::Started { total_files: total }));

    let cache_hits = AtomicUsize::new(0);
    let completed = AtomicUsize::new(0);

    let outcomes: Vec<Hashed> = pairs
        .par_iter()
        .map(|pair| {
            let path = &pair.media_path;
            let current_completed = completed.fetch_add(1, Ordering::SeqCst) + 1;

            let stamp = match FileStamp::read(path) {
                Ok(stamp) => stamp,
                Err(e) => {
                    warn!(path = %path.display(), "skipping file: {}", e);
                    events.send(Event::Hash(HashEvent::Error {
                        path: path.clone(),
                        message: e.to_string(),
                    }));
                    return Hashed::Skipped;
                }
            };

            if let Ok(Some(entry)) = cache.get(path, stamp.size, stamp.mtime_ns) {
                cache_hits.fetch_add(1, Ordering::SeqCst);
                events.send(Event::Hash(HashEvent::CacheHit { path: path.clone() }));
                return Hashed::Done {
                    stamp,
                    hash: Some(entry.hash),
                    from_cache: true,
                };
            }

            let hash = match hasher.hash_file(path) {
                Ok(hash) => Some(hash),
                Err(e) => {
                    warn!(path = %path.display(), "hash failed, keeping file as unique: {}", e);
                    events.send(Event::Hash(HashEvent::Error {
                        path: path.clone(),
                        message: e.to_string(),
                    }));
                    None
                }
            };

            events.send(Event::Hash(HashEvent::Progress(HashProgress {
                completed: current_completed,
                total,
                current_path: path.clone(),
                cache_hits: cache_hits.load(Ordering::SeqCst),
            })));

            Hashed::Done {
                stamp,
                hash,
                from_cache: false,
            }
        })
        .collect();

    let mut registry = Registry::default();
    registry.stats.files = total;
    let mut fresh: Vec<(PathBuf, HashCacheEntry)> = Vec::new();

    for (pair, outcome) in pairs.iter().zip(outcomes) {
        match outcome {
            Hashed::Skipped => registry.stats.skipped += 1,
            Hashed::Done {
                stamp,
                hash: Some(hash),
                from_cache,
            } => {
                if from_cache {
                    registry.stats.cache_hits += 1;
                } else {
                    registry.stats.hashed += 1;
                    fresh.push((
                        pair.media_path.clone(),
                        HashCacheEntry {
                            size: stamp.size,
                            mtime_ns: stamp.mtime_ns,
                            hash: hash.clone(),
                        },
                    ));
                }
                let identity = ContentIdentity::hashed(hash.clone(), stamp.size);
                registry.fold(hash, pair, identity);
            }
            Hashed::Done {
                stamp, hash: None, ..
            } => {
                registry.stats.hash_failures += 1;
                registry.fold(
                    fallback_key(&pair.media_path),
                    pair,
                    ContentIdentity::failed(stamp.size),
                );
            }
        }
    }

    if let Err(e) = cache.set_batch(&fresh) {
        warn!(entries = fresh.len(), "cannot update hash cache: {}", e);
    }
    if let Err(e) = cache.persist() {
        warn!("hash cache not saved: {}", e);
    }

    let stats = registry.stats;
    info!(
        files = stats.files,
        unique = registry.records.len(),
        cache_hits = stats.cache_hits,
        hashed = stats.hashed,
        hash_failures = stats.hash_failures,
        "registry built"
    );
    events.send(Event::Hash(HashEvent::Completed {
        unique_records: registry.records.len(),
        cache_hits: stats.cache_hits,
        hash_failures: stats.hash_failures,
    }));

    registry
}

/// One record per scanned file, without hashing (dates-only mode)
pub fn records_from_scan(pairs: &[FilePair]) -> Vec<PhotoRecord> {
    pairs
        .iter()
        .map(|pair| {
            let size = fs::metadata(&pair.media_path).map(|m| m.len()).unwrap_or(0);
            PhotoRecord::new(
                SourceFile {
                    path: pair.media_path.clone(),
                    sidecar: pair.sidecar_path.clone(),
                },
                pair.album.clone(),
                ContentIdentity::unhashed(size),
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::cache::InMemoryCache;
    use crate::core::hasher::Sha256Hasher;
    use crate::error::HashError;
    use crate::events::null_sender;
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;

    fn pair(path: PathBuf, album: Option<&str>) -> FilePair {
        FilePair {
            media_path: path,
            sidecar_path: None,
            album: album.map(str::to_string),
        }
    }

    fn write(dir: &TempDir, name: &str, content: &[u8]) -> PathBuf {
        let path = dir.path().join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, content).unwrap();
        path
    }

    /// Fails for any file whose name contains "broken"
    struct FlakyHasher;

    impl ContentHasher for FlakyHasher {
        fn hash_file(&self, path: &Path) -> Result<String, HashError> {
            if path.to_string_lossy().contains("broken") {
                return Err(HashError::Io {
                    path: path.to_path_buf(),
                    source: std::io::Error::other("simulated read failure"),
                });
            }
            Sha256Hasher.hash_file(path)
        }

        fn name(&self) -> &'static str {
            "flaky"
        }
    }

    #[test]
    fn identical_content_folds_and_unions_albums() {
        let dir = TempDir::new().unwrap();
        let pairs = vec![
            pair(write(&dir, "Trip/a.jpg", b"same"), Some("Trip")),
            pair(write(&dir, "Family/a.jpg", b"same"), Some("Family")),
            pair(write(&dir, "other.jpg", b"different"), None),
        ];

        let cache = InMemoryCache::new();
        let registry = build_registry(&pairs, &cache, &Sha256Hasher, &null_sender());
        let stats = registry.stats();
        let records = registry.into_records();

        assert_eq!(records.len(), 2);
        let merged = &records[0];
        assert_eq!(merged.alternates.len(), 1);
        assert!(merged.albums.contains("Trip"));
        assert!(merged.albums.contains("Family"));
        assert_eq!(stats.hashed, 3);
        assert_eq!(cache.len(), 3);
        let stamp = FileStamp::read(&pairs[2].media_path).unwrap();
        let cached = cache
            .get(&pairs[2].media_path, stamp.size, stamp.mtime_ns)
            .unwrap()
            .unwrap();
        assert_eq!(Some(cached.hash.as_str()), records[1].identity.hash.as_deref());
    }

    #[test]
    fn second_run_uses_cache() {
        let dir = TempDir::new().unwrap();
        let pairs = vec![
            pair(write(&dir, "a.jpg", b"aaa"), None),
            pair(write(&dir, "b.jpg", b"bbb"), None),
        ];
        let cache = InMemoryCache::new();

        let first = build_registry(&pairs, &cache, &Sha256Hasher, &null_sender());
        let second = build_registry(&pairs, &cache, &Sha256Hasher, &null_sender());

        assert_eq!(second.stats().cache_hits, 2);
        assert_eq!(second.stats().hashed, 0);
        assert_eq!(first.into_records(), second.into_records());
    }

    #[test]
    fn hash_failures_stay_unique() {
        let dir = TempDir::new().unwrap();
        let pairs = vec![
            pair(write(&dir, "broken1.jpg", b"same"), None),
            pair(write(&dir, "broken2.jpg", b"same"), None),
            pair(write(&dir, "fine.jpg", b"same"), None),
        ];

        let cache = InMemoryCache::new();
        let registry = build_registry(&pairs, &cache, &FlakyHasher, &null_sender());
        assert_eq!(registry.stats().hash_failures, 2);
        let records = registry.into_records();

        assert_eq!(records.len(), 3);
        let failed = &records[0];
        assert_eq!(failed.source_path, pairs[0].media_path);
        assert!(failed.identity.hash_failed);
        assert!(failed.identity.hash.is_none());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn missing_file_is_skipped() {
        let dir = TempDir::new().unwrap();
        let pairs = vec![
            pair(dir.path().join("gone.jpg"), None),
            pair(write(&dir, "here.jpg", b"x"), None),
        ];

        let registry = build_registry(&pairs, &InMemoryCache::new(), &Sha256Hasher, &null_sender());

        assert_eq!(registry.stats().skipped, 1);
        assert_eq!(registry.into_records().len(), 1);
    }

    #[test]
    fn records_from_scan_keeps_every_file() {
        let dir = TempDir::new().unwrap();
        let pairs = vec![
            pair(write(&dir, "a.jpg", b"same"), Some("Trip")),
            pair(write(&dir, "b.jpg", b"same"), None),
        ];

        let records = records_from_scan(&pairs);

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].identity.size, 4);
        assert!(records[0].identity.hash.is_none());
        assert!(records[0].albums.contains("Trip"));
    }
}
