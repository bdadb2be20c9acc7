//! Directory walking implementation using walkdir.

use super::{filter::MediaFilter, matcher::SidecarIndex, FilePair, ScanResult};
use crate::core::format::MediaKind;
use crate::core::sidecar;
use crate::error::ScanError;
use crate::events::{null_sender, Event, EventSender, ScanEvent};
use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Top-level folder some exports wrap everything in
const WRAPPER_DIR: &str = "Google Photos";
/// Date-bucket folders the service creates for uploads outside any album
const UPLOAD_BUCKET_PREFIX: &str = "Photos from";

/// Configuration for the archive scanner
#[derive(Debug, Clone, Default)]
pub struct ScanConfig {
    /// Whether to follow symbolic links
    pub follow_symlinks: bool,
    /// Whether to include hidden files and directories
    pub include_hidden: bool,
    /// Media extensions to keep (None = every known media type)
    pub only_extensions: Option<HashSet<String>>,
}

/// Scanner over an exported archive
pub struct TakeoutScanner {
    config: ScanConfig,
    filter: MediaFilter,
}

impl TakeoutScanner {
    /// Create a new scanner with the given configuration
    pub fn new(config: ScanConfig) -> Self {
        let filter = MediaFilter::new()
            .with_hidden(config.include_hidden)
            .with_only_extensions(config.only_extensions.clone());
        Self { config, filter }
    }

    /// Scan without progress reporting
    pub fn scan(&self, root: &Path) -> Result<ScanResult, ScanError> {
        self.scan_with_events(root, &null_sender())
    }

    /// Scan with progress reporting via events
    pub fn scan_with_events(
        &self,
        root: &Path,
        events: &EventSender,
    ) -> Result<ScanResult, ScanError> {
        if !root.is_dir() {
            return Err(ScanError::DirectoryNotFound {
                path: root.to_path_buf(),
            });
        }
        let root = root
            .canonicalize()
            .map_err(|source| ScanError::ReadDirectory {
                path: root.to_path_buf(),
                source,
            })?;

        events.send(Event::Scan(ScanEvent::Started { root: root.clone() }));

        let mut media: Vec<PathBuf> = Vec::new();
        let mut index = SidecarIndex::new();
        let mut errors = Vec::new();

        let walker = WalkDir::new(&root)
            .follow_links(self.config.follow_symlinks)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| entry.depth() == 0 || !self.filter.is_hidden(entry.path()));

        for entry_result in walker {
            match entry_result {
                Ok(entry) => {
                    if !entry.file_type().is_file() {
                        continue;
                    }
                    let path = entry.into_path();
                    match self.filter.classify(&path) {
                        MediaKind::Media => {
                            if self.filter.allows(&path) {
                                events.send(Event::Scan(ScanEvent::MediaFound {
                                    path: path.clone(),
                                }));
                                media.push(path);
                            }
                        }
                        MediaKind::Sidecar => {
                            let title = sidecar::read_title(&path);
                            index.insert(path, title);
                        }
                        MediaKind::Ignored => {}
                    }
                }
                Err(e) => {
                    let path = e.path().map(|p| p.to_path_buf()).unwrap_or_default();

                    let error = if e.io_error().map(|e| e.kind())
                        == Some(std::io::ErrorKind::PermissionDenied)
                    {
                        ScanError::PermissionDenied { path: path.clone() }
                    } else {
                        ScanError::ReadDirectory {
                            path: path.clone(),
                            source: std::io::Error::other(e.to_string()),
                        }
                    };
                    warn!(path = %path.display(), "scan error: {}", error);

                    events.send(Event::Scan(ScanEvent::Error {
                        path,
                        message: error.to_string(),
                    }));

                    errors.push(error);
                }
            }
        }

        media.sort();
        let pairs: Vec<FilePair> = media
            .into_iter()
            .map(|media_path| {
                let sidecar_path = index.resolve(&media_path);
                let album = detect_album(&root, &media_path);
                if sidecar_path.is_none() {
                    debug!(path = %media_path.display(), "no sidecar found");
                }
                FilePair {
                    media_path,
                    sidecar_path,
                    album,
                }
            })
            .collect();

        let result = ScanResult { pairs, errors };
        info!(
            media = result.pairs.len(),
            sidecars = index.sidecar_count(),
            with_sidecar = result.with_sidecar(),
            with_album = result.with_album(),
            "scan complete"
        );

        events.send(Event::Scan(ScanEvent::Completed {
            media_files: result.pairs.len(),
            with_sidecar: result.with_sidecar(),
            with_album: result.with_album(),
        }));

        Ok(result)
    }
}

/// Album a file was exported under, inferred from its folder
pub fn detect_album(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let parts: Vec<&str> = relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => part.to_str(),
            _ => None,
        })
        .collect();

    let folders = match parts.split_last() {
        Some((_, folders)) => folders,
        None => return None,
    };
    let folders = match folders.split_first() {
        Some((&first, rest)) if first == WRAPPER_DIR => rest,
        _ => folders,
    };

    let album = folders.first()?;
    if album.starts_with(UPLOAD_BUCKET_PREFIX) {
        None
    } else {
        Some(album.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{self, File};
    use std::io::Write;
    use tempfile::TempDir;

    fn touch(root: &Path, relative: &str, contents: &[u8]) -> PathBuf {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        let mut file = File::create(&path).unwrap();
        file.write_all(contents).unwrap();
        path
    }

    #[test]
    fn album_detection_rules() {
        let root = Path::new("/t");
        assert_eq!(detect_album(root, Path::new("/t/Trip/a.jpg")).as_deref(), Some("Trip"));
        assert_eq!(
            detect_album(root, Path::new("/t/Google Photos/Trip/a.jpg")).as_deref(),
            Some("Trip")
        );
        assert_eq!(detect_album(root, Path::new("/t/Google Photos/a.jpg")), None);
        assert_eq!(
            detect_album(root, Path::new("/t/Google Photos/Photos from 2019/a.jpg")),
            None
        );
        assert_eq!(detect_album(root, Path::new("/t/Photos from 2020/a.jpg")), None);
        assert_eq!(detect_album(root, Path::new("/t/a.jpg")), None);
        assert_eq!(
            detect_album(root, Path::new("/t/Trip/day 1/a.jpg")).as_deref(),
            Some("Trip")
        );
    }

    #[test]
    fn scan_empty_directory_returns_empty_vec() {
        let temp_dir = TempDir::new().unwrap();
        let scanner = TakeoutScanner::new(ScanConfig::default());

        let result = scanner.scan(temp_dir.path()).unwrap();

        assert!(result.pairs.is_empty());
        assert!(result.errors.is_empty());
    }

    #[test]
    fn scan_pairs_media_with_sidecars_and_albums() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        touch(root, "Google Photos/Trip/IMG_1.jpg", b"one");
        touch(
            root,
            "Google Photos/Trip/IMG_1.jpg.json",
            br#"{"title": "IMG_1.jpg", "photoTakenTime": {"timestamp": "1"}}"#,
        );
        touch(root, "Google Photos/Trip/metadata.json", br#"{"title": "Trip"}"#);
        touch(root, "Google Photos/Photos from 2020/IMG_2.png", b"two");
        touch(root, "notes.txt", b"ignored");

        let result = TakeoutScanner::new(ScanConfig::default()).scan(root).unwrap();

        assert_eq!(result.pairs.len(), 2);
        let trip = result
            .pairs
            .iter()
            .find(|p| p.media_path.ends_with("IMG_1.jpg"))
            .unwrap();
        assert_eq!(trip.album.as_deref(), Some("Trip"));
        assert!(trip.sidecar_path.as_ref().unwrap().ends_with("IMG_1.jpg.json"));

        let upload = result
            .pairs
            .iter()
            .find(|p| p.media_path.ends_with("IMG_2.png"))
            .unwrap();
        assert_eq!(upload.album, None);
        assert_eq!(upload.sidecar_path, None);
        assert_eq!(result.with_sidecar(), 1);
    }

    #[test]
    fn scan_results_are_sorted() {
        let temp_dir = TempDir::new().unwrap();
        touch(temp_dir.path(), "b/z.jpg", b"z");
        touch(temp_dir.path(), "a/y.jpg", b"y");
        touch(temp_dir.path(), "a/x.jpg", b"x");

        let result = TakeoutScanner::new(ScanConfig::default())
            .scan(temp_dir.path())
            .unwrap();
        let names: Vec<_> = result
            .pairs
            .iter()
            .map(|p| p.media_path.file_name().unwrap().to_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["x.jpg", "y.jpg", "z.jpg"]);
    }

    #[test]
    fn hidden_directories_are_pruned_by_default() {
        let temp_dir = TempDir::new().unwrap();
        touch(temp_dir.path(), "visible.jpg", b"v");
        touch(temp_dir.path(), ".takeout-organizer/cached.jpg", b"h");
        touch(temp_dir.path(), ".hidden.jpg", b"h");

        let result = TakeoutScanner::new(ScanConfig::default())
            .scan(temp_dir.path())
            .unwrap();
        assert_eq!(result.pairs.len(), 1);

        let config = ScanConfig {
            include_hidden: true,
            ..Default::default()
        };
        let result = TakeoutScanner::new(config).scan(temp_dir.path()).unwrap();
        assert_eq!(result.pairs.len(), 3);
    }

    #[test]
    fn extension_allow_list_filters_media() {
        let temp_dir = TempDir::new().unwrap();
        touch(temp_dir.path(), "a.jpg", b"a");
        touch(temp_dir.path(), "b.mp4", b"b");

        let config = ScanConfig {
            only_extensions: super::super::parse_extension_list("mp4"),
            ..Default::default()
        };
        let result = TakeoutScanner::new(config).scan(temp_dir.path()).unwrap();
        assert_eq!(result.pairs.len(), 1);
        assert!(result.pairs[0].media_path.ends_with("b.mp4"));
    }

    #[test]
    fn scan_nonexistent_directory_returns_error() {
        let scanner = TakeoutScanner::new(ScanConfig::default());
        let result = scanner.scan(Path::new("/nonexistent/path/12345"));

        assert!(matches!(result, Err(ScanError::DirectoryNotFound { .. })));
    }
}
