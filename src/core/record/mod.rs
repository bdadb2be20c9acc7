//! # Record Module
//!
//! The photo record shared by every pipeline stage.
//!
//! A record is created by the dedup registry (or one per scanned file in
//! dates-only mode), filled in by date resolution and album assignment, and
//! read by the output pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// Content identity: hash plus size.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentIdentity {
    /// Lowercase hex SHA-256, absent until hashed or when hashing failed
    pub hash: Option<String>,
    /// File size in bytes
    pub size: u64,
    /// Hashing was attempted and failed; never merged with other files
    pub hash_failed: bool,
}

impl ContentIdentity {
    pub fn hashed(hash: String, size: u64) -> Self {
        Self {
            hash: Some(hash),
            size,
            hash_failed: false,
        }
    }

    pub fn failed(size: u64) -> Self {
        Self {
            hash: None,
            size,
            hash_failed: true,
        }
    }

    pub fn unhashed(size: u64) -> Self {
        Self {
            hash: None,
            size,
            hash_failed: false,
        }
    }

    /// First 8 hex characters of the hash (or the whole hash if shorter)
    pub fn short_hash(&self) -> Option<&str> {
        self.hash
            .as_deref()
            .filter(|h| !h.is_empty())
            .map(|h| h.get(..8).unwrap_or(h))
    }
}

/// One physical source file and its paired sidecar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFile {
    pub path: PathBuf,
    pub sidecar: Option<PathBuf>,
}

/// Ranked reliability of a resolved capture date (lower is better).
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum DateConfidence {
    /// Timestamp from the sidecar JSON
    Sidecar,
    /// Timestamp parsed from the file name
    Filename,
    /// Timestamp read from tags embedded in the file
    Embedded,
    /// No source produced a date
    #[default]
    Unknown,
}

impl DateConfidence {
    pub fn is_better_than(self, other: DateConfidence) -> bool {
        self < other
    }
}

impl std::fmt::Display for DateConfidence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DateConfidence::Sidecar => write!(f, "sidecar"),
            DateConfidence::Filename => write!(f, "filename"),
            DateConfidence::Embedded => write!(f, "embedded"),
            DateConfidence::Unknown => write!(f, "unknown"),
        }
    }
}

/// Geolocation recovered from a sidecar
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct GeoData {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: f64,
    pub latitude_span: f64,
    pub longitude_span: f64,
}

/// Where the exporting service says the file came from
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadOrigin {
    pub from_shared_album: bool,
    pub web_upload: bool,
    pub mobile_upload: bool,
    pub device_type: Option<String>,
    pub device_folder: Option<String>,
    pub composition_type: Option<String>,
}

impl UploadOrigin {
    /// Compact provenance label, e.g. `gphotos:mobileUpload,deviceType=ANDROID_PHONE`
    pub fn label(&self) -> Option<String> {
        let mut parts: Vec<String> = Vec::new();
        if self.from_shared_album {
            parts.push("fromSharedAlbum".to_string());
        }
        if self.web_upload {
            parts.push("webUpload".to_string());
        }
        if self.mobile_upload {
            parts.push("mobileUpload".to_string());
        }
        if let Some(kind) = &self.composition_type {
            parts.push(format!("composition={}", kind));
        }
        if let Some(device) = &self.device_type {
            parts.push(format!("deviceType={}", device));
        }
        if let Some(folder) = &self.device_folder {
            parts.push(format!("deviceFolder={}", folder));
        }

        if parts.is_empty() {
            None
        } else {
            Some(format!("gphotos:{}", parts.join(",")))
        }
    }
}

/// Descriptive metadata carried over from the sidecar
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DescriptiveMetadata {
    pub description: Option<String>,
    pub favorited: bool,
    pub people: Vec<String>,
    pub url: Option<String>,
    pub app_source: Option<String>,
    pub origin: UploadOrigin,
    pub geo: Option<GeoData>,
    /// Upload/creation time, written as the XMP creation date
    pub created_at: Option<DateTime<Utc>>,
}

impl DescriptiveMetadata {
    /// True when nothing here would be written into a file
    pub fn is_empty(&self) -> bool {
        self.description.is_none()
            && !self.favorited
            && self.people.is_empty()
            && self.url.is_none()
            && self.app_source.is_none()
            && self.geo.is_none()
            && self.created_at.is_none()
            && self.origin.label().is_none()
    }
}

/// One unique piece of content and everything learned about it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhotoRecord {
    pub identity: ContentIdentity,
    /// Representative source file
    pub source_path: PathBuf,
    /// Sidecar paired with the representative
    pub sidecar_path: Option<PathBuf>,
    /// Other source files with the same content
    pub alternates: Vec<SourceFile>,
    /// Albums this content appeared under in the export
    pub albums: BTreeSet<String>,
    /// Destination album; `None` means the library folder
    pub assigned_album: Option<String>,
    pub captured_at: Option<DateTime<Utc>>,
    pub date_confidence: DateConfidence,
    pub metadata: DescriptiveMetadata,
}

impl PhotoRecord {
    pub fn new(source: SourceFile, album: Option<String>, identity: ContentIdentity) -> Self {
        let mut albums = BTreeSet::new();
        if let Some(album) = album {
            albums.insert(album);
        }
        Self {
            identity,
            source_path: source.path,
            sidecar_path: source.sidecar,
            alternates: Vec::new(),
            albums,
            assigned_album: None,
            captured_at: None,
            date_confidence: DateConfidence::Unknown,
            metadata: DescriptiveMetadata::default(),
        }
    }

    /// Base name of the representative source file
    pub fn file_name(&self) -> &str {
        file_name_of(&self.source_path)
    }

    /// Representative first, then alternates
    pub fn sources(&self) -> Vec<SourceFile> {
        let mut sources = Vec::with_capacity(1 + self.alternates.len());
        sources.push(SourceFile {
            path: self.source_path.clone(),
            sidecar: self.sidecar_path.clone(),
        });
        sources.extend(self.alternates.iter().cloned());
        sources
    }

    /// Record another source file with identical content.
    pub fn add_source(&mut self, source: SourceFile, album: Option<String>) {
        if let Some(album) = album {
            self.albums.insert(album);
        }
        if source.path == self.source_path
            || self.alternates.iter().any(|alt| alt.path == source.path)
        {
            return;
        }
        self.alternates.push(source);
    }

    /// Fold another record with identical content into this one.
    pub fn absorb(&mut self, other: PhotoRecord) {
        let sources = other.sources();
        self.albums.extend(other.albums);
        for source in sources {
            self.add_source(source, None);
        }
    }

    /// Make `path` the representative, demoting the current one to alternates.
    pub fn promote(&mut self, path: &Path) {
        if self.source_path == path {
            return;
        }
        let Some(idx) = self.alternates.iter().position(|alt| alt.path == path) else {
            return;
        };
        let chosen = self.alternates.remove(idx);
        let previous = SourceFile {
            path: std::mem::replace(&mut self.source_path, chosen.path),
            sidecar: std::mem::replace(&mut self.sidecar_path, chosen.sidecar),
        };
        self.alternates.insert(0, previous);
    }
}

/// Base name of a path as UTF-8, or an empty string
pub fn file_name_of(path: &Path) -> &str {
    path.file_name().and_then(|n| n.to_str()).unwrap_or("")
}
