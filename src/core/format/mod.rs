//! # Format Module
//!
//! Magic-byte sniffing for the formats whose headers are reliable.
//!
//! Exports sometimes carry a `.jpg` name on what is really a HEIF or PNG
//! file. The output pipeline uses [`FileKind::sniff`] to restore the
//! canonical extension and the metadata writer uses it to skip files
//! whose content does not match their name.

use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;

const HEADER_LEN: usize = 12;

/// Extensions treated as media by the scanner (lowercase, no dot)
pub const MEDIA_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "heic", "mp4", "mov", "m4v", "gif", "webp", "dng", "nef", "mp", "mv",
    "mp~2", "mp~3",
];

/// Extensions that hold video streams
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov", "m4v", "mp", "mv", "mp~2", "mp~3"];

/// What the scanner should do with a file it walks past
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Media,
    Sidecar,
    Ignored,
}

impl MediaKind {
    /// Classify by extension. A directory-level `metadata.json` describes an
    /// album, not a file, so it is ignored.
    pub fn classify(path: &Path) -> MediaKind {
        let ext = extension_of(path);
        if ext == "json" {
            let name = path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or_default();
            if name.eq_ignore_ascii_case("metadata.json") {
                return MediaKind::Ignored;
            }
            return MediaKind::Sidecar;
        }
        if MEDIA_EXTENSIONS.contains(&ext.as_str()) {
            MediaKind::Media
        } else {
            MediaKind::Ignored
        }
    }
}

/// Whether `ext` (lowercase, no dot) names a video container
pub fn is_video_extension(ext: &str) -> bool {
    VIDEO_EXTENSIONS.contains(&ext)
}

/// Encoded format detected from a file header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileKind {
    Jpeg,
    Png,
    Heif,
    WebP,
}

impl FileKind {
    /// Read the first bytes of `path` and detect its format.
    ///
    /// Returns `None` for unreadable files, files shorter than 12 bytes and
    /// anything not recognised.
    pub fn sniff(path: &Path) -> Option<FileKind> {
        let mut file = File::open(path).ok()?;
        let mut header = [0u8; HEADER_LEN];
        file.read_exact(&mut header).ok()?;
        Self::from_header(&header)
    }

    /// Detect the format from an in-memory header
    pub fn from_header(header: &[u8]) -> Option<FileKind> {
        if header.len() < HEADER_LEN {
            return None;
        }
        if header.starts_with(&[0xFF, 0xD8, 0xFF]) {
            return Some(FileKind::Jpeg);
        }
        if header.starts_with(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]) {
            return Some(FileKind::Png);
        }
        if &header[4..8] == b"ftyp" {
            return match &header[8..12] {
                b"heic" | b"heix" | b"heif" | b"hevc" | b"heim" | b"heis" => Some(FileKind::Heif),
                _ => None,
            };
        }
        if &header[0..4] == b"RIFF" && &header[8..12] == b"WEBP" {
            return Some(FileKind::WebP);
        }
        None
    }

    /// Canonical lowercase extension, without the dot
    pub fn preferred_extension(&self) -> &'static str {
        match self {
            FileKind::Jpeg => "jpg",
            FileKind::Png => "png",
            FileKind::Heif => "heic",
            FileKind::WebP => "webp",
        }
    }

    /// Whether `ext` (lowercase, no dot) is a valid name for this format
    pub fn matches_extension(&self, ext: &str) -> bool {
        match self {
            FileKind::Jpeg => matches!(ext, "jpg" | "jpeg"),
            FileKind::Png => ext == "png",
            FileKind::Heif => matches!(ext, "heic" | "heif"),
            FileKind::WebP => ext == "webp",
        }
    }
}

/// Lowercase extension of `path` without the dot
pub fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default()
}
