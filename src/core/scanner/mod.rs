//! # Scanner Module
//!
//! Walks an exported archive, pairs each media file with its JSON sidecar
//! and infers the album the file was exported under.
//!
//! ## Layout
//! ```text
//! <root>/Google Photos/Trip/IMG_1.jpg        album "Trip"
//! <root>/Google Photos/Photos from 2020/x.jpg  no album
//! <root>/IMG_2.jpg                            no album
//! ```
//!
//! ## Example
//! ```rust,ignore
//! use takeout_organizer::core::scanner::{ScanConfig, TakeoutScanner};
//!
//! let scanner = TakeoutScanner::new(ScanConfig::default());
//! let result = scanner.scan(Path::new("/exports/takeout"))?;
//! ```

mod filter;
mod matcher;
mod walker;

pub use filter::{parse_extension_list, MediaFilter};
pub use matcher::SidecarIndex;
pub use walker::{detect_album, ScanConfig, TakeoutScanner};

use crate::error::ScanError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A discovered media file and what the scan learned about it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilePair {
    pub media_path: PathBuf,
    pub sidecar_path: Option<PathBuf>,
    pub album: Option<String>,
}

/// Result of a scan operation
#[derive(Debug)]
pub struct ScanResult {
    /// Media files sorted by path
    pub pairs: Vec<FilePair>,
    /// Errors that occurred during scanning (non-fatal)
    pub errors: Vec<ScanError>,
}

impl ScanResult {
    /// Number of pairs that found a sidecar
    pub fn with_sidecar(&self) -> usize {
        self.pairs.iter().filter(|p| p.sidecar_path.is_some()).count()
    }

    /// Number of pairs that live in an album folder
    pub fn with_album(&self) -> usize {
        self.pairs.iter().filter(|p| p.album.is_some()).count()
    }
}
