//! # Error Module
//!
//! User-friendly error types for the takeout organizer.
//!
//! ## Design Principles
//! - **Never panic** on user data - return errors instead
//! - **Include context** - paths, file names, what went wrong
//! - **Recovery hints** - suggest how to fix when possible

use std::path::PathBuf;
use thiserror::Error;

/// Top-level application error
#[derive(Error, Debug)]
pub enum OrganizerError {
    #[error("Scanning error: {0}")]
    Scan(#[from] ScanError),

    #[error("Hashing error: {0}")]
    Hash(#[from] HashError),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Sidecar error: {0}")]
    Sidecar(#[from] SidecarError),

    #[error("Date resolution error: {0}")]
    Date(#[from] DateError),

    #[error("Album selection error: {0}")]
    Album(#[from] AlbumError),

    #[error("Metadata tool error: {0}")]
    Tool(#[from] ToolError),

    #[error("Output error: {0}")]
    Output(#[from] OutputError),

    #[error("Prompt error: {0}")]
    Prompt(#[from] PromptError),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Errors that occur while walking the export tree
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Directory not found: {path}")]
    DirectoryNotFound { path: PathBuf },

    #[error("Permission denied accessing: {path}")]
    PermissionDenied { path: PathBuf },

    #[error("Failed to read directory {path}: {source}")]
    ReadDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors that occur while hashing file content
#[derive(Error, Debug)]
pub enum HashError {
    #[error("Failed to read {path} for hashing: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to stat {path}: {source}")]
    Metadata {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors that occur with the persistent hash cache
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Failed to write hash cache at {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize hash cache: {0}")]
    SerializationFailed(String),

    #[error("Hash cache lock was poisoned. Delete {path} and try again.")]
    Poisoned { path: PathBuf },
}

/// Errors that occur while reading a sidecar document
#[derive(Error, Debug)]
pub enum SidecarError {
    #[error("Failed to read sidecar {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Sidecar {path} is not valid JSON: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Errors that occur during date resolution and review
#[derive(Error, Debug)]
pub enum DateError {
    #[error("Invalid date regex {regex:?}: {reason}")]
    InvalidPattern { regex: String, reason: String },

    #[error("Failed to access pattern store {path}: {source}")]
    Store {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Pattern store {path} is malformed: {reason}. Fix or delete this file and try again.")]
    StoreFormat { path: PathBuf, reason: String },

    #[error("Date review was not confirmed; nothing was applied")]
    NotConfirmed,
}

/// Errors from parsing the album priority selection
#[derive(Error, Debug, PartialEq, Eq)]
pub enum AlbumError {
    #[error("Album index out of range: {index} (choose 1-{max})")]
    IndexOutOfRange { index: usize, max: usize },

    #[error("Unknown album name: {name}")]
    UnknownAlbum { name: String },
}

/// Errors from the external metadata tool
#[derive(Error, Debug)]
pub enum ToolError {
    #[error("exiftool is not available. Install it to enable metadata writes.")]
    Unavailable,

    #[error("Failed to start exiftool: {source}")]
    Spawn {
        #[source]
        source: std::io::Error,
    },

    #[error("exiftool failed ({status}): {stderr}")]
    Failed { status: String, stderr: String },

    #[error("exiftool stay-open session broke: {0}")]
    Protocol(String),

    #[error("exiftool returned unreadable output: {0}")]
    Output(String),
}

/// Errors that occur while writing the output tree
#[derive(Error, Debug)]
pub enum OutputError {
    #[error("Output root is empty")]
    EmptyOutputRoot,

    #[error("Failed to create folder {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to check destination {path}: {source}")]
    Resolve {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Too many name collisions for {name}")]
    TooManyCollisions { name: String },

    #[error("Failed to copy {from} to {to}: {source}")]
    Copy {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Output lock was poisoned")]
    Poisoned,
}

/// Errors from the operator prompt
#[derive(Error, Debug)]
pub enum PromptError {
    #[error("Failed to read operator input: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience Result type alias
pub type Result<T> = std::result::Result<T, OrganizerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scan_error_includes_path() {
        let error = ScanError::DirectoryNotFound {
            path: PathBuf::from("/takeout/Google Photos"),
        };
        assert!(error.to_string().contains("/takeout/Google Photos"));
    }

    #[test]
    fn copy_error_names_both_paths() {
        let error = OutputError::Copy {
            from: PathBuf::from("/in/a.jpg"),
            to: PathBuf::from("/out/Library/a.jpg"),
            source: std::io::Error::new(std::io::ErrorKind::Other, "disk full"),
        };
        let message = error.to_string();
        assert!(message.contains("/in/a.jpg"));
        assert!(message.contains("/out/Library/a.jpg"));
        assert!(message.contains("disk full"));
    }

    #[test]
    fn store_format_error_suggests_recovery() {
        let error = DateError::StoreFormat {
            path: PathBuf::from("/cfg/date_patterns.json"),
            reason: "expected array".to_string(),
        };
        assert!(error.to_string().contains("delete this file"));
    }

    #[test]
    fn album_error_reports_valid_range() {
        let error = AlbumError::IndexOutOfRange { index: 9, max: 3 };
        assert!(error.to_string().contains("1-3"));
    }
}
