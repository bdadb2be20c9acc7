//! # Dedup Module
//!
//! Content-addressed deduplication of scanned files.
//!
//! ## Phases
//! 1. [`build_registry`] folds every scanned file into one record per content
//!    hash, using the hash cache to skip unchanged files.
//! 2. [`merge_identical`] re-verifies identity after date resolution: records
//!    are grouped by size and only same-size groups are compared by hash.
//!
//! Files whose hash cannot be computed are kept under a per-path key and
//! never merged with anything.

mod merge;
mod registry;

pub use merge::{choose_representative, merge_identical};
pub use registry::{build_registry, records_from_scan, Registry, RegistryStats};

/// Registry key for a file whose content could not be hashed
pub(crate) fn fallback_key(path: &std::path::Path) -> String {
    format!("nohash:{}", path.display())
}
