//! Trait definitions for content hashing.

use crate::error::HashError;
use std::path::Path;

/// Computes a content digest for a file
///
/// Implement this trait to swap the digest (or to fake failures in tests).
pub trait ContentHasher: Send + Sync {
    /// Hash the full content of `path`, returning lowercase hex
    fn hash_file(&self, path: &Path) -> Result<String, HashError>;

    /// Short algorithm name for logs
    fn name(&self) -> &'static str;
}
