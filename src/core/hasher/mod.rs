//! # Hasher Module
//!
//! Content hashing used to recognise identical files.
//!
//! Two files are the same photo when their SHA-256 digests match. Hashing
//! reads every byte, so results are cached by the [`cache`](crate::core::cache)
//! module keyed on size and modification time.

mod sha256;
mod traits;

pub use sha256::Sha256Hasher;
pub use traits::ContentHasher;
