//! # Takeout Organizer
//!
//! Turns an exported photo archive (media files plus JSON sidecars) into a
//! clean, deduplicated library with one folder per chosen album.
//!
//! ## Core Philosophy
//! - **Never lose a file** - Files that cannot be hashed are kept, not dropped
//! - **Never modify source media** - Output is always a copy. The default
//!   hash cache is the only file written beside the export
//! - **Ask before committing** - Dates are applied only after review
//!
//! ## Architecture
//! The library is split into a core engine (UI-agnostic) and presentation layers:
//! - `core` - Scanning, dedup, date resolution and output
//! - `events` - Event-driven progress reporting
//! - `error` - User-friendly error types
//! - `cli` - Command-line interface (binary only)

pub mod core;
pub mod error;
pub mod events;

// Re-export commonly used types at the crate root
pub use error::{OrganizerError, Result};

/// Initialize tracing for the library
///
/// This should be called by the application entry point. `RUST_LOG`
/// overrides `default_directive` when set.
pub fn init_tracing(default_directive: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_directive));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    // A subscriber installed earlier (tests, embedding apps) stays in place
    let _ = tracing::subscriber::set_global_default(subscriber);
}
