//! # Output Module
//!
//! Copies the final records into the output tree and writes their metadata.
//!
//! ## Layout
//! ```text
//! <output>/
//! ├── Library/            records without an album
//! └── Albums/<album>/     records assigned to an album
//! ```
//!
//! Sources are never modified. Metadata is written into the copies after
//! they land, by a single thread that batches writes for exiftool.

mod executor;
mod naming;

pub use executor::{write_output, OutputConfig, OutputReport, PlannedCopy};
pub use naming::{
    canonical_file_name, destination_dir, sanitize_folder, NameReservations, ALBUMS_DIR,
    LIBRARY_DIR,
};
