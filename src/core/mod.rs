//! # Core Module
//!
//! The UI-agnostic organizer engine.
//!
//! ## Modules
//! - `scanner` - Walks the export and pairs media with sidecars
//! - `sidecar` - Reads the JSON sidecar documents
//! - `format` - Media classification and header sniffing
//! - `record` - The per-content record that flows through every stage
//! - `hasher` - Content hashing
//! - `cache` - Persists hashes to avoid recomputation
//! - `dedup` - Folds identical content into one record
//! - `dates` - Capture date sources, filename patterns and the review loop
//! - `albums` - Album priority and assignment
//! - `exiftool` - Metadata writes through the external tool
//! - `output` - Copies records into the organized tree
//! - `prompt` - The operator boundary
//! - `pipeline` - Orchestrates the full workflow

pub mod albums;
pub mod cache;
pub mod dates;
pub mod dedup;
pub mod exiftool;
pub mod format;
pub mod hasher;
pub mod output;
pub mod pipeline;
pub mod prompt;
pub mod record;
pub mod scanner;
pub mod sidecar;

// Re-export commonly used types
pub use pipeline::{Organizer, OrganizerBuilder, OrganizerConfig, OrganizerReport};
pub use prompt::{Prompt, ScriptedPrompt};
pub use record::{DateConfidence, PhotoRecord};
