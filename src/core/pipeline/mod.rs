//! # Pipeline Module
//!
//! Orchestrates the full organize workflow.
//!
//! ## Pipeline Stages
//! 1. **Scan** - Walk the export and pair media with sidecars
//! 2. **Hash** - Fold identical content into records (with caching)
//! 3. **Dates** - Propose capture dates, refine with the operator, confirm
//! 4. **Merge** - Fold records whose chosen files share content
//! 5. **Albums** - Rank albums and assign each record to at most one
//! 6. **Output** - Copy into the organized tree and write metadata
//!
//! Dates-only mode stops after stage 3 without hashing.
//!
//! ## Parallelism
//! Uses rayon for hashing and date evaluation, and a bounded worker pool
//! for copies.

mod executor;

pub use executor::{Organizer, OrganizerBuilder, OrganizerConfig, OrganizerReport, STATE_DIR_NAME};
