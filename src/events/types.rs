//! Event type definitions for progress reporting.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// All events emitted by the organizer pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    /// Scanning and sidecar matching
    Scan(ScanEvent),
    /// Content hashing
    Hash(HashEvent),
    /// Date resolution
    Dates(DateEvent),
    /// Copying into the output tree
    Output(OutputEvent),
    /// Pipeline-level events
    Pipeline(PipelineEvent),
}

/// Events during the scanning phase
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ScanEvent {
    /// Scanning has started
    Started { root: PathBuf },
    /// A media file was found
    MediaFound { path: PathBuf },
    /// An entry could not be read but scanning continues
    Error { path: PathBuf, message: String },
    /// Scanning and sidecar matching completed
    Completed {
        media_files: usize,
        with_sidecar: usize,
        with_album: usize,
    },
}

/// Events during the hashing phase
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum HashEvent {
    /// Hashing has started
    Started { total_files: usize },
    /// Progress update during hashing
    Progress(HashProgress),
    /// A hash was taken from the cache
    CacheHit { path: PathBuf },
    /// A file could not be hashed and is kept under its own key
    Error { path: PathBuf, message: String },
    /// Registry build completed
    Completed {
        unique_records: usize,
        cache_hits: usize,
        hash_failures: usize,
    },
}

/// Progress information during hashing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HashProgress {
    pub completed: usize,
    pub total: usize,
    pub current_path: PathBuf,
    pub cache_hits: usize,
}

/// Events during date resolution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DateEvent {
    /// A resolution pass started
    Started { total_records: usize },
    /// Progress update during a resolution pass
    Progress { completed: usize, total: usize },
    /// A resolution pass completed
    Completed { resolved: usize, unknown: usize },
}

/// Events during output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum OutputEvent {
    /// Output has started
    Started { total_records: usize, dry_run: bool },
    /// A record was copied (or planned, in a dry run)
    Progress(OutputProgress),
    /// A metadata batch finished
    MetadataBatch { written: usize, failed: usize },
    /// Output completed
    Completed { copied: usize },
}

/// Progress information during output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputProgress {
    pub completed: usize,
    pub total: usize,
    pub source: PathBuf,
    pub destination: PathBuf,
}

/// Pipeline-level events
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PipelineEvent {
    /// Pipeline has started
    Started,
    /// Moving to a new phase
    PhaseChanged { phase: PipelinePhase },
    /// Pipeline completed successfully
    Completed { summary: PipelineSummary },
    /// Pipeline encountered a fatal error
    Error { message: String },
}

/// Phases of the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PipelinePhase {
    Scanning,
    Hashing,
    ResolvingDates,
    Merging,
    AssigningAlbums,
    Writing,
}

/// Summary of pipeline results
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineSummary {
    /// Media files found by the scanner (after extension filtering)
    pub media_files: usize,
    /// Unique records after deduplication
    pub unique_records: usize,
    /// Records that ended up in an album folder
    pub in_albums: usize,
    /// Files copied (or planned, in a dry run)
    pub copied: usize,
    /// Duration in milliseconds
    pub duration_ms: u64,
}

impl std::fmt::Display for PipelinePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelinePhase::Scanning => write!(f, "Scanning"),
            PipelinePhase::Hashing => write!(f, "Hashing"),
            PipelinePhase::ResolvingDates => write!(f, "Analyzing dates"),
            PipelinePhase::Merging => write!(f, "Merging duplicates"),
            PipelinePhase::AssigningAlbums => write!(f, "Assigning albums"),
            PipelinePhase::Writing => write!(f, "Copying"),
        }
    }
}
