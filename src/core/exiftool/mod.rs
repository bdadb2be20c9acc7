//! # Exiftool Module
//!
//! Boundary to the external `exiftool` program.
//!
//! The tool is optional. [`ToolCapability::probe`] is run once at start-up;
//! when it reports the tool missing, embedded dates are read natively (or
//! not at all) and metadata writes are skipped.
//!
//! ## Writing
//! Each copied file becomes a [`WriteItem`]. [`build_args`] turns it into a
//! tag assignment list, and [`flush_batch`] hands a batch of them to a
//! [`MetadataWriter`]. A failed batch is retried one item at a time so a
//! single bad file cannot poison its neighbours.

mod args;
mod writer;

pub use args::{build_args, PreparedWrite, WRITABLE_EXTENSIONS};
pub use writer::{ExifToolWriter, MetadataWriter};

use crate::core::record::DescriptiveMetadata;
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use tracing::{debug, warn};

/// Arguments applied to every write invocation
pub(crate) const COMMON_WRITE_ARGS: &[&str] = &["-overwrite_original", "-q", "-q", "-m"];

/// Whether exiftool can be run, and how
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCapability {
    pub program: String,
    pub available: bool,
    pub version: Option<String>,
}

impl ToolCapability {
    /// Run `exiftool -ver` and record whether it worked
    pub fn probe() -> Self {
        Self::probe_program("exiftool")
    }

    /// Probe a specific executable name or path
    pub fn probe_program(program: &str) -> Self {
        let output = Command::new(program)
            .arg("-ver")
            .stdin(Stdio::null())
            .output();

        match output {
            Ok(out) if out.status.success() => {
                let version = String::from_utf8_lossy(&out.stdout).trim().to_string();
                debug!(program, version = %version, "exiftool available");
                Self {
                    program: program.to_string(),
                    available: true,
                    version: Some(version).filter(|v| !v.is_empty()),
                }
            }
            Ok(out) => {
                warn!(program, status = %out.status, "exiftool probe failed");
                Self::absent_program(program)
            }
            Err(e) => {
                debug!(program, error = %e, "exiftool not found");
                Self::absent_program(program)
            }
        }
    }

    /// A capability that never runs the tool
    pub fn absent() -> Self {
        Self::absent_program("exiftool")
    }

    fn absent_program(program: &str) -> Self {
        Self {
            program: program.to_string(),
            available: false,
            version: None,
        }
    }
}

/// Metadata destined for one output file
#[derive(Debug, Clone, PartialEq)]
pub struct WriteItem {
    /// Destination path (the copy, never the source)
    pub path: PathBuf,
    pub captured_at: Option<DateTime<Utc>>,
    pub metadata: DescriptiveMetadata,
}

impl WriteItem {
    /// True when at least one tag would be written
    pub fn has_writable_metadata(&self) -> bool {
        self.captured_at.is_some() || !self.metadata.is_empty()
    }
}

/// Result of flushing one batch
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    pub written: usize,
    pub skipped: usize,
    pub failures: Vec<(PathBuf, String)>,
}

/// Write a batch, retrying item by item when the combined write fails.
///
/// Items with nothing to write, or whose format cannot carry tags, are
/// counted as skipped. Only items that also fail on their own are reported
/// as failures.
pub fn flush_batch(writer: &mut dyn MetadataWriter, items: &[WriteItem]) -> BatchOutcome {
    let mut outcome = BatchOutcome::default();
    let mut prepared = Vec::with_capacity(items.len());
    for item in items {
        match build_args(item) {
            Some(write) => prepared.push(write),
            None => outcome.skipped += 1,
        }
    }
    if prepared.is_empty() {
        return outcome;
    }

    match writer.write_batch(&prepared) {
        Ok(()) => {
            outcome.written = prepared.len();
        }
        Err(e) => {
            warn!(items = prepared.len(), error = %e, "Batch metadata write failed, retrying per file");
            for write in &prepared {
                match writer.write_one(write) {
                    Ok(()) => outcome.written += 1,
                    Err(e) => {
                        warn!(path = %write.path.display(), error = %e, "Metadata write failed");
                        outcome.failures.push((write.path.clone(), e.to_string()));
                    }
                }
            }
        }
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ToolError;
    use std::fs;
    use tempfile::TempDir;

    /// Records calls; batches fail when any path contains "bad" and single
    /// writes fail only for that path
    #[derive(Default)]
    struct RecordingWriter {
        batches: Vec<usize>,
        singles: Vec<PathBuf>,
    }

    impl MetadataWriter for RecordingWriter {
        fn write_batch(&mut self, batch: &[PreparedWrite]) -> Result<(), ToolError> {
            self.batches.push(batch.len());
            if batch.iter().any(|w| w.path.to_string_lossy().contains("bad")) {
                return Err(ToolError::Failed {
                    status: "exit status: 1".to_string(),
                    stderr: "boom".to_string(),
                });
            }
            Ok(())
        }

        fn write_one(&mut self, write: &PreparedWrite) -> Result<(), ToolError> {
            self.singles.push(write.path.clone());
            if write.path.to_string_lossy().contains("bad") {
                return Err(ToolError::Failed {
                    status: "exit status: 1".to_string(),
                    stderr: "boom".to_string(),
                });
            }
            Ok(())
        }
    }

    fn item(dir: &TempDir, name: &str, dated: bool) -> WriteItem {
        let path = dir.path().join(name);
        fs::write(&path, [0xFF, 0xD8, 0xFF, 0xE0, 0, 0, 0, 0, 0, 0, 0, 0]).unwrap();
        WriteItem {
            path,
            captured_at: dated.then(Utc::now),
            metadata: DescriptiveMetadata::default(),
        }
    }

    #[test]
    fn item_without_tags_is_not_writable() {
        let dir = TempDir::new().unwrap();
        assert!(!item(&dir, "a.jpg", false).has_writable_metadata());
        assert!(item(&dir, "a.jpg", true).has_writable_metadata());
    }

    #[test]
    fn successful_batch_writes_everything_once() {
        let dir = TempDir::new().unwrap();
        let items = vec![item(&dir, "a.jpg", true), item(&dir, "b.jpg", true), item(&dir, "c.jpg", false)];
        let mut writer = RecordingWriter::default();

        let outcome = flush_batch(&mut writer, &items);

        assert_eq!(outcome.written, 2);
        assert_eq!(outcome.skipped, 1);
        assert!(outcome.failures.is_empty());
        assert_eq!(writer.batches, vec![2]);
        assert!(writer.singles.is_empty());
    }

    #[test]
    fn failed_batch_isolates_the_bad_file() {
        let dir = TempDir::new().unwrap();
        let items = vec![item(&dir, "a.jpg", true), item(&dir, "bad.jpg", true), item(&dir, "c.jpg", true)];
        let mut writer = RecordingWriter::default();

        let outcome = flush_batch(&mut writer, &items);

        assert_eq!(outcome.written, 2);
        assert_eq!(outcome.failures.len(), 1);
        assert!(outcome.failures[0].0.ends_with("bad.jpg"));
        assert_eq!(writer.singles.len(), 3);
    }

    #[test]
    fn absent_capability_is_unavailable() {
        let capability = ToolCapability::absent();
        assert!(!capability.available);
        assert_eq!(capability.program, "exiftool");
    }

    #[test]
    fn probing_a_missing_program_reports_absent() {
        let capability = ToolCapability::probe_program("definitely-not-a-real-exiftool-binary");
        assert!(!capability.available);
        assert!(capability.version.is_none());
    }
}
