//! Concurrent copy workers and the metadata stage.

use super::naming::{canonical_file_name, destination_dir, NameReservations, ALBUMS_DIR, LIBRARY_DIR};
use crate::core::exiftool::{flush_batch, MetadataWriter, WriteItem};
use crate::core::record::PhotoRecord;
use crate::error::OutputError;
use crate::events::{Event, EventSender, OutputEvent, OutputProgress};
use crossbeam_channel::{bounded, Receiver, Sender};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::thread;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Settings for one output run
#[derive(Debug, Clone)]
pub struct OutputConfig {
    pub root: PathBuf,
    pub dry_run: bool,
    /// Copy worker threads (at least 1)
    pub workers: usize,
    /// Files per metadata write (at least 1)
    pub metadata_batch: usize,
}

impl OutputConfig {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            dry_run: false,
            workers: 4,
            metadata_batch: 25,
        }
    }
}

/// One copy, performed or (in a dry run) only decided
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedCopy {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub album: Option<String>,
}

/// What an output run did
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputReport {
    /// Files copied, or planned in a dry run
    pub copied: usize,
    /// Every destination decision, in record order
    pub planned: Vec<PlannedCopy>,
    pub metadata_written: usize,
    pub metadata_failures: Vec<(PathBuf, String)>,
    pub dry_run: bool,
    pub duration_ms: u64,
}

/// One record with its already reserved destination
struct CopyJob {
    index: usize,
    destination: PathBuf,
}

/// Shared state of the copy workers
struct CopyStage<'a> {
    config: &'a OutputConfig,
    cancelled: AtomicBool,
    first_error: Mutex<Option<OutputError>>,
    completed: AtomicUsize,
    total: usize,
    planned: Mutex<Vec<(usize, PlannedCopy)>>,
    events: &'a EventSender,
}

impl CopyStage<'_> {
    fn fail(&self, error: OutputError) {
        self.cancelled.store(true, Ordering::SeqCst);
        if let Ok(mut slot) = self.first_error.lock() {
            if slot.is_none() {
                *slot = Some(error);
            } else {
                debug!(error = %error, "Suppressing error after cancellation");
            }
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Pick the destination for `record`; called in record order only
    fn plan_destination(
        &self,
        names: &mut NameReservations,
        record: &PhotoRecord,
    ) -> Result<PathBuf, OutputError> {
        let dir = destination_dir(&self.config.root, record.assigned_album.as_deref());
        let file_name = canonical_file_name(&record.source_path);
        names.reserve(&dir, &file_name, record.identity.short_hash())
    }

    fn process(
        &self,
        job: CopyJob,
        record: &PhotoRecord,
        metadata: Option<&Sender<WriteItem>>,
    ) -> Result<(), OutputError> {
        let CopyJob { index, destination } = job;

        if self.config.dry_run {
            info!(
                source = %record.source_path.display(),
                destination = %destination.display(),
                "DRY RUN: would copy"
            );
        } else {
            if let Some(dir) = destination.parent() {
                fs::create_dir_all(dir).map_err(|source| OutputError::CreateDir {
                    path: dir.to_path_buf(),
                    source,
                })?;
            }
            debug!(
                source = %record.source_path.display(),
                destination = %destination.display(),
                "Copying"
            );
            copy_file(&record.source_path, &destination)?;
            if let Some(sender) = metadata {
                let item = WriteItem {
                    path: destination.clone(),
                    captured_at: record.captured_at,
                    metadata: record.metadata.clone(),
                };
                // The metadata thread only stops after every sender is gone
                let _ = sender.send(item);
            }
        }

        let completed = self.completed.fetch_add(1, Ordering::Relaxed) + 1;
        self.events.send(Event::Output(OutputEvent::Progress(OutputProgress {
            completed,
            total: self.total,
            source: record.source_path.clone(),
            destination: destination.clone(),
        })));
        if let Ok(mut planned) = self.planned.lock() {
            planned.push((
                index,
                PlannedCopy {
                    source: record.source_path.clone(),
                    destination,
                    album: record.assigned_album.clone(),
                },
            ));
        }
        Ok(())
    }

    fn worker(
        &self,
        records: &[PhotoRecord],
        jobs: Receiver<CopyJob>,
        metadata: Option<Sender<WriteItem>>,
    ) {
        // Keep draining after cancellation so intake never blocks
        for job in jobs.iter() {
            if self.is_cancelled() {
                continue;
            }
            let Some(record) = records.get(job.index) else {
                continue;
            };
            if let Err(e) = self.process(job, record, metadata.as_ref()) {
                warn!(source = %record.source_path.display(), error = %e, "Output failed, cancelling");
                self.fail(e);
            }
        }
    }
}

/// Totals from the metadata thread
#[derive(Default)]
struct MetadataTotals {
    written: usize,
    failures: Vec<(PathBuf, String)>,
}

fn metadata_stage(
    writer: &mut dyn MetadataWriter,
    items: Receiver<WriteItem>,
    batch_size: usize,
    events: &EventSender,
) -> MetadataTotals {
    let mut totals = MetadataTotals::default();
    let mut batch: Vec<WriteItem> = Vec::with_capacity(batch_size);

    let mut flush = |batch: &mut Vec<WriteItem>, totals: &mut MetadataTotals| {
        if batch.is_empty() {
            return;
        }
        let outcome = flush_batch(writer, batch);
        events.send(Event::Output(OutputEvent::MetadataBatch {
            written: outcome.written,
            failed: outcome.failures.len(),
        }));
        totals.written += outcome.written;
        totals.failures.extend(outcome.failures);
        batch.clear();
    };

    for item in items.iter() {
        if !item.has_writable_metadata() {
            continue;
        }
        batch.push(item);
        if batch.len() >= batch_size {
            flush(&mut batch, &mut totals);
        }
    }
    flush(&mut batch, &mut totals);

    if let Err(e) = writer.close() {
        warn!(error = %e, "Metadata writer did not shut down cleanly");
    }
    totals
}

/// Copy every record into the output tree.
///
/// `writer` is used for metadata unless this is a dry run; pass `None` when
/// metadata writing is unavailable. The first copy error stops the run and
/// is returned once all threads have finished.
pub fn write_output(
    records: &[PhotoRecord],
    config: &OutputConfig,
    writer: Option<&mut dyn MetadataWriter>,
    events: &EventSender,
) -> Result<OutputReport, OutputError> {
    if config.root.as_os_str().is_empty() {
        return Err(OutputError::EmptyOutputRoot);
    }
    let start = Instant::now();
    let workers = config.workers.max(1);
    let batch_size = config.metadata_batch.max(1);

    if !config.dry_run {
        for dir in [config.root.join(LIBRARY_DIR), config.root.join(ALBUMS_DIR)] {
            fs::create_dir_all(&dir).map_err(|source| OutputError::CreateDir { path: dir, source })?;
        }
    }

    events.send(Event::Output(OutputEvent::Started {
        total_records: records.len(),
        dry_run: config.dry_run,
    }));
    info!(
        records = records.len(),
        workers,
        dry_run = config.dry_run,
        root = %config.root.display(),
        "Writing output"
    );

    let stage = CopyStage {
        config,
        cancelled: AtomicBool::new(false),
        first_error: Mutex::new(None),
        completed: AtomicUsize::new(0),
        total: records.len(),
        planned: Mutex::new(Vec::with_capacity(records.len())),
        events,
    };
    let writer = if config.dry_run { None } else { writer };

    let totals = thread::scope(|scope| {
        let (job_tx, job_rx) = bounded::<CopyJob>(workers * 2);

        let (meta_tx, meta_handle) = match writer {
            Some(writer) => {
                let (tx, rx) = bounded::<WriteItem>(workers * 4);
                let handle = scope.spawn(move || metadata_stage(writer, rx, batch_size, events));
                (Some(tx), Some(handle))
            }
            None => (None, None),
        };

        let stage = &stage;
        for _ in 0..workers {
            let jobs = job_rx.clone();
            let metadata = meta_tx.clone();
            scope.spawn(move || stage.worker(records, jobs, metadata));
        }
        drop(job_rx);
        drop(meta_tx);

        let mut names = NameReservations::new();
        for (index, record) in records.iter().enumerate() {
            if stage.is_cancelled() {
                break;
            }
            let destination = match stage.plan_destination(&mut names, record) {
                Ok(destination) => destination,
                Err(e) => {
                    warn!(source = %record.source_path.display(), error = %e, "No free destination name");
                    stage.fail(e);
                    break;
                }
            };
            if job_tx.send(CopyJob { index, destination }).is_err() {
                break;
            }
        }
        drop(job_tx);

        meta_handle.and_then(|handle| handle.join().ok())
    });

    let CopyStage {
        first_error,
        planned,
        ..
    } = stage;
    if let Some(error) = first_error.into_inner().map_err(|_| OutputError::Poisoned)? {
        return Err(error);
    }

    let mut planned = planned.into_inner().map_err(|_| OutputError::Poisoned)?;
    planned.sort_by_key(|(index, _)| *index);
    let planned: Vec<PlannedCopy> = planned.into_iter().map(|(_, copy)| copy).collect();
    let totals = totals.unwrap_or_default();

    let report = OutputReport {
        copied: planned.len(),
        planned,
        metadata_written: totals.written,
        metadata_failures: totals.failures,
        dry_run: config.dry_run,
        duration_ms: start.elapsed().as_millis() as u64,
    };
    events.send(Event::Output(OutputEvent::Completed {
        copied: report.copied,
    }));
    info!(
        copied = report.copied,
        metadata_written = report.metadata_written,
        metadata_failures = report.metadata_failures.len(),
        "Output complete"
    );
    Ok(report)
}

/// Stream `from` into a new file at `to` and flush it to disk
fn copy_file(from: &Path, to: &Path) -> Result<(), OutputError> {
    let wrap = |source: io::Error| OutputError::Copy {
        from: from.to_path_buf(),
        to: to.to_path_buf(),
        source,
    };
    let mut input = File::open(from).map_err(wrap)?;
    let mut output = File::create(to).map_err(wrap)?;
    io::copy(&mut input, &mut output).map_err(wrap)?;
    output.sync_all().map_err(wrap)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::exiftool::PreparedWrite;
    use crate::core::record::{ContentIdentity, SourceFile};
    use crate::error::ToolError;
    use crate::events::null_sender;
    use chrono::Utc;
    use std::sync::Arc;
    use tempfile::TempDir;

    #[derive(Default)]
    struct CountingWriter {
        batches: Arc<Mutex<Vec<usize>>>,
        closed: Arc<AtomicBool>,
    }

    impl MetadataWriter for CountingWriter {
        fn write_batch(&mut self, batch: &[PreparedWrite]) -> Result<(), ToolError> {
            if let Ok(mut batches) = self.batches.lock() {
                batches.push(batch.len());
            }
            Ok(())
        }

        fn write_one(&mut self, _write: &PreparedWrite) -> Result<(), ToolError> {
            Ok(())
        }

        fn close(&mut self) -> Result<(), ToolError> {
            self.closed.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    fn record(dir: &Path, name: &str, content: &[u8], album: Option<&str>) -> PhotoRecord {
        let path = dir.join(name);
        fs::write(&path, content).unwrap();
        let mut record = PhotoRecord::new(
            SourceFile { path, sidecar: None },
            album.map(str::to_string),
            ContentIdentity::hashed(format!("{:0>64}", content.len()), content.len() as u64),
        );
        record.assigned_album = album.map(str::to_string);
        record.captured_at = Some(Utc::now());
        record
    }

    #[test]
    fn copies_into_library_and_albums() {
        let src = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        let records = vec![
            record(src.path(), "a.mov", b"aaaa", Some("Trip")),
            record(src.path(), "b.mov", b"bb", None),
        ];
        let mut config = OutputConfig::new(out.path());
        config.workers = 2;

        let report = write_output(&records, &config, None, &null_sender()).unwrap();

        assert_eq!(report.copied, 2);
        assert_eq!(fs::read(out.path().join("Albums/Trip/a.mov")).unwrap(), b"aaaa");
        assert_eq!(fs::read(out.path().join("Library/b.mov")).unwrap(), b"bb");
        assert_eq!(report.planned[0].album.as_deref(), Some("Trip"));
        assert_eq!(report.planned[1].destination, out.path().join("Library/b.mov"));
    }

    #[test]
    fn dry_run_creates_nothing_and_skips_metadata() {
        let src = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        let root = out.path().join("organized");
        let records = vec![
            record(src.path(), "a.mov", b"aaaa", None),
            record(src.path(), "a.mov", b"aaaa", None),
        ];
        let mut config = OutputConfig::new(&root);
        config.dry_run = true;
        let mut writer = CountingWriter::default();
        let batches = writer.batches.clone();

        let report = write_output(&records, &config, Some(&mut writer), &null_sender()).unwrap();

        assert!(!root.exists());
        assert_eq!(report.copied, 2);
        assert!(report.dry_run);
        let destinations: Vec<_> = report.planned.iter().map(|p| p.destination.clone()).collect();
        assert_eq!(destinations.len(), 2);
        assert_eq!(destinations[0], root.join("Library/a.mov"));
        assert_ne!(destinations[0], destinations[1]);
        assert!(batches.lock().unwrap().is_empty());
    }

    #[test]
    fn colliding_names_resolve_in_record_order_for_any_worker_count() {
        let src = TempDir::new().unwrap();
        let hashes = ["1111aaaa", "2222bbbb", "3333cccc", "4444dddd"];
        let records: Vec<PhotoRecord> = hashes
            .iter()
            .enumerate()
            .map(|(i, hash)| {
                let dir = src.path().join(format!("folder{}", i));
                fs::create_dir_all(&dir).unwrap();
                let mut record = record(&dir, "IMG_0001.jpg", hash.as_bytes(), None);
                record.identity = ContentIdentity::hashed(format!("{:0<64}", hash), 8);
                record
            })
            .collect();
        let expected = ["IMG_0001.jpg", "IMG_0001-2222bbbb.jpg", "IMG_0001-3333cccc.jpg", "IMG_0001-4444dddd.jpg"];

        for _ in 0..50 {
            let out = TempDir::new().unwrap();
            let mut config = OutputConfig::new(out.path());
            config.workers = 4;
            config.dry_run = true;

            let report = write_output(&records, &config, None, &null_sender()).unwrap();

            let names: Vec<_> = report
                .planned
                .iter()
                .map(|p| p.destination.file_name().unwrap().to_string_lossy().into_owned())
                .collect();
            assert_eq!(names, expected);
        }

        let out = TempDir::new().unwrap();
        let mut config = OutputConfig::new(out.path());
        config.workers = 4;
        write_output(&records, &config, None, &null_sender()).unwrap();
        for (name, hash) in expected.iter().zip(hashes) {
            assert_eq!(fs::read(out.path().join("Library").join(name)).unwrap(), hash.as_bytes());
        }
    }

    #[test]
    fn metadata_is_batched_and_writer_closed() {
        let src = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        let records: Vec<PhotoRecord> = (0..5)
            .map(|i| record(src.path(), &format!("clip{}.mov", i), format!("content-{}", i).as_bytes(), None))
            .collect();
        let mut config = OutputConfig::new(out.path());
        config.metadata_batch = 2;
        let mut writer = CountingWriter::default();
        let batches = writer.batches.clone();
        let closed = writer.closed.clone();

        let report = write_output(&records, &config, Some(&mut writer), &null_sender()).unwrap();

        assert_eq!(report.metadata_written, 5);
        let batches = batches.lock().unwrap();
        assert_eq!(batches.iter().sum::<usize>(), 5);
        assert!(batches.iter().all(|len| *len <= 2));
        assert!(closed.load(Ordering::SeqCst));
    }

    #[test]
    fn missing_source_fails_the_run() {
        let src = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        let mut gone = record(src.path(), "gone.mov", b"x", None);
        fs::remove_file(&gone.source_path).unwrap();
        gone.captured_at = None;

        let result = write_output(&[gone], &OutputConfig::new(out.path()), None, &null_sender());

        assert!(matches!(result, Err(OutputError::Copy { .. })));
    }

    #[test]
    fn empty_root_is_rejected() {
        let result = write_output(&[], &OutputConfig::new(""), None, &null_sender());
        assert!(matches!(result, Err(OutputError::EmptyOutputRoot)));
    }
}
