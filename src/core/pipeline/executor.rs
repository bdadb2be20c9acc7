//! Organizer execution implementation.

use crate::core::albums::{album_summary, assign_albums, list_distinct_albums, select_albums};
use crate::core::cache::{CacheBackend, JsonHashCache};
use crate::core::dates::{
    apply_proposals, reader_for, review_dates, DateEngine, EmbeddedDateReader, ExclusionStore,
    FilenameDater, PatternStore, ReviewSummary,
};
use crate::core::dedup::{build_registry, merge_identical, records_from_scan, RegistryStats};
use crate::core::exiftool::{ExifToolWriter, MetadataWriter, ToolCapability};
use crate::core::hasher::{ContentHasher, Sha256Hasher};
use crate::core::output::{write_output, OutputConfig, OutputReport};
use crate::core::prompt::Prompt;
use crate::core::record::PhotoRecord;
use crate::core::scanner::{ScanConfig, TakeoutScanner};
use crate::error::{OrganizerError, Result};
use crate::events::{Event, EventSender, PipelineEvent, PipelinePhase, PipelineSummary};
use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// Folder under the source root that holds the hash cache
pub const STATE_DIR_NAME: &str = ".takeout-organizer";
const HASH_CACHE_FILE: &str = "hash_cache.json";
const PATTERN_STORE_FILE: &str = "date_patterns.json";
const EXCLUSION_STORE_FILE: &str = "date_exclusions.json";
const CONFIG_DIR_NAME: &str = "takeout-organizer";

/// Configuration for the organizer
#[derive(Debug, Clone)]
pub struct OrganizerConfig {
    /// Root of the exported archive
    pub source: PathBuf,
    /// Root of the organized tree (not needed in dates-only mode)
    pub output: Option<PathBuf>,
    /// Decide everything but write nothing
    pub dry_run: bool,
    /// Analyze and review dates only, then stop
    pub dates_only: bool,
    /// Copy worker threads
    pub workers: usize,
    /// Files per metadata write
    pub metadata_batch: usize,
    /// Media extensions to keep (None = all media)
    pub only_extensions: Option<HashSet<String>>,
    /// Include hidden files and directories
    pub include_hidden: bool,
    /// Explicit hash cache location
    pub hash_cache_path: Option<PathBuf>,
    /// Folder for the pattern and exclusion stores
    pub state_dir: Option<PathBuf>,
    /// What is known about exiftool
    pub tool: ToolCapability,
}

impl Default for OrganizerConfig {
    fn default() -> Self {
        Self {
            source: PathBuf::new(),
            output: None,
            dry_run: false,
            dates_only: false,
            workers: 4,
            metadata_batch: 25,
            only_extensions: None,
            include_hidden: false,
            hash_cache_path: None,
            state_dir: None,
            tool: ToolCapability::absent(),
        }
    }
}

impl OrganizerConfig {
    /// Hash cache file, `<source>/.takeout-organizer/hash_cache.json` unless set
    pub fn hash_cache_path(&self) -> PathBuf {
        self.hash_cache_path
            .clone()
            .unwrap_or_else(|| self.source.join(STATE_DIR_NAME).join(HASH_CACHE_FILE))
    }

    /// Folder for the date stores, `<config dir>/takeout-organizer` unless set
    pub fn state_dir(&self) -> Option<PathBuf> {
        self.state_dir
            .clone()
            .or_else(|| dirs::config_dir().map(|dir| dir.join(CONFIG_DIR_NAME)))
    }
}

/// Result of an organizer run
#[derive(Debug, Default)]
pub struct OrganizerReport {
    /// Media files the scan kept
    pub media_files: usize,
    /// Non-fatal scan errors
    pub scan_errors: Vec<String>,
    /// Registry counters (absent in dates-only mode)
    pub registry: Option<RegistryStats>,
    /// Date tiers as accepted at the review gate
    pub dates: ReviewSummary,
    pub patterns_added: usize,
    pub exclusions_added: usize,
    /// Album priority list chosen by the operator
    pub selected_albums: Vec<String>,
    /// Record count per destination
    pub albums: BTreeMap<String, usize>,
    /// Final records in output order
    pub records: Vec<PhotoRecord>,
    /// Output results (absent in dates-only mode)
    pub output: Option<OutputReport>,
    pub dates_only: bool,
    pub duration_ms: u64,
}

/// Builder for the organizer
pub struct OrganizerBuilder {
    config: OrganizerConfig,
    cache: Option<Box<dyn CacheBackend>>,
    hasher: Option<Box<dyn ContentHasher>>,
    embedded: Option<Arc<dyn EmbeddedDateReader>>,
    writer: Option<Box<dyn MetadataWriter>>,
}

impl OrganizerBuilder {
    /// Create a new organizer builder
    pub fn new() -> Self {
        Self {
            config: OrganizerConfig::default(),
            cache: None,
            hasher: None,
            embedded: None,
            writer: None,
        }
    }

    /// Set the export root
    pub fn source(mut self, source: impl Into<PathBuf>) -> Self {
        self.config.source = source.into();
        self
    }

    /// Set the output root
    pub fn output(mut self, output: impl Into<PathBuf>) -> Self {
        self.config.output = Some(output.into());
        self
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.config.dry_run = dry_run;
        self
    }

    pub fn dates_only(mut self, dates_only: bool) -> Self {
        self.config.dates_only = dates_only;
        self
    }

    /// Set the number of copy workers
    pub fn workers(mut self, workers: usize) -> Self {
        self.config.workers = workers.max(1);
        self
    }

    /// Set the metadata batch size
    pub fn metadata_batch(mut self, size: usize) -> Self {
        self.config.metadata_batch = size.max(1);
        self
    }

    /// Restrict media to these extensions
    pub fn only_extensions(mut self, extensions: Option<HashSet<String>>) -> Self {
        self.config.only_extensions = extensions;
        self
    }

    /// Include hidden files
    pub fn include_hidden(mut self, include: bool) -> Self {
        self.config.include_hidden = include;
        self
    }

    pub fn hash_cache_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.hash_cache_path = Some(path.into());
        self
    }

    pub fn state_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.state_dir = Some(dir.into());
        self
    }

    /// Set what is known about exiftool
    pub fn tool(mut self, tool: ToolCapability) -> Self {
        self.config.tool = tool;
        self
    }

    /// Set the cache backend
    pub fn cache(mut self, cache: Box<dyn CacheBackend>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Set the content hasher
    pub fn hasher(mut self, hasher: Box<dyn ContentHasher>) -> Self {
        self.hasher = Some(hasher);
        self
    }

    /// Set the embedded date reader
    pub fn embedded_reader(mut self, reader: Arc<dyn EmbeddedDateReader>) -> Self {
        self.embedded = Some(reader);
        self
    }

    /// Set the metadata writer
    pub fn metadata_writer(mut self, writer: Box<dyn MetadataWriter>) -> Self {
        self.writer = Some(writer);
        self
    }

    /// Use a complete configuration
    pub fn config(mut self, config: OrganizerConfig) -> Self {
        self.config = config;
        self
    }

    /// Build the organizer
    pub fn build(self) -> Organizer {
        let config = self.config;
        let cache = self
            .cache
            .unwrap_or_else(|| Box::new(JsonHashCache::open(config.hash_cache_path())));
        let hasher = self.hasher.unwrap_or_else(|| Box::new(Sha256Hasher::new()));
        let embedded = self
            .embedded
            .unwrap_or_else(|| Arc::from(reader_for(&config.tool)));
        let writer = self.writer.or_else(|| {
            config
                .tool
                .available
                .then(|| Box::new(ExifToolWriter::new(config.tool.clone())) as Box<dyn MetadataWriter>)
        });
        Organizer {
            config,
            cache,
            hasher,
            embedded,
            writer,
        }
    }
}

impl Default for OrganizerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// The scan, dedup, date, album and output workflow
pub struct Organizer {
    config: OrganizerConfig,
    cache: Box<dyn CacheBackend>,
    hasher: Box<dyn ContentHasher>,
    embedded: Arc<dyn EmbeddedDateReader>,
    writer: Option<Box<dyn MetadataWriter>>,
}

impl Organizer {
    /// Create a new organizer builder
    pub fn builder() -> OrganizerBuilder {
        OrganizerBuilder::new()
    }

    pub fn config(&self) -> &OrganizerConfig {
        &self.config
    }

    /// Run the whole workflow, asking `prompt` where the operator decides
    pub fn run(&mut self, prompt: &mut dyn Prompt, events: &EventSender) -> Result<OrganizerReport> {
        let start_time = Instant::now();
        events.send(Event::Pipeline(PipelineEvent::Started));

        let result = self.run_phases(prompt, events, start_time);
        if let Err(e) = &result {
            events.send(Event::Pipeline(PipelineEvent::Error {
                message: e.to_string(),
            }));
        }
        result
    }

    fn run_phases(
        &mut self,
        prompt: &mut dyn Prompt,
        events: &EventSender,
        start_time: Instant,
    ) -> Result<OrganizerReport> {
        let output_root = match (&self.config.output, self.config.dates_only) {
            (Some(root), _) => Some(root.clone()),
            (None, true) => None,
            (None, false) => {
                return Err(OrganizerError::Config(
                    "an output directory is required unless running dates-only".to_string(),
                ))
            }
        };

        // Phase 1: Scan
        phase(events, PipelinePhase::Scanning);
        let scanner = TakeoutScanner::new(ScanConfig {
            follow_symlinks: false,
            include_hidden: self.config.include_hidden,
            only_extensions: self.config.only_extensions.clone(),
        });
        let scan = scanner.scan_with_events(&self.config.source, events)?;
        let scan_errors: Vec<String> = scan.errors.iter().map(|e| e.to_string()).collect();
        info!(
            media = scan.pairs.len(),
            with_sidecar = scan.with_sidecar(),
            with_album = scan.with_album(),
            errors = scan_errors.len(),
            "Scan complete"
        );

        if scan.pairs.is_empty() {
            warn!(source = %self.config.source.display(), "No media files found");
            let report = OrganizerReport {
                scan_errors,
                dates_only: self.config.dates_only,
                ..OrganizerReport::default()
            };
            return Ok(self.finish(report, events, start_time));
        }

        let (mut patterns, mut exclusions) = self.open_stores()?;
        let mut engine = DateEngine::new(
            FilenameDater::new(patterns.patterns(), exclusions.set().clone()),
            Arc::clone(&self.embedded),
        );

        let mut report = OrganizerReport {
            media_files: scan.pairs.len(),
            scan_errors,
            dates_only: self.config.dates_only,
            ..OrganizerReport::default()
        };

        if self.config.dates_only {
            phase(events, PipelinePhase::ResolvingDates);
            let mut records = records_from_scan(&scan.pairs);
            let outcome = review_dates(
                &mut engine,
                &records,
                &mut patterns,
                &mut exclusions,
                prompt,
                events,
            )?;
            report.dates = outcome.summary;
            report.patterns_added = outcome.patterns_added;
            report.exclusions_added = outcome.exclusions_added;
            apply_proposals(&mut records, outcome.proposals);
            report.records = records;
            return Ok(self.finish(report, events, start_time));
        }

        // Phase 2: Hash and fold identical content
        phase(events, PipelinePhase::Hashing);
        let registry = build_registry(
            &scan.pairs,
            self.cache.as_ref(),
            self.hasher.as_ref(),
            events,
        );
        report.registry = Some(registry.stats());
        let mut records = registry.into_records();

        // Phase 3: Dates, confirmed by the operator
        phase(events, PipelinePhase::ResolvingDates);
        let outcome = review_dates(
            &mut engine,
            &records,
            &mut patterns,
            &mut exclusions,
            prompt,
            events,
        )?;
        report.dates = outcome.summary;
        report.patterns_added = outcome.patterns_added;
        report.exclusions_added = outcome.exclusions_added;
        apply_proposals(&mut records, outcome.proposals);

        // Phase 4: Merge records whose representatives now share content
        phase(events, PipelinePhase::Merging);
        let records = merge_identical(records, self.hasher.as_ref());

        // Phase 5: Albums
        phase(events, PipelinePhase::AssigningAlbums);
        let mut records = records;
        let albums = list_distinct_albums(&records);
        let selected = select_albums(prompt, &albums)?;
        assign_albums(&mut records, &selected);
        report.selected_albums = selected;
        report.albums = album_summary(&records);

        // Phase 6: Output
        phase(events, PipelinePhase::Writing);
        let Some(root) = output_root else {
            return Err(OrganizerError::Config("missing output directory".to_string()));
        };
        let output_config = OutputConfig {
            root,
            dry_run: self.config.dry_run,
            workers: self.config.workers,
            metadata_batch: self.config.metadata_batch,
        };
        let writer: Option<&mut dyn MetadataWriter> = if self.config.dry_run {
            None
        } else {
            match self.writer.as_deref_mut() {
                Some(writer) => Some(writer),
                None => {
                    warn!("exiftool not found; copies will not carry recovered metadata");
                    None
                }
            }
        };
        report.output = Some(write_output(&records, &output_config, writer, events)?);
        report.records = records;

        Ok(self.finish(report, events, start_time))
    }

    /// Load the pattern and exclusion stores, falling back to memory when
    /// no state folder can be determined
    fn open_stores(&self) -> Result<(PatternStore, ExclusionStore)> {
        match self.config.state_dir() {
            Some(dir) => Ok((
                PatternStore::load(dir.join(PATTERN_STORE_FILE))?,
                ExclusionStore::load(dir.join(EXCLUSION_STORE_FILE))?,
            )),
            None => {
                warn!("no configuration folder available; custom date patterns will not be saved");
                Ok((
                    PatternStore::in_memory(Vec::new()),
                    ExclusionStore::in_memory(Default::default()),
                ))
            }
        }
    }

    fn finish(
        &self,
        mut report: OrganizerReport,
        events: &EventSender,
        start_time: Instant,
    ) -> OrganizerReport {
        report.duration_ms = start_time.elapsed().as_millis() as u64;
        let summary = PipelineSummary {
            media_files: report.media_files,
            unique_records: report.records.len(),
            in_albums: report
                .records
                .iter()
                .filter(|r| r.assigned_album.is_some())
                .count(),
            copied: report.output.as_ref().map_or(0, |o| o.copied),
            duration_ms: report.duration_ms,
        };
        info!(
            media = summary.media_files,
            records = summary.unique_records,
            in_albums = summary.in_albums,
            copied = summary.copied,
            duration_ms = summary.duration_ms,
            "Organizer finished"
        );
        events.send(Event::Pipeline(PipelineEvent::Completed { summary }));
        report
    }
}

fn phase(events: &EventSender, phase: PipelinePhase) {
    info!(%phase, "Phase");
    events.send(Event::Pipeline(PipelineEvent::PhaseChanged { phase }));
}
