//! # Dates Module
//!
//! Decides a capture date for every record.
//!
//! ## Sources
//! Three sources are consulted per source file, best first:
//! 1. the sidecar document (`photoTakenTime`, else `creationTime`)
//! 2. the file name, via operator patterns and built-in conventions
//! 3. tags embedded in the file, read only when 1 and 2 found nothing
//!
//! ## Precedence
//! A sidecar date wins unless the file name carries a date that is strictly
//! earlier and plausible (year between 1990 and next year). Exports often
//! stamp the upload time into the sidecar, while the camera wrote the real
//! capture time into the name.
//!
//! ## Review
//! Unresolved records can be cleared interactively with new filename
//! patterns; see [`review`].

mod embedded;
mod patterns;
pub mod review;
mod store;

pub use embedded::{
    reader_for, EmbeddedDateReader, ExifToolDateReader, NativeExifReader, NoEmbeddedDates,
};
pub use patterns::{
    builtin_rules, parse_with_layout, CustomDatePattern, DateRule, FilenameDater, LAYOUT_UNIX,
    LAYOUT_UNIX_MILLIS,
};
pub use review::{fingerprint, review_dates, ReviewOutcome, ReviewState, ReviewSummary};
pub use store::{ExclusionSet, ExclusionStore, PatternStore};

use crate::core::dedup::choose_representative;
use crate::core::record::{DateConfidence, DescriptiveMetadata, PhotoRecord, SourceFile};
use crate::core::sidecar::SidecarDocument;
use crate::events::{DateEvent, Event, EventSender};
use chrono::{DateTime, Datelike, Utc};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Earliest year a filename date may have to override a sidecar
const MIN_PLAUSIBLE_YEAR: i32 = 1990;

/// Chosen capture time and how much it can be trusted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DateResolution {
    pub captured_at: Option<DateTime<Utc>>,
    pub confidence: DateConfidence,
}

impl DateResolution {
    pub fn unknown() -> Self {
        Self::default()
    }

    pub fn is_unknown(&self) -> bool {
        self.confidence == DateConfidence::Unknown
    }
}

/// Apply the precedence rule to the dates found for one file
pub fn resolve(
    sidecar: Option<DateTime<Utc>>,
    filename: Option<DateTime<Utc>>,
    embedded: Option<DateTime<Utc>>,
) -> DateResolution {
    let chosen = match (sidecar, filename) {
        (Some(side), Some(name)) if name < side && is_plausible(name) => {
            Some((name, DateConfidence::Filename))
        }
        (Some(side), _) => Some((side, DateConfidence::Sidecar)),
        (None, Some(name)) => Some((name, DateConfidence::Filename)),
        (None, None) => embedded.map(|at| (at, DateConfidence::Embedded)),
    };
    match chosen {
        Some((at, confidence)) => DateResolution {
            captured_at: Some(at),
            confidence,
        },
        None => DateResolution::unknown(),
    }
}

/// Year within [1990, current year + 1]
pub fn is_plausible(at: DateTime<Utc>) -> bool {
    let year = at.year();
    year >= MIN_PLAUSIBLE_YEAR && year <= Utc::now().year() + 1
}

/// Everything learned about one source file
#[derive(Debug, Clone, PartialEq)]
pub struct SourceDates {
    pub path: PathBuf,
    pub sidecar_path: Option<PathBuf>,
    pub sidecar_time: Option<DateTime<Utc>>,
    pub filename_time: Option<DateTime<Utc>>,
    pub embedded_time: Option<DateTime<Utc>>,
    pub resolution: DateResolution,
    pub metadata: DescriptiveMetadata,
}

impl SourceDates {
    /// The file name overrode a sidecar date
    pub fn is_override(&self) -> bool {
        self.resolution.confidence == DateConfidence::Filename && self.sidecar_time.is_some()
    }
}

/// Proposed date for the record at `index`
#[derive(Debug, Clone, PartialEq)]
pub struct DateProposal {
    pub index: usize,
    /// The source file whose dates won
    pub chosen: SourceDates,
}

impl DateProposal {
    pub fn resolution(&self) -> DateResolution {
        self.chosen.resolution
    }

    pub fn is_unknown(&self) -> bool {
        self.chosen.resolution.is_unknown()
    }
}

/// Evaluates date sources for records
pub struct DateEngine {
    dater: FilenameDater,
    embedded: Arc<dyn EmbeddedDateReader>,
}

impl DateEngine {
    pub fn new(dater: FilenameDater, embedded: Arc<dyn EmbeddedDateReader>) -> Self {
        Self { dater, embedded }
    }

    /// Replace the filename rules, e.g. after a new pattern was accepted
    pub fn set_dater(&mut self, dater: FilenameDater) {
        self.dater = dater;
    }

    pub fn dater(&self) -> &FilenameDater {
        &self.dater
    }

    /// Consult every source for one file
    pub fn evaluate(&self, source: &SourceFile) -> SourceDates {
        let document = source.sidecar.as_deref().and_then(|path| {
            SidecarDocument::load(path)
                .map_err(|e| warn!(path = %path.display(), error = %e, "Ignoring unreadable sidecar"))
                .ok()
        });
        let sidecar_time = document.as_ref().and_then(SidecarDocument::taken_time);
        let filename_time = self.dater.date_for(&source.path);
        let embedded_time = if sidecar_time.is_none() && filename_time.is_none() {
            self.embedded.read_date(&source.path)
        } else {
            None
        };

        SourceDates {
            path: source.path.clone(),
            sidecar_path: source.sidecar.clone(),
            sidecar_time,
            filename_time,
            embedded_time,
            resolution: resolve(sidecar_time, filename_time, embedded_time),
            metadata: document.map(|d| d.metadata).unwrap_or_default(),
        }
    }

    /// Best source of one record: best tier, then shortest path, then path order
    pub fn evaluate_record(&self, record: &PhotoRecord) -> SourceDates {
        let mut candidates: Vec<SourceDates> =
            record.sources().iter().map(|s| self.evaluate(s)).collect();
        let best = choose_representative(
            candidates
                .iter()
                .map(|c| (c.resolution.confidence, c.path.as_path())),
        )
        .unwrap_or(0);
        candidates.swap_remove(best)
    }

    /// Evaluate every record in parallel. Proposals keep record order.
    pub fn propose(&self, records: &[PhotoRecord], events: &EventSender) -> Vec<DateProposal> {
        let total = records.len();
        events.send(Event::Dates(DateEvent::Started {
            total_records: total,
        }));
        let completed = AtomicUsize::new(0);

        let proposals: Vec<DateProposal> = records
            .par_iter()
            .enumerate()
            .map(|(index, record)| {
                let chosen = self.evaluate_record(record);
                let done = completed.fetch_add(1, Ordering::Relaxed) + 1;
                events.send(Event::Dates(DateEvent::Progress {
                    completed: done,
                    total,
                }));
                DateProposal { index, chosen }
            })
            .collect();

        let unknown = proposals.iter().filter(|p| p.is_unknown()).count();
        info!(
            records = total,
            resolved = total - unknown,
            unknown,
            embedded_reader = self.embedded.name(),
            "Date proposals ready"
        );
        events.send(Event::Dates(DateEvent::Completed {
            resolved: total - unknown,
            unknown,
        }));
        proposals
    }
}

/// Write accepted proposals into their records.
///
/// The winning source becomes the representative so its sidecar is the one
/// carried forward.
pub fn apply_proposals(records: &mut [PhotoRecord], proposals: Vec<DateProposal>) {
    for proposal in proposals {
        let Some(record) = records.get_mut(proposal.index) else {
            continue;
        };
        let chosen = proposal.chosen;
        if record.source_path != chosen.path {
            debug!(
                from = %record.source_path.display(),
                to = %chosen.path.display(),
                "Promoting better-dated source"
            );
            record.promote(&chosen.path);
        }
        record.captured_at = chosen.resolution.captured_at;
        record.date_confidence = chosen.resolution.confidence;
        record.metadata = chosen.metadata;
    }
}

/// Base name shown to the operator for a proposal
pub(crate) fn display_name(path: &Path) -> &str {
    crate::core::record::file_name_of(path)
}
