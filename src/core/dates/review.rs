//! Operator review of date proposals.
//!
//! While records remain without a date the operator may teach the engine a
//! new filename pattern. Each accepted pattern (and any files excluded from
//! it) is persisted and the proposals are recomputed. The loop ends when
//! nothing is unknown or the operator submits a blank regex; a summary and
//! an explicit `APPLY` confirmation follow.

use super::{
    display_name, CustomDatePattern, DateEngine, DateProposal, DateRule, ExclusionStore,
    FilenameDater, PatternStore,
};
use crate::core::prompt::Prompt;
use crate::core::record::{DateConfidence, PhotoRecord};
use crate::error::{DateError, Result};
use crate::events::EventSender;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tracing::info;

/// Clusters listed per review round
const GROUP_LIMIT: usize = 50;
/// Example names shown per cluster
const GROUP_EXAMPLES: usize = 3;

/// Where the review loop currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewState {
    /// Computing proposals with the current rules
    Resolving,
    /// Showing unresolved files to the operator
    Reviewing,
    /// Waiting for a regex and layout
    AwaitingPattern,
    /// A pattern was accepted; rebuild the rules
    Reapplying,
    Done,
}

/// Counts shown before the confirmation gate
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReviewSummary {
    pub sidecar: usize,
    /// Filename dates that replaced a later sidecar date
    pub overrides: usize,
    pub filename_only: usize,
    pub embedded_only: usize,
    pub unknown: usize,
}

impl ReviewSummary {
    pub fn from_proposals(proposals: &[DateProposal]) -> Self {
        let mut summary = ReviewSummary::default();
        for proposal in proposals {
            match proposal.chosen.resolution.confidence {
                DateConfidence::Sidecar => summary.sidecar += 1,
                DateConfidence::Filename if proposal.chosen.is_override() => summary.overrides += 1,
                DateConfidence::Filename => summary.filename_only += 1,
                DateConfidence::Embedded => summary.embedded_only += 1,
                DateConfidence::Unknown => summary.unknown += 1,
            }
        }
        summary
    }
}

/// Confirmed result of a review
#[derive(Debug, Clone)]
pub struct ReviewOutcome {
    pub proposals: Vec<DateProposal>,
    pub summary: ReviewSummary,
    pub patterns_added: usize,
    pub exclusions_added: usize,
}

/// Collapse a file name to its shape: digit runs become `#`, separators
/// become `_`, letters are lowercased.
pub fn fingerprint(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut last_was_digit = false;
    for c in name.chars() {
        if c.is_ascii_digit() {
            if !last_was_digit {
                out.push('#');
                last_was_digit = true;
            }
            continue;
        }
        last_was_digit = false;
        match c {
            ' ' | '-' | '_' | '.' => out.push('_'),
            _ => out.extend(c.to_lowercase()),
        }
    }
    out
}

struct NameGroup {
    key: String,
    count: usize,
    examples: Vec<String>,
}

fn group_names<'a, I>(names: I) -> Vec<NameGroup>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut groups: Vec<NameGroup> = Vec::new();
    let mut by_key: HashMap<String, usize> = HashMap::new();
    for name in names {
        let key = fingerprint(name);
        let slot = *by_key.entry(key.clone()).or_insert_with(|| {
            groups.push(NameGroup {
                key,
                count: 0,
                examples: Vec::new(),
            });
            groups.len() - 1
        });
        let group = &mut groups[slot];
        group.count += 1;
        if group.examples.len() < GROUP_EXAMPLES {
            group.examples.push(name.to_string());
        }
    }
    groups.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.key.cmp(&b.key)));
    groups
}

struct PreviewEntry {
    name: String,
    date: DateTime<Utc>,
}

struct Preview {
    matched: usize,
    entries: Vec<PreviewEntry>,
}

fn preview(rule: &DateRule, names: &[&str]) -> Preview {
    let mut matched = 0;
    let mut entries = Vec::new();
    for name in names {
        let Some(value) = rule.extract(name) else {
            continue;
        };
        matched += 1;
        if let Some(date) = super::parse_with_layout(rule.layout(), value) {
            entries.push(PreviewEntry {
                name: name.to_string(),
                date,
            });
        }
    }
    Preview { matched, entries }
}

/// Parse `exclude 1,3` style input. Out-of-range numbers are ignored.
pub(crate) fn parse_index_list(input: &str, max: usize) -> std::result::Result<Vec<usize>, String> {
    let body = input.replace("exclude", "");
    let mut indices = Vec::new();
    for part in body.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        let n: usize = part.parse().map_err(|_| format!("{:?} is not a number", part))?;
        if (1..=max).contains(&n) && !indices.contains(&n) {
            indices.push(n);
        }
    }
    Ok(indices)
}

struct AcceptedPattern {
    pattern: CustomDatePattern,
    excluded: Vec<String>,
}

fn show_groups(prompt: &mut dyn Prompt, unknown_names: &[&str], patterns: &PatternStore) {
    prompt.show(&format!(
        "{} files have no usable date. You can add custom date patterns.",
        unknown_names.len()
    ));
    if let Some(path) = patterns.path() {
        prompt.show(&format!("Patterns will be saved to {}", path.display()));
    }
    prompt.show("Unknown file groups (by name pattern):");
    let groups = group_names(unknown_names.iter().copied());
    for group in groups.iter().take(GROUP_LIMIT) {
        prompt.show(&format!("  {} ({} files)", group.key, group.count));
        for example in &group.examples {
            prompt.show(&format!("    {}", example));
        }
    }
    if groups.len() > GROUP_LIMIT {
        prompt.show(&format!("  ... {} more groups", groups.len() - GROUP_LIMIT));
    }
    prompt.show("Enter a regex that matches only the date portion.");
    prompt.show("If it has a capture group, group 1 is parsed as the date.");
    prompt.show(r"Example regex: (?:20|19)\d{2}[01]\d[0-3]\d_\d{6}");
    prompt.show("Layouts use strftime syntax (example: %Y%m%d_%H%M%S).");
    prompt.show("Special layouts: UNIX (seconds), UNIXMS (milliseconds).");
}

/// Ask until the operator accepts a pattern or gives up with a blank regex
fn await_pattern(
    prompt: &mut dyn Prompt,
    unknown_names: &[&str],
) -> Result<Option<AcceptedPattern>> {
    loop {
        let regex = prompt.ask("Date regex (blank to stop)")?;
        if regex.trim().is_empty() {
            return Ok(None);
        }
        let layout = prompt.ask("Time layout for regex match (example: %Y%m%d_%H%M%S)")?;
        if layout.trim().is_empty() {
            prompt.show("Layout is required.");
            continue;
        }
        let rule = match DateRule::new(&regex, &layout) {
            Ok(rule) => rule,
            Err(DateError::InvalidPattern { reason, .. }) => {
                prompt.show(&format!("Invalid regex: {}", reason));
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        let preview = preview(&rule, unknown_names);
        prompt.show(&format!(
            "Pattern matched {} files, parsed {} dates.",
            preview.matched,
            preview.entries.len()
        ));
        if !preview.entries.is_empty() {
            prompt.show("Preview of parsed dates:");
            for (idx, entry) in preview.entries.iter().enumerate() {
                prompt.show(&format!(
                    "  {}. {} -> {}",
                    idx + 1,
                    entry.name,
                    entry.date.to_rfc3339()
                ));
            }
        }
        if (preview.matched == 0 || preview.entries.is_empty())
            && !prompt.confirm("Keep this pattern anyway", false)?
        {
            continue;
        }

        let excluded = loop {
            let decision = prompt.ask("Accept? all / none / exclude 1,2,3")?.to_lowercase();
            match decision.trim() {
                "none" => break None,
                "" | "all" => break Some(Vec::new()),
                other => match parse_index_list(other, preview.entries.len()) {
                    Ok(indices) => {
                        break Some(
                            indices
                                .into_iter()
                                .map(|i| preview.entries[i - 1].name.clone())
                                .collect(),
                        )
                    }
                    Err(reason) => prompt.show(&format!("Invalid exclude list: {}", reason)),
                },
            }
        };
        let Some(excluded) = excluded else {
            continue;
        };

        return Ok(Some(AcceptedPattern {
            pattern: CustomDatePattern::new(regex.trim(), layout.trim()),
            excluded,
        }));
    }
}

fn show_summary(prompt: &mut dyn Prompt, proposals: &[DateProposal], summary: &ReviewSummary) {
    prompt.show("Date review:");
    prompt.show(&format!("Sidecar dates: {}", summary.sidecar));
    prompt.show(&format!(
        "Overrides (filename older than sidecar): {}",
        summary.overrides
    ));
    let overrides = proposals.iter().filter(|p| p.chosen.is_override());
    for (idx, proposal) in overrides.enumerate() {
        let chosen = &proposal.chosen;
        prompt.show(&format!("{}. {}", idx + 1, chosen.path.display()));
        if let (Some(side), Some(name)) = (chosen.sidecar_time, chosen.filename_time) {
            prompt.show(&format!(
                "   Sidecar: {}  Filename: {}",
                side.to_rfc3339(),
                name.to_rfc3339()
            ));
        }
    }
    prompt.show(&format!("Filename-only dates: {}", summary.filename_only));
    prompt.show(&format!("Embedded-only dates: {}", summary.embedded_only));
    prompt.show(&format!("Unknown dates: {}", summary.unknown));
}

/// Run the review loop and the confirmation gate.
///
/// On confirmation the final proposals are returned for the caller to
/// apply. Anything other than `APPLY` yields [`DateError::NotConfirmed`].
pub fn review_dates(
    engine: &mut DateEngine,
    records: &[PhotoRecord],
    patterns: &mut PatternStore,
    exclusions: &mut ExclusionStore,
    prompt: &mut dyn Prompt,
    events: &EventSender,
) -> Result<ReviewOutcome> {
    let mut state = ReviewState::Resolving;
    let mut proposals: Vec<DateProposal> = Vec::new();
    let mut patterns_added = 0;
    let mut exclusions_added = 0;

    while state != ReviewState::Done {
        state = match state {
            ReviewState::Resolving => {
                proposals = engine.propose(records, events);
                if proposals.iter().any(DateProposal::is_unknown) {
                    ReviewState::Reviewing
                } else {
                    ReviewState::Done
                }
            }
            ReviewState::Reviewing => {
                let names = unknown_names(&proposals);
                show_groups(prompt, &names, patterns);
                ReviewState::AwaitingPattern
            }
            ReviewState::AwaitingPattern => {
                let names = unknown_names(&proposals);
                match await_pattern(prompt, &names)? {
                    Some(accepted) => {
                        if !accepted.excluded.is_empty() {
                            let before = exclusions.set().len();
                            exclusions.extend(accepted.excluded)?;
                            exclusions_added += exclusions.set().len() - before;
                        }
                        info!(regex = %accepted.pattern.regex, layout = %accepted.pattern.layout, "Adding date pattern");
                        patterns.push(accepted.pattern)?;
                        patterns_added += 1;
                        ReviewState::Reapplying
                    }
                    None => ReviewState::Done,
                }
            }
            ReviewState::Reapplying => {
                engine.set_dater(FilenameDater::new(
                    patterns.patterns(),
                    exclusions.set().clone(),
                ));
                ReviewState::Resolving
            }
            ReviewState::Done => ReviewState::Done,
        };
    }

    let summary = ReviewSummary::from_proposals(&proposals);
    show_summary(prompt, &proposals, &summary);

    prompt.show("Review is required before applying date changes.");
    prompt.show("Type APPLY to continue, or anything else to cancel.");
    let answer = prompt.ask("Confirmation")?;
    if !answer.trim().eq_ignore_ascii_case("APPLY") {
        return Err(DateError::NotConfirmed.into());
    }

    Ok(ReviewOutcome {
        proposals,
        summary,
        patterns_added,
        exclusions_added,
    })
}

fn unknown_names(proposals: &[DateProposal]) -> Vec<&str> {
    proposals
        .iter()
        .filter(|p| p.is_unknown())
        .map(|p| display_name(&p.chosen.path))
        .collect()
}
