//! # Albums Module
//!
//! Every record ends up in at most one album folder.
//!
//! Content can appear in several albums of the export. The operator ranks
//! the albums they care about; each record goes to the first ranked album
//! it belongs to, and everything else goes to the library.

use crate::core::prompt::Prompt;
use crate::core::record::PhotoRecord;
use crate::error::{AlbumError, PromptError};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use tracing::{debug, info};

/// Label used for records without an album
pub const LIBRARY_LABEL: &str = "(library)";

/// Every album any record belongs to, sorted
pub fn list_distinct_albums(records: &[PhotoRecord]) -> Vec<String> {
    let albums: BTreeSet<&String> = records.iter().flat_map(|r| r.albums.iter()).collect();
    albums.into_iter().cloned().collect()
}

/// Parse an album priority list.
///
/// Blank selects nothing and `all` selects every album. Otherwise the input
/// is a comma separated list of 1-based indices or album names (any case).
/// Repeats are dropped; order is kept.
pub fn parse_selection(input: &str, albums: &[String]) -> Result<Vec<String>, AlbumError> {
    let input = input.trim();
    if input.is_empty() {
        return Ok(Vec::new());
    }
    if input.eq_ignore_ascii_case("all") {
        return Ok(albums.to_vec());
    }

    let mut selected: Vec<String> = Vec::new();
    let mut seen: HashSet<&str> = HashSet::new();
    for item in input.split(',').map(str::trim).filter(|i| !i.is_empty()) {
        let name = match item.parse::<usize>() {
            Ok(index) => index
                .checked_sub(1)
                .and_then(|i| albums.get(i))
                .ok_or(AlbumError::IndexOutOfRange {
                    index,
                    max: albums.len(),
                })?,
            Err(_) => albums
                .iter()
                .find(|a| a.to_lowercase() == item.to_lowercase())
                .ok_or_else(|| AlbumError::UnknownAlbum {
                    name: item.to_string(),
                })?,
        };
        if seen.insert(name.as_str()) {
            selected.push(name.clone());
        }
    }
    Ok(selected)
}

/// Show the albums and ask for a priority list until the answer parses
pub fn select_albums(
    prompt: &mut dyn Prompt,
    albums: &[String],
) -> Result<Vec<String>, PromptError> {
    if albums.is_empty() {
        prompt.show("No albums found.");
        return Ok(Vec::new());
    }

    prompt.show("Albums found:");
    for (idx, name) in albums.iter().enumerate() {
        prompt.show(&format!("{}) {}", idx + 1, name));
    }
    prompt.show("Enter album numbers or names in priority order.");
    prompt.show("Examples: 1,3,5  OR  Vacation,Family  OR  all  OR  (empty to keep none)");

    loop {
        let answer = prompt.ask("Selection")?;
        match parse_selection(&answer, albums) {
            Ok(selected) if selected.is_empty() => {
                prompt.show("No albums selected. All photos will go to the main library.");
                return Ok(selected);
            }
            Ok(selected) => {
                prompt.show(&format!(
                    "Selected albums (priority order): {}",
                    selected.join(", ")
                ));
                return Ok(selected);
            }
            Err(e) => prompt.show(&format!("{}. Try again.", e)),
        }
    }
}

/// Assign each record to the first selected album it belongs to
pub fn assign_albums(records: &mut [PhotoRecord], selected: &[String]) {
    let mut in_albums = 0;
    for record in records.iter_mut() {
        record.assigned_album = selected
            .iter()
            .find(|name| record.albums.contains(*name))
            .cloned();
        match &record.assigned_album {
            Some(album) => {
                in_albums += 1;
                debug!(album = %album, path = %record.source_path.display(), "Album assigned");
            }
            None => debug!(path = %record.source_path.display(), "Album: {}", LIBRARY_LABEL),
        }
    }
    info!(
        records = records.len(),
        in_albums,
        selected = selected.len(),
        "Albums assigned"
    );
}

/// Record count per destination, with the library under [`LIBRARY_LABEL`]
pub fn album_summary(records: &[PhotoRecord]) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for record in records {
        let key = record
            .assigned_album
            .clone()
            .unwrap_or_else(|| LIBRARY_LABEL.to_string());
        *counts.entry(key).or_insert(0) += 1;
    }
    counts
}
