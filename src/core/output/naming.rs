//! Destination folders and collision-free file names.

use crate::core::format::{extension_of, FileKind};
use crate::core::record::file_name_of;
use crate::error::OutputError;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const LIBRARY_DIR: &str = "Library";
pub const ALBUMS_DIR: &str = "Albums";

/// Highest numeric suffix tried before giving up
const MAX_SUFFIX: u32 = 9999;

/// Folder-safe album name: trimmed, separators replaced, never empty
pub fn sanitize_folder(name: &str) -> String {
    let name = name.trim().replace(['/', '\\'], "_");
    if name.is_empty() {
        "Untitled".to_string()
    } else {
        name
    }
}

/// `<root>/Library` or `<root>/Albums/<album>`
pub fn destination_dir(root: &Path, album: Option<&str>) -> PathBuf {
    match album.map(str::trim).filter(|a| !a.is_empty()) {
        Some(album) => root.join(ALBUMS_DIR).join(sanitize_folder(album)),
        None => root.join(LIBRARY_DIR),
    }
}

/// Source file name, with the extension corrected when the header says
/// the content is a different format
pub fn canonical_file_name(source: &Path) -> String {
    let name = file_name_of(source).to_string();
    let Some(kind) = FileKind::sniff(source) else {
        return name;
    };
    let ext = extension_of(source);
    if kind.matches_extension(&ext) {
        return name;
    }
    let stem = source
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(name.as_str());
    let renamed = format!("{}.{}", stem, kind.preferred_extension());
    debug!(from = %name, to = %renamed, "Correcting extension from file header");
    renamed
}

/// Names handed out during one output run.
///
/// A path is taken if it exists on disk or was already reserved, so dry
/// runs make the same decisions as real ones. Reservations are made in
/// record order by a single owner, which keeps the chosen names
/// independent of how many copy workers run.
#[derive(Debug, Default)]
pub struct NameReservations {
    reserved: HashSet<PathBuf>,
}

impl NameReservations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve a free path in `dir` for `file_name`.
    ///
    /// Tries the name itself, then `<stem>-<hash8><ext>`, then
    /// `<stem>-<n><ext>` counting up from 1.
    pub fn reserve(
        &mut self,
        dir: &Path,
        file_name: &str,
        short_hash: Option<&str>,
    ) -> Result<PathBuf, OutputError> {
        let reserved = &mut self.reserved;

        let first = dir.join(file_name);
        if !is_taken(reserved, &first)? {
            reserved.insert(first.clone());
            return Ok(first);
        }
        debug!(path = %first.display(), "Name collision");

        let (stem, ext) = split_name(file_name);
        if let Some(hash) = short_hash.filter(|h| !h.is_empty()) {
            let candidate = dir.join(format!("{}-{}{}", stem, hash, ext));
            if !is_taken(reserved, &candidate)? {
                reserved.insert(candidate.clone());
                return Ok(candidate);
            }
        }

        for n in 1..=MAX_SUFFIX {
            let candidate = dir.join(format!("{}-{}{}", stem, n, ext));
            if !is_taken(reserved, &candidate)? {
                reserved.insert(candidate.clone());
                return Ok(candidate);
            }
        }

        Err(OutputError::TooManyCollisions {
            name: file_name.to_string(),
        })
    }
}

fn is_taken(reserved: &HashSet<PathBuf>, path: &Path) -> Result<bool, OutputError> {
    if reserved.contains(path) {
        return Ok(true);
    }
    path.try_exists().map_err(|source| OutputError::Resolve {
        path: path.to_path_buf(),
        source,
    })
}

/// `("IMG_1", ".jpg")`; names without an extension keep an empty one
fn split_name(file_name: &str) -> (&str, &str) {
    match file_name.rfind('.') {
        Some(idx) if idx > 0 => (&file_name[..idx], &file_name[idx..]),
        _ => (file_name, ""),
    }
}
