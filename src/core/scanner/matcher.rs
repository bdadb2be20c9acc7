//! Pairing media files with their JSON sidecars.
//!
//! Exported sidecar names are unreliable: long names are truncated,
//! duplicates get `(n)` in odd places and newer exports add a
//! `.supplemental-metadata` infix. The index therefore keeps several views of
//! every sidecar and tries them from most to least specific.

use crate::core::format::extension_of;
use crate::core::record::file_name_of;
use regex::Regex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Suffixes the photo service appends to edited copies
const EDIT_SUFFIXES: &[&str] = &[
    "-edited",
    "-collage",
    "-color_pop",
    "-photo_frame",
    "-overlayed",
];

/// Stills that may own the sidecar of a live-photo video
const LIVE_PHOTO_STILLS: &[&str] = &["heic", "jpg", "jpeg", "png"];

#[derive(Debug, Clone)]
struct TitledSidecar {
    title: String,
    path: PathBuf,
}

/// Lookup tables over every sidecar found during a scan
#[derive(Debug, Default)]
pub struct SidecarIndex {
    by_title: HashMap<String, Vec<PathBuf>>,
    by_key: HashMap<String, Vec<PathBuf>>,
    by_dir: HashMap<PathBuf, Vec<TitledSidecar>>,
    by_normalized: HashMap<String, Vec<PathBuf>>,
    count: usize,
}

impl SidecarIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index a sidecar under its file name and, when known, its declared title
    pub fn insert(&mut self, path: PathBuf, title: Option<String>) {
        self.count += 1;

        if let Some(key) = normalize_json_key(file_name_of(&path)) {
            self.by_key.entry(key).or_default().push(path.clone());
        }

        let Some(title) = title.filter(|t| !t.is_empty()) else {
            return;
        };

        self.by_title
            .entry(title.to_lowercase())
            .or_default()
            .push(path.clone());

        let normalized = normalize_for_edit_match(strip_ext(&title));
        if !normalized.is_empty() {
            self.by_normalized
                .entry(normalized)
                .or_default()
                .push(path.clone());
        }

        if let Some(dir) = path.parent() {
            self.by_dir
                .entry(dir.to_path_buf())
                .or_default()
                .push(TitledSidecar { title, path });
        }
    }

    /// Number of sidecars indexed
    pub fn sidecar_count(&self) -> usize {
        self.count
    }

    /// Find the sidecar belonging to `media`, if any
    pub fn resolve(&self, media: &Path) -> Option<PathBuf> {
        let name = file_name_of(media);
        if name.is_empty() {
            return None;
        }
        let stem = strip_ext(name);
        let ext = extension_of(media);
        let name_lower = name.to_lowercase();
        let stem_lower = stem.to_lowercase();

        if let Some(found) = self.by_title_lookup(&name_lower, name) {
            return Some(found);
        }
        if let Some(found) = self.by_title_lookup(&stem_lower, name) {
            return Some(found);
        }
        if ext == "mp" {
            for still in ["jpg", "jpeg"] {
                let title = format!("{}.{}", name_lower, still);
                if let Some(found) = self.by_title_lookup(&title, name) {
                    return Some(found);
                }
            }
        }

        if ext == "mp4" || ext == "mov" {
            for still in LIVE_PHOTO_STILLS {
                let title = format!("{}.{}", stem_lower, still);
                if let Some(found) = self.by_title_lookup(&title, &title) {
                    return Some(found);
                }
            }
        }

        for key in media_keys(name) {
            if let Some(candidates) = self.by_key.get(&key) {
                if let Some(found) = pick_candidate(candidates, name) {
                    return Some(found);
                }
            }
        }

        if let Some(found) = self.prefix_candidate(media, &stem_lower, &ext) {
            return Some(found);
        }

        let normalized = normalize_for_edit_match(stem);
        if normalized.is_empty() {
            return None;
        }
        self.by_normalized
            .get(&normalized)
            .and_then(|candidates| pick_candidate(candidates, name))
    }

    fn by_title_lookup(&self, title: &str, base: &str) -> Option<PathBuf> {
        self.by_title
            .get(title)
            .and_then(|candidates| pick_candidate(candidates, base))
    }

    /// Same-directory sidecar whose title is the untruncated form of the media name
    fn prefix_candidate(&self, media: &Path, stem_lower: &str, ext: &str) -> Option<PathBuf> {
        if ext.is_empty() || stem_lower.is_empty() {
            return None;
        }
        let entries = self.by_dir.get(media.parent()?)?;
        let suffix = format!(".{}", ext);

        let mut best: Option<(&TitledSidecar, usize)> = None;
        for entry in entries {
            let title = entry.title.to_lowercase();
            let Some(title_stem) = title.strip_suffix(&suffix) else {
                continue;
            };
            if !title_stem.starts_with(stem_lower) {
                continue;
            }
            let len = title_stem.len();
            if best.map_or(true, |(_, best_len)| len < best_len) {
                best = Some((entry, len));
            }
        }
        best.map(|(entry, _)| entry.path.clone())
    }
}

/// One candidate wins outright; among several prefer the conventional name
fn pick_candidate(candidates: &[PathBuf], base: &str) -> Option<PathBuf> {
    match candidates {
        [] => None,
        [only] => Some(only.clone()),
        _ => {
            let pattern = format!(
                r"^{}(\(\d+\))?(\.supplemental-metadata|\.metadata)?\.json$",
                regex::escape(base)
            );
            let preferred = Regex::new(&pattern).ok().and_then(|re| {
                candidates
                    .iter()
                    .find(|c| re.is_match(file_name_of(c)))
                    .cloned()
            });
            preferred.or_else(|| candidates.first().cloned())
        }
    }
}

/// Everything before the last dot; names without a dot are returned whole
fn strip_ext(name: &str) -> &str {
    match name.rfind('.') {
        Some(idx) => &name[..idx],
        None => name,
    }
}

/// Remove a trailing duplicate index such as `(2)`
fn strip_trailing_index(name: &str) -> &str {
    let Some(body) = name.strip_suffix(')') else {
        return name;
    };
    let Some(open) = body.rfind('(') else {
        return name;
    };
    let digits = &body[open + 1..];
    if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
        &name[..open]
    } else {
        name
    }
}

/// Key derived from a sidecar file name, comparable with [`media_keys`]
fn normalize_json_key(file_name: &str) -> Option<String> {
    let lower = file_name.to_ascii_lowercase();
    if !lower.ends_with(".json") {
        return None;
    }
    let name = &file_name[..file_name.len() - ".json".len()];
    let name = strip_trailing_index(name.trim_end_matches('.'));

    let lower = name.to_ascii_lowercase();
    let cut = lower.find(".supp").or_else(|| lower.find(".meta"));
    let key = match cut {
        Some(idx) => &name[..idx],
        None => name,
    };
    let key = key.trim();
    if key.is_empty() {
        None
    } else {
        Some(key.to_string())
    }
}

/// Keys a media file may be indexed under: name and stem, with and without `(n)`
fn media_keys(name: &str) -> Vec<String> {
    let base = name.trim_end_matches('.');
    let stem = strip_ext(base);
    let mut keys: Vec<String> = Vec::with_capacity(4);
    for candidate in [
        base,
        stem,
        strip_trailing_index(base),
        strip_trailing_index(stem),
    ] {
        let candidate = candidate.trim();
        if !candidate.is_empty() && !keys.iter().any(|k| k == candidate) {
            keys.push(candidate.to_string());
        }
    }
    keys
}

/// Lowercased stem without `(n)` and without one edit suffix
fn normalize_for_edit_match(stem: &str) -> String {
    let lower = stem.trim().to_lowercase();
    let mut base = strip_trailing_index(&lower).to_string();
    for suffix in EDIT_SUFFIXES {
        if let Some(stripped) = base.strip_suffix(suffix) {
            base = stripped.to_string();
            break;
        }
    }
    base.trim().to_string()
}
