//! File filtering logic for the scanner.

use crate::core::format::{extension_of, MediaKind};
use std::collections::HashSet;
use std::path::Path;

/// Decides which walked entries the scanner keeps
#[derive(Debug, Clone, Default)]
pub struct MediaFilter {
    /// Whether to include hidden files and directories
    include_hidden: bool,
    /// Optional allow-list of media extensions (lowercase, no dot)
    only_extensions: Option<HashSet<String>>,
}

impl MediaFilter {
    /// Create a filter that accepts every known media extension
    pub fn new() -> Self {
        Self::default()
    }

    /// Include hidden files (starting with .)
    pub fn with_hidden(mut self, include: bool) -> Self {
        self.include_hidden = include;
        self
    }

    /// Restrict media to the given extensions
    pub fn with_only_extensions(mut self, extensions: Option<HashSet<String>>) -> Self {
        self.only_extensions = extensions.filter(|set| !set.is_empty());
        self
    }

    /// Hidden entries are skipped unless configured otherwise
    pub fn is_hidden(&self, path: &Path) -> bool {
        if self.include_hidden {
            return false;
        }
        path.file_name()
            .and_then(|n| n.to_str())
            .map(|name| name.starts_with('.'))
            .unwrap_or(false)
    }

    /// Classify a file, honouring the hidden-file setting
    pub fn classify(&self, path: &Path) -> MediaKind {
        if self.is_hidden(path) {
            return MediaKind::Ignored;
        }
        MediaKind::classify(path)
    }

    /// Whether a media file passes the extension allow-list
    pub fn allows(&self, path: &Path) -> bool {
        match &self.only_extensions {
            Some(allowed) => allowed.contains(&extension_of(path)),
            None => true,
        }
    }
}

/// Parse a comma-separated extension list such as `"jpg, .HEIC,mp4"`.
///
/// Returns `None` when the list is empty, which means "no restriction".
pub fn parse_extension_list(input: &str) -> Option<HashSet<String>> {
    let set: HashSet<String> = input
        .split(',')
        .map(|part| part.trim().trim_start_matches('.').to_lowercase())
        .filter(|part| !part.is_empty())
        .collect();
    if set.is_empty() {
        None
    } else {
        Some(set)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_excludes_hidden_by_default() {
        let filter = MediaFilter::new();
        assert_eq!(filter.classify(Path::new("/t/.hidden.jpg")), MediaKind::Ignored);
        assert_eq!(filter.classify(Path::new("/t/visible.jpg")), MediaKind::Media);
    }

    #[test]
    fn filter_can_include_hidden() {
        let filter = MediaFilter::new().with_hidden(true);
        assert_eq!(filter.classify(Path::new("/t/.hidden.jpg")), MediaKind::Media);
    }

    #[test]
    fn extension_list_is_normalized() {
        let set = parse_extension_list(" jpg, .HEIC ,,mp4").unwrap();
        assert_eq!(set.len(), 3);
        assert!(set.contains("heic"));
        assert!(parse_extension_list(" , ").is_none());
    }

    #[test]
    fn allow_list_restricts_media() {
        let filter = MediaFilter::new().with_only_extensions(parse_extension_list("jpg"));
        assert!(filter.allows(Path::new("/t/a.JPG")));
        assert!(!filter.allows(Path::new("/t/a.mp4")));
        assert!(MediaFilter::new().allows(Path::new("/t/a.mp4")));
    }
}
