//! Filename date rules: built-in conventions plus operator patterns.

use super::store::ExclusionSet;
use crate::core::record::file_name_of;
use crate::error::DateError;
use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, TimeZone, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::OnceLock;
use tracing::warn;

/// Layout name for epoch seconds
pub const LAYOUT_UNIX: &str = "UNIX";
/// Layout name for epoch milliseconds
pub const LAYOUT_UNIX_MILLIS: &str = "UNIXMS";

/// Operator-supplied rule as stored on disk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomDatePattern {
    pub regex: String,
    /// chrono format string, or `UNIX` / `UNIXMS`
    pub layout: String,
}

impl CustomDatePattern {
    pub fn new(regex: impl Into<String>, layout: impl Into<String>) -> Self {
        Self {
            regex: regex.into(),
            layout: layout.into(),
        }
    }
}

/// A compiled (regex, layout) rule
#[derive(Debug, Clone)]
pub struct DateRule {
    regex: Regex,
    layout: String,
}

impl DateRule {
    pub fn new(regex: &str, layout: &str) -> Result<Self, DateError> {
        let compiled = Regex::new(regex).map_err(|e| DateError::InvalidPattern {
            regex: regex.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            regex: compiled,
            layout: layout.trim().to_string(),
        })
    }

    pub fn layout(&self) -> &str {
        &self.layout
    }

    /// Portion of `name` to parse: capture group 1 when the regex has one,
    /// otherwise the whole match
    pub fn extract<'a>(&self, name: &'a str) -> Option<&'a str> {
        let caps = self.regex.captures(name)?;
        if self.regex.captures_len() > 1 {
            Some(caps.get(1).map_or("", |m| m.as_str()))
        } else {
            caps.get(0).map(|m| m.as_str())
        }
    }

    /// Parse a date out of a file name
    pub fn date_for(&self, name: &str) -> Option<DateTime<Utc>> {
        self.extract(name)
            .and_then(|value| parse_with_layout(&self.layout, value))
    }
}

/// Parse `value` with a layout.
///
/// `UNIX` and `UNIXMS` (any case) read epoch seconds and milliseconds.
/// Anything else is a chrono format string interpreted in local time; a
/// format without a time part yields local midnight.
pub fn parse_with_layout(layout: &str, value: &str) -> Option<DateTime<Utc>> {
    let layout = layout.trim();
    let value = value.trim();
    if layout.eq_ignore_ascii_case(LAYOUT_UNIX) {
        return value
            .parse::<i64>()
            .ok()
            .and_then(|secs| DateTime::from_timestamp(secs, 0));
    }
    if layout.eq_ignore_ascii_case(LAYOUT_UNIX_MILLIS) {
        return value
            .parse::<i64>()
            .ok()
            .and_then(DateTime::from_timestamp_millis);
    }
    if layout.is_empty() {
        return None;
    }

    let naive = match NaiveDateTime::parse_from_str(value, layout) {
        Ok(naive) => naive,
        Err(_) => NaiveDate::parse_from_str(value, layout)
            .ok()?
            .and_hms_opt(0, 0, 0)?,
    };
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|local| local.with_timezone(&Utc))
}

/// Built-in rules, most specific conventions first
pub fn builtin_rules() -> &'static [DateRule] {
    static RULES: OnceLock<Vec<DateRule>> = OnceLock::new();
    RULES.get_or_init(|| {
        const DATE: &str = r"(?:20|19|18)\d{2}(?:0[1-9]|1[0-2])[0-3]\d";
        let specs: Vec<(String, &str)> = vec![
            (format!(r"{DATE}-\d{{6}}"), "%Y%m%d-%H%M%S"),
            (format!(r"{DATE}_\d{{6}}"), "%Y%m%d_%H%M%S"),
            (
                r"(?:20|19|18)\d{2}-(?:0[1-9]|1[0-2])-[0-3]\d-\d{2}-\d{2}-\d{2}".to_string(),
                "%Y-%m-%d-%H-%M-%S",
            ),
            (
                r"(?:20|19|18)\d{2}-(?:0[1-9]|1[0-2])-[0-3]\d-\d{6}".to_string(),
                "%Y-%m-%d-%H%M%S",
            ),
            // At least 15 digits; the first 14 are the timestamp
            (format!(r"({DATE}\d{{6}})\d+"), "%Y%m%d%H%M%S"),
            (
                r"(?:20|19|18)\d{2}_(?:0[1-9]|1[0-2])_[0-3]\d_\d{2}_\d{2}_\d{2}".to_string(),
                "%Y_%m_%d_%H_%M_%S",
            ),
            (r"(?i)(?:IMG|VID)-(\d{8})-WA\d+".to_string(), "%Y%m%d"),
            (r"(?i)Snapchat-(\d{13})(?:\D|$)".to_string(), LAYOUT_UNIX_MILLIS),
            (r"(?i)Snapchat-(\d{10})(?:\D|$)".to_string(), LAYOUT_UNIX),
            (r"(?i)PXL_(\d{8}_\d{6})(?:\D|$)".to_string(), "%Y%m%d_%H%M%S"),
            (r"(?i)PXL_(\d{8}_\d{6})\d{3}".to_string(), "%Y%m%d_%H%M%S"),
            (r"(?i)(?:IMG|VID)_(\d{8}_\d{6})".to_string(), "%Y%m%d_%H%M%S"),
        ];
        specs
            .iter()
            .filter_map(|(regex, layout)| DateRule::new(regex, layout).ok())
            .collect()
    })
}

/// Dates files from their names using custom rules, built-ins and exclusions
#[derive(Debug, Clone, Default)]
pub struct FilenameDater {
    custom: Vec<DateRule>,
    exclusions: ExclusionSet,
}

impl FilenameDater {
    /// Compile custom patterns. Empty or invalid entries are skipped.
    pub fn new(custom: &[CustomDatePattern], exclusions: ExclusionSet) -> Self {
        let custom = custom
            .iter()
            .filter(|p| !p.regex.trim().is_empty() && !p.layout.trim().is_empty())
            .filter_map(|p| match DateRule::new(&p.regex, &p.layout) {
                Ok(rule) => Some(rule),
                Err(e) => {
                    warn!("skipping custom date pattern: {}", e);
                    None
                }
            })
            .collect();
        Self { custom, exclusions }
    }

    /// Number of usable custom rules
    pub fn custom_len(&self) -> usize {
        self.custom.len()
    }

    /// Filename date for `path`, or `None` when excluded or unmatched
    pub fn date_for(&self, path: &Path) -> Option<DateTime<Utc>> {
        let name = file_name_of(path);
        if name.is_empty() || self.exclusions.contains(name) {
            return None;
        }
        if let Some(date) = self.custom.iter().find_map(|rule| rule.date_for(name)) {
            return Some(date);
        }
        if self.exclusions.contains(name) {
            return None;
        }
        builtin_rules().iter().find_map(|rule| rule.date_for(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn local(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        let naive = NaiveDate::from_ymd_opt(y, mo, d)
            .unwrap()
            .and_hms_opt(h, mi, s)
            .unwrap();
        Local
            .from_local_datetime(&naive)
            .earliest()
            .unwrap()
            .with_timezone(&Utc)
    }

    fn guess(name: &str) -> Option<DateTime<Utc>> {
        FilenameDater::default().date_for(Path::new(name))
    }

    #[test]
    fn screenshot_and_camera_names() {
        assert_eq!(guess("Screenshot_20190919-053857.png"), Some(local(2019, 9, 19, 5, 38, 57)));
        assert_eq!(guess("20190919_053857.jpg"), Some(local(2019, 9, 19, 5, 38, 57)));
        assert_eq!(guess("2019-09-19-05-38-57.jpg"), Some(local(2019, 9, 19, 5, 38, 57)));
        assert_eq!(guess("2019-09-19-053857.jpg"), Some(local(2019, 9, 19, 5, 38, 57)));
        assert_eq!(guess("2019_09_19_05_38_57.jpg"), Some(local(2019, 9, 19, 5, 38, 57)));
        assert_eq!(guess("IMG_20190919_053857.jpg"), Some(local(2019, 9, 19, 5, 38, 57)));
    }

    #[test]
    fn long_digit_run_uses_first_fourteen() {
        assert_eq!(guess("20190919053857123.jpg"), Some(local(2019, 9, 19, 5, 38, 57)));
        assert_eq!(guess("201801261147521.jpg"), Some(local(2018, 1, 26, 11, 47, 52)));
    }

    #[test]
    fn bare_fourteen_digits_are_not_a_timestamp() {
        assert_eq!(guess("20190919053857.jpg"), None);
    }

    #[test]
    fn whatsapp_is_date_only() {
        assert_eq!(guess("IMG-20200314-WA0007.jpg"), Some(local(2020, 3, 14, 0, 0, 0)));
    }

    #[test]
    fn snapchat_epochs() {
        let secs = DateTime::from_timestamp(1_577_836_800, 0).unwrap();
        assert_eq!(guess("Snapchat-1577836800.jpg"), Some(secs));
        assert_eq!(guess("Snapchat-1577836800-edited.jpg"), Some(secs));

        let millis = DateTime::from_timestamp_millis(1_577_836_800_250).unwrap();
        assert_eq!(guess("Snapchat-1577836800250.mp4"), Some(millis));
    }

    #[test]
    fn pixel_names_with_and_without_millis() {
        assert_eq!(guess("PXL_20210101_101010.jpg"), Some(local(2021, 1, 1, 10, 10, 10)));
        assert_eq!(guess("PXL_20210101_101010123.MP.jpg"), Some(local(2021, 1, 1, 10, 10, 10)));
    }

    #[test]
    fn unmatched_names_have_no_date() {
        assert_eq!(guess("holiday.jpg"), None);
        assert_eq!(guess("IMG_1234.jpg"), None);
    }

    #[test]
    fn custom_pattern_uses_group_one() {
        let dater = FilenameDater::new(
            &[CustomDatePattern::new(r"shot (\d{4}\.\d{2}\.\d{2})", "%Y.%m.%d")],
            ExclusionSet::default(),
        );
        assert_eq!(
            dater.date_for(Path::new("/t/shot 2018.07.04 beach.jpg")),
            Some(local(2018, 7, 4, 0, 0, 0))
        );
    }

    #[test]
    fn custom_patterns_run_before_builtins() {
        let dater = FilenameDater::new(
            &[CustomDatePattern::new(r"^\d+", LAYOUT_UNIX)],
            ExclusionSet::default(),
        );
        let got = dater.date_for(Path::new("1600000000_20190919_053857.jpg"));
        assert_eq!(got, DateTime::from_timestamp(1_600_000_000, 0));
    }

    #[test]
    fn invalid_custom_patterns_are_skipped() {
        let dater = FilenameDater::new(
            &[
                CustomDatePattern::new("(unclosed", "%Y"),
                CustomDatePattern::new("", "%Y"),
                CustomDatePattern::new(r"\d+", " "),
            ],
            ExclusionSet::default(),
        );
        assert_eq!(dater.custom_len(), 0);
    }

    #[test]
    fn excluded_names_are_never_dated() {
        let exclusions: ExclusionSet = ["IMG_20190919_053857.jpg".to_string()].into_iter().collect();
        let dater = FilenameDater::new(
            &[CustomDatePattern::new(r"\d{8}", "%Y%m%d")],
            exclusions,
        );
        assert_eq!(dater.date_for(Path::new("/t/IMG_20190919_053857.jpg")), None);
        assert!(dater.date_for(Path::new("/t/IMG_20190920_053857.jpg")).is_some());
    }

    #[test]
    fn layout_parsing() {
        assert_eq!(
            parse_with_layout("unixms", "1000"),
            DateTime::from_timestamp(1, 0)
        );
        assert_eq!(parse_with_layout("%Y%m%d", "20200230"), None);
        assert_eq!(parse_with_layout("%Y%m%d", "2020-01-01"), None);
        assert_eq!(parse_with_layout("", "2020"), None);
    }
}
