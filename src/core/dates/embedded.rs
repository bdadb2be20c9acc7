//! Capture dates stored inside the media file itself.

use crate::core::exiftool::ToolCapability;
use chrono::{DateTime, NaiveDateTime, Utc};
use exif::{In, Reader, Tag, Value};
use serde_json::Value as JsonValue;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::process::{Command, Stdio};
use tracing::debug;

/// Tags consulted, in priority order
const EMBEDDED_TAGS: &[&str] = &[
    "DateTimeOriginal",
    "CreateDate",
    "MediaCreateDate",
    "TrackCreateDate",
];

/// Output format requested from exiftool with `-d`
const EXIFTOOL_DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%z";

/// Reads a capture date from a file's embedded tags
pub trait EmbeddedDateReader: Send + Sync {
    fn read_date(&self, path: &Path) -> Option<DateTime<Utc>>;

    fn name(&self) -> &'static str;
}

/// Asks exiftool for the first usable date tag
#[derive(Debug, Clone)]
pub struct ExifToolDateReader {
    capability: ToolCapability,
}

impl ExifToolDateReader {
    pub fn new(capability: ToolCapability) -> Self {
        Self { capability }
    }
}

impl EmbeddedDateReader for ExifToolDateReader {
    fn read_date(&self, path: &Path) -> Option<DateTime<Utc>> {
        if !self.capability.available {
            return None;
        }
        let mut command = Command::new(&self.capability.program);
        command.arg("-j");
        for tag in EMBEDDED_TAGS {
            command.arg(format!("-{}", tag));
        }
        let output = command
            .args(["-d", EXIFTOOL_DATE_FORMAT])
            .arg(path)
            .stdin(Stdio::null())
            .stderr(Stdio::null())
            .output();

        match output {
            Ok(out) if out.status.success() => parse_exiftool_json(&out.stdout),
            Ok(out) => {
                debug!(path = %path.display(), status = %out.status, "exiftool read failed");
                None
            }
            Err(e) => {
                debug!(path = %path.display(), error = %e, "exiftool could not be run");
                None
            }
        }
    }

    fn name(&self) -> &'static str {
        "exiftool"
    }
}

/// Reads `DateTimeOriginal` with the built-in EXIF parser.
///
/// Only covers containers kamadak-exif understands (JPEG, TIFF, HEIF, PNG,
/// WebP). Used when exiftool is not installed.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeExifReader;

impl EmbeddedDateReader for NativeExifReader {
    fn read_date(&self, path: &Path) -> Option<DateTime<Utc>> {
        let file = File::open(path).ok()?;
        let mut bufreader = BufReader::new(&file);
        let exif_reader = Reader::new().read_from_container(&mut bufreader).ok()?;

        for tag in [Tag::DateTimeOriginal, Tag::DateTimeDigitized, Tag::DateTime] {
            let Some(field) = exif_reader.get_field(tag, In::PRIMARY) else {
                continue;
            };
            if let Value::Ascii(ref vec) = field.value {
                let text = vec.first().and_then(|bytes| std::str::from_utf8(bytes).ok());
                if let Some(parsed) = text.and_then(parse_embedded_value) {
                    return Some(parsed);
                }
            }
        }
        None
    }

    fn name(&self) -> &'static str {
        "native-exif"
    }
}

/// Never finds a date
#[derive(Debug, Clone, Copy, Default)]
pub struct NoEmbeddedDates;

impl EmbeddedDateReader for NoEmbeddedDates {
    fn read_date(&self, _path: &Path) -> Option<DateTime<Utc>> {
        None
    }

    fn name(&self) -> &'static str {
        "none"
    }
}

/// Pick the reader matching what is installed
pub fn reader_for(capability: &ToolCapability) -> Box<dyn EmbeddedDateReader> {
    if capability.available {
        Box::new(ExifToolDateReader::new(capability.clone()))
    } else {
        Box::new(NativeExifReader)
    }
}

/// First usable tag value of the first row of `exiftool -j` output
fn parse_exiftool_json(stdout: &[u8]) -> Option<DateTime<Utc>> {
    let rows: Vec<serde_json::Map<String, JsonValue>> = serde_json::from_slice(stdout).ok()?;
    let row = rows.first()?;
    EMBEDDED_TAGS.iter().find_map(|tag| match row.get(*tag) {
        Some(JsonValue::String(s)) => parse_embedded_value(s),
        _ => None,
    })
}

/// Parse an embedded date string.
///
/// Zeroed placeholders are ignored. Values without an offset are taken as
/// UTC, which is how the tags are conventionally read when no zone is
/// recorded.
fn parse_embedded_value(raw: &str) -> Option<DateTime<Utc>> {
    let value = raw.trim_end_matches('\0').trim();
    if value.is_empty() || value.contains("0000-00-00") || value.contains("0000:00:00") {
        return None;
    }
    if let Ok(parsed) = DateTime::parse_from_str(value, EXIFTOOL_DATE_FORMAT) {
        return Some(parsed.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S", "%Y:%m:%d %H:%M:%S"]
        .iter()
        .find_map(|layout| NaiveDateTime::parse_from_str(value, layout).ok())
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    #[test]
    fn exiftool_json_uses_first_present_tag() {
        let json = br#"[{"SourceFile": "a.mov", "CreateDate": "2019-09-19T05:38:57+0200", "MediaCreateDate": "2001-01-01T00:00:00+0000"}]"#;
        assert_eq!(
            parse_exiftool_json(json),
            Some(Utc.with_ymd_and_hms(2019, 9, 19, 3, 38, 57).unwrap())
        );
    }

    #[test]
    fn zeroed_values_are_skipped() {
        let json = br#"[{"DateTimeOriginal": "0000-00-00T00:00:00", "TrackCreateDate": "2018:03:04 10:11:12"}]"#;
        assert_eq!(
            parse_exiftool_json(json),
            Some(Utc.with_ymd_and_hms(2018, 3, 4, 10, 11, 12).unwrap())
        );
        assert_eq!(parse_embedded_value("0000:00:00 00:00:00"), None);
        assert_eq!(parse_embedded_value(""), None);
    }

    #[test]
    fn malformed_output_yields_nothing() {
        assert_eq!(parse_exiftool_json(b"not json"), None);
        assert_eq!(parse_exiftool_json(b"[]"), None);
        assert_eq!(parse_exiftool_json(br#"[{"CreateDate": 12}]"#), None);
    }

    #[test]
    fn offsetless_values_are_utc() {
        assert_eq!(
            parse_embedded_value("2020-02-03T04:05:06"),
            Some(Utc.with_ymd_and_hms(2020, 2, 3, 4, 5, 6).unwrap())
        );
    }

    #[test]
    fn native_reader_ignores_files_without_exif() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("plain.jpg");
        std::fs::write(&path, b"definitely not a jpeg").unwrap();

        assert_eq!(NativeExifReader.read_date(&path), None);
        assert_eq!(NativeExifReader.read_date(&dir.path().join("missing.jpg")), None);
    }

    #[test]
    fn unavailable_tool_selects_native_reader() {
        let reader = reader_for(&ToolCapability::absent());
        assert_eq!(reader.name(), "native-exif");
        assert_eq!(ExifToolDateReader::new(ToolCapability::absent()).read_date(Path::new("/x.jpg")), None);
        assert_eq!(NoEmbeddedDates.read_date(Path::new("/x.jpg")), None);
    }
}
