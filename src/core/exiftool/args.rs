//! Tag assignment lists for exiftool.

use super::WriteItem;
use crate::core::format::{extension_of, is_video_extension, FileKind};
use chrono::{DateTime, Local, Utc};
use std::path::PathBuf;

/// Extensions exiftool is asked to write into
pub const WRITABLE_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "heic", "heif", "mp4", "mov", "m4v", "mp", "gif", "webp", "dng", "nef",
    "mv", "mp~2", "mp~3",
];

/// Extensions whose header must agree with the name before writing
const SNIFFED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "heic", "heif"];

const TIMESTAMP_FORMAT: &str = "%Y:%m:%d %H:%M:%S%:z";

/// A write ready to hand to the tool: the target and its tag arguments.
///
/// `args` ends with the target path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedWrite {
    pub path: PathBuf,
    pub args: Vec<String>,
}

/// Build the tag assignments for one item.
///
/// Returns `None` when there is nothing to write, when the extension is not
/// writable, or when a sniffed image header disagrees with the extension.
pub fn build_args(item: &WriteItem) -> Option<PreparedWrite> {
    if !item.has_writable_metadata() {
        return None;
    }
    let ext = extension_of(&item.path);
    if !WRITABLE_EXTENSIONS.contains(&ext.as_str()) {
        return None;
    }
    if SNIFFED_EXTENSIONS.contains(&ext.as_str()) {
        if let Some(kind) = FileKind::sniff(&item.path) {
            if !kind.matches_extension(&ext) {
                return None;
            }
        }
    }

    let meta = &item.metadata;
    let mut args: Vec<String> = Vec::new();

    if let Some(taken) = item.captured_at {
        let stamp = format_timestamp(taken);
        args.push(format!("-DateTimeOriginal={}", stamp));
        args.push(format!("-CreateDate={}", stamp));
        if is_video_extension(&ext) {
            args.push(format!("-MediaCreateDate={}", stamp));
            args.push(format!("-TrackCreateDate={}", stamp));
        }
    }
    if let Some(created) = meta.created_at {
        args.push(format!("-XMP:CreateDate={}", format_timestamp(created)));
    }
    if let Some(geo) = meta.geo {
        args.push(format!("-GPSLatitude={:.6}", geo.latitude));
        args.push(format!("-GPSLatitudeRef={:.6}", geo.latitude));
        args.push(format!("-GPSLongitude={:.6}", geo.longitude));
        args.push(format!("-GPSLongitudeRef={:.6}", geo.longitude));
        args.push(format!("-GPSAltitude={:.6}", geo.altitude));
    }
    if let Some(description) = &meta.description {
        args.push(format!("-ImageDescription={}", description));
        args.push(format!("-XMP:Description={}", description));
    }
    if meta.favorited {
        args.push("-XMP:Rating=5".to_string());
    }
    // Removing before adding keeps list tags free of repeats on rewrite
    for person in &meta.people {
        args.push(format!("-XMP:PersonInImage-={}", person));
        args.push(format!("-XMP:PersonInImage+={}", person));
        args.push(format!("-XMP:Subject-={}", person));
        args.push(format!("-XMP:Subject+={}", person));
    }
    if let Some(url) = &meta.url {
        args.push(format!("-XMP:Source={}", url));
    }
    if let Some(app) = &meta.app_source {
        args.push(format!("-XMP:CreatorTool={}", app));
    }
    if let Some(label) = meta.origin.label() {
        args.push(format!("-XMP:Label={}", label));
    }

    if args.is_empty() {
        return None;
    }
    args.push(item.path.to_string_lossy().into_owned());
    Some(PreparedWrite {
        path: item.path.clone(),
        args,
    })
}

/// Local wall time with its UTC offset, e.g. `2020:01:01 09:30:00+01:00`
fn format_timestamp(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local).format(TIMESTAMP_FORMAT).to_string()
}
