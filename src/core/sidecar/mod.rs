//! # Sidecar Module
//!
//! Parses the JSON metadata document exported next to each media file.
//!
//! Only the fields the organizer uses are read; everything else in the
//! document is ignored. Timestamps are epoch seconds and may be encoded
//! either as a JSON string or as a number.

use crate::core::record::{DescriptiveMetadata, GeoData, UploadOrigin};
use crate::error::SidecarError;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use std::fs;
use std::path::Path;

/// The parts of a sidecar document the organizer cares about
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SidecarDocument {
    /// Declared title, normally the original media file name
    pub title: Option<String>,
    /// `photoTakenTime`
    pub taken_at: Option<DateTime<Utc>>,
    /// `creationTime` (upload time)
    pub created_at: Option<DateTime<Utc>>,
    pub metadata: DescriptiveMetadata,
}

impl SidecarDocument {
    /// Read and parse a sidecar from disk
    pub fn load(path: &Path) -> Result<Self, SidecarError> {
        let data = fs::read(path).map_err(|source| SidecarError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(path, &data)
    }

    /// Parse sidecar bytes; `path` is only used for error context
    pub fn parse(path: &Path, data: &[u8]) -> Result<Self, SidecarError> {
        let raw: RawSidecar = serde_json::from_slice(data).map_err(|source| SidecarError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(raw.into())
    }

    /// Capture time: `photoTakenTime`, falling back to `creationTime`
    pub fn taken_time(&self) -> Option<DateTime<Utc>> {
        self.taken_at.or(self.created_at)
    }
}

/// Declared title of a sidecar, if the file parses and has one
pub fn read_title(path: &Path) -> Option<String> {
    #[derive(Deserialize)]
    struct TitleOnly {
        title: Option<String>,
    }

    let data = fs::read(path).ok()?;
    let parsed: TitleOnly = serde_json::from_slice(&data).ok()?;
    parsed.title.filter(|t| !t.is_empty())
}

/// Epoch seconds encoded as a string or a number
pub(crate) fn parse_epoch_seconds(value: &Value) -> Option<i64> {
    match value {
        Value::String(s) => s.trim().parse::<i64>().ok(),
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        _ => None,
    }
}

fn timestamp_of(raw: Option<RawTimestamp>) -> Option<DateTime<Utc>> {
    raw.and_then(|t| t.timestamp)
        .as_ref()
        .and_then(parse_epoch_seconds)
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct RawSidecar {
    title: Option<String>,
    description: Option<String>,
    favorited: Option<bool>,
    photo_taken_time: Option<RawTimestamp>,
    creation_time: Option<RawTimestamp>,
    geo_data: Option<RawGeo>,
    people: Option<Vec<RawPerson>>,
    url: Option<String>,
    app_source: Option<RawAppSource>,
    google_photos_origin: Option<RawOrigin>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawTimestamp {
    timestamp: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct RawGeo {
    latitude: f64,
    longitude: f64,
    altitude: f64,
    latitude_span: f64,
    longitude_span: f64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawPerson {
    name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct RawAppSource {
    android_package_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct RawOrigin {
    composition: Option<RawComposition>,
    from_shared_album: Option<Value>,
    mobile_upload: Option<RawMobileUpload>,
    web_upload: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename = "composition")]
struct RawComposition {
    #[serde(rename = "type")]
    kind: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct RawMobileUpload {
    device_folder: Option<RawDeviceFolder>,
    device_type: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct RawDeviceFolder {
    local_folder_name: Option<String>,
}

impl From<RawSidecar> for SidecarDocument {
    fn from(raw: RawSidecar) -> Self {
        let taken_at = timestamp_of(raw.photo_taken_time);
        let created_at = timestamp_of(raw.creation_time);

        let geo = raw
            .geo_data
            .filter(|g| g.latitude != 0.0 || g.longitude != 0.0 || g.altitude != 0.0)
            .map(|g| GeoData {
                latitude: g.latitude,
                longitude: g.longitude,
                altitude: g.altitude,
                latitude_span: g.latitude_span,
                longitude_span: g.longitude_span,
            });

        let people = raw
            .people
            .unwrap_or_default()
            .into_iter()
            .filter_map(|p| non_empty(p.name))
            .collect();

        let origin = raw
            .google_photos_origin
            .map(|o| {
                let mobile = o.mobile_upload.unwrap_or_default();
                let device_type = non_empty(mobile.device_type);
                let device_folder =
                    non_empty(mobile.device_folder.and_then(|f| f.local_folder_name));
                UploadOrigin {
                    from_shared_album: o.from_shared_album.is_some(),
                    web_upload: o.web_upload.is_some(),
                    mobile_upload: device_type.is_some() || device_folder.is_some(),
                    device_type,
                    device_folder,
                    composition_type: non_empty(o.composition.and_then(|c| c.kind)),
                }
            })
            .unwrap_or_default();

        SidecarDocument {
            title: raw.title.filter(|t| !t.is_empty()),
            taken_at,
            created_at,
            metadata: DescriptiveMetadata {
                description: non_empty(raw.description),
                favorited: raw.favorited.unwrap_or(false),
                people,
                url: non_empty(raw.url),
                app_source: non_empty(raw.app_source.and_then(|a| a.android_package_name)),
                origin,
                geo,
                created_at,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::path::PathBuf;

    fn parse(json: &str) -> SidecarDocument {
        SidecarDocument::parse(&PathBuf::from("test.json"), json.as_bytes()).unwrap()
    }

    #[test]
    fn timestamp_accepts_string_and_number() {
        let from_string = parse(r#"{"photoTakenTime": {"timestamp": "1577836800"}}"#);
        let from_number = parse(r#"{"photoTakenTime": {"timestamp": 1577836800}}"#);
        let expected = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();

        assert_eq!(from_string.taken_at, Some(expected));
        assert_eq!(from_number.taken_at, Some(expected));
    }

    #[test]
    fn taken_time_falls_back_to_creation_time() {
        let doc = parse(r#"{"creationTime": {"timestamp": "1600000000"}}"#);
        assert!(doc.taken_at.is_none());
        assert_eq!(doc.taken_time(), doc.created_at);
        assert!(doc.taken_time().is_some());
    }

    #[test]
    fn garbage_timestamp_is_absent() {
        let doc = parse(r#"{"photoTakenTime": {"timestamp": "soon"}}"#);
        assert!(doc.taken_at.is_none());
    }

    #[test]
    fn zero_geo_is_absent() {
        let doc = parse(r#"{"geoData": {"latitude": 0.0, "longitude": 0.0, "altitude": 0.0}}"#);
        assert!(doc.metadata.geo.is_none());

        let doc = parse(r#"{"geoData": {"latitude": 51.5, "longitude": -0.12, "altitude": 11.0, "latitudeSpan": 0.1}}"#);
        let geo = doc.metadata.geo.unwrap();
        assert_eq!(geo.latitude, 51.5);
        assert_eq!(geo.latitude_span, 0.1);
    }

    #[test]
    fn descriptive_fields_are_trimmed() {
        let doc = parse(
            r#"{
                "title": "IMG_0001.jpg",
                "description": "  beach day ",
                "favorited": true,
                "people": [{"name": "Ana"}, {"name": "  "}, {"name": "Ben"}],
                "url": "https://photos.example/abc",
                "appSource": {"androidPackageName": "com.example.camera"}
            }"#,
        );

        assert_eq!(doc.title.as_deref(), Some("IMG_0001.jpg"));
        assert_eq!(doc.metadata.description.as_deref(), Some("beach day"));
        assert!(doc.metadata.favorited);
        assert_eq!(doc.metadata.people, vec!["Ana".to_string(), "Ben".to_string()]);
        assert_eq!(doc.metadata.app_source.as_deref(), Some("com.example.camera"));
    }

    #[test]
    fn origin_flags_follow_presence() {
        let doc = parse(
            r#"{"googlePhotosOrigin": {
                "fromSharedAlbum": {},
                "mobileUpload": {"deviceFolder": {"localFolderName": "Camera"}, "deviceType": "IOS_PHONE"},
                "composition": {"type": "COLLAGE"}
            }}"#,
        );
        let origin = &doc.metadata.origin;
        assert!(origin.from_shared_album);
        assert!(!origin.web_upload);
        assert!(origin.mobile_upload);
        assert_eq!(origin.device_folder.as_deref(), Some("Camera"));
        assert_eq!(origin.composition_type.as_deref(), Some("COLLAGE"));
    }

    #[test]
    fn invalid_json_is_an_error() {
        let result = SidecarDocument::parse(&PathBuf::from("bad.json"), b"{not json");
        assert!(matches!(result, Err(SidecarError::Parse { .. })));
    }
}
