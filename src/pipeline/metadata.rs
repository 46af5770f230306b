//! Facts about an upload that need no remote call.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use std::io::Cursor;
use std::path::Path;

use super::ingest::{Enrichment, FaceScan};

const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExifSummary {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub camera_make: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub camera_model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub taken_at: Option<String>,
}

/// MIME type guessed from the file extension.
pub fn content_type_for(name: &str) -> String {
    image::ImageFormat::from_path(Path::new(name))
        .map(|format| format.to_mime_type().to_string())
        .unwrap_or_else(|_| FALLBACK_CONTENT_TYPE.to_string())
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Pixel dimensions read from the image header, if the bytes are a known format.
pub fn dimensions(bytes: &[u8]) -> Option<(u32, u32)> {
    image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .ok()?
        .into_dimensions()
        .ok()
}

pub fn read_exif(bytes: &[u8]) -> Option<ExifSummary> {
    let exif = exif::Reader::new()
        .read_from_container(&mut Cursor::new(bytes))
        .ok()?;

    let text = |tag: exif::Tag| {
        exif.get_field(tag, exif::In::PRIMARY)
            .map(|field| field.display_value().to_string().trim_matches('"').to_string())
    };

    let summary = ExifSummary {
        camera_make: text(exif::Tag::Make),
        camera_model: text(exif::Tag::Model),
        taken_at: text(exif::Tag::DateTimeOriginal),
    };

    if summary == ExifSummary::default() {
        None
    } else {
        Some(summary)
    }
}

/// The free-form `metadata` object stored with a photo.
pub fn build_metadata(
    original_name: &str,
    bytes: &[u8],
    last_modified: Option<DateTime<Utc>>,
    enrichment: &Enrichment,
    faces: &FaceScan,
) -> Value {
    let enrichment_status = match enrichment {
        Enrichment::Succeeded { .. } => json!("succeeded"),
        Enrichment::Skipped { reason } => json!({ "skipped": reason }),
    };
    let faces_status = match faces {
        FaceScan::Detected { .. } => json!("detected"),
        FaceScan::Skipped { reason } => json!({ "skipped": reason }),
    };

    let mut metadata = json!({
        "original_name": original_name,
        "sha256": sha256_hex(bytes),
        "enrichment": enrichment_status,
        "faces": faces_status,
    });

    if let Some(last_modified) = last_modified {
        metadata["last_modified"] = json!(last_modified);
    }
    if let Some((width, height)) = dimensions(bytes) {
        metadata["width"] = json!(width);
        metadata["height"] = json!(height);
    }
    if let Some(exif) = read_exif(bytes) {
        metadata["exif"] = json!(exif);
    }

    metadata
}
