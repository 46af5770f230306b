use anyhow::{bail, Context, Result};
use serde::Serialize;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::str::FromStr;

use crate::db::{Database, Photo};

/// Export format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Csv,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Json => "json",
            ExportFormat::Csv => "csv",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(ExportFormat::Json),
            "csv" => Ok(ExportFormat::Csv),
            other => bail!("Unknown export format: {} (expected json or csv)", other),
        }
    }
}

/// One manifest row
#[derive(Debug, Serialize)]
pub struct ExportedPhoto {
    pub id: String,
    pub name: String,
    pub url: String,
    pub size: i64,
    pub content_type: String,
    pub event_id: Option<String>,
    pub album_id: Option<String>,
    pub tags: Vec<String>,
    pub context: String,
    pub face_count: usize,
    pub created_at: String,
}

impl From<Photo> for ExportedPhoto {
    fn from(photo: Photo) -> Self {
        Self {
            id: photo.id,
            name: photo.name,
            url: photo.url,
            size: photo.size,
            content_type: photo.content_type,
            event_id: photo.event_id,
            album_id: photo.album_id,
            tags: photo.tags,
            context: photo.context,
            face_count: photo.faces.len(),
            created_at: photo.created_at.to_rfc3339(),
        }
    }
}

/// Write a manifest of an owner's photos, optionally limited to one event.
///
/// Returns the number of photos written.
pub fn export_photos(
    db: &Database,
    owner_id: &str,
    event_id: Option<&str>,
    output_path: &Path,
    format: ExportFormat,
) -> Result<usize> {
    let photos = get_photos_for_export(db, owner_id, event_id)?;
    let count = photos.len();

    match format {
        ExportFormat::Json => export_json(&photos, output_path)?,
        ExportFormat::Csv => export_csv(&photos, output_path)?,
    }

    tracing::info!(count, path = %output_path.display(), "Exported photo manifest");
    Ok(count)
}

fn get_photos_for_export(db: &Database, owner_id: &str, event_id: Option<&str>) -> Result<Vec<ExportedPhoto>> {
    let photos = match event_id {
        Some(event_id) => {
            if db.get_event(owner_id, event_id)?.is_none() {
                bail!("Event {} not found", event_id);
            }
            db.photos_in_event(event_id)?
                .into_iter()
                .filter(|photo| photo.user_id == owner_id)
                .collect()
        }
        None => db.list_photos(owner_id)?,
    };

    Ok(photos.into_iter().map(ExportedPhoto::from).collect())
}

fn export_json(photos: &[ExportedPhoto], output_path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(photos)?;
    let mut file = File::create(output_path)
        .with_context(|| format!("Failed to create {}", output_path.display()))?;
    file.write_all(json.as_bytes())?;
    Ok(())
}

fn export_csv(photos: &[ExportedPhoto], output_path: &Path) -> Result<()> {
    let mut wtr = csv::Writer::from_path(output_path)
        .with_context(|| format!("Failed to create {}", output_path.display()))?;

    wtr.write_record([
        "id",
        "name",
        "url",
        "size",
        "content_type",
        "event_id",
        "album_id",
        "tags",
        "context",
        "face_count",
        "created_at",
    ])?;

    for photo in photos {
        wtr.write_record([
            photo.id.as_str(),
            &photo.name,
            &photo.url,
            &photo.size.to_string(),
            &photo.content_type,
            photo.event_id.as_deref().unwrap_or(""),
            photo.album_id.as_deref().unwrap_or(""),
            &photo.tags.join(";"),
            &photo.context,
            &photo.face_count.to_string(),
            &photo.created_at,
        ])?;
    }

    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{test_db, NewEvent, NewPhoto};
    use chrono::NaiveDate;
    use tempfile::tempdir;

    fn add_photo(db: &Database, owner: &str, name: &str, event_id: Option<&str>) {
        db.insert_photo(&NewPhoto {
            user_id: owner.to_string(),
            name: name.to_string(),
            storage_path: format!("{}/{}", owner, name),
            url: format!("http://cdn.test/photos/{}/{}", owner, name),
            size: 2048,
            content_type: "image/jpeg".to_string(),
            album_id: None,
            event_id: event_id.map(str::to_string),
            tags: vec!["stage".to_string(), "lights".to_string()],
            context: "Band on stage, \"encore\"".to_string(),
            embedding: None,
            faces: vec!["f1".to_string(), "f2".to_string()],
            metadata: serde_json::json!({}),
        })
        .unwrap();
    }

    #[test]
    fn test_format_parsing() {
        assert_eq!("JSON".parse::<ExportFormat>().unwrap(), ExportFormat::Json);
        assert_eq!("csv".parse::<ExportFormat>().unwrap(), ExportFormat::Csv);
        assert!("html".parse::<ExportFormat>().is_err());
    }

    #[test]
    fn test_export_json_owner_only() {
        let db = test_db();
        add_photo(&db, "alice", "a.jpg", None);
        add_photo(&db, "bob", "b.jpg", None);

        let dir = tempdir().unwrap();
        let path = dir.path().join("manifest.json");
        assert_eq!(export_photos(&db, "alice", None, &path, ExportFormat::Json).unwrap(), 1);

        let rows: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(rows[0]["name"], "a.jpg");
        assert_eq!(rows[0]["face_count"], 2);
        assert_eq!(rows[0]["tags"][1], "lights");
    }

    #[test]
    fn test_export_csv_for_event() {
        let db = test_db();
        let event = db
            .create_event(
                "alice",
                &NewEvent {
                    name: "Concert".to_string(),
                    date: NaiveDate::from_ymd_opt(2024, 3, 9).unwrap(),
                    description: None,
                    location: None,
                    is_public: false,
                },
                8,
            )
            .unwrap();
        add_photo(&db, "alice", "in.jpg", Some(&event.id));
        add_photo(&db, "alice", "out.jpg", None);

        let dir = tempdir().unwrap();
        let path = dir.path().join("manifest.csv");
        assert_eq!(
            export_photos(&db, "alice", Some(&event.id), &path, ExportFormat::Csv).unwrap(),
            1
        );

        let mut reader = csv::Reader::from_path(&path).unwrap();
        let records: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(records.len(), 1);
        assert_eq!(&records[0][1], "in.jpg");
        assert_eq!(&records[0][7], "stage;lights");
        assert_eq!(&records[0][8], "Band on stage, \"encore\"");

        assert!(export_photos(&db, "bob", Some(&event.id), &path, ExportFormat::Csv).is_err());
    }
}
