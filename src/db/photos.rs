//! Photo records.

use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{params, Row};
use serde::Serialize;

use super::embeddings::{bytes_to_embedding, embedding_to_bytes};
use super::{json_column, new_id, optional, Database};

/// A stored photo and everything derived from it.
#[derive(Debug, Clone, Serialize)]
pub struct Photo {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub storage_path: String,
    pub url: String,
    pub size: i64,
    pub content_type: String,
    pub album_id: Option<String>,
    pub event_id: Option<String>,
    pub tags: Vec<String>,
    pub context: String,
    #[serde(skip)]
    pub embedding: Option<Vec<f32>>,
    pub faces: Vec<String>,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// Values for a photo row that has not been written yet.
#[derive(Debug, Clone)]
pub struct NewPhoto {
    pub user_id: String,
    pub name: String,
    pub storage_path: String,
    pub url: String,
    pub size: i64,
    pub content_type: String,
    pub album_id: Option<String>,
    pub event_id: Option<String>,
    pub tags: Vec<String>,
    pub context: String,
    pub embedding: Option<Vec<f32>>,
    pub faces: Vec<String>,
    pub metadata: serde_json::Value,
}

const PHOTO_COLUMNS: &str = "id, user_id, name, storage_path, url, size, content_type, \
     album_id, event_id, tags, context, embedding, faces, metadata, created_at";

pub(crate) fn row_to_photo(row: &Row) -> rusqlite::Result<Photo> {
    let embedding: Option<Vec<u8>> = row.get(11)?;
    Ok(Photo {
        id: row.get(0)?,
        user_id: row.get(1)?,
        name: row.get(2)?,
        storage_path: row.get(3)?,
        url: row.get(4)?,
        size: row.get(5)?,
        content_type: row.get(6)?,
        album_id: row.get(7)?,
        event_id: row.get(8)?,
        tags: json_column(row, 9)?,
        context: row.get(10)?,
        embedding: embedding.map(|bytes| bytes_to_embedding(&bytes)),
        faces: json_column(row, 12)?,
        metadata: json_column(row, 13)?,
        created_at: row.get(14)?,
    })
}

impl Database {
    /// Insert a photo row and return it as stored.
    pub fn insert_photo(&self, new_photo: &NewPhoto) -> Result<Photo> {
        let photo = Photo {
            id: new_id(),
            user_id: new_photo.user_id.clone(),
            name: new_photo.name.clone(),
            storage_path: new_photo.storage_path.clone(),
            url: new_photo.url.clone(),
            size: new_photo.size,
            content_type: new_photo.content_type.clone(),
            album_id: new_photo.album_id.clone(),
            event_id: new_photo.event_id.clone(),
            tags: new_photo.tags.clone(),
            context: new_photo.context.clone(),
            embedding: new_photo.embedding.clone(),
            faces: new_photo.faces.clone(),
            metadata: new_photo.metadata.clone(),
            created_at: Utc::now(),
        };

        let embedding_bytes = photo.embedding.as_deref().map(embedding_to_bytes);
        let embedding_dim = photo.embedding.as_ref().map(|e| e.len() as i64);

        self.conn.execute(
            r#"
            INSERT INTO photos (id, user_id, name, storage_path, url, size, content_type,
                                album_id, event_id, tags, context, embedding, embedding_dim,
                                faces, metadata, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
            params![
                photo.id,
                photo.user_id,
                photo.name,
                photo.storage_path,
                photo.url,
                photo.size,
                photo.content_type,
                photo.album_id,
                photo.event_id,
                serde_json::to_string(&photo.tags)?,
                photo.context,
                embedding_bytes,
                embedding_dim,
                serde_json::to_string(&photo.faces)?,
                serde_json::to_string(&photo.metadata)?,
                photo.created_at,
            ],
        )?;

        Ok(photo)
    }

    /// Get a photo owned by `user_id`.
    pub fn get_photo(&self, user_id: &str, photo_id: &str) -> Result<Option<Photo>> {
        let sql = format!("SELECT {} FROM photos WHERE id = ? AND user_id = ?", PHOTO_COLUMNS);
        optional(self.conn.query_row(&sql, params![photo_id, user_id], row_to_photo))
    }

    /// All photos of an owner, newest first.
    pub fn list_photos(&self, user_id: &str) -> Result<Vec<Photo>> {
        self.query_photos(
            "WHERE user_id = ? ORDER BY created_at DESC, rowid DESC",
            params![user_id],
        )
    }

    pub fn photos_in_album(&self, user_id: &str, album_id: &str) -> Result<Vec<Photo>> {
        self.query_photos(
            "WHERE user_id = ? AND album_id = ? ORDER BY created_at DESC, rowid DESC",
            params![user_id, album_id],
        )
    }

    /// Photos attached to an event. Not owner-scoped: shared link viewers read these.
    pub fn photos_in_event(&self, event_id: &str) -> Result<Vec<Photo>> {
        self.query_photos(
            "WHERE event_id = ? ORDER BY created_at DESC, rowid DESC",
            params![event_id],
        )
    }

    /// Photos whose detected faces include `face_id`.
    pub fn photos_with_face(&self, user_id: &str, face_id: &str) -> Result<Vec<Photo>> {
        self.query_photos(
            r#"
            WHERE user_id = ?
              AND EXISTS (SELECT 1 FROM json_each(photos.faces) WHERE json_each.value = ?)
            ORDER BY created_at DESC, rowid DESC
            "#,
            params![user_id, face_id],
        )
    }

    fn query_photos(&self, clause: &str, params: impl rusqlite::Params) -> Result<Vec<Photo>> {
        let sql = format!("SELECT {} FROM photos {}", PHOTO_COLUMNS, clause);
        let mut stmt = self.conn.prepare(&sql)?;
        let photos = stmt
            .query_map(params, row_to_photo)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(photos)
    }

    /// Delete a photo row. Returns the number of rows removed (0 or 1).
    pub fn delete_photo_row(&self, user_id: &str, photo_id: &str) -> Result<usize> {
        let removed = self.conn.execute(
            "DELETE FROM photos WHERE id = ? AND user_id = ?",
            params![photo_id, user_id],
        )?;
        Ok(removed)
    }

    /// Point the given photos at an album. Photos of other owners are left alone.
    pub fn assign_photos_to_album(&self, user_id: &str, album_id: &str, photo_ids: &[String]) -> Result<usize> {
        let tx = self.conn.unchecked_transaction()?;
        let mut updated = 0;
        {
            let mut stmt = tx.prepare(
                "UPDATE photos SET album_id = ? WHERE id = ? AND user_id = ?",
            )?;
            for photo_id in photo_ids {
                updated += stmt.execute(params![album_id, photo_id, user_id])?;
            }
        }
        tx.commit()?;
        Ok(updated)
    }

    /// `(id, storage_path)` for every photo of an owner.
    pub fn photo_paths(&self, user_id: &str) -> Result<Vec<(String, String)>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, storage_path FROM photos WHERE user_id = ? ORDER BY rowid",
        )?;
        let rows = stmt
            .query_map([user_id], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn count_photos_in_event(&self, event_id: &str) -> Result<i64> {
        let count = self.conn.query_row(
            "SELECT COUNT(*) FROM photos WHERE event_id = ?",
            [event_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_db;

    fn sample(user_id: &str, path: &str) -> NewPhoto {
        NewPhoto {
            user_id: user_id.to_string(),
            name: "photo.jpg".to_string(),
            storage_path: path.to_string(),
            url: format!("http://localhost/{}", path),
            size: 1024,
            content_type: "image/jpeg".to_string(),
            album_id: None,
            event_id: None,
            tags: vec![],
            context: String::new(),
            embedding: None,
            faces: vec![],
            metadata: serde_json::json!({}),
        }
    }

    #[test]
    fn test_insert_and_get_photo() {
        let db = test_db();
        let mut new_photo = sample("alice", "alice/a.jpg");
        new_photo.tags = vec!["beach".to_string()];
        new_photo.faces = vec!["face-1".to_string()];
        new_photo.embedding = Some(vec![0.5, -0.25]);

        let stored = db.insert_photo(&new_photo).unwrap();
        let loaded = db.get_photo("alice", &stored.id).unwrap().unwrap();

        assert_eq!(loaded.tags, vec!["beach"]);
        assert_eq!(loaded.faces, vec!["face-1"]);
        assert_eq!(loaded.embedding, Some(vec![0.5, -0.25]));
        assert_eq!(loaded.storage_path, "alice/a.jpg");
    }

    #[test]
    fn test_photos_are_owner_scoped() {
        let db = test_db();
        let stored = db.insert_photo(&sample("alice", "alice/a.jpg")).unwrap();

        assert!(db.get_photo("bob", &stored.id).unwrap().is_none());
        assert_eq!(db.delete_photo_row("bob", &stored.id).unwrap(), 0);
        assert_eq!(db.list_photos("bob").unwrap().len(), 0);
        assert_eq!(db.list_photos("alice").unwrap().len(), 1);
    }

    #[test]
    fn test_photos_with_face() {
        let db = test_db();
        let mut with_face = sample("alice", "alice/a.jpg");
        with_face.faces = vec!["f1".to_string(), "f2".to_string()];
        db.insert_photo(&with_face).unwrap();
        db.insert_photo(&sample("alice", "alice/b.jpg")).unwrap();

        let mut other_owner = sample("bob", "bob/c.jpg");
        other_owner.faces = vec!["f1".to_string()];
        db.insert_photo(&other_owner).unwrap();

        let found = db.photos_with_face("alice", "f1").unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].storage_path, "alice/a.jpg");
        assert!(db.photos_with_face("alice", "f3").unwrap().is_empty());
    }

    #[test]
    fn test_duplicate_storage_path_is_rejected() {
        let db = test_db();
        db.insert_photo(&sample("alice", "alice/a.jpg")).unwrap();
        assert!(db.insert_photo(&sample("alice", "alice/a.jpg")).is_err());
    }
}
