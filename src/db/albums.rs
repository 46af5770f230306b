//! Albums: named, owner-scoped groupings of photos.

use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{params, Row};
use serde::Serialize;

use super::{new_id, optional, Database};

#[derive(Debug, Clone, Serialize)]
pub struct Album {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub description: Option<String>,
    pub cover_image_url: Option<String>,
    pub is_public: bool,
    pub created_at: DateTime<Utc>,
}

fn row_to_album(row: &Row) -> rusqlite::Result<Album> {
    Ok(Album {
        id: row.get(0)?,
        user_id: row.get(1)?,
        name: row.get(2)?,
        description: row.get(3)?,
        cover_image_url: row.get(4)?,
        is_public: row.get(5)?,
        created_at: row.get(6)?,
    })
}

const ALBUM_COLUMNS: &str = "id, user_id, name, description, cover_image_url, is_public, created_at";

impl Database {
    pub fn create_album(
        &self,
        user_id: &str,
        name: &str,
        description: Option<&str>,
        is_public: bool,
    ) -> Result<Album> {
        let album = Album {
            id: new_id(),
            user_id: user_id.to_string(),
            name: name.to_string(),
            description: description.map(str::to_string),
            cover_image_url: None,
            is_public,
            created_at: Utc::now(),
        };
        self.conn.execute(
            "INSERT INTO albums (id, user_id, name, description, cover_image_url, is_public, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
            params![
                album.id,
                album.user_id,
                album.name,
                album.description,
                album.cover_image_url,
                album.is_public,
                album.created_at,
            ],
        )?;
        Ok(album)
    }

    /// Albums of an owner, newest first.
    pub fn list_albums(&self, user_id: &str) -> Result<Vec<Album>> {
        let sql = format!(
            "SELECT {} FROM albums WHERE user_id = ? ORDER BY created_at DESC, rowid DESC",
            ALBUM_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let albums = stmt
            .query_map([user_id], row_to_album)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(albums)
    }

    pub fn get_album(&self, user_id: &str, album_id: &str) -> Result<Option<Album>> {
        let sql = format!("SELECT {} FROM albums WHERE id = ? AND user_id = ?", ALBUM_COLUMNS);
        optional(self.conn.query_row(&sql, params![album_id, user_id], row_to_album))
    }

    pub fn update_album_cover(&self, user_id: &str, album_id: &str, cover_image_url: &str) -> Result<bool> {
        let updated = self.conn.execute(
            "UPDATE albums SET cover_image_url = ? WHERE id = ? AND user_id = ?",
            params![cover_image_url, album_id, user_id],
        )?;
        Ok(updated > 0)
    }

    /// Delete an album, detaching its photos first.
    ///
    /// Both statements run in one transaction, so no photo is ever left
    /// pointing at an album row that no longer exists. Returns the number of
    /// photos that were detached, or `None` if the album was not found.
    pub fn delete_album(&self, user_id: &str, album_id: &str) -> Result<Option<usize>> {
        let tx = self.conn.unchecked_transaction()?;

        let exists: bool = tx.query_row(
            "SELECT EXISTS (SELECT 1 FROM albums WHERE id = ? AND user_id = ?)",
            params![album_id, user_id],
            |row| row.get(0),
        )?;
        if !exists {
            return Ok(None);
        }

        let detached = tx.execute(
            "UPDATE photos SET album_id = NULL WHERE album_id = ?",
            [album_id],
        )?;
        tx.execute(
            "DELETE FROM albums WHERE id = ? AND user_id = ?",
            params![album_id, user_id],
        )?;
        tx.commit()?;

        Ok(Some(detached))
    }
}

#[cfg(test)]
mod tests {
    use crate::db::{test_db, NewPhoto};

    fn photo_in_album(album_id: &str, path: &str) -> NewPhoto {
        NewPhoto {
            user_id: "alice".to_string(),
            name: path.to_string(),
            storage_path: path.to_string(),
            url: format!("http://localhost/{}", path),
            size: 1,
            content_type: "image/png".to_string(),
            album_id: Some(album_id.to_string()),
            event_id: None,
            tags: vec![],
            context: String::new(),
            embedding: None,
            faces: vec![],
            metadata: serde_json::json!({}),
        }
    }

    #[test]
    fn test_delete_album_detaches_photos() {
        let db = test_db();
        let album = db.create_album("alice", "Summer", None, false).unwrap();
        let a = db.insert_photo(&photo_in_album(&album.id, "alice/a.png")).unwrap();
        let b = db.insert_photo(&photo_in_album(&album.id, "alice/b.png")).unwrap();

        assert_eq!(db.delete_album("alice", &album.id).unwrap(), Some(2));

        assert!(db.get_album("alice", &album.id).unwrap().is_none());
        assert_eq!(db.get_photo("alice", &a.id).unwrap().unwrap().album_id, None);
        assert_eq!(db.get_photo("alice", &b.id).unwrap().unwrap().album_id, None);
    }

    #[test]
    fn test_delete_album_of_other_owner_is_refused() {
        let db = test_db();
        let album = db.create_album("alice", "Summer", Some("beach days"), true).unwrap();
        let photo = db.insert_photo(&photo_in_album(&album.id, "alice/a.png")).unwrap();

        assert_eq!(db.delete_album("bob", &album.id).unwrap(), None);
        assert!(db.get_album("alice", &album.id).unwrap().is_some());
        assert_eq!(
            db.get_photo("alice", &photo.id).unwrap().unwrap().album_id.as_deref(),
            Some(album.id.as_str())
        );
    }

    #[test]
    fn test_update_cover_and_list() {
        let db = test_db();
        let first = db.create_album("alice", "One", None, false).unwrap();
        db.create_album("alice", "Two", None, false).unwrap();
        db.create_album("bob", "Other", None, false).unwrap();

        assert!(db.update_album_cover("alice", &first.id, "http://localhost/cover.jpg").unwrap());
        assert!(!db.update_album_cover("bob", &first.id, "http://localhost/x.jpg").unwrap());

        let albums = db.list_albums("alice").unwrap();
        assert_eq!(albums.len(), 2);
        assert_eq!(albums[0].name, "Two");
        assert_eq!(albums[1].cover_image_url.as_deref(), Some("http://localhost/cover.jpg"));
    }
}
