//! Named reference embeddings registered by a user.

use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{params, Row};
use serde::Serialize;

use super::embeddings::{bytes_to_embedding, embedding_to_bytes};
use super::{new_id, optional, Database};

#[derive(Debug, Clone, Serialize)]
pub struct FaceProfile {
    pub id: String,
    pub user_id: String,
    pub name: String,
    #[serde(skip)]
    pub embedding: Vec<f32>,
    pub reference_photo_url: String,
    pub created_at: DateTime<Utc>,
}

fn row_to_profile(row: &Row) -> rusqlite::Result<FaceProfile> {
    let bytes: Vec<u8> = row.get(3)?;
    Ok(FaceProfile {
        id: row.get(0)?,
        user_id: row.get(1)?,
        name: row.get(2)?,
        embedding: bytes_to_embedding(&bytes),
        reference_photo_url: row.get(4)?,
        created_at: row.get(5)?,
    })
}

impl Database {
    pub fn insert_face_profile(
        &self,
        user_id: &str,
        name: &str,
        embedding: &[f32],
        reference_photo_url: &str,
    ) -> Result<FaceProfile> {
        let profile = FaceProfile {
            id: new_id(),
            user_id: user_id.to_string(),
            name: name.to_string(),
            embedding: embedding.to_vec(),
            reference_photo_url: reference_photo_url.to_string(),
            created_at: Utc::now(),
        };
        self.conn.execute(
            r#"
            INSERT INTO face_profiles (id, user_id, name, embedding, embedding_dim, reference_photo_url, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
            params![
                profile.id,
                profile.user_id,
                profile.name,
                embedding_to_bytes(embedding),
                embedding.len() as i64,
                profile.reference_photo_url,
                profile.created_at,
            ],
        )?;
        Ok(profile)
    }

    pub fn list_face_profiles(&self, user_id: &str) -> Result<Vec<FaceProfile>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, user_id, name, embedding, reference_photo_url, created_at
            FROM face_profiles
            WHERE user_id = ?
            ORDER BY name COLLATE NOCASE, created_at
            "#,
        )?;
        let profiles = stmt
            .query_map([user_id], row_to_profile)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(profiles)
    }

    pub fn get_face_profile(&self, user_id: &str, profile_id: &str) -> Result<Option<FaceProfile>> {
        optional(self.conn.query_row(
            r#"
            SELECT id, user_id, name, embedding, reference_photo_url, created_at
            FROM face_profiles
            WHERE id = ? AND user_id = ?
            "#,
            params![profile_id, user_id],
            row_to_profile,
        ))
    }

    pub fn delete_face_profile(&self, user_id: &str, profile_id: &str) -> Result<bool> {
        let removed = self.conn.execute(
            "DELETE FROM face_profiles WHERE id = ? AND user_id = ?",
            params![profile_id, user_id],
        )?;
        Ok(removed > 0)
    }
}
