//! Embedding encoding and the `search_photos` similarity primitive.

use anyhow::Result;
use rusqlite::params;
use serde::Serialize;

use super::photos::{row_to_photo, Photo};
use super::Database;

/// A photo matched by similarity search.
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub photo: Photo,
    pub similarity: f32,
}

impl Database {
    /// Rank an owner's photos against `query_embedding`.
    ///
    /// Keeps photos with `similarity >= threshold`, sorted by descending
    /// similarity and truncated to `limit`. Photos with equal scores stay in
    /// insertion order.
    pub fn search_photos(
        &self,
        query_embedding: &[f32],
        user_id: &str,
        threshold: f32,
        limit: usize,
    ) -> Result<Vec<SearchHit>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, user_id, name, storage_path, url, size, content_type,
                   album_id, event_id, tags, context, embedding, faces, metadata, created_at
            FROM photos
            WHERE user_id = ? AND embedding IS NOT NULL AND embedding_dim = ?
            ORDER BY created_at, rowid
            "#,
        )?;

        let photos = stmt
            .query_map(params![user_id, query_embedding.len() as i64], row_to_photo)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut hits: Vec<SearchHit> = photos
            .into_iter()
            .filter_map(|photo| {
                let similarity = cosine_similarity(query_embedding, photo.embedding.as_deref()?);
                (similarity >= threshold).then_some(SearchHit { photo, similarity })
            })
            .collect();

        // sort_by is stable, so ties keep the store's order
        hits.sort_by(|a, b| b.similarity.partial_cmp(&a.similarity).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(limit);

        Ok(hits)
    }
}

/// Convert f32 slice to bytes for storage
pub(crate) fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(embedding.len() * 4);
    for &val in embedding {
        bytes.extend_from_slice(&val.to_le_bytes());
    }
    bytes
}

/// Convert bytes back to f32 vector
pub(crate) fn bytes_to_embedding(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Calculate cosine similarity between two vectors
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}
