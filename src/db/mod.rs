//! Relational store for photos, albums, events, face profiles and shared links.
//!
//! Every table carries a `user_id`; mutating queries filter on it so a caller
//! can never touch another owner's rows. The event photo counter and the
//! similarity search are implemented here as single statements so they stay
//! atomic no matter how many connections write at once.

mod schema;
pub mod albums;
pub mod embeddings;
pub mod events;
pub mod face_profiles;
pub mod photos;
pub mod shared_links;

use anyhow::{Context, Result};
use rusqlite::types::Type;
use rusqlite::{Connection, Row};
use serde::de::DeserializeOwned;
use std::path::Path;
use std::time::Duration;

pub use schema::{MIGRATIONS, SCHEMA};
pub use albums::Album;
pub use embeddings::{cosine_similarity, SearchHit};
pub use events::{Event, EventUpdate, NewEvent};
pub use face_profiles::FaceProfile;
pub use photos::{NewPhoto, Photo};
pub use shared_links::SharedLink;

/// How long a writer waits on a locked database before giving up.
const BUSY_TIMEOUT: Duration = Duration::from_secs(10);

pub struct Database {
    pub(crate) conn: Connection,
}

impl Database {
    /// Open (or create) the database file at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
        }
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database at {}", path.display()))?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        Ok(Self { conn })
    }

    /// Private in-memory database, used by tests and dry runs.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self { conn })
    }

    pub fn initialize(&self) -> Result<()> {
        // WAL lets readers proceed while an upload is being recorded
        let _ = self.conn.pragma_update(None, "journal_mode", "WAL");
        self.conn.execute_batch(SCHEMA)?;
        self.run_migrations()?;
        Ok(())
    }

    fn run_migrations(&self) -> Result<()> {
        for migration in MIGRATIONS {
            let _ = self.conn.execute(migration, []);
        }
        Ok(())
    }
}

/// Generate a fresh row identifier.
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Decode a JSON text column.
pub(crate) fn json_column<T: DeserializeOwned>(row: &Row, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// Convert an optional "no rows" result into `None`.
pub(crate) fn optional<T>(result: rusqlite::Result<T>) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
pub(crate) fn test_db() -> Database {
    let db = Database::open_in_memory().unwrap();
    db.initialize().unwrap();
    db
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initialize_is_repeatable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("eventlens.db");

        Database::open(&path).unwrap().initialize().unwrap();
        let db = Database::open(&path).unwrap();
        db.initialize().unwrap();

        let columns: Vec<String> = db
            .conn
            .prepare("SELECT name FROM pragma_table_info('events')")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<rusqlite::Result<_>>()
            .unwrap();
        assert_eq!(columns.iter().filter(|c| *c == "cover_image_url").count(), 1);
    }
}
