//! Operations over photos, albums, events and shares.
//!
//! Every operation takes a [`Context`] holding the store connection, the
//! object store and the remote functions. Nothing here keeps global state,
//! so tests swap any of the three for a stand-in.

pub mod delete;
pub mod faces;
pub mod ingest;
pub mod library;
pub mod metadata;
pub mod reconcile;
pub mod search;
pub mod sharing;

#[cfg(test)]
pub(crate) mod test_support;

use anyhow::Result;
use serde::Serialize;
use std::sync::Arc;

use crate::config::Config;
use crate::db::Database;
use crate::functions::{create_functions, RemoteFunctions};
use crate::storage::{LocalObjectStore, ObjectStore};

pub use delete::{delete_album, delete_event, delete_photo, DeleteOutcome};
pub use faces::{create_face_profile, delete_face_profile, list_face_profiles, search_by_face};
pub use ingest::{ingest, ingest_batch, BatchReport, Enrichment, FaceScan, IngestFailure, IngestOutcome, UploadFile};
pub use reconcile::{reconcile, reconcile_at, ReconcileReport};
pub use search::search_by_text;
pub use sharing::{check_link_access, create_shareable_link, prepare_download, verify_face_access, AccessDecision};

pub struct Context {
    pub db: Database,
    pub store: Arc<dyn ObjectStore>,
    pub functions: Arc<dyn RemoteFunctions>,
    pub config: Config,
}

impl Context {
    pub fn new(
        db: Database,
        store: Arc<dyn ObjectStore>,
        functions: Arc<dyn RemoteFunctions>,
        config: Config,
    ) -> Self {
        Self {
            db,
            store,
            functions,
            config,
        }
    }

    /// Open the configured database, object store and remote functions.
    pub fn open(config: Config) -> Result<Self> {
        let db = Database::open(&config.db_path)?;
        db.initialize()?;

        let store: Arc<dyn ObjectStore> = Arc::new(LocalObjectStore::new(&config.storage));
        let functions: Arc<dyn RemoteFunctions> = Arc::from(create_functions(&config.functions));

        Ok(Self::new(db, store, functions, config))
    }
}

/// A completed step of an ingestion, in the order they run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    Stored,
    Analyzed,
    FacesDetected,
    Recorded,
    Counted,
}
