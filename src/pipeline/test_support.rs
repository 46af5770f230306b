//! Stand-ins for the remote functions and the object store.

use anyhow::{bail, Result};
use chrono::{Duration, Utc};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

use super::Context;
use crate::config::{Config, StorageConfig};
use crate::db::Database;
use crate::error::ServiceError;
use crate::functions::{DownloadLink, FaceVerdict, ImageAnalysis, RemoteFunctions};
use crate::storage::{LocalObjectStore, ObjectStore, StoredObject};

pub(crate) const DIM: usize = 4;

pub(crate) struct StubFunctions {
    pub fail_analysis: bool,
    pub fail_faces: bool,
    pub analysis_embedding: Vec<f32>,
    pub tags: Vec<String>,
    pub face_ids: Vec<String>,
    /// Embedding returned for each known query; unknown queries fail.
    pub text_embeddings: HashMap<String, Vec<f32>>,
    pub face_embedding: Option<Vec<f32>>,
    pub grant_access: bool,
}

impl Default for StubFunctions {
    fn default() -> Self {
        Self {
            fail_analysis: false,
            fail_faces: false,
            analysis_embedding: vec![1.0, 0.0, 0.0, 0.0],
            tags: vec!["stage".to_string(), "crowd".to_string()],
            face_ids: vec!["face-a".to_string()],
            text_embeddings: HashMap::new(),
            face_embedding: Some(vec![0.0, 1.0, 0.0, 0.0]),
            grant_access: true,
        }
    }
}

fn unavailable(function: &'static str) -> ServiceError {
    ServiceError::Transport {
        function,
        message: "connection refused".to_string(),
    }
}

impl RemoteFunctions for StubFunctions {
    fn analyze_image(&self, _image_url: &str) -> Result<ImageAnalysis, ServiceError> {
        if self.fail_analysis {
            return Err(unavailable("analyze-image"));
        }
        Ok(ImageAnalysis {
            context: "A concert stage".to_string(),
            tags: self.tags.clone(),
            embedding: self.analysis_embedding.clone(),
        })
    }

    fn detect_faces(&self, _image_url: &str) -> Result<Vec<String>, ServiceError> {
        if self.fail_faces {
            return Err(unavailable("detect-faces"));
        }
        Ok(self.face_ids.clone())
    }

    fn embed_text(&self, text: &str) -> Result<Vec<f32>, ServiceError> {
        self.text_embeddings
            .get(text)
            .cloned()
            .ok_or_else(|| unavailable("embed-text"))
    }

    fn extract_face_embedding(&self, _image_url: &str) -> Result<Vec<f32>, ServiceError> {
        self.face_embedding
            .clone()
            .ok_or_else(|| ServiceError::Rejected {
                function: "extract-face-embedding",
                status: 400,
                message: "no face found".to_string(),
            })
    }

    fn verify_face_access(
        &self,
        _selfie_url: &str,
        _event_id: &str,
    ) -> Result<FaceVerdict, ServiceError> {
        Ok(FaceVerdict {
            has_access: self.grant_access,
            message: None,
        })
    }

    fn prepare_download(&self, event_id: &str) -> Result<DownloadLink, ServiceError> {
        Ok(DownloadLink {
            download_url: format!("https://dl.test/{}/photos.zip", event_id),
            expires_at: Utc::now() + Duration::hours(24),
        })
    }
}

/// Local store that can be told to fail writes or removals.
pub(crate) struct FlakyStore {
    pub inner: LocalObjectStore,
    pub fail_put: bool,
    pub fail_remove: bool,
}

impl ObjectStore for FlakyStore {
    fn put(&self, path: &str, bytes: &[u8]) -> Result<()> {
        if self.fail_put {
            bail!("Bucket is read-only");
        }
        self.inner.put(path, bytes)
    }

    fn public_url(&self, path: &str) -> String {
        self.inner.public_url(path)
    }

    fn remove(&self, paths: &[String]) -> Result<()> {
        if self.fail_remove {
            bail!("Bucket is read-only");
        }
        self.inner.remove(paths)
    }

    fn list(&self, prefix: &str) -> Result<Vec<StoredObject>> {
        self.inner.list(prefix)
    }

    fn exists(&self, path: &str) -> Result<bool> {
        self.inner.exists(path)
    }
}

pub(crate) fn test_config(dir: &Path) -> Config {
    let mut config = Config::default();
    config.db_path = dir.join("eventlens.db");
    config.storage = StorageConfig {
        root: dir.join("objects"),
        public_base_url: "http://cdn.test/photos".to_string(),
        ..StorageConfig::default()
    };
    config.functions.embedding_dim = DIM;
    config
}

/// A context over an on-disk database in a fresh temporary directory.
pub(crate) struct Harness {
    pub ctx: Context,
    _dir: TempDir,
}

impl Harness {
    pub fn new(functions: StubFunctions) -> Self {
        Self::with_store_failures(functions, false, false)
    }

    pub fn with_store_failures(functions: StubFunctions, fail_put: bool, fail_remove: bool) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());

        let db = Database::open(&config.db_path).unwrap();
        db.initialize().unwrap();

        let store = FlakyStore {
            inner: LocalObjectStore::new(&config.storage),
            fail_put,
            fail_remove,
        };

        let ctx = Context::new(db, Arc::new(store), Arc::new(functions), config);
        Self { ctx, _dir: dir }
    }

    /// A context over the same database file that uses `store` for objects.
    pub fn with_store(&self, store: Arc<dyn ObjectStore>) -> Context {
        let config = self.ctx.config.clone();
        let db = Database::open(&config.db_path).unwrap();
        Context::new(db, store, self.ctx.functions.clone(), config)
    }

    /// A second context sharing the same database file and object root.
    pub fn reopen(&self, functions: Arc<dyn RemoteFunctions>) -> Context {
        let config = self.ctx.config.clone();
        let db = Database::open(&config.db_path).unwrap();
        let store = LocalObjectStore::new(&config.storage);
        Context::new(db, Arc::new(store), functions, config)
    }
}
