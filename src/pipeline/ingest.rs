//! Upload ingestion.
//!
//! An upload runs as a short saga: store the bytes, enrich them through the
//! remote functions, record the photo row, bump the event counter. Enrichment
//! and the counter degrade softly; storing and recording are hard failures.
//! A failure after the bytes were stored reports the orphaned path so it can
//! be collected by [`super::reconcile`].

use anyhow::{Context as _, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::Path;
use thiserror::Error;
use tracing::{error, info, warn};

use super::metadata::{build_metadata, content_type_for};
use super::{Context, Step};
use crate::db::{NewPhoto, Photo};
use crate::error::{PipelineError, SoftFailure};
use crate::functions::{check_embedding, ANALYZE_IMAGE};
use crate::storage::{check_owner_id, storage_path_for};

/// A file selected for upload.
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub name: String,
    pub bytes: Vec<u8>,
    pub last_modified: Option<DateTime<Utc>>,
}

impl UploadFile {
    pub fn from_path(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let last_modified = std::fs::metadata(path)
            .and_then(|m| m.modified())
            .ok()
            .map(DateTime::<Utc>::from);
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());

        Ok(Self {
            name,
            bytes,
            last_modified,
        })
    }
}

/// What the analysis function contributed to a photo.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Enrichment {
    Succeeded {
        tags: Vec<String>,
        context: String,
        #[serde(skip)]
        embedding: Vec<f32>,
    },
    Skipped {
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FaceScan {
    Detected { face_ids: Vec<String> },
    Skipped { reason: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct IngestOutcome {
    pub photo: Photo,
    pub enrichment: Enrichment,
    pub faces: FaceScan,
    pub steps: Vec<Step>,
    pub warnings: Vec<SoftFailure>,
}

#[derive(Debug, Error)]
#[error("failed to ingest {name}")]
pub struct IngestFailure {
    pub name: String,
    #[source]
    pub error: PipelineError,
    pub steps: Vec<Step>,
    /// Stored object left without a photo row.
    pub orphaned_path: Option<String>,
}

#[derive(Debug, Default)]
pub struct BatchReport {
    pub results: Vec<Result<IngestOutcome, IngestFailure>>,
}

impl BatchReport {
    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.results.len() - self.succeeded()
    }
}

/// Store, enrich and record a single upload.
pub fn ingest(
    ctx: &Context,
    file: &UploadFile,
    owner_id: &str,
    event_id: Option<&str>,
    album_id: Option<&str>,
) -> Result<IngestOutcome, IngestFailure> {
    let mut steps = Vec::new();
    let fail = |error: PipelineError, steps: Vec<Step>, orphaned_path: Option<String>| {
        error!(name = %file.name, error = %error, ?orphaned_path, "Ingestion failed");
        IngestFailure {
            name: file.name.clone(),
            error,
            steps,
            orphaned_path,
        }
    };

    if let Err(e) = check_targets(ctx, owner_id, event_id, album_id) {
        return Err(fail(e, steps, None));
    }

    let storage_path = match storage_path_for(owner_id, &file.name) {
        Ok(path) => path,
        Err(e) => return Err(fail(PipelineError::invalid(e), steps, None)),
    };
    if let Err(e) = ctx.store.put(&storage_path, &file.bytes) {
        let error = PipelineError::StorageWrite {
            path: storage_path,
            source: e.into(),
        };
        return Err(fail(error, steps, None));
    }
    steps.push(Step::Stored);

    let url = ctx.store.public_url(&storage_path);
    let mut warnings = Vec::new();

    let enrichment = analyze(ctx, &url);
    match &enrichment {
        Enrichment::Succeeded { .. } => steps.push(Step::Analyzed),
        Enrichment::Skipped { reason } => {
            warn!(%url, %reason, "Image analysis skipped");
            warnings.push(SoftFailure::AnalysisDegraded {
                reason: reason.clone(),
            });
        }
    }

    let faces = match ctx.functions.detect_faces(&url) {
        Ok(face_ids) => {
            steps.push(Step::FacesDetected);
            FaceScan::Detected { face_ids }
        }
        Err(e) => {
            let reason = e.to_string();
            warn!(%url, %reason, "Face detection skipped");
            warnings.push(SoftFailure::FaceDetectionDegraded {
                reason: reason.clone(),
            });
            FaceScan::Skipped { reason }
        }
    };

    let (tags, context, embedding) = match &enrichment {
        Enrichment::Succeeded {
            tags,
            context,
            embedding,
        } => (tags.clone(), context.clone(), Some(embedding.clone())),
        Enrichment::Skipped { .. } => (Vec::new(), String::new(), None),
    };
    let face_ids = match &faces {
        FaceScan::Detected { face_ids } => face_ids.clone(),
        FaceScan::Skipped { .. } => Vec::new(),
    };

    let new_photo = NewPhoto {
        user_id: owner_id.to_string(),
        name: file.name.clone(),
        storage_path: storage_path.clone(),
        url,
        size: file.bytes.len() as i64,
        content_type: content_type_for(&file.name),
        album_id: album_id.map(str::to_string),
        event_id: event_id.map(str::to_string),
        tags,
        context,
        embedding,
        faces: face_ids,
        metadata: build_metadata(&file.name, &file.bytes, file.last_modified, &enrichment, &faces),
    };

    let photo = match ctx.db.insert_photo(&new_photo) {
        Ok(photo) => photo,
        Err(e) => {
            let error = PipelineError::MetadataWrite {
                storage_path: storage_path.clone(),
                source: e.into(),
            };
            return Err(fail(error, steps, Some(storage_path)));
        }
    };
    steps.push(Step::Recorded);

    if let Some(event_id) = event_id {
        match ctx.db.increment_event_photo_count(owner_id, event_id) {
            Ok(true) => steps.push(Step::Counted),
            Ok(false) => warnings.push(counter_failed(event_id, "event no longer exists")),
            Err(e) => warnings.push(counter_failed(event_id, &format!("{:#}", e))),
        }
    }

    info!(photo_id = %photo.id, path = %photo.storage_path, ?steps, "Photo ingested");

    Ok(IngestOutcome {
        photo,
        enrichment,
        faces,
        steps,
        warnings,
    })
}

/// Ingest each file in turn. One failure never stops the rest.
pub fn ingest_batch(
    ctx: &Context,
    files: &[UploadFile],
    owner_id: &str,
    event_id: Option<&str>,
    album_id: Option<&str>,
) -> BatchReport {
    let results = files
        .iter()
        .map(|file| ingest(ctx, file, owner_id, event_id, album_id))
        .collect();
    let report = BatchReport { results };

    info!(
        succeeded = report.succeeded(),
        failed = report.failed(),
        "Batch upload finished"
    );
    report
}

fn analyze(ctx: &Context, url: &str) -> Enrichment {
    let analysis = ctx.functions.analyze_image(url).and_then(|analysis| {
        check_embedding(ANALYZE_IMAGE, &analysis.embedding, ctx.config.functions.embedding_dim)?;
        Ok(analysis)
    });

    match analysis {
        Ok(analysis) => Enrichment::Succeeded {
            tags: analysis.tags,
            context: analysis.context,
            embedding: analysis.embedding,
        },
        Err(e) => Enrichment::Skipped {
            reason: e.to_string(),
        },
    }
}

/// Album and event must exist and belong to the uploader before anything is stored.
fn check_targets(
    ctx: &Context,
    owner_id: &str,
    event_id: Option<&str>,
    album_id: Option<&str>,
) -> Result<(), PipelineError> {
    check_owner_id(owner_id).map_err(PipelineError::invalid)?;

    if let Some(album_id) = album_id {
        let album = ctx
            .db
            .get_album(owner_id, album_id)
            .map_err(|e| PipelineError::store("Failed to look up album", e))?;
        if album.is_none() {
            return Err(PipelineError::not_found("album", album_id));
        }
    }

    if let Some(event_id) = event_id {
        let event = ctx
            .db
            .get_event(owner_id, event_id)
            .map_err(|e| PipelineError::store("Failed to look up event", e))?;
        if event.is_none() {
            return Err(PipelineError::not_found("event", event_id));
        }
    }

    Ok(())
}

fn counter_failed(event_id: &str, reason: &str) -> SoftFailure {
    warn!(%event_id, %reason, "Event photo count not incremented");
    SoftFailure::CounterUpdateFailed {
        event_id: event_id.to_string(),
        reason: reason.to_string(),
    }
}
