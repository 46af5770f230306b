//! Error taxonomy for pipeline operations.
//!
//! Hard failures abort the operation that raised them and are returned as
//! [`PipelineError`]. Enrichment and counter problems never abort anything;
//! they are logged and reported alongside a successful result as
//! [`SoftFailure`].

use serde::Serialize;
use thiserror::Error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Failure talking to a remote function.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("request to {function} failed: {message}")]
    Transport { function: &'static str, message: String },

    #[error("{function} rejected the request ({status}): {message}")]
    Rejected {
        function: &'static str,
        status: u16,
        message: String,
    },

    #[error("{function} returned an unusable reply: {message}")]
    Malformed { function: &'static str, message: String },
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("failed to store object at {path}")]
    StorageWrite {
        path: String,
        #[source]
        source: BoxError,
    },

    #[error("failed to remove stored objects {paths:?}")]
    StorageDelete {
        paths: Vec<String>,
        #[source]
        source: BoxError,
    },

    #[error("failed to write photo record for {storage_path}")]
    MetadataWrite {
        storage_path: String,
        #[source]
        source: BoxError,
    },

    #[error("failed to delete photo record {photo_id}")]
    MetadataDelete {
        photo_id: String,
        #[source]
        source: BoxError,
    },

    #[error("could not embed query: {reason}")]
    Embedding { reason: String },

    #[error("could not extract a face embedding from {image_url}: {reason}")]
    FaceExtraction { image_url: String, reason: String },

    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: String },

    #[error("invalid input: {reason}")]
    InvalidInput { reason: String },

    #[error("{context}")]
    Store {
        context: String,
        #[source]
        source: BoxError,
    },

    #[error(transparent)]
    Service(#[from] ServiceError),
}

impl PipelineError {
    pub(crate) fn store(context: impl Into<String>, source: anyhow::Error) -> Self {
        PipelineError::Store {
            context: context.into(),
            source: source.into(),
        }
    }

    pub(crate) fn not_found(kind: &'static str, id: &str) -> Self {
        PipelineError::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    pub(crate) fn invalid(reason: impl std::fmt::Display) -> Self {
        PipelineError::InvalidInput {
            reason: reason.to_string(),
        }
    }
}

/// A problem that was logged but did not fail the operation.
#[derive(Debug, Clone, PartialEq, Serialize, Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SoftFailure {
    #[error("image analysis skipped: {reason}")]
    AnalysisDegraded { reason: String },

    #[error("face detection skipped: {reason}")]
    FaceDetectionDegraded { reason: String },

    #[error("photo count of event {event_id} not updated: {reason}")]
    CounterUpdateFailed { event_id: String, reason: String },
}
