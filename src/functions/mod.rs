//! Remote functions: image analysis, face detection, embeddings,
//! face verification and bulk download links.
//!
//! Every function answers either with its payload or with `{"error": "..."}`.
//! Replies are decoded into [`Reply`] and turned into a `Result` on receipt,
//! so nothing downstream ever sees an untyped body.

mod http;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::FunctionsConfig;
use crate::error::ServiceError;

pub use http::HttpFunctions;

pub const ANALYZE_IMAGE: &str = "analyze-image";
pub const DETECT_FACES: &str = "detect-faces";
pub const EMBED_TEXT: &str = "embed-text";
pub const EXTRACT_FACE_EMBEDDING: &str = "extract-face-embedding";
pub const VERIFY_FACE_ACCESS: &str = "verify-face-access";
pub const GENERATE_DOWNLOAD_LINK: &str = "generate-download-link";

/// Result of analyzing a stored image.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ImageAnalysis {
    #[serde(default)]
    pub context: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub embedding: Vec<f32>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FaceVerdict {
    #[serde(rename = "hasAccess")]
    pub has_access: bool,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownloadLink {
    #[serde(rename = "downloadUrl")]
    pub download_url: String,
    #[serde(rename = "expiresAt")]
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct FaceIdsReply {
    #[serde(rename = "faceIds")]
    pub face_ids: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct EmbeddingReply {
    pub embedding: Vec<f32>,
}

/// Body of a remote function reply.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum Reply<T> {
    Failure { error: String },
    Data(T),
}

impl<T> Reply<T> {
    pub fn into_result(self, function: &'static str, status: u16) -> Result<T, ServiceError> {
        match self {
            Reply::Data(data) => Ok(data),
            Reply::Failure { error } => Err(ServiceError::Rejected {
                function,
                status,
                message: error,
            }),
        }
    }
}

/// The set of remote functions the pipeline depends on.
pub trait RemoteFunctions: Send + Sync {
    fn analyze_image(&self, image_url: &str) -> Result<ImageAnalysis, ServiceError>;

    /// Identifiers of the faces found in the image.
    fn detect_faces(&self, image_url: &str) -> Result<Vec<String>, ServiceError>;

    fn embed_text(&self, text: &str) -> Result<Vec<f32>, ServiceError>;

    fn extract_face_embedding(&self, image_url: &str) -> Result<Vec<f32>, ServiceError>;

    fn verify_face_access(
        &self,
        selfie_url: &str,
        event_id: &str,
    ) -> Result<FaceVerdict, ServiceError>;

    fn prepare_download(&self, event_id: &str) -> Result<DownloadLink, ServiceError>;
}

/// Reject embeddings that do not have the configured length.
pub fn check_embedding(
    function: &'static str,
    embedding: &[f32],
    expected_dim: usize,
) -> Result<(), ServiceError> {
    if embedding.len() != expected_dim {
        return Err(ServiceError::Malformed {
            function,
            message: format!(
                "embedding has {} dimensions, expected {}",
                embedding.len(),
                expected_dim
            ),
        });
    }
    if embedding.iter().any(|v| !v.is_finite()) {
        return Err(ServiceError::Malformed {
            function,
            message: "embedding contains non-finite values".to_string(),
        });
    }
    Ok(())
}

pub fn create_functions(config: &FunctionsConfig) -> Box<dyn RemoteFunctions> {
    Box::new(HttpFunctions::new(config))
}
