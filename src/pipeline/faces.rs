//! Face profiles and face-based search.
//!
//! A profile stores the embedding extracted from a reference photo. Search
//! works on the face identifiers recorded at ingestion, not on profile
//! embeddings.

use tracing::{info, warn};

use super::Context;
use crate::db::{FaceProfile, Photo};
use crate::error::PipelineError;
use crate::functions::{check_embedding, EXTRACT_FACE_EMBEDDING};

/// Extract a face embedding from `reference_image_url` and save it as a named profile.
///
/// Nothing is persisted when extraction fails.
pub fn create_face_profile(
    ctx: &Context,
    owner_id: &str,
    name: &str,
    reference_image_url: &str,
) -> Result<FaceProfile, PipelineError> {
    let embedding = ctx
        .functions
        .extract_face_embedding(reference_image_url)
        .and_then(|embedding| {
            check_embedding(
                EXTRACT_FACE_EMBEDDING,
                &embedding,
                ctx.config.functions.embedding_dim,
            )?;
            Ok(embedding)
        })
        .map_err(|e| {
            warn!(url = %reference_image_url, error = %e, "Face extraction failed");
            PipelineError::FaceExtraction {
                image_url: reference_image_url.to_string(),
                reason: e.to_string(),
            }
        })?;

    let profile = ctx
        .db
        .insert_face_profile(owner_id, name, &embedding, reference_image_url)
        .map_err(|e| PipelineError::store("Failed to save face profile", e))?;

    info!(profile_id = %profile.id, %name, "Face profile created");
    Ok(profile)
}

/// Photos of `owner_id` in which the face `face_id` was detected, newest first.
pub fn search_by_face(ctx: &Context, owner_id: &str, face_id: &str) -> Result<Vec<Photo>, PipelineError> {
    ctx.db
        .photos_with_face(owner_id, face_id)
        .map_err(|e| PipelineError::store("Face search failed", e))
}

pub fn list_face_profiles(ctx: &Context, owner_id: &str) -> Result<Vec<FaceProfile>, PipelineError> {
    ctx.db
        .list_face_profiles(owner_id)
        .map_err(|e| PipelineError::store("Failed to list face profiles", e))
}

pub fn delete_face_profile(ctx: &Context, owner_id: &str, profile_id: &str) -> Result<(), PipelineError> {
    let removed = ctx
        .db
        .delete_face_profile(owner_id, profile_id)
        .map_err(|e| PipelineError::store("Failed to delete face profile", e))?;

    if !removed {
        return Err(PipelineError::not_found("face profile", profile_id));
    }
    info!(%profile_id, "Face profile deleted");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::ingest::{ingest, UploadFile};
    use crate::pipeline::test_support::{Harness, StubFunctions};

    fn upload(name: &str) -> UploadFile {
        UploadFile {
            name: name.to_string(),
            bytes: vec![1, 2, 3],
            last_modified: None,
        }
    }

    #[test]
    fn test_create_and_delete_profile() {
        let h = Harness::new(StubFunctions::default());

        let profile = create_face_profile(&h.ctx, "alice", "Bride", "http://cdn.test/ref.jpg").unwrap();
        assert_eq!(profile.embedding.len(), 4);

        let profiles = list_face_profiles(&h.ctx, "alice").unwrap();
        assert_eq!(profiles.len(), 1);
        assert_eq!(profiles[0].name, "Bride");
        assert!(list_face_profiles(&h.ctx, "bob").unwrap().is_empty());

        assert!(matches!(
            delete_face_profile(&h.ctx, "bob", &profile.id),
            Err(PipelineError::NotFound { .. })
        ));
        delete_face_profile(&h.ctx, "alice", &profile.id).unwrap();
        assert!(list_face_profiles(&h.ctx, "alice").unwrap().is_empty());
    }

    #[test]
    fn test_extraction_failure_persists_nothing() {
        let h = Harness::new(StubFunctions {
            face_embedding: None,
            ..Default::default()
        });
        let err = create_face_profile(&h.ctx, "alice", "Groom", "http://cdn.test/blurry.jpg").unwrap_err();
        assert!(matches!(err, PipelineError::FaceExtraction { .. }));
        assert!(list_face_profiles(&h.ctx, "alice").unwrap().is_empty());

        let h = Harness::new(StubFunctions {
            face_embedding: Some(vec![0.5; 7]),
            ..Default::default()
        });
        let err = create_face_profile(&h.ctx, "alice", "Groom", "http://cdn.test/g.jpg").unwrap_err();
        assert!(matches!(err, PipelineError::FaceExtraction { .. }));
    }

    #[test]
    fn test_search_by_face_newest_first() {
        let h = Harness::new(StubFunctions::default());
        let first = ingest(&h.ctx, &upload("first.jpg"), "alice", None, None).unwrap().photo;
        let second = ingest(&h.ctx, &upload("second.jpg"), "alice", None, None).unwrap().photo;
        ingest(&h.ctx, &upload("other.jpg"), "bob", None, None).unwrap();

        let photos = search_by_face(&h.ctx, "alice", "face-a").unwrap();
        let ids: Vec<&str> = photos.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec![second.id.as_str(), first.id.as_str()]);

        assert!(search_by_face(&h.ctx, "alice", "face-z").unwrap().is_empty());
    }
}
