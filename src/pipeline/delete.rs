//! Photo, album and event deletion.
//!
//! Stored objects are always removed before the rows that reference them. A
//! failed removal leaves every row intact; a failed row delete after a
//! successful removal leaves a dangling record for reconciliation to report.

use serde::Serialize;
use tracing::{error, info, warn};

use super::Context;
use crate::error::{PipelineError, SoftFailure};

#[derive(Debug, Clone, Serialize)]
pub struct DeleteOutcome {
    pub photo_id: String,
    pub storage_path: String,
    pub warnings: Vec<SoftFailure>,
}

pub fn delete_photo(
    ctx: &Context,
    owner_id: &str,
    photo_id: &str,
    storage_path: &str,
    event_id: Option<&str>,
) -> Result<DeleteOutcome, PipelineError> {
    let photo = ctx
        .db
        .get_photo(owner_id, photo_id)
        .map_err(|e| PipelineError::store("Failed to look up photo", e))?
        .ok_or_else(|| PipelineError::not_found("photo", photo_id))?;

    if photo.storage_path != storage_path {
        return Err(PipelineError::not_found("stored object", storage_path));
    }
    // The counter only moves for the event the photo was recorded in
    if let Some(event_id) = event_id {
        if photo.event_id.as_deref() != Some(event_id) {
            return Err(PipelineError::not_found("event photo", event_id));
        }
    }

    let paths = vec![storage_path.to_string()];
    if let Err(e) = ctx.store.remove(&paths) {
        error!(%photo_id, %storage_path, error = %format!("{:#}", e), "Failed to remove stored object");
        return Err(PipelineError::StorageDelete {
            paths,
            source: e.into(),
        });
    }

    match ctx.db.delete_photo_row(owner_id, photo_id) {
        Ok(0) => {
            warn!(%photo_id, "Photo row was already gone");
            return Err(PipelineError::not_found("photo", photo_id));
        }
        Ok(_) => {}
        Err(e) => {
            error!(%photo_id, %storage_path, error = %format!("{:#}", e), "Photo row left dangling");
            return Err(PipelineError::MetadataDelete {
                photo_id: photo_id.to_string(),
                source: e.into(),
            });
        }
    }

    let mut warnings = Vec::new();
    if let Some(event_id) = event_id {
        let reason = match ctx.db.decrement_event_photo_count(owner_id, event_id) {
            Ok(true) => None,
            Ok(false) => Some("event missing or count already zero".to_string()),
            Err(e) => Some(format!("{:#}", e)),
        };
        if let Some(reason) = reason {
            warn!(%event_id, %reason, "Event photo count not decremented");
            warnings.push(SoftFailure::CounterUpdateFailed {
                event_id: event_id.to_string(),
                reason,
            });
        }
    }

    info!(%photo_id, %storage_path, "Photo deleted");

    Ok(DeleteOutcome {
        photo_id: photo_id.to_string(),
        storage_path: storage_path.to_string(),
        warnings,
    })
}

/// Delete an event together with its photos, their objects and its shared links.
///
/// Returns the number of photos removed.
pub fn delete_event(ctx: &Context, owner_id: &str, event_id: &str) -> Result<usize, PipelineError> {
    ctx.db
        .get_event(owner_id, event_id)
        .map_err(|e| PipelineError::store("Failed to look up event", e))?
        .ok_or_else(|| PipelineError::not_found("event", event_id))?;

    let paths: Vec<String> = ctx
        .db
        .photos_in_event(event_id)
        .map_err(|e| PipelineError::store("Failed to list event photos", e))?
        .into_iter()
        .filter(|photo| photo.user_id == owner_id)
        .map(|photo| photo.storage_path)
        .collect();

    if !paths.is_empty() {
        if let Err(e) = ctx.store.remove(&paths) {
            error!(%event_id, count = paths.len(), error = %format!("{:#}", e), "Failed to remove event objects");
            return Err(PipelineError::StorageDelete {
                paths,
                source: e.into(),
            });
        }
    }

    let removed = ctx
        .db
        .delete_event_rows(owner_id, event_id)
        .map_err(|e| PipelineError::store("Failed to delete event rows", e))?;

    info!(%event_id, photos = removed, "Event deleted");
    Ok(removed)
}

/// Delete an album. Its photos stay, detached from it.
///
/// Returns the number of photos that were detached.
pub fn delete_album(ctx: &Context, owner_id: &str, album_id: &str) -> Result<usize, PipelineError> {
    let detached = ctx
        .db
        .delete_album(owner_id, album_id)
        .map_err(|e| PipelineError::store("Failed to delete album", e))?
        .ok_or_else(|| PipelineError::not_found("album", album_id))?;

    info!(%album_id, detached, "Album deleted");
    Ok(detached)
}
