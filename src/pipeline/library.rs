//! Album, event and photo management for an owner's library.

use tracing::info;

use super::Context;
use crate::db::{Album, Event, EventUpdate, NewEvent, Photo};
use crate::error::PipelineError;

pub fn create_album(
    ctx: &Context,
    owner_id: &str,
    name: &str,
    description: Option<&str>,
    is_public: bool,
) -> Result<Album, PipelineError> {
    let album = ctx
        .db
        .create_album(owner_id, name, description, is_public)
        .map_err(|e| PipelineError::store("Failed to create album", e))?;
    info!(album_id = %album.id, %name, "Album created");
    Ok(album)
}

/// Albums of an owner, newest first.
pub fn list_albums(ctx: &Context, owner_id: &str) -> Result<Vec<Album>, PipelineError> {
    ctx.db
        .list_albums(owner_id)
        .map_err(|e| PipelineError::store("Failed to list albums", e))
}

pub fn get_album(ctx: &Context, owner_id: &str, album_id: &str) -> Result<Album, PipelineError> {
    ctx.db
        .get_album(owner_id, album_id)
        .map_err(|e| PipelineError::store("Failed to look up album", e))?
        .ok_or_else(|| PipelineError::not_found("album", album_id))
}

pub fn update_album_cover(
    ctx: &Context,
    owner_id: &str,
    album_id: &str,
    cover_image_url: &str,
) -> Result<(), PipelineError> {
    let updated = ctx
        .db
        .update_album_cover(owner_id, album_id, cover_image_url)
        .map_err(|e| PipelineError::store("Failed to update album cover", e))?;
    if !updated {
        return Err(PipelineError::not_found("album", album_id));
    }
    Ok(())
}

/// Attach photos to an album. Ids that are not the owner's photos are skipped.
///
/// Returns how many photos were attached.
pub fn add_photos_to_album(
    ctx: &Context,
    owner_id: &str,
    album_id: &str,
    photo_ids: &[String],
) -> Result<usize, PipelineError> {
    get_album(ctx, owner_id, album_id)?;

    let added = ctx
        .db
        .assign_photos_to_album(owner_id, album_id, photo_ids)
        .map_err(|e| PipelineError::store("Failed to add photos to album", e))?;
    info!(%album_id, added, requested = photo_ids.len(), "Photos added to album");
    Ok(added)
}

pub fn album_photos(ctx: &Context, owner_id: &str, album_id: &str) -> Result<Vec<Photo>, PipelineError> {
    get_album(ctx, owner_id, album_id)?;
    ctx.db
        .photos_in_album(owner_id, album_id)
        .map_err(|e| PipelineError::store("Failed to list album photos", e))
}

/// Create an event with a zero photo count and a fresh share code.
pub fn create_event(ctx: &Context, owner_id: &str, new_event: &NewEvent) -> Result<Event, PipelineError> {
    let event = ctx
        .db
        .create_event(owner_id, new_event, ctx.config.sharing.event_code_len)
        .map_err(|e| PipelineError::store("Failed to create event", e))?;
    info!(event_id = %event.id, name = %event.name, date = %event.date, "Event created");
    Ok(event)
}

/// Events of an owner, latest date first.
pub fn list_events(ctx: &Context, owner_id: &str) -> Result<Vec<Event>, PipelineError> {
    ctx.db
        .list_events(owner_id)
        .map_err(|e| PipelineError::store("Failed to list events", e))
}

pub fn get_event(ctx: &Context, owner_id: &str, event_id: &str) -> Result<Event, PipelineError> {
    ctx.db
        .get_event(owner_id, event_id)
        .map_err(|e| PipelineError::store("Failed to look up event", e))?
        .ok_or_else(|| PipelineError::not_found("event", event_id))
}

/// Apply the fields set in `update`. An empty update returns the event unchanged.
pub fn update_event(
    ctx: &Context,
    owner_id: &str,
    event_id: &str,
    update: &EventUpdate,
) -> Result<Event, PipelineError> {
    if update.is_empty() {
        return get_event(ctx, owner_id, event_id);
    }

    ctx.db
        .update_event(owner_id, event_id, update)
        .map_err(|e| PipelineError::store("Failed to update event", e))?
        .ok_or_else(|| PipelineError::not_found("event", event_id))
}

/// Photos of one of the owner's events, newest first.
pub fn event_photos(ctx: &Context, owner_id: &str, event_id: &str) -> Result<Vec<Photo>, PipelineError> {
    get_event(ctx, owner_id, event_id)?;
    ctx.db
        .photos_in_event(event_id)
        .map_err(|e| PipelineError::store("Failed to list event photos", e))
}

pub fn list_photos(ctx: &Context, owner_id: &str) -> Result<Vec<Photo>, PipelineError> {
    ctx.db
        .list_photos(owner_id)
        .map_err(|e| PipelineError::store("Failed to list photos", e))
}

pub fn get_photo(ctx: &Context, owner_id: &str, photo_id: &str) -> Result<Photo, PipelineError> {
    ctx.db
        .get_photo(owner_id, photo_id)
        .map_err(|e| PipelineError::store("Failed to look up photo", e))?
        .ok_or_else(|| PipelineError::not_found("photo", photo_id))
}
