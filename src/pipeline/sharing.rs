//! Share links and face-gated access.

use anyhow::{Context as _, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chrono::{Duration, Utc};
use serde::Serialize;
use std::path::Path;
use tracing::{info, warn};

use super::metadata::content_type_for;
use super::Context;
use crate::db::{Event, SharedLink};
use crate::error::PipelineError;
use crate::functions::DownloadLink;

/// Result of presenting a share code.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum AccessDecision {
    NotFound,
    Expired,
    SelfieRequired,
    Denied { message: Option<String> },
    Granted { event_id: String },
}

/// Create a share link for one of the owner's events.
///
/// The expiry is fixed at creation time; `None` never expires.
pub fn create_shareable_link(
    ctx: &Context,
    owner_id: &str,
    event_id: &str,
    requires_face_auth: bool,
    expires_in_days: Option<u32>,
) -> Result<SharedLink, PipelineError> {
    ctx.db
        .get_event(owner_id, event_id)
        .map_err(|e| PipelineError::store("Failed to look up event", e))?
        .ok_or_else(|| PipelineError::not_found("event", event_id))?;

    let expires_at = match expires_in_days {
        Some(days) => Some(
            Duration::try_days(i64::from(days))
                .and_then(|ttl| Utc::now().checked_add_signed(ttl))
                .ok_or_else(|| PipelineError::invalid(format!("expiry of {} days is out of range", days)))?,
        ),
        None => None,
    };

    let link = ctx
        .db
        .insert_shared_link(owner_id, event_id, requires_face_auth, expires_at)
        .map_err(|e| PipelineError::store("Failed to save shared link", e))?;

    info!(%event_id, share_code = %link.share_code, requires_face_auth, ?expires_at, "Share link created");
    Ok(link)
}

/// Ask the verification function whether the selfie matches someone in the event.
pub fn verify_face_access(ctx: &Context, selfie_url: &str, event_id: &str) -> Result<bool, PipelineError> {
    let verdict = ctx.functions.verify_face_access(selfie_url, event_id)?;
    if !verdict.has_access {
        info!(%event_id, message = ?verdict.message, "Face verification refused");
    }
    Ok(verdict.has_access)
}

/// Decide whether a share code grants access right now.
///
/// Expiry is checked before anything else, so an expired link is refused
/// whether or not it asks for a selfie.
pub fn check_link_access(
    ctx: &Context,
    share_code: &str,
    selfie_url: Option<&str>,
) -> Result<AccessDecision, PipelineError> {
    let link = match ctx
        .db
        .find_shared_link(share_code)
        .map_err(|e| PipelineError::store("Failed to look up shared link", e))?
    {
        Some(link) => link,
        None => return Ok(AccessDecision::NotFound),
    };

    if link.is_expired_at(Utc::now()) {
        return Ok(AccessDecision::Expired);
    }

    if !link.requires_face_auth {
        return Ok(AccessDecision::Granted {
            event_id: link.event_id,
        });
    }

    let Some(selfie_url) = selfie_url else {
        return Ok(AccessDecision::SelfieRequired);
    };

    let verdict = ctx.functions.verify_face_access(selfie_url, &link.event_id)?;
    if verdict.has_access {
        Ok(AccessDecision::Granted {
            event_id: link.event_id,
        })
    } else {
        warn!(%share_code, "Selfie did not match event");
        Ok(AccessDecision::Denied {
            message: verdict.message,
        })
    }
}

/// Look up an event by its legacy share code.
pub fn find_event_by_share_code(ctx: &Context, share_code: &str) -> Result<Event, PipelineError> {
    ctx.db
        .find_event_by_share_code(share_code)
        .map_err(|e| PipelineError::store("Failed to look up event", e))?
        .ok_or_else(|| PipelineError::not_found("event share code", share_code))
}

/// Request a bulk download archive for an event.
pub fn prepare_download(ctx: &Context, event_id: &str) -> Result<DownloadLink, PipelineError> {
    ctx.db
        .find_event(event_id)
        .map_err(|e| PipelineError::store("Failed to look up event", e))?
        .ok_or_else(|| PipelineError::not_found("event", event_id))?;

    let link = ctx.functions.prepare_download(event_id)?;
    info!(%event_id, expires_at = %link.expires_at, "Download link prepared");
    Ok(link)
}

/// Encode a local selfie as a `data:` URL the verification function accepts.
pub fn selfie_data_url(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("Failed to read selfie {}", path.display()))?;
    let mime_type = content_type_for(&path.to_string_lossy());
    Ok(format!("data:{};base64,{}", mime_type, BASE64.encode(bytes)))
}
