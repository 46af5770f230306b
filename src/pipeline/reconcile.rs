//! Repair pass for interrupted uploads and deletions.
//!
//! Compares the object store, the photo rows and the event counters of one
//! owner. Orphaned objects and drifted counters can be repaired; dangling
//! photo rows are only reported, since their metadata cannot be rebuilt.
//! Only objects directly under the owner's directory are considered, and
//! unreferenced objects younger than the configured grace period are left
//! for a later pass so an upload still in flight is never collected.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::HashSet;
use tracing::{info, warn};

use super::Context;
use crate::error::PipelineError;
use crate::storage::{check_owner_id, is_owner_object};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CounterDrift {
    pub event_id: String,
    pub recorded: i64,
    pub actual: i64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ReconcileReport {
    /// Stored objects no photo row points at.
    pub orphans: Vec<String>,
    /// Unreferenced objects still inside the grace period.
    pub recent: Vec<String>,
    /// Photo ids whose stored object is missing.
    pub dangling: Vec<String>,
    pub drift: Vec<CounterDrift>,
    pub repaired: bool,
}

impl ReconcileReport {
    pub fn is_clean(&self) -> bool {
        self.orphans.is_empty() && self.dangling.is_empty() && self.drift.is_empty()
    }
}

pub fn reconcile(ctx: &Context, owner_id: &str, repair: bool) -> Result<ReconcileReport, PipelineError> {
    reconcile_at(ctx, owner_id, repair, Utc::now())
}

/// Reconcile as if the current time were `now`.
pub fn reconcile_at(
    ctx: &Context,
    owner_id: &str,
    repair: bool,
    now: DateTime<Utc>,
) -> Result<ReconcileReport, PipelineError> {
    check_owner_id(owner_id).map_err(PipelineError::invalid)?;

    let grace = i64::try_from(ctx.config.storage.orphan_grace_secs)
        .ok()
        .and_then(Duration::try_seconds)
        .unwrap_or(Duration::MAX);
    let cutoff = now.checked_sub_signed(grace);

    let mut report = ReconcileReport {
        repaired: repair,
        ..Default::default()
    };

    let rows = ctx
        .db
        .photo_paths(owner_id)
        .map_err(|e| PipelineError::store("Failed to list photo paths", e))?;
    let objects = ctx
        .store
        .list(owner_id)
        .map_err(|e| PipelineError::store("Failed to list stored objects", e))?
        .into_iter()
        .filter(|object| is_owner_object(owner_id, &object.path))
        .collect::<Vec<_>>();

    let referenced: HashSet<&str> = rows.iter().map(|(_, path)| path.as_str()).collect();
    let stored: HashSet<&str> = objects.iter().map(|o| o.path.as_str()).collect();

    for object in objects.iter().filter(|o| !referenced.contains(o.path.as_str())) {
        // Unknown modification times count as recent
        let settled = match (object.modified, cutoff) {
            (Some(modified), Some(cutoff)) => modified <= cutoff,
            _ => false,
        };
        if settled {
            report.orphans.push(object.path.clone());
        } else {
            report.recent.push(object.path.clone());
        }
    }
    report.dangling = rows
        .iter()
        .filter(|(_, path)| !stored.contains(path.as_str()))
        .map(|(id, _)| id.clone())
        .collect();

    let events = ctx
        .db
        .list_events(owner_id)
        .map_err(|e| PipelineError::store("Failed to list events", e))?;
    for event in events {
        let actual = ctx
            .db
            .count_photos_in_event(&event.id)
            .map_err(|e| PipelineError::store("Failed to count event photos", e))?;
        if actual != event.photo_count {
            report.drift.push(CounterDrift {
                event_id: event.id,
                recorded: event.photo_count,
                actual,
            });
        }
    }

    for photo_id in &report.dangling {
        warn!(%photo_id, "Photo row has no stored object");
    }

    if repair {
        if !report.orphans.is_empty() {
            ctx.store.remove(&report.orphans).map_err(|e| PipelineError::StorageDelete {
                paths: report.orphans.clone(),
                source: e.into(),
            })?;
        }
        for drift in &report.drift {
            ctx.db
                .set_event_photo_count(&drift.event_id, drift.actual)
                .map_err(|e| PipelineError::store("Failed to reset event photo count", e))?;
        }
    }

    info!(
        %owner_id,
        orphans = report.orphans.len(),
        recent = report.recent.len(),
        dangling = report.dangling.len(),
        drift = report.drift.len(),
        repair,
        "Reconciliation finished"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::NewEvent;
    use crate::pipeline::ingest::{ingest, UploadFile};
    use crate::pipeline::test_support::{Harness, StubFunctions};
    use chrono::NaiveDate;

    fn upload(name: &str) -> UploadFile {
        UploadFile {
            name: name.to_string(),
            bytes: vec![5; 16],
            last_modified: None,
        }
    }

    #[test]
    fn test_clean_library() {
        let h = Harness::new(StubFunctions::default());
        ingest(&h.ctx, &upload("a.jpg"), "alice", None, None).unwrap();

        let report = reconcile(&h.ctx, "alice", false).unwrap();
        assert!(report.is_clean());
    }

    #[test]
    fn test_reports_and_repairs() {
        let h = Harness::new(StubFunctions::default());
        let event = h
            .ctx
            .db
            .create_event(
                "alice",
                &NewEvent {
                    name: "Festival".to_string(),
                    date: NaiveDate::from_ymd_opt(2024, 8, 20).unwrap(),
                    description: None,
                    location: None,
                    is_public: false,
                },
                8,
            )
            .unwrap();

        let kept = ingest(&h.ctx, &upload("kept.jpg"), "alice", Some(&event.id), None).unwrap().photo;
        let lost = ingest(&h.ctx, &upload("lost.jpg"), "alice", None, None).unwrap().photo;
        h.ctx.store.put("alice/orphan.jpg", b"left behind").unwrap();
        h.ctx.store.put("bob/other.jpg", b"not ours").unwrap();
        h.ctx.store.remove(&[lost.storage_path.clone()]).unwrap();
        h.ctx.db.set_event_photo_count(&event.id, 5).unwrap();

        let later = Utc::now() + Duration::hours(2);
        let report = reconcile_at(&h.ctx, "alice", false, later).unwrap();
        assert_eq!(report.orphans, vec!["alice/orphan.jpg".to_string()]);
        assert_eq!(report.dangling, vec![lost.id.clone()]);
        assert_eq!(
            report.drift,
            vec![CounterDrift {
                event_id: event.id.clone(),
                recorded: 5,
                actual: 1,
            }]
        );
        assert!(h.ctx.store.exists("alice/orphan.jpg").unwrap());

        let report = reconcile_at(&h.ctx, "alice", true, later).unwrap();
        assert!(report.repaired);
        assert!(!h.ctx.store.exists("alice/orphan.jpg").unwrap());
        assert!(h.ctx.store.exists("bob/other.jpg").unwrap());
        assert!(h.ctx.store.exists(&kept.storage_path).unwrap());
        assert_eq!(h.ctx.db.get_event("alice", &event.id).unwrap().unwrap().photo_count, 1);
        // Dangling rows are never deleted
        assert!(h.ctx.db.get_photo("alice", &lost.id).unwrap().is_some());

        let report = reconcile_at(&h.ctx, "alice", false, later).unwrap();
        assert!(report.orphans.is_empty());
        assert!(report.drift.is_empty());
        assert_eq!(report.dangling.len(), 1);
    }

    #[test]
    fn test_fresh_objects_survive_repair() {
        let h = Harness::new(StubFunctions::default());
        // Stored, but the upload has not recorded its row yet
        h.ctx.store.put("alice/in-flight.jpg", b"uploading").unwrap();

        let report = reconcile(&h.ctx, "alice", true).unwrap();
        assert!(report.orphans.is_empty());
        assert_eq!(report.recent, vec!["alice/in-flight.jpg".to_string()]);
        assert!(h.ctx.store.exists("alice/in-flight.jpg").unwrap());

        let report = reconcile_at(&h.ctx, "alice", true, Utc::now() + Duration::hours(2)).unwrap();
        assert_eq!(report.orphans, vec!["alice/in-flight.jpg".to_string()]);
        assert!(!h.ctx.store.exists("alice/in-flight.jpg").unwrap());
    }

    #[test]
    fn test_nested_directories_belong_to_nobody() {
        let h = Harness::new(StubFunctions::default());
        let photo = ingest(&h.ctx, &upload("a.jpg"), "alice", None, None).unwrap().photo;
        h.ctx.store.put("alice/team/shared.jpg", b"someone else").unwrap();

        let later = Utc::now() + Duration::hours(2);
        let report = reconcile_at(&h.ctx, "alice", true, later).unwrap();
        assert!(report.is_clean());
        assert!(report.recent.is_empty());
        assert!(h.ctx.store.exists("alice/team/shared.jpg").unwrap());
        assert!(h.ctx.store.exists(&photo.storage_path).unwrap());

        let err = reconcile(&h.ctx, "alice/team", true).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidInput { .. }));
    }
}
