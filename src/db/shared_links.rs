//! Share codes granting access to an event's photos.

use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{params, Row};
use serde::Serialize;

use super::{new_id, optional, Database};

#[derive(Debug, Clone, Serialize)]
pub struct SharedLink {
    pub id: String,
    pub event_id: String,
    pub user_id: String,
    pub share_code: String,
    pub requires_face_auth: bool,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl SharedLink {
    /// A link without an expiry never expires.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires_at| expires_at <= now)
    }
}

fn row_to_link(row: &Row) -> rusqlite::Result<SharedLink> {
    Ok(SharedLink {
        id: row.get(0)?,
        event_id: row.get(1)?,
        user_id: row.get(2)?,
        share_code: row.get(3)?,
        requires_face_auth: row.get(4)?,
        expires_at: row.get(5)?,
        created_at: row.get(6)?,
    })
}

impl Database {
    pub fn insert_shared_link(
        &self,
        user_id: &str,
        event_id: &str,
        requires_face_auth: bool,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<SharedLink> {
        let link = SharedLink {
            id: new_id(),
            event_id: event_id.to_string(),
            user_id: user_id.to_string(),
            share_code: new_id(),
            requires_face_auth,
            expires_at,
            created_at: Utc::now(),
        };
        self.conn.execute(
            r#"
            INSERT INTO shared_links (id, event_id, user_id, share_code, requires_face_auth, expires_at, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
            params![
                link.id,
                link.event_id,
                link.user_id,
                link.share_code,
                link.requires_face_auth,
                link.expires_at,
                link.created_at,
            ],
        )?;
        Ok(link)
    }

    pub fn find_shared_link(&self, share_code: &str) -> Result<Option<SharedLink>> {
        optional(self.conn.query_row(
            r#"
            SELECT id, event_id, user_id, share_code, requires_face_auth, expires_at, created_at
            FROM shared_links
            WHERE share_code = ?
            "#,
            [share_code],
            row_to_link,
        ))
    }

    pub fn shared_links_for_event(&self, user_id: &str, event_id: &str) -> Result<Vec<SharedLink>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, event_id, user_id, share_code, requires_face_auth, expires_at, created_at
            FROM shared_links
            WHERE event_id = ? AND user_id = ?
            ORDER BY created_at DESC
            "#,
        )?;
        let links = stmt
            .query_map(params![event_id, user_id], row_to_link)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(links)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use crate::db::test_db;

    #[test]
    fn test_link_expiry() {
        let db = test_db();
        let now = Utc::now();
        let expired = db
            .insert_shared_link("alice", "event-1", false, Some(now - Duration::days(1)))
            .unwrap();
        let open = db.insert_shared_link("alice", "event-1", true, None).unwrap();

        assert!(expired.is_expired_at(now));
        assert!(!open.is_expired_at(now));
        assert_ne!(expired.share_code, open.share_code);

        let loaded = db.find_shared_link(&expired.share_code).unwrap().unwrap();
        assert!(loaded.is_expired_at(now));
        assert_eq!(db.shared_links_for_event("alice", "event-1").unwrap().len(), 2);
    }
}
