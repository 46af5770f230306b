//! Events and their denormalized photo counter.

use anyhow::{bail, Result};
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Row};
use serde::Serialize;

use super::{new_id, optional, Database};

#[derive(Debug, Clone, Serialize)]
pub struct Event {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub date: NaiveDate,
    pub is_public: bool,
    pub photo_count: i64,
    pub share_code: Option<String>,
    pub cover_image_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewEvent {
    pub name: String,
    pub date: NaiveDate,
    pub description: Option<String>,
    pub location: Option<String>,
    pub is_public: bool,
}

/// Partial update; `None` leaves a field untouched.
#[derive(Debug, Clone, Default)]
pub struct EventUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub date: Option<NaiveDate>,
    pub is_public: Option<bool>,
    pub cover_image_url: Option<String>,
}

impl EventUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.location.is_none()
            && self.date.is_none()
            && self.is_public.is_none()
            && self.cover_image_url.is_none()
    }
}

const EVENT_COLUMNS: &str = "id, user_id, name, description, location, date, is_public, \
     photo_count, share_code, cover_image_url, created_at";

fn row_to_event(row: &Row) -> rusqlite::Result<Event> {
    Ok(Event {
        id: row.get(0)?,
        user_id: row.get(1)?,
        name: row.get(2)?,
        description: row.get(3)?,
        location: row.get(4)?,
        date: row.get(5)?,
        is_public: row.get(6)?,
        photo_count: row.get(7)?,
        share_code: row.get(8)?,
        cover_image_url: row.get(9)?,
        created_at: row.get(10)?,
    })
}

impl Database {
    /// Create an event with a zero photo count and a short legacy share code.
    pub fn create_event(&self, user_id: &str, new_event: &NewEvent, share_code_len: usize) -> Result<Event> {
        let mut share_code = new_id().replace('-', "");
        share_code.truncate(share_code_len.max(1));

        let event = Event {
            id: new_id(),
            user_id: user_id.to_string(),
            name: new_event.name.clone(),
            description: new_event.description.clone(),
            location: new_event.location.clone(),
            date: new_event.date,
            is_public: new_event.is_public,
            photo_count: 0,
            share_code: Some(share_code),
            cover_image_url: None,
            created_at: Utc::now(),
        };

        self.conn.execute(
            r#"
            INSERT INTO events (id, user_id, name, description, location, date, is_public,
                                photo_count, share_code, cover_image_url, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, 0, ?, NULL, ?)
            "#,
            params![
                event.id,
                event.user_id,
                event.name,
                event.description,
                event.location,
                event.date,
                event.is_public,
                event.share_code,
                event.created_at,
            ],
        )?;

        Ok(event)
    }

    /// Events of an owner, most recent date first.
    pub fn list_events(&self, user_id: &str) -> Result<Vec<Event>> {
        let sql = format!(
            "SELECT {} FROM events WHERE user_id = ? ORDER BY date DESC, created_at DESC",
            EVENT_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let events = stmt
            .query_map([user_id], row_to_event)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(events)
    }

    pub fn get_event(&self, user_id: &str, event_id: &str) -> Result<Option<Event>> {
        let sql = format!("SELECT {} FROM events WHERE id = ? AND user_id = ?", EVENT_COLUMNS);
        optional(self.conn.query_row(&sql, params![event_id, user_id], row_to_event))
    }

    /// Look an event up by id regardless of owner (shared link access).
    pub fn find_event(&self, event_id: &str) -> Result<Option<Event>> {
        let sql = format!("SELECT {} FROM events WHERE id = ?", EVENT_COLUMNS);
        optional(self.conn.query_row(&sql, [event_id], row_to_event))
    }

    pub fn find_event_by_share_code(&self, share_code: &str) -> Result<Option<Event>> {
        let sql = format!("SELECT {} FROM events WHERE share_code = ?", EVENT_COLUMNS);
        optional(self.conn.query_row(&sql, [share_code], row_to_event))
    }

    pub fn update_event(&self, user_id: &str, event_id: &str, update: &EventUpdate) -> Result<Option<Event>> {
        if update.is_empty() {
            bail!("Event update has no fields set");
        }

        self.conn.execute(
            r#"
            UPDATE events SET
                name = COALESCE(?, name),
                description = COALESCE(?, description),
                location = COALESCE(?, location),
                date = COALESCE(?, date),
                is_public = COALESCE(?, is_public),
                cover_image_url = COALESCE(?, cover_image_url)
            WHERE id = ? AND user_id = ?
            "#,
            params![
                update.name,
                update.description,
                update.location,
                update.date,
                update.is_public,
                update.cover_image_url,
                event_id,
                user_id,
            ],
        )?;

        self.get_event(user_id, event_id)
    }

    /// `increment_event_photo_count`: one atomic statement, never read-modify-write.
    ///
    /// Returns false when the owner has no event with that id.
    pub fn increment_event_photo_count(&self, user_id: &str, event_id: &str) -> Result<bool> {
        let updated = self.conn.execute(
            "UPDATE events SET photo_count = photo_count + 1 WHERE id = ? AND user_id = ?",
            params![event_id, user_id],
        )?;
        Ok(updated > 0)
    }

    /// `decrement_event_photo_count`: the count never goes below zero.
    ///
    /// Returns false when the event is missing or already at zero.
    pub fn decrement_event_photo_count(&self, user_id: &str, event_id: &str) -> Result<bool> {
        let updated = self.conn.execute(
            "UPDATE events SET photo_count = photo_count - 1 WHERE id = ? AND user_id = ? AND photo_count > 0",
            params![event_id, user_id],
        )?;
        Ok(updated > 0)
    }

    /// Overwrite a drifted counter with an exact value.
    pub fn set_event_photo_count(&self, event_id: &str, photo_count: i64) -> Result<()> {
        self.conn.execute(
            "UPDATE events SET photo_count = ? WHERE id = ?",
            params![photo_count, event_id],
        )?;
        Ok(())
    }

    /// Remove an event, its photo rows and its shared links in one transaction.
    ///
    /// Storage objects must already be gone. Returns the number of photo rows
    /// deleted.
    pub fn delete_event_rows(&self, user_id: &str, event_id: &str) -> Result<usize> {
        let tx = self.conn.unchecked_transaction()?;
        let photos = tx.execute(
            "DELETE FROM photos WHERE event_id = ? AND user_id = ?",
            params![event_id, user_id],
        )?;
        tx.execute(
            "DELETE FROM shared_links WHERE event_id = ? AND user_id = ?",
            params![event_id, user_id],
        )?;
        tx.execute(
            "DELETE FROM events WHERE id = ? AND user_id = ?",
            params![event_id, user_id],
        )?;
        tx.commit()?;
        Ok(photos)
    }
}
