// SPDX-FileCopyrightText: 2026 Tidepool Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Append-only status history.
//!
//! Rows are only ever inserted, inside the same transaction as the status
//! change they describe. There is no update or delete path.

use chrono::{DateTime, Utc};
use rusqlite::{Connection, params};
use tidepool_core::{ContentStatus, HistoryRecord, TidepoolError};

use crate::codec::{decode_enum, decode_ts, encode_ts};
use crate::database::Database;

#[allow(clippy::too_many_arguments)]
pub(crate) fn insert_history(
    conn: &Connection,
    content_id: &str,
    action: &str,
    old_status: Option<ContentStatus>,
    new_status: ContentStatus,
    actor: &str,
    notes: Option<&str>,
    at: &DateTime<Utc>,
) -> Result<(), rusqlite::Error> {
    conn.execute(
        "INSERT INTO content_history (content_id, action, old_status, new_status, actor, notes, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            content_id,
            action,
            old_status.map(|s| s.to_string()),
            new_status.to_string(),
            actor,
            notes,
            encode_ts(at),
        ],
    )?;
    Ok(())
}

/// History of one item in the order it was written.
pub async fn list_history(
    db: &Database,
    content_id: &str,
) -> Result<Vec<HistoryRecord>, TidepoolError> {
    let content_id = content_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, content_id, action, old_status, new_status, actor, notes, created_at
                 FROM content_history WHERE content_id = ?1
                 ORDER BY created_at ASC, id ASC",
            )?;
            let rows = stmt.query_map(params![content_id], |row| {
                let old_status: Option<String> = row.get(3)?;
                Ok(HistoryRecord {
                    id: row.get(0)?,
                    content_id: row.get(1)?,
                    action: row.get(2)?,
                    old_status: old_status.map(|s| decode_enum(3, &s)).transpose()?,
                    new_status: decode_enum(4, &row.get::<_, String>(4)?)?,
                    actor: row.get(5)?,
                    notes: row.get(6)?,
                    created_at: decode_ts(7, &row.get::<_, String>(7)?)?,
                })
            })?;
            rows.collect::<Result<Vec<_>, _>>()
        })
        .await
        .map_err(crate::database::map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::StatusChange;
    use crate::queries::content::{ACTION_CREATED, ACTION_STATUS_CHANGE, apply_status_change, insert_content};
    use tempfile::tempdir;
    use tidepool_core::{ContentBody, ContentItem, ContentSource, Media, PostType};

    fn item(id: &str) -> ContentItem {
        let now = Utc::now();
        ContentItem {
            id: id.to_string(),
            title: "Shrimp colony update".into(),
            body: ContentBody::new("Neocaridina berried again", Media::None, vec![]),
            post_type: PostType::Community,
            source: ContentSource::UserSubmission,
            priority: 5,
            target_time: None,
            tags: vec![],
            notes: Some("from the forum".into()),
            performance_prediction: 50.0,
            status: ContentStatus::PendingReview,
            created_by: "intake".into(),
            approved_by: None,
            created_at: now,
            updated_at: now,
            retry_count: 0,
            external_id: None,
            last_error: None,
            validation_results: vec![],
        }
    }

    #[tokio::test]
    async fn history_records_intake_and_every_transition() {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("h.db").to_str().unwrap())
            .await
            .unwrap();
        insert_content(&db, &item("h-1")).await.unwrap();

        let reject = StatusChange::new(
            "h-1",
            ContentStatus::PendingReview,
            ContentStatus::Rejected,
            "lead",
        )
        .with_notes(Some("off-topic".into()));
        assert!(apply_status_change(&db, &reject).await.unwrap());

        let history = list_history(&db, "h-1").await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].action, ACTION_CREATED);
        assert_eq!(history[0].old_status, None);
        assert_eq!(history[0].new_status, ContentStatus::PendingReview);
        assert_eq!(history[0].actor, "intake");
        assert_eq!(history[1].action, ACTION_STATUS_CHANGE);
        assert_eq!(history[1].old_status, Some(ContentStatus::PendingReview));
        assert_eq!(history[1].new_status, ContentStatus::Rejected);
        assert_eq!(history[1].notes.as_deref(), Some("off-topic"));
        assert!(history[0].id < history[1].id);
    }

    #[tokio::test]
    async fn unknown_item_has_empty_history() {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("h.db").to_str().unwrap())
            .await
            .unwrap();
        assert!(list_history(&db, "nope").await.unwrap().is_empty());
    }
}
