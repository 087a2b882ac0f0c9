// SPDX-FileCopyrightText: 2026 Tidepool Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Content item persistence.
//!
//! Scalar fields live in `content_items`; hashtags, media URLs, tags and
//! validation results are ordered child rows keyed by `(content_id, position)`.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, Row, params};
use tidepool_core::{
    ContentBody, ContentItem, ContentStatus, Media, TidepoolError, ValidationResult,
};

use crate::codec::{decode_enum, decode_opt_ts, decode_ts, encode_ts};
use crate::database::Database;
use crate::models::{QueueStatistics, StatusChange};
use crate::queries::history::insert_history;

/// Action name recorded in history when an item enters the queue.
pub const ACTION_CREATED: &str = "created";

/// Action name recorded in history for every later status change.
pub const ACTION_STATUS_CHANGE: &str = "status_change";

const ITEM_COLUMNS: &str = "id, title, caption, media_kind, post_type, source, priority,
     target_time, notes, performance_prediction, status, created_by, approved_by,
     created_at, updated_at, retry_count, external_id, last_error";

/// Insert a new item with its child collections and the intake history record.
pub async fn insert_content(db: &Database, item: &ContentItem) -> Result<(), TidepoolError> {
    let item = item.clone();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO content_items (id, title, caption, media_kind, post_type, source,
                     priority, target_time, notes, performance_prediction, status, created_by,
                     approved_by, created_at, updated_at, retry_count, external_id, last_error)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)",
                params![
                    item.id,
                    item.title,
                    item.body.caption,
                    item.body.media.kind(),
                    item.post_type.to_string(),
                    item.source.to_string(),
                    item.priority,
                    item.target_time.as_ref().map(encode_ts),
                    item.notes,
                    item.performance_prediction,
                    item.status.to_string(),
                    item.created_by,
                    item.approved_by,
                    encode_ts(&item.created_at),
                    encode_ts(&item.updated_at),
                    item.retry_count,
                    item.external_id,
                    item.last_error,
                ],
            )?;
            write_children(&tx, &item)?;
            insert_history(
                &tx,
                &item.id,
                ACTION_CREATED,
                None,
                item.status,
                &item.created_by,
                item.notes.as_deref(),
                &item.created_at,
            )?;
            tx.commit()?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Get an item by ID.
pub async fn get_content(db: &Database, id: &str) -> Result<Option<ContentItem>, TidepoolError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let sql = format!("SELECT {ITEM_COLUMNS} FROM content_items WHERE id = ?1");
            let mut items = query_items(conn, &sql, params![id])?;
            Ok(items.pop())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// List items, newest first, optionally filtered by status.
pub async fn list_content(
    db: &Database,
    status: Option<ContentStatus>,
) -> Result<Vec<ContentItem>, TidepoolError> {
    db.connection()
        .call(move |conn| match status {
            Some(status) => {
                let sql = format!(
                    "SELECT {ITEM_COLUMNS} FROM content_items WHERE status = ?1
                     ORDER BY created_at DESC, id ASC"
                );
                query_items(conn, &sql, params![status.to_string()])
            }
            None => {
                let sql = format!(
                    "SELECT {ITEM_COLUMNS} FROM content_items ORDER BY created_at DESC, id ASC"
                );
                query_items(conn, &sql, [])
            }
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Items in an active status (approved, scheduled, published), used for
/// duplicate detection.
pub async fn active_content(db: &Database) -> Result<Vec<ContentItem>, TidepoolError> {
    db.connection()
        .call(move |conn| {
            let sql = format!(
                "SELECT {ITEM_COLUMNS} FROM content_items
                 WHERE status IN ('approved', 'scheduled', 'published')
                 ORDER BY created_at ASC, id ASC"
            );
            query_items(conn, &sql, [])
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Scheduled items whose target time has passed, highest priority first,
/// then oldest first.
pub async fn due_for_publish(
    db: &Database,
    now: DateTime<Utc>,
    limit: usize,
) -> Result<Vec<ContentItem>, TidepoolError> {
    let now = encode_ts(&now);
    let limit = i64::try_from(limit).unwrap_or(i64::MAX);
    db.connection()
        .call(move |conn| {
            let sql = format!(
                "SELECT {ITEM_COLUMNS} FROM content_items
                 WHERE status = 'scheduled' AND target_time IS NOT NULL AND target_time <= ?1
                 ORDER BY priority DESC, created_at ASC, id ASC
                 LIMIT ?2"
            );
            query_items(conn, &sql, params![now, limit])
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Apply a compare-and-set status change and append its history record.
///
/// Returns `false` (and writes nothing) if the item does not exist or its
/// stored status is no longer `change.from`.
pub async fn apply_status_change(
    db: &Database,
    change: &StatusChange,
) -> Result<bool, TidepoolError> {
    let change = change.clone();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let updated = tx.execute(
                "UPDATE content_items SET
                     status = ?1,
                     updated_at = ?2,
                     approved_by = COALESCE(?3, approved_by),
                     target_time = COALESCE(?4, target_time),
                     external_id = COALESCE(?5, external_id),
                     last_error = COALESCE(?6, last_error),
                     retry_count = retry_count + ?7
                 WHERE id = ?8 AND status = ?9",
                params![
                    change.to.to_string(),
                    encode_ts(&change.at),
                    change.approved_by,
                    change.target_time.as_ref().map(encode_ts),
                    change.external_id,
                    change.last_error,
                    i64::from(change.increment_retry),
                    change.id,
                    change.from.to_string(),
                ],
            )?;
            if updated == 0 {
                return Ok(false);
            }
            insert_history(
                &tx,
                &change.id,
                ACTION_STATUS_CHANGE,
                Some(change.from),
                change.to,
                &change.actor,
                change.notes.as_deref(),
                &change.at,
            )?;
            tx.commit()?;
            Ok(true)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Aggregate counts over the whole queue.
pub async fn queue_statistics(db: &Database) -> Result<QueueStatistics, TidepoolError> {
    db.connection()
        .call(|conn| {
            let (total, average_prediction): (i64, f64) = conn.query_row(
                "SELECT COUNT(*), COALESCE(AVG(performance_prediction), 0.0) FROM content_items",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )?;
            let by_status = grouped_counts(conn, "status")?;
            let pending_review = by_status
                .get(ContentStatus::PendingReview.to_string().as_str())
                .copied()
                .unwrap_or(0);
            let ready_to_schedule = by_status
                .get(ContentStatus::Approved.to_string().as_str())
                .copied()
                .unwrap_or(0);
            Ok(QueueStatistics {
                total: total as u64,
                by_post_type: grouped_counts(conn, "post_type")?,
                by_source: grouped_counts(conn, "source")?,
                by_status,
                average_prediction,
                pending_review,
                ready_to_schedule,
            })
        })
        .await
        .map_err(crate::database::map_tr_err)
}

fn grouped_counts(
    conn: &Connection,
    column: &'static str,
) -> Result<BTreeMap<String, u64>, rusqlite::Error> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {column}, COUNT(*) FROM content_items GROUP BY {column}"
    ))?;
    let rows = stmt.query_map([], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u64))
    })?;
    rows.collect()
}

fn write_children(conn: &Connection, item: &ContentItem) -> Result<(), rusqlite::Error> {
    for (position, tag) in item.body.hashtags.iter().enumerate() {
        conn.execute(
            "INSERT INTO content_hashtags (content_id, position, tag) VALUES (?1, ?2, ?3)",
            params![item.id, position as i64, tag],
        )?;
    }
    for (position, url) in item.body.media.urls().into_iter().enumerate() {
        conn.execute(
            "INSERT INTO content_media (content_id, position, url) VALUES (?1, ?2, ?3)",
            params![item.id, position as i64, url],
        )?;
    }
    for (position, tag) in item.tags.iter().enumerate() {
        conn.execute(
            "INSERT INTO content_tags (content_id, position, tag) VALUES (?1, ?2, ?3)",
            params![item.id, position as i64, tag],
        )?;
    }
    for (position, result) in item.validation_results.iter().enumerate() {
        conn.execute(
            "INSERT INTO validation_results (content_id, position, rule, passed, message, severity)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                item.id,
                position as i64,
                result.rule.to_string(),
                result.passed,
                result.message,
                result.severity.to_string(),
            ],
        )?;
    }
    Ok(())
}

fn query_items<P: rusqlite::Params>(
    conn: &Connection,
    sql: &str,
    params: P,
) -> Result<Vec<ContentItem>, rusqlite::Error> {
    let rows = {
        let mut stmt = conn.prepare(sql)?;
        let mapped = stmt.query_map(params, item_from_row)?;
        mapped.collect::<Result<Vec<_>, _>>()?
    };

    let mut items = Vec::with_capacity(rows.len());
    for (mut item, media_kind) in rows {
        item.body.hashtags = ordered_strings(
            conn,
            "SELECT tag FROM content_hashtags WHERE content_id = ?1 ORDER BY position",
            &item.id,
        )?;
        let urls = ordered_strings(
            conn,
            "SELECT url FROM content_media WHERE content_id = ?1 ORDER BY position",
            &item.id,
        )?;
        item.body.media = Media::from_parts(&media_kind, urls);
        item.tags = ordered_strings(
            conn,
            "SELECT tag FROM content_tags WHERE content_id = ?1 ORDER BY position",
            &item.id,
        )?;
        item.validation_results = validation_results(conn, &item.id)?;
        items.push(item);
    }
    Ok(items)
}

/// Map the scalar columns; child collections are filled in afterwards.
fn item_from_row(row: &Row<'_>) -> Result<(ContentItem, String), rusqlite::Error> {
    let item = ContentItem {
        id: row.get(0)?,
        title: row.get(1)?,
        body: ContentBody {
            caption: row.get(2)?,
            media: Media::None,
            hashtags: Vec::new(),
        },
        post_type: decode_enum(4, &row.get::<_, String>(4)?)?,
        source: decode_enum(5, &row.get::<_, String>(5)?)?,
        priority: row.get(6)?,
        target_time: decode_opt_ts(7, row.get(7)?)?,
        tags: Vec::new(),
        notes: row.get(8)?,
        performance_prediction: row.get(9)?,
        status: decode_enum(10, &row.get::<_, String>(10)?)?,
        created_by: row.get(11)?,
        approved_by: row.get(12)?,
        created_at: decode_ts(13, &row.get::<_, String>(13)?)?,
        updated_at: decode_ts(14, &row.get::<_, String>(14)?)?,
        retry_count: row.get(15)?,
        external_id: row.get(16)?,
        last_error: row.get(17)?,
        validation_results: Vec::new(),
    };
    Ok((item, row.get(3)?))
}

fn ordered_strings(conn: &Connection, sql: &str, id: &str) -> Result<Vec<String>, rusqlite::Error> {
    let mut stmt = conn.prepare_cached(sql)?;
    let rows = stmt.query_map(params![id], |row| row.get(0))?;
    rows.collect()
}

fn validation_results(conn: &Connection, id: &str) -> Result<Vec<ValidationResult>, rusqlite::Error> {
    let mut stmt = conn.prepare_cached(
        "SELECT rule, passed, message, severity FROM validation_results
         WHERE content_id = ?1 ORDER BY position",
    )?;
    let rows = stmt.query_map(params![id], |row| {
        Ok(ValidationResult {
            rule: decode_enum(0, &row.get::<_, String>(0)?)?,
            passed: row.get(1)?,
            message: row.get(2)?,
            severity: decode_enum(3, &row.get::<_, String>(3)?)?,
        })
    })?;
    rows.collect()
}
