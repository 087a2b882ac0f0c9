// SPDX-FileCopyrightText: 2026 Tidepool Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error record and retry attempt persistence.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, Row, params};
use tidepool_core::{ErrorRecord, RetryAttempt, TidepoolError};

use crate::codec::{decode_enum, decode_ts, encode_ts};
use crate::database::Database;
use crate::models::ErrorCounts;

const ERROR_COLUMNS: &str =
    "id, error_type, severity, message, timestamp, retry_count, resolved, resolution_notes";

/// Persist a new error record with its context map.
pub async fn insert_error(db: &Database, record: &ErrorRecord) -> Result<(), TidepoolError> {
    let record = record.clone();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO error_records (id, error_type, severity, message, timestamp,
                     retry_count, resolved, resolution_notes)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    record.id,
                    record.error_type.to_string(),
                    record.severity.to_string(),
                    record.message,
                    encode_ts(&record.timestamp),
                    record.retry_count,
                    record.resolved,
                    record.resolution_notes,
                ],
            )?;
            for (key, value) in &record.context {
                tx.execute(
                    "INSERT INTO error_context (error_id, key, value) VALUES (?1, ?2, ?3)",
                    params![record.id, key, value],
                )?;
            }
            tx.commit()?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Get an error record by ID.
pub async fn get_error(db: &Database, id: &str) -> Result<Option<ErrorRecord>, TidepoolError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let sql = format!("SELECT {ERROR_COLUMNS} FROM error_records WHERE id = ?1");
            let mut records = query_errors(conn, &sql, params![id])?;
            Ok(records.pop())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Overwrite the retry counter of an error record.
pub async fn set_retry_count(db: &Database, id: &str, retry_count: u32) -> Result<bool, TidepoolError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let updated = conn.execute(
                "UPDATE error_records SET retry_count = ?1 WHERE id = ?2",
                params![retry_count, id],
            )?;
            Ok(updated > 0)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Mark an error record resolved. Returns `false` if no such record exists.
pub async fn resolve_error(
    db: &Database,
    id: &str,
    notes: Option<&str>,
) -> Result<bool, TidepoolError> {
    let id = id.to_string();
    let notes = notes.map(str::to_string);
    db.connection()
        .call(move |conn| {
            let updated = conn.execute(
                "UPDATE error_records SET resolved = 1, resolution_notes = COALESCE(?1, resolution_notes)
                 WHERE id = ?2",
                params![notes, id],
            )?;
            Ok(updated > 0)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Append one retry attempt.
pub async fn insert_retry_attempt(
    db: &Database,
    attempt: &RetryAttempt,
) -> Result<(), TidepoolError> {
    let attempt = attempt.clone();
    let delay_ms = i64::try_from(attempt.delay.as_millis()).unwrap_or(i64::MAX);
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO retry_attempts (error_id, attempt_number, timestamp, success, delay_ms, message)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    attempt.error_id,
                    attempt.attempt_number,
                    encode_ts(&attempt.timestamp),
                    attempt.success,
                    delay_ms,
                    attempt.message,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Retry attempts recorded for one error, in attempt order.
pub async fn retry_attempts_for(
    db: &Database,
    error_id: &str,
) -> Result<Vec<RetryAttempt>, TidepoolError> {
    let error_id = error_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT error_id, attempt_number, timestamp, success, delay_ms, message
                 FROM retry_attempts WHERE error_id = ?1
                 ORDER BY attempt_number ASC, id ASC",
            )?;
            let rows = stmt.query_map(params![error_id], |row| {
                let delay_ms: i64 = row.get(4)?;
                Ok(RetryAttempt {
                    error_id: row.get(0)?,
                    attempt_number: row.get(1)?,
                    timestamp: decode_ts(2, &row.get::<_, String>(2)?)?,
                    success: row.get(3)?,
                    delay: Duration::from_millis(u64::try_from(delay_ms).unwrap_or(0)),
                    message: row.get(5)?,
                })
            })?;
            rows.collect::<Result<Vec<_>, _>>()
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Counts of errors recorded at or after `since`.
pub async fn error_counts_since(
    db: &Database,
    since: DateTime<Utc>,
) -> Result<ErrorCounts, TidepoolError> {
    let since = encode_ts(&since);
    db.connection()
        .call(move |conn| {
            let (total, unresolved): (i64, i64) = conn.query_row(
                "SELECT COUNT(*), COALESCE(SUM(CASE WHEN resolved = 0 THEN 1 ELSE 0 END), 0)
                 FROM error_records WHERE timestamp >= ?1",
                params![since],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )?;
            Ok(ErrorCounts {
                total: total as u64,
                unresolved: unresolved as u64,
                by_type: grouped_counts(conn, "error_type", &since)?,
                by_severity: grouped_counts(conn, "severity", &since)?,
            })
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Most recent error records, newest first.
pub async fn recent_errors(db: &Database, limit: usize) -> Result<Vec<ErrorRecord>, TidepoolError> {
    let limit = i64::try_from(limit).unwrap_or(i64::MAX);
    db.connection()
        .call(move |conn| {
            let sql = format!(
                "SELECT {ERROR_COLUMNS} FROM error_records ORDER BY timestamp DESC, id ASC LIMIT ?1"
            );
            query_errors(conn, &sql, params![limit])
        })
        .await
        .map_err(crate::database::map_tr_err)
}

fn grouped_counts(
    conn: &Connection,
    column: &'static str,
    since: &str,
) -> Result<BTreeMap<String, u64>, rusqlite::Error> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {column}, COUNT(*) FROM error_records WHERE timestamp >= ?1 GROUP BY {column}"
    ))?;
    let rows = stmt.query_map(params![since], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u64))
    })?;
    rows.collect()
}

fn query_errors<P: rusqlite::Params>(
    conn: &Connection,
    sql: &str,
    params: P,
) -> Result<Vec<ErrorRecord>, rusqlite::Error> {
    let mut records = {
        let mut stmt = conn.prepare(sql)?;
        let mapped = stmt.query_map(params, error_from_row)?;
        mapped.collect::<Result<Vec<_>, _>>()?
    };

    let mut stmt = conn.prepare_cached(
        "SELECT key, value FROM error_context WHERE error_id = ?1 ORDER BY key",
    )?;
    for record in &mut records {
        let rows = stmt.query_map(params![record.id], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;
        record.context = rows.collect::<Result<BTreeMap<_, _>, _>>()?;
    }
    Ok(records)
}

fn error_from_row(row: &Row<'_>) -> Result<ErrorRecord, rusqlite::Error> {
    Ok(ErrorRecord {
        id: row.get(0)?,
        error_type: decode_enum(1, &row.get::<_, String>(1)?)?,
        severity: decode_enum(2, &row.get::<_, String>(2)?)?,
        message: row.get(3)?,
        context: BTreeMap::new(),
        timestamp: decode_ts(4, &row.get::<_, String>(4)?)?,
        retry_count: row.get(5)?,
        resolved: row.get(6)?,
        resolution_notes: row.get(7)?,
    })
}
