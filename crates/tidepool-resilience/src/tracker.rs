// SPDX-FileCopyrightText: 2026 Tidepool Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Durable error tracking and statistics.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::Serialize;
use tidepool_core::{ErrorRecord, ErrorType, RetryAttempt, TidepoolError};
use tidepool_storage::Database;
use tidepool_storage::queries::errors;
use tracing::{info, warn};

/// Aggregated errors over a look-back window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorStatistics {
    pub window_hours: u32,
    pub total_errors: u64,
    pub unresolved: u64,
    pub by_type: BTreeMap<String, u64>,
    pub by_severity: BTreeMap<String, u64>,
    /// `total_errors / window_hours`.
    pub error_rate: f64,
}

/// Persists error records and retry attempts.
#[derive(Debug, Clone)]
pub struct ErrorTracker {
    db: Database,
}

impl ErrorTracker {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Create and persist a new unresolved record with a fresh id.
    pub async fn record_error(
        &self,
        error_type: ErrorType,
        message: impl Into<String>,
        context: BTreeMap<String, String>,
    ) -> Result<ErrorRecord, TidepoolError> {
        let record = ErrorRecord::new(
            uuid::Uuid::new_v4().to_string(),
            error_type,
            message,
            context,
        );
        self.record(&record).await?;
        Ok(record)
    }

    /// Persist a caller-built record.
    pub async fn record(&self, record: &ErrorRecord) -> Result<(), TidepoolError> {
        errors::insert_error(&self.db, record).await?;
        warn!(
            error_id = %record.id,
            error_type = %record.error_type,
            severity = %record.severity,
            message = %record.message,
            "error recorded"
        );
        Ok(())
    }

    /// Append a retry attempt and bump the parent's retry counter to match.
    pub async fn record_retry_attempt(&self, attempt: &RetryAttempt) -> Result<(), TidepoolError> {
        errors::insert_retry_attempt(&self.db, attempt).await?;
        errors::set_retry_count(&self.db, &attempt.error_id, attempt.attempt_number).await?;
        Ok(())
    }

    /// Statistics for the last `hours_back` hours (at least one).
    pub async fn get_error_statistics(
        &self,
        hours_back: u32,
    ) -> Result<ErrorStatistics, TidepoolError> {
        self.error_statistics_at(Utc::now(), hours_back).await
    }

    /// Statistics for the `hours_back` hours ending at `now`.
    pub async fn error_statistics_at(
        &self,
        now: DateTime<Utc>,
        hours_back: u32,
    ) -> Result<ErrorStatistics, TidepoolError> {
        let hours = hours_back.max(1);
        let since = now - ChronoDuration::hours(i64::from(hours));
        let counts = errors::error_counts_since(&self.db, since).await?;
        Ok(ErrorStatistics {
            window_hours: hours,
            error_rate: counts.total as f64 / f64::from(hours),
            total_errors: counts.total,
            unresolved: counts.unresolved,
            by_type: counts.by_type,
            by_severity: counts.by_severity,
        })
    }

    /// Mark a record resolved.
    pub async fn resolve_error(&self, id: &str, notes: Option<&str>) -> Result<(), TidepoolError> {
        if !errors::resolve_error(&self.db, id, notes).await? {
            return Err(TidepoolError::NotFound { id: id.to_string() });
        }
        info!(error_id = id, "error resolved");
        Ok(())
    }

    pub async fn get_error(&self, id: &str) -> Result<Option<ErrorRecord>, TidepoolError> {
        errors::get_error(&self.db, id).await
    }

    pub async fn recent_errors(&self, limit: usize) -> Result<Vec<ErrorRecord>, TidepoolError> {
        errors::recent_errors(&self.db, limit).await
    }

    pub async fn retry_attempts(&self, error_id: &str) -> Result<Vec<RetryAttempt>, TidepoolError> {
        errors::retry_attempts_for(&self.db, error_id).await
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tempfile::tempdir;
    use tidepool_core::ErrorSeverity;

    use super::*;

    async fn tracker() -> (ErrorTracker, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("t.db").to_str().unwrap())
            .await
            .unwrap();
        (ErrorTracker::new(db), dir)
    }

    #[tokio::test]
    async fn record_assigns_id_and_severity() {
        let (tracker, _dir) = tracker().await;
        let record = tracker
            .record_error(ErrorType::AuthenticationError, "token expired", BTreeMap::new())
            .await
            .unwrap();
        assert_eq!(record.severity, ErrorSeverity::Critical);
        assert!(!record.resolved);
        let loaded = tracker.get_error(&record.id).await.unwrap().unwrap();
        assert_eq!(loaded.message, "token expired");
    }

    #[tokio::test]
    async fn error_rate_is_total_over_hours() {
        let (tracker, _dir) = tracker().await;
        for _ in 0..6 {
            tracker
                .record_error(ErrorType::NetworkError, "reset", BTreeMap::new())
                .await
                .unwrap();
        }
        tracker
            .record_error(ErrorType::QuotaExceeded, "cap", BTreeMap::new())
            .await
            .unwrap();

        let stats = tracker.get_error_statistics(24).await.unwrap();
        assert_eq!(stats.total_errors, 7);
        assert!((stats.error_rate - 7.0 / 24.0).abs() < 1e-12);
        assert_eq!(stats.by_type.get("network_error"), Some(&6));
        assert_eq!(stats.by_severity.get("high"), Some(&1));
        assert_eq!(stats.by_severity.get("low"), Some(&6));

        // Zero hours is widened to one.
        let one = tracker.get_error_statistics(0).await.unwrap();
        assert_eq!(one.window_hours, 1);
        assert!((one.error_rate - 7.0).abs() < 1e-12);
    }

    #[tokio::test]
    async fn retry_attempts_update_parent_count() {
        let (tracker, _dir) = tracker().await;
        let record = tracker
            .record_error(ErrorType::RateLimit, "429", BTreeMap::new())
            .await
            .unwrap();
        for n in 1..=2 {
            tracker
                .record_retry_attempt(&RetryAttempt {
                    error_id: record.id.clone(),
                    attempt_number: n,
                    timestamp: Utc::now(),
                    success: false,
                    delay: Duration::from_secs(u64::from(n)),
                    message: None,
                })
                .await
                .unwrap();
        }
        let loaded = tracker.get_error(&record.id).await.unwrap().unwrap();
        assert_eq!(loaded.retry_count, 2);
        assert_eq!(tracker.retry_attempts(&record.id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn resolving_unknown_error_is_not_found() {
        let (tracker, _dir) = tracker().await;
        let err = tracker.resolve_error("ghost", None).await.unwrap_err();
        assert!(matches!(err, TidepoolError::NotFound { id } if id == "ghost"));
    }
}
