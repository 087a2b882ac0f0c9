// SPDX-FileCopyrightText: 2026 Tidepool Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error recovery.
//!
//! The recovery manager classifies a caught fault, records it through the
//! [`ErrorTracker`], and dispatches to the recovery action for its
//! [`ErrorType`]. Actions are advisory: they set flags that the publish loop
//! and the health checker read (`paused_until`, `token_refresh_required`,
//! flagged media) and return a human-readable description. They never retry
//! the original operation.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Display;
use std::future::Future;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tidepool_core::{ErrorType, RetryAttempt, TidepoolError};
use tracing::{info, warn};

use crate::classifier::Classify;
use crate::retry::{AttemptReport, RetryHandler};
use crate::tracker::ErrorTracker;

/// How long publishing pauses after the platform reports an exhausted quota.
pub const QUOTA_PAUSE: Duration = Duration::from_secs(24 * 60 * 60);

/// Result of handling one fault.
#[derive(Debug, Clone, PartialEq)]
pub struct RecoveryOutcome {
    /// Id of the persisted error record.
    pub error_id: String,
    pub error_type: ErrorType,
    /// Description of the recovery action taken, if the type has one.
    pub action: Option<String>,
}

#[derive(Debug, Default)]
struct Flags {
    paused_until: Option<DateTime<Utc>>,
    token_refresh_required: bool,
    flagged_media: BTreeSet<String>,
}

/// Classifies, records and reacts to faults.
#[derive(Debug)]
pub struct RecoveryManager {
    tracker: ErrorTracker,
    retry: RetryHandler,
    rate_limit_backoff: Duration,
    flags: Mutex<Flags>,
}

impl RecoveryManager {
    pub fn new(tracker: ErrorTracker, retry: RetryHandler, rate_limit_backoff: Duration) -> Self {
        Self {
            tracker,
            retry,
            rate_limit_backoff,
            flags: Mutex::new(Flags::default()),
        }
    }

    pub fn tracker(&self) -> &ErrorTracker {
        &self.tracker
    }

    pub fn retry_handler(&self) -> &RetryHandler {
        &self.retry
    }

    fn flags(&self) -> MutexGuard<'_, Flags> {
        self.flags.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Classify and record `error`, then run the recovery action for its type.
    pub async fn handle_error<E>(
        &self,
        error: &E,
        context: BTreeMap<String, String>,
    ) -> Result<RecoveryOutcome, TidepoolError>
    where
        E: Classify + Display + ?Sized,
    {
        let error_type = error.error_type();
        let action = self.recover(error_type, error.retry_after(), &context);
        let record = self
            .tracker
            .record_error(error_type, error.to_string(), context)
            .await?;
        Ok(RecoveryOutcome {
            error_id: record.id,
            error_type,
            action,
        })
    }

    /// Dispatch the recovery action for `error_type`.
    ///
    /// Returns a description of what was done, or `None` for types without
    /// a recovery action.
    pub fn recover(
        &self,
        error_type: ErrorType,
        retry_after: Option<Duration>,
        context: &BTreeMap<String, String>,
    ) -> Option<String> {
        let action = match error_type {
            ErrorType::RateLimit => {
                let backoff = retry_after.unwrap_or(self.rate_limit_backoff);
                self.pause_for(backoff);
                Some(format!(
                    "Applied rate limit backoff: {} seconds",
                    backoff.as_secs()
                ))
            }
            ErrorType::QuotaExceeded => {
                let pause = retry_after.unwrap_or(QUOTA_PAUSE);
                self.pause_for(pause);
                Some(format!(
                    "Paused publishing for {} seconds: API quota exceeded",
                    pause.as_secs()
                ))
            }
            ErrorType::AuthenticationError => {
                self.flags().token_refresh_required = true;
                Some("Flagged for token refresh".to_string())
            }
            ErrorType::NetworkError => Some(
                "Network diagnostics recommended: check connectivity to the publishing platform"
                    .to_string(),
            ),
            ErrorType::MediaError => match context.get("content_id") {
                Some(id) => {
                    self.flags().flagged_media.insert(id.clone());
                    Some(format!("Flagged media for review on content {id}"))
                }
                None => Some("Flagged media for review".to_string()),
            },
            ErrorType::ValidationError
            | ErrorType::TemporaryError
            | ErrorType::PermanentError
            | ErrorType::UnknownError => None,
        };
        if let Some(action) = &action {
            info!(%error_type, action = %action, "recovery action applied");
        }
        action
    }

    fn pause_for(&self, duration: Duration) {
        let until = chrono::Duration::from_std(duration)
            .ok()
            .and_then(|d| Utc::now().checked_add_signed(d))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        let mut flags = self.flags();
        // Never shorten an existing pause.
        if flags.paused_until.is_none_or(|current| current < until) {
            flags.paused_until = Some(until);
        }
    }

    /// When publishing may resume, if it is paused.
    pub fn paused_until(&self) -> Option<DateTime<Utc>> {
        self.flags().paused_until
    }

    pub fn is_paused_at(&self, now: DateTime<Utc>) -> bool {
        self.paused_until().is_some_and(|until| now < until)
    }

    pub fn clear_pause(&self) {
        self.flags().paused_until = None;
    }

    pub fn token_refresh_required(&self) -> bool {
        self.flags().token_refresh_required
    }

    /// Clear the token refresh flag once new credentials are in place.
    pub fn acknowledge_token_refresh(&self) {
        self.flags().token_refresh_required = false;
    }

    /// Content ids whose media was flagged for review.
    pub fn flagged_media(&self) -> Vec<String> {
        self.flags().flagged_media.iter().cloned().collect()
    }

    /// Run `operation` under the retry policy, recording what happened.
    ///
    /// If any try fails, one error record is written for the first failure
    /// and one retry attempt for every backoff cycle. The record is resolved
    /// if a later try succeeds; otherwise the recovery action for the final
    /// error runs, and the final error gets a record of its own when its
    /// type differs from the first failure. The operation's own result is
    /// returned unchanged, and failures to record are logged rather than
    /// masking it.
    pub async fn run_with_retry<T, E, F, Fut>(
        &self,
        operation: &str,
        mut context: BTreeMap<String, String>,
        op: F,
    ) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Classify + Display,
    {
        let mut reports: Vec<AttemptReport> = Vec::new();
        let result = self
            .retry
            .async_retry_observed(op, |report| reports.push(report.clone()))
            .await;

        let Some(first) = reports.first() else {
            return result;
        };

        context.insert("operation".to_string(), operation.to_string());
        let first_type = first.error_type;
        let mut first_id = None;
        match self
            .tracker
            .record_error(first_type, first.message.clone(), context.clone())
            .await
        {
            Ok(record) => {
                first_id = Some(record.id.clone());
                for report in reports.iter().filter(|r| r.next_delay.is_some()) {
                    let attempt = RetryAttempt {
                        error_id: record.id.clone(),
                        attempt_number: report.attempt,
                        timestamp: Utc::now(),
                        success: false,
                        delay: report.next_delay.unwrap_or_default(),
                        message: Some(report.message.clone()),
                    };
                    if let Err(e) = self.tracker.record_retry_attempt(&attempt).await {
                        warn!(error = %e, operation, "failed to record retry attempt");
                    }
                }
                if result.is_ok() {
                    let notes = format!("succeeded on attempt {}", reports.len() + 1);
                    if let Err(e) = self.tracker.resolve_error(&record.id, Some(&notes)).await {
                        warn!(error = %e, operation, "failed to resolve error record");
                    }
                }
            }
            Err(e) => warn!(error = %e, operation, "failed to record error"),
        }

        if let Err(err) = &result {
            let final_type = err.error_type();
            if final_type != first_type {
                let mut final_context = context.clone();
                if let Some(id) = first_id {
                    final_context.insert("retried_error_id".to_string(), id);
                }
                if let Err(e) = self
                    .tracker
                    .record_error(final_type, err.to_string(), final_context)
                    .await
                {
                    warn!(error = %e, operation, "failed to record final error");
                }
            }
            self.recover(final_type, err.retry_after(), &context);
        }
        result
    }
}
