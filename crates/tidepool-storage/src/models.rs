// SPDX-FileCopyrightText: 2026 Tidepool Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Storage-level models.
//!
//! The canonical entity types live in `tidepool-core::types`; this module
//! re-exports them and adds the aggregate and mutation shapes that only the
//! storage layer produces or consumes.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

pub use tidepool_core::types::{ContentItem, ContentStatus, ErrorRecord, HistoryRecord, RetryAttempt};

/// A compare-and-set status change plus the fields it updates.
///
/// Applied atomically together with its history record; the update only
/// happens if the stored status still equals `from`.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusChange {
    pub id: String,
    pub from: ContentStatus,
    pub to: ContentStatus,
    pub actor: String,
    pub notes: Option<String>,
    pub at: DateTime<Utc>,
    /// Set when moving to `approved`.
    pub approved_by: Option<String>,
    /// Set when moving to `scheduled`.
    pub target_time: Option<DateTime<Utc>>,
    /// Set when moving to `published`.
    pub external_id: Option<String>,
    /// Set when moving to `failed`.
    pub last_error: Option<String>,
    /// Whether this change counts as a failed publish attempt.
    pub increment_retry: bool,
}

impl StatusChange {
    pub fn new(
        id: impl Into<String>,
        from: ContentStatus,
        to: ContentStatus,
        actor: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            from,
            to,
            actor: actor.into(),
            notes: None,
            at: Utc::now(),
            approved_by: None,
            target_time: None,
            external_id: None,
            last_error: None,
            increment_retry: false,
        }
    }

    pub fn with_notes(mut self, notes: Option<String>) -> Self {
        self.notes = notes;
        self
    }
}

/// Aggregate view over the content queue.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QueueStatistics {
    pub total: u64,
    pub by_status: BTreeMap<String, u64>,
    pub by_post_type: BTreeMap<String, u64>,
    pub by_source: BTreeMap<String, u64>,
    /// Mean performance prediction, `0.0` for an empty queue.
    pub average_prediction: f64,
    pub pending_review: u64,
    /// Approved items waiting to be scheduled.
    pub ready_to_schedule: u64,
}

/// Error counts over a time window.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ErrorCounts {
    pub total: u64,
    pub unresolved: u64,
    pub by_type: BTreeMap<String, u64>,
    pub by_severity: BTreeMap<String, u64>,
}
