// SPDX-FileCopyrightText: 2026 Tidepool Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Content queue manager.
//!
//! Owns intake and the status state machine:
//!
//! ```text
//! intake ──> pending_review (any failed rule) | approved
//! draft | pending_review | failed ──approve──> approved
//! approved ──mark_scheduled──> scheduled
//! scheduled ──mark_published──> published
//! scheduled ──mark_failed──> failed
//! any non-terminal ──reject──> rejected
//! published | rejected | failed ──archive──> archived
//! ```
//!
//! Every transition is a compare-and-set on the stored status and appends a
//! history record in the same transaction. Items are never deleted.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tidepool_config::model::QueueConfig;
use tidepool_core::types::{MAX_PRIORITY, MIN_PRIORITY};
use tidepool_core::{
    ContentBody, ContentItem, ContentSource, ContentStatus, HashtagOptimizer, HistoryRecord,
    PostType, TidepoolError, ValidationResult, types::normalize_hashtags,
};
use tidepool_storage::queries::{content, history};
use tidepool_storage::{Database, QueueStatistics, StatusChange};
use tracing::{debug, info, warn};

use crate::prediction::predict_performance;
use crate::validator::ContentValidator;

/// Actor recorded for transitions driven by the publish loop.
pub const SYSTEM_ACTOR: &str = "system";

/// A content submission.
#[derive(Debug, Clone)]
pub struct NewContent {
    pub title: String,
    pub body: ContentBody,
    pub post_type: PostType,
    pub source: ContentSource,
    pub created_by: String,
    pub priority: Option<i32>,
    pub target_time: Option<DateTime<Utc>>,
    pub tags: Vec<String>,
    pub notes: Option<String>,
}

impl NewContent {
    pub fn new(
        title: impl Into<String>,
        body: ContentBody,
        post_type: PostType,
        source: ContentSource,
        created_by: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            body,
            post_type,
            source,
            created_by: created_by.into(),
            priority: None,
            target_time: None,
            tags: Vec::new(),
            notes: None,
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn with_target_time(mut self, at: DateTime<Utc>) -> Self {
        self.target_time = Some(at);
        self
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }
}

pub struct ContentQueueManager {
    db: Database,
    validator: ContentValidator,
    optimizer: Arc<dyn HashtagOptimizer>,
    config: QueueConfig,
}

impl ContentQueueManager {
    pub fn new(
        db: Database,
        validator: ContentValidator,
        optimizer: Arc<dyn HashtagOptimizer>,
        config: QueueConfig,
    ) -> Self {
        Self {
            db,
            validator,
            optimizer,
            config,
        }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Validate a body against the rules and the current active content
    /// without queueing it.
    pub async fn validate(
        &self,
        body: &ContentBody,
    ) -> Result<Vec<ValidationResult>, TidepoolError> {
        let existing = content::active_content(&self.db).await?;
        Ok(self.validator.validate(body, &existing))
    }

    /// Validate, score and queue a submission. Returns the new item's id.
    ///
    /// Submissions without hashtags get a generated set for their post
    /// type's category. If generation fails the item is queued without
    /// hashtags and the hashtag rule reports it.
    pub async fn add_content(&self, new: NewContent) -> Result<String, TidepoolError> {
        let mut body = new.body;
        if body.hashtags.is_empty() {
            let category = new.post_type.hashtag_category();
            match self
                .optimizer
                .suggest(category, &body.caption, self.config.hashtag_fill_count)
                .await
            {
                Ok(tags) => {
                    body.hashtags = normalize_hashtags(tags);
                    debug!(%category, count = body.hashtags.len(), "hashtags generated");
                }
                Err(e) => warn!(error = %e, %category, "hashtag generation failed"),
            }
        }

        let existing = content::active_content(&self.db).await?;
        let validation_results = self.validator.validate(&body, &existing);
        let status = if validation_results.iter().any(|r| !r.passed) {
            ContentStatus::PendingReview
        } else {
            ContentStatus::Approved
        };

        let now = Utc::now();
        let item = ContentItem {
            id: uuid::Uuid::new_v4().to_string(),
            title: new.title,
            performance_prediction: predict_performance(&body, new.post_type),
            body,
            post_type: new.post_type,
            source: new.source,
            priority: new
                .priority
                .unwrap_or(self.config.default_priority)
                .clamp(MIN_PRIORITY, MAX_PRIORITY),
            target_time: new.target_time,
            tags: new.tags,
            notes: new.notes,
            status,
            created_by: new.created_by,
            approved_by: None,
            created_at: now,
            updated_at: now,
            retry_count: 0,
            external_id: None,
            last_error: None,
            validation_results,
        };
        content::insert_content(&self.db, &item).await?;
        info!(
            content_id = %item.id,
            %status,
            post_type = %item.post_type,
            prediction = item.performance_prediction,
            "content queued"
        );
        Ok(item.id)
    }

    pub async fn get(&self, id: &str) -> Result<Option<ContentItem>, TidepoolError> {
        content::get_content(&self.db, id).await
    }

    async fn require(&self, id: &str) -> Result<ContentItem, TidepoolError> {
        self.get(id)
            .await?
            .ok_or_else(|| TidepoolError::NotFound { id: id.to_string() })
    }

    /// Move `id` to `to`, letting `fill` attach transition data.
    async fn transition(
        &self,
        id: &str,
        to: ContentStatus,
        actor: &str,
        notes: Option<String>,
        fill: impl FnOnce(&mut StatusChange),
    ) -> Result<(), TidepoolError> {
        let item = self.require(id).await?;
        let from = item.status;
        if !from.can_transition_to(to) {
            return Err(TidepoolError::InvalidTransition {
                id: id.to_string(),
                from,
                to,
            });
        }
        let mut change = StatusChange::new(id, from, to, actor).with_notes(notes);
        fill(&mut change);
        if !content::apply_status_change(&self.db, &change).await? {
            // Someone else moved the item between the read and the write.
            let current = self.require(id).await?.status;
            return Err(TidepoolError::InvalidTransition {
                id: id.to_string(),
                from: current,
                to,
            });
        }
        info!(content_id = id, %from, %to, actor, "content status changed");
        Ok(())
    }

    /// Approve an item. Returns `false` if its status does not allow it.
    pub async fn approve(
        &self,
        id: &str,
        actor: &str,
        notes: Option<String>,
    ) -> Result<bool, TidepoolError> {
        let approver = actor.to_string();
        soft(
            self.transition(id, ContentStatus::Approved, actor, notes, |change| {
                change.approved_by = Some(approver);
            })
            .await,
        )
    }

    /// Reject an item with a reason. Returns `false` if the item is already
    /// terminal or no reason was given.
    pub async fn reject(&self, id: &str, actor: &str, reason: &str) -> Result<bool, TidepoolError> {
        if reason.trim().is_empty() {
            warn!(content_id = id, actor, "rejection refused without a reason");
            return Ok(false);
        }
        soft(
            self.transition(
                id,
                ContentStatus::Rejected,
                actor,
                Some(reason.to_string()),
                |_| {},
            )
            .await,
        )
    }

    pub async fn mark_scheduled(&self, id: &str, when: DateTime<Utc>) -> Result<(), TidepoolError> {
        self.transition(
            id,
            ContentStatus::Scheduled,
            SYSTEM_ACTOR,
            Some(format!("scheduled for {}", when.to_rfc3339())),
            |change| change.target_time = Some(when),
        )
        .await
    }

    pub async fn mark_published(&self, id: &str, external_id: &str) -> Result<(), TidepoolError> {
        let external = external_id.to_string();
        self.transition(
            id,
            ContentStatus::Published,
            SYSTEM_ACTOR,
            Some(format!("published as {external_id}")),
            |change| change.external_id = Some(external),
        )
        .await
    }

    /// Record a failed publish. The item stays failed until re-approved.
    pub async fn mark_failed(&self, id: &str, message: &str) -> Result<(), TidepoolError> {
        let error = message.to_string();
        self.transition(
            id,
            ContentStatus::Failed,
            SYSTEM_ACTOR,
            Some(message.to_string()),
            |change| {
                change.last_error = Some(error);
                change.increment_retry = true;
            },
        )
        .await
    }

    pub async fn archive(
        &self,
        id: &str,
        actor: &str,
        notes: Option<String>,
    ) -> Result<(), TidepoolError> {
        self.transition(id, ContentStatus::Archived, actor, notes, |_| {})
            .await
    }

    pub async fn history(&self, id: &str) -> Result<Vec<HistoryRecord>, TidepoolError> {
        history::list_history(&self.db, id).await
    }

    pub async fn list(
        &self,
        status: Option<ContentStatus>,
    ) -> Result<Vec<ContentItem>, TidepoolError> {
        content::list_content(&self.db, status).await
    }

    /// Scheduled items due at `now`, highest priority first, oldest first
    /// within a priority.
    pub async fn due_for_publish(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<ContentItem>, TidepoolError> {
        content::due_for_publish(&self.db, now, limit).await
    }

    pub async fn get_queue_statistics(&self) -> Result<QueueStatistics, TidepoolError> {
        content::queue_statistics(&self.db).await
    }
}

/// Map a disallowed transition to `Ok(false)`.
fn soft(result: Result<(), TidepoolError>) -> Result<bool, TidepoolError> {
    match result {
        Ok(()) => Ok(true),
        Err(TidepoolError::InvalidTransition { id, from, to }) => {
            warn!(content_id = %id, %from, %to, "transition not allowed");
            Ok(false)
        }
        Err(e) => Err(e),
    }
}
