// SPDX-FileCopyrightText: 2026 Tidepool Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The publish loop.
//!
//! Wakes every `poll_interval`, claims scheduled items whose target time has
//! passed and publishes them one at a time. Each publish goes through the
//! circuit breaker and the async retry path, and every individual call is
//! bounded by `request_timeout`. Once a call has been issued it runs to
//! completion; cancellation only takes effect between cycles.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tidepool_config::model::PublisherConfig;
use tidepool_core::{ContentItem, ContentPublisher, Fault, TidepoolError};
use tidepool_resilience::{CircuitBreaker, RecoveryManager};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::manager::ContentQueueManager;

/// Outcome of one publish cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    /// Due items claimed this cycle.
    pub claimed: usize,
    pub published: usize,
    pub failed: usize,
    /// Claimed items left scheduled because publishing was paused mid-cycle.
    pub skipped: usize,
    /// The whole cycle was skipped because publishing is paused.
    pub paused: bool,
}

pub struct PublishLoop {
    queue: Arc<ContentQueueManager>,
    publisher: Arc<dyn ContentPublisher>,
    breaker: Arc<CircuitBreaker>,
    recovery: Arc<RecoveryManager>,
    config: PublisherConfig,
}

impl PublishLoop {
    pub fn new(
        queue: Arc<ContentQueueManager>,
        publisher: Arc<dyn ContentPublisher>,
        breaker: Arc<CircuitBreaker>,
        recovery: Arc<RecoveryManager>,
        config: PublisherConfig,
    ) -> Self {
        Self {
            queue,
            publisher,
            breaker,
            recovery,
            config,
        }
    }

    /// Run cycles until `cancel` fires.
    pub async fn run(&self, cancel: CancellationToken) -> Result<(), TidepoolError> {
        info!(
            publisher = self.publisher.name(),
            interval_secs = self.config.poll_interval_secs,
            "publish loop running"
        );
        let mut ticker = tokio::time::interval(self.config.poll_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("shutdown signal received, stopping publish loop");
                    break;
                }
                _ = ticker.tick() => {
                    match self.run_once(Utc::now()).await {
                        Ok(report) if report.claimed > 0 => info!(
                            claimed = report.claimed,
                            published = report.published,
                            failed = report.failed,
                            skipped = report.skipped,
                            "publish cycle complete"
                        ),
                        Ok(report) => {
                            debug!(paused = report.paused, "nothing published this cycle")
                        }
                        Err(e) => error!(error = %e, "publish cycle failed"),
                    }
                }
            }
        }

        info!("publish loop stopped");
        Ok(())
    }

    /// Run a single cycle as of `now`.
    pub async fn run_once(&self, now: DateTime<Utc>) -> Result<CycleReport, TidepoolError> {
        let mut report = CycleReport::default();
        if let Some(until) = self.paused_at(now) {
            debug!(%until, "publishing paused");
            report.paused = true;
            return Ok(report);
        }

        let due = self.queue.due_for_publish(now, self.config.batch_size).await?;
        report.claimed = due.len();
        for item in &due {
            if self.paused_at(Utc::now()).is_some() {
                report.skipped += 1;
                continue;
            }
            match self.publish(item).await {
                Ok(external_id) => {
                    match self.queue.mark_published(&item.id, &external_id).await {
                        Ok(()) => report.published += 1,
                        Err(e) => error!(
                            content_id = %item.id,
                            %external_id,
                            error = %e,
                            "published but could not record it"
                        ),
                    }
                }
                Err(e) => {
                    warn!(content_id = %item.id, error = %e, "publish failed");
                    match self.queue.mark_failed(&item.id, &e.to_string()).await {
                        Ok(()) => report.failed += 1,
                        Err(mark) => error!(
                            content_id = %item.id,
                            error = %mark,
                            "could not record publish failure"
                        ),
                    }
                }
            }
        }
        Ok(report)
    }

    fn paused_at(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.recovery
            .paused_until()
            .filter(|_| self.recovery.is_paused_at(now))
    }

    async fn publish(&self, item: &ContentItem) -> Result<String, TidepoolError> {
        let timeout = self.config.request_timeout();
        let mut context = BTreeMap::new();
        context.insert("content_id".to_string(), item.id.clone());
        context.insert("publisher".to_string(), self.publisher.name().to_string());

        self.recovery
            .run_with_retry("publish", context, || async move {
                self.breaker
                    .guard(|| async move {
                        match tokio::time::timeout(timeout, self.publisher.publish(item)).await {
                            Ok(result) => result,
                            Err(_) => Err(Fault::Timeout(timeout)),
                        }
                    })
                    .await
            })
            .await
    }
}
