// SPDX-FileCopyrightText: 2026 Tidepool Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end integration testing.
//!
//! `TestHarness` assembles the full pipeline with mock collaborators and a
//! temporary SQLite database: queue manager, error tracker, recovery
//! manager, circuit breaker, health checker and publish loop.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tidepool_config::model::TidepoolConfig;
use tidepool_core::{
    ConnectivityProbe, ContentBody, ContentPublisher, ContentSource, Fault, Media, PostType,
    TidepoolError,
};
use tidepool_queue::{ContentQueueManager, ContentValidator, NewContent, PublishLoop};
use tidepool_resilience::{
    CircuitBreaker, ErrorTracker, HealthChecker, RecoveryManager, RetryHandler,
};
use tidepool_storage::Database;

use crate::mocks::{MockHashtagOptimizer, MockPublisher, StaticProbe};

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    config: TidepoolConfig,
    outcomes: Vec<Result<String, Fault>>,
    probe: Arc<dyn ConnectivityProbe>,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        let mut config = TidepoolConfig::default();
        config.retry.jitter = false;
        Self {
            config,
            outcomes: Vec::new(),
            probe: Arc::new(StaticProbe::reachable(Duration::from_millis(5))),
        }
    }

    /// Start from a specific configuration. The storage path is ignored.
    pub fn with_config(mut self, config: TidepoolConfig) -> Self {
        self.config = config;
        self
    }

    /// Outcomes the mock publisher replays before it starts succeeding.
    pub fn with_publish_outcomes(mut self, outcomes: Vec<Result<String, Fault>>) -> Self {
        self.outcomes = outcomes;
        self
    }

    pub fn with_probe(mut self, probe: impl ConnectivityProbe) -> Self {
        self.probe = Arc::new(probe);
        self
    }

    /// Build the test harness, creating all required subsystems.
    pub async fn build(self) -> Result<TestHarness, TidepoolError> {
        let temp_dir =
            tempfile::TempDir::new().map_err(|e| TidepoolError::Storage { source: e.into() })?;
        let db_path = temp_dir.path().join("test.db");
        let mut config = self.config;
        config.storage.database_path = db_path.to_string_lossy().into_owned();

        let db = Database::open_with(&config.storage.database_path, config.storage.wal_mode)
            .await?;
        let tracker = ErrorTracker::new(db.clone());
        let queue = Arc::new(ContentQueueManager::new(
            db.clone(),
            ContentValidator::new(config.validation.clone()),
            Arc::new(MockHashtagOptimizer::default()),
            config.queue.clone(),
        ));
        let recovery = Arc::new(RecoveryManager::new(
            tracker.clone(),
            RetryHandler::new(config.retry.clone()),
            config.health.rate_limit_backoff(),
        ));
        let publisher = MockPublisher::with_outcomes(self.outcomes);
        let breaker = Arc::new(CircuitBreaker::new(publisher.name(), &config.circuit_breaker));
        let health = HealthChecker::new(tracker.clone(), self.probe, config.health.clone())
            .with_breaker(Arc::clone(&breaker))
            .with_recovery(Arc::clone(&recovery));
        let publish_loop = PublishLoop::new(
            Arc::clone(&queue),
            Arc::new(publisher.clone()),
            Arc::clone(&breaker),
            Arc::clone(&recovery),
            config.publisher.clone(),
        );

        Ok(TestHarness {
            config,
            db,
            queue,
            tracker,
            recovery,
            breaker,
            health,
            publisher,
            publish_loop,
            _temp_dir: temp_dir,
        })
    }
}

/// A fully wired pipeline on a temporary database.
pub struct TestHarness {
    pub config: TidepoolConfig,
    pub db: Database,
    pub queue: Arc<ContentQueueManager>,
    pub tracker: ErrorTracker,
    pub recovery: Arc<RecoveryManager>,
    pub breaker: Arc<CircuitBreaker>,
    pub health: HealthChecker,
    pub publisher: MockPublisher,
    pub publish_loop: PublishLoop,
    _temp_dir: tempfile::TempDir,
}

impl TestHarness {
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// A harness with default configuration and a succeeding publisher.
    pub async fn new() -> Result<Self, TidepoolError> {
        Self::builder().build().await
    }

    /// A submission that passes every rule (unique per caption).
    pub fn valid_submission(caption: &str) -> NewContent {
        let body = ContentBody::new(
            caption,
            Media::Image("https://cdn.example.test/scape.jpg".into()),
            (0..12).map(|i| format!("scape{i}")).collect(),
        );
        NewContent::new("Test post", body, PostType::Showcase, ContentSource::Manual, "tester")
    }

    /// Queue a valid item and schedule it a minute in the past.
    pub async fn add_due(&self, caption: &str) -> Result<String, TidepoolError> {
        let id = self.queue.add_content(Self::valid_submission(caption)).await?;
        self.queue
            .mark_scheduled(&id, Utc::now() - chrono::Duration::minutes(1))
            .await?;
        Ok(id)
    }
}
