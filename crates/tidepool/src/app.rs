// SPDX-FileCopyrightText: 2026 Tidepool Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Wiring shared by every command.

use std::sync::Arc;

use tidepool_config::model::TidepoolConfig;
use tidepool_core::{ContentPublisher, TidepoolError};
use tidepool_queue::{
    ContentQueueManager, ContentValidator, CuratedHashtags, DryRunPublisher, HttpProbe,
    WebhookPublisher,
};
use tidepool_resilience::{
    CircuitBreaker, ErrorTracker, HealthChecker, RecoveryManager, RetryHandler,
};
use tidepool_storage::Database;
use tracing::info;

/// Storage plus the queue and resilience services built on top of it.
///
/// Breaker and recovery state live in memory and start fresh on every
/// process start.
pub struct App {
    pub config: TidepoolConfig,
    pub db: Database,
    pub queue: Arc<ContentQueueManager>,
    pub tracker: ErrorTracker,
    pub recovery: Arc<RecoveryManager>,
}

impl App {
    pub async fn open(config: TidepoolConfig) -> Result<Self, TidepoolError> {
        let db = Database::open_with(&config.storage.database_path, config.storage.wal_mode)
            .await?;
        let tracker = ErrorTracker::new(db.clone());
        let queue = Arc::new(ContentQueueManager::new(
            db.clone(),
            ContentValidator::new(config.validation.clone()),
            Arc::new(CuratedHashtags),
            config.queue.clone(),
        ));
        let recovery = Arc::new(RecoveryManager::new(
            tracker.clone(),
            RetryHandler::new(config.retry.clone()),
            config.health.rate_limit_backoff(),
        ));
        Ok(Self {
            config,
            db,
            queue,
            tracker,
            recovery,
        })
    }

    /// The webhook publisher, or the dry-run publisher without an endpoint.
    pub fn publisher(&self) -> Result<Arc<dyn ContentPublisher>, TidepoolError> {
        let settings = &self.config.publisher;
        match &settings.endpoint {
            Some(endpoint) => {
                info!(%endpoint, "publishing through webhook");
                Ok(Arc::new(WebhookPublisher::new(
                    endpoint.clone(),
                    settings.access_token.as_deref(),
                    settings.request_timeout(),
                )?))
            }
            None => {
                info!("no publisher endpoint configured, running in dry-run mode");
                Ok(Arc::new(DryRunPublisher))
            }
        }
    }

    pub fn health_checker(
        &self,
        breaker: Option<Arc<CircuitBreaker>>,
    ) -> Result<HealthChecker, TidepoolError> {
        let probe = HttpProbe::new(
            self.config.health.probe_url.clone(),
            self.config.health.probe_timeout(),
        )?;
        let checker = HealthChecker::new(
            self.tracker.clone(),
            Arc::new(probe),
            self.config.health.clone(),
        )
        .with_recovery(Arc::clone(&self.recovery));
        Ok(match breaker {
            Some(breaker) => checker.with_breaker(breaker),
            None => checker,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_in(dir: &tempfile::TempDir) -> TidepoolConfig {
        let mut config = TidepoolConfig::default();
        config.storage.database_path = dir
            .path()
            .join("nested")
            .join("tidepool.db")
            .to_string_lossy()
            .into_owned();
        config
    }

    #[tokio::test]
    async fn open_creates_database_directory() {
        let dir = tempfile::tempdir().unwrap();
        let app = App::open(config_in(&dir)).await.unwrap();
        assert!(dir.path().join("nested").join("tidepool.db").exists());
        assert!(app.queue.list(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn publisher_falls_back_to_dry_run() {
        let dir = tempfile::tempdir().unwrap();
        let app = App::open(config_in(&dir)).await.unwrap();
        assert_eq!(app.publisher().unwrap().name(), "dry-run");
    }

    #[tokio::test]
    async fn publisher_uses_webhook_when_configured() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config_in(&dir);
        config.publisher.endpoint = Some("https://hooks.example.test/publish".into());
        config.publisher.access_token = Some("token".into());
        let app = App::open(config).await.unwrap();
        assert_eq!(app.publisher().unwrap().name(), "webhook");
    }
}
