// SPDX-FileCopyrightText: 2026 Tidepool Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Aggregate system health.
//!
//! Each check yields a [`ComponentHealth`]; the overall status is the worst
//! component status. Checks never fail as a whole: a check that cannot run
//! reports its component as critical.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use strum::Display;
use tidepool_config::model::HealthConfig;
use tidepool_core::ConnectivityProbe;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::circuit_breaker::{BreakerState, CircuitBreaker};
use crate::recovery::RecoveryManager;
use crate::tracker::ErrorTracker;

/// Status of one component or of the whole system. Ordered by severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Display, Serialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Critical,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComponentHealth {
    pub name: String,
    pub status: HealthStatus,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
}

impl ComponentHealth {
    fn new(name: &str, status: HealthStatus, message: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            status,
            message: message.into(),
            latency_ms: None,
        }
    }

    fn with_latency(mut self, latency: Duration) -> Self {
        self.latency_ms = Some(latency.as_millis() as u64);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub checked_at: DateTime<Utc>,
    pub components: Vec<ComponentHealth>,
    /// One entry per unhealthy component; empty when all is well.
    pub recommendations: Vec<String>,
}

impl HealthReport {
    pub fn component(&self, name: &str) -> Option<&ComponentHealth> {
        self.components.iter().find(|c| c.name == name)
    }
}

pub struct HealthChecker {
    tracker: ErrorTracker,
    probe: Arc<dyn ConnectivityProbe>,
    config: HealthConfig,
    breaker: Option<Arc<CircuitBreaker>>,
    recovery: Option<Arc<RecoveryManager>>,
}

impl HealthChecker {
    pub fn new(
        tracker: ErrorTracker,
        probe: Arc<dyn ConnectivityProbe>,
        config: HealthConfig,
    ) -> Self {
        Self {
            tracker,
            probe,
            config,
            breaker: None,
            recovery: None,
        }
    }

    /// Include the publishing circuit breaker in reports.
    pub fn with_breaker(mut self, breaker: Arc<CircuitBreaker>) -> Self {
        self.breaker = Some(breaker);
        self
    }

    /// Include recovery flags (token refresh) in reports.
    pub fn with_recovery(mut self, recovery: Arc<RecoveryManager>) -> Self {
        self.recovery = Some(recovery);
        self
    }

    pub async fn check_system_health(&self) -> HealthReport {
        let mut components = vec![
            self.check_error_rate().await,
            self.check_connectivity().await,
            self.check_storage().await,
        ];
        if let Some(breaker) = &self.breaker {
            components.push(check_breaker(breaker));
        }
        if let Some(recovery) = &self.recovery {
            components.push(check_authentication(recovery));
        }

        let status = components
            .iter()
            .map(|c| c.status)
            .max()
            .unwrap_or(HealthStatus::Healthy);
        let recommendations = components
            .iter()
            .filter(|c| c.status != HealthStatus::Healthy)
            .map(|c| self.recommend(c))
            .collect();

        if status == HealthStatus::Healthy {
            debug!("system healthy");
        } else {
            warn!(%status, "system health check found issues");
        }
        HealthReport {
            status,
            checked_at: Utc::now(),
            components,
            recommendations,
        }
    }

    async fn check_error_rate(&self) -> ComponentHealth {
        const NAME: &str = "error_rate";
        match self.tracker.get_error_statistics(1).await {
            Ok(stats) => {
                let rate = stats.error_rate;
                let status = if rate >= self.config.error_rate_critical {
                    HealthStatus::Critical
                } else if rate >= self.config.error_rate_degraded {
                    HealthStatus::Degraded
                } else {
                    HealthStatus::Healthy
                };
                ComponentHealth::new(
                    NAME,
                    status,
                    format!(
                        "{rate:.1} errors/hour ({} unresolved)",
                        stats.unresolved
                    ),
                )
            }
            Err(e) => ComponentHealth::new(
                NAME,
                HealthStatus::Critical,
                format!("error statistics unavailable: {e}"),
            ),
        }
    }

    async fn check_connectivity(&self) -> ComponentHealth {
        const NAME: &str = "api_connectivity";
        let timeout = self.config.probe_timeout();
        match tokio::time::timeout(timeout, self.probe.probe()).await {
            Ok(Ok(latency)) => ComponentHealth::new(
                NAME,
                HealthStatus::Healthy,
                format!("{} reachable", self.probe.target()),
            )
            .with_latency(latency),
            Ok(Err(fault)) => ComponentHealth::new(
                NAME,
                HealthStatus::Critical,
                format!("{} unreachable: {fault}", self.probe.target()),
            ),
            Err(_) => ComponentHealth::new(
                NAME,
                HealthStatus::Critical,
                format!(
                    "{} did not answer within {}s",
                    self.probe.target(),
                    timeout.as_secs()
                ),
            ),
        }
    }

    async fn check_storage(&self) -> ComponentHealth {
        const NAME: &str = "storage";
        let started = Instant::now();
        match self.tracker.database().ping().await {
            Ok(()) => ComponentHealth::new(NAME, HealthStatus::Healthy, "database reachable")
                .with_latency(started.elapsed()),
            Err(e) => ComponentHealth::new(
                NAME,
                HealthStatus::Critical,
                format!("database unreachable: {e}"),
            ),
        }
    }

    fn recommend(&self, component: &ComponentHealth) -> String {
        match (component.name.as_str(), component.status) {
            ("error_rate", HealthStatus::Critical) => {
                "Error rate is critical: pause publishing and review `tidepool errors`".to_string()
            }
            ("error_rate", _) => {
                "Error rate is elevated: review recent errors with `tidepool errors`".to_string()
            }
            ("api_connectivity", _) => format!(
                "Check network connectivity to {} and the publishing endpoint",
                self.probe.target()
            ),
            ("storage", _) => {
                "Check the database path, file permissions and free disk space".to_string()
            }
            ("circuit_breaker", _) => {
                "Publishing is failing fast: investigate the transport before the circuit closes"
                    .to_string()
            }
            ("authentication", _) => "Refresh the publishing access token".to_string(),
            (name, status) => format!("Investigate {name} ({status})"),
        }
    }
}

fn check_breaker(breaker: &CircuitBreaker) -> ComponentHealth {
    const NAME: &str = "circuit_breaker";
    let snapshot = breaker.snapshot();
    match snapshot.state {
        BreakerState::Closed => ComponentHealth::new(
            NAME,
            HealthStatus::Healthy,
            format!("{} closed", snapshot.name),
        ),
        BreakerState::Open => ComponentHealth::new(
            NAME,
            HealthStatus::Degraded,
            format!(
                "{} open after {} failures, retry in {}s",
                snapshot.name,
                snapshot.failure_count,
                snapshot.retry_in.unwrap_or_default().as_secs()
            ),
        ),
        BreakerState::HalfOpen => ComponentHealth::new(
            NAME,
            HealthStatus::Degraded,
            format!("{} half-open, awaiting a trial call", snapshot.name),
        ),
    }
}

fn check_authentication(recovery: &RecoveryManager) -> ComponentHealth {
    const NAME: &str = "authentication";
    if recovery.token_refresh_required() {
        ComponentHealth::new(NAME, HealthStatus::Critical, "access token refresh required")
    } else {
        ComponentHealth::new(NAME, HealthStatus::Healthy, "credentials accepted")
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use async_trait::async_trait;
    use tempfile::tempdir;
    use tidepool_config::model::RetryConfig;
    use tidepool_core::{ErrorType, Fault};
    use tidepool_storage::Database;

    use super::*;
    use crate::retry::RetryHandler;

    struct Probe(Result<Duration, Fault>);

    #[async_trait]
    impl ConnectivityProbe for Probe {
        fn target(&self) -> &str {
            "https://graph.example.test"
        }

        async fn probe(&self) -> Result<Duration, Fault> {
            self.0.clone()
        }
    }

    struct HangingProbe;

    #[async_trait]
    impl ConnectivityProbe for HangingProbe {
        fn target(&self) -> &str {
            "https://slow.example.test"
        }

        async fn probe(&self) -> Result<Duration, Fault> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(Duration::ZERO)
        }
    }

    async fn checker(
        probe: Arc<dyn ConnectivityProbe>,
    ) -> (HealthChecker, ErrorTracker, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("h.db").to_str().unwrap())
            .await
            .unwrap();
        let tracker = ErrorTracker::new(db);
        let checker = HealthChecker::new(tracker.clone(), probe, HealthConfig::default());
        (checker, tracker, dir)
    }

    fn reachable() -> Arc<dyn ConnectivityProbe> {
        Arc::new(Probe(Ok(Duration::from_millis(42))))
    }

    #[tokio::test]
    async fn all_green_has_no_recommendations() {
        let (checker, _tracker, _dir) = checker(reachable()).await;
        let report = checker.check_system_health().await;
        assert_eq!(report.status, HealthStatus::Healthy);
        assert!(report.recommendations.is_empty());
        assert_eq!(report.components.len(), 3);
        assert_eq!(
            report.component("api_connectivity").unwrap().latency_ms,
            Some(42)
        );
    }

    #[tokio::test]
    async fn error_rate_thresholds() {
        let (checker, tracker, _dir) = checker(reachable()).await;
        for _ in 0..5 {
            tracker
                .record_error(ErrorType::NetworkError, "reset", BTreeMap::new())
                .await
                .unwrap();
        }
        let report = checker.check_system_health().await;
        assert_eq!(report.status, HealthStatus::Degraded);
        assert_eq!(
            report.component("error_rate").unwrap().status,
            HealthStatus::Degraded
        );
        assert_eq!(report.recommendations.len(), 1);

        for _ in 0..15 {
            tracker
                .record_error(ErrorType::NetworkError, "reset", BTreeMap::new())
                .await
                .unwrap();
        }
        let report = checker.check_system_health().await;
        assert_eq!(report.status, HealthStatus::Critical);
    }

    #[tokio::test]
    async fn unreachable_api_is_critical() {
        let probe = Arc::new(Probe(Err(Fault::Connection("dns failure".into()))));
        let (checker, _tracker, _dir) = checker(probe).await;
        let report = checker.check_system_health().await;
        assert_eq!(report.status, HealthStatus::Critical);
        let api = report.component("api_connectivity").unwrap();
        assert!(api.message.contains("dns failure"));
        assert!(report.recommendations[0].contains("graph.example.test"));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_probe_times_out() {
        let (checker, _tracker, _dir) = checker(Arc::new(HangingProbe)).await;
        let report = checker.check_system_health().await;
        let api = report.component("api_connectivity").unwrap();
        assert_eq!(api.status, HealthStatus::Critical);
        assert!(api.message.contains("within 5s"));
    }

    #[tokio::test]
    async fn open_breaker_degrades_and_token_refresh_is_critical() {
        let (checker, tracker, _dir) = checker(reachable()).await;
        let breaker = Arc::new(CircuitBreaker::with_settings(
            "publisher",
            1,
            Duration::from_secs(60),
        ));
        breaker.record_failure();
        let recovery = Arc::new(RecoveryManager::new(
            tracker,
            RetryHandler::new(RetryConfig::default()),
            Duration::from_secs(3600),
        ));
        let checker = checker
            .with_breaker(breaker)
            .with_recovery(Arc::clone(&recovery));

        let report = checker.check_system_health().await;
        assert_eq!(report.status, HealthStatus::Degraded);
        assert_eq!(
            report.component("circuit_breaker").unwrap().status,
            HealthStatus::Degraded
        );

        recovery.recover(ErrorType::AuthenticationError, None, &BTreeMap::new());
        let report = checker.check_system_health().await;
        assert_eq!(report.status, HealthStatus::Critical);
        assert_eq!(report.recommendations.len(), 2);
        assert!(
            report
                .recommendations
                .contains(&"Refresh the publishing access token".to_string())
        );
    }

    #[test]
    fn status_orders_by_severity() {
        assert!(HealthStatus::Healthy < HealthStatus::Degraded);
        assert!(HealthStatus::Degraded < HealthStatus::Critical);
        assert_eq!(HealthStatus::Critical.to_string(), "critical");
    }
}
