// SPDX-FileCopyrightText: 2026 Tidepool Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `tidepool serve` command implementation.
//!
//! Runs the publish loop against the configured publisher until SIGINT or
//! SIGTERM, with a background monitor that re-runs the health check and
//! logs status changes.

use std::sync::Arc;
use std::time::Duration;

use tidepool_core::TidepoolError;
use tidepool_queue::PublishLoop;
use tidepool_resilience::{CircuitBreaker, HealthChecker, HealthReport, HealthStatus};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::app::App;
use crate::shutdown;

const HEALTH_INTERVAL: Duration = Duration::from_secs(300);

pub async fn run_serve(app: App) -> Result<(), TidepoolError> {
    info!("starting tidepool serve");

    let publisher = app.publisher()?;
    let breaker = Arc::new(CircuitBreaker::new(
        publisher.name(),
        &app.config.circuit_breaker,
    ));
    let health = app.health_checker(Some(Arc::clone(&breaker)))?;
    let initial = health.check_system_health().await;
    log_report(&initial);

    let cancel = shutdown::install_signal_handler();
    let monitor = tokio::spawn(health_monitor(health, initial.status, cancel.clone()));

    let publish_loop = PublishLoop::new(
        Arc::clone(&app.queue),
        publisher,
        breaker,
        Arc::clone(&app.recovery),
        app.config.publisher.clone(),
    );
    let result = publish_loop.run(cancel.clone()).await;

    cancel.cancel();
    if let Err(e) = monitor.await {
        warn!(error = %e, "health monitor task failed");
    }
    if let Err(e) = app.db.close().await {
        error!(error = %e, "failed to checkpoint database on shutdown");
    }
    info!("tidepool serve stopped");
    result
}

/// Re-run the health check periodically and log whenever the overall
/// status changes.
async fn health_monitor(health: HealthChecker, mut last: HealthStatus, cancel: CancellationToken) {
    let mut interval = tokio::time::interval(HEALTH_INTERVAL);
    // The first tick completes immediately and the startup check already ran.
    interval.tick().await;

    loop {
        tokio::select! {
            _ = interval.tick() => {
                let report = health.check_system_health().await;
                if report.status != last {
                    log_report(&report);
                    last = report.status;
                }
            }
            _ = cancel.cancelled() => {
                info!("health monitor shutting down");
                break;
            }
        }
    }
}

fn log_report(report: &HealthReport) {
    match report.status {
        HealthStatus::Healthy => info!(status = %report.status, "system health"),
        HealthStatus::Degraded | HealthStatus::Critical => {
            warn!(status = %report.status, "system health");
            for recommendation in &report.recommendations {
                warn!(%recommendation, "health recommendation");
            }
        }
    }
}

/// Initializes the tracing subscriber with the given log level.
///
/// Logs go to stderr so command output on stdout stays machine-readable.
pub fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("tidepool={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_names(false)
        .init();
}
