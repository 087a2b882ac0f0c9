// SPDX-FileCopyrightText: 2026 Tidepool Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end behaviour of retry, breaker and tracking working together.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use tempfile::tempdir;
use tidepool_config::model::{CircuitBreakerConfig, RetryConfig};
use tidepool_core::{Fault, TidepoolError};
use tidepool_resilience::{
    BreakerState, CircuitBreaker, ErrorTracker, RecoveryManager, RetryHandler,
};
use tidepool_storage::Database;

async fn recovery(dir: &tempfile::TempDir) -> RecoveryManager {
    let db = Database::open(dir.path().join("flow.db").to_str().unwrap())
        .await
        .unwrap();
    RecoveryManager::new(
        ErrorTracker::new(db),
        RetryHandler::new(RetryConfig::default()),
        Duration::from_secs(3600),
    )
}

#[tokio::test(start_paused = true)]
async fn two_failures_then_success_leaves_two_failed_attempts() {
    let dir = tempdir().unwrap();
    let manager = recovery(&dir).await;
    let calls = AtomicU32::new(0);

    let result = manager
        .run_with_retry("publish", BTreeMap::new(), || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                match n {
                    0 => Err(Fault::Connection("connection reset".into())),
                    1 => Err(Fault::http(503, "service unavailable")),
                    _ => Ok("media-1"),
                }
            }
        })
        .await;

    assert_eq!(result, Ok("media-1"));
    assert_eq!(calls.load(Ordering::SeqCst), 3);

    let records = manager.tracker().recent_errors(10).await.unwrap();
    assert_eq!(records.len(), 1);
    let attempts = manager
        .tracker()
        .retry_attempts(&records[0].id)
        .await
        .unwrap();
    assert_eq!(attempts.len(), 2);
    assert_eq!(
        attempts.iter().map(|a| a.attempt_number).collect::<Vec<_>>(),
        vec![1, 2]
    );
    assert!(attempts.iter().all(|a| !a.success));
}

#[tokio::test(start_paused = true)]
async fn fourth_call_fails_fast_after_three_failures() {
    let breaker = CircuitBreaker::new(
        "publisher",
        &CircuitBreakerConfig {
            failure_threshold: 3,
            recovery_timeout_secs: 60,
        },
    );
    let invoked = AtomicU32::new(0);

    for _ in 0..4 {
        let _ = breaker
            .guard(|| async {
                invoked.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(Fault::http(500, "boom"))
            })
            .await;
    }

    assert_eq!(invoked.load(Ordering::SeqCst), 3);
    assert_eq!(breaker.state(), BreakerState::Open);

    // Retrying a fast-failed call is treated as temporary and honours the
    // breaker's remaining cooldown as its hint.
    let handler = RetryHandler::new(RetryConfig {
        max_attempts: 2,
        ..RetryConfig::default()
    });
    let started = tokio::time::Instant::now();
    let result = handler
        .async_retry(|| async {
            breaker
                .guard(|| async { Ok::<_, Fault>("published") })
                .await
        })
        .await;
    assert_eq!(result.unwrap(), "published");
    assert_eq!(started.elapsed(), Duration::from_secs(60));
    assert_eq!(breaker.state(), BreakerState::Closed);
}

#[tokio::test]
async fn non_retryable_failure_is_recorded_once_without_attempts() {
    let dir = tempdir().unwrap();
    let manager = recovery(&dir).await;

    let result: Result<(), TidepoolError> = manager
        .run_with_retry("publish", BTreeMap::new(), || async {
            Err(TidepoolError::from(Fault::http(400, "caption rejected")))
        })
        .await;
    assert!(result.is_err());

    let records = manager.tracker().recent_errors(10).await.unwrap();
    assert_eq!(records.len(), 1);
    assert!(
        manager
            .tracker()
            .retry_attempts(&records[0].id)
            .await
            .unwrap()
            .is_empty()
    );
}
