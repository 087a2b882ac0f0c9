// SPDX-FileCopyrightText: 2026 Tidepool Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory circuit breaker.
//!
//! ```text
//! closed ──(failure_count >= threshold)──> open
//! open ──(recovery_timeout since last failure)──> half_open
//! half_open ──(trial succeeds)──> closed
//! half_open ──(trial fails)──> open
//! ```
//!
//! Any success resets the failure count. Half-open admits exactly one trial
//! call at a time; concurrent callers fast-fail until the trial resolves.
//! State lives only in this process and starts closed on every restart.

use std::future::Future;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use serde::Serialize;
use strum::Display;
use tidepool_config::model::CircuitBreakerConfig;
use tidepool_core::TidepoolError;
use tokio::time::Instant;
use tracing::{info, warn};

/// Circuit breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

/// Point-in-time view of a breaker, for health reporting.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BreakerSnapshot {
    pub name: String,
    pub state: BreakerState,
    pub failure_count: u32,
    /// Time left until a trial call is allowed, when open.
    pub retry_in: Option<Duration>,
}

#[derive(Debug)]
struct Inner {
    state: BreakerState,
    failure_count: u32,
    last_failure: Option<Instant>,
    trial_in_flight: bool,
}

/// Guards calls to one dependency.
#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    failure_threshold: u32,
    recovery_timeout: Duration,
    inner: Mutex<Inner>,
}

/// Admission ticket for one guarded call.
///
/// Dropping it without reporting an outcome (e.g. the caller was cancelled)
/// releases a half-open trial slot without changing state.
struct Permit<'a> {
    breaker: &'a CircuitBreaker,
    trial: bool,
    settled: bool,
}

impl Permit<'_> {
    fn success(mut self) {
        self.settled = true;
        self.breaker.record_success();
    }

    fn failure(mut self) {
        self.settled = true;
        self.breaker.record_failure();
    }
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        if self.trial && !self.settled {
            self.breaker.lock().trial_in_flight = false;
        }
    }
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: &CircuitBreakerConfig) -> Self {
        Self::with_settings(name, config.failure_threshold, config.recovery_timeout())
    }

    pub fn with_settings(
        name: impl Into<String>,
        failure_threshold: u32,
        recovery_timeout: Duration,
    ) -> Self {
        Self {
            name: name.into(),
            failure_threshold: failure_threshold.max(1),
            recovery_timeout,
            inner: Mutex::new(Inner {
                state: BreakerState::Closed,
                failure_count: 0,
                last_failure: None,
                trial_in_flight: false,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // The guarded data stays consistent even if a holder panicked.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Move open -> half_open once the cooldown has elapsed.
    fn refresh(&self, inner: &mut Inner) {
        if inner.state == BreakerState::Open
            && inner
                .last_failure
                .is_none_or(|at| at.elapsed() >= self.recovery_timeout)
        {
            inner.state = BreakerState::HalfOpen;
            inner.trial_in_flight = false;
            info!(breaker = %self.name, "circuit breaker half-open, allowing a trial call");
        }
    }

    fn retry_in(&self, inner: &Inner) -> Duration {
        inner
            .last_failure
            .map(|at| self.recovery_timeout.saturating_sub(at.elapsed()))
            .unwrap_or_default()
    }

    pub fn state(&self) -> BreakerState {
        let mut inner = self.lock();
        self.refresh(&mut inner);
        inner.state
    }

    pub fn failure_count(&self) -> u32 {
        self.lock().failure_count
    }

    pub fn snapshot(&self) -> BreakerSnapshot {
        let mut inner = self.lock();
        self.refresh(&mut inner);
        BreakerSnapshot {
            name: self.name.clone(),
            state: inner.state,
            failure_count: inner.failure_count,
            retry_in: (inner.state == BreakerState::Open).then(|| self.retry_in(&inner)),
        }
    }

    fn acquire(&self) -> Result<Permit<'_>, TidepoolError> {
        let mut inner = self.lock();
        self.refresh(&mut inner);
        let trial = match inner.state {
            BreakerState::Closed => false,
            BreakerState::HalfOpen if !inner.trial_in_flight => {
                inner.trial_in_flight = true;
                true
            }
            BreakerState::HalfOpen => {
                return Err(TidepoolError::CircuitOpen {
                    name: self.name.clone(),
                    retry_in: Duration::ZERO,
                });
            }
            BreakerState::Open => {
                return Err(TidepoolError::CircuitOpen {
                    name: self.name.clone(),
                    retry_in: self.retry_in(&inner),
                });
            }
        };
        Ok(Permit {
            breaker: self,
            trial,
            settled: false,
        })
    }

    /// Record a successful call: close the circuit and reset the count.
    pub fn record_success(&self) {
        let mut inner = self.lock();
        if inner.state != BreakerState::Closed {
            info!(breaker = %self.name, "circuit breaker closed");
        }
        inner.state = BreakerState::Closed;
        inner.failure_count = 0;
        inner.last_failure = None;
        inner.trial_in_flight = false;
    }

    /// Record a failed call, opening the circuit at the threshold or when a
    /// half-open trial fails.
    pub fn record_failure(&self) {
        let mut inner = self.lock();
        inner.failure_count = inner.failure_count.saturating_add(1);
        inner.last_failure = Some(Instant::now());
        inner.trial_in_flight = false;
        let should_open = match inner.state {
            BreakerState::HalfOpen => true,
            BreakerState::Closed => inner.failure_count >= self.failure_threshold,
            BreakerState::Open => false,
        };
        if should_open {
            inner.state = BreakerState::Open;
            warn!(
                breaker = %self.name,
                failures = inner.failure_count,
                cooldown_secs = self.recovery_timeout.as_secs(),
                "circuit breaker opened"
            );
        }
    }

    /// Run an async operation through the breaker.
    ///
    /// Fails fast with [`TidepoolError::CircuitOpen`] without invoking
    /// `operation` while the circuit is open.
    pub async fn guard<T, E, F, Fut>(&self, operation: F) -> Result<T, TidepoolError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Into<TidepoolError>,
    {
        let permit = self.acquire()?;
        match operation().await {
            Ok(value) => {
                permit.success();
                Ok(value)
            }
            Err(err) => {
                permit.failure();
                Err(err.into())
            }
        }
    }

    /// Blocking counterpart of [`guard`](Self::guard).
    pub fn guard_blocking<T, E, F>(&self, operation: F) -> Result<T, TidepoolError>
    where
        F: FnOnce() -> Result<T, E>,
        E: Into<TidepoolError>,
    {
        let permit = self.acquire()?;
        match operation() {
            Ok(value) => {
                permit.success();
                Ok(value)
            }
            Err(err) => {
                permit.failure();
                Err(err.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use tidepool_core::Fault;

    use super::*;

    fn breaker(threshold: u32) -> CircuitBreaker {
        CircuitBreaker::with_settings("publisher", threshold, Duration::from_secs(60))
    }

    async fn fail(cb: &CircuitBreaker) -> Result<(), TidepoolError> {
        cb.guard(|| async { Err::<(), _>(Fault::http(503, "down")) })
            .await
    }

    #[tokio::test(start_paused = true)]
    async fn opens_after_threshold_and_fails_fast() {
        let cb = breaker(3);
        for _ in 0..3 {
            assert!(matches!(fail(&cb).await, Err(TidepoolError::Fault(_))));
        }
        assert_eq!(cb.state(), BreakerState::Open);

        let invoked = AtomicU32::new(0);
        let result = cb
            .guard(|| async {
                invoked.fetch_add(1, Ordering::SeqCst);
                Ok::<_, Fault>(())
            })
            .await;
        assert!(matches!(result, Err(TidepoolError::CircuitOpen { .. })));
        assert_eq!(invoked.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn success_resets_failure_count() {
        let cb = breaker(3);
        fail(&cb).await.unwrap_err();
        fail(&cb).await.unwrap_err();
        cb.guard(|| async { Ok::<_, Fault>(()) }).await.unwrap();
        assert_eq!(cb.failure_count(), 0);
        fail(&cb).await.unwrap_err();
        fail(&cb).await.unwrap_err();
        assert_eq!(cb.state(), BreakerState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn half_open_after_cooldown_then_closes_on_success() {
        let cb = breaker(1);
        fail(&cb).await.unwrap_err();
        assert_eq!(cb.state(), BreakerState::Open);

        tokio::time::advance(Duration::from_secs(59)).await;
        assert_eq!(cb.state(), BreakerState::Open);
        let snapshot = cb.snapshot();
        assert_eq!(snapshot.retry_in, Some(Duration::from_secs(1)));

        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(cb.state(), BreakerState::HalfOpen);

        cb.guard(|| async { Ok::<_, Fault>(()) }).await.unwrap();
        assert_eq!(cb.state(), BreakerState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_trial_reopens() {
        let cb = breaker(2);
        fail(&cb).await.unwrap_err();
        fail(&cb).await.unwrap_err();
        tokio::time::advance(Duration::from_secs(60)).await;
        assert_eq!(cb.state(), BreakerState::HalfOpen);

        fail(&cb).await.unwrap_err();
        assert_eq!(cb.state(), BreakerState::Open);
        assert!(matches!(fail(&cb).await, Err(TidepoolError::CircuitOpen { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn half_open_admits_a_single_trial() {
        let cb = breaker(1);
        fail(&cb).await.unwrap_err();
        tokio::time::advance(Duration::from_secs(60)).await;

        let permit = cb.acquire().unwrap();
        assert!(permit.trial);
        assert!(matches!(
            cb.acquire(),
            Err(TidepoolError::CircuitOpen { retry_in, .. }) if retry_in == Duration::ZERO
        ));

        // Abandoning the trial frees the slot without closing the circuit.
        drop(permit);
        assert_eq!(cb.state(), BreakerState::HalfOpen);
        assert!(cb.acquire().is_ok());
    }

    #[test]
    fn blocking_guard_shares_state() {
        let cb = breaker(2);
        for _ in 0..2 {
            let _ = cb.guard_blocking(|| Err::<(), _>(Fault::Connection("refused".into())));
        }
        let result = cb.guard_blocking(|| Ok::<_, Fault>(1));
        assert!(matches!(result, Err(TidepoolError::CircuitOpen { .. })));
    }

    #[test]
    #[tracing_test::traced_test]
    fn state_changes_are_logged() {
        let cb = breaker(1);
        cb.record_failure();
        assert!(logs_contain("circuit breaker opened"));
        assert!(logs_contain("failures=1"));
    }
}
