// SPDX-FileCopyrightText: 2026 Tidepool Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Retry with exponential backoff and jitter.
//!
//! An operation is tried up to `max_attempts` times in total. A failure whose
//! [`ErrorType`] is not in the retryable set is returned immediately. Between
//! tries the handler waits `min(initial_delay * base^n, max_delay)` where `n`
//! is the zero-based retry index, optionally scaled by a uniform factor in
//! `[0.5, 1.0]`. A retry-after hint carried by the error replaces the
//! computed delay (capped at `max_delay`, never jittered). The last error is
//! returned unchanged once the budget is spent.
//!
//! [`RetryHandler::retry`] blocks the calling thread while waiting;
//! [`RetryHandler::async_retry`] suspends on the tokio timer instead. Both
//! share the same decision logic.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tidepool_config::model::RetryConfig;
use tidepool_core::ErrorType;
use tracing::{error, info, warn};

use crate::classifier::Classify;

/// One failed try, as seen by an observer.
#[derive(Debug, Clone, PartialEq)]
pub struct AttemptReport {
    /// 1-based number of the try that failed.
    pub attempt: u32,
    pub error_type: ErrorType,
    pub message: String,
    /// Delay before the next try, or `None` when the handler gives up.
    pub next_delay: Option<Duration>,
}

/// Retries operations according to a [`RetryConfig`].
#[derive(Debug, Clone)]
pub struct RetryHandler {
    config: RetryConfig,
}

impl RetryHandler {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    pub fn is_retryable(&self, error_type: ErrorType) -> bool {
        self.config.retryable.contains(&error_type)
    }

    /// Backoff before jitter for the zero-based retry index `retry`.
    pub fn base_delay(&self, retry: u32, hint: Option<Duration>) -> Duration {
        let max = self.config.max_delay();
        if let Some(hint) = hint {
            return hint.min(max);
        }
        let exponent = i32::try_from(retry).unwrap_or(i32::MAX);
        let secs = self.config.initial_delay_secs * self.config.exponential_base.powi(exponent);
        // f64::min discards NaN, so an overflowing product lands on the cap.
        Duration::try_from_secs_f64(secs.min(self.config.max_delay_secs)).unwrap_or(max)
    }

    /// The delay actually slept before the next try.
    pub fn delay_for(&self, retry: u32, hint: Option<Duration>) -> Duration {
        let base = self.base_delay(retry, hint);
        if hint.is_some() || !self.config.jitter {
            return base;
        }
        base.mul_f64(rand::thread_rng().gen_range(0.5..=1.0))
    }

    /// Decide what to do after try number `attempt` failed with `err`.
    fn after_failure<E: Classify + Display>(&self, attempt: u32, err: &E) -> AttemptReport {
        let error_type = err.error_type();
        let next_delay = (self.is_retryable(error_type) && attempt < self.config.max_attempts)
            .then(|| self.delay_for(attempt - 1, err.retry_after()));
        match next_delay {
            Some(delay) => warn!(
                error = %err,
                %error_type,
                attempt,
                max_attempts = self.config.max_attempts,
                delay_ms = delay.as_millis() as u64,
                "operation failed, retrying"
            ),
            None if self.is_retryable(error_type) => error!(
                error = %err,
                %error_type,
                attempts = attempt,
                "operation failed after all retry attempts exhausted"
            ),
            None => warn!(
                error = %err,
                %error_type,
                "operation failed with non-retryable error"
            ),
        }
        AttemptReport {
            attempt,
            error_type,
            message: err.to_string(),
            next_delay,
        }
    }

    /// Blocking retry.
    pub fn retry<T, E, F>(&self, operation: F) -> Result<T, E>
    where
        F: FnMut() -> Result<T, E>,
        E: Classify + Display,
    {
        self.retry_observed(operation, |_| {})
    }

    /// Blocking retry that reports every failed try to `observer`.
    pub fn retry_observed<T, E, F, O>(&self, mut operation: F, mut observer: O) -> Result<T, E>
    where
        F: FnMut() -> Result<T, E>,
        E: Classify + Display,
        O: FnMut(&AttemptReport),
    {
        let mut attempt = 1;
        loop {
            match operation() {
                Ok(value) => {
                    if attempt > 1 {
                        info!(attempts = attempt, "operation succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(err) => {
                    let report = self.after_failure(attempt, &err);
                    observer(&report);
                    match report.next_delay {
                        Some(delay) => std::thread::sleep(delay),
                        None => return Err(err),
                    }
                }
            }
            attempt += 1;
        }
    }

    /// Non-blocking retry; waiting yields to other tasks.
    pub async fn async_retry<T, E, F, Fut>(&self, operation: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Classify + Display,
    {
        self.async_retry_observed(operation, |_| {}).await
    }

    /// Non-blocking retry that reports every failed try to `observer`.
    pub async fn async_retry_observed<T, E, F, Fut, O>(
        &self,
        mut operation: F,
        mut observer: O,
    ) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Classify + Display,
        O: FnMut(&AttemptReport),
    {
        let mut attempt = 1;
        loop {
            match operation().await {
                Ok(value) => {
                    if attempt > 1 {
                        info!(attempts = attempt, "operation succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(err) => {
                    let report = self.after_failure(attempt, &err);
                    observer(&report);
                    match report.next_delay {
                        Some(delay) => tokio::time::sleep(delay).await,
                        None => return Err(err),
                    }
                }
            }
            attempt += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use tidepool_core::Fault;

    use super::*;

    fn config(jitter: bool) -> RetryConfig {
        RetryConfig {
            max_attempts: 3,
            initial_delay_secs: 1.0,
            max_delay_secs: 60.0,
            exponential_base: 2.0,
            jitter,
            retryable: vec![
                ErrorType::NetworkError,
                ErrorType::RateLimit,
                ErrorType::TemporaryError,
            ],
        }
    }

    fn fast_config() -> RetryConfig {
        RetryConfig {
            initial_delay_secs: 0.001,
            max_delay_secs: 0.004,
            ..config(false)
        }
    }

    #[test]
    fn backoff_doubles_without_jitter() {
        let handler = RetryHandler::new(config(false));
        let delays: Vec<_> = (0..3).map(|n| handler.delay_for(n, None)).collect();
        assert_eq!(
            delays,
            vec![
                Duration::from_secs(1),
                Duration::from_secs(2),
                Duration::from_secs(4)
            ]
        );
    }

    #[test]
    fn backoff_is_capped() {
        let handler = RetryHandler::new(RetryConfig {
            max_delay_secs: 3.0,
            ..config(false)
        });
        assert_eq!(handler.delay_for(2, None), Duration::from_secs(3));
        assert_eq!(handler.delay_for(500, None), Duration::from_secs(3));
    }

    #[test]
    fn jitter_stays_within_half_to_full() {
        let handler = RetryHandler::new(config(true));
        for _ in 0..200 {
            let delay = handler.delay_for(2, None);
            assert!(delay >= Duration::from_secs(2), "{delay:?}");
            assert!(delay <= Duration::from_secs(4), "{delay:?}");
        }
    }

    #[test]
    fn retry_after_hint_overrides_and_is_capped() {
        let handler = RetryHandler::new(config(true));
        assert_eq!(
            handler.delay_for(0, Some(Duration::from_secs(10))),
            Duration::from_secs(10)
        );
        assert_eq!(
            handler.delay_for(0, Some(Duration::from_secs(3600))),
            Duration::from_secs(60)
        );
    }

    #[test]
    fn blocking_retry_succeeds_on_third_try() {
        let handler = RetryHandler::new(fast_config());
        let calls = AtomicU32::new(0);
        let mut reports = Vec::new();

        let result = handler.retry_observed(
            || {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(Fault::Connection("reset".into()))
                } else {
                    Ok("published")
                }
            },
            |report| reports.push(report.clone()),
        );

        assert_eq!(result, Ok("published"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].attempt, 1);
        assert_eq!(reports[1].attempt, 2);
        assert!(reports.iter().all(|r| r.next_delay.is_some()));
    }

    #[test]
    fn non_retryable_error_is_not_retried() {
        let handler = RetryHandler::new(fast_config());
        let calls = AtomicU32::new(0);
        let result: Result<(), Fault> = handler.retry(|| {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(Fault::http(401, "bad token"))
        });
        assert_eq!(result, Err(Fault::http(401, "bad token")));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn exhaustion_returns_last_error_unchanged() {
        let handler = RetryHandler::new(fast_config());
        let calls = AtomicU32::new(0);
        let mut reports = Vec::new();
        let result: Result<(), Fault> = handler.retry_observed(
            || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                Err(Fault::http(503, format!("down {n}")))
            },
            |report| reports.push(report.clone()),
        );
        assert_eq!(result, Err(Fault::http(503, "down 2")));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(reports.len(), 3);
        assert_eq!(reports[2].next_delay, None);
    }

    #[tokio::test(start_paused = true)]
    async fn async_retry_waits_on_the_timer() {
        let handler = RetryHandler::new(config(false));
        let calls = AtomicU32::new(0);
        let started = tokio::time::Instant::now();

        let result = handler
            .async_retry(|| {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(Fault::Timeout(Duration::from_secs(30)))
                    } else {
                        Ok(n)
                    }
                }
            })
            .await;

        assert_eq!(result, Ok(2));
        // 1s + 2s of backoff, auto-advanced by the paused clock.
        assert_eq!(started.elapsed(), Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn async_retry_honours_retry_after() {
        let handler = RetryHandler::new(config(true));
        let calls = AtomicU32::new(0);
        let started = tokio::time::Instant::now();

        let result = handler
            .async_retry(|| {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n == 0 {
                        Err(Fault::Http {
                            status: 429,
                            message: "slow down".into(),
                            retry_after: Some(Duration::from_secs(7)),
                        })
                    } else {
                        Ok(())
                    }
                }
            })
            .await;

        assert!(result.is_ok());
        assert_eq!(started.elapsed(), Duration::from_secs(7));
    }
}
