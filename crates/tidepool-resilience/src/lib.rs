// SPDX-FileCopyrightText: 2026 Tidepool Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Resilience primitives for the Tidepool content pipeline.
//!
//! - [`classifier`] maps faults onto the [`ErrorType`](tidepool_core::ErrorType) taxonomy.
//! - [`retry`] retries retryable operations with exponential backoff and jitter,
//!   on either a blocking or an async path.
//! - [`circuit_breaker`] fast-fails calls to a dependency that keeps failing.
//! - [`tracker`] persists error records and retry attempts and aggregates them.
//! - [`recovery`] ties the above together and dispatches per-type recovery actions.
//! - [`health`] aggregates error rate, connectivity and storage reachability.

pub mod circuit_breaker;
pub mod classifier;
pub mod health;
pub mod recovery;
pub mod retry;
pub mod tracker;

pub use circuit_breaker::{BreakerSnapshot, BreakerState, CircuitBreaker};
pub use classifier::{Classify, classify};
pub use health::{ComponentHealth, HealthChecker, HealthReport, HealthStatus};
pub use recovery::{RecoveryManager, RecoveryOutcome};
pub use retry::{AttemptReport, RetryHandler};
pub use tracker::{ErrorStatistics, ErrorTracker};
