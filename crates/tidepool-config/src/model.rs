// SPDX-FileCopyrightText: 2026 Tidepool Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Tidepool content pipeline.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tidepool_core::ErrorType;

/// Top-level Tidepool configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable overrides.
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TidepoolConfig {
    /// Process-wide settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Retry and backoff policy for outbound calls.
    #[serde(default)]
    pub retry: RetryConfig,

    /// Circuit breaker guarding the publishing transport.
    #[serde(default)]
    pub circuit_breaker: CircuitBreakerConfig,

    /// Content validation rule parameters.
    #[serde(default)]
    pub validation: ValidationConfig,

    /// Content queue intake settings.
    #[serde(default)]
    pub queue: QueueConfig,

    /// Publish loop and transport settings.
    #[serde(default)]
    pub publisher: PublisherConfig,

    /// Health check thresholds and probe target.
    #[serde(default)]
    pub health: HealthConfig,
}

/// Process-wide settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GeneralConfig {
    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("tidepool").join("tidepool.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("tidepool.db"))
        .to_string_lossy()
        .into_owned()
}

fn default_wal_mode() -> bool {
    true
}

/// Retry policy for retryable faults.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RetryConfig {
    /// Total number of tries, including the first one.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the first retry, in seconds.
    #[serde(default = "default_initial_delay_secs")]
    pub initial_delay_secs: f64,

    /// Upper bound for any single delay, in seconds.
    #[serde(default = "default_max_delay_secs")]
    pub max_delay_secs: f64,

    /// Growth factor applied per attempt.
    #[serde(default = "default_exponential_base")]
    pub exponential_base: f64,

    /// Scale each delay by a random factor in `[0.5, 1.0]`.
    #[serde(default = "default_jitter")]
    pub jitter: bool,

    /// Error types that are retried. Everything else propagates immediately.
    #[serde(default = "default_retryable")]
    pub retryable: Vec<ErrorType>,
}

impl RetryConfig {
    pub fn initial_delay(&self) -> Duration {
        Duration::try_from_secs_f64(self.initial_delay_secs).unwrap_or_default()
    }

    pub fn max_delay(&self) -> Duration {
        Duration::try_from_secs_f64(self.max_delay_secs).unwrap_or_default()
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_secs: default_initial_delay_secs(),
            max_delay_secs: default_max_delay_secs(),
            exponential_base: default_exponential_base(),
            jitter: default_jitter(),
            retryable: default_retryable(),
        }
    }
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay_secs() -> f64 {
    1.0
}

fn default_max_delay_secs() -> f64 {
    60.0
}

fn default_exponential_base() -> f64 {
    2.0
}

fn default_jitter() -> bool {
    true
}

fn default_retryable() -> Vec<ErrorType> {
    vec![
        ErrorType::NetworkError,
        ErrorType::RateLimit,
        ErrorType::TemporaryError,
    ]
}

/// Circuit breaker configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures that open the breaker.
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,

    /// Seconds after the last failure before a trial call is allowed.
    #[serde(default = "default_recovery_timeout_secs")]
    pub recovery_timeout_secs: u64,
}

impl CircuitBreakerConfig {
    pub fn recovery_timeout(&self) -> Duration {
        Duration::from_secs(self.recovery_timeout_secs)
    }
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            recovery_timeout_secs: default_recovery_timeout_secs(),
        }
    }
}

fn default_failure_threshold() -> u32 {
    5
}

fn default_recovery_timeout_secs() -> u64 {
    60
}

/// Content validation rule parameters.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ValidationConfig {
    /// Hard platform limit for caption plus hashtags.
    #[serde(default = "default_max_caption_length")]
    pub max_caption_length: usize,

    /// Length above which a "near limit" warning is raised.
    #[serde(default = "default_near_limit_length")]
    pub near_limit_length: usize,

    /// Length below which a "very short" warning is raised.
    #[serde(default = "default_min_caption_length")]
    pub min_caption_length: usize,

    /// Hard platform limit for hashtags per post.
    #[serde(default = "default_max_hashtags")]
    pub max_hashtags: usize,

    /// Fewer hashtags than this limits reach.
    #[serde(default = "default_min_hashtags")]
    pub min_hashtags: usize,

    /// From this count up to the maximum, hashtags start to saturate.
    #[serde(default = "default_saturation_hashtags")]
    pub saturation_hashtags: usize,

    /// Caption Jaccard similarity above which a warning is raised.
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f64,

    /// Terms that are never acceptable in a caption.
    #[serde(default = "default_banned_terms")]
    pub banned_terms: Vec<String>,

    /// Terms that violate platform policy.
    #[serde(default = "default_restricted_terms")]
    pub restricted_terms: Vec<String>,

    /// Keywords expected in longer captions.
    #[serde(default = "default_brand_keywords")]
    pub brand_keywords: Vec<String>,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            max_caption_length: default_max_caption_length(),
            near_limit_length: default_near_limit_length(),
            min_caption_length: default_min_caption_length(),
            max_hashtags: default_max_hashtags(),
            min_hashtags: default_min_hashtags(),
            saturation_hashtags: default_saturation_hashtags(),
            similarity_threshold: default_similarity_threshold(),
            banned_terms: default_banned_terms(),
            restricted_terms: default_restricted_terms(),
            brand_keywords: default_brand_keywords(),
        }
    }
}

fn default_max_caption_length() -> usize {
    2200
}

fn default_near_limit_length() -> usize {
    2000
}

fn default_min_caption_length() -> usize {
    50
}

fn default_max_hashtags() -> usize {
    30
}

fn default_min_hashtags() -> usize {
    5
}

fn default_saturation_hashtags() -> usize {
    25
}

fn default_similarity_threshold() -> f64 {
    0.8
}

fn default_banned_terms() -> Vec<String> {
    ["spam", "scam", "fake", "clickbait"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_restricted_terms() -> Vec<String> {
    [
        "buy followers",
        "free followers",
        "follow for follow",
        "like for like",
        "f4f",
        "l4l",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_brand_keywords() -> Vec<String> {
    [
        "aquascape",
        "aquascaping",
        "aquarium",
        "planted tank",
        "nature aquarium",
        "hardscape",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

/// Content queue intake configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct QueueConfig {
    /// Priority assigned when the caller does not supply one.
    #[serde(default = "default_priority")]
    pub default_priority: i32,

    /// Number of hashtags requested when an item arrives without any.
    #[serde(default = "default_hashtag_fill_count")]
    pub hashtag_fill_count: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            default_priority: default_priority(),
            hashtag_fill_count: default_hashtag_fill_count(),
        }
    }
}

fn default_priority() -> i32 {
    5
}

fn default_hashtag_fill_count() -> usize {
    20
}

/// Publish loop and transport configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PublisherConfig {
    /// Webhook endpoint receiving publish requests. `None` runs in dry-run mode.
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Bearer token sent with publish requests.
    #[serde(default)]
    pub access_token: Option<String>,

    /// Seconds between publish loop wake-ups.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Timeout applied to every outbound publish call.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Maximum items claimed per cycle.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

impl PublisherConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            access_token: None,
            poll_interval_secs: default_poll_interval_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            batch_size: default_batch_size(),
        }
    }
}

fn default_poll_interval_secs() -> u64 {
    60
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_batch_size() -> usize {
    5
}

/// Health check configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct HealthConfig {
    /// URL probed for outbound connectivity.
    #[serde(default = "default_probe_url")]
    pub probe_url: String,

    /// Timeout for the connectivity probe.
    #[serde(default = "default_probe_timeout_secs")]
    pub probe_timeout_secs: u64,

    /// Errors per hour at which the system is degraded.
    #[serde(default = "default_error_rate_degraded")]
    pub error_rate_degraded: f64,

    /// Errors per hour at which the system is critical.
    #[serde(default = "default_error_rate_critical")]
    pub error_rate_critical: f64,

    /// Pause applied on rate limiting when the platform sends no hint.
    #[serde(default = "default_rate_limit_backoff_secs")]
    pub rate_limit_backoff_secs: u64,
}

impl HealthConfig {
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    pub fn rate_limit_backoff(&self) -> Duration {
        Duration::from_secs(self.rate_limit_backoff_secs)
    }
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            probe_url: default_probe_url(),
            probe_timeout_secs: default_probe_timeout_secs(),
            error_rate_degraded: default_error_rate_degraded(),
            error_rate_critical: default_error_rate_critical(),
            rate_limit_backoff_secs: default_rate_limit_backoff_secs(),
        }
    }
}

fn default_probe_url() -> String {
    "https://graph.facebook.com".to_string()
}

fn default_probe_timeout_secs() -> u64 {
    5
}

fn default_error_rate_degraded() -> f64 {
    5.0
}

fn default_error_rate_critical() -> f64 {
    20.0
}

fn default_rate_limit_backoff_secs() -> u64 {
    3600
}
