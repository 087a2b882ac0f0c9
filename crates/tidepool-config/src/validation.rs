// SPDX-FileCopyrightText: 2026 Tidepool Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde attributes,
//! such as ordered limits, positive thresholds, and non-empty paths.

use crate::diagnostic::ConfigError;
use crate::model::TidepoolConfig;

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)` with
/// all collected validation errors (does not fail fast).
pub fn validate_config(config: &TidepoolConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();
    let mut fail = |message: String| errors.push(ConfigError::Validation { message });

    if config.storage.database_path.trim().is_empty() {
        fail("storage.database_path must not be empty".to_string());
    }

    let retry = &config.retry;
    if retry.max_attempts < 1 {
        fail("retry.max_attempts must be at least 1".to_string());
    }
    if !(retry.initial_delay_secs >= 0.0) {
        fail(format!(
            "retry.initial_delay_secs must be non-negative, got {}",
            retry.initial_delay_secs
        ));
    }
    if !(retry.max_delay_secs >= retry.initial_delay_secs) {
        fail(format!(
            "retry.max_delay_secs ({}) must be at least retry.initial_delay_secs ({})",
            retry.max_delay_secs, retry.initial_delay_secs
        ));
    }
    if !(retry.exponential_base >= 1.0) {
        fail(format!(
            "retry.exponential_base must be at least 1.0, got {}",
            retry.exponential_base
        ));
    }

    if config.circuit_breaker.failure_threshold < 1 {
        fail("circuit_breaker.failure_threshold must be at least 1".to_string());
    }

    let v = &config.validation;
    if !(v.min_caption_length <= v.near_limit_length && v.near_limit_length <= v.max_caption_length)
    {
        fail(format!(
            "validation lengths must satisfy min_caption_length ({}) <= near_limit_length ({}) <= max_caption_length ({})",
            v.min_caption_length, v.near_limit_length, v.max_caption_length
        ));
    }
    if !(v.min_hashtags <= v.saturation_hashtags && v.saturation_hashtags <= v.max_hashtags) {
        fail(format!(
            "validation hashtag limits must satisfy min_hashtags ({}) <= saturation_hashtags ({}) <= max_hashtags ({})",
            v.min_hashtags, v.saturation_hashtags, v.max_hashtags
        ));
    }
    if !(v.similarity_threshold > 0.0 && v.similarity_threshold <= 1.0) {
        fail(format!(
            "validation.similarity_threshold must be in (0, 1], got {}",
            v.similarity_threshold
        ));
    }
    for term in v.banned_terms.iter().chain(&v.restricted_terms) {
        if term.trim().is_empty() {
            fail("validation term lists must not contain empty entries".to_string());
            break;
        }
    }

    if config.publisher.batch_size < 1 {
        fail("publisher.batch_size must be at least 1".to_string());
    }
    if config.publisher.poll_interval_secs < 1 {
        fail("publisher.poll_interval_secs must be at least 1".to_string());
    }
    if let Some(endpoint) = &config.publisher.endpoint
        && !(endpoint.starts_with("http://") || endpoint.starts_with("https://"))
    {
        fail(format!(
            "publisher.endpoint `{endpoint}` must be an http(s) URL"
        ));
    }

    let h = &config.health;
    if !(h.error_rate_degraded >= 0.0 && h.error_rate_degraded <= h.error_rate_critical) {
        fail(format!(
            "health.error_rate_degraded ({}) must be non-negative and at most health.error_rate_critical ({})",
            h.error_rate_degraded, h.error_rate_critical
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn has_message(errors: &[ConfigError], needle: &str) -> bool {
        errors
            .iter()
            .any(|e| matches!(e, ConfigError::Validation { message } if message.contains(needle)))
    }

    #[test]
    fn default_config_validates() {
        let config = TidepoolConfig::default();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn empty_database_path_fails_validation() {
        let mut config = TidepoolConfig::default();
        config.storage.database_path = "  ".to_string();
        let errors = validate_config(&config).unwrap_err();
        assert!(has_message(&errors, "database_path"));
    }

    #[test]
    fn inverted_delays_fail_validation() {
        let mut config = TidepoolConfig::default();
        config.retry.initial_delay_secs = 10.0;
        config.retry.max_delay_secs = 1.0;
        let errors = validate_config(&config).unwrap_err();
        assert!(has_message(&errors, "max_delay_secs"));
    }

    #[test]
    fn nan_base_fails_validation() {
        let mut config = TidepoolConfig::default();
        config.retry.exponential_base = f64::NAN;
        let errors = validate_config(&config).unwrap_err();
        assert!(has_message(&errors, "exponential_base"));
    }

    #[test]
    fn collects_every_error() {
        let mut config = TidepoolConfig::default();
        config.retry.max_attempts = 0;
        config.circuit_breaker.failure_threshold = 0;
        config.publisher.batch_size = 0;
        config.validation.similarity_threshold = 1.5;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 4);
    }

    #[test]
    fn misordered_hashtag_limits_fail() {
        let mut config = TidepoolConfig::default();
        config.validation.saturation_hashtags = 40;
        let errors = validate_config(&config).unwrap_err();
        assert!(has_message(&errors, "hashtag limits"));
    }

    #[test]
    fn non_http_endpoint_fails() {
        let mut config = TidepoolConfig::default();
        config.publisher.endpoint = Some("ftp://example.com".to_string());
        let errors = validate_config(&config).unwrap_err();
        assert!(has_message(&errors, "publisher.endpoint"));
    }

    #[test]
    fn error_rate_thresholds_must_be_ordered() {
        let mut config = TidepoolConfig::default();
        config.health.error_rate_degraded = 50.0;
        let errors = validate_config(&config).unwrap_err();
        assert!(has_message(&errors, "error_rate_degraded"));
    }
}
