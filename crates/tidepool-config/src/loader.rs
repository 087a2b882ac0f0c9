// SPDX-FileCopyrightText: 2026 Tidepool Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./tidepool.toml` > `~/.config/tidepool/tidepool.toml`
//! > `/etc/tidepool/tidepool.toml` with environment variable overrides via the
//! `TIDEPOOL_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::TidepoolConfig;

/// Section names, longest first so `circuit_breaker_` wins over shorter prefixes.
const SECTIONS: &[&str] = &[
    "circuit_breaker",
    "validation",
    "publisher",
    "general",
    "storage",
    "health",
    "retry",
    "queue",
];

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/tidepool/tidepool.toml` (system-wide)
/// 3. `~/.config/tidepool/tidepool.toml` (user XDG config)
/// 4. `./tidepool.toml` (local directory)
/// 5. `TIDEPOOL_*` environment variables
pub fn load_config() -> Result<TidepoolConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no XDG lookup, no env).
pub fn load_config_from_str(toml_content: &str) -> Result<TidepoolConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(TidepoolConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<TidepoolConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(TidepoolConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Render a configuration as TOML, in the format the loader reads.
pub fn render_config(config: &TidepoolConfig) -> Result<String, toml::ser::Error> {
    toml::to_string_pretty(config)
}

/// Build the Figment used internally for config loading.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(TidepoolConfig::default()))
        .merge(Toml::file("/etc/tidepool/tidepool.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("tidepool/tidepool.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("tidepool.toml"))
        .merge(env_provider())
}

/// Create the environment variable provider with explicit section mapping.
///
/// Uses `Env::map()` rather than `Env::split("_")` because both section and
/// key names contain underscores: `TIDEPOOL_CIRCUIT_BREAKER_FAILURE_THRESHOLD`
/// must map to `circuit_breaker.failure_threshold`.
fn env_provider() -> Env {
    Env::prefixed("TIDEPOOL_").map(|key| map_env_key(key.as_str()).into())
}

/// Map a lowercased, prefix-stripped env key to a dotted config path.
pub(crate) fn map_env_key(key: &str) -> String {
    let key = key.to_ascii_lowercase();
    for section in SECTIONS {
        if let Some(rest) = key.strip_prefix(section)
            && let Some(field) = rest.strip_prefix('_')
        {
            return format!("{section}.{field}");
        }
    }
    key
}
