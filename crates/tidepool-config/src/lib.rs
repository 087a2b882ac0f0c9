// SPDX-FileCopyrightText: 2026 Tidepool Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration system for the Tidepool content pipeline.
//!
//! Provides TOML configuration parsing with strict validation (`deny_unknown_fields`),
//! XDG file hierarchy lookup, environment variable overrides, and diagnostic
//! error rendering with typo suggestions.
//!
//! # Usage
//!
//! ```no_run
//! use tidepool_config::load_and_validate;
//!
//! let config = load_and_validate().expect("config errors");
//! println!("database: {}", config.storage.database_path);
//! ```

pub mod diagnostic;
pub mod loader;
pub mod model;
pub mod validation;

pub use diagnostic::{ConfigError, ConfigSource, render_errors};
pub use loader::{load_config, load_config_from_path, load_config_from_str, render_config};
pub use model::TidepoolConfig;

/// Load configuration from the XDG hierarchy and validate it.
///
/// Returns either a valid `TidepoolConfig` or a list of diagnostic errors.
pub fn load_and_validate() -> Result<TidepoolConfig, Vec<ConfigError>> {
    match loader::load_config() {
        Ok(config) => {
            validation::validate_config(&config)?;
            Ok(config)
        }
        Err(err) => {
            let toml_sources = collect_toml_sources();
            Err(diagnostic::figment_to_config_errors(err, &toml_sources))
        }
    }
}

/// Load configuration from an explicit file (plus env overrides) and validate it.
pub fn load_and_validate_path(
    path: &std::path::Path,
) -> Result<TidepoolConfig, Vec<ConfigError>> {
    match loader::load_config_from_path(path) {
        Ok(config) => {
            validation::validate_config(&config)?;
            Ok(config)
        }
        Err(err) => {
            let sources = std::fs::read_to_string(path)
                .map(|content| vec![ConfigSource::new(path.display().to_string(), content)])
                .unwrap_or_default();
            Err(diagnostic::figment_to_config_errors(err, &sources))
        }
    }
}

/// Load configuration from a specific TOML string and validate it.
///
/// Useful for testing and explicit configuration.
pub fn load_and_validate_str(toml_content: &str) -> Result<TidepoolConfig, Vec<ConfigError>> {
    match loader::load_config_from_str(toml_content) {
        Ok(config) => {
            validation::validate_config(&config)?;
            Ok(config)
        }
        Err(err) => {
            let sources = vec![ConfigSource::new("<inline>", toml_content)];
            Err(diagnostic::figment_to_config_errors(err, &sources))
        }
    }
}

/// Collect TOML source file contents for error span resolution.
fn collect_toml_sources() -> Vec<ConfigSource> {
    let mut sources = Vec::new();

    if let Ok(content) = std::fs::read_to_string("tidepool.toml") {
        let path = std::env::current_dir()
            .map(|d| d.join("tidepool.toml").display().to_string())
            .unwrap_or_else(|_| "tidepool.toml".to_string());
        sources.push(ConfigSource::new(path, content));
    }

    if let Some(config_dir) = dirs::config_dir() {
        let path = config_dir.join("tidepool/tidepool.toml");
        if let Ok(content) = std::fs::read_to_string(&path) {
            sources.push(ConfigSource::new(path.display().to_string(), content));
        }
    }

    let system_path = std::path::Path::new("/etc/tidepool/tidepool.toml");
    if let Ok(content) = std::fs::read_to_string(system_path) {
        sources.push(ConfigSource::new(system_path.display().to_string(), content));
    }

    sources
}
