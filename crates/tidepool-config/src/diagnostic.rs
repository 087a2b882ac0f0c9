// SPDX-FileCopyrightText: 2026 Tidepool Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration diagnostics.
//!
//! Figment extraction errors become miette reports that point at the
//! offending line of the TOML file they came from. Unknown keys carry a
//! "did you mean" hint ranked by Jaro-Winkler similarity.

#![allow(unused_assignments)] // miette's Diagnostic derive generates code triggering this lint

use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

/// Minimum Jaro-Winkler similarity score to suggest a correction.
const SUGGESTION_THRESHOLD: f64 = 0.75;

/// A configuration error with rich diagnostic information.
#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("unknown key `{key}` in {}", section_label(section))]
    #[diagnostic(
        code(tidepool::config::unknown_key),
        help("{}", unknown_key_help(suggestion.as_deref(), valid_keys))
    )]
    UnknownKey {
        key: String,
        /// Dotted table path, empty for the top level.
        section: String,
        suggestion: Option<String>,
        valid_keys: String,
        #[label("not a tidepool setting")]
        span: Option<SourceSpan>,
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    #[error("`{key}` has the wrong type: found {found}")]
    #[diagnostic(code(tidepool::config::invalid_type), help("expected {expected}"))]
    InvalidType {
        key: String,
        found: String,
        expected: String,
        #[label("expected {expected}")]
        span: Option<SourceSpan>,
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    /// A value outside an enumerated set, such as an unknown error type name.
    #[error("`{key}` has an unsupported value `{value}`")]
    #[diagnostic(code(tidepool::config::invalid_value), help("accepted values: {accepted}"))]
    InvalidValue {
        key: String,
        value: String,
        accepted: String,
        #[label("unsupported value")]
        span: Option<SourceSpan>,
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    #[error("missing required key `{key}`")]
    #[diagnostic(
        code(tidepool::config::missing_key),
        help("add `{key} = <value>` to your tidepool.toml")
    )]
    MissingKey { key: String },

    /// A value that parsed but makes no sense, reported after extraction.
    #[error("validation error: {message}")]
    #[diagnostic(code(tidepool::config::validation))]
    Validation { message: String },

    #[error("configuration error: {0}")]
    #[diagnostic(code(tidepool::config::other))]
    Other(String),
}

fn section_label(section: &str) -> String {
    if section.is_empty() {
        "the top level".to_string()
    } else {
        format!("[{section}]")
    }
}

fn unknown_key_help(suggestion: Option<&str>, valid_keys: &str) -> String {
    match suggestion {
        Some(s) => format!("did you mean `{s}`? Valid keys: {valid_keys}"),
        None => format!("valid keys: {valid_keys}"),
    }
}

/// A TOML document that fed the figment, kept for span lookup.
#[derive(Debug, Clone)]
pub struct ConfigSource {
    /// File path, or `<inline>` for string sources.
    pub name: String,
    pub content: String,
}

impl ConfigSource {
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }

    /// Byte range of `key` (or of its value, with `value = true`) inside the
    /// table named by `table`.
    ///
    /// The search is confined to that table: it starts after the matching
    /// `[header]` and stops at the next header.
    pub fn locate(&self, table: &[String], key: &str, value: bool) -> Option<SourceSpan> {
        let wanted = table.join(".");
        let mut current = String::new();
        let mut offset = 0;

        for line in self.content.split_inclusive('\n') {
            let start = offset;
            offset += line.len();
            let text = line.trim_end_matches(['\r', '\n']);
            let body = text.trim_start();
            let indent = text.len() - body.len();

            if let Some(header) = table_header(body) {
                current = header;
                continue;
            }
            if current != wanted {
                continue;
            }
            let Some((name, rest)) = body.split_once('=') else {
                continue;
            };
            if name.trim().trim_matches('"') != key {
                continue;
            }
            if !value {
                return Some(SourceSpan::new((start + indent).into(), name.trim_end().len()));
            }
            let trimmed = rest.trim_start();
            let raw = trimmed.split(" #").next().unwrap_or(trimmed).trim_end();
            let value_start = start + text.len() - trimmed.len();
            return Some(SourceSpan::new(value_start.into(), raw.len()));
        }
        None
    }

    fn named(&self) -> NamedSource<String> {
        NamedSource::new(&self.name, self.content.clone())
    }
}

/// `[a.b]` → `a.b`; array-of-tables headers are treated like plain tables.
fn table_header(line: &str) -> Option<String> {
    let inner = line
        .strip_prefix("[[")
        .and_then(|l| l.split_once("]]"))
        .or_else(|| line.strip_prefix('[').and_then(|l| l.split_once(']')))?
        .0;
    Some(
        inner
            .split('.')
            .map(|part| part.trim().trim_matches('"'))
            .collect::<Vec<_>>()
            .join("."),
    )
}

/// Convert a `figment::Error` into one `ConfigError` per underlying failure.
pub fn figment_to_config_errors(
    err: figment::Error,
    sources: &[ConfigSource],
) -> Vec<ConfigError> {
    use figment::error::Kind;

    err.into_iter()
        .map(|error| {
            let path: Vec<String> = error.path.clone();
            let dotted = path.join(".");
            let source = source_for(&error, sources);
            // For value errors the last path segment is the key itself.
            let value_span = |key_path: &[String]| {
                let (key, table) = key_path.split_last()?;
                let source = source?;
                Some((source.locate(table, key, true)?, source.named()))
            };

            match &error.kind {
                Kind::UnknownField(field, expected) => {
                    // The rejected key itself ends the path.
                    let table = match path.split_last() {
                        Some((last, rest)) if last == field => rest,
                        _ => &path[..],
                    };
                    let located =
                        source.and_then(|s| Some((s.locate(table, field, false)?, s.named())));
                    let (span, src) = located.unzip();
                    ConfigError::UnknownKey {
                        key: field.clone(),
                        section: table.join("."),
                        suggestion: suggest_key(field, expected),
                        valid_keys: expected.join(", "),
                        span,
                        src,
                    }
                }
                Kind::MissingField(field) => ConfigError::MissingKey {
                    key: if dotted.is_empty() {
                        field.to_string()
                    } else {
                        format!("{dotted}.{field}")
                    },
                },
                Kind::InvalidType(actual, expected) => {
                    let (span, src) = value_span(&path).unzip();
                    ConfigError::InvalidType {
                        key: dotted,
                        found: actual.to_string(),
                        expected: expected.to_string(),
                        span,
                        src,
                    }
                }
                Kind::UnknownVariant(variant, accepted) => {
                    let (span, src) = value_span(&path).unzip();
                    ConfigError::InvalidValue {
                        key: dotted,
                        value: variant.clone(),
                        accepted: accepted.join(", "),
                        span,
                        src,
                    }
                }
                _ => ConfigError::Other(error.to_string()),
            }
        })
        .collect()
}

/// The file an error came from; inline strings carry no file metadata, so a
/// lone source is assumed.
fn source_for<'a>(
    error: &figment::error::Error,
    sources: &'a [ConfigSource],
) -> Option<&'a ConfigSource> {
    let file = error
        .metadata
        .as_ref()
        .and_then(|m| m.source.as_ref())
        .and_then(|s| match s {
            figment::Source::File(path) => Some(path.display().to_string()),
            _ => None,
        });
    match (file, sources) {
        (Some(file), _) => sources.iter().find(|s| s.name == file),
        (None, [only]) => Some(only),
        (None, _) => None,
    }
}

/// The closest valid key to `unknown`, if any clears the similarity threshold.
pub fn suggest_key(unknown: &str, valid_keys: &[&str]) -> Option<String> {
    valid_keys
        .iter()
        .map(|key| (strsim::jaro_winkler(unknown, key), *key))
        .filter(|(score, _)| *score > SUGGESTION_THRESHOLD)
        .max_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, key)| key.to_string())
}

/// Render every error to stderr with miette's graphical handler.
pub fn render_errors(errors: &[ConfigError]) {
    let handler = miette::GraphicalReportHandler::new();
    let mut out = String::new();
    for error in errors {
        let before = out.len();
        if handler.render_report(&mut out, error as &dyn Diagnostic).is_err() {
            out.truncate(before);
            out.push_str(&format!("Error: {error}\n"));
        }
    }
    if errors.len() > 1 {
        out.push_str(&format!("{} configuration errors\n", errors.len()));
    }
    eprint!("{out}");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(name: &str) -> Vec<String> {
        name.split('.').map(String::from).collect()
    }

    fn slice<'a>(source: &'a ConfigSource, span: SourceSpan) -> &'a str {
        &source.content[span.offset()..span.offset() + span.len()]
    }

    #[test]
    fn suggest_close_retry_key() {
        let valid = &["max_attempts", "initial_delay_secs", "max_delay_secs", "jitter"];
        assert_eq!(
            suggest_key("max_attemps", valid),
            Some("max_attempts".to_string())
        );
    }

    #[test]
    fn suggest_failure_threshold_typo() {
        let valid = &["failure_threshold", "recovery_timeout_secs"];
        assert_eq!(
            suggest_key("failure_treshold", valid),
            Some("failure_threshold".to_string())
        );
    }

    #[test]
    fn no_suggestion_for_distant_typo() {
        let valid = &["database_path", "wal_mode"];
        assert_eq!(suggest_key("zzzzzz", valid), None);
    }

    #[test]
    fn locates_key_in_its_table() {
        let source = ConfigSource::new("t.toml", "[retry]\nmax_attemps = 4\n");
        let span = source.locate(&table("retry"), "max_attemps", false).unwrap();
        assert_eq!(slice(&source, span), "max_attemps");
    }

    #[test]
    fn search_stops_at_the_next_table() {
        let source = ConfigSource::new(
            "t.toml",
            "[retry]\njitter = true\n\n[storage]\nwal_mode = true\n",
        );
        assert_eq!(source.locate(&table("retry"), "wal_mode", false), None);
        assert!(source.locate(&table("storage"), "wal_mode", false).is_some());
    }

    #[test]
    fn missing_table_locates_nothing() {
        let source = ConfigSource::new("t.toml", "[storage]\nwal_mode = true\n");
        assert_eq!(source.locate(&table("retry"), "wal_mode", false), None);
    }

    #[test]
    fn locates_values_across_crlf_lines() {
        let source = ConfigSource::new(
            "t.toml",
            "[general]\r\nlog_level = \"info\"\r\n[circuit_breaker]\r\nfailure_threshold=\"five\" # oops\r\n",
        );
        let span = source
            .locate(&table("circuit_breaker"), "failure_threshold", true)
            .unwrap();
        assert_eq!(slice(&source, span), "\"five\"");
        let key = source
            .locate(&table("circuit_breaker"), "failure_threshold", false)
            .unwrap();
        assert_eq!(slice(&source, key), "failure_threshold");
    }

    #[test]
    fn table_headers_normalise_spacing() {
        assert_eq!(table_header("[ retry ]").as_deref(), Some("retry"));
        assert_eq!(table_header("[a . \"b\"]").as_deref(), Some("a.b"));
        assert_eq!(table_header("[[hooks]]").as_deref(), Some("hooks"));
        assert_eq!(table_header("key = [1]"), None);
    }

    #[test]
    fn unknown_key_message_names_the_table() {
        let error = ConfigError::UnknownKey {
            key: "jiter".into(),
            section: "retry".into(),
            suggestion: Some("jitter".into()),
            valid_keys: "jitter".into(),
            span: None,
            src: None,
        };
        assert_eq!(error.to_string(), "unknown key `jiter` in [retry]");
    }
}
