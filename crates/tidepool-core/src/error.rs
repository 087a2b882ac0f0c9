// SPDX-FileCopyrightText: 2026 Tidepool Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Tidepool content pipeline.

use std::time::Duration;

use thiserror::Error;

use crate::fault::Fault;
use crate::types::ContentStatus;

/// The primary error type used across all Tidepool crates.
#[derive(Debug, Error)]
pub enum TidepoolError {
    /// Configuration errors (invalid TOML, missing required fields, type mismatches).
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage backend errors (database connection, query failure, serialization).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A content item or error record with the given id does not exist.
    #[error("not found: {id}")]
    NotFound { id: String },

    /// A status change that the content lifecycle does not allow.
    #[error("content {id} cannot move from {from} to {to}")]
    InvalidTransition {
        id: String,
        from: ContentStatus,
        to: ContentStatus,
    },

    /// A guarded call was refused because its circuit breaker is open.
    #[error("circuit breaker `{name}` is open, retry in {retry_in:?}")]
    CircuitOpen { name: String, retry_in: Duration },

    /// A fault raised by an external collaborator (publisher, optimizer, probe).
    #[error(transparent)]
    Fault(#[from] Fault),

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}
