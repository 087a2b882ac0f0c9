// SPDX-FileCopyrightText: 2026 Tidepool Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Tidepool content pipeline.
//!
//! This crate provides the domain types shared by every other crate in the
//! workspace: queued content items and their lifecycle, validation results,
//! the error taxonomy used by the resilience layer, and the traits that
//! external collaborators (publishing transport, hashtag generation,
//! connectivity probes) implement.

pub mod error;
pub mod fault;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::TidepoolError;
pub use fault::Fault;
pub use types::{
    ContentBody, ContentItem, ContentSource, ContentStatus, ErrorRecord, ErrorSeverity,
    ErrorType, HashtagCategory, HistoryRecord, Media, PostType, RetryAttempt, Severity,
    ValidationResult, ValidationRule,
};

pub use traits::{ConnectivityProbe, ContentPublisher, HashtagOptimizer};
