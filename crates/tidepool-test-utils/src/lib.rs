// SPDX-FileCopyrightText: 2026 Tidepool Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Tidepool integration tests.
//!
//! Provides mock collaborators and a harness that assembles the whole
//! pipeline on a temporary SQLite database, so tests run without network
//! access.
//!
//! # Components
//!
//! - [`MockPublisher`] - scripted publishing transport that records calls
//! - [`MockHashtagOptimizer`] - fixed hashtag suggestions
//! - [`StaticProbe`] - connectivity probe with a fixed answer
//! - [`TestHarness`] - queue, resilience and publish loop wired together

pub mod harness;
pub mod mocks;

pub use harness::{TestHarness, TestHarnessBuilder};
pub use mocks::{MockHashtagOptimizer, MockPublisher, StaticProbe};
