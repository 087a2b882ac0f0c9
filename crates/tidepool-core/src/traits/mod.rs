// SPDX-FileCopyrightText: 2026 Tidepool Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Collaborator traits consumed by the content pipeline.
//!
//! The publishing transport, hashtag generator and connectivity probe are
//! external systems; the pipeline only depends on these request/response
//! contracts. All traits use `#[async_trait]` for dynamic dispatch.

pub mod hashtags;
pub mod probe;
pub mod publisher;

pub use hashtags::HashtagOptimizer;
pub use probe::ConnectivityProbe;
pub use publisher::ContentPublisher;
