// SPDX-FileCopyrightText: 2026 Tidepool Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Content queue for the Tidepool content pipeline.
//!
//! Items enter through [`ContentQueueManager::add_content`], are validated
//! by the [`ContentValidator`], scored by the performance heuristic and then
//! moved through their lifecycle by explicit status transitions. The
//! [`PublishLoop`] drains scheduled items through a [`ContentPublisher`]
//! guarded by the resilience layer.
//!
//! [`ContentPublisher`]: tidepool_core::ContentPublisher

pub mod hashtags;
pub mod manager;
pub mod prediction;
pub mod publisher;
pub mod transport;
pub mod validator;

pub use hashtags::CuratedHashtags;
pub use manager::{ContentQueueManager, NewContent};
pub use prediction::predict_performance;
pub use publisher::{CycleReport, PublishLoop};
pub use transport::{DryRunPublisher, HttpProbe, WebhookPublisher};
pub use validator::{ContentValidator, fingerprint, jaccard_similarity};
