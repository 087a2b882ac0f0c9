// SPDX-FileCopyrightText: 2026 Tidepool Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Publishing transport contract.

use async_trait::async_trait;

use crate::fault::Fault;
use crate::types::ContentItem;

/// Delivers a content item to the target platform.
#[async_trait]
pub trait ContentPublisher: Send + Sync + 'static {
    /// Human-readable transport name, used in logs and breaker names.
    fn name(&self) -> &str;

    /// Publish the item and return the platform-assigned identifier.
    async fn publish(&self, item: &ContentItem) -> Result<String, Fault>;
}
