// SPDX-FileCopyrightText: 2026 Tidepool Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Hashtag generation contract.

use async_trait::async_trait;

use crate::error::TidepoolError;
use crate::types::HashtagCategory;

/// Generates a hashtag set for content that arrived without one.
#[async_trait]
pub trait HashtagOptimizer: Send + Sync + 'static {
    /// Returns up to `count` hashtags (without `#`) for the given category.
    async fn suggest(
        &self,
        category: HashtagCategory,
        caption: &str,
        count: usize,
    ) -> Result<Vec<String>, TidepoolError>;
}
