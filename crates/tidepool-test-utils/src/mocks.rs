// SPDX-FileCopyrightText: 2026 Tidepool Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock collaborators for deterministic testing.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use tidepool_core::{
    ConnectivityProbe, ContentItem, ContentPublisher, Fault, HashtagCategory, HashtagOptimizer,
    TidepoolError,
};

/// A publisher that replays queued outcomes.
///
/// Outcomes are popped from a FIFO queue. When the queue is empty the
/// publish succeeds with `mock-<content id>`. Every call is recorded.
#[derive(Clone, Default)]
pub struct MockPublisher {
    outcomes: Arc<Mutex<VecDeque<Result<String, Fault>>>>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl MockPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a publisher pre-loaded with the given outcomes.
    pub fn with_outcomes(outcomes: Vec<Result<String, Fault>>) -> Self {
        Self {
            outcomes: Arc::new(Mutex::new(VecDeque::from(outcomes))),
            calls: Arc::default(),
        }
    }

    /// Queue a failure for the next call.
    pub async fn fail_next(&self, fault: Fault) {
        self.outcomes.lock().await.push_back(Err(fault));
    }

    /// Content ids passed to `publish`, in call order.
    pub async fn calls(&self) -> Vec<String> {
        self.calls.lock().await.clone()
    }
}

#[async_trait]
impl ContentPublisher for MockPublisher {
    fn name(&self) -> &str {
        "mock-publisher"
    }

    async fn publish(&self, item: &ContentItem) -> Result<String, Fault> {
        self.calls.lock().await.push(item.id.clone());
        self.outcomes
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| Ok(format!("mock-{}", item.id)))
    }
}

/// A hashtag optimizer returning the same tags for every category.
#[derive(Debug, Clone)]
pub struct MockHashtagOptimizer {
    tags: Vec<String>,
}

impl MockHashtagOptimizer {
    pub fn new(tags: Vec<String>) -> Self {
        Self { tags }
    }
}

impl Default for MockHashtagOptimizer {
    fn default() -> Self {
        Self::new((0..15).map(|i| format!("mocktag{i}")).collect())
    }
}

#[async_trait]
impl HashtagOptimizer for MockHashtagOptimizer {
    async fn suggest(
        &self,
        _category: HashtagCategory,
        _caption: &str,
        count: usize,
    ) -> Result<Vec<String>, TidepoolError> {
        Ok(self.tags.iter().take(count).cloned().collect())
    }
}

/// A connectivity probe with a fixed answer.
#[derive(Debug, Clone)]
pub struct StaticProbe {
    result: Result<Duration, Fault>,
}

impl StaticProbe {
    pub fn reachable(latency: Duration) -> Self {
        Self {
            result: Ok(latency),
        }
    }

    pub fn unreachable(message: impl Into<String>) -> Self {
        Self {
            result: Err(Fault::Connection(message.into())),
        }
    }
}

#[async_trait]
impl ConnectivityProbe for StaticProbe {
    fn target(&self) -> &str {
        "static-probe"
    }

    async fn probe(&self) -> Result<Duration, Fault> {
        self.result.clone()
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use tidepool_core::{ContentBody, ContentSource, ContentStatus, Media, PostType};

    use super::*;

    fn item(id: &str) -> ContentItem {
        let now = Utc::now();
        ContentItem {
            id: id.into(),
            title: "Test".into(),
            body: ContentBody::new("caption", Media::None, Vec::new()),
            post_type: PostType::Community,
            source: ContentSource::Manual,
            priority: 5,
            target_time: None,
            tags: Vec::new(),
            notes: None,
            performance_prediction: 50.0,
            status: ContentStatus::Scheduled,
            created_by: "tester".into(),
            approved_by: None,
            created_at: now,
            updated_at: now,
            retry_count: 0,
            external_id: None,
            last_error: None,
            validation_results: Vec::new(),
        }
    }

    #[tokio::test]
    async fn publisher_replays_outcomes_then_succeeds() {
        let publisher = MockPublisher::with_outcomes(vec![Ok("first".into())]);
        publisher.fail_next(Fault::http(503, "busy")).await;

        assert_eq!(publisher.publish(&item("a")).await.unwrap(), "first");
        assert!(publisher.publish(&item("b")).await.is_err());
        assert_eq!(publisher.publish(&item("c")).await.unwrap(), "mock-c");
        assert_eq!(publisher.calls().await, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn optimizer_honours_count() {
        let optimizer = MockHashtagOptimizer::default();
        let tags = optimizer
            .suggest(HashtagCategory::General, "caption", 3)
            .await
            .unwrap();
        assert_eq!(tags, vec!["mocktag0", "mocktag1", "mocktag2"]);
    }

    #[tokio::test]
    async fn static_probe_answers_fixed_result() {
        let up = StaticProbe::reachable(Duration::from_millis(12));
        assert_eq!(up.probe().await.unwrap(), Duration::from_millis(12));
        let down = StaticProbe::unreachable("offline");
        assert_eq!(
            down.probe().await.unwrap_err(),
            Fault::Connection("offline".into())
        );
    }
}
