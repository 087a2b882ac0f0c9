// SPDX-FileCopyrightText: 2026 Tidepool Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Intake behaviour through the public queue API.

use std::sync::Arc;

use tempfile::TempDir;
use tidepool_config::model::{QueueConfig, ValidationConfig};
use tidepool_core::{
    ContentBody, ContentSource, ContentStatus, Media, PostType, Severity, ValidationRule,
};
use tidepool_queue::{ContentQueueManager, ContentValidator, CuratedHashtags, NewContent};
use tidepool_storage::Database;

async fn queue() -> (ContentQueueManager, TempDir) {
    let dir = TempDir::new().unwrap();
    let db = Database::open(dir.path().join("intake.db").to_str().unwrap())
        .await
        .unwrap();
    let manager = ContentQueueManager::new(
        db,
        ContentValidator::new(ValidationConfig::default()),
        Arc::new(CuratedHashtags),
        QueueConfig::default(),
    );
    (manager, dir)
}

fn image() -> Media {
    Media::Image("https://cdn.example.test/scape.jpg".into())
}

/// `n` distinct four-character tags: `#hNN` renders to 4 characters.
fn hashtags(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("h{i:02}")).collect()
}

fn submit(body: ContentBody, post_type: PostType) -> NewContent {
    NewContent::new("Scape", body, post_type, ContentSource::Manual, "ana")
}

#[tokio::test]
async fn status_after_intake_tracks_error_results() {
    let (queue, _dir) = queue().await;
    let bodies = [
        ContentBody::new("Moss wall after trimming day", image(), hashtags(10)),
        ContentBody::new("tiny", image(), hashtags(2)),
        ContentBody::new("Follow for follow, like for like", image(), hashtags(10)),
    ];
    for body in bodies {
        let id = queue.add_content(submit(body, PostType::Community)).await.unwrap();
        let item = queue.get(&id).await.unwrap().unwrap();
        let has_error = item
            .validation_results
            .iter()
            .any(|r| r.severity == Severity::Error);
        let expected = if has_error {
            ContentStatus::PendingReview
        } else {
            ContentStatus::Approved
        };
        assert_eq!(item.status, expected, "{:?}", item.body.caption);
    }
}

#[tokio::test]
async fn text_only_post_is_approved() {
    let (queue, _dir) = queue().await;
    let caption = "Weekly water change notes: nitrates down, shrimp colony thriving";
    assert_eq!(caption.chars().count(), 64);
    let body = ContentBody::new(caption, Media::None, hashtags(10));
    let id = queue
        .add_content(submit(body, PostType::Community))
        .await
        .unwrap();
    let item = queue.get(&id).await.unwrap().unwrap();

    let media = item
        .validation_results
        .iter()
        .find(|r| r.rule == ValidationRule::Media)
        .unwrap();
    assert!(media.passed);
    assert_eq!(media.severity, Severity::Info);
    assert_eq!(item.status, ContentStatus::Approved);
}

#[tokio::test]
async fn length_limit_is_inclusive() {
    let (queue, _dir) = queue().await;
    // 10 tags render to 10 * 4 + 9 = 49 characters, plus a 2 character separator.
    let exact = ContentBody::new("a".repeat(2200 - 51), image(), hashtags(10));
    assert_eq!(exact.total_length(), 2200);
    let over = ContentBody::new("b".repeat(2201 - 51), image(), hashtags(10));
    assert_eq!(over.total_length(), 2201);

    let results = queue.validate(&exact).await.unwrap();
    let length = results
        .iter()
        .find(|r| r.rule == ValidationRule::Length)
        .unwrap();
    assert!(length.passed);
    assert_ne!(length.severity, Severity::Error);

    let results = queue.validate(&over).await.unwrap();
    let length = results
        .iter()
        .find(|r| r.rule == ValidationRule::Length)
        .unwrap();
    assert!(!length.passed);
    assert_eq!(length.severity, Severity::Error);
}

#[tokio::test]
async fn resubmitting_approved_content_is_a_duplicate() {
    let (queue, _dir) = queue().await;
    let body = ContentBody::new("Iwagumi with seiryu stone and monte carlo", image(), hashtags(12));

    let first = queue
        .add_content(submit(body.clone(), PostType::Showcase))
        .await
        .unwrap();
    assert_eq!(
        queue.get(&first).await.unwrap().unwrap().status,
        ContentStatus::Approved
    );

    let second = queue
        .add_content(submit(body, PostType::Showcase))
        .await
        .unwrap();
    let item = queue.get(&second).await.unwrap().unwrap();
    assert_eq!(item.status, ContentStatus::PendingReview);
    let duplicate = item
        .validation_results
        .iter()
        .find(|r| r.rule == ValidationRule::Duplicate)
        .unwrap();
    assert!(!duplicate.passed);
    assert_eq!(duplicate.severity, Severity::Error);
    assert!(duplicate.message.contains(&first));
}

#[tokio::test]
async fn showcase_scenario() {
    let (queue, _dir) = queue().await;
    let caption = "Morning light over the dragon stone ridge, carpet fully grown in";
    let caption = format!("{caption:<80}");
    assert_eq!(caption.chars().count(), 80);
    let body = ContentBody::new(caption, image(), hashtags(20));

    let id = queue
        .add_content(submit(body, PostType::Showcase))
        .await
        .unwrap();
    let item = queue.get(&id).await.unwrap().unwrap();

    assert!(
        item.validation_results
            .iter()
            .all(|r| r.severity != Severity::Error)
    );
    assert_eq!(item.status, ContentStatus::Approved);
    assert!(item.performance_prediction > 50.0);
}

#[tokio::test]
async fn too_many_hashtags_needs_review() {
    let (queue, _dir) = queue().await;
    let body = ContentBody::new("Nano cube rescape in progress", image(), hashtags(35));
    let id = queue
        .add_content(submit(body, PostType::Tutorial))
        .await
        .unwrap();
    let item = queue.get(&id).await.unwrap().unwrap();

    let count = item
        .validation_results
        .iter()
        .find(|r| r.rule == ValidationRule::HashtagCount)
        .unwrap();
    assert!(!count.passed);
    assert_eq!(count.severity, Severity::Error);
    assert_eq!(item.status, ContentStatus::PendingReview);
}
