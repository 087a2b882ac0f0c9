// SPDX-FileCopyrightText: 2026 Tidepool Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types used across the Tidepool workspace.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

/// Lowest accepted queue priority.
pub const MIN_PRIORITY: i32 = 1;

/// Highest accepted queue priority.
pub const MAX_PRIORITY: i32 = 10;

// --- Content classification ---

/// Editorial kind of a post.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PostType {
    Educational,
    Showcase,
    Tutorial,
    Community,
    BehindScenes,
    Partnership,
}

impl PostType {
    /// Multiplier applied by the performance predictor.
    pub fn engagement_multiplier(self) -> f64 {
        match self {
            PostType::Showcase => 1.2,
            PostType::Tutorial => 1.15,
            PostType::Educational => 1.1,
            PostType::Community => 1.0,
            PostType::Partnership => 0.95,
            PostType::BehindScenes => 0.9,
        }
    }

    /// Hashtag pool used when the item arrives without hashtags.
    pub fn hashtag_category(self) -> HashtagCategory {
        match self {
            PostType::Educational => HashtagCategory::Education,
            PostType::Showcase => HashtagCategory::Aquascaping,
            PostType::Tutorial => HashtagCategory::Tutorial,
            PostType::Community => HashtagCategory::Community,
            PostType::BehindScenes => HashtagCategory::General,
            PostType::Partnership => HashtagCategory::Products,
        }
    }
}

/// Where a content item came from.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ContentSource {
    Manual,
    AiGenerated,
    UserSubmission,
    Partnership,
    Template,
    Imported,
}

/// Category key understood by hashtag generators.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum HashtagCategory {
    Aquascaping,
    Education,
    Tutorial,
    Community,
    Products,
    General,
}

// --- Content lifecycle ---

/// Lifecycle status of a queued content item.
///
/// ```text
/// draft ──┐
///         ├─> approved ─> scheduled ─> published ─┐
/// pending_review ┘             │                  ├─> archived
///                              └──> failed ───────┤
/// any non-terminal ─> rejected ───────────────────┘
/// failed ─> approved (manual re-approval)
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ContentStatus {
    Draft,
    PendingReview,
    Approved,
    Scheduled,
    Published,
    Rejected,
    Failed,
    Archived,
}

impl ContentStatus {
    /// Terminal states are kept for audit and only move on to `archived`.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ContentStatus::Published | ContentStatus::Rejected | ContentStatus::Archived
        )
    }

    /// Statuses that take part in duplicate detection.
    pub fn is_active(self) -> bool {
        matches!(
            self,
            ContentStatus::Approved | ContentStatus::Scheduled | ContentStatus::Published
        )
    }

    /// Whether the lifecycle allows moving from `self` to `next`.
    pub fn can_transition_to(self, next: ContentStatus) -> bool {
        use ContentStatus::*;
        match (self, next) {
            (Draft | PendingReview | Failed, Approved) => true,
            (Approved, Scheduled) => true,
            (Scheduled, Published | Failed) => true,
            (Published | Rejected | Failed, Archived) => true,
            (from, Rejected) => !from.is_terminal(),
            _ => false,
        }
    }
}

// --- Content payload ---

/// Media attached to a post.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", content = "urls", rename_all = "snake_case")]
pub enum Media {
    /// No media attached.
    #[default]
    None,
    /// A single-image post.
    Image(String),
    /// A multi-image (carousel) post.
    Carousel(Vec<String>),
}

impl Media {
    /// Storage tag for the media kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Media::None => "none",
            Media::Image(_) => "image",
            Media::Carousel(_) => "carousel",
        }
    }

    /// All media references in order.
    pub fn urls(&self) -> Vec<&str> {
        match self {
            Media::None => Vec::new(),
            Media::Image(url) => vec![url.as_str()],
            Media::Carousel(urls) => urls.iter().map(String::as_str).collect(),
        }
    }

    /// Rebuild media from its storage tag and ordered URL rows.
    ///
    /// Unknown tags are treated as "no media".
    pub fn from_parts(kind: &str, mut urls: Vec<String>) -> Self {
        match kind {
            "image" => Media::Image(urls.pop().unwrap_or_default()),
            "carousel" => Media::Carousel(urls),
            _ => Media::None,
        }
    }

    pub fn is_carousel(&self) -> bool {
        matches!(self, Media::Carousel(_))
    }
}

/// The publishable payload of a content item.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ContentBody {
    /// Caption text, without hashtags.
    pub caption: String,
    /// Attached media.
    #[serde(default)]
    pub media: Media,
    /// Hashtags without the leading `#`, in display order.
    #[serde(default)]
    pub hashtags: Vec<String>,
}

impl ContentBody {
    pub fn new(caption: impl Into<String>, media: Media, hashtags: Vec<String>) -> Self {
        Self {
            caption: caption.into(),
            media,
            hashtags: normalize_hashtags(hashtags),
        }
    }

    /// Hashtags rendered as `#tag` joined by single spaces.
    pub fn rendered_hashtags(&self) -> String {
        self.hashtags
            .iter()
            .map(|tag| format!("#{tag}"))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Character count of the caption plus rendered hashtags.
    ///
    /// Two separator characters are counted between caption and hashtags
    /// when any hashtags are present.
    pub fn total_length(&self) -> usize {
        let caption = self.caption.chars().count();
        if self.hashtags.is_empty() {
            caption
        } else {
            caption + 2 + self.rendered_hashtags().chars().count()
        }
    }

    /// Caption and hashtags as they appear on the platform.
    pub fn full_text(&self) -> String {
        if self.hashtags.is_empty() {
            self.caption.clone()
        } else {
            format!("{}\n\n{}", self.caption, self.rendered_hashtags())
        }
    }
}

/// Trim hashtags, strip a leading `#`, and drop empties.
pub fn normalize_hashtags(hashtags: Vec<String>) -> Vec<String> {
    hashtags
        .into_iter()
        .map(|tag| tag.trim().trim_start_matches('#').to_string())
        .filter(|tag| !tag.is_empty())
        .collect()
}

// --- Validation ---

/// Identifies which validation rule produced a result.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ValidationRule {
    Length,
    HashtagCount,
    Media,
    Duplicate,
    BrandCompliance,
    PlatformPolicy,
}

/// How serious a validation finding is.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Display,
    EnumString,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// Verdict of one validation rule against one content item.
///
/// `passed` is `false` exactly when `severity` is [`Severity::Error`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub rule: ValidationRule,
    pub passed: bool,
    pub message: String,
    pub severity: Severity,
}

impl ValidationResult {
    pub fn info(rule: ValidationRule, message: impl Into<String>) -> Self {
        Self {
            rule,
            passed: true,
            message: message.into(),
            severity: Severity::Info,
        }
    }

    pub fn warning(rule: ValidationRule, message: impl Into<String>) -> Self {
        Self {
            rule,
            passed: true,
            message: message.into(),
            severity: Severity::Warning,
        }
    }

    pub fn error(rule: ValidationRule, message: impl Into<String>) -> Self {
        Self {
            rule,
            passed: false,
            message: message.into(),
            severity: Severity::Error,
        }
    }
}

// --- Queued content ---

/// A unit of content awaiting publication.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentItem {
    /// Opaque unique identifier (UUID v4), immutable.
    pub id: String,
    pub title: String,
    pub body: ContentBody,
    pub post_type: PostType,
    pub source: ContentSource,
    /// Higher is published sooner, bounded by [`MIN_PRIORITY`]..=[`MAX_PRIORITY`].
    pub priority: i32,
    pub target_time: Option<DateTime<Utc>>,
    pub tags: Vec<String>,
    pub notes: Option<String>,
    /// Heuristic engagement score in `[0, 100]`.
    pub performance_prediction: f64,
    pub status: ContentStatus,
    pub created_by: String,
    pub approved_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Incremented on every failed publish attempt.
    pub retry_count: u32,
    /// Identifier assigned by the platform once published.
    pub external_id: Option<String>,
    /// Message from the last failed publish attempt.
    pub last_error: Option<String>,
    pub validation_results: Vec<ValidationResult>,
}

impl ContentItem {
    /// Whether any validation result is an error-severity failure.
    pub fn has_validation_errors(&self) -> bool {
        self.validation_results.iter().any(|r| !r.passed)
    }
}

/// Immutable audit record of one status change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub id: i64,
    pub content_id: String,
    pub action: String,
    pub old_status: Option<ContentStatus>,
    pub new_status: ContentStatus,
    pub actor: String,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

// --- Error taxonomy ---

/// Category of a caught fault.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ErrorType {
    NetworkError,
    RateLimit,
    AuthenticationError,
    ValidationError,
    MediaError,
    QuotaExceeded,
    TemporaryError,
    PermanentError,
    UnknownError,
}

impl ErrorType {
    /// Fixed type-to-severity table.
    pub fn severity(self) -> ErrorSeverity {
        match self {
            ErrorType::AuthenticationError => ErrorSeverity::Critical,
            ErrorType::QuotaExceeded | ErrorType::PermanentError => ErrorSeverity::High,
            ErrorType::RateLimit
            | ErrorType::MediaError
            | ErrorType::ValidationError
            | ErrorType::UnknownError => ErrorSeverity::Medium,
            ErrorType::NetworkError | ErrorType::TemporaryError => ErrorSeverity::Low,
        }
    }
}

/// Operational severity of a recorded error.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Display,
    EnumString,
    EnumIter,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

/// One caught fault, persisted for statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub id: String,
    pub error_type: ErrorType,
    pub severity: ErrorSeverity,
    pub message: String,
    pub context: BTreeMap<String, String>,
    pub timestamp: DateTime<Utc>,
    pub retry_count: u32,
    pub resolved: bool,
    pub resolution_notes: Option<String>,
}

impl ErrorRecord {
    /// Create an unresolved record stamped with the current time.
    pub fn new(
        id: String,
        error_type: ErrorType,
        message: impl Into<String>,
        context: BTreeMap<String, String>,
    ) -> Self {
        Self {
            id,
            error_type,
            severity: error_type.severity(),
            message: message.into(),
            context,
            timestamp: Utc::now(),
            retry_count: 0,
            resolved: false,
            resolution_notes: None,
        }
    }
}

/// One backoff cycle of a retried operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryAttempt {
    pub error_id: String,
    /// 1-based attempt number that failed.
    pub attempt_number: u32,
    pub timestamp: DateTime<Utc>,
    pub success: bool,
    /// Delay applied before the next attempt.
    pub delay: Duration,
    pub message: Option<String>,
}
