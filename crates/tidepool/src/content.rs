// SPDX-FileCopyrightText: 2026 Tidepool Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Queue commands: `add`, `approve`, `reject`, `schedule`, `archive`,
//! `list`, `show`, `stats` and `validate`.

use std::io::IsTerminal;

use chrono::{DateTime, Utc};
use clap::Args;
use serde::Serialize;
use tidepool_core::{
    ContentBody, ContentItem, ContentSource, ContentStatus, HistoryRecord, Media, PostType,
    Severity, TidepoolError, ValidationResult,
};
use tidepool_queue::{NewContent, predict_performance};
use tidepool_storage::models::QueueStatistics;

use crate::app::App;

/// Caption, media and hashtags shared by `add` and `validate`.
#[derive(Args, Debug, Clone)]
pub struct BodyArgs {
    /// Caption text, without hashtags.
    #[arg(long)]
    pub caption: String,

    /// Image URL. Repeat for a carousel.
    #[arg(long = "image", value_name = "URL")]
    pub images: Vec<String>,

    /// Hashtag, with or without `#`. Repeat for more. Omit to have them generated.
    #[arg(long = "hashtag", value_name = "TAG")]
    pub hashtags: Vec<String>,

    #[arg(long, default_value = "showcase")]
    pub post_type: PostType,
}

impl BodyArgs {
    pub fn body(&self) -> ContentBody {
        ContentBody::new(
            self.caption.clone(),
            media_from(&self.images),
            self.hashtags.clone(),
        )
    }
}

#[derive(Args, Debug, Clone)]
pub struct AddArgs {
    #[arg(long)]
    pub title: String,

    #[command(flatten)]
    pub body: BodyArgs,

    #[arg(long, default_value = "manual")]
    pub source: ContentSource,

    /// 1 (lowest) to 10 (highest). Defaults to the configured priority.
    #[arg(long)]
    pub priority: Option<i32>,

    /// Preferred publish time (RFC 3339).
    #[arg(long)]
    pub target_time: Option<DateTime<Utc>>,

    /// Free-form label. Repeat for more.
    #[arg(long = "tag")]
    pub tags: Vec<String>,

    #[arg(long)]
    pub notes: Option<String>,

    /// Who is submitting the item.
    #[arg(long, default_value = "cli")]
    pub by: String,
}

/// No image is no media, one is a single image, more is a carousel.
pub fn media_from(images: &[String]) -> Media {
    match images {
        [] => Media::None,
        [single] => Media::Image(single.clone()),
        many => Media::Carousel(many.to_vec()),
    }
}

/// Clap value parser refusing empty or whitespace-only values.
pub fn non_blank(value: &str) -> Result<String, String> {
    if value.trim().is_empty() {
        Err("must not be blank".to_string())
    } else {
        Ok(value.to_string())
    }
}

fn use_color() -> bool {
    std::io::stdout().is_terminal()
}

pub async fn run_add(app: &App, args: AddArgs) -> Result<(), TidepoolError> {
    let mut new = NewContent::new(
        args.title,
        args.body.body(),
        args.body.post_type,
        args.source,
        args.by,
    )
    .with_tags(args.tags);
    if let Some(priority) = args.priority {
        new = new.with_priority(priority);
    }
    if let Some(at) = args.target_time {
        new = new.with_target_time(at);
    }
    if let Some(notes) = args.notes {
        new = new.with_notes(notes);
    }

    let id = app.queue.add_content(new).await?;
    let item = require(app, &id).await?;
    println!("queued {} as {}", item.id, item.status);
    println!("  predicted performance: {:.1}", item.performance_prediction);
    print_results(&item.validation_results, use_color());
    Ok(())
}

pub async fn run_approve(
    app: &App,
    id: &str,
    by: &str,
    notes: Option<String>,
) -> Result<(), TidepoolError> {
    if !app.queue.approve(id, by, notes).await? {
        return Err(refused(app, id, ContentStatus::Approved).await);
    }
    println!("approved {id}");
    Ok(())
}

pub async fn run_reject(app: &App, id: &str, by: &str, reason: &str) -> Result<(), TidepoolError> {
    if !app.queue.reject(id, by, reason).await? {
        return Err(refused(app, id, ContentStatus::Rejected).await);
    }
    println!("rejected {id}");
    Ok(())
}

pub async fn run_schedule(
    app: &App,
    id: &str,
    at: Option<DateTime<Utc>>,
) -> Result<(), TidepoolError> {
    let when = at.unwrap_or_else(Utc::now);
    app.queue.mark_scheduled(id, when).await?;
    println!("scheduled {id} for {}", when.to_rfc3339());
    Ok(())
}

pub async fn run_archive(
    app: &App,
    id: &str,
    by: &str,
    notes: Option<String>,
) -> Result<(), TidepoolError> {
    app.queue.archive(id, by, notes).await?;
    println!("archived {id}");
    Ok(())
}

pub async fn run_list(
    app: &App,
    status: Option<ContentStatus>,
    json: bool,
) -> Result<(), TidepoolError> {
    let items = app.queue.list(status).await?;
    if json {
        return print_json(&items);
    }
    if items.is_empty() {
        println!("no content");
        return Ok(());
    }
    println!(
        "{:<36}  {:<14}  {:>3}  {:<13}  {:<20}  TITLE",
        "ID", "STATUS", "PRI", "TYPE", "TARGET"
    );
    for item in &items {
        println!("{}", list_row(item));
    }
    Ok(())
}

fn list_row(item: &ContentItem) -> String {
    let target = item
        .target_time
        .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "-".to_string());
    format!(
        "{:<36}  {:<14}  {:>3}  {:<13}  {:<20}  {}",
        item.id,
        item.status.to_string(),
        item.priority,
        item.post_type.to_string(),
        target,
        item.title
    )
}

#[derive(Serialize)]
struct ShowOutput<'a> {
    item: &'a ContentItem,
    history: &'a [HistoryRecord],
}

pub async fn run_show(app: &App, id: &str, json: bool) -> Result<(), TidepoolError> {
    let item = require(app, id).await?;
    let history = app.queue.history(id).await?;
    if json {
        return print_json(&ShowOutput {
            item: &item,
            history: &history,
        });
    }

    println!("{}  {}", item.id, item.title);
    println!("  status:      {}", item.status);
    println!("  type:        {} ({})", item.post_type, item.source);
    println!("  priority:    {}", item.priority);
    println!("  prediction:  {:.1}", item.performance_prediction);
    println!("  created:     {} by {}", item.created_at.to_rfc3339(), item.created_by);
    if let Some(approver) = &item.approved_by {
        println!("  approved by: {approver}");
    }
    if let Some(target) = item.target_time {
        println!("  target:      {}", target.to_rfc3339());
    }
    if let Some(external) = &item.external_id {
        println!("  external id: {external}");
    }
    if item.retry_count > 0 {
        println!("  retries:     {}", item.retry_count);
    }
    if let Some(error) = &item.last_error {
        println!("  last error:  {error}");
    }
    if !item.tags.is_empty() {
        println!("  tags:        {}", item.tags.join(", "));
    }
    println!();
    println!("{}", item.body.full_text());
    println!();
    print_results(&item.validation_results, use_color());
    println!();
    println!("  history:");
    for record in &history {
        println!("    {}", history_line(record));
    }
    Ok(())
}

fn history_line(record: &HistoryRecord) -> String {
    let from = record
        .old_status
        .map(|s| s.to_string())
        .unwrap_or_else(|| "-".to_string());
    let mut line = format!(
        "{}  {:<14} {} -> {}  by {}",
        record.created_at.format("%Y-%m-%d %H:%M:%S"),
        record.action,
        from,
        record.new_status,
        record.actor
    );
    if let Some(notes) = &record.notes {
        line.push_str(&format!("  ({notes})"));
    }
    line
}

pub async fn run_stats(app: &App, json: bool) -> Result<(), TidepoolError> {
    let stats = app.queue.get_queue_statistics().await?;
    if json {
        return print_json(&stats);
    }
    print!("{}", render_stats(&stats));
    Ok(())
}

fn render_stats(stats: &QueueStatistics) -> String {
    let mut out = String::new();
    out.push_str(&format!("total items:        {}\n", stats.total));
    out.push_str(&format!("pending review:     {}\n", stats.pending_review));
    out.push_str(&format!("ready to schedule:  {}\n", stats.ready_to_schedule));
    out.push_str(&format!(
        "average prediction: {:.1}\n",
        stats.average_prediction
    ));
    for (title, counts) in [
        ("by status", &stats.by_status),
        ("by post type", &stats.by_post_type),
        ("by source", &stats.by_source),
    ] {
        if counts.is_empty() {
            continue;
        }
        out.push_str(&format!("{title}:\n"));
        for (key, count) in counts {
            out.push_str(&format!("  {key:<16} {count}\n"));
        }
    }
    out
}

/// Dry-run the validation rules against the current queue.
pub async fn run_validate(app: &App, args: BodyArgs, json: bool) -> Result<(), TidepoolError> {
    let body = args.body();
    let results = app.queue.validate(&body).await?;
    let prediction = predict_performance(&body, args.post_type);
    let status = if results.iter().any(|r| !r.passed) {
        ContentStatus::PendingReview
    } else {
        ContentStatus::Approved
    };

    if json {
        #[derive(Serialize)]
        struct Verdict<'a> {
            status: ContentStatus,
            prediction: f64,
            total_length: usize,
            results: &'a [ValidationResult],
        }
        return print_json(&Verdict {
            status,
            prediction,
            total_length: body.total_length(),
            results: &results,
        });
    }

    println!("would be queued as {status}");
    println!("  length:                {}", body.total_length());
    println!("  predicted performance: {prediction:.1}");
    print_results(&results, use_color());
    Ok(())
}

fn print_results(results: &[ValidationResult], use_color: bool) {
    for result in results {
        println!("    {}", result_line(result, use_color));
    }
}

fn result_line(result: &ValidationResult, use_color: bool) -> String {
    let rule = result.rule.to_string();
    if use_color {
        use colored::Colorize;
        let marker = match result.severity {
            Severity::Info => "✓".green(),
            Severity::Warning => "!".yellow(),
            Severity::Error => "✗".red(),
        };
        format!("{marker} {rule:<16} {}", result.message)
    } else {
        let marker = match result.severity {
            Severity::Info => "[OK]  ",
            Severity::Warning => "[WARN]",
            Severity::Error => "[FAIL]",
        };
        format!("{marker} {rule:<16} {}", result.message)
    }
}

async fn require(app: &App, id: &str) -> Result<ContentItem, TidepoolError> {
    app.queue
        .get(id)
        .await?
        .ok_or_else(|| TidepoolError::NotFound { id: id.to_string() })
}

/// The error reported when the queue declines a transition.
async fn refused(app: &App, id: &str, to: ContentStatus) -> TidepoolError {
    match require(app, id).await {
        Ok(item) => TidepoolError::InvalidTransition {
            id: id.to_string(),
            from: item.status,
            to,
        },
        Err(e) => e,
    }
}

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), TidepoolError> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| TidepoolError::Internal(format!("failed to serialize output: {e}")))?;
    println!("{text}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use tidepool_core::ValidationRule;

    use super::*;

    #[test]
    fn media_follows_image_count() {
        assert_eq!(media_from(&[]), Media::None);
        assert_eq!(
            media_from(&["https://a.test/1.jpg".into()]),
            Media::Image("https://a.test/1.jpg".into())
        );
        assert!(media_from(&["https://a.test/1.jpg".into(), "https://a.test/2.jpg".into()])
            .is_carousel());
    }

    #[test]
    fn blank_values_are_refused() {
        assert!(non_blank("   ").is_err());
        assert_eq!(non_blank("off topic").unwrap(), "off topic");
    }

    #[test]
    fn plain_result_lines_use_bracket_markers() {
        let line = result_line(
            &ValidationResult::error(ValidationRule::Media, "media is required"),
            false,
        );
        assert!(line.starts_with("[FAIL] media"));
        assert!(line.ends_with("media is required"));
        let line = result_line(
            &ValidationResult::warning(ValidationRule::Length, "close to the limit"),
            false,
        );
        assert!(line.starts_with("[WARN]"));
    }

    #[test]
    fn stats_skip_empty_breakdowns() {
        let mut stats = QueueStatistics {
            total: 3,
            pending_review: 1,
            ready_to_schedule: 2,
            average_prediction: 61.24,
            ..QueueStatistics::default()
        };
        stats.by_status.insert("approved".into(), 2);
        stats.by_status.insert("pending_review".into(), 1);

        let out = render_stats(&stats);
        assert!(out.contains("total items:        3"));
        assert!(out.contains("average prediction: 61.2"));
        assert!(out.contains("by status:\n  approved         2\n"));
        assert!(!out.contains("by source"));
    }

    #[test]
    fn history_line_shows_transition_and_notes() {
        let record = HistoryRecord {
            id: 1,
            content_id: "c-1".into(),
            action: "status_change".into(),
            old_status: Some(ContentStatus::Scheduled),
            new_status: ContentStatus::Failed,
            actor: "system".into(),
            notes: Some("HTTP 500: boom".into()),
            created_at: Utc::now(),
        };
        let line = history_line(&record);
        assert!(line.contains("scheduled -> failed  by system"));
        assert!(line.ends_with("(HTTP 500: boom)"));
    }
}
