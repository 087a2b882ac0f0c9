// SPDX-FileCopyrightText: 2026 Tidepool Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `tidepool errors` and `tidepool resolve`.

use serde::Serialize;
use tidepool_core::{ErrorRecord, TidepoolError};
use tidepool_resilience::ErrorStatistics;

use crate::app::App;
use crate::content::print_json;

#[derive(Serialize)]
struct ErrorsOutput<'a> {
    statistics: &'a ErrorStatistics,
    recent: &'a [ErrorRecord],
}

pub async fn run_errors(
    app: &App,
    hours: u32,
    limit: usize,
    json: bool,
) -> Result<(), TidepoolError> {
    let statistics = app.tracker.get_error_statistics(hours).await?;
    let recent = app.tracker.recent_errors(limit).await?;
    if json {
        return print_json(&ErrorsOutput {
            statistics: &statistics,
            recent: &recent,
        });
    }

    print!("{}", render_statistics(&statistics));
    if recent.is_empty() {
        println!("no recorded errors");
        return Ok(());
    }
    println!("recent:");
    for record in &recent {
        println!("  {}", record_line(record));
    }
    Ok(())
}

pub async fn run_resolve(app: &App, id: &str, notes: Option<&str>) -> Result<(), TidepoolError> {
    app.tracker.resolve_error(id, notes).await?;
    println!("resolved {id}");
    Ok(())
}

fn render_statistics(stats: &ErrorStatistics) -> String {
    let mut out = format!(
        "last {}h: {} errors ({} unresolved), {:.2}/hour\n",
        stats.window_hours, stats.total_errors, stats.unresolved, stats.error_rate
    );
    for (title, counts) in [("by type", &stats.by_type), ("by severity", &stats.by_severity)] {
        if counts.is_empty() {
            continue;
        }
        let joined = counts
            .iter()
            .map(|(key, count)| format!("{key}={count}"))
            .collect::<Vec<_>>()
            .join(", ");
        out.push_str(&format!("  {title}: {joined}\n"));
    }
    out
}

fn record_line(record: &ErrorRecord) -> String {
    let state = if record.resolved { "resolved" } else { "open" };
    format!(
        "{}  {}  {:<8} {:<21} {:<8} {}",
        record.timestamp.format("%Y-%m-%d %H:%M:%S"),
        record.id,
        record.severity.to_string(),
        record.error_type.to_string(),
        state,
        record.message
    )
}
