// SPDX-FileCopyrightText: 2026 Tidepool Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `tidepool health` command implementation.
//!
//! Runs the system health check and prints one line per component, followed
//! by the recommendations for anything that is not healthy.

use std::io::IsTerminal;

use tidepool_core::TidepoolError;
use tidepool_resilience::{ComponentHealth, HealthReport, HealthStatus};

use crate::app::App;
use crate::content::print_json;

/// Run the health check and print the report. Returns the overall status.
pub async fn run_health(app: &App, json: bool, plain: bool) -> Result<HealthStatus, TidepoolError> {
    let report = app.health_checker(None)?.check_system_health().await;
    if json {
        print_json(&report)?;
    } else {
        let use_color = !plain && std::io::stdout().is_terminal();
        print!("{}", render_report(&report, use_color));
    }
    Ok(report.status)
}

pub fn render_report(report: &HealthReport, use_color: bool) -> String {
    let mut out = String::new();
    out.push('\n');
    out.push_str(&format!("  tidepool health: {}\n", report.status));
    out.push_str(&format!("  {}\n", "-".repeat(50)));
    for component in &report.components {
        out.push_str(&component_line(component, use_color));
        out.push('\n');
    }
    out.push('\n');

    if report.recommendations.is_empty() {
        out.push_str("  All checks passed.\n");
    } else {
        let count = report.recommendations.len();
        let word = if count == 1 { "issue" } else { "issues" };
        out.push_str(&format!("  {count} {word} found:\n"));
        for recommendation in &report.recommendations {
            out.push_str(&format!("    - {recommendation}\n"));
        }
    }
    out
}

fn component_line(component: &ComponentHealth, use_color: bool) -> String {
    let latency = component
        .latency_ms
        .map(|ms| format!(" ({ms}ms)"))
        .unwrap_or_default();
    let name = &component.name;

    if use_color {
        use colored::Colorize;
        let (symbol, message) = match component.status {
            HealthStatus::Healthy => ("✓".green(), component.message.normal()),
            HealthStatus::Degraded => ("!".yellow(), component.message.yellow()),
            HealthStatus::Critical => ("✗".red(), component.message.red()),
        };
        format!("    {symbol} {name:<18} {message}{latency}")
    } else {
        let marker = match component.status {
            HealthStatus::Healthy => "[OK]  ",
            HealthStatus::Degraded => "[WARN]",
            HealthStatus::Critical => "[FAIL]",
        };
        format!("    {marker} {name:<18} {}{latency}", component.message)
    }
}
