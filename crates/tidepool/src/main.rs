// SPDX-FileCopyrightText: 2026 Tidepool Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tidepool - content queue, validation and resilient publishing for
//! aquascaping social accounts.
//!
//! This is the binary entry point.

mod app;
mod content;
mod errors;
mod health;
mod serve;
mod shutdown;

use std::path::PathBuf;
use std::process::ExitCode;

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use tidepool_config::model::TidepoolConfig;
use tidepool_core::{ContentStatus, TidepoolError};
use tidepool_resilience::HealthStatus;

use crate::app::App;
use crate::content::{AddArgs, BodyArgs, non_blank};

/// Tidepool - content queue and resilient publishing.
#[derive(Parser, Debug)]
#[command(name = "tidepool", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the standard locations.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Validate, score and queue a new content item.
    Add(AddArgs),
    /// Approve an item for scheduling.
    Approve {
        id: String,
        #[arg(long, default_value = "cli")]
        by: String,
        #[arg(long)]
        notes: Option<String>,
    },
    /// Reject an item. A reason is required.
    Reject {
        id: String,
        #[arg(long, default_value = "cli")]
        by: String,
        #[arg(long, value_parser = non_blank)]
        reason: String,
    },
    /// Schedule an approved item for publishing.
    Schedule {
        id: String,
        /// Publish time (RFC 3339). Defaults to now.
        #[arg(long)]
        at: Option<DateTime<Utc>>,
    },
    /// Archive a published, rejected or failed item.
    Archive {
        id: String,
        #[arg(long, default_value = "cli")]
        by: String,
        #[arg(long)]
        notes: Option<String>,
    },
    /// List queued content.
    List {
        #[arg(long)]
        status: Option<ContentStatus>,
        #[arg(long)]
        json: bool,
    },
    /// Show one item with its validation results and history.
    Show {
        id: String,
        #[arg(long)]
        json: bool,
    },
    /// Queue statistics.
    Stats {
        #[arg(long)]
        json: bool,
    },
    /// Error statistics and recently recorded errors.
    Errors {
        /// Look-back window in hours.
        #[arg(long, default_value_t = 24)]
        hours: u32,
        #[arg(long, default_value_t = 20)]
        limit: usize,
        #[arg(long)]
        json: bool,
    },
    /// Mark a recorded error as resolved.
    Resolve {
        id: String,
        #[arg(long)]
        notes: Option<String>,
    },
    /// Run the system health check. Exits non-zero when critical.
    Health {
        #[arg(long)]
        json: bool,
        /// Disable colored output.
        #[arg(long)]
        plain: bool,
    },
    /// Run the publish loop until interrupted.
    Serve,
    /// Print the effective configuration as TOML.
    Config,
    /// Run the validation rules on a caption without queueing it.
    Validate {
        #[command(flatten)]
        body: BodyArgs,
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(errors) => {
            tidepool_config::render_errors(&errors);
            return ExitCode::FAILURE;
        }
    };

    // One-shot commands only surface warnings unless RUST_LOG says otherwise.
    let log_level = match cli.command {
        Commands::Serve => config.general.log_level.as_str(),
        _ => "warn",
    };
    serve::init_tracing(log_level);

    match run(cli.command, config).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn load_config(
    path: Option<&std::path::Path>,
) -> Result<TidepoolConfig, Vec<tidepool_config::ConfigError>> {
    match path {
        Some(path) => tidepool_config::load_and_validate_path(path),
        None => tidepool_config::load_and_validate(),
    }
}

async fn run(command: Commands, config: TidepoolConfig) -> Result<ExitCode, TidepoolError> {
    if let Commands::Config = command {
        print!("{}", effective_config(&config)?);
        return Ok(ExitCode::SUCCESS);
    }
    let app = App::open(config).await?;

    match command {
        Commands::Add(args) => content::run_add(&app, args).await?,
        Commands::Approve { id, by, notes } => content::run_approve(&app, &id, &by, notes).await?,
        Commands::Reject { id, by, reason } => content::run_reject(&app, &id, &by, &reason).await?,
        Commands::Schedule { id, at } => content::run_schedule(&app, &id, at).await?,
        Commands::Archive { id, by, notes } => content::run_archive(&app, &id, &by, notes).await?,
        Commands::List { status, json } => content::run_list(&app, status, json).await?,
        Commands::Show { id, json } => content::run_show(&app, &id, json).await?,
        Commands::Stats { json } => content::run_stats(&app, json).await?,
        Commands::Errors { hours, limit, json } => {
            errors::run_errors(&app, hours, limit, json).await?
        }
        Commands::Resolve { id, notes } => errors::run_resolve(&app, &id, notes.as_deref()).await?,
        Commands::Health { json, plain } => {
            let status = health::run_health(&app, json, plain).await?;
            if status == HealthStatus::Critical {
                return Ok(ExitCode::FAILURE);
            }
        }
        Commands::Serve => serve::run_serve(app).await?,
        Commands::Validate { body, json } => content::run_validate(&app, body, json).await?,
        Commands::Config => {}
    }
    Ok(ExitCode::SUCCESS)
}

/// The loaded configuration as TOML, with the access token masked.
fn effective_config(config: &TidepoolConfig) -> Result<String, TidepoolError> {
    let mut shown = config.clone();
    if shown.publisher.access_token.is_some() {
        shown.publisher.access_token = Some("<redacted>".to_string());
    }
    tidepool_config::render_config(&shown)
        .map_err(|e| TidepoolError::Internal(format!("failed to render configuration: {e}")))
}
