//! `laneguard` -- terminal front-end for the LaneGuard detection service.
//!
//! Follows the realtime detection stream, submits videos for analysis,
//! watches analysis jobs and shows result timelines.
//!
//! # Environment variables
//!
//! | Variable               | Required | Default                 | Description                  |
//! |------------------------|----------|-------------------------|------------------------------|
//! | `LANEGUARD_API_URL`    | no       | `http://127.0.0.1:8000` | HTTP base URL of the service |
//! | `LANEGUARD_WS_URL`     | no       | derived from API URL    | WebSocket base URL           |
//! | `POLL_INTERVAL_MS`     | no       | `800`                   | Job status poll cadence      |
//! | `REQUEST_TIMEOUT_SECS` | no       | `30`                    | HTTP request timeout         |

use anyhow::Context as _;
use clap::Parser;
use laneguard_client::client::ws_base_from_http;
use laneguard_console::cli::{Cli, Command};
use laneguard_console::commands::{self, Context};
use laneguard_console::config::ConsoleConfig;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "laneguard_console=info,laneguard_client=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let mut config = ConsoleConfig::from_env().context("Invalid configuration")?;
    if let Some(api_url) = cli.api_url {
        config.api_url = api_url.trim_end_matches('/').to_string();
        if std::env::var("LANEGUARD_WS_URL").is_err() {
            config.ws_url = ws_base_from_http(&config.api_url);
        }
    }

    tracing::info!(
        api_url = %config.api_url,
        ws_url = %config.ws_url,
        poll_interval_ms = config.poll_interval.as_millis() as u64,
        "Starting laneguard",
    );

    let ctx = Context::new(config)?;

    match cli.command {
        Command::Live(args) => commands::live::run(&ctx, args).await,
        Command::Submit(args) => commands::submit::run(&ctx, args).await,
        Command::Job { job_id } => commands::job::run(&ctx, job_id).await,
        Command::Results(args) => commands::results::run(&ctx, args).await,
        Command::Health => commands::health::run(&ctx).await,
    }
}
