//! # hsc
//!
//! Entry point of the HTTP source controller.
//!
//! Loads the configuration (`--config` file, then `HSC_*` overrides),
//! initialises tracing and dispatches to the command handlers. `run` keeps
//! going until Ctrl+C, which cancels in-flight fetches and stops the file
//! server once running reconciliations have recorded their status.

#![forbid(unsafe_code)]
#![forbid(clippy::unwrap_used)]
#![forbid(clippy::panic)]
#![deny(clippy::expect_used)]

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use http_source_controller::cli::Cli;
use http_source_controller::commands::execute_command;
use http_source_controller::config::ControllerConfig;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let config = ControllerConfig::load(cli.config.as_deref())
        .context("Failed to load configuration")?;
    info!(
        data_dir = %config.data_dir.display(),
        hostname = %config.hostname,
        "Configuration loaded"
    );

    execute_command(config, cli.command).await
}

/// Initialize tracing subscriber with environment filter.
fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
