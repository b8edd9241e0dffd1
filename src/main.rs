mod api;
mod cli;
mod config;
mod dashboard;
mod db;
mod jwt;
mod models;
mod player;
mod scroll;
mod task;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = cli::Cli::parse();

    // Initialize logging. Stdout carries command output, so logs go to stderr.
    let default_filter = if cli.output.verbose {
        "unicorns=trace,info"
    } else {
        "unicorns=debug,info"
    };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| default_filter.into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    tracing::debug!("Starting Unicorns {}", env!("CARGO_PKG_VERSION"));

    cli::run(cli).await
}
