//! SyncClip - offline-first clip sharing
//!
//! This is the main entry point for the command-line client.

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use syncclip::cli::{Cli, CliHandler};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut handler = CliHandler::new(cli.config.clone())?;

    // Initialize logging
    let log_level = if cli.verbose {
        "debug".to_string()
    } else {
        handler.config().log_level.clone()
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("syncclip={}", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    info!("SyncClip v{}", syncclip::VERSION);

    handler.handle_command(cli.command).await?;

    Ok(())
}
