//! RaiderHub Console
//!
//! Headless front end for the RaiderHub companion: conversations, presence
//! and live chat from a terminal.

mod chat;
mod commands;
mod config;

use clap::Parser;
use raiderhub_core::{LocalStorage, RaiderClient};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "raiderhub", version, about = "RaiderHub companion console")]
struct Cli {
    /// REST API base URL
    #[arg(long, env = "RAIDERHUB_API_URL")]
    api_url: Option<String>,

    /// Socket gateway URL (derived from the API URL when unset)
    #[arg(long, env = "RAIDERHUB_WS_URL")]
    ws_url: Option<String>,

    /// Directory holding config.json and the local database
    #[arg(long)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: commands::Command,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so they don't interleave with command output.
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "raiderhub_console=info,raiderhub_core=info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let data_dir = cli.data_dir.unwrap_or_else(|| {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("raiderhub")
    });
    std::fs::create_dir_all(&data_dir)?;
    tracing::debug!("Data directory: {:?}", data_dir);

    if !config::AppConfig::path(&data_dir).exists() {
        config::AppConfig::default().save(&data_dir)?;
    }
    let mut config = config::AppConfig::load(&data_dir)?;
    if let Some(api_url) = cli.api_url {
        config.server.api_url = api_url;
    }
    if let Some(ws_url) = cli.ws_url {
        config.server.ws_url = Some(ws_url);
    }

    let storage = Arc::new(LocalStorage::new(&data_dir)?);
    let mut client = RaiderClient::new(config.client_config(), storage)?;

    commands::run(cli.command, &mut client, &config).await
}
