//! WebSocket message relay server.

use anyhow::Result;
use clap::Parser;
use relay_server::{server, Cli};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let config = cli.config();
    tracing::info!(port = config.port, max_clients = config.max_clients, "starting relay-server");

    server::run(config).await?;
    Ok(())
}
