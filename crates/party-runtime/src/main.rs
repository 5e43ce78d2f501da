//! # Party Server
//!
//! Starts a party node configured from the environment and runs until
//! interrupted. On shutdown every party is terminated, so members get the
//! closure notice before the process exits.

use anyhow::Context;
use party_runtime::{init_tracing, PartyServer, RuntimeConfig};
use std::time::Duration;
use tracing::info;

/// Time given to parties to publish their closure before exiting.
const SHUTDOWN_GRACE: Duration = Duration::from_millis(500);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = RuntimeConfig::from_env().context("invalid configuration")?;
    init_tracing(&config).context("cannot initialise logging")?;

    info!(
        node = %config.node,
        max_size = config.party.max_size,
        tick_rate = config.party.tick_rate,
        invite_ttl_secs = config.party.invite_duration.as_secs(),
        "Starting party server"
    );

    let server = PartyServer::start(config);

    tokio::signal::ctrl_c()
        .await
        .context("cannot listen for shutdown signal")?;
    info!("Shutdown signal received");

    server.shutdown().await;
    tokio::time::sleep(SHUTDOWN_GRACE).await;
    info!(remaining = server.parties().len(), "Party server stopped");

    Ok(())
}
