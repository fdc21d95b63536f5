//! feegate - resolve a fee bid for the configured network
//!
//! Bootstraps a session, waits at the gas price gate and prints the bid as
//! JSON transaction options on stdout.

use anyhow::{anyhow, bail, Result};
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};

use feegate::{metrics, ChainProvider, Session, Settings};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    init_logging();

    info!("Starting feegate v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let settings = Settings::load()?;
    let (network, network_config) = settings.active_network()?;
    let options = settings.fees.resolve()?;
    info!(
        "Loaded configuration for network {} ({} RPC URL(s))",
        network,
        network_config.rpc_urls.len()
    );

    let provider = Arc::new(ChainProvider::new(network, network_config.clone())?);

    // The gate may poll indefinitely; let the operator stop it cleanly
    let session = tokio::select! {
        result = Session::bootstrap_with_chain_id(
            provider.clone(),
            network,
            provider.expected_chain_id(),
            &options,
            settings.fees.verbosity,
        ) => result?,
        _ = shutdown_signal() => {
            warn!("Shutdown signal received, stopping...");
            bail!("Interrupted before a fee bid was resolved");
        }
    };

    let quote = session
        .last_fee_quote()
        .ok_or_else(|| anyhow!("Bootstrap resolved no fee quote"))?;
    println!("{}", serde_json::to_string_pretty(&quote.tx_options())?);

    if let Some(path) = &settings.metrics.textfile {
        metrics::write_textfile(path)?;
    }

    Ok(())
}

fn init_logging() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,ethers_providers=warn"));

    let json = std::env::var("FEEGATE_LOG_FORMAT").is_ok_and(|format| format == "json");

    // stdout carries the bid
    tracing_subscriber::registry()
        .with(filter)
        .with(json.then(|| fmt::layer().json().with_writer(std::io::stderr)))
        .with((!json).then(|| fmt::layer().with_target(true).with_writer(std::io::stderr)))
        .init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut terminate) => {
                terminate.recv().await;
            }
            Err(e) => {
                error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
