//! Startup orchestration.
//!
//! # Responsibilities
//! - Build the Marathon client (fatal on a bad URL)
//! - Install the metrics exporter
//! - Wire discovery → command channel → router and run until stopped
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Discovery giving up (resubscribe attempts exhausted) stops the process

use std::net::SocketAddr;

use thiserror::Error;
use tokio::sync::mpsc;

use crate::config::TlbConfig;
use crate::discovery::marathon::MarathonClient;
use crate::discovery::{DiscoveryError, EventProcessor, OrchestratorError, ResubscribePolicy};
use crate::dispatch::Router;
use crate::lifecycle::shutdown::Shutdown;
use crate::lifecycle::signals;
use crate::observability::metrics;

/// Errors that end the process.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("invalid Marathon client configuration: {0}")]
    Client(#[source] OrchestratorError),

    #[error("discovery failed: {0}")]
    Discovery(#[from] DiscoveryError),

    #[error("discovery task panicked")]
    DiscoveryPanicked,
}

/// Run the balancer until a signal arrives or discovery gives up.
pub async fn run(config: TlbConfig) -> Result<(), StartupError> {
    let client = MarathonClient::new(&config.marathon).map_err(StartupError::Client)?;
    tracing::info!(marathon = %client.base_url(), "Marathon client ready");

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let shutdown = Shutdown::new();
    let (commands_tx, commands_rx) = mpsc::channel(config.discovery.command_buffer.max(1));

    let router = Router::new(&config);
    let router_task = tokio::spawn(router.run(commands_rx, shutdown.subscribe()));

    let processor = EventProcessor::new(
        client,
        commands_tx,
        ResubscribePolicy::from(&config.marathon),
    );
    let mut discovery_task = tokio::spawn(processor.run(shutdown.subscribe()));

    let outcome = tokio::select! {
        _ = signals::wait_for_signal() => {
            shutdown.trigger();
            match discovery_task.await {
                Ok(result) => result.map_err(StartupError::from),
                Err(_) => Err(StartupError::DiscoveryPanicked),
            }
        }
        joined = &mut discovery_task => {
            shutdown.trigger();
            match joined {
                Ok(Ok(())) => {
                    tracing::warn!("Discovery stopped unexpectedly");
                    Ok(())
                }
                Ok(Err(e)) => {
                    tracing::error!(error = %e, "Discovery failed");
                    Err(StartupError::from(e))
                }
                Err(_) => Err(StartupError::DiscoveryPanicked),
            }
        }
    };

    if let Err(e) = router_task.await {
        tracing::error!(error = %e, "Router task failed");
    }
    tracing::info!("Shutdown complete");
    outcome
}
