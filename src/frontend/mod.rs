//! Per-application frontend: a listener plus its backend registry.
//!
//! # Data Flow
//! ```text
//! client connects to the app's port
//!     → Listener::accept (connection limit)
//!     → frontend-requests += 1
//!     → registry.lookup() (strategy pick, under the frontend lock)
//!     → spawn relay(connection, backend)
//! ```
//!
//! # Design Decisions
//! - `stop()` closes the listener only; relays drain on their own
//! - Accept errors back off and retry; they never take the process down
//! - The registry lock is never held across an `.await`

use std::net::SocketAddr;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use tokio::sync::watch;

use crate::config::TlbConfig;
use crate::load_balancer::StrategyKind;
use crate::net::connection::ConnectionTracker;
use crate::net::listener::{Listener, ListenerError};
use crate::net::relay::{self, RelayOutcome};
use crate::observability::metrics;
use crate::resilience::Backoff;

pub mod registry;

pub use registry::BackendRegistry;

/// Settings every frontend shares.
#[derive(Debug, Clone)]
pub struct FrontendSettings {
    pub bind_host: String,
    pub max_connections: usize,
    pub accept_backoff: Backoff,
    pub connect_timeout: Duration,
}

impl From<&TlbConfig> for FrontendSettings {
    fn from(config: &TlbConfig) -> Self {
        Self {
            bind_host: config.listener.bind_host.clone(),
            max_connections: config.listener.max_connections,
            accept_backoff: Backoff::new(
                config.listener.accept_backoff_base_ms,
                config.listener.accept_backoff_max_ms,
            ),
            connect_timeout: Duration::from_secs(config.relay.connect_timeout_secs),
        }
    }
}

impl Default for FrontendSettings {
    fn default() -> Self {
        Self::from(&TlbConfig::default())
    }
}

/// Listener and backend registry for one application.
#[derive(Debug)]
pub struct Frontend {
    app_id: String,
    port: u16,
    strategy: StrategyKind,
    registry: BackendRegistry,
    settings: FrontendSettings,
    relays: ConnectionTracker,
    local_addr: OnceLock<SocketAddr>,
    stop_tx: watch::Sender<bool>,
}

impl Frontend {
    pub fn new(
        app_id: impl Into<String>,
        port: u16,
        strategy: StrategyKind,
        backends: Vec<String>,
        settings: FrontendSettings,
    ) -> Self {
        let app_id = app_id.into();
        let (stop_tx, _) = watch::channel(false);
        Self {
            registry: BackendRegistry::new(app_id.clone(), strategy, backends),
            app_id,
            port,
            strategy,
            settings,
            relays: ConnectionTracker::new(),
            local_addr: OnceLock::new(),
            stop_tx,
        }
    }

    pub fn app_id(&self) -> &str {
        &self.app_id
    }

    /// Configured port (0 means "any free port").
    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn strategy_kind(&self) -> StrategyKind {
        self.strategy
    }

    /// Address actually bound, once `bind` succeeded.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr.get().copied()
    }

    /// Relays still in flight.
    pub fn relays(&self) -> &ConnectionTracker {
        &self.relays
    }

    pub fn lookup(&self) -> Option<String> {
        self.registry.lookup()
    }

    pub fn add_backend(&self, node: &str) -> bool {
        self.registry.add_backend(node)
    }

    pub fn remove_backend(&self, node: &str) -> bool {
        self.registry.remove_backend(node)
    }

    pub fn len_of_backends(&self) -> usize {
        self.registry.len_of_backends()
    }

    pub fn backends(&self) -> Vec<String> {
        self.registry.backends()
    }

    /// Bind the listener and serve until `stop()`.
    pub async fn start(self: Arc<Self>) -> Result<(), ListenerError> {
        let listener = self.bind().await?;
        self.serve(listener).await;
        Ok(())
    }

    /// Bind this frontend's port.
    pub async fn bind(&self) -> Result<Listener, ListenerError> {
        tracing::info!(app_id = %self.app_id, port = self.port, "Starting frontend");
        let listener = Listener::bind(
            &self.settings.bind_host,
            self.port,
            self.settings.max_connections,
        )
        .await?;

        if let Ok(addr) = listener.local_addr() {
            let _ = self.local_addr.set(addr);
        }
        tracing::info!(
            app_id = %self.app_id,
            address = ?self.local_addr(),
            strategy = self.registry.strategy_name(),
            "Started frontend"
        );
        Ok(listener)
    }

    /// Accept connections on `listener` until `stop()`.
    ///
    /// The listener is dropped, and new connections refused, as soon as the
    /// stop signal is observed.
    pub async fn serve(self: Arc<Self>, listener: Listener) {
        let mut stop_rx = self.stop_tx.subscribe();
        let mut failures: u32 = 0;

        loop {
            let accepted = tokio::select! {
                _ = stopped(&mut stop_rx) => break,
                accepted = listener.accept() => accepted,
            };

            match accepted {
                Ok((stream, peer_addr, permit)) => {
                    failures = 0;
                    metrics::record_frontend_request(&self.app_id);

                    let backend = self.lookup();
                    let guard = self.relays.track();
                    let tracker = self.relays.clone();
                    let app_id = self.app_id.clone();
                    let connect_timeout = self.settings.connect_timeout;

                    tracing::debug!(
                        app_id = %app_id,
                        connection_id = %guard.id(),
                        peer_addr = %peer_addr,
                        backend = ?backend,
                        "Dispatching connection"
                    );
                    metrics::record_active_relays(&app_id, tracker.active_count());

                    tokio::spawn(async move {
                        let _permit = permit;
                        let node = backend.clone();
                        match relay::relay(stream, backend, connect_timeout).await {
                            Ok(RelayOutcome::NoBackend) => {
                                tracing::warn!(app_id = %app_id, peer_addr = %peer_addr, "No backend available, closing connection");
                                metrics::record_relay_failure(&app_id, "no_backend");
                            }
                            Ok(RelayOutcome::Completed { to_backend, to_client }) => {
                                tracing::debug!(
                                    app_id = %app_id,
                                    connection_id = %guard.id(),
                                    node = ?node,
                                    to_backend,
                                    to_client,
                                    "Relay closed"
                                );
                                metrics::record_relay_bytes(&app_id, to_backend, to_client);
                            }
                            Err(e) => {
                                tracing::warn!(app_id = %app_id, connection_id = %guard.id(), error = %e, "Relay failed");
                                metrics::record_relay_failure(&app_id, e.reason());
                            }
                        }
                        drop(guard);
                        metrics::record_active_relays(&app_id, tracker.active_count());
                    });
                }
                Err(e) => {
                    failures = failures.saturating_add(1);
                    let delay = self.settings.accept_backoff.delay(failures);
                    tracing::error!(
                        app_id = %self.app_id,
                        error = %e,
                        attempt = failures,
                        delay = ?delay,
                        "Accept failed, backing off"
                    );
                    tokio::select! {
                        _ = stopped(&mut stop_rx) => break,
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }

        drop(listener);
        tracing::info!(app_id = %self.app_id, "Stopped frontend");
    }

    /// Close the listener. In-flight relays are left to finish.
    pub fn stop(&self) {
        tracing::info!(app_id = %self.app_id, "Stopping frontend");
        self.stop_tx.send_replace(true);
    }
}

/// Resolves once the stop flag is set (or its sender is gone).
async fn stopped(rx: &mut watch::Receiver<bool>) {
    while !*rx.borrow_and_update() {
        if rx.changed().await.is_err() {
            return;
        }
    }
}
