//! Orchestrator events → membership commands.
//!
//! # State machine
//! ```text
//! Init:      scan all apps → AppUpdated + AddBackend per task
//! Listening: select! { event stream, stop signal }
//!     status update (known app)  → AddBackend / RemoveBackend
//!     api request                → re-fetch app → AppUpdated / AppDropped
//!     stream lost                → resubscribe with backoff, rescan and
//!                                  reconcile against what was emitted
//!     stop                       → unsubscribe, return
//! ```

use std::collections::{BTreeSet, HashMap, HashSet};

use futures_util::StreamExt;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc};

use crate::config::MarathonConfig;
use crate::discovery::labels;
use crate::discovery::marathon::{
    ApiRequest, App, EventKind, IpAddress, MarathonEvent, StatusUpdate,
};
use crate::discovery::orchestrator::{EventStream, Orchestrator, OrchestratorError};
use crate::discovery::{AppInfo, BackendInfo, Command, Labels};
use crate::observability::metrics;
use crate::resilience::Backoff;

/// Errors that end the discovery loop.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// The event stream could not be (re-)established.
    #[error("unable to subscribe to orchestrator events: {0}")]
    Subscribe(#[source] OrchestratorError),

    /// The router is gone; nobody consumes commands any more.
    #[error("command channel closed")]
    ChannelClosed,
}

/// A task's reported endpoints do not cover the labelled index.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{app_id}: port index {index} out of range ({ip_addresses} ip addresses, {ports} ports)")]
pub struct BackendAddressError {
    pub app_id: String,
    pub index: usize,
    pub ip_addresses: usize,
    pub ports: usize,
}

/// How hard to try when the event stream drops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResubscribePolicy {
    pub attempts: u32,
    pub backoff: Backoff,
}

impl From<&MarathonConfig> for ResubscribePolicy {
    fn from(config: &MarathonConfig) -> Self {
        Self {
            attempts: config.resubscribe_attempts,
            backoff: Backoff::new(
                config.resubscribe_backoff_base_ms,
                config.resubscribe_backoff_max_ms,
            ),
        }
    }
}

impl Default for ResubscribePolicy {
    fn default() -> Self {
        Self::from(&MarathonConfig::default())
    }
}

/// Format the routable `ip:port` of a task.
///
/// The same index selects both the ip address and the port.
pub fn backend_address(
    app_id: &str,
    labels: &Labels,
    ip_addresses: &[IpAddress],
    ports: &[u16],
) -> Result<BackendInfo, BackendAddressError> {
    let index = labels::port_index(labels);
    match (ip_addresses.get(index), ports.get(index)) {
        (Some(ip), Some(port)) => Ok(BackendInfo {
            app_id: app_id.to_string(),
            node: format!("{}:{}", ip.ip_address, port),
        }),
        _ => Err(BackendAddressError {
            app_id: app_id.to_string(),
            index,
            ip_addresses: ip_addresses.len(),
            ports: ports.len(),
        }),
    }
}

/// What the processor has told the router about one application.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KnownApp {
    pub labels: Labels,
    /// Nodes announced with `AddBackend` and not yet removed.
    pub nodes: BTreeSet<String>,
}

impl KnownApp {
    pub fn new(labels: Labels) -> Self {
        Self {
            labels,
            nodes: BTreeSet::new(),
        }
    }
}

/// Translates Marathon's event bus into [`Command`]s.
pub struct EventProcessor<O> {
    client: O,
    commands: mpsc::Sender<Command>,
    /// Owned by this task alone.
    apps: HashMap<String, KnownApp>,
    resubscribe: ResubscribePolicy,
}

impl<O: Orchestrator> EventProcessor<O> {
    pub fn new(client: O, commands: mpsc::Sender<Command>, resubscribe: ResubscribePolicy) -> Self {
        Self {
            client,
            commands,
            apps: HashMap::new(),
            resubscribe,
        }
    }

    /// Scan, subscribe and translate events until `stop` fires.
    ///
    /// Returns an error only when the event stream cannot be established;
    /// a closed command channel ends the loop quietly.
    pub async fn run(mut self, mut stop: broadcast::Receiver<()>) -> Result<(), DiscoveryError> {
        match self.listen(&mut stop).await {
            Err(DiscoveryError::ChannelClosed) => {
                tracing::info!("Command channel closed, discovery stopping");
                Ok(())
            }
            other => other,
        }
    }

    async fn listen(&mut self, stop: &mut broadcast::Receiver<()>) -> Result<(), DiscoveryError> {
        let mut events = tokio::select! {
            connected = self.connect() => connected?,
            _ = stop.recv() => {
                tracing::info!("Discovery stopped before the event stream was established");
                return Ok(());
            }
        };

        loop {
            tokio::select! {
                next = events.next() => match next {
                    Some(Ok(event)) => self.handle_event(event).await?,
                    Some(Err(e)) if e.is_decode() => {
                        tracing::warn!(error = %e, "Skipping undecodable event");
                    }
                    Some(Err(e)) => {
                        tracing::warn!(error = %e, "Event stream failed");
                        match self.resubscribe(stop).await? {
                            Some(stream) => events = stream,
                            None => return Ok(()),
                        }
                    }
                    None => {
                        tracing::warn!("Event stream ended");
                        match self.resubscribe(stop).await? {
                            Some(stream) => events = stream,
                            None => return Ok(()),
                        }
                    }
                },
                _ = stop.recv() => {
                    self.client.unsubscribe(events);
                    tracing::info!("Discovery stopped, unsubscribed from event stream");
                    return Ok(());
                }
            }
        }
    }

    async fn connect(&mut self) -> Result<EventStream, DiscoveryError> {
        self.scan_all_apps().await?;
        self.client
            .subscribe(&EventKind::ALL)
            .await
            .map_err(DiscoveryError::Subscribe)
    }

    /// Re-establish the stream, then rescan to pick up anything missed.
    ///
    /// `Ok(None)` means stop fired while waiting.
    async fn resubscribe(
        &mut self,
        stop: &mut broadcast::Receiver<()>,
    ) -> Result<Option<EventStream>, DiscoveryError> {
        let mut last_error = OrchestratorError::Stream("event stream ended".to_string());

        for attempt in 1..=self.resubscribe.attempts {
            let delay = self.resubscribe.backoff.delay(attempt);
            tracing::info!(attempt, delay = ?delay, "Resubscribing to event stream");

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = stop.recv() => return Ok(None),
            }

            let subscribed = tokio::select! {
                subscribed = self.client.subscribe(&EventKind::ALL) => subscribed,
                _ = stop.recv() => return Ok(None),
            };

            match subscribed {
                Ok(stream) => {
                    self.scan_all_apps().await?;
                    return Ok(Some(stream));
                }
                Err(e) => {
                    tracing::warn!(attempt, error = %e, "Resubscribe failed");
                    last_error = e;
                }
            }
        }

        Err(DiscoveryError::Subscribe(last_error))
    }

    /// Bring the router in line with a full listing.
    ///
    /// Every enabled app is synced; known apps that are gone or no longer
    /// enabled are dropped. A failed listing is logged and changes nothing.
    async fn scan_all_apps(&mut self) -> Result<(), DiscoveryError> {
        let apps = match self.client.applications().await {
            Ok(apps) => apps,
            Err(e) => {
                tracing::warn!(error = %e, "Initializing with all applications failed");
                return Ok(());
            }
        };

        let mut listed = HashSet::new();
        for app in apps {
            if !labels::is_enabled(&app.labels) {
                continue;
            }
            tracing::info!(app_id = %app.id, tasks = app.tasks.len(), "Adding application");
            self.sync_app(&app).await?;
            listed.insert(app.id);
        }

        let mut vanished: Vec<String> = self
            .apps
            .keys()
            .filter(|id| !listed.contains(*id))
            .cloned()
            .collect();
        vanished.sort();
        for app_id in vanished {
            tracing::info!(app_id = %app_id, "Application missing from listing, dropping");
            self.drop_app(app_id).await?;
        }
        Ok(())
    }

    /// Announce `app` and reconcile its nodes with its current tasks.
    async fn sync_app(&mut self, app: &App) -> Result<(), DiscoveryError> {
        self.emit(Command::AppUpdated(AppInfo {
            app_id: app.id.clone(),
            labels: app.labels.clone(),
        }))
        .await?;

        let mut current: Vec<BackendInfo> = Vec::with_capacity(app.tasks.len());
        for task in &app.tasks {
            match backend_address(&app.id, &app.labels, &task.ip_addresses, &task.ports) {
                Ok(backend) if !current.contains(&backend) => current.push(backend),
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(task_id = %task.id, error = %e, "Skipping task without routable address");
                }
            }
        }

        let previous = self
            .apps
            .insert(
                app.id.clone(),
                KnownApp {
                    labels: app.labels.clone(),
                    nodes: current.iter().map(|b| b.node.clone()).collect(),
                },
            )
            .map(|known| known.nodes)
            .unwrap_or_default();

        for node in previous.iter().filter(|n| !current.iter().any(|b| &b.node == *n)) {
            tracing::debug!(app_id = %app.id, node = %node, "Removing stale backend");
            self.emit(Command::RemoveBackend(BackendInfo {
                app_id: app.id.clone(),
                node: node.clone(),
            }))
            .await?;
        }
        for backend in current {
            if !previous.contains(&backend.node) {
                tracing::debug!(app_id = %app.id, node = %backend.node, "Adding backend");
                self.emit(Command::AddBackend(backend)).await?;
            }
        }
        Ok(())
    }

    /// Forget a known app and tell the router to drop it.
    async fn drop_app(&mut self, app_id: String) -> Result<(), DiscoveryError> {
        if let Some(known) = self.apps.remove(&app_id) {
            self.emit(Command::AppDropped(AppInfo {
                app_id,
                labels: known.labels,
            }))
            .await?;
        }
        Ok(())
    }

    async fn handle_event(&mut self, event: MarathonEvent) -> Result<(), DiscoveryError> {
        tracing::trace!(kind = event.kind().as_str(), "Event received");
        match event {
            MarathonEvent::StatusUpdate(update) => self.handle_status_update(update).await,
            MarathonEvent::ApiRequest(request) => self.handle_api_request(request).await,
            MarathonEvent::FailedHealthCheck(check) => {
                tracing::debug!(app_id = %check.app_id, task_id = %check.task_id, "Health check failed");
                Ok(())
            }
            MarathonEvent::AppTerminated(terminated) => {
                tracing::debug!(app_id = %terminated.app_id, "Application terminated");
                Ok(())
            }
        }
    }

    async fn handle_status_update(&mut self, update: StatusUpdate) -> Result<(), DiscoveryError> {
        let Some(known) = self.apps.get_mut(&update.app_id) else {
            tracing::trace!(app_id = %update.app_id, "Ignoring status update for unknown app");
            return Ok(());
        };

        let running = update.task_status.is_running();
        if !running && !update.task_status.is_terminal() {
            return Ok(());
        }

        let backend = match backend_address(&update.app_id, &known.labels, &update.ip_addresses, &update.ports) {
            Ok(backend) => backend,
            Err(e) => {
                tracing::warn!(task_id = %update.task_id, error = %e, "Skipping status update without routable address");
                return Ok(());
            }
        };

        tracing::debug!(
            app_id = %backend.app_id,
            node = %backend.node,
            status = ?update.task_status,
            "Task status changed"
        );
        if running {
            known.nodes.insert(backend.node.clone());
            self.emit(Command::AddBackend(backend)).await
        } else {
            known.nodes.remove(&backend.node);
            self.emit(Command::RemoveBackend(backend)).await
        }
    }

    /// The event does not say whether the app was created, changed or
    /// deleted, so the current definition is fetched and compared.
    async fn handle_api_request(&mut self, request: ApiRequest) -> Result<(), DiscoveryError> {
        let app_id = request.app_definition.id;

        let app = match self.client.application(&app_id).await {
            Ok(app) => app,
            Err(e) => {
                tracing::warn!(app_id = %app_id, error = %e, "Unable to get application");
                if self.knows_app(&app_id) {
                    tracing::info!(app_id = %app_id, "Dropping deleted application");
                }
                return self.drop_app(app_id).await;
            }
        };

        if !labels::is_enabled(&app.labels) {
            if self.knows_app(&app_id) {
                tracing::info!(app_id = %app_id, "Application no longer enabled, dropping");
            }
            return self.drop_app(app_id).await;
        }

        // Nodes are re-derived when the app is new (its tasks may already be
        // running and will not report TASK_RUNNING again) or when the port
        // index moved. Otherwise status updates stay authoritative.
        let resync = match self.apps.get_mut(&app.id) {
            None => true,
            Some(known) if labels::port_index(&known.labels) != labels::port_index(&app.labels) => true,
            Some(known) => {
                known.labels = app.labels.clone();
                false
            }
        };

        tracing::info!(app_id = %app.id, resync, "Application created or updated");
        if resync {
            self.sync_app(&app).await
        } else {
            self.emit(Command::AppUpdated(AppInfo {
                app_id: app.id.clone(),
                labels: app.labels.clone(),
            }))
            .await
        }
    }

    /// Send one command, waiting for the router to accept it.
    async fn emit(&self, command: Command) -> Result<(), DiscoveryError> {
        metrics::record_discovery_command(command.kind());
        self.commands
            .send(command)
            .await
            .map_err(|_| DiscoveryError::ChannelClosed)
    }

    /// Whether an application is currently tracked.
    pub fn knows_app(&self, app_id: &str) -> bool {
        self.apps.contains_key(app_id)
    }
}

impl<O> std::fmt::Debug for EventProcessor<O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventProcessor")
            .field("known_apps", &self.apps.len())
            .field("resubscribe", &self.resubscribe)
            .finish()
    }
}
