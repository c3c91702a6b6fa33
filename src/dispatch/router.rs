//! App id → Frontend mapping, driven by discovery commands.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use crate::config::TlbConfig;
use crate::discovery::{labels, AppInfo, BackendInfo, Command};
use crate::frontend::{Frontend, FrontendSettings};

#[derive(Debug)]
struct ManagedFrontend {
    frontend: Arc<Frontend>,
    task: JoinHandle<()>,
}

/// Owns every running frontend.
#[derive(Debug)]
pub struct Router {
    frontends: HashMap<String, ManagedFrontend>,
    /// node → owning app id
    owners: HashMap<String, String>,
    /// Nodes of apps that have no running frontend (no port yet, or the
    /// bind failed). They seed the frontend once it starts.
    pending: HashMap<String, Vec<String>>,
    static_ports: HashMap<String, u16>,
    settings: FrontendSettings,
    drain_timeout: Duration,
}

impl Router {
    pub fn new(config: &TlbConfig) -> Self {
        Self::with_settings(
            FrontendSettings::from(config),
            config.frontends.clone(),
            Duration::from_secs(config.listener.drain_timeout_secs),
        )
    }

    pub fn with_settings(
        settings: FrontendSettings,
        static_ports: HashMap<String, u16>,
        drain_timeout: Duration,
    ) -> Self {
        Self {
            frontends: HashMap::new(),
            owners: HashMap::new(),
            pending: HashMap::new(),
            static_ports,
            settings,
            drain_timeout,
        }
    }

    /// Apply commands until the channel closes or shutdown fires, then stop
    /// every frontend and wait (bounded) for their relays to drain.
    pub async fn run(mut self, mut commands: mpsc::Receiver<Command>, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!("Dispatch router started");
        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => self.apply(command).await,
                    None => break,
                },
                _ = shutdown.recv() => break,
            }
        }
        drop(commands);
        self.shutdown().await;
    }

    /// Apply one command.
    pub async fn apply(&mut self, command: Command) {
        tracing::trace!(kind = command.kind(), app_id = %command.app_id(), "Applying command");
        match command {
            Command::AppUpdated(app) => self.app_updated(app).await,
            Command::AppDropped(app) => self.app_dropped(app).await,
            Command::AddBackend(backend) => self.add_backend(backend),
            Command::RemoveBackend(backend) => self.remove_backend(backend),
        }
    }

    /// Frontend serving `app_id`, if any.
    pub fn frontend(&self, app_id: &str) -> Option<Arc<Frontend>> {
        self.frontends.get(app_id).map(|m| Arc::clone(&m.frontend))
    }

    pub fn app_ids(&self) -> Vec<String> {
        self.frontends.keys().cloned().collect()
    }

    fn resolve_port(&self, app: &AppInfo) -> Option<u16> {
        labels::port(&app.labels).or_else(|| self.static_ports.get(&app.app_id).copied())
    }

    async fn app_updated(&mut self, app: AppInfo) {
        let Some(port) = self.resolve_port(&app) else {
            tracing::warn!(app_id = %app.app_id, "No frontend port assigned, not serving application");
            return;
        };
        let strategy = labels::strategy(&app.labels);

        let unchanged = self
            .frontends
            .get(&app.app_id)
            .map(|m| m.frontend.port() == port && m.frontend.strategy_kind() == strategy);

        let mut backends = match unchanged {
            Some(true) => {
                tracing::debug!(app_id = %app.app_id, "Application updated, frontend unchanged");
                return;
            }
            Some(false) => {
                tracing::info!(app_id = %app.app_id, port, strategy = %strategy, "Reconfiguring frontend");
                match self.frontends.remove(&app.app_id) {
                    Some(old) => {
                        let backends = old.frontend.backends();
                        Self::stop_frontend(old).await;
                        backends
                    }
                    None => Vec::new(),
                }
            }
            None => Vec::new(),
        };

        backends.extend(self.pending.remove(&app.app_id).unwrap_or_default());

        let frontend = Arc::new(Frontend::new(
            app.app_id.clone(),
            port,
            strategy,
            backends,
            self.settings.clone(),
        ));

        match frontend.bind().await {
            Ok(listener) => {
                let task = tokio::spawn(Arc::clone(&frontend).serve(listener));
                self.frontends
                    .insert(app.app_id, ManagedFrontend { frontend, task });
            }
            Err(e) => {
                tracing::error!(app_id = %app.app_id, port, error = %e, "Unable to start frontend");
                // Kept for the next AppUpdated of this app.
                self.pending.insert(app.app_id, frontend.backends());
            }
        }
    }

    async fn app_dropped(&mut self, app: AppInfo) {
        self.owners.retain(|_, owner| owner != &app.app_id);
        self.pending.remove(&app.app_id);
        let Some(managed) = self.frontends.remove(&app.app_id) else {
            tracing::debug!(app_id = %app.app_id, "Dropped application had no frontend");
            return;
        };
        Self::stop_frontend(managed).await;
        tracing::info!(app_id = %app.app_id, "Application dropped");
    }

    fn add_backend(&mut self, backend: BackendInfo) {
        if let Some(previous) = self.owners.get(&backend.node).cloned() {
            if previous != backend.app_id {
                tracing::warn!(
                    node = %backend.node,
                    from = %previous,
                    to = %backend.app_id,
                    "Backend moved between applications"
                );
                self.detach(&previous, &backend.node);
            }
        }

        match self.frontends.get(&backend.app_id) {
            Some(managed) => {
                managed.frontend.add_backend(&backend.node);
            }
            None => {
                tracing::debug!(
                    app_id = %backend.app_id,
                    node = %backend.node,
                    "No frontend for application yet, remembering backend"
                );
                let nodes = self.pending.entry(backend.app_id.clone()).or_default();
                if !nodes.contains(&backend.node) {
                    nodes.push(backend.node.clone());
                }
            }
        }
        self.owners.insert(backend.node, backend.app_id);
    }

    fn remove_backend(&mut self, backend: BackendInfo) {
        if !self.frontends.contains_key(&backend.app_id) && !self.pending.contains_key(&backend.app_id) {
            tracing::warn!(app_id = %backend.app_id, node = %backend.node, "Removing backend of unknown application");
            return;
        }
        self.detach(&backend.app_id, &backend.node);
        if self.owners.get(&backend.node) == Some(&backend.app_id) {
            self.owners.remove(&backend.node);
        }
    }

    /// Take `node` away from `app_id`, whether it is served or pending.
    fn detach(&mut self, app_id: &str, node: &str) {
        if let Some(managed) = self.frontends.get(app_id) {
            managed.frontend.remove_backend(node);
        } else if let Some(nodes) = self.pending.get_mut(app_id) {
            nodes.retain(|n| n != node);
        }
    }

    async fn stop_frontend(managed: ManagedFrontend) {
        managed.frontend.stop();
        if let Err(e) = managed.task.await {
            tracing::error!(app_id = %managed.frontend.app_id(), error = %e, "Frontend task failed");
        }
    }

    /// Stop every frontend, then give in-flight relays a bounded time to finish.
    pub async fn shutdown(mut self) {
        let managed: Vec<ManagedFrontend> = self.frontends.drain().map(|(_, m)| m).collect();
        let frontends: Vec<Arc<Frontend>> = managed.iter().map(|m| Arc::clone(&m.frontend)).collect();

        for m in managed {
            Self::stop_frontend(m).await;
        }

        let drained = async {
            for frontend in &frontends {
                frontend.relays().wait_for_drain().await;
            }
        };
        if tokio::time::timeout(self.drain_timeout, drained).await.is_err() {
            let remaining: u64 = frontends.iter().map(|f| f.relays().active_count()).sum();
            tracing::warn!(remaining, "Drain timeout elapsed with relays still open");
        }
        tracing::info!("Dispatch router stopped");
    }
}
