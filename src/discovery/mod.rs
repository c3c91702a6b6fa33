//! Backend discovery subsystem.
//!
//! # Data Flow
//! ```text
//! Marathon REST + SSE
//!     → marathon/client.rs (HTTP, event stream decoding)
//!     → processor.rs (initial scan, event → command translation)
//!     → Command channel (mpsc, FIFO)
//!     → dispatch::Router
//! ```
//!
//! # Design Decisions
//! - Orchestrator access sits behind the `Orchestrator` trait so the
//!   processor can be driven by a fake in tests
//! - Events are decoded once into a closed enum and matched exhaustively
//! - The set of known applications lives inside the processor task only;
//!   everyone else learns about apps from `AppUpdated` / `AppDropped`

use std::collections::HashMap;

pub mod labels;
pub mod marathon;
pub mod orchestrator;
pub mod processor;

pub use orchestrator::{EventStream, Orchestrator, OrchestratorError};
pub use processor::{DiscoveryError, EventProcessor, ResubscribePolicy};

/// Application labels as reported by the orchestrator.
pub type Labels = HashMap<String, String>;

/// An application the balancer serves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppInfo {
    pub app_id: String,
    pub labels: Labels,
}

/// One routable instance of an application.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BackendInfo {
    pub app_id: String,
    /// `ip:port`
    pub node: String,
}

/// Membership commands sent from discovery to the dispatch router.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    AddBackend(BackendInfo),
    RemoveBackend(BackendInfo),
    AppUpdated(AppInfo),
    AppDropped(AppInfo),
}

impl Command {
    /// Application this command concerns.
    pub fn app_id(&self) -> &str {
        match self {
            Command::AddBackend(b) | Command::RemoveBackend(b) => &b.app_id,
            Command::AppUpdated(a) | Command::AppDropped(a) => &a.app_id,
        }
    }

    /// Short label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Command::AddBackend(_) => "add_backend",
            Command::RemoveBackend(_) => "remove_backend",
            Command::AppUpdated(_) => "app_updated",
            Command::AppDropped(_) => "app_dropped",
        }
    }
}
