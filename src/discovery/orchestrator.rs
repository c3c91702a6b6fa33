//! The orchestrator surface discovery depends on.

use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::Stream;
use thiserror::Error;

use crate::discovery::marathon::{App, EventKind, MarathonEvent};

/// Live, already-decoded orchestrator events.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<MarathonEvent, OrchestratorError>> + Send>>;

/// Errors returned by an orchestrator client.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("invalid orchestrator url: {0}")]
    Url(#[from] url::ParseError),

    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{url} returned status {status}")]
    Status { url: String, status: u16 },

    #[error("application {0} not found")]
    NotFound(String),

    #[error("event stream failed: {0}")]
    Stream(String),

    #[error("malformed event: {0}")]
    Decode(#[from] serde_json::Error),
}

impl OrchestratorError {
    /// A single event could not be decoded; the stream itself is fine.
    pub fn is_decode(&self) -> bool {
        matches!(self, OrchestratorError::Decode(_))
    }
}

/// Read access to applications plus a subscription to lifecycle events.
#[async_trait]
pub trait Orchestrator: Send + Sync {
    /// All applications, with their tasks embedded.
    async fn applications(&self) -> Result<Vec<App>, OrchestratorError>;

    /// One application by id. Fails when the application does not exist.
    async fn application(&self, app_id: &str) -> Result<App, OrchestratorError>;

    /// Subscribe to the given event kinds.
    async fn subscribe(&self, kinds: &[EventKind]) -> Result<EventStream, OrchestratorError>;

    /// Tear down a subscription.
    fn unsubscribe(&self, stream: EventStream) {
        drop(stream);
    }
}

#[async_trait]
impl<T: Orchestrator + ?Sized> Orchestrator for Arc<T> {
    async fn applications(&self) -> Result<Vec<App>, OrchestratorError> {
        (**self).applications().await
    }

    async fn application(&self, app_id: &str) -> Result<App, OrchestratorError> {
        (**self).application(app_id).await
    }

    async fn subscribe(&self, kinds: &[EventKind]) -> Result<EventStream, OrchestratorError> {
        (**self).subscribe(kinds).await
    }

    fn unsubscribe(&self, stream: EventStream) {
        (**self).unsubscribe(stream)
    }
}
