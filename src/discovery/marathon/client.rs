//! HTTP client for Marathon's REST API and event bus.
//!
//! # Endpoints
//! - `GET /v2/apps?embed=apps.tasks`: initial scan
//! - `GET /v2/apps/{id}`: re-fetch after an API request event
//! - `GET /v2/events?event_type=...`: Server-Sent Events stream

use std::time::Duration;

use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures_util::{future, StreamExt};
use reqwest::header::ACCEPT;
use reqwest::StatusCode;
use serde::Deserialize;
use url::Url;

use crate::config::MarathonConfig;
use crate::discovery::marathon::events::{EventKind, MarathonEvent};
use crate::discovery::marathon::types::App;
use crate::discovery::orchestrator::{EventStream, Orchestrator, OrchestratorError};

#[derive(Debug, Deserialize)]
struct AppsResponse {
    #[serde(default)]
    apps: Vec<App>,
}

#[derive(Debug, Deserialize)]
struct AppResponse {
    app: App,
}

/// Marathon API client.
#[derive(Debug, Clone)]
pub struct MarathonClient {
    base: Url,
    /// Used for request/response calls; bounded by the configured timeout.
    http: reqwest::Client,
    /// Used for the event stream; only the connect is bounded.
    events: reqwest::Client,
}

impl MarathonClient {
    /// Build a client from configuration.
    pub fn new(config: &MarathonConfig) -> Result<Self, OrchestratorError> {
        let mut base = Url::parse(&config.url)?;
        // Keep any path prefix when joining relative endpoints.
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        let request_timeout = Duration::from_secs(config.request_timeout_secs);
        let http = reqwest::Client::builder().timeout(request_timeout).build()?;
        let events = reqwest::Client::builder()
            .connect_timeout(request_timeout)
            .build()?;

        Ok(Self { base, http, events })
    }

    /// Base URL every endpoint is resolved against.
    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn endpoint(&self, path: &str) -> Result<Url, OrchestratorError> {
        Ok(self.base.join(path)?)
    }

    /// URL of a single application. Marathon ids start with `/`.
    fn app_url(&self, app_id: &str) -> Result<Url, OrchestratorError> {
        self.endpoint(&format!("v2/apps/{}", app_id.trim_start_matches('/')))
    }

    fn events_url(&self, kinds: &[EventKind]) -> Result<Url, OrchestratorError> {
        let mut url = self.endpoint("v2/events")?;
        {
            let mut query = url.query_pairs_mut();
            for kind in kinds {
                query.append_pair("event_type", kind.as_str());
            }
        }
        Ok(url)
    }
}

fn check_status(url: &Url, status: StatusCode) -> Result<(), OrchestratorError> {
    if status.is_success() {
        Ok(())
    } else {
        Err(OrchestratorError::Status {
            url: url.to_string(),
            status: status.as_u16(),
        })
    }
}

#[async_trait]
impl Orchestrator for MarathonClient {
    async fn applications(&self) -> Result<Vec<App>, OrchestratorError> {
        let mut url = self.endpoint("v2/apps")?;
        url.query_pairs_mut().append_pair("embed", "apps.tasks");

        let response = self.http.get(url.clone()).send().await?;
        check_status(&url, response.status())?;
        let body: AppsResponse = response.json().await?;

        tracing::debug!(count = body.apps.len(), "Fetched applications");
        Ok(body.apps)
    }

    async fn application(&self, app_id: &str) -> Result<App, OrchestratorError> {
        let url = self.app_url(app_id)?;

        let response = self.http.get(url.clone()).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(OrchestratorError::NotFound(app_id.to_string()));
        }
        check_status(&url, response.status())?;
        let body: AppResponse = response.json().await?;
        Ok(body.app)
    }

    async fn subscribe(&self, kinds: &[EventKind]) -> Result<EventStream, OrchestratorError> {
        let url = self.events_url(kinds)?;

        let response = self
            .events
            .get(url.clone())
            .header(ACCEPT, "text/event-stream")
            .send()
            .await?;
        check_status(&url, response.status())?;

        tracing::info!(url = %url, "Subscribed to Marathon event stream");

        let stream = response
            .bytes_stream()
            .eventsource()
            .filter_map(|item| {
                let decoded = match item {
                    Ok(event) => match MarathonEvent::decode(&event.data) {
                        Ok(Some(event)) => Some(Ok(event)),
                        Ok(None) => None,
                        Err(e) => Some(Err(OrchestratorError::Decode(e))),
                    },
                    Err(e) => Some(Err(OrchestratorError::Stream(e.to_string()))),
                };
                future::ready(decoded)
            });

        Ok(Box::pin(stream))
    }
}
