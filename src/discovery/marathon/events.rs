//! Marathon event-bus payloads.
//!
//! Every event carries an `eventType` discriminator. Only the kinds the
//! balancer subscribes to are modelled; anything else is skipped at decode
//! time.

use serde::Deserialize;
use serde_json::Value;

use crate::discovery::marathon::types::{IpAddress, TaskStatus};

/// Event kinds the balancer subscribes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    StatusUpdate,
    ApiRequest,
    FailedHealthCheck,
    AppTerminated,
}

impl EventKind {
    pub const ALL: [EventKind; 4] = [
        EventKind::StatusUpdate,
        EventKind::ApiRequest,
        EventKind::FailedHealthCheck,
        EventKind::AppTerminated,
    ];

    /// Marathon's `eventType` value.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::StatusUpdate => "status_update_event",
            EventKind::ApiRequest => "api_post_event",
            EventKind::FailedHealthCheck => "failed_health_check_event",
            EventKind::AppTerminated => "app_terminated_event",
        }
    }

    pub fn from_event_type(event_type: &str) -> Option<Self> {
        EventKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == event_type)
    }
}

/// A task changed state.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdate {
    pub app_id: String,
    #[serde(default)]
    pub task_id: String,
    pub task_status: TaskStatus,
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub ports: Vec<u16>,
    #[serde(default)]
    pub ip_addresses: Vec<IpAddress>,
}

/// An application definition was created, updated or deleted through the API.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiRequest {
    pub app_definition: AppDefinition,
}

/// Only the id is read; the current definition is always re-fetched.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AppDefinition {
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedHealthCheck {
    pub app_id: String,
    #[serde(default)]
    pub task_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppTerminated {
    pub app_id: String,
}

/// The events discovery reacts to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarathonEvent {
    StatusUpdate(StatusUpdate),
    ApiRequest(ApiRequest),
    FailedHealthCheck(FailedHealthCheck),
    AppTerminated(AppTerminated),
}

impl MarathonEvent {
    /// Decode one event body.
    ///
    /// Returns `Ok(None)` for event types the balancer does not consume.
    pub fn decode(data: &str) -> Result<Option<Self>, serde_json::Error> {
        let value: Value = serde_json::from_str(data)?;
        let Some(kind) = value
            .get("eventType")
            .and_then(Value::as_str)
            .and_then(EventKind::from_event_type)
        else {
            return Ok(None);
        };

        let event = match kind {
            EventKind::StatusUpdate => MarathonEvent::StatusUpdate(serde_json::from_value(value)?),
            EventKind::ApiRequest => MarathonEvent::ApiRequest(serde_json::from_value(value)?),
            EventKind::FailedHealthCheck => {
                MarathonEvent::FailedHealthCheck(serde_json::from_value(value)?)
            }
            EventKind::AppTerminated => MarathonEvent::AppTerminated(serde_json::from_value(value)?),
        };
        Ok(Some(event))
    }

    pub fn kind(&self) -> EventKind {
        match self {
            MarathonEvent::StatusUpdate(_) => EventKind::StatusUpdate,
            MarathonEvent::ApiRequest(_) => EventKind::ApiRequest,
            MarathonEvent::FailedHealthCheck(_) => EventKind::FailedHealthCheck,
            MarathonEvent::AppTerminated(_) => EventKind::AppTerminated,
        }
    }
}
