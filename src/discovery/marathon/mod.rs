//! Marathon REST and event-bus integration.

pub mod client;
pub mod events;
pub mod types;

pub use client::MarathonClient;
pub use events::{
    ApiRequest, AppDefinition, AppTerminated, EventKind, FailedHealthCheck, MarathonEvent,
    StatusUpdate,
};
pub use types::{App, IpAddress, Task, TaskStatus};
