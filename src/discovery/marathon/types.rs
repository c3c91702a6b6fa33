//! Marathon application and task payloads.

use serde::Deserialize;

use crate::discovery::Labels;

/// An application, optionally with tasks embedded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct App {
    pub id: String,
    #[serde(default, deserialize_with = "nullable_labels")]
    pub labels: Labels,
    #[serde(default)]
    pub tasks: Vec<Task>,
}

/// A running (or starting) instance of an application.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub ports: Vec<u16>,
    #[serde(default)]
    pub ip_addresses: Vec<IpAddress>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IpAddress {
    pub ip_address: String,
    #[serde(default)]
    pub protocol: String,
}

impl IpAddress {
    pub fn new(ip: impl Into<String>) -> Self {
        Self {
            ip_address: ip.into(),
            protocol: "IPv4".to_string(),
        }
    }
}

/// Marathon sends `"labels": null` for some apps.
fn nullable_labels<'de, D>(deserializer: D) -> Result<Labels, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<Labels>::deserialize(deserializer)?.unwrap_or_default())
}

/// Mesos task state carried by status updates.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum TaskStatus {
    Staging,
    Starting,
    Running,
    Killing,
    Finished,
    Failed,
    Killed,
    Lost,
    Error,
    Dropped,
    Gone,
    Unreachable,
    Other(String),
}

impl From<String> for TaskStatus {
    fn from(value: String) -> Self {
        match value.as_str() {
            "TASK_STAGING" => TaskStatus::Staging,
            "TASK_STARTING" => TaskStatus::Starting,
            "TASK_RUNNING" => TaskStatus::Running,
            "TASK_KILLING" => TaskStatus::Killing,
            "TASK_FINISHED" => TaskStatus::Finished,
            "TASK_FAILED" => TaskStatus::Failed,
            "TASK_KILLED" => TaskStatus::Killed,
            "TASK_LOST" => TaskStatus::Lost,
            "TASK_ERROR" => TaskStatus::Error,
            "TASK_DROPPED" => TaskStatus::Dropped,
            "TASK_GONE" => TaskStatus::Gone,
            "TASK_UNREACHABLE" => TaskStatus::Unreachable,
            _ => TaskStatus::Other(value),
        }
    }
}

impl TaskStatus {
    /// The task serves traffic.
    pub fn is_running(&self) -> bool {
        matches!(self, TaskStatus::Running)
    }

    /// The task failed or terminated and will not serve again.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Finished
                | TaskStatus::Failed
                | TaskStatus::Killed
                | TaskStatus::Lost
                | TaskStatus::Error
                | TaskStatus::Dropped
                | TaskStatus::Gone
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_app_with_tasks() {
        let app: App = serde_json::from_str(
            r#"{
                "id": "/web",
                "labels": {"tlb.enabled": "true"},
                "instances": 1,
                "tasks": [{
                    "id": "web.1",
                    "host": "agent-1",
                    "ports": [31000, 31001],
                    "ipAddresses": [{"ipAddress": "10.0.0.7", "protocol": "IPv4"}]
                }]
            }"#,
        )
        .unwrap();

        assert_eq!(app.id, "/web");
        assert_eq!(app.labels.get("tlb.enabled").map(String::as_str), Some("true"));
        assert_eq!(app.tasks[0].ports, vec![31000, 31001]);
        assert_eq!(app.tasks[0].ip_addresses[0].ip_address, "10.0.0.7");
    }

    #[test]
    fn null_labels_become_empty() {
        let app: App = serde_json::from_str(r#"{"id": "/x", "labels": null}"#).unwrap();
        assert!(app.labels.is_empty());
        assert!(app.tasks.is_empty());
    }

    #[test]
    fn task_status_classification() {
        assert!(TaskStatus::from("TASK_RUNNING".to_string()).is_running());
        assert!(TaskStatus::from("TASK_FAILED".to_string()).is_terminal());
        assert!(TaskStatus::from("TASK_KILLED".to_string()).is_terminal());
        let staging = TaskStatus::from("TASK_STAGING".to_string());
        assert!(!staging.is_running() && !staging.is_terminal());
        assert_eq!(
            TaskStatus::from("TASK_WHATEVER".to_string()),
            TaskStatus::Other("TASK_WHATEVER".into())
        );
    }
}
