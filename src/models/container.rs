use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerStatus {
    Running,
    Stopped,
}

/// A dedicated per-ride endpoint. At most one instance exists per ride at a
/// time; `host_port` is unique among running instances.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerInstance {
    pub ride_id: i64,
    pub container_id: String,
    pub user_id: i64,
    pub pickup: String,
    pub drop: String,
    pub host_port: u16,
    pub url: String,
    pub started_at: DateTime<Utc>,
    pub status: ContainerStatus,
}
