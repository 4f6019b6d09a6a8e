pub mod docker;
pub mod mock;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::ride::RidePriority;

#[derive(Debug, Error)]
pub enum ProvisionerError {
    #[error("container start failed: {0}")]
    StartFailed(String),

    #[error("container stop failed: {0}")]
    StopFailed(String),

    #[error("container logs unavailable: {0}")]
    LogsUnavailable(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ProvisionerError>;

/// Everything a provisioner needs to start one isolated per-ride endpoint.
#[derive(Debug, Clone)]
pub struct StartSpec {
    pub ride_id: i64,
    pub host_port: u16,
    pub user_id: i64,
    pub pickup: String,
    pub drop: String,
    pub priority: RidePriority,
}

/// Opaque handle for a started instance, echoed back on stop/logs.
#[derive(Debug, Clone)]
pub struct ProvisionerHandle {
    pub container_id: String,
    pub container_name: String,
}

/// Capability interface over the concrete isolation technology. The
/// orchestrator stays independent of whether instances are Docker
/// containers, processes, or test doubles.
#[async_trait]
pub trait Provisioner: Send + Sync {
    async fn start(&self, spec: &StartSpec) -> Result<ProvisionerHandle>;

    async fn stop(&self, handle: &ProvisionerHandle) -> Result<()>;

    async fn logs(&self, handle: &ProvisionerHandle, tail: usize) -> Result<String>;
}
