use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::models::ride::RidePriority;
use crate::provision::{Provisioner, ProvisionerError, ProvisionerHandle, Result, StartSpec};

/// Runs each ride endpoint as a detached Docker container, mapping the
/// allocated host port onto the image's internal port.
pub struct DockerProvisioner {
    image: String,
    internal_port: u16,
}

impl DockerProvisioner {
    pub fn new(image: String, internal_port: u16) -> Self {
        Self {
            image,
            internal_port,
        }
    }
}

// Emergency rides get the larger grant.
fn resource_limits(priority: RidePriority) -> (&'static str, &'static str) {
    match priority {
        RidePriority::Normal => ("0.5", "256m"),
        RidePriority::Emergency => ("1.0", "512m"),
    }
}

#[async_trait]
impl Provisioner for DockerProvisioner {
    async fn start(&self, spec: &StartSpec) -> Result<ProvisionerHandle> {
        let container_name = format!("ride-{}", spec.ride_id);
        let (cpus, memory) = resource_limits(spec.priority);

        let output = Command::new("docker")
            .args([
                "run",
                "-d",
                "--name",
                &container_name,
                "-p",
                &format!("{}:{}", spec.host_port, self.internal_port),
                "--cpus",
                cpus,
                "--memory",
                memory,
                "-e",
                &format!("RIDE_ID={}", spec.ride_id),
                "-e",
                &format!("RIDE_USER_ID={}", spec.user_id),
                "-e",
                &format!("RIDE_PICKUP={}", spec.pickup),
                "-e",
                &format!("RIDE_DROP={}", spec.drop),
                &self.image,
            ])
            .output()
            .await?;

        if !output.status.success() {
            return Err(ProvisionerError::StartFailed(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }

        let container_id = String::from_utf8_lossy(&output.stdout).trim().to_string();
        debug!(ride_id = spec.ride_id, %container_id, "container started");

        Ok(ProvisionerHandle {
            container_id,
            container_name,
        })
    }

    async fn stop(&self, handle: &ProvisionerHandle) -> Result<()> {
        let stop = Command::new("docker")
            .args(["stop", &handle.container_name])
            .output()
            .await?;

        if !stop.status.success() {
            return Err(ProvisionerError::StopFailed(
                String::from_utf8_lossy(&stop.stderr).trim().to_string(),
            ));
        }

        let rm = Command::new("docker")
            .args(["rm", &handle.container_name])
            .output()
            .await?;

        if !rm.status.success() {
            return Err(ProvisionerError::StopFailed(
                String::from_utf8_lossy(&rm.stderr).trim().to_string(),
            ));
        }

        Ok(())
    }

    async fn logs(&self, handle: &ProvisionerHandle, tail: usize) -> Result<String> {
        let output = Command::new("docker")
            .args(["logs", "--tail", &tail.to_string(), &handle.container_name])
            .output()
            .await?;

        if !output.status.success() {
            return Err(ProvisionerError::LogsUnavailable(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}
