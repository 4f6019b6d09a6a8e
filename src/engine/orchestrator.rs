use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use chrono::Utc;
use dashmap::DashMap;
use tracing::{info, warn};

use crate::error::AppError;
use crate::models::container::{ContainerInstance, ContainerStatus};
use crate::models::ride::RideRequest;
use crate::observability::metrics::Metrics;
use crate::provision::{Provisioner, ProvisionerHandle, StartSpec};

/// Lowest-free-port allocator over a closed range. Ports return to the pool
/// only on explicit release.
struct PortPool {
    start: u16,
    end: u16,
    allocated: HashSet<u16>,
    // ride ids with a provision in flight, so a concurrent provision for the
    // same ride conflicts before any port is taken.
    pending: HashSet<i64>,
}

impl PortPool {
    fn new(start: u16, end: u16) -> Self {
        Self {
            start,
            end,
            allocated: HashSet::new(),
            pending: HashSet::new(),
        }
    }

    fn allocate(&mut self) -> Option<u16> {
        let port = (self.start..=self.end).find(|port| !self.allocated.contains(port))?;
        self.allocated.insert(port);
        Some(port)
    }

    fn release(&mut self, port: u16) {
        self.allocated.remove(&port);
    }
}

/// Provisions, tracks, and tears down one isolated endpoint per ride.
pub struct ContainerOrchestrator {
    provisioner: Arc<dyn Provisioner>,
    instances: DashMap<i64, (ContainerInstance, ProvisionerHandle)>,
    pool: Mutex<PortPool>,
    provision_timeout: Duration,
    metrics: Metrics,
}

impl ContainerOrchestrator {
    pub fn new(
        provisioner: Arc<dyn Provisioner>,
        port_start: u16,
        port_end: u16,
        provision_timeout: Duration,
        metrics: Metrics,
    ) -> Self {
        Self {
            provisioner,
            instances: DashMap::new(),
            pool: Mutex::new(PortPool::new(port_start, port_end)),
            provision_timeout,
            metrics,
        }
    }

    /// Starts a dedicated endpoint for the ride. On provisioner failure or
    /// timeout the port goes straight back to the pool and no record is kept.
    pub async fn provision(&self, ride: &RideRequest) -> Result<ContainerInstance, AppError> {
        let port = {
            let mut pool = self.pool.lock().expect("port pool lock poisoned");
            if self.instances.contains_key(&ride.id) || pool.pending.contains(&ride.id) {
                return Err(AppError::Conflict(format!(
                    "ride {} already has a running container",
                    ride.id
                )));
            }
            let Some(port) = pool.allocate() else {
                return Err(AppError::ResourceExhausted);
            };
            pool.pending.insert(ride.id);
            port
        };

        let spec = StartSpec {
            ride_id: ride.id,
            host_port: port,
            user_id: ride.user_id,
            pickup: ride.pickup_location.clone(),
            drop: ride.drop_location.clone(),
            priority: ride.priority,
        };

        let started_at = Instant::now();
        let outcome = tokio::time::timeout(self.provision_timeout, self.provisioner.start(&spec))
            .await
            .map_err(|_| AppError::Provision("provisioner timed out".to_string()))
            .and_then(|res| res.map_err(|err| AppError::Provision(err.to_string())));

        let elapsed = started_at.elapsed().as_secs_f64();

        let handle = match outcome {
            Ok(handle) => handle,
            Err(err) => {
                let mut pool = self.pool.lock().expect("port pool lock poisoned");
                pool.release(port);
                pool.pending.remove(&ride.id);
                self.metrics
                    .provision_latency_seconds
                    .with_label_values(&["error"])
                    .observe(elapsed);
                warn!(ride_id = ride.id, error = %err, "container provisioning failed");
                return Err(err);
            }
        };

        let instance = ContainerInstance {
            ride_id: ride.id,
            container_id: handle.container_id.clone(),
            user_id: ride.user_id,
            pickup: ride.pickup_location.clone(),
            drop: ride.drop_location.clone(),
            host_port: port,
            url: format!("http://localhost:{port}"),
            started_at: Utc::now(),
            status: ContainerStatus::Running,
        };

        self.instances
            .insert(ride.id, (instance.clone(), handle));
        self.pool
            .lock()
            .expect("port pool lock poisoned")
            .pending
            .remove(&ride.id);

        self.metrics
            .provision_latency_seconds
            .with_label_values(&["success"])
            .observe(elapsed);
        self.metrics
            .running_containers
            .set(self.instances.len() as i64);

        info!(
            ride_id = ride.id,
            host_port = port,
            container_id = %instance.container_id,
            "container provisioned"
        );

        Ok(instance)
    }

    /// Stops the ride's endpoint. The provisioner stop is best-effort: a
    /// failure is logged and the port is released regardless.
    pub async fn stop(&self, ride_id: i64) -> Result<ContainerInstance, AppError> {
        let (_, (mut instance, handle)) = self.instances.remove(&ride_id).ok_or_else(|| {
            AppError::NotFound(format!("no running container for ride {ride_id}"))
        })?;

        self.teardown(&mut instance, &handle).await;
        Ok(instance)
    }

    /// Teardown variant for ride completion: absent instance is a no-op.
    pub async fn release_for_ride(&self, ride_id: i64) {
        if let Some((_, (mut instance, handle))) = self.instances.remove(&ride_id) {
            self.teardown(&mut instance, &handle).await;
        }
    }

    pub fn get(&self, ride_id: i64) -> Result<ContainerInstance, AppError> {
        self.instances
            .get(&ride_id)
            .map(|entry| entry.value().0.clone())
            .ok_or_else(|| AppError::NotFound(format!("no running container for ride {ride_id}")))
    }

    pub fn list(&self) -> Vec<ContainerInstance> {
        let mut instances: Vec<ContainerInstance> = self
            .instances
            .iter()
            .map(|entry| entry.value().0.clone())
            .collect();
        instances.sort_by_key(|i| i.ride_id);
        instances
    }

    pub async fn logs(&self, ride_id: i64, tail: usize) -> Result<String, AppError> {
        let handle = self
            .instances
            .get(&ride_id)
            .map(|entry| entry.value().1.clone())
            .ok_or_else(|| AppError::NotFound(format!("no running container for ride {ride_id}")))?;

        self.provisioner
            .logs(&handle, tail)
            .await
            .map_err(|err| AppError::Provision(err.to_string()))
    }

    /// Stops every running instance. Individual stop failures are logged and
    /// never abort the sweep; every port is released.
    pub async fn cleanup_all(&self) -> usize {
        let ride_ids: Vec<i64> = self.instances.iter().map(|entry| *entry.key()).collect();

        let mut stopped = 0;
        for ride_id in ride_ids {
            if let Some((_, (mut instance, handle))) = self.instances.remove(&ride_id) {
                self.teardown(&mut instance, &handle).await;
                stopped += 1;
            }
        }

        info!(stopped, "container cleanup finished");
        stopped
    }

    async fn teardown(&self, instance: &mut ContainerInstance, handle: &ProvisionerHandle) {
        if let Err(err) = self.provisioner.stop(handle).await {
            warn!(
                ride_id = instance.ride_id,
                container_id = %instance.container_id,
                error = %err,
                "container stop failed; releasing port anyway"
            );
        }

        instance.status = ContainerStatus::Stopped;
        self.pool
            .lock()
            .expect("port pool lock poisoned")
            .release(instance.host_port);
        self.metrics
            .running_containers
            .set(self.instances.len() as i64);

        info!(
            ride_id = instance.ride_id,
            host_port = instance.host_port,
            "container stopped"
        );
    }
}
