use std::sync::Arc;

use crate::config::Config;
use crate::engine::matcher::DispatchMatcher;
use crate::engine::orchestrator::ContainerOrchestrator;
use crate::engine::queue::RideQueue;
use crate::engine::registry::DriverRegistry;
use crate::engine::rides::RideStore;
use crate::observability::metrics::Metrics;
use crate::provision::Provisioner;

/// Owns the dispatch components. The provisioner is injected so the shell
/// decides the isolation technology; everything else is constructed here.
pub struct AppState {
    pub registry: Arc<DriverRegistry>,
    pub queue: Arc<RideQueue>,
    pub rides: Arc<RideStore>,
    pub matcher: DispatchMatcher,
    pub orchestrator: ContainerOrchestrator,
    pub metrics: Metrics,
}

impl AppState {
    pub fn new(config: &Config, provisioner: Arc<dyn Provisioner>) -> Self {
        let registry = Arc::new(DriverRegistry::new());
        let queue = Arc::new(RideQueue::new());
        let rides = Arc::new(RideStore::new());
        let metrics = Metrics::new();

        let matcher = DispatchMatcher::new(
            registry.clone(),
            queue.clone(),
            rides.clone(),
            config.avg_speed_kmph,
        );

        let orchestrator = ContainerOrchestrator::new(
            provisioner,
            config.container_port_start,
            config.container_port_end,
            config.provision_timeout,
            metrics.clone(),
        );

        Self {
            registry,
            queue,
            rides,
            matcher,
            orchestrator,
            metrics,
        }
    }
}
