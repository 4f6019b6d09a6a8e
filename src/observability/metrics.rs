use prometheus::{
    Encoder, HistogramVec, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub assignments_total: IntCounterVec,
    pub rides_in_queue: IntGauge,
    pub running_containers: IntGauge,
    pub provision_latency_seconds: HistogramVec,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let assignments_total = IntCounterVec::new(
            Opts::new("assignments_total", "Total driver assignments by outcome"),
            &["outcome"],
        )
        .expect("valid assignments_total metric");

        let rides_in_queue = IntGauge::new("rides_in_queue", "Rides currently awaiting assignment")
            .expect("valid rides_in_queue metric");

        let running_containers =
            IntGauge::new("running_containers", "Ride containers currently running")
                .expect("valid running_containers metric");

        let provision_latency_seconds = HistogramVec::new(
            prometheus::HistogramOpts::new(
                "provision_latency_seconds",
                "Latency of container provisioning in seconds",
            ),
            &["outcome"],
        )
        .expect("valid provision_latency_seconds metric");

        registry
            .register(Box::new(assignments_total.clone()))
            .expect("register assignments_total");
        registry
            .register(Box::new(rides_in_queue.clone()))
            .expect("register rides_in_queue");
        registry
            .register(Box::new(running_containers.clone()))
            .expect("register running_containers");
        registry
            .register(Box::new(provision_latency_seconds.clone()))
            .expect("register provision_latency_seconds");

        Self {
            registry,
            assignments_total,
            rides_in_queue,
            running_containers,
            provision_latency_seconds,
        }
    }

    pub fn encode(&self) -> Result<String, String> {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();

        TextEncoder::new()
            .encode(&metric_families, &mut buffer)
            .map_err(|err| format!("failed to encode metrics: {err}"))?;

        String::from_utf8(buffer).map_err(|err| format!("metrics are not valid utf8: {err}"))
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
