//! In-memory provisioner for tests: no containers, just bookkeeping, with
//! toggles to simulate start/stop failures and slow starts.

use std::collections::HashSet;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use crate::provision::{Provisioner, ProvisionerError, ProvisionerHandle, Result, StartSpec};

pub struct MockProvisioner {
    started: Mutex<HashSet<String>>,
    stop_calls: AtomicU64,
    fail_start: bool,
    fail_stop: bool,
    start_delay: Option<Duration>,
}

impl Default for MockProvisioner {
    fn default() -> Self {
        Self::new()
    }
}

impl MockProvisioner {
    pub fn new() -> Self {
        Self {
            started: Mutex::new(HashSet::new()),
            stop_calls: AtomicU64::new(0),
            fail_start: false,
            fail_stop: false,
            start_delay: None,
        }
    }

    /// Every start attempt fails, as if the docker daemon rejected the run.
    pub fn failing_start() -> Self {
        Self {
            fail_start: true,
            ..Self::new()
        }
    }

    /// Starts succeed but every stop reports a failure, for exercising the
    /// best-effort teardown paths.
    pub fn failing_stop() -> Self {
        Self {
            fail_stop: true,
            ..Self::new()
        }
    }

    /// Starts hang for `delay`, for exercising the provision timeout.
    pub fn slow(delay: Duration) -> Self {
        Self {
            start_delay: Some(delay),
            ..Self::new()
        }
    }

    pub fn running_count(&self) -> usize {
        self.started.lock().expect("mock lock poisoned").len()
    }

    pub fn stop_calls(&self) -> u64 {
        self.stop_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Provisioner for MockProvisioner {
    async fn start(&self, spec: &StartSpec) -> Result<ProvisionerHandle> {
        if let Some(delay) = self.start_delay {
            tokio::time::sleep(delay).await;
        }

        if self.fail_start {
            return Err(ProvisionerError::StartFailed("mock failure".to_string()));
        }

        let container_name = format!("ride-{}", spec.ride_id);
        self.started
            .lock()
            .expect("mock lock poisoned")
            .insert(container_name.clone());

        Ok(ProvisionerHandle {
            container_id: format!("mock-{}-{}", spec.ride_id, spec.host_port),
            container_name,
        })
    }

    async fn stop(&self, handle: &ProvisionerHandle) -> Result<()> {
        self.stop_calls.fetch_add(1, Ordering::SeqCst);

        if self.fail_stop {
            return Err(ProvisionerError::StopFailed("mock failure".to_string()));
        }

        self.started
            .lock()
            .expect("mock lock poisoned")
            .remove(&handle.container_name);
        Ok(())
    }

    async fn logs(&self, handle: &ProvisionerHandle, tail: usize) -> Result<String> {
        let started = self.started.lock().expect("mock lock poisoned");
        if !started.contains(&handle.container_name) {
            return Err(ProvisionerError::LogsUnavailable(format!(
                "{} is not running",
                handle.container_name
            )));
        }
        Ok(format!("{} log tail ({tail} lines)\n", handle.container_name))
    }
}
