use super::snapshot::{HealthHandle, HealthPolicy, HealthSnapshot};
use crate::config::{parse_interval, HealthConfig};
use crate::errors::{BackendError, ConfigError};
use crate::llm::InferenceBackend;
use chrono::Utc;
use futures::future::join_all;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Periodically probes every backend and publishes a fresh snapshot per cycle
#[derive(Debug)]
pub struct HealthMonitor {
    backends: Vec<Arc<dyn InferenceBackend>>,
    policy: HealthPolicy,
    interval: Duration,
    probe_timeout: Duration,
    tx: watch::Sender<Arc<HealthSnapshot>>,
}

impl HealthMonitor {
    pub fn new(
        backends: Vec<Arc<dyn InferenceBackend>>,
        policy: HealthPolicy,
        interval: Duration,
        probe_timeout: Duration,
    ) -> Self {
        let initial = HealthSnapshot::initial(backends.iter().map(|b| b.name()));
        let (tx, _rx) = watch::channel(Arc::new(initial));
        Self {
            backends,
            policy,
            // tokio intervals panic on a zero period
            interval: interval.max(MIN_INTERVAL),
            probe_timeout,
            tx,
        }
    }

    pub fn from_config(
        backends: Vec<Arc<dyn InferenceBackend>>,
        config: &HealthConfig,
    ) -> Result<Self, ConfigError> {
        let policy = HealthPolicy {
            unreachable_after: config.unreachable_after,
            recover_after: config.recover_after,
        };
        Ok(Self::new(
            backends,
            policy,
            parse_interval("health.interval", &config.interval)?,
            parse_interval("health.probe_timeout", &config.probe_timeout)?,
        ))
    }

    /// A read handle onto the snapshots this monitor publishes
    pub fn handle(&self) -> HealthHandle {
        HealthHandle::new(self.tx.subscribe())
    }

    /// Runs one probe cycle against all backends concurrently and publishes the result.
    ///
    /// A probe that errors or exceeds the probe timeout counts as one failure;
    /// there is no retry inside a cycle.
    pub async fn probe_once(&self) -> Arc<HealthSnapshot> {
        let outcomes = join_all(self.backends.iter().map(|backend| {
            let backend = Arc::clone(backend);
            let timeout = self.probe_timeout;
            async move {
                let started = Instant::now();
                let outcome = match tokio::time::timeout(timeout, backend.probe()).await {
                    Ok(Ok(())) => Ok(started.elapsed()),
                    Ok(Err(e)) => Err(e),
                    Err(_) => Err(BackendError::Timeout(timeout)),
                };
                (backend.name().to_string(), outcome)
            }
        }))
        .await;

        let previous = self.tx.borrow().clone();
        let mut next = (*previous).clone();
        for (name, outcome) in outcomes {
            let entry = next
                .backends
                .entry(name.clone())
                .or_insert_with(|| super::BackendHealth::unknown(&name));
            let before = entry.status;
            match outcome {
                Ok(latency) => {
                    debug!("Probe ok for backend {} in {:?}", name, latency);
                    entry.record_success(latency, &self.policy);
                }
                Err(e) => {
                    warn!("Probe failed for backend {}: {}", name, e);
                    entry.record_failure(e.to_string(), &self.policy);
                }
            }
            if entry.status != before {
                info!(
                    "Backend {} health changed: {} -> {}",
                    name, before, entry.status
                );
            }
        }
        next.taken_at = Some(Utc::now());
        next.cycle = previous.cycle + 1;

        let next = Arc::new(next);
        self.tx.send_replace(Arc::clone(&next));
        next
    }

    /// Probes forever on the configured interval
    pub async fn run(self) {
        info!(
            "Health monitor started for {} backend(s), interval {:?}",
            self.backends.len(),
            self.interval
        );
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            self.probe_once().await;
        }
    }

    /// Spawns [`HealthMonitor::run`] and returns the read handle with the task
    pub fn spawn(self) -> (HealthHandle, JoinHandle<()>) {
        let handle = self.handle();
        (handle, tokio::spawn(self.run()))
    }
}
