use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Liveness class of a backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unreachable,
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            HealthStatus::Healthy => "healthy",
            HealthStatus::Degraded => "degraded",
            HealthStatus::Unreachable => "unreachable",
        };
        f.write_str(s)
    }
}

/// Thresholds driving health transitions
#[derive(Debug, Clone, Copy)]
pub struct HealthPolicy {
    /// Consecutive failures before unreachable
    pub unreachable_after: u32,
    /// Consecutive successes before a degraded backend is healthy again
    pub recover_after: u32,
}

impl Default for HealthPolicy {
    fn default() -> Self {
        Self {
            unreachable_after: 3,
            recover_after: 2,
        }
    }
}

/// Latest known health of one backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackendHealth {
    pub name: String,
    pub status: HealthStatus,
    /// Round-trip time of the last successful probe
    #[serde(with = "latency_ms")]
    pub latency: Option<Duration>,
    pub last_checked: Option<DateTime<Utc>>,
    pub consecutive_failures: u32,
    pub consecutive_successes: u32,
    pub last_error: Option<String>,
}

impl BackendHealth {
    /// A backend nobody probed yet is assumed healthy
    pub fn unknown(name: &str) -> Self {
        Self {
            name: name.to_string(),
            status: HealthStatus::Healthy,
            latency: None,
            last_checked: None,
            consecutive_failures: 0,
            consecutive_successes: 0,
            last_error: None,
        }
    }

    pub fn record_success(&mut self, latency: Duration, policy: &HealthPolicy) {
        self.consecutive_failures = 0;
        self.consecutive_successes = self.consecutive_successes.saturating_add(1);
        self.latency = Some(latency);
        self.last_checked = Some(Utc::now());
        self.last_error = None;
        self.status = match self.status {
            HealthStatus::Unreachable => HealthStatus::Degraded,
            HealthStatus::Degraded if self.consecutive_successes >= policy.recover_after => {
                HealthStatus::Healthy
            }
            other => other,
        };
    }

    pub fn record_failure(&mut self, error: String, policy: &HealthPolicy) {
        self.consecutive_successes = 0;
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.last_checked = Some(Utc::now());
        self.last_error = Some(error);
        self.status = if self.consecutive_failures >= policy.unreachable_after {
            HealthStatus::Unreachable
        } else if self.status == HealthStatus::Healthy {
            HealthStatus::Degraded
        } else {
            self.status
        };
    }
}

/// Immutable view of every backend's health after one probe cycle
#[derive(Debug, Clone, Default, Serialize)]
pub struct HealthSnapshot {
    pub backends: BTreeMap<String, BackendHealth>,
    pub taken_at: Option<DateTime<Utc>>,
    /// Number of completed probe cycles
    pub cycle: u64,
}

impl HealthSnapshot {
    pub fn initial<'a>(names: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            backends: names
                .into_iter()
                .map(|n| (n.to_string(), BackendHealth::unknown(n)))
                .collect(),
            taken_at: None,
            cycle: 0,
        }
    }

    pub fn get(&self, name: &str) -> Option<&BackendHealth> {
        self.backends.get(name)
    }

    /// Builder used by tests and static deployments
    pub fn with(mut self, name: &str, status: HealthStatus, latency: Option<Duration>) -> Self {
        let mut health = BackendHealth::unknown(name);
        health.status = status;
        health.latency = latency;
        self.backends.insert(name.to_string(), health);
        self
    }
}

/// Read side of the health snapshot channel
#[derive(Debug, Clone)]
pub struct HealthHandle {
    rx: watch::Receiver<Arc<HealthSnapshot>>,
}

impl HealthHandle {
    pub(crate) fn new(rx: watch::Receiver<Arc<HealthSnapshot>>) -> Self {
        Self { rx }
    }

    /// A handle that always reads the same snapshot
    pub fn fixed(snapshot: HealthSnapshot) -> Self {
        let (_tx, rx) = watch::channel(Arc::new(snapshot));
        Self { rx }
    }

    /// Latest completed snapshot; never blocks on a probe
    pub fn snapshot(&self) -> Arc<HealthSnapshot> {
        self.rx.borrow().clone()
    }

    /// Waits until the monitor publishes a new snapshot
    pub async fn changed(&mut self) -> bool {
        self.rx.changed().await.is_ok()
    }
}

mod latency_ms {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => s.serialize_some(&(d.as_millis() as u64)),
            None => s.serialize_none(),
        }
    }
}
