//! Backend selection and failover for inference calls.
//!
//! The router only reads health through a [`HealthHandle`]; it never writes
//! health itself, so the monitor stays the single writer.

use crate::errors::{BackendError, FailedAttempt, RouterError};
use crate::health::{HealthHandle, HealthStatus};
use crate::llm::{ChatMessage, InferenceBackend};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// An inference call and the capabilities the serving backend must have
#[derive(Debug, Clone)]
pub struct RouteRequest {
    pub capabilities: Vec<String>,
    pub messages: Vec<ChatMessage>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status", content = "reason")]
pub enum AttemptOutcome {
    Succeeded,
    Failed(String),
}

/// One call against one backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attempt {
    pub backend: String,
    pub outcome: AttemptOutcome,
    pub elapsed_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteResult {
    pub backend_used: String,
    pub output: String,
    /// Every attempt made, the successful one last
    pub attempts: Vec<Attempt>,
}

#[derive(Debug)]
pub struct ModelRouter {
    backends: Vec<Arc<dyn InferenceBackend>>,
    health: HealthHandle,
    max_retries: usize,
    /// Per-backend overrides of `max_retries`
    backend_retries: HashMap<String, usize>,
    rotation: AtomicUsize,
}

impl ModelRouter {
    pub fn new(
        backends: Vec<Arc<dyn InferenceBackend>>,
        health: HealthHandle,
        max_retries: usize,
    ) -> Self {
        Self {
            backends,
            health,
            max_retries,
            backend_retries: HashMap::new(),
            rotation: AtomicUsize::new(0),
        }
    }

    /// Sets retry budgets for named backends
    pub fn with_backend_retries(
        mut self,
        retries: impl IntoIterator<Item = (String, usize)>,
    ) -> Self {
        self.backend_retries.extend(retries);
        self
    }

    /// Failovers allowed when `backend` is the first choice
    pub fn retries_for(&self, backend: &str) -> usize {
        self.backend_retries
            .get(backend)
            .copied()
            .unwrap_or(self.max_retries)
    }

    pub fn backend_count(&self) -> usize {
        self.backends.len()
    }

    pub fn health(&self) -> &HealthHandle {
        &self.health
    }

    /// Usable backends for `capabilities`, best first.
    ///
    /// Healthy beats degraded, then lower observed latency wins. Unreachable
    /// backends are never returned. Backends tied on both keys are rotated
    /// round-robin across calls.
    pub fn candidates(
        &self,
        capabilities: &[String],
    ) -> Result<Vec<Arc<dyn InferenceBackend>>, RouterError> {
        let snapshot = self.health.snapshot();
        let mut ranked: Vec<((HealthStatus, Duration), Arc<dyn InferenceBackend>)> = self
            .backends
            .iter()
            .filter(|b| {
                capabilities
                    .iter()
                    .all(|cap| b.capabilities().iter().any(|c| c == cap))
            })
            .filter_map(|b| {
                let (status, latency) = snapshot
                    .get(b.name())
                    .map(|h| (h.status, h.latency))
                    .unwrap_or((HealthStatus::Healthy, None));
                if status == HealthStatus::Unreachable {
                    return None;
                }
                Some(((status, latency.unwrap_or(Duration::MAX)), Arc::clone(b)))
            })
            .collect();

        if ranked.is_empty() {
            return Err(RouterError::NoBackendAvailable {
                capabilities: capabilities.to_vec(),
            });
        }

        ranked.sort_by_key(|(key, _)| *key);
        let turn = self.rotation.fetch_add(1, Ordering::Relaxed);
        let mut start = 0;
        while start < ranked.len() {
            let key = ranked[start].0;
            let end = ranked[start..]
                .iter()
                .position(|(k, _)| *k != key)
                .map_or(ranked.len(), |p| start + p);
            let group = &mut ranked[start..end];
            let len = group.len();
            group.rotate_left(turn % len);
            start = end;
        }

        Ok(ranked.into_iter().map(|(_, b)| b).collect())
    }

    /// Sends the request to the best candidate, failing over to the next one
    /// on a retryable error. The first choice's retry budget applies.
    pub async fn route(&self, request: RouteRequest) -> Result<RouteResult, RouterError> {
        let candidates = self.candidates(&request.capabilities)?;
        let retries = candidates
            .first()
            .map_or(self.max_retries, |b| self.retries_for(b.name()));
        let budget = (retries + 1).min(candidates.len());

        let mut attempts = Vec::new();
        let mut failures = Vec::new();
        for (n, backend) in candidates.into_iter().take(budget).enumerate() {
            let started = Instant::now();
            let timeout = backend.timeout();
            let result = match tokio::time::timeout(timeout, backend.complete(request.messages.clone()))
                .await
            {
                Ok(r) => r,
                Err(_) => Err(BackendError::Timeout(timeout)),
            };
            let elapsed_ms = started.elapsed().as_millis() as u64;

            match result {
                Ok(output) => {
                    info!(
                        "Attempt {} on backend {} succeeded in {}ms",
                        n + 1,
                        backend.name(),
                        elapsed_ms
                    );
                    attempts.push(Attempt {
                        backend: backend.name().to_string(),
                        outcome: AttemptOutcome::Succeeded,
                        elapsed_ms,
                    });
                    return Ok(RouteResult {
                        backend_used: backend.name().to_string(),
                        output,
                        attempts,
                    });
                }
                Err(e) => {
                    warn!(
                        "Attempt {} on backend {} failed after {}ms: {}",
                        n + 1,
                        backend.name(),
                        elapsed_ms,
                        e
                    );
                    attempts.push(Attempt {
                        backend: backend.name().to_string(),
                        outcome: AttemptOutcome::Failed(e.to_string()),
                        elapsed_ms,
                    });
                    failures.push(FailedAttempt {
                        backend: backend.name().to_string(),
                        reason: e.to_string(),
                    });
                    if !e.is_retryable() {
                        break;
                    }
                }
            }
        }

        Err(RouterError::BackendExhausted { attempts: failures })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::HealthSnapshot;
    use async_trait::async_trait;

    #[derive(Debug)]
    struct StaticBackend {
        name: String,
        caps: Vec<String>,
    }

    #[async_trait]
    impl InferenceBackend for StaticBackend {
        fn name(&self) -> &str {
            &self.name
        }
        fn capabilities(&self) -> &[String] {
            &self.caps
        }
        fn timeout(&self) -> Duration {
            Duration::from_secs(1)
        }
        async fn complete(&self, _messages: Vec<ChatMessage>) -> Result<String, BackendError> {
            Ok(self.name.clone())
        }
        async fn probe(&self) -> Result<(), BackendError> {
            Ok(())
        }
    }

    fn backend(name: &str, caps: &[&str]) -> Arc<dyn InferenceBackend> {
        Arc::new(StaticBackend {
            name: name.to_string(),
            caps: caps.iter().map(|c| c.to_string()).collect(),
        })
    }

    fn names(list: &[Arc<dyn InferenceBackend>]) -> Vec<String> {
        list.iter().map(|b| b.name().to_string()).collect()
    }

    fn caps(list: &[&str]) -> Vec<String> {
        list.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn prefers_healthy_then_latency() {
        let snapshot = HealthSnapshot::default()
            .with("slow", HealthStatus::Healthy, Some(Duration::from_millis(300)))
            .with("fast", HealthStatus::Healthy, Some(Duration::from_millis(10)))
            .with("shaky", HealthStatus::Degraded, Some(Duration::from_millis(1)))
            .with("dead", HealthStatus::Unreachable, Some(Duration::from_millis(1)));
        let router = ModelRouter::new(
            vec![
                backend("slow", &["general"]),
                backend("fast", &["general"]),
                backend("shaky", &["general"]),
                backend("dead", &["general"]),
            ],
            HealthHandle::fixed(snapshot),
            1,
        );
        let order = names(&router.candidates(&caps(&["general"])).unwrap());
        assert_eq!(order, vec!["fast", "slow", "shaky"]);
    }

    #[test]
    fn filters_by_capability() {
        let router = ModelRouter::new(
            vec![backend("a", &["general"]), backend("b", &["general", "code"])],
            HealthHandle::fixed(HealthSnapshot::default()),
            1,
        );
        assert_eq!(names(&router.candidates(&caps(&["code"])).unwrap()), vec!["b"]);
        assert!(matches!(
            router.candidates(&caps(&["vision"])),
            Err(RouterError::NoBackendAvailable { .. })
        ));
    }

    #[test]
    fn only_unreachable_fails_fast() {
        let snapshot = HealthSnapshot::default().with("a", HealthStatus::Unreachable, None);
        let router = ModelRouter::new(
            vec![backend("a", &["general"])],
            HealthHandle::fixed(snapshot),
            1,
        );
        assert!(matches!(
            router.candidates(&caps(&["general"])),
            Err(RouterError::NoBackendAvailable { .. })
        ));
    }

    #[test]
    fn backend_retries_override_the_default() {
        let router = ModelRouter::new(
            vec![backend("a", &[]), backend("b", &[])],
            HealthHandle::fixed(HealthSnapshot::default()),
            1,
        )
        .with_backend_retries([("a".to_string(), 3)]);
        assert_eq!(router.retries_for("a"), 3);
        assert_eq!(router.retries_for("b"), 1);
    }

    #[test]
    fn ties_rotate_round_robin() {
        let router = ModelRouter::new(
            vec![backend("a", &[]), backend("b", &[]), backend("c", &[])],
            HealthHandle::fixed(HealthSnapshot::default()),
            1,
        );
        let firsts: Vec<String> = (0..6)
            .map(|_| names(&router.candidates(&[]).unwrap())[0].clone())
            .collect();
        assert_eq!(firsts, vec!["a", "b", "c", "a", "b", "c"]);
    }
}
