use super::manager::WorkflowManager;
use crate::config::{parse_duration, parse_interval, CleanupConfig};
use crate::db::WorkflowStore;
use crate::errors::{ConfigError, StoreError};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Periodically removes finished workflows past their retention window
#[derive(Debug)]
pub struct CleanupService {
    store: Arc<dyn WorkflowStore>,
    manager: Arc<WorkflowManager>,
    interval: Duration,
    max_age: Duration,
}

impl CleanupService {
    pub fn new(
        store: Arc<dyn WorkflowStore>,
        manager: Arc<WorkflowManager>,
        interval: Duration,
        max_age: Duration,
    ) -> Self {
        Self {
            store,
            manager,
            interval: interval.max(Duration::from_millis(1)),
            max_age,
        }
    }

    pub fn from_config(
        store: Arc<dyn WorkflowStore>,
        manager: Arc<WorkflowManager>,
        config: &CleanupConfig,
    ) -> Result<Self, ConfigError> {
        Ok(Self::new(
            store,
            manager,
            parse_interval("cleanup.interval", &config.interval)?,
            parse_duration("cleanup.max_age", &config.max_age)?,
        ))
    }

    /// Purges once; returns the removed thread ids
    pub async fn run_once(&self) -> Result<Vec<String>, StoreError> {
        let max_age = chrono::Duration::from_std(self.max_age)
            .unwrap_or_else(|_| chrono::Duration::days(36_500));
        let cutoff = Utc::now()
            .checked_sub_signed(max_age)
            .unwrap_or(chrono::DateTime::<Utc>::MIN_UTC);
        let purged = self.store.purge_terminal_before(cutoff).await?;
        let evicted = self.manager.evict(&purged).await;
        if !purged.is_empty() {
            info!(
                "Cleanup removed {} workflow checkpoint(s), {} from memory",
                purged.len(),
                evicted
            );
        }
        Ok(purged)
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if let Err(e) = self.run_once().await {
                    error!("Cleanup failed: {}", e);
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{
        ApprovalDecision, ExecutorRegistry, ManagerSettings, StaticPlanner, SubTask,
        WorkflowPhase,
    };
    use crate::db::MemoryStore;
    use crate::errors::WorkflowError;

    #[tokio::test]
    async fn run_once_purges_store_and_registry() {
        let store: Arc<dyn WorkflowStore> = Arc::new(MemoryStore::new());
        let manager = Arc::new(WorkflowManager::new(
            Arc::new(StaticPlanner::new(vec![SubTask::new(1, "research", "look")])),
            ExecutorRegistry::new(),
            Arc::clone(&store),
            ManagerSettings::default(),
        ));
        let done = manager.create_workflow("old news").await.unwrap();
        manager
            .submit_approval(&done, ApprovalDecision::Reject, None)
            .await
            .unwrap();
        let waiting = manager.create_workflow("still open").await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;

        let cleanup = CleanupService::new(
            Arc::clone(&store),
            Arc::clone(&manager),
            Duration::from_secs(60),
            Duration::ZERO,
        );
        assert_eq!(cleanup.run_once().await.unwrap(), vec![done.clone()]);

        assert!(matches!(
            manager.get_state(&done).await,
            Err(WorkflowError::NotFound(_))
        ));
        assert_eq!(
            manager.get_state(&waiting).await.unwrap().phase,
            WorkflowPhase::AwaitingApproval
        );
        assert!(cleanup.run_once().await.unwrap().is_empty());
    }
}
