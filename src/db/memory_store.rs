use super::WorkflowStore;
use crate::core::AgentState;
use crate::errors::StoreError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Process-local store; keeps serialized checkpoints so loads never alias live state
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl WorkflowStore for MemoryStore {
    async fn save(&self, state: &AgentState) -> Result<(), StoreError> {
        let json = serde_json::to_string(state)?;
        self.entries
            .write()
            .await
            .insert(state.thread_id.clone(), json);
        Ok(())
    }

    async fn load(&self, thread_id: &str) -> Result<Option<AgentState>, StoreError> {
        match self.entries.read().await.get(thread_id) {
            Some(json) => Ok(Some(serde_json::from_str(json)?)),
            None => Ok(None),
        }
    }

    async fn list(&self) -> Result<Vec<AgentState>, StoreError> {
        let entries = self.entries.read().await;
        let mut states = entries
            .values()
            .map(|json| serde_json::from_str::<AgentState>(json))
            .collect::<Result<Vec<_>, _>>()?;
        states.sort_by_key(|s| s.created_at);
        Ok(states)
    }

    async fn delete(&self, thread_id: &str) -> Result<bool, StoreError> {
        Ok(self.entries.write().await.remove(thread_id).is_some())
    }

    async fn purge_terminal_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<String>, StoreError> {
        let mut entries = self.entries.write().await;
        let mut expired = Vec::new();
        for (id, json) in entries.iter() {
            let state: AgentState = serde_json::from_str(json)?;
            if state.phase.is_terminal() && state.updated_at < cutoff {
                expired.push(id.clone());
            }
        }
        for id in &expired {
            entries.remove(id);
        }
        expired.sort();
        Ok(expired)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::WorkflowPhase;
    use chrono::Duration;

    #[tokio::test]
    async fn purges_only_old_terminal_workflows() {
        let store = MemoryStore::new();
        let mut done = AgentState::new("done".into(), "a".into());
        done.set_phase(WorkflowPhase::Completed);
        let running = {
            let mut s = AgentState::new("running".into(), "b".into());
            s.set_phase(WorkflowPhase::Executing);
            s
        };
        store.save(&done).await.unwrap();
        store.save(&running).await.unwrap();

        let purged = store
            .purge_terminal_before(Utc::now() + Duration::seconds(1))
            .await
            .unwrap();
        assert_eq!(purged, vec!["done".to_string()]);
        assert!(store.load("done").await.unwrap().is_none());
        assert!(store.load("running").await.unwrap().is_some());
    }
}
