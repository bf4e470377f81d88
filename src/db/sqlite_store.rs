use super::{Database, WorkflowRepository, WorkflowStore};
use crate::core::AgentState;
use crate::errors::StoreError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Checkpoints kept in a SQLite file through diesel
#[derive(Debug, Clone)]
pub struct SqliteStore {
    db: Database,
}

impl SqliteStore {
    pub fn open(path: &str) -> Result<Self, StoreError> {
        Ok(Self {
            db: Database::new(path)?,
        })
    }
}

#[async_trait]
impl WorkflowStore for SqliteStore {
    async fn save(&self, state: &AgentState) -> Result<(), StoreError> {
        let mut conn = self.db.get_conn()?;
        WorkflowRepository::new(&mut conn).upsert(state)
    }

    async fn load(&self, thread_id: &str) -> Result<Option<AgentState>, StoreError> {
        let mut conn = self.db.get_conn()?;
        WorkflowRepository::new(&mut conn).find(thread_id)
    }

    async fn list(&self) -> Result<Vec<AgentState>, StoreError> {
        let mut conn = self.db.get_conn()?;
        WorkflowRepository::new(&mut conn).get_all()
    }

    async fn delete(&self, thread_id: &str) -> Result<bool, StoreError> {
        let mut conn = self.db.get_conn()?;
        WorkflowRepository::new(&mut conn).delete(thread_id)
    }

    async fn purge_terminal_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<String>, StoreError> {
        let mut conn = self.db.get_conn()?;
        WorkflowRepository::new(&mut conn).delete_terminal_before(cutoff)
    }
}
