mod memory_store;
mod models;
mod sqlite_store;
mod workflow_repository;

use crate::core::AgentState;
use crate::errors::StoreError;
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use diesel::r2d2::{ConnectionManager, Pool, PooledConnection};
use diesel::sqlite::SqliteConnection;
use diesel::RunQueryDsl;
use std::fmt::Debug;
use std::sync::Arc;

pub use memory_store::*;
pub use models::*;
pub use sqlite_store::*;
pub use workflow_repository::*;

const CREATE_WORKFLOWS_TABLE: &str = "CREATE TABLE IF NOT EXISTS workflows (
    thread_id TEXT PRIMARY KEY NOT NULL,
    phase TEXT NOT NULL,
    state TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
)";

/// Durable checkpoints of workflow state
#[async_trait]
pub trait WorkflowStore: Debug + Send + Sync {
    /// Inserts or replaces the checkpoint for `state.thread_id`
    async fn save(&self, state: &AgentState) -> Result<(), StoreError>;
    async fn load(&self, thread_id: &str) -> Result<Option<AgentState>, StoreError>;
    async fn list(&self) -> Result<Vec<AgentState>, StoreError>;
    async fn delete(&self, thread_id: &str) -> Result<bool, StoreError>;
    /// Removes terminal workflows last updated before `cutoff`; returns their ids
    async fn purge_terminal_before(&self, cutoff: DateTime<Utc>)
        -> Result<Vec<String>, StoreError>;
}

/// Timestamps are stored in a fixed UTC format so that they sort as text
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

#[derive(Clone, Debug)]
pub struct Database {
    pool: Arc<Pool<ConnectionManager<SqliteConnection>>>,
}

impl Database {
    /// Opens the pool and creates the schema if needed
    pub fn new(db_path: &str) -> Result<Self, StoreError> {
        let manager = ConnectionManager::<SqliteConnection>::new(db_path);
        let pool = Pool::builder().build(manager)?;
        let database = Database {
            pool: Arc::new(pool),
        };
        diesel::sql_query(CREATE_WORKFLOWS_TABLE).execute(&mut database.get_conn()?)?;
        Ok(database)
    }

    pub fn get_conn(
        &self,
    ) -> Result<PooledConnection<ConnectionManager<SqliteConnection>>, StoreError> {
        Ok(self.pool.get()?)
    }
}
