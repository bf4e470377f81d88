use super::{format_timestamp, WorkflowRecord};
use crate::core::{AgentState, WorkflowPhase};
use crate::errors::StoreError;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;

/// Repository for workflow checkpoints in the SQLite database
pub struct WorkflowRepository<'a> {
    /// Database connection
    pub conn: &'a mut SqliteConnection,
}

impl<'a> WorkflowRepository<'a> {
    pub fn new(conn: &'a mut SqliteConnection) -> Self {
        WorkflowRepository { conn }
    }

    /// Inserts the checkpoint, replacing any previous one for the same thread
    ///
    /// # Errors
    ///
    /// Returns a StoreError if serialization or the write fails
    pub fn upsert(&mut self, state: &AgentState) -> Result<(), StoreError> {
        use crate::schema::workflows;

        let record = WorkflowRecord {
            thread_id: state.thread_id.clone(),
            phase: state.phase.to_string(),
            state: serde_json::to_string(state)?,
            created_at: format_timestamp(&state.created_at),
            updated_at: format_timestamp(&state.updated_at),
        };
        diesel::replace_into(workflows::table)
            .values(&record)
            .execute(self.conn)?;
        Ok(())
    }

    pub fn find(&mut self, thread_id: &str) -> Result<Option<AgentState>, StoreError> {
        use crate::schema::workflows;

        let record = workflows::table
            .filter(workflows::thread_id.eq(thread_id))
            .first::<WorkflowRecord>(self.conn)
            .optional()?;
        match record {
            Some(record) => Ok(Some(serde_json::from_str(&record.state)?)),
            None => Ok(None),
        }
    }

    /// All checkpoints, oldest first
    pub fn get_all(&mut self) -> Result<Vec<AgentState>, StoreError> {
        use crate::schema::workflows;

        workflows::table
            .order(workflows::created_at.asc())
            .load::<WorkflowRecord>(self.conn)?
            .into_iter()
            .map(|r| serde_json::from_str(&r.state).map_err(StoreError::from))
            .collect()
    }

    pub fn delete(&mut self, thread_id: &str) -> Result<bool, StoreError> {
        use crate::schema::workflows;

        let deleted = diesel::delete(workflows::table.filter(workflows::thread_id.eq(thread_id)))
            .execute(self.conn)?;
        Ok(deleted > 0)
    }

    /// Deletes terminal checkpoints whose last update precedes `cutoff`
    pub fn delete_terminal_before(
        &mut self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<String>, StoreError> {
        use crate::schema::workflows;

        let terminal: Vec<String> = [
            WorkflowPhase::Completed,
            WorkflowPhase::Rejected,
            WorkflowPhase::Failed,
            WorkflowPhase::Cancelled,
        ]
        .iter()
        .map(|p| p.to_string())
        .collect();
        let cutoff = format_timestamp(&cutoff);

        let expired = self
            .conn
            .transaction::<_, diesel::result::Error, _>(|conn| {
                let expired = workflows::table
                    .filter(workflows::phase.eq_any(terminal))
                    .filter(workflows::updated_at.lt(cutoff.as_str()))
                    .select(workflows::thread_id)
                    .load::<String>(conn)?;
                diesel::delete(workflows::table.filter(workflows::thread_id.eq_any(expired.clone())))
                    .execute(conn)?;
                Ok(expired)
            })?;
        Ok(expired)
    }
}
