use crate::schema::workflows;
use diesel::{AsChangeset, Identifiable, Insertable, Queryable};
use serde::{Deserialize, Serialize};

/// Represents a workflow checkpoint in the database
#[derive(
    Debug, Clone, Serialize, Deserialize, Queryable, Identifiable, AsChangeset, Insertable,
)]
#[diesel(table_name = workflows, primary_key(thread_id))]
pub struct WorkflowRecord {
    /// Opaque workflow identifier
    pub thread_id: String,
    /// Phase at checkpoint time, kept in its own column for filtering
    pub phase: String,
    /// JSON serialized agent state
    pub state: String,
    /// Timestamp when the workflow was created
    pub created_at: String,
    /// Timestamp of the last checkpoint
    pub updated_at: String,
}
