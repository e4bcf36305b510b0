//! # Persisted Task Store
//!
//! Contract for the external system of record holding background task rows.
//! The orchestrator only ever inserts rows in the pending state and reads
//! them back; all further mutation belongs to the worker that executes the
//! queue.
//!
//! Two adapters ship with the crate: [`PgTaskStore`] over PostgreSQL and
//! [`InMemoryTaskStore`] for tests and embedded deployments.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use thiserror::Error;
use uuid::Uuid;

use crate::orchestrator::types::TaskPriority;
use crate::state_machine::BackgroundTaskState;

pub use memory::InMemoryTaskStore;
pub use postgres::PgTaskStore;

/// Errors surfaced by task store adapters.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(error: sqlx::Error) -> Self {
        StoreError::Database(error.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(error: serde_json::Error) -> Self {
        StoreError::Serialization(error.to_string())
    }
}

/// A persisted background task row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct BackgroundTask {
    pub id: Uuid,
    pub parent_id: String,
    pub capability: String,
    /// Lifecycle state as stored; parse through [`BackgroundTask::state`]
    pub status: String,
    pub priority: String,
    /// Original request metadata plus `action` and `enqueued_at`
    pub payload: Value,
    pub retry_count: i32,
    pub max_retries: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub next_attempt_at: Option<DateTime<Utc>>,
    pub last_attempt_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
}

impl BackgroundTask {
    /// Typed view of the status column; `None` if the row holds a label this
    /// core does not know.
    pub fn state(&self) -> Option<BackgroundTaskState> {
        self.status.parse().ok()
    }
}

/// Insert shape for a new background task row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewBackgroundTask {
    pub parent_id: String,
    pub capability: String,
    pub priority: TaskPriority,
    pub payload: Value,
    pub max_retries: i32,
}

/// External CRUD store for background task rows.
///
/// Every operation is a single atomic call; adapters perform no
/// multi-statement transactions.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Insert a new row in the pending state with a zero retry count.
    async fn insert(&self, task: NewBackgroundTask) -> Result<BackgroundTask, StoreError>;

    /// Fetch a row by its id.
    async fn get_by_id(&self, id: Uuid) -> Result<Option<BackgroundTask>, StoreError>;

    /// Fetch all rows for a parent entity, newest first.
    async fn list_by_parent(&self, parent_id: &str) -> Result<Vec<BackgroundTask>, StoreError>;

    /// Count rows currently in `status`.
    async fn count_by_status(&self, status: BackgroundTaskState) -> Result<i64, StoreError>;
}
