//! PostgreSQL task store adapter.
//!
//! ## Database Schema
//!
//! Maps to the `agent_background_tasks` table:
//!
//! ```sql
//! CREATE TABLE agent_background_tasks (
//!   id UUID PRIMARY KEY,
//!   parent_id VARCHAR NOT NULL,
//!   capability VARCHAR NOT NULL,
//!   status VARCHAR NOT NULL DEFAULT 'pending',
//!   priority VARCHAR NOT NULL DEFAULT 'medium',
//!   payload JSONB NOT NULL DEFAULT '{}',
//!   retry_count INTEGER NOT NULL DEFAULT 0,
//!   max_retries INTEGER NOT NULL DEFAULT 3,
//!   created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
//!   updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
//!   next_attempt_at TIMESTAMPTZ,
//!   last_attempt_at TIMESTAMPTZ,
//!   error_message TEXT
//! );
//! CREATE INDEX idx_agent_background_tasks_parent ON agent_background_tasks (parent_id);
//! CREATE INDEX idx_agent_background_tasks_status ON agent_background_tasks (status);
//! ```

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::state_machine::BackgroundTaskState;

use super::{BackgroundTask, NewBackgroundTask, StoreError, TaskStore};

const RETURNING_COLUMNS: &str = "id, parent_id, capability, status, priority, payload, \
     retry_count, max_retries, created_at, updated_at, next_attempt_at, last_attempt_at, \
     error_message";

pub struct PgTaskStore {
    pool: PgPool,
}

impl PgTaskStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TaskStore for PgTaskStore {
    async fn insert(&self, task: NewBackgroundTask) -> Result<BackgroundTask, StoreError> {
        let query = format!(
            "INSERT INTO agent_background_tasks \
             (id, parent_id, capability, status, priority, payload, retry_count, max_retries, \
              created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, 0, $7, NOW(), NOW()) \
             RETURNING {RETURNING_COLUMNS}"
        );
        let row = sqlx::query_as::<_, BackgroundTask>(&query)
            .bind(Uuid::new_v4())
            .bind(&task.parent_id)
            .bind(&task.capability)
            .bind(BackgroundTaskState::Pending.to_string())
            .bind(task.priority.to_string())
            .bind(&task.payload)
            .bind(task.max_retries)
            .fetch_one(&self.pool)
            .await?;
        Ok(row)
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Option<BackgroundTask>, StoreError> {
        let query = format!(
            "SELECT {RETURNING_COLUMNS} FROM agent_background_tasks WHERE id = $1"
        );
        let row = sqlx::query_as::<_, BackgroundTask>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn list_by_parent(&self, parent_id: &str) -> Result<Vec<BackgroundTask>, StoreError> {
        let query = format!(
            "SELECT {RETURNING_COLUMNS} FROM agent_background_tasks \
             WHERE parent_id = $1 ORDER BY created_at DESC"
        );
        let rows = sqlx::query_as::<_, BackgroundTask>(&query)
            .bind(parent_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn count_by_status(&self, status: BackgroundTaskState) -> Result<i64, StoreError> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM agent_background_tasks WHERE status = $1",
        )
        .bind(status.to_string())
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }
}
