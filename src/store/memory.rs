//! In-memory task store for tests and embedded deployments.

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use std::collections::HashMap;
use uuid::Uuid;

use crate::state_machine::BackgroundTaskState;

use super::{BackgroundTask, NewBackgroundTask, StoreError, TaskStore};

#[derive(Default)]
pub struct InMemoryTaskStore {
    rows: RwLock<HashMap<Uuid, BackgroundTask>>,
}

impl InMemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rows.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.read().is_empty()
    }
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    async fn insert(&self, task: NewBackgroundTask) -> Result<BackgroundTask, StoreError> {
        let now = Utc::now();
        let row = BackgroundTask {
            id: Uuid::new_v4(),
            parent_id: task.parent_id,
            capability: task.capability,
            status: BackgroundTaskState::Pending.to_string(),
            priority: task.priority.to_string(),
            payload: task.payload,
            retry_count: 0,
            max_retries: task.max_retries,
            created_at: now,
            updated_at: now,
            next_attempt_at: None,
            last_attempt_at: None,
            error_message: None,
        };
        self.rows.write().insert(row.id, row.clone());
        Ok(row)
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Option<BackgroundTask>, StoreError> {
        Ok(self.rows.read().get(&id).cloned())
    }

    async fn list_by_parent(&self, parent_id: &str) -> Result<Vec<BackgroundTask>, StoreError> {
        let mut rows: Vec<BackgroundTask> = self
            .rows
            .read()
            .values()
            .filter(|row| row.parent_id == parent_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows)
    }

    async fn count_by_status(&self, status: BackgroundTaskState) -> Result<i64, StoreError> {
        let label = status.to_string();
        Ok(self
            .rows
            .read()
            .values()
            .filter(|row| row.status == label)
            .count() as i64)
    }
}
