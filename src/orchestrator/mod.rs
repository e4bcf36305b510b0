//! # Task Orchestrator
//!
//! Accepts [`TaskRequest`]s and executes them immediately through the
//! reliable invoker (foreground mode) or hands them to the persisted task
//! store for an external worker (background mode), recording outcomes to the
//! audit sink either way.
//!
//! ## Architecture
//!
//! ```text
//!                    ┌──────────────────┐
//!  submit(request)──▶│ TaskOrchestrator │
//!                    └───────┬──────────┘
//!        foreground          │          background
//!  ┌─────────────────────────┴────────────────────────┐
//!  │ CapabilityRegistry ─▶ AgentAction                │
//!  │        │                   │                     │
//!  │        ▼                   ▼                     │
//!  │ ReliableInvoker ─▶ RemoteFunction     TaskStore.insert (pending)
//!  └─────────────────────────┬────────────────────────┘
//!                            ▼
//!                     AuditHandle (best-effort)
//! ```
//!
//! The orchestrator is an explicitly constructed service holding its
//! dependencies; create one per process and share it. `submit` never returns
//! an error and never panics: every failure path becomes a
//! `TaskResult { success: false, error }`.
//!
//! The concurrency ceiling is advisory. Submissions past it proceed with a
//! warning; callers that want backpressure consult [`queue_status`] before
//! submitting more synchronous work.
//!
//! [`queue_status`]: TaskOrchestrator::queue_status

pub mod capability;
pub mod types;

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;
use serde_json::{json, Value};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::audit::AuditHandle;
use crate::config::OrchestratorConfig;
use crate::error::{Result, TaskCoreError};
use crate::invoker::ReliableInvoker;
use crate::logging::log_task_operation;
use crate::state_machine::BackgroundTaskState;
use crate::store::{BackgroundTask, NewBackgroundTask, TaskStore};

use capability::{Capability, CapabilityRegistry};
use types::{QueueStatus, TaskRequest, TaskResult};

/// Process-wide task execution service.
pub struct TaskOrchestrator {
    registry: CapabilityRegistry,
    invoker: Arc<ReliableInvoker>,
    store: Arc<dyn TaskStore>,
    audit: AuditHandle,
    in_flight: Mutex<HashSet<String>>,
    running: AtomicUsize,
    max_concurrent: AtomicUsize,
}

impl TaskOrchestrator {
    pub fn new(
        registry: CapabilityRegistry,
        invoker: Arc<ReliableInvoker>,
        store: Arc<dyn TaskStore>,
        audit: AuditHandle,
        config: &OrchestratorConfig,
    ) -> Self {
        Self {
            registry,
            invoker,
            store,
            audit,
            in_flight: Mutex::new(HashSet::new()),
            running: AtomicUsize::new(0),
            max_concurrent: AtomicUsize::new(config.max_concurrent_tasks),
        }
    }

    /// Adjust the advisory concurrency ceiling at runtime.
    pub fn set_max_concurrent(&self, max_concurrent: usize) {
        self.max_concurrent.store(max_concurrent, Ordering::SeqCst);
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent.load(Ordering::SeqCst)
    }

    /// Submit a task for execution.
    ///
    /// Foreground requests resolve to the work's own outcome with elapsed
    /// time; background requests resolve to an enqueue acknowledgement
    /// carrying the persisted row id. Never returns an error: failures are
    /// reported in the result.
    pub async fn submit(&self, request: TaskRequest) -> TaskResult {
        let task_id = generate_task_id(&request.capability);

        if let Err(error) = request.validate() {
            self.audit.record_failure(
                &request.capability,
                &request.action,
                &request.parent_id,
                &error.to_string(),
                HashMap::new(),
            );
            return TaskResult::failed(task_id, error.to_string(), None);
        }

        self.in_flight.lock().insert(task_id.clone());
        let result = if request.background {
            self.enqueue_background(&task_id, &request).await
        } else {
            self.run_foreground(&task_id, &request).await
        };
        self.in_flight.lock().remove(&task_id);
        result
    }

    async fn run_foreground(&self, task_id: &str, request: &TaskRequest) -> TaskResult {
        self.audit.record_attempt(
            &request.capability,
            &request.action,
            &request.parent_id,
            HashMap::from([
                ("task_id".to_string(), json!(task_id)),
                ("mode".to_string(), json!("foreground")),
            ]),
        );
        log_task_operation(
            "submit",
            task_id,
            &request.parent_id,
            &request.capability,
            "started",
            None,
        );

        let handler = match self.resolve_handler(&request.capability) {
            Ok(handler) => handler,
            Err(error) => {
                return self.fail_task(task_id, request, error.to_string(), None);
            }
        };

        let running = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        let ceiling = self.max_concurrent.load(Ordering::SeqCst);
        if running > ceiling {
            warn!(
                task_id = %task_id,
                running = running,
                max_concurrent = ceiling,
                "foreground concurrency ceiling exceeded, proceeding"
            );
        }

        let started = tokio::time::Instant::now();
        let outcome = handler.run(&self.invoker, request).await;
        self.running.fetch_sub(1, Ordering::SeqCst);
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match outcome {
            Ok(outcome) => {
                self.audit.record_success(
                    &request.capability,
                    &request.action,
                    &request.parent_id,
                    outcome.confidence,
                    HashMap::from([
                        ("task_id".to_string(), json!(task_id)),
                        ("execution_time_ms".to_string(), json!(elapsed_ms)),
                    ]),
                );
                log_task_operation(
                    "submit",
                    task_id,
                    &request.parent_id,
                    &request.capability,
                    "succeeded",
                    None,
                );
                TaskResult::completed(task_id.to_string(), Some(outcome.data), elapsed_ms)
            }
            Err(error) => self.fail_task(task_id, request, error.to_string(), Some(elapsed_ms)),
        }
    }

    async fn enqueue_background(&self, task_id: &str, request: &TaskRequest) -> TaskResult {
        // A row no worker can dispatch is dead weight; reject unknown
        // capabilities before they reach the store.
        let capability = match self.resolve_capability(&request.capability) {
            Ok(capability) => capability,
            Err(error) => {
                return self.fail_task(task_id, request, error.to_string(), None);
            }
        };

        let mut payload = serde_json::Map::new();
        for (key, value) in &request.metadata {
            payload.insert(key.clone(), value.clone());
        }
        payload.insert("action".to_string(), json!(request.action));
        payload.insert("enqueued_at".to_string(), json!(Utc::now().to_rfc3339()));

        let new_task = NewBackgroundTask {
            parent_id: request.parent_id.clone(),
            capability: capability.as_str().to_string(),
            priority: request.priority,
            payload: Value::Object(payload),
            max_retries: request.effective_max_retries() as i32,
        };

        match self.store.insert(new_task).await {
            Ok(row) => {
                self.audit.record_attempt(
                    &request.capability,
                    &request.action,
                    &request.parent_id,
                    HashMap::from([
                        ("task_id".to_string(), json!(task_id)),
                        ("mode".to_string(), json!("background")),
                        ("background_task_id".to_string(), json!(row.id)),
                    ]),
                );
                log_task_operation(
                    "enqueue",
                    task_id,
                    &request.parent_id,
                    &request.capability,
                    "queued",
                    Some(&row.id.to_string()),
                );
                TaskResult::queued(task_id.to_string(), row.id)
            }
            Err(error) => self.fail_task(
                task_id,
                request,
                format!("Failed to enqueue background task: {error}"),
                None,
            ),
        }
    }

    fn fail_task(
        &self,
        task_id: &str,
        request: &TaskRequest,
        error: String,
        elapsed_ms: Option<u64>,
    ) -> TaskResult {
        self.audit.record_failure(
            &request.capability,
            &request.action,
            &request.parent_id,
            &error,
            HashMap::from([("task_id".to_string(), json!(task_id))]),
        );
        log_task_operation(
            "submit",
            task_id,
            &request.parent_id,
            &request.capability,
            "failed",
            Some(&error),
        );
        TaskResult::failed(task_id.to_string(), error, elapsed_ms)
    }

    fn resolve_capability(&self, label: &str) -> Result<Capability> {
        label
            .parse::<Capability>()
            .map_err(|_| TaskCoreError::UnknownCapability(label.to_string()))
    }

    fn resolve_handler(
        &self,
        label: &str,
    ) -> Result<Arc<dyn capability::AgentAction>> {
        let capability = self.resolve_capability(label)?;
        self.registry
            .resolve(capability)
            .ok_or_else(|| TaskCoreError::UnknownCapability(label.to_string()))
    }

    /// Status view of a persisted background task.
    pub async fn background_status(&self, id: Uuid) -> Result<Option<BackgroundTask>> {
        Ok(self.store.get_by_id(id).await?)
    }

    /// All persisted background tasks for a parent entity.
    pub async fn tasks_for_parent(&self, parent_id: &str) -> Result<Vec<BackgroundTask>> {
        Ok(self.store.list_by_parent(parent_id).await?)
    }

    /// Number of background rows still pending.
    pub async fn pending_count(&self) -> Result<i64> {
        Ok(self
            .store
            .count_by_status(BackgroundTaskState::Pending)
            .await?)
    }

    /// Snapshot of current orchestrator load.
    pub async fn queue_status(&self) -> Result<QueueStatus> {
        let running = self.running.load(Ordering::SeqCst);
        let accepted = self.in_flight.lock().len();
        let pending_background = self
            .store
            .count_by_status(BackgroundTaskState::Pending)
            .await?;
        debug!(
            accepted = accepted,
            running = running,
            pending_background = pending_background,
            "queue status sampled"
        );
        Ok(QueueStatus {
            declared: accepted.saturating_sub(running),
            running,
            pending_background,
        })
    }
}

/// Correlation id for one submission: capability label, millisecond
/// timestamp, random suffix.
fn generate_task_id(capability: &str) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!(
        "{}_{}_{}",
        capability,
        Utc::now().timestamp_millis(),
        &suffix[..8]
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_id_shape() {
        let task_id = generate_task_id("enrich");
        let parts: Vec<&str> = task_id.split('_').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "enrich");
        assert!(parts[1].parse::<i64>().is_ok());
        assert_eq!(parts[2].len(), 8);
    }

    #[test]
    fn test_task_ids_are_unique() {
        let ids: HashSet<String> = (0..100).map(|_| generate_task_id("tag")).collect();
        assert_eq!(ids.len(), 100);
    }
}
