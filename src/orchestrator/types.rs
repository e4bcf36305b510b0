//! # Orchestrator Types
//!
//! Request/result shapes shared by callers of the task orchestrator.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use uuid::Uuid;

use crate::constants::DEFAULT_TASK_MAX_RETRIES;
use crate::error::TaskCoreError;

/// Advisory ordering hint for background processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    Low,
    Medium,
    High,
    Critical,
}

impl Default for TaskPriority {
    fn default() -> Self {
        Self::Medium
    }
}

impl std::fmt::Display for TaskPriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
            Self::Critical => write!(f, "critical"),
        }
    }
}

impl std::str::FromStr for TaskPriority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "critical" => Ok(Self::Critical),
            _ => Err(format!("Invalid task priority: {s}")),
        }
    }
}

/// The unit of work a caller wants performed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRequest {
    /// Domain entity the task concerns, opaque to this core
    pub parent_id: String,
    /// Capability label, parsed against the closed capability set at dispatch
    pub capability: String,
    /// Sub-operation label, free text used for logging and audit grouping
    pub action: String,
    /// Advisory ordering hint for background processing
    pub priority: TaskPriority,
    /// Opaque payload passed through to the capability handler
    pub metadata: HashMap<String, Value>,
    /// Per-task override of the invocation timeout
    pub timeout: Option<Duration>,
    /// Per-task override of the retry budget
    pub max_retries: Option<u32>,
    /// Execute via the persisted background queue instead of inline
    pub background: bool,
}

impl TaskRequest {
    /// Create a foreground request with default action and priority.
    pub fn new(parent_id: impl Into<String>, capability: impl Into<String>) -> Self {
        Self {
            parent_id: parent_id.into(),
            capability: capability.into(),
            action: "process".to_string(),
            priority: TaskPriority::default(),
            metadata: HashMap::new(),
            timeout: None,
            max_retries: None,
            background: false,
        }
    }

    /// Set the sub-operation label
    pub fn with_action<S: Into<String>>(mut self, action: S) -> Self {
        self.action = action.into();
        self
    }

    /// Set the priority hint
    pub fn with_priority(mut self, priority: TaskPriority) -> Self {
        self.priority = priority;
        self
    }

    /// Add a metadata entry
    pub fn with_metadata<K: Into<String>>(mut self, key: K, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Override the invocation timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Override the retry budget
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    /// Route through the persisted background queue
    pub fn background(mut self) -> Self {
        self.background = true;
        self
    }

    /// Retry budget with the core-wide default applied.
    pub fn effective_max_retries(&self) -> u32 {
        self.max_retries.unwrap_or(DEFAULT_TASK_MAX_RETRIES)
    }

    /// Check required fields.
    pub fn validate(&self) -> Result<(), TaskCoreError> {
        if self.parent_id.trim().is_empty() {
            return Err(TaskCoreError::ValidationError(
                "parent_id must not be empty".to_string(),
            ));
        }
        if self.capability.trim().is_empty() {
            return Err(TaskCoreError::ValidationError(
                "capability must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Outcome of a submission.
///
/// Foreground submissions report the work's own outcome; background
/// submissions report only whether the enqueue write succeeded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskResult {
    pub success: bool,
    /// Locally generated correlation id, unique per submission
    pub task_id: String,
    pub data: Option<Value>,
    pub error: Option<String>,
    /// Persisted row id, set only in background mode
    pub background_task_id: Option<Uuid>,
    /// Elapsed handler time, set only in foreground mode
    pub execution_time_ms: Option<u64>,
}

impl TaskResult {
    /// Foreground completion.
    pub fn completed(task_id: String, data: Option<Value>, execution_time_ms: u64) -> Self {
        Self {
            success: true,
            task_id,
            data,
            error: None,
            background_task_id: None,
            execution_time_ms: Some(execution_time_ms),
        }
    }

    /// Terminal failure in either mode.
    pub fn failed(
        task_id: String,
        error: impl Into<String>,
        execution_time_ms: Option<u64>,
    ) -> Self {
        Self {
            success: false,
            task_id,
            data: None,
            error: Some(error.into()),
            background_task_id: None,
            execution_time_ms,
        }
    }

    /// Successful background enqueue.
    pub fn queued(task_id: String, background_task_id: Uuid) -> Self {
        Self {
            success: true,
            task_id,
            data: None,
            error: None,
            background_task_id: Some(background_task_id),
            execution_time_ms: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.success
    }
}

/// Snapshot of orchestrator load for callers deciding whether to submit
/// more synchronous work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueStatus {
    /// Accepted foreground tasks not yet running
    pub declared: usize,
    /// Foreground tasks currently running
    pub running: usize,
    /// Background rows still pending in the persisted store
    pub pending_background: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_defaults() {
        let request = TaskRequest::new("doc-1", "enrich");
        assert_eq!(request.priority, TaskPriority::Medium);
        assert_eq!(request.effective_max_retries(), DEFAULT_TASK_MAX_RETRIES);
        assert!(!request.background);
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_request_builder() {
        let request = TaskRequest::new("doc-1", "validate")
            .with_action("validate-links")
            .with_priority(TaskPriority::High)
            .with_metadata("source", json!("import"))
            .with_max_retries(1)
            .background();
        assert_eq!(request.action, "validate-links");
        assert_eq!(request.priority, TaskPriority::High);
        assert_eq!(request.metadata["source"], json!("import"));
        assert_eq!(request.effective_max_retries(), 1);
        assert!(request.background);
    }

    #[test]
    fn test_request_validation() {
        assert!(TaskRequest::new("", "enrich").validate().is_err());
        assert!(TaskRequest::new("doc-1", "  ").validate().is_err());
    }

    #[test]
    fn test_priority_string_conversion() {
        assert_eq!(TaskPriority::Critical.to_string(), "critical");
        assert_eq!("high".parse::<TaskPriority>().unwrap(), TaskPriority::High);
        assert!("urgent".parse::<TaskPriority>().is_err());
    }

    #[test]
    fn test_result_constructors() {
        let completed = TaskResult::completed("t1".to_string(), Some(json!({"ok": true})), 12);
        assert!(completed.is_success());
        assert_eq!(completed.execution_time_ms, Some(12));

        let failed = TaskResult::failed("t2".to_string(), "boom", None);
        assert!(!failed.is_success());
        assert_eq!(failed.error.as_deref(), Some("boom"));

        let queued = TaskResult::queued("t3".to_string(), Uuid::new_v4());
        assert!(queued.is_success());
        assert!(queued.background_task_id.is_some());
        assert!(queued.execution_time_ms.is_none());
    }
}
