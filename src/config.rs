//! # Configuration
//!
//! Serde-backed configuration for the task execution core. Every section has
//! explicit defaults sourced from [`crate::constants`], so an empty
//! configuration file (or none at all) yields a working setup.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use agent_task_core::config::TaskCoreConfig;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Layered load: optional config/task-core file, then TASK_CORE_* env vars
//! let config = TaskCoreConfig::load()?;
//! assert!(config.invoker.timeout_ms > 0);
//! # Ok(())
//! # }
//! ```

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_AUDIT_BUFFER_SIZE, DEFAULT_DEDUP_WINDOW_MS, DEFAULT_INVOKE_MAX_RETRIES,
    DEFAULT_INVOKE_TIMEOUT_MS, DEFAULT_MAX_CONCURRENT_TASKS, DEFAULT_RETRY_DELAY_MS,
    DEFAULT_TASK_MAX_RETRIES, MAX_CACHE_ENTRIES,
};
use crate::error::{Result, TaskCoreError};

/// Root configuration for the task execution core.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskCoreConfig {
    /// Reliable invoker defaults (per-call options override these)
    pub invoker: InvokerConfig,

    /// Orchestrator concurrency and retry bookkeeping
    pub orchestrator: OrchestratorConfig,

    /// Audit buffering
    pub audit: AuditConfig,

    /// Persisted task store connection settings
    pub database: DatabaseConfig,
}

/// Defaults for the reliable invoker.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InvokerConfig {
    /// Per-attempt timeout in milliseconds
    pub timeout_ms: u64,
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Base delay between attempts in milliseconds
    pub retry_delay_ms: u64,
    /// Deduplication window in milliseconds
    pub dedup_window_ms: u64,
    /// Invocation cache size cap
    pub max_cache_entries: usize,
}

impl Default for InvokerConfig {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_INVOKE_TIMEOUT_MS,
            max_retries: DEFAULT_INVOKE_MAX_RETRIES,
            retry_delay_ms: DEFAULT_RETRY_DELAY_MS,
            dedup_window_ms: DEFAULT_DEDUP_WINDOW_MS,
            max_cache_entries: MAX_CACHE_ENTRIES,
        }
    }
}

/// Orchestrator-wide settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Advisory ceiling on concurrently running foreground tasks
    pub max_concurrent_tasks: usize,
    /// Retry budget recorded on tasks that do not set their own
    pub default_task_max_retries: u32,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_concurrent_tasks: DEFAULT_MAX_CONCURRENT_TASKS,
            default_task_max_retries: DEFAULT_TASK_MAX_RETRIES,
        }
    }
}

/// Audit path settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    /// Capacity of the in-process audit record buffer
    pub buffer_size: usize,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            buffer_size: DEFAULT_AUDIT_BUFFER_SIZE,
        }
    }
}

/// Persisted task store connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Connection URL; `None` means the store adapter is wired externally
    pub url: Option<String>,
    /// Connection pool size
    pub pool: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self { url: None, pool: 5 }
    }
}

impl TaskCoreConfig {
    /// Load configuration by layering an optional `config/task-core` file
    /// under `TASK_CORE_*` environment variable overrides.
    pub fn load() -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name("config/task-core").required(false))
            .add_source(config::Environment::with_prefix("TASK_CORE").separator("__"))
            .build()
            .map_err(|e| TaskCoreError::ConfigurationError(e.to_string()))?;

        settings
            .try_deserialize()
            .map_err(|e| TaskCoreError::ConfigurationError(e.to_string()))
    }
}
