//! # Core Constants
//!
//! Core-wide defaults and limits shared by the reliable invoker, the task
//! orchestrator and the audit path. Configuration structs seed their
//! `Default` impls from these values.

/// Default per-attempt timeout for a remote invocation, in milliseconds.
pub const DEFAULT_INVOKE_TIMEOUT_MS: u64 = 10_000;

/// Default number of retries after the first invocation attempt.
pub const DEFAULT_INVOKE_MAX_RETRIES: u32 = 2;

/// Default base delay between invocation attempts, in milliseconds.
pub const DEFAULT_RETRY_DELAY_MS: u64 = 1_000;

/// Ceiling applied to any computed backoff delay, in milliseconds.
pub const MAX_RETRY_DELAY_MS: u64 = 30_000;

/// Default window during which identical invocations are deduplicated,
/// in milliseconds.
pub const DEFAULT_DEDUP_WINDOW_MS: u64 = 5_000;

/// Absolute size cap for the invocation cache; oldest entries are evicted
/// past this point.
pub const MAX_CACHE_ENTRIES: usize = 1_024;

/// Backoff multiplier for timeout, network and 5xx-equivalent failures.
pub const SOFT_BACKOFF_MULTIPLIER: f64 = 1.5;

/// Backoff multiplier for all other invocation failures.
pub const STANDARD_BACKOFF_MULTIPLIER: f64 = 2.0;

/// Default retry budget recorded on a task when the caller does not set one.
pub const DEFAULT_TASK_MAX_RETRIES: u32 = 3;

/// Default advisory ceiling on concurrently running foreground tasks.
pub const DEFAULT_MAX_CONCURRENT_TASKS: usize = 3;

/// Default capacity of the audit record buffer.
pub const DEFAULT_AUDIT_BUFFER_SIZE: usize = 1_000;
