#![allow(clippy::doc_markdown)] // Allow technical terms like PostgreSQL, JSONB in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Agent Task Core
//!
//! Reliable task execution core for agent-driven content enrichment: a
//! retrying remote invocation layer plus a task orchestrator with a
//! persisted background queue.
//!
//! ## Overview
//!
//! The surrounding application is a content/knowledge-base dashboard whose
//! enrichment, validation, tagging and summarization jobs run against remote,
//! possibly-flaky compute functions. This crate is the layer that makes those
//! calls dependable and routes the work:
//!
//! - the **reliable invoker** wraps a single remote call with a timeout race,
//!   classification-aware exponential-backoff retry, an optional fallback and
//!   time-windowed deduplication of identical calls;
//! - the **task orchestrator** accepts task requests and either executes them
//!   inline through the invoker or persists them to a background queue worked
//!   by an external process, tracking in-flight load against an advisory
//!   concurrency ceiling and recording every outcome to an audit sink.
//!
//! Execution is at-least-once; idempotency is the callee's contract.
//!
//! ## Module Organization
//!
//! - [`invoker`] - Timeout, retry, backoff and deduplication around a remote call
//! - [`orchestrator`] - Task intake, capability dispatch and concurrency bookkeeping
//! - [`store`] - Persisted background task contract with Postgres and in-memory adapters
//! - [`state_machine`] - Background task lifecycle states
//! - [`audit`] - Best-effort append-only audit trail
//! - [`config`] - Configuration management
//! - [`error`] - Structured error handling
//! - [`logging`] - Structured logging setup
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use agent_task_core::{
//!     AuditHandle, CapabilityRegistry, InMemoryTaskStore, ReliableInvoker, RemoteFunction,
//!     TaskCoreConfig, TaskOrchestrator, TaskRequest, TracingAuditSink,
//! };
//! use std::sync::Arc;
//!
//! # async fn example(transport: Arc<dyn RemoteFunction>) -> Result<(), Box<dyn std::error::Error>> {
//! let config = TaskCoreConfig::default();
//! let audit = AuditHandle::spawn(Arc::new(TracingAuditSink), config.audit.buffer_size);
//! let invoker = Arc::new(ReliableInvoker::with_config(transport, config.invoker.clone()));
//!
//! let orchestrator = TaskOrchestrator::new(
//!     CapabilityRegistry::with_remote_handlers(),
//!     invoker,
//!     Arc::new(InMemoryTaskStore::new()),
//!     audit,
//!     &config.orchestrator,
//! );
//!
//! let result = orchestrator
//!     .submit(TaskRequest::new("doc-42", "enrich").with_action("enrich-entities"))
//!     .await;
//! println!("task {} success={}", result.task_id, result.success);
//! # Ok(())
//! # }
//! ```

pub mod audit;
pub mod config;
pub mod constants;
pub mod error;
pub mod invoker;
pub mod logging;
pub mod orchestrator;
pub mod state_machine;
pub mod store;

pub use audit::{AuditError, AuditHandle, AuditOutcome, AuditRecord, AuditSink, TracingAuditSink};
pub use config::{
    AuditConfig, DatabaseConfig, InvokerConfig, OrchestratorConfig, TaskCoreConfig,
};
pub use error::{Result, TaskCoreError, TaskCoreResult};
pub use invoker::{
    AuditScope, InvokeError, InvokeOptions, ReliableInvoker, RemoteFunction, RetryClass,
};
pub use orchestrator::capability::{
    ActionOutcome, AgentAction, Capability, CapabilityRegistry, RemoteAgentAction,
};
pub use orchestrator::types::{QueueStatus, TaskPriority, TaskRequest, TaskResult};
pub use orchestrator::TaskOrchestrator;
pub use state_machine::BackgroundTaskState;
pub use store::{
    BackgroundTask, InMemoryTaskStore, NewBackgroundTask, PgTaskStore, StoreError, TaskStore,
};
