//! # Audit Trail
//!
//! Append-only audit records for task attempts and outcomes, written through
//! an external [`AuditSink`].
//!
//! Audit writes must never fail or slow down the primary operation, so all
//! recording goes through [`AuditHandle`]: a clonable handle over a bounded
//! channel drained by a detached forwarder task. When the buffer is full or
//! the sink errors, the record is dropped with a warning.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::constants::DEFAULT_AUDIT_BUFFER_SIZE;

/// A single audit entry describing a task attempt or its outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    /// Capability label the entry concerns
    pub capability: String,
    /// Sub-operation label, used for grouping
    pub action: String,
    /// Domain entity the task concerns
    pub parent_id: String,
    /// What happened
    pub outcome: AuditOutcome,
    /// Opaque context carried alongside the entry
    pub metadata: HashMap<String, Value>,
    /// When the entry was recorded
    pub recorded_at: DateTime<Utc>,
}

/// Outcome discriminator for an audit record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum AuditOutcome {
    /// Work was started or enqueued
    Attempt,
    /// Work finished successfully
    Success { confidence: Option<f64> },
    /// Work failed terminally
    Failure { error: String },
}

impl AuditRecord {
    pub fn new(
        capability: impl Into<String>,
        action: impl Into<String>,
        parent_id: impl Into<String>,
        outcome: AuditOutcome,
        metadata: HashMap<String, Value>,
    ) -> Self {
        Self {
            capability: capability.into(),
            action: action.into(),
            parent_id: parent_id.into(),
            outcome,
            metadata,
            recorded_at: Utc::now(),
        }
    }
}

/// Error types for audit recording
#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    #[error("Audit sink unavailable: {0}")]
    SinkUnavailable(String),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// External append-only log of task attempts and outcomes.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, record: AuditRecord) -> Result<(), AuditError>;
}

/// Sink that emits audit records as structured log events.
///
/// Default wiring for deployments without an external audit log.
#[derive(Debug, Default)]
pub struct TracingAuditSink;

#[async_trait]
impl AuditSink for TracingAuditSink {
    async fn record(&self, record: AuditRecord) -> Result<(), AuditError> {
        info!(
            capability = %record.capability,
            action = %record.action,
            parent_id = %record.parent_id,
            outcome = ?record.outcome,
            recorded_at = %record.recorded_at.to_rfc3339(),
            "🧾 AUDIT_RECORD"
        );
        Ok(())
    }
}

/// Fire-and-forget sender side of the audit path.
///
/// Cheap to clone; every `record_*` call is non-blocking. The forwarder task
/// spawned by [`AuditHandle::spawn`] owns the sink and drains the buffer.
#[derive(Debug, Clone)]
pub struct AuditHandle {
    tx: mpsc::Sender<AuditRecord>,
}

impl AuditHandle {
    /// Spawn a forwarder task draining a buffer of `capacity` records into
    /// `sink` and return the handle feeding it. Must be called from within a
    /// tokio runtime.
    pub fn spawn(sink: Arc<dyn AuditSink>, capacity: usize) -> Self {
        let (tx, mut rx) = mpsc::channel::<AuditRecord>(capacity);
        tokio::spawn(async move {
            while let Some(record) = rx.recv().await {
                if let Err(error) = sink.record(record).await {
                    warn!(error = %error, "audit record rejected by sink, dropping");
                }
            }
        });
        Self { tx }
    }

    /// Spawn with the default buffer capacity.
    pub fn spawn_default(sink: Arc<dyn AuditSink>) -> Self {
        Self::spawn(sink, DEFAULT_AUDIT_BUFFER_SIZE)
    }

    /// Record that work was started or enqueued.
    pub fn record_attempt(
        &self,
        capability: &str,
        action: &str,
        parent_id: &str,
        metadata: HashMap<String, Value>,
    ) {
        self.send(AuditRecord::new(
            capability,
            action,
            parent_id,
            AuditOutcome::Attempt,
            metadata,
        ));
    }

    /// Record a successful outcome.
    pub fn record_success(
        &self,
        capability: &str,
        action: &str,
        parent_id: &str,
        confidence: Option<f64>,
        metadata: HashMap<String, Value>,
    ) {
        self.send(AuditRecord::new(
            capability,
            action,
            parent_id,
            AuditOutcome::Success { confidence },
            metadata,
        ));
    }

    /// Record a terminal failure.
    pub fn record_failure(
        &self,
        capability: &str,
        action: &str,
        parent_id: &str,
        error: &str,
        metadata: HashMap<String, Value>,
    ) {
        self.send(AuditRecord::new(
            capability,
            action,
            parent_id,
            AuditOutcome::Failure {
                error: error.to_string(),
            },
            metadata,
        ));
    }

    fn send(&self, record: AuditRecord) {
        if let Err(error) = self.tx.try_send(record) {
            warn!(error = %error, "audit buffer full or closed, record dropped");
        }
    }
}
