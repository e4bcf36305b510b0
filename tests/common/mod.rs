#![allow(dead_code)]

//! Shared fixtures for integration tests: a scripted transport, a recording
//! audit sink and orchestrator wiring over the in-memory store.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use agent_task_core::{
    AuditError, AuditRecord, AuditSink, BackgroundTaskState, CapabilityRegistry,
    InMemoryTaskStore, InvokeError, NewBackgroundTask, OrchestratorConfig, ReliableInvoker,
    RemoteFunction, StoreError, TaskOrchestrator, TaskStore,
};
use agent_task_core::{AuditHandle, BackgroundTask};
use uuid::Uuid;

/// Transport whose first `fail_first` calls fail with a scripted error, with
/// optional per-call latency.
pub struct MockTransport {
    calls: AtomicU32,
    fail_first: u32,
    failure: InvokeError,
    latency: Duration,
    result: Value,
}

impl MockTransport {
    pub fn succeeding(result: Value) -> Self {
        Self {
            calls: AtomicU32::new(0),
            fail_first: 0,
            failure: Self::transient_error(),
            latency: Duration::ZERO,
            result,
        }
    }

    pub fn failing_times(failures: u32, failure: InvokeError, result: Value) -> Self {
        Self {
            calls: AtomicU32::new(0),
            fail_first: failures,
            failure,
            latency: Duration::ZERO,
            result,
        }
    }

    pub fn always_failing(failure: InvokeError) -> Self {
        Self::failing_times(u32::MAX, failure, json!(null))
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn transient_error() -> InvokeError {
        InvokeError::Transient {
            function: "mock".to_string(),
            reason: "connection reset by peer".to_string(),
            status: Some(503),
        }
    }

    pub fn permanent_error() -> InvokeError {
        InvokeError::Permanent {
            function: "mock".to_string(),
            reason: "unprocessable payload".to_string(),
            status: Some(422),
        }
    }
}

#[async_trait]
impl RemoteFunction for MockTransport {
    async fn invoke(&self, _name: &str, _payload: Value) -> Result<Value, InvokeError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        if call < self.fail_first {
            Err(self.failure.clone())
        } else {
            Ok(self.result.clone())
        }
    }
}

/// Audit sink that captures records for assertions.
#[derive(Default)]
pub struct RecordingAuditSink {
    records: Mutex<Vec<AuditRecord>>,
}

impl RecordingAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<AuditRecord> {
        self.records.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }
}

#[async_trait]
impl AuditSink for RecordingAuditSink {
    async fn record(&self, record: AuditRecord) -> Result<(), AuditError> {
        self.records.lock().push(record);
        Ok(())
    }
}

/// Store that rejects every operation.
pub struct FailingTaskStore;

#[async_trait]
impl TaskStore for FailingTaskStore {
    async fn insert(&self, _task: NewBackgroundTask) -> Result<BackgroundTask, StoreError> {
        Err(StoreError::Database("connection refused".to_string()))
    }

    async fn get_by_id(&self, _id: Uuid) -> Result<Option<BackgroundTask>, StoreError> {
        Err(StoreError::Database("connection refused".to_string()))
    }

    async fn list_by_parent(&self, _parent_id: &str) -> Result<Vec<BackgroundTask>, StoreError> {
        Err(StoreError::Database("connection refused".to_string()))
    }

    async fn count_by_status(&self, _status: BackgroundTaskState) -> Result<i64, StoreError> {
        Err(StoreError::Database("connection refused".to_string()))
    }
}

pub struct Fixture {
    pub orchestrator: TaskOrchestrator,
    pub transport: Arc<MockTransport>,
    pub store: Arc<InMemoryTaskStore>,
    pub sink: Arc<RecordingAuditSink>,
}

/// Orchestrator over the in-memory store with remote handlers for every
/// capability.
pub fn orchestrator_with(transport: MockTransport) -> Fixture {
    let transport = Arc::new(transport);
    let sink = Arc::new(RecordingAuditSink::new());
    let store = Arc::new(InMemoryTaskStore::new());
    let audit = AuditHandle::spawn(sink.clone(), 64);
    let invoker = Arc::new(ReliableInvoker::new(transport.clone()));
    let orchestrator = TaskOrchestrator::new(
        CapabilityRegistry::with_remote_handlers(),
        invoker,
        store.clone(),
        audit,
        &OrchestratorConfig::default(),
    );
    Fixture {
        orchestrator,
        transport,
        store,
        sink,
    }
}

/// Orchestrator whose persisted store rejects every write.
pub fn orchestrator_with_failing_store(transport: MockTransport) -> Fixture {
    let transport = Arc::new(transport);
    let sink = Arc::new(RecordingAuditSink::new());
    let audit = AuditHandle::spawn(sink.clone(), 64);
    let invoker = Arc::new(ReliableInvoker::new(transport.clone()));
    let orchestrator = TaskOrchestrator::new(
        CapabilityRegistry::with_remote_handlers(),
        invoker,
        Arc::new(FailingTaskStore),
        audit,
        &OrchestratorConfig::default(),
    );
    Fixture {
        orchestrator,
        transport,
        store: Arc::new(InMemoryTaskStore::new()),
        sink,
    }
}

/// Wait for the audit forwarder to drain at least `n` records.
pub async fn wait_for_audit(sink: &RecordingAuditSink, n: usize) {
    for _ in 0..200 {
        if sink.len() >= n {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("expected {} audit records, have {}", n, sink.len());
}
