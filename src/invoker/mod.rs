//! # Reliable Invoker
//!
//! Wraps a single remote function call with a timeout race, classified
//! exponential-backoff retry, optional fallback and time-windowed
//! deduplication of identical calls.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐    ┌──────────────────┐    ┌────────────────┐
//! │ Caller     │───▶│ ReliableInvoker  │───▶│ RemoteFunction │
//! │ (+options) │    │ timeout / retry  │    │ (transport)    │
//! └────────────┘    │ dedup / fallback │    └────────────────┘
//!                   └──────────────────┘
//!                       │          │
//!                InvocationCache  AuditHandle (best-effort)
//! ```
//!
//! Deduplicated callers converge on one shared execution future: within the
//! dedup window the remote function runs at most once per `name + key`, and
//! whoever arrives after it settles receives the settled result. Only the
//! installing caller's options drive execution; later callers just await.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use agent_task_core::invoker::{InvokeOptions, ReliableInvoker, RemoteFunction};
//! use serde_json::json;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # async fn example(transport: Arc<dyn RemoteFunction>) -> Result<(), Box<dyn std::error::Error>> {
//! let invoker = ReliableInvoker::new(transport);
//!
//! let options = InvokeOptions::default()
//!     .with_timeout(Duration::from_secs(5))
//!     .with_max_retries(2)
//!     .with_dedup_key("doc-42:enrich");
//!
//! let result = invoker.invoke("agent-enrich", json!({"doc": 42}), options).await?;
//! # Ok(())
//! # }
//! ```

mod cache;
pub mod classifier;

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::FutureExt;
use serde_json::{json, Value};
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::audit::AuditHandle;
use crate::config::InvokerConfig;

use cache::InvocationCache;
pub use classifier::{backoff_delay, RetryClass};

/// Abstract transport for calling a named remote function with a JSON
/// payload. Implementations classify their own failures as transient or
/// permanent; timeouts are produced by the invoker.
#[async_trait]
pub trait RemoteFunction: Send + Sync {
    async fn invoke(&self, name: &str, payload: Value) -> Result<Value, InvokeError>;
}

/// Failure modes of a remote invocation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InvokeError {
    /// The call did not settle within the per-attempt timeout
    #[error("Invocation of '{function}' timed out after {timeout_ms}ms")]
    Timeout { function: String, timeout_ms: u64 },

    /// Network failure or server-side 5xx-equivalent response
    #[error("Transient failure calling '{function}': {reason}")]
    Transient {
        function: String,
        reason: String,
        status: Option<u16>,
    },

    /// Any other remote failure (4xx-equivalent, validation)
    #[error("Invocation of '{function}' failed: {reason}")]
    Permanent {
        function: String,
        reason: String,
        status: Option<u16>,
    },

    /// Terminal: the retry budget is spent; carries the last underlying cause
    #[error("Invocation of '{function}' failed after {attempts} attempts: {source}")]
    RetriesExhausted {
        function: String,
        attempts: u32,
        source: Box<InvokeError>,
    },
}

impl InvokeError {
    /// The underlying cause for terminal errors, the error itself otherwise.
    pub fn original_cause(&self) -> &InvokeError {
        match self {
            InvokeError::RetriesExhausted { source, .. } => source,
            other => other,
        }
    }
}

/// Fallback executed when the retry budget is spent.
pub type FallbackFn = Arc<dyn Fn() -> BoxFuture<'static, Result<Value, InvokeError>> + Send + Sync>;

/// Attribution attached to the final audit entry of an invocation.
#[derive(Debug, Clone)]
pub struct AuditScope {
    pub capability: String,
    pub action: String,
    pub parent_id: String,
}

/// Per-call options; unset fields fall back to the invoker's configured
/// defaults.
#[derive(Clone, Default)]
pub struct InvokeOptions {
    pub timeout: Option<Duration>,
    pub max_retries: Option<u32>,
    pub retry_delay: Option<Duration>,
    pub dedup_key: Option<String>,
    pub dedup_window: Option<Duration>,
    pub fallback: Option<FallbackFn>,
    pub audit_scope: Option<AuditScope>,
}

impl InvokeOptions {
    /// Set the per-attempt timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the number of retries after the first attempt
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    /// Set the base delay between attempts
    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = Some(retry_delay);
        self
    }

    /// Collapse concurrent and recent identical calls under this key
    pub fn with_dedup_key<S: Into<String>>(mut self, dedup_key: S) -> Self {
        self.dedup_key = Some(dedup_key.into());
        self
    }

    /// Override the deduplication window for this call
    pub fn with_dedup_window(mut self, dedup_window: Duration) -> Self {
        self.dedup_window = Some(dedup_window);
        self
    }

    /// Supply a fallback executed when all attempts fail
    pub fn with_fallback<F, Fut>(mut self, fallback: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, InvokeError>> + Send + 'static,
    {
        self.fallback = Some(Arc::new(move || fallback().boxed()));
        self
    }

    /// Attribute the final audit entry to a task
    pub fn with_audit_scope(mut self, scope: AuditScope) -> Self {
        self.audit_scope = Some(scope);
        self
    }
}

impl fmt::Debug for InvokeOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InvokeOptions")
            .field("timeout", &self.timeout)
            .field("max_retries", &self.max_retries)
            .field("retry_delay", &self.retry_delay)
            .field("dedup_key", &self.dedup_key)
            .field("dedup_window", &self.dedup_window)
            .field("fallback", &self.fallback.is_some())
            .field("audit_scope", &self.audit_scope)
            .finish()
    }
}

/// Reliable wrapper around a [`RemoteFunction`] transport.
pub struct ReliableInvoker {
    transport: Arc<dyn RemoteFunction>,
    cache: InvocationCache,
    defaults: InvokerConfig,
    audit: Option<AuditHandle>,
}

impl ReliableInvoker {
    /// Create an invoker with default configuration and no audit handle.
    pub fn new(transport: Arc<dyn RemoteFunction>) -> Self {
        Self::with_config(transport, InvokerConfig::default())
    }

    /// Create an invoker with explicit configuration.
    pub fn with_config(transport: Arc<dyn RemoteFunction>, config: InvokerConfig) -> Self {
        let cache = InvocationCache::new(config.max_cache_entries);
        Self {
            transport,
            cache,
            defaults: config,
            audit: None,
        }
    }

    /// Attach an audit handle; the invoker then records a final audit entry
    /// per settled invocation.
    pub fn with_audit(mut self, audit: AuditHandle) -> Self {
        self.audit = Some(audit);
        self
    }

    /// Number of entries currently held by the invocation cache.
    pub fn cached_invocations(&self) -> usize {
        self.cache.len()
    }

    /// Invoke `name` with `payload`, applying timeout, retry, fallback and
    /// deduplication per `options`.
    pub async fn invoke(
        &self,
        name: &str,
        payload: Value,
        options: InvokeOptions,
    ) -> Result<Value, InvokeError> {
        let execution = Execution {
            transport: Arc::clone(&self.transport),
            audit: self.audit.clone(),
            scope: options.audit_scope.clone(),
            function: name.to_string(),
            payload,
            timeout: options
                .timeout
                .unwrap_or(Duration::from_millis(self.defaults.timeout_ms)),
            max_retries: options.max_retries.unwrap_or(self.defaults.max_retries),
            retry_delay: options
                .retry_delay
                .unwrap_or(Duration::from_millis(self.defaults.retry_delay_ms)),
            fallback: options.fallback.clone(),
        };

        match options.dedup_key {
            Some(key) => {
                let window = options
                    .dedup_window
                    .unwrap_or(Duration::from_millis(self.defaults.dedup_window_ms));
                let cache_key = format!("{name}:{key}");
                let (invocation, installed) = self
                    .cache
                    .get_or_insert_with(&cache_key, window, || execution.run().boxed().shared());
                if !installed {
                    debug!(function = %name, dedup_key = %key, "joining deduplicated invocation");
                }
                let result = invocation.await;
                if installed {
                    self.cache.touch(&cache_key);
                }
                result
            }
            None => execution.run().await,
        }
    }
}

/// One invocation's resolved parameters, owned by its execution future so
/// deduplicated callers can share it.
struct Execution {
    transport: Arc<dyn RemoteFunction>,
    audit: Option<AuditHandle>,
    scope: Option<AuditScope>,
    function: String,
    payload: Value,
    timeout: Duration,
    max_retries: u32,
    retry_delay: Duration,
    fallback: Option<FallbackFn>,
}

impl Execution {
    async fn run(self) -> Result<Value, InvokeError> {
        let started = Instant::now();
        let mut last_error: Option<InvokeError> = None;

        for attempt in 0..=self.max_retries {
            let outcome = tokio::time::timeout(
                self.timeout,
                self.transport.invoke(&self.function, self.payload.clone()),
            )
            .await;

            let error = match outcome {
                Ok(Ok(value)) => {
                    let elapsed_ms = started.elapsed().as_millis() as u64;
                    debug!(
                        function = %self.function,
                        attempt = attempt + 1,
                        elapsed_ms = elapsed_ms,
                        "remote invocation succeeded"
                    );
                    self.audit_success(elapsed_ms);
                    return Ok(value);
                }
                Ok(Err(error)) => error,
                Err(_) => InvokeError::Timeout {
                    function: self.function.clone(),
                    timeout_ms: self.timeout.as_millis() as u64,
                },
            };

            if attempt < self.max_retries {
                let class = RetryClass::of(&error);
                let delay = backoff_delay(self.retry_delay, class, attempt);
                warn!(
                    function = %self.function,
                    attempt = attempt + 1,
                    max_attempts = self.max_retries + 1,
                    retry_class = ?class,
                    delay_ms = delay.as_millis() as u64,
                    error = %error,
                    "remote invocation failed, retrying"
                );
                last_error = Some(error);
                tokio::time::sleep(delay).await;
            } else {
                last_error = Some(error);
            }
        }

        let cause = last_error.unwrap_or_else(|| InvokeError::Permanent {
            function: self.function.clone(),
            reason: "no attempts executed".to_string(),
            status: None,
        });
        let terminal = InvokeError::RetriesExhausted {
            function: self.function.clone(),
            attempts: self.max_retries + 1,
            source: Box::new(cause),
        };
        self.audit_failure(&terminal, started.elapsed().as_millis() as u64);

        if let Some(fallback) = &self.fallback {
            match fallback().await {
                Ok(value) => {
                    warn!(
                        function = %self.function,
                        "all attempts failed, substituting fallback result"
                    );
                    return Ok(value);
                }
                Err(fallback_error) => {
                    warn!(
                        function = %self.function,
                        error = %fallback_error,
                        "fallback failed, surfacing original failure"
                    );
                }
            }
        }

        Err(terminal)
    }

    fn audit_success(&self, elapsed_ms: u64) {
        if let Some(audit) = &self.audit {
            let scope = self.effective_scope();
            let metadata = HashMap::from([("elapsed_ms".to_string(), json!(elapsed_ms))]);
            audit.record_success(
                &scope.capability,
                &scope.action,
                &scope.parent_id,
                None,
                metadata,
            );
        }
    }

    fn audit_failure(&self, error: &InvokeError, elapsed_ms: u64) {
        if let Some(audit) = &self.audit {
            let scope = self.effective_scope();
            let metadata = HashMap::from([("elapsed_ms".to_string(), json!(elapsed_ms))]);
            audit.record_failure(
                &scope.capability,
                &scope.action,
                &scope.parent_id,
                &error.to_string(),
                metadata,
            );
        }
    }

    fn effective_scope(&self) -> AuditScope {
        self.scope.clone().unwrap_or_else(|| AuditScope {
            capability: "invocation".to_string(),
            action: self.function.clone(),
            parent_id: String::new(),
        })
    }
}
