//! # Capability Dispatch
//!
//! The closed set of agent capabilities and the registry resolving each one
//! to its handler. Requests carry a free-form capability label; it is parsed
//! against [`Capability`] at dispatch so the downstream match is exhaustive
//! and an unknown label fails immediately without touching the transport.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::invoker::{InvokeError, InvokeOptions, ReliableInvoker};

use super::types::TaskRequest;

/// A named unit of remote-executable agent logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Content enrichment (entities, related links, summaries of sources)
    Enrich,
    /// Content validation (links, schema, policy)
    Validate,
    /// Tag suggestion and assignment
    Tag,
    /// Article summarization
    Summarize,
}

impl Capability {
    pub const ALL: [Capability; 4] = [
        Capability::Enrich,
        Capability::Validate,
        Capability::Tag,
        Capability::Summarize,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Enrich => "enrich",
            Self::Validate => "validate",
            Self::Tag => "tag",
            Self::Summarize => "summarize",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Capability {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "enrich" | "enrichment" => Ok(Self::Enrich),
            "validate" | "validation" => Ok(Self::Validate),
            "tag" | "tagging" => Ok(Self::Tag),
            "summarize" | "summarization" => Ok(Self::Summarize),
            _ => Err(format!("Invalid capability: {s}")),
        }
    }
}

/// What a capability handler produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionOutcome {
    pub data: Value,
    pub confidence: Option<f64>,
}

impl ActionOutcome {
    pub fn new(data: Value) -> Self {
        Self {
            data,
            confidence: None,
        }
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = Some(confidence);
        self
    }
}

/// Opaque handler for one capability. The enrichment/validation business
/// logic lives behind this seam; the orchestrator only routes to it.
#[async_trait]
pub trait AgentAction: Send + Sync {
    /// Capability this handler serves
    fn capability(&self) -> Capability;

    /// Execute the handler for `request`, calling out through `invoker`
    async fn run(
        &self,
        invoker: &ReliableInvoker,
        request: &TaskRequest,
    ) -> Result<ActionOutcome, InvokeError>;
}

/// Registry mapping each capability to its handler.
#[derive(Default)]
pub struct CapabilityRegistry {
    handlers: HashMap<Capability, Arc<dyn AgentAction>>,
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry wired with [`RemoteAgentAction`] handlers for every
    /// capability, using the conventional `agent-<capability>` function
    /// names.
    pub fn with_remote_handlers() -> Self {
        let mut registry = Self::new();
        for capability in Capability::ALL {
            registry.register(Arc::new(RemoteAgentAction::new(
                capability,
                format!("agent-{}", capability.as_str()),
            )));
        }
        registry
    }

    /// Register a handler under its declared capability, replacing any
    /// previous one.
    pub fn register(&mut self, handler: Arc<dyn AgentAction>) {
        self.handlers.insert(handler.capability(), handler);
    }

    pub fn resolve(&self, capability: Capability) -> Option<Arc<dyn AgentAction>> {
        self.handlers.get(&capability).cloned()
    }

    pub fn capabilities(&self) -> Vec<Capability> {
        self.handlers.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

/// Stock handler that forwards a task to a named remote function.
///
/// The payload is `{parent_id, action, metadata}`; per-request timeout and
/// retry overrides pass through to the invoker, and identical requests are
/// deduplicated under `parent_id:action`. A top-level `confidence` number in
/// the response, when present, is surfaced on the outcome.
pub struct RemoteAgentAction {
    capability: Capability,
    function: String,
}

impl RemoteAgentAction {
    pub fn new(capability: Capability, function: impl Into<String>) -> Self {
        Self {
            capability,
            function: function.into(),
        }
    }

    pub fn function_name(&self) -> &str {
        &self.function
    }
}

#[async_trait]
impl AgentAction for RemoteAgentAction {
    fn capability(&self) -> Capability {
        self.capability
    }

    async fn run(
        &self,
        invoker: &ReliableInvoker,
        request: &TaskRequest,
    ) -> Result<ActionOutcome, InvokeError> {
        let payload = json!({
            "parent_id": request.parent_id,
            "action": request.action,
            "metadata": request.metadata,
        });

        let mut options = InvokeOptions::default()
            .with_dedup_key(format!("{}:{}", request.parent_id, request.action));
        if let Some(timeout) = request.timeout {
            options = options.with_timeout(timeout);
        }
        if let Some(max_retries) = request.max_retries {
            options = options.with_max_retries(max_retries);
        }

        let raw = invoker.invoke(&self.function, payload, options).await?;
        let confidence = raw.get("confidence").and_then(Value::as_f64);
        Ok(ActionOutcome { data: raw, confidence })
    }
}
