//! Agent provider trait: the transport seam for agent backends
//!
//! Every backend (the Bedrock agent runtime, the in-memory test double)
//! implements `AgentProvider`. The `AgentClient` drives a provider and
//! never looks at transport details.

use crate::error::Result;
use crate::types::AgentEvent;
use async_trait::async_trait;

pub mod bedrock;
pub mod memory;

/// A single conversational request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvokeRequest {
    /// Session identifier shared by all turns of a conversation
    pub session_id: String,

    /// Natural-language input
    pub input_text: String,

    /// Ask the agent to emit trace events
    pub enable_trace: bool,
}

impl InvokeRequest {
    /// Create a request with tracing enabled
    pub fn new(session_id: impl Into<String>, input_text: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            input_text: input_text.into(),
            enable_trace: true,
        }
    }
}

/// Core trait for agent backends
///
/// One `invoke` call is one network request. Retrying is the caller's
/// business; providers only report what happened, with a structured
/// `ErrorKind` on every error.
#[async_trait]
pub trait AgentProvider: Send + Sync {
    /// Send a request and return the stream of events in the response body
    async fn invoke(&self, request: &InvokeRequest) -> Result<Box<dyn EventStream>>;

    /// Identity of the agent behind this provider
    fn info(&self) -> ProviderInfo;

    /// Provider name (e.g., "bedrock", "memory")
    fn name(&self) -> &str;
}

/// Async event stream of one agent response
#[async_trait]
pub trait EventStream: Send {
    /// Receive the next event, `None` once the response is complete
    async fn next(&mut self) -> Result<Option<AgentEvent>>;
}

/// Identity of the agent a provider talks to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderInfo {
    /// Provider name
    pub provider: String,
    /// Agent identifier
    pub agent_id: String,
    /// Agent alias identifier
    pub agent_alias_id: String,
    /// Region or other locality hint
    pub region: String,
}
