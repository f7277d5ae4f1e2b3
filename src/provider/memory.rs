//! In-memory agent provider
//!
//! Replays scripted outcomes in order and records every request it
//! receives. Used for tests and for embedding the client without network
//! access.

use super::{AgentProvider, EventStream, InvokeRequest, ProviderInfo};
use crate::error::{AgentError, Result};
use crate::types::AgentEvent;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::Mutex;

/// One scripted reply
pub enum Scripted {
    /// The request succeeds; the stream yields these items in order
    Events(Vec<Result<AgentEvent>>),

    /// The request itself fails
    Error(AgentError),
}

/// Identity reported by the memory provider
#[derive(Debug, Clone)]
pub struct MemoryConfig {
    pub agent_id: String,
    pub agent_alias_id: String,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            agent_id: "MEMORYAGENT".to_string(),
            agent_alias_id: "TSTALIASID".to_string(),
        }
    }
}

/// Scripted in-memory provider
///
/// When the script runs dry, the fallback reply (if any) is served;
/// otherwise the request fails with a service error.
#[derive(Clone, Default)]
pub struct MemoryProvider {
    config: MemoryConfig,
    script: Arc<Mutex<VecDeque<Scripted>>>,
    requests: Arc<Mutex<Vec<InvokeRequest>>>,
    fallback: Option<String>,
}

impl MemoryProvider {
    /// Create a provider with the given identity
    pub fn new(config: MemoryConfig) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    /// Serve `text` whenever the script is empty
    pub fn with_fallback(mut self, text: impl Into<String>) -> Self {
        self.fallback = Some(text.into());
        self
    }

    /// Queue a reply made of the given events
    pub async fn push_events(&self, events: Vec<AgentEvent>) {
        let items = events.into_iter().map(Ok).collect();
        self.script.lock().await.push_back(Scripted::Events(items));
    }

    /// Queue a plain text reply
    pub async fn push_text(&self, text: impl Into<String>) {
        self.push_events(vec![AgentEvent::Chunk(text.into())]).await;
    }

    /// Queue a request-level failure
    pub async fn push_error(&self, error: AgentError) {
        self.script.lock().await.push_back(Scripted::Error(error));
    }

    /// Queue an arbitrary scripted reply (e.g. a stream failing mid-way)
    pub async fn push(&self, scripted: Scripted) {
        self.script.lock().await.push_back(scripted);
    }

    /// Requests received so far, oldest first
    pub async fn requests(&self) -> Vec<InvokeRequest> {
        self.requests.lock().await.clone()
    }

    /// Number of requests received so far
    pub async fn request_count(&self) -> usize {
        self.requests.lock().await.len()
    }

    /// Scripted replies not consumed yet
    pub async fn pending(&self) -> usize {
        self.script.lock().await.len()
    }
}

#[async_trait]
impl AgentProvider for MemoryProvider {
    async fn invoke(&self, request: &InvokeRequest) -> Result<Box<dyn EventStream>> {
        self.requests.lock().await.push(request.clone());

        let next = self.script.lock().await.pop_front();
        let items = match next {
            Some(Scripted::Events(items)) => items,
            Some(Scripted::Error(error)) => return Err(error),
            None => match &self.fallback {
                Some(text) => vec![Ok(AgentEvent::Chunk(text.clone()))],
                None => {
                    return Err(AgentError::service(
                        "memoryProvider",
                        "no scripted response left",
                    ))
                }
            },
        };

        tracing::debug!(
            session_id = %request.session_id,
            events = items.len(),
            "Serving scripted response"
        );

        Ok(Box::new(MemoryStream {
            items: items.into(),
        }))
    }

    fn info(&self) -> ProviderInfo {
        ProviderInfo {
            provider: "memory".to_string(),
            agent_id: self.config.agent_id.clone(),
            agent_alias_id: self.config.agent_alias_id.clone(),
            region: "local".to_string(),
        }
    }

    fn name(&self) -> &str {
        "memory"
    }
}

struct MemoryStream {
    items: VecDeque<Result<AgentEvent>>,
}

#[async_trait]
impl EventStream for MemoryStream {
    async fn next(&mut self) -> Result<Option<AgentEvent>> {
        self.items.pop_front().transpose()
    }
}
