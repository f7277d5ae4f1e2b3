//! Agent client: one conversational request with application-level retry

use crate::error::{AgentError, ErrorKind, Result};
use crate::provider::{AgentProvider, InvokeRequest, ProviderInfo};
use crate::retry::{with_retry, AttemptOutcome, RetryConfig};
use crate::types::{AgentEvent, AgentResponse, ResponseMetadata};

/// Session id used by [`AgentClient::verify`]
pub const VERIFY_SESSION_ID: &str = "test-connection";

/// Text and side events aggregated from one response stream
#[derive(Debug, Default)]
struct Aggregated {
    text: String,
    raw_events: Vec<AgentEvent>,
}

/// High-level agent client
///
/// Wraps a provider, turns each request into exactly one `AgentResponse`,
/// and re-sends requests that failed with a timeout or connection error.
pub struct AgentClient {
    provider: Box<dyn AgentProvider>,
    retry: RetryConfig,
}

impl AgentClient {
    /// Create a client with the default policy (2 retries at 1s, 2s)
    pub fn new(provider: impl AgentProvider + 'static) -> Self {
        Self {
            provider: Box::new(provider),
            retry: RetryConfig::default(),
        }
    }

    /// Replace the retry policy
    pub fn with_retry_config(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn retry_config(&self) -> &RetryConfig {
        &self.retry
    }

    /// Get the provider name
    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Identity of the agent behind the provider
    pub fn info(&self) -> ProviderInfo {
        self.provider.info()
    }

    /// Send `message` under `session_id` with the configured retry cap
    pub async fn send(&self, message: &str, session_id: &str) -> AgentResponse {
        self.send_with_retries(message, session_id, self.retry.max_retries)
            .await
    }

    /// Send `message` under `session_id`, retrying at most `max_retries` times
    ///
    /// Never fails: errors come back as an `AgentResponse` with error status,
    /// the error kind, and the number of attempts made. An empty
    /// `session_id` is replaced by a generated one.
    pub async fn send_with_retries(
        &self,
        message: &str,
        session_id: &str,
        max_retries: u32,
    ) -> AgentResponse {
        let session_id = if session_id.is_empty() {
            format!("a3s-chat-{}", chrono::Utc::now().timestamp())
        } else {
            session_id.to_string()
        };
        let request = InvokeRequest::new(session_id.as_str(), message);
        let policy = self.retry.clone().with_max_retries(max_retries);

        tracing::info!(
            session_id = %session_id,
            provider = self.provider.name(),
            chars = message.chars().count(),
            "Sending request to agent"
        );

        let result = with_retry(&policy, |attempt| {
            let request = &request;
            async move {
                tracing::debug!(attempt = attempt + 1, "Invoking agent");
                AttemptOutcome::from_result(self.attempt(request).await)
            }
        })
        .await;

        let info = self.provider.info();
        let metadata = |attempts: u32| ResponseMetadata {
            agent_id: info.agent_id.clone(),
            agent_alias_id: info.agent_alias_id.clone(),
            timestamp: chrono::Utc::now(),
            attempts,
        };

        match result {
            Ok(retried) => {
                tracing::info!(
                    session_id = %session_id,
                    attempts = retried.attempts,
                    events = retried.value.raw_events.len(),
                    "Agent response received"
                );
                AgentResponse::success(
                    retried.value.text,
                    session_id,
                    retried.value.raw_events,
                    metadata(retried.attempts),
                )
            }
            Err(failure) => {
                let kind = failure.error.kind();
                tracing::warn!(
                    session_id = %session_id,
                    attempts = failure.attempts,
                    kind = %kind,
                    error = %failure.error,
                    "Agent request failed"
                );
                let text = if kind == ErrorKind::Malformed {
                    format!("Error processing response: {}", failure.error)
                } else {
                    failure.to_string()
                };
                AgentResponse::failure(text, kind, session_id, metadata(failure.attempts))
            }
        }
    }

    /// One network request, its stream read to the end
    async fn attempt(&self, request: &InvokeRequest) -> Result<Aggregated> {
        let mut stream = self.provider.invoke(request).await?;
        let mut aggregated = Aggregated::default();

        while let Some(event) = stream.next().await? {
            match event {
                AgentEvent::Chunk(text) => aggregated.text.push_str(&text),
                other => {
                    aggregated.raw_events.push(other);
                    tracing::debug!(events = aggregated.raw_events.len(), "Agent side event");
                }
            }
        }

        Ok(aggregated)
    }

    /// Check that the agent is reachable with the configured credentials
    ///
    /// Sends one request under the `test-connection` session. Rejected
    /// credentials and unknown agents are errors, as are transport failures;
    /// any other service error means the agent answered and counts as
    /// reachable.
    pub async fn verify(&self) -> Result<()> {
        let request = InvokeRequest::new(VERIFY_SESSION_ID, "test");
        let result = match self.provider.invoke(&request).await {
            Ok(mut stream) => {
                // Drain so the service finishes the turn
                loop {
                    match stream.next().await {
                        Ok(Some(_)) => continue,
                        Ok(None) => break Ok(()),
                        Err(e) => break Err(e),
                    }
                }
            }
            Err(e) => Err(e),
        };

        match result {
            Ok(()) => {
                tracing::info!(provider = self.provider.name(), "Agent connection verified");
                Ok(())
            }
            Err(e) => match e.kind() {
                ErrorKind::AccessDenied => Err(AgentError::Config(
                    "Invalid AWS credentials or insufficient permissions".to_string(),
                )),
                ErrorKind::NotFound => Err(AgentError::NotFound(format!(
                    "Agent ID {} not found",
                    self.provider.info().agent_id
                ))),
                ErrorKind::Timeout | ErrorKind::Connection | ErrorKind::Config => Err(e),
                _ => {
                    tracing::warn!(error = %e, "Agent reachable but returned an error");
                    Ok(())
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::memory::{MemoryProvider, Scripted};
    use crate::types::ResponseStatus;

    fn fast() -> RetryConfig {
        RetryConfig {
            base_delay_ms: 1,
            max_delay_ms: 2,
            ..RetryConfig::session(2)
        }
    }

    fn client(provider: &MemoryProvider) -> AgentClient {
        AgentClient::new(provider.clone()).with_retry_config(fast())
    }

    // ========================================================================
    // Aggregation
    // ========================================================================

    #[tokio::test]
    async fn test_send_aggregates_chunks_in_order() {
        let provider = MemoryProvider::default();
        provider
            .push_events(vec![
                AgentEvent::Chunk("Hello".into()),
                AgentEvent::Trace(serde_json::json!({"step": 1})),
                AgentEvent::Chunk(", ".into()),
                AgentEvent::ReturnControl(serde_json::json!({"invocationId": "x"})),
                AgentEvent::Chunk("world".into()),
            ])
            .await;

        let response = client(&provider).send("hi", "s-1").await;
        assert_eq!(response.status, ResponseStatus::Success);
        assert_eq!(response.text, "Hello, world");
        assert_eq!(response.raw_events.len(), 2);
        assert!(matches!(response.raw_events[0], AgentEvent::Trace(_)));
        assert!(matches!(response.raw_events[1], AgentEvent::ReturnControl(_)));
        assert_eq!(response.metadata.attempts, 1);
        assert_eq!(response.metadata.agent_id, "MEMORYAGENT");
        assert_eq!(response.session_id, "s-1");
    }

    #[tokio::test]
    async fn test_empty_session_id_generated() {
        let provider = MemoryProvider::default().with_fallback("ok");
        let response = client(&provider).send("hi", "").await;
        assert!(response.session_id.starts_with("a3s-chat-"));
        let requests = provider.requests().await;
        assert_eq!(requests[0].session_id, response.session_id);
    }

    // ========================================================================
    // Retry decisions
    // ========================================================================

    #[tokio::test]
    async fn test_retryable_error_exhausts_attempts() {
        let provider = MemoryProvider::default();
        for _ in 0..5 {
            provider
                .push_error(AgentError::service("dependencyFailedException", "Read timed out"))
                .await;
        }

        let response = client(&provider).send_with_retries("q", "s-1", 2).await;
        assert!(!response.is_success());
        assert_eq!(response.metadata.attempts, 3);
        assert_eq!(provider.request_count().await, 3);
        assert_eq!(response.error_kind, Some(ErrorKind::Timeout));
        assert!(response.text.starts_with("Failed after 3 attempts. Last error:"));
        assert!(response.text.contains("Read timed out"));
    }

    #[tokio::test]
    async fn test_non_retryable_error_single_attempt() {
        let provider = MemoryProvider::default();
        provider
            .push_error(AgentError::AccessDenied("AccessDeniedException".into()))
            .await;

        let response = client(&provider).send("q", "s-1").await;
        assert_eq!(provider.request_count().await, 1);
        assert_eq!(response.metadata.attempts, 1);
        assert_eq!(response.error_kind, Some(ErrorKind::AccessDenied));
    }

    #[tokio::test]
    async fn test_recovers_after_connection_error() {
        let provider = MemoryProvider::default();
        provider
            .push_error(AgentError::Connection("connection reset".into()))
            .await;
        provider.push_text("recovered").await;

        let response = client(&provider).send("q", "s-1").await;
        assert!(response.is_success());
        assert_eq!(response.text, "recovered");
        assert_eq!(response.metadata.attempts, 2);

        let requests = provider.requests().await;
        assert!(requests
            .iter()
            .all(|r| r.session_id == "s-1" && r.input_text == "q"));
    }

    #[tokio::test]
    async fn test_mid_stream_timeout_retries() {
        let provider = MemoryProvider::default();
        provider
            .push(Scripted::Events(vec![
                Ok(AgentEvent::Chunk("part".into())),
                Err(AgentError::Timeout("read timed out".into())),
            ]))
            .await;
        provider.push_text("full answer").await;

        let response = client(&provider).send("q", "s-1").await;
        assert_eq!(response.text, "full answer");
        assert_eq!(response.metadata.attempts, 2);
    }

    #[tokio::test]
    async fn test_malformed_stream_degrades_without_retry() {
        let provider = MemoryProvider::default();
        provider
            .push(Scripted::Events(vec![
                Ok(AgentEvent::Chunk("part".into())),
                Err(AgentError::MalformedResponse("bad frame".into())),
            ]))
            .await;

        let response = client(&provider).send("q", "s-1").await;
        assert!(!response.is_success());
        assert_eq!(provider.request_count().await, 1);
        assert_eq!(response.error_kind, Some(ErrorKind::Malformed));
        assert!(response.text.starts_with("Error processing response:"));
    }

    #[tokio::test]
    async fn test_zero_retries() {
        let provider = MemoryProvider::default();
        provider
            .push_error(AgentError::Timeout("read timed out".into()))
            .await;
        let response = client(&provider).send_with_retries("q", "s", 0).await;
        assert_eq!(response.metadata.attempts, 1);
    }

    // ========================================================================
    // verify
    // ========================================================================

    #[tokio::test]
    async fn test_verify_ok() {
        let provider = MemoryProvider::default().with_fallback("pong");
        client(&provider).verify().await.unwrap();
        let requests = provider.requests().await;
        assert_eq!(requests[0].session_id, VERIFY_SESSION_ID);
        assert_eq!(requests[0].input_text, "test");
    }

    #[tokio::test]
    async fn test_verify_access_denied_is_config_error() {
        let provider = MemoryProvider::default();
        provider
            .push_error(AgentError::AccessDenied("UnrecognizedClientException".into()))
            .await;
        let err = client(&provider).verify().await.unwrap_err();
        assert!(matches!(err, AgentError::Config(ref m) if m.contains("Invalid AWS credentials")));
    }

    #[tokio::test]
    async fn test_verify_not_found() {
        let provider = MemoryProvider::default();
        provider
            .push_error(AgentError::NotFound("ResourceNotFoundException".into()))
            .await;
        let err = client(&provider).verify().await.unwrap_err();
        assert_eq!(err.to_string(), "Resource not found: Agent ID MEMORYAGENT not found");
    }

    #[tokio::test]
    async fn test_verify_other_service_error_is_reachable() {
        let provider = MemoryProvider::default();
        provider
            .push_error(AgentError::service("validationException", "bad input"))
            .await;
        assert!(client(&provider).verify().await.is_ok());
    }

    #[tokio::test]
    async fn test_verify_connection_error_propagates() {
        let provider = MemoryProvider::default();
        provider
            .push_error(AgentError::Connection("refused".into()))
            .await;
        let err = client(&provider).verify().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Connection);
    }
}
