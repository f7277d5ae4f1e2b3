//! HTTP client for the agent runtime `InvokeAgent` operation

use super::config::BedrockConfig;
use super::credentials::{self, Credentials};
use super::eventstream::{Message, MessageDecoder};
use super::signer::{self, SigningParams};
use crate::error::{AgentError, Result};
use crate::provider::{EventStream, InvokeRequest};
use crate::retry::{with_retry, AttemptOutcome, RetryConfig};
use crate::types::AgentEvent;
use async_trait::async_trait;
use base64::Engine;
use bytes::Bytes;
use futures::stream::BoxStream;
use futures::StreamExt;
use serde::Deserialize;
use std::sync::Arc;

/// Low-level client for the `InvokeAgent` operation
pub struct BedrockClient {
    http: reqwest::Client,
    credentials: Credentials,
    config: Arc<BedrockConfig>,
}

impl BedrockClient {
    /// Build the HTTP client and resolve credentials
    ///
    /// Fails with a configuration error when identifiers or credentials
    /// are missing; nothing is sent over the network here.
    pub fn connect(config: BedrockConfig) -> Result<Self> {
        config.validate()?;
        let credentials = credentials::resolve(&config.credentials)?;

        let http = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .read_timeout(config.read_timeout)
            .build()
            .map_err(|e| AgentError::Config(format!("Failed to build HTTP client: {}", e)))?;

        tracing::info!(
            agent_id = %config.agent_id,
            agent_alias_id = %config.agent_alias_id,
            endpoint = %config.endpoint_url(),
            "Bedrock agent client ready"
        );

        Ok(Self {
            http,
            credentials,
            config: Arc::new(config),
        })
    }

    /// Get the client configuration
    pub fn config(&self) -> &BedrockConfig {
        &self.config
    }

    /// Send one request and return its event stream
    ///
    /// Throttling and 5xx responses are retried here per `transport_retry`;
    /// everything else is reported to the caller.
    pub async fn invoke(&self, request: &InvokeRequest) -> Result<BedrockStream> {
        let url = reqwest::Url::parse(&format!(
            "{}{}",
            self.config.endpoint_url(),
            self.config.invoke_path(&request.session_id)
        ))
        .map_err(|e| AgentError::Config(format!("Invalid endpoint: {}", e)))?;

        let body = serde_json::to_vec(&serde_json::json!({
            "inputText": request.input_text,
            "enableTrace": request.enable_trace && self.config.enable_trace,
        }))?;

        let retry = &self.config.transport_retry;
        let result = with_retry(retry, |attempt| {
            let url = &url;
            let body = &body;
            async move {
                match self.send_once(url, body).await {
                    Ok(response) => AttemptOutcome::Success(response),
                    Err(outcome) => {
                        tracing::debug!(attempt, "Transport attempt failed");
                        outcome
                    }
                }
            }
        })
        .await;

        let retried = result.map_err(|failure| failure.error)?;

        tracing::debug!(
            session_id = %request.session_id,
            attempts = retried.attempts,
            "Agent response stream opened"
        );

        Ok(BedrockStream::new(retried.value.bytes_stream().boxed()))
    }

    async fn send_once(
        &self,
        url: &reqwest::Url,
        body: &[u8],
    ) -> std::result::Result<reqwest::Response, AttemptOutcome<reqwest::Response>> {
        let base_headers = vec![
            ("host".to_string(), signer::host_header(url)),
            ("content-type".to_string(), "application/json".to_string()),
        ];
        let params = SigningParams {
            credentials: &self.credentials,
            region: &self.config.region,
            service: signer::SERVICE,
            time: chrono::Utc::now(),
        };
        let signed = signer::sign("POST", url, &base_headers, body, &params)
            .map_err(AttemptOutcome::Fatal)?;

        let mut builder = self
            .http
            .post(url.clone())
            .header("content-type", "application/json")
            .header("accept", "application/vnd.amazon.eventstream")
            .body(body.to_vec());
        for (name, value) in &signed {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = builder
            .send()
            .await
            .map_err(|e| AttemptOutcome::Fatal(map_reqwest_error(e)))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let retry_after = RetryConfig::parse_retry_after(
            response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok()),
        );
        let error_type = response
            .headers()
            .get("x-amzn-errortype")
            .and_then(|v| v.to_str().ok())
            .map(|v| v.split(':').next().unwrap_or(v).to_string());
        let text = response.text().await.map_err(|e| {
            tracing::debug!(status = status.as_u16(), error = %e, "Failed to read error body");
            AttemptOutcome::Fatal(map_reqwest_error(e))
        })?;
        let error = http_error(status.as_u16(), error_type.as_deref(), &text);

        if self.config.transport_retry.is_retryable_status(status.as_u16()) {
            Err(AttemptOutcome::Retryable { error, retry_after })
        } else {
            Err(AttemptOutcome::Fatal(error))
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default, alias = "Message")]
    message: Option<String>,
    #[serde(default, rename = "__type")]
    error_type: Option<String>,
}

/// Map a non-2xx HTTP response to an error
pub(crate) fn http_error(status: u16, error_type: Option<&str>, body: &str) -> AgentError {
    let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();
    let message = parsed
        .message
        .unwrap_or_else(|| if body.is_empty() { format!("HTTP {}", status) } else { body.to_string() });
    let code = error_type
        .map(str::to_string)
        .or(parsed.error_type)
        .map(|t| t.rsplit('#').next().unwrap_or(&t).to_string())
        .unwrap_or_else(|| format!("HTTP{}", status));

    match status {
        401 | 403 => AgentError::AccessDenied(format!("{}: {}", code, message)),
        404 => AgentError::NotFound(format!("{}: {}", code, message)),
        408 => AgentError::Timeout(format!("{}: {}", code, message)),
        429 => AgentError::Throttled(format!("{}: {}", code, message)),
        _ => error_from_code(&code, &message),
    }
}

/// Map a service error code (HTTP error type or stream exception type)
pub(crate) fn error_from_code(code: &str, message: &str) -> AgentError {
    match code.to_ascii_lowercase().as_str() {
        "accessdeniedexception" | "unrecognizedclientexception" => {
            AgentError::AccessDenied(format!("{}: {}", code, message))
        }
        "resourcenotfoundexception" => AgentError::NotFound(format!("{}: {}", code, message)),
        "throttlingexception" | "servicequotaexceededexception" => {
            AgentError::Throttled(format!("{}: {}", code, message))
        }
        _ => AgentError::service(code, message),
    }
}

/// Map a transport failure to a structured error
pub(crate) fn map_reqwest_error(e: reqwest::Error) -> AgentError {
    if e.is_builder() {
        AgentError::Config(e.to_string())
    } else if e.is_timeout() {
        AgentError::Timeout(e.to_string())
    } else if e.is_decode() {
        AgentError::MalformedResponse(e.to_string())
    } else {
        // connect failures, resets and truncated bodies
        AgentError::Connection(e.to_string())
    }
}

#[derive(Debug, Deserialize)]
struct ChunkPayload {
    #[serde(default)]
    bytes: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ExceptionPayload {
    #[serde(default, alias = "Message")]
    message: Option<String>,
}

/// Convert a decoded message into an agent event
///
/// Unknown event types yield `None`; exceptions become errors.
pub(crate) fn message_to_event(message: &Message) -> Result<Option<AgentEvent>> {
    match message.header_str(":message-type").unwrap_or("event") {
        "event" => {}
        "exception" => {
            let code = message.header_str(":exception-type").unwrap_or("exception");
            let payload: ExceptionPayload =
                serde_json::from_slice(&message.payload).unwrap_or_default();
            let text = payload
                .message
                .unwrap_or_else(|| String::from_utf8_lossy(&message.payload).into_owned());
            return Err(error_from_code(code, &text));
        }
        "error" => {
            let code = message.header_str(":error-code").unwrap_or("error");
            let text = message.header_str(":error-message").unwrap_or_default();
            return Err(error_from_code(code, text));
        }
        other => {
            return Err(AgentError::MalformedResponse(format!(
                "unknown message type '{}'",
                other
            )))
        }
    }

    match message.header_str(":event-type") {
        Some("chunk") => {
            let payload: ChunkPayload = serde_json::from_slice(&message.payload)?;
            let raw = match payload.bytes {
                Some(encoded) => base64::engine::general_purpose::STANDARD
                    .decode(encoded.as_bytes())
                    .map_err(|e| {
                        AgentError::MalformedResponse(format!("chunk is not base64: {}", e))
                    })?,
                None => Vec::new(),
            };
            let text = String::from_utf8(raw).map_err(|e| {
                AgentError::MalformedResponse(format!("chunk is not UTF-8: {}", e))
            })?;
            Ok(Some(AgentEvent::Chunk(text)))
        }
        Some("trace") => Ok(Some(AgentEvent::Trace(serde_json::from_slice(
            &message.payload,
        )?))),
        Some("returnControl") => Ok(Some(AgentEvent::ReturnControl(serde_json::from_slice(
            &message.payload,
        )?))),
        other => {
            tracing::debug!(event_type = ?other, "Ignoring agent event");
            Ok(None)
        }
    }
}

/// Event stream over a streaming HTTP body
pub struct BedrockStream {
    body: BoxStream<'static, reqwest::Result<Bytes>>,
    decoder: MessageDecoder,
    finished: bool,
}

impl BedrockStream {
    pub(crate) fn new(body: BoxStream<'static, reqwest::Result<Bytes>>) -> Self {
        Self {
            body,
            decoder: MessageDecoder::new(),
            finished: false,
        }
    }
}

#[async_trait]
impl EventStream for BedrockStream {
    async fn next(&mut self) -> Result<Option<AgentEvent>> {
        loop {
            if let Some(message) = self.decoder.decode()? {
                match message_to_event(&message)? {
                    Some(event) => return Ok(Some(event)),
                    None => continue,
                }
            }

            if self.finished {
                if self.decoder.buffered() > 0 {
                    return Err(AgentError::MalformedResponse(format!(
                        "event stream ended with {} undecoded bytes",
                        self.decoder.buffered()
                    )));
                }
                return Ok(None);
            }

            match self.body.next().await {
                Some(Ok(bytes)) => self.decoder.push(&bytes),
                Some(Err(e)) => {
                    let error = map_reqwest_error(e);
                    tracing::debug!(kind = %error.kind(), "Agent response stream failed");
                    return Err(error);
                }
                None => self.finished = true,
            }
        }
    }
}

impl std::fmt::Debug for BedrockClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BedrockClient")
            .field("agent_id", &self.config.agent_id)
            .field("agent_alias_id", &self.config.agent_alias_id)
            .field("region", &self.config.region)
            .field("access_key_id", &self.credentials.access_key_id)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::super::eventstream::{encode_event, encode_exception, Header};
    use super::*;
    use crate::error::ErrorKind;

    fn decode_one(bytes: &[u8]) -> Message {
        let mut decoder = MessageDecoder::new();
        decoder.push(bytes);
        decoder.decode().unwrap().unwrap()
    }

    #[test]
    fn test_chunk_event() {
        let encoded = base64::engine::general_purpose::STANDARD.encode("Hello | world");
        let message = decode_one(&encode_event(
            "chunk",
            &serde_json::json!({ "bytes": encoded }),
        ));
        assert_eq!(
            message_to_event(&message).unwrap(),
            Some(AgentEvent::Chunk("Hello | world".to_string()))
        );
    }

    #[test]
    fn test_chunk_without_bytes_is_empty_text() {
        let message = decode_one(&encode_event("chunk", &serde_json::json!({})));
        assert_eq!(
            message_to_event(&message).unwrap(),
            Some(AgentEvent::Chunk(String::new()))
        );
    }

    #[test]
    fn test_trace_and_return_control_events() {
        let trace = serde_json::json!({"trace": {"orchestrationTrace": {"rationale": {"text": "x"}}}});
        let message = decode_one(&encode_event("trace", &trace));
        assert_eq!(
            message_to_event(&message).unwrap(),
            Some(AgentEvent::Trace(trace))
        );

        let rc = serde_json::json!({"invocationId": "abc"});
        let message = decode_one(&encode_event("returnControl", &rc));
        assert_eq!(
            message_to_event(&message).unwrap(),
            Some(AgentEvent::ReturnControl(rc))
        );
    }

    #[test]
    fn test_unknown_event_ignored() {
        let message = decode_one(&encode_event("files", &serde_json::json!({})));
        assert_eq!(message_to_event(&message).unwrap(), None);
    }

    #[test]
    fn test_bad_base64_is_malformed() {
        let message = decode_one(&encode_event(
            "chunk",
            &serde_json::json!({"bytes": "***"}),
        ));
        let err = message_to_event(&message).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Malformed);
    }

    #[test]
    fn test_exception_mapping() {
        let cases = [
            ("accessDeniedException", ErrorKind::AccessDenied),
            ("resourceNotFoundException", ErrorKind::NotFound),
            ("throttlingException", ErrorKind::Throttled),
            ("internalServerException", ErrorKind::Other),
        ];
        for (code, kind) in cases {
            let message = decode_one(&encode_exception(code, "details"));
            let err = message_to_event(&message).unwrap_err();
            assert_eq!(err.kind(), kind, "{code}");
        }

        let message = decode_one(&encode_exception(
            "dependencyFailedException",
            "Read timed out while calling the action group",
        ));
        assert!(message_to_event(&message).unwrap_err().is_retryable());
    }

    #[test]
    fn test_error_message_type() {
        let bytes = super::super::eventstream::encode_message(
            &[
                Header::string(":message-type", "error"),
                Header::string(":error-code", "InternalFailure"),
                Header::string(":error-message", "boom"),
            ],
            b"",
        );
        let err = message_to_event(&decode_one(&bytes)).unwrap_err();
        assert_eq!(err.to_string(), "Service error (InternalFailure): boom");
    }

    #[test]
    fn test_http_error_mapping() {
        let err = http_error(
            403,
            Some("AccessDeniedException"),
            r#"{"message":"not authorized"}"#,
        );
        assert!(matches!(err, AgentError::AccessDenied(ref m) if m.contains("not authorized")));

        let err = http_error(404, None, r#"{"Message":"agent missing"}"#);
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let err = http_error(429, None, "");
        assert_eq!(err.kind(), ErrorKind::Throttled);

        let err = http_error(
            400,
            None,
            r#"{"__type":"com.amazon#ValidationException","message":"bad"}"#,
        );
        assert_eq!(err.to_string(), "Service error (ValidationException): bad");

        let err = http_error(503, None, "");
        assert_eq!(err.to_string(), "Service error (HTTP503): HTTP 503");
    }
}
