//! Core conversation and response types
//!
//! All types use camelCase JSON serialization so transcripts can be
//! exported and reloaded without a translation layer.

use crate::error::ErrorKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single event streamed back by the agent
///
/// Serialized externally tagged: `{"chunk": "..."}`, `{"trace": {...}}`,
/// `{"returnControl": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AgentEvent {
    /// A piece of generated text
    Chunk(String),

    /// Execution trace emitted alongside the text (opaque to the client)
    Trace(serde_json::Value),

    /// The agent handed control back to the caller (opaque to the client)
    ReturnControl(serde_json::Value),
}

impl AgentEvent {
    /// Text carried by a chunk event
    pub fn text(&self) -> Option<&str> {
        match self {
            AgentEvent::Chunk(text) => Some(text),
            _ => None,
        }
    }

    /// Tree form used for trace inspection
    ///
    /// Return-control payloads are wrapped as `{"type": "return_control", "data": ...}`
    /// so they stay distinguishable from plain traces. Chunks have no tree form.
    pub fn trace_value(&self) -> Option<serde_json::Value> {
        match self {
            AgentEvent::Chunk(_) => None,
            AgentEvent::Trace(value) => Some(value.clone()),
            AgentEvent::ReturnControl(value) => Some(serde_json::json!({
                "type": "return_control",
                "data": value,
            })),
        }
    }
}

/// Outcome of an agent request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStatus {
    Success,
    Error,
}

/// Request bookkeeping attached to every response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseMetadata {
    /// Agent that served (or failed) the request
    pub agent_id: String,

    /// Alias of the agent
    pub agent_alias_id: String,

    /// When the response was produced
    pub timestamp: DateTime<Utc>,

    /// Number of attempts made, including the first one
    pub attempts: u32,
}

/// The aggregated result of one user request
///
/// Produced exactly once per request and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentResponse {
    /// Success or error
    pub status: ResponseStatus,

    /// Concatenated chunk text on success, error description on failure
    pub text: String,

    /// Session the request was sent under
    pub session_id: String,

    /// Trace and return-control events in arrival order
    #[serde(default)]
    pub raw_events: Vec<AgentEvent>,

    /// Kind of the final error, for failures only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,

    /// Request metadata
    pub metadata: ResponseMetadata,
}

impl AgentResponse {
    /// Build a successful response
    pub fn success(
        text: impl Into<String>,
        session_id: impl Into<String>,
        raw_events: Vec<AgentEvent>,
        metadata: ResponseMetadata,
    ) -> Self {
        Self {
            status: ResponseStatus::Success,
            text: text.into(),
            session_id: session_id.into(),
            raw_events,
            error_kind: None,
            metadata,
        }
    }

    /// Build a failed response
    pub fn failure(
        message: impl Into<String>,
        kind: ErrorKind,
        session_id: impl Into<String>,
        metadata: ResponseMetadata,
    ) -> Self {
        Self {
            status: ResponseStatus::Error,
            text: message.into(),
            session_id: session_id.into(),
            raw_events: Vec::new(),
            error_kind: Some(kind),
            metadata,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == ResponseStatus::Success
    }

    /// Trace trees of all non-chunk events, in arrival order
    pub fn trace_values(&self) -> Vec<serde_json::Value> {
        self.raw_events
            .iter()
            .filter_map(AgentEvent::trace_value)
            .collect()
    }

    /// SQL statement the agent ran, if its traces mention one
    pub fn embedded_query(&self) -> Option<String> {
        crate::query::extract_embedded_query(&self.trace_values())
    }
}

/// Parsed markdown table
///
/// `rows` starts with the header row, followed by the data rows, so
/// `rows.len() == row_count + 1`. Every row has exactly `headers.len()` cells.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableData {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
    pub row_count: usize,
}

impl TableData {
    /// Data rows without the leading header row
    pub fn data_rows(&self) -> &[Vec<String>] {
        self.rows.get(1..).unwrap_or(&[])
    }

    /// Number of columns
    pub fn column_count(&self) -> usize {
        self.headers.len()
    }
}

/// Who authored a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One entry of the conversation history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationTurn {
    pub role: Role,

    /// Prompt text, or the display text of an answer
    pub content: String,

    pub timestamp: DateTime<Utc>,

    /// The response that produced an assistant turn
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_response: Option<AgentResponse>,

    /// Table parsed out of a successful answer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table: Option<TableData>,

    /// SQL statement found in the answer's traces
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
}

impl ConversationTurn {
    /// Create a user turn stamped now
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            timestamp: Utc::now(),
            raw_response: None,
            table: None,
            query: None,
        }
    }

    /// Create an assistant turn stamped now
    pub fn assistant(content: impl Into<String>, response: AgentResponse) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            timestamp: Utc::now(),
            raw_response: Some(response),
            table: None,
            query: None,
        }
    }

    pub fn with_table(mut self, table: Option<TableData>) -> Self {
        self.table = table;
        self
    }

    pub fn with_query(mut self, query: Option<String>) -> Self {
        self.query = query;
        self
    }

    /// Whether this is an assistant turn carrying an error response
    pub fn is_error(&self) -> bool {
        self.raw_response
            .as_ref()
            .map(|r| !r.is_success())
            .unwrap_or(false)
    }
}
