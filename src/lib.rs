//! # a3s-agent-chat
//!
//! Chat client for hosted conversational agents (AWS Bedrock Agents), with
//! response formatting for tabular and SQL-backed answers.
//!
//! ## Overview
//!
//! `a3s-agent-chat` sends questions to an agent, aggregates the streamed
//! reply, retries transient failures, and turns the answer into display
//! text, an optional table, and the SQL statement the agent ran. Swap
//! backends (the Bedrock runtime, in-memory) without changing application
//! code.
//!
//! ## Quick Start
//!
//! ```rust
//! use a3s_agent_chat::{AgentClient, Orchestrator};
//! use a3s_agent_chat::provider::memory::MemoryProvider;
//!
//! # tokio_test::block_on(async {
//! let provider = MemoryProvider::default();
//! provider.push_text("| region | sales |\n|---|---|\n| east | 10 |").await;
//!
//! let orchestrator = Orchestrator::new(AgentClient::new(provider));
//! let mut session = orchestrator.new_session();
//!
//! let answer = orchestrator.submit(&mut session, "Sales by region?").await?;
//! assert_eq!(answer.table.unwrap().row_count, 1);
//! # Ok::<(), a3s_agent_chat::AgentError>(())
//! # }).unwrap();
//! ```
//!
//! ## Providers
//!
//! - **bedrock**: SigV4-signed HTTP to the agent runtime, event-stream decoding
//! - **memory**: scripted replies for tests and offline use
//!
//! ## Architecture
//!
//! - **AgentProvider** trait: one network request per `invoke`
//! - **AgentClient**: aggregation plus retry on timeout and connection errors
//! - **format** / **query**: display text, tables, embedded SQL
//! - **Session** / **Orchestrator**: bounded history under one session id

pub mod cli;
pub mod client;
pub mod config;
pub mod dirs;
pub mod error;
pub mod format;
pub mod provider;
pub mod query;
pub mod retry;
pub mod session;
pub mod types;

// Re-export core types
pub use client::AgentClient;
pub use config::{ChatConfig, SecretString, ValidationReport};
pub use error::{AgentError, ErrorKind, Result};
pub use format::{clean_text, extract_table, format_number, format_response, FormattedResponse};
pub use provider::{AgentProvider, EventStream, InvokeRequest, ProviderInfo};
pub use query::extract_embedded_query;
pub use retry::RetryConfig;
pub use session::{Orchestrator, Session};
pub use types::{
    AgentEvent, AgentResponse, ConversationTurn, ResponseMetadata, ResponseStatus, Role,
    TableData,
};
