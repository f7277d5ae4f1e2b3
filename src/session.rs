//! Conversation sessions and the orchestrator that drives them
//!
//! A `Session` owns the ordered turn history and the session id shared by
//! every request of one conversation. The `Orchestrator` takes a session
//! by `&mut` for each submission, so a conversation has exactly one
//! pending question at a time.

use std::collections::VecDeque;
use std::future::Future;

use chrono::{DateTime, Utc};

use crate::client::AgentClient;
use crate::error::{AgentError, ErrorKind, Result};
use crate::format::format_response;
use crate::types::{AgentResponse, ConversationTurn, ResponseMetadata, Role};

/// Default history cap, in turns
pub const DEFAULT_MAX_TURNS: usize = 50;

/// Default prompt length limit, in characters
pub const DEFAULT_MAX_PROMPT_CHARS: usize = 1000;

/// Mint a fresh session id (`a3s-chat-` + 8 hex chars)
pub fn new_session_id() -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    format!("a3s-chat-{}", &id[..8])
}

/// A question and, once it arrived, its answer
#[derive(Debug, Clone, Copy)]
pub struct Exchange<'a> {
    pub question: &'a ConversationTurn,
    pub answer: Option<&'a ConversationTurn>,
}

/// One conversation: id, bounded history, last response
#[derive(Debug, Clone)]
pub struct Session {
    id: String,
    turns: VecDeque<ConversationTurn>,
    max_turns: usize,
    last_response: Option<AgentResponse>,
    started_at: DateTime<Utc>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    /// Start a session with the default history cap
    pub fn new() -> Self {
        Self::with_max_turns(DEFAULT_MAX_TURNS)
    }

    /// Start a session keeping at most `max_turns` turns (at least one)
    pub fn with_max_turns(max_turns: usize) -> Self {
        Self {
            id: new_session_id(),
            turns: VecDeque::new(),
            max_turns: max_turns.max(1),
            last_response: None,
            started_at: Utc::now(),
        }
    }

    /// Continue a conversation under a known session id
    pub fn resume(id: impl Into<String>, max_turns: usize) -> Self {
        Self {
            id: id.into(),
            ..Self::with_max_turns(max_turns)
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn max_turns(&self) -> usize {
        self.max_turns
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Turns, oldest first
    pub fn turns(&self) -> impl Iterator<Item = &ConversationTurn> {
        self.turns.iter()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn last_turn(&self) -> Option<&ConversationTurn> {
        self.turns.back()
    }

    /// Append a turn, evicting the oldest ones past the cap
    ///
    /// Returns the evicted turns, oldest first.
    pub fn append_turn(&mut self, turn: ConversationTurn) -> Vec<ConversationTurn> {
        self.turns.push_back(turn);

        let excess = self.turns.len().saturating_sub(self.max_turns);
        let evicted: Vec<ConversationTurn> = self.turns.drain(..excess).collect();
        if !evicted.is_empty() {
            tracing::debug!(
                session_id = %self.id,
                evicted = evicted.len(),
                "History cap reached, dropped oldest turns"
            );
        }
        evicted
    }

    /// Clear the history and the cached response, and mint a new id
    pub fn reset(&mut self) {
        let previous = std::mem::replace(&mut self.id, new_session_id());
        self.turns.clear();
        self.last_response = None;
        self.started_at = Utc::now();
        tracing::info!(previous = %previous, session_id = %self.id, "Started new session");
    }

    /// Most recent agent response
    pub fn last_response(&self) -> Option<&AgentResponse> {
        self.last_response.as_ref()
    }

    pub fn set_last_response(&mut self, response: AgentResponse) {
        self.last_response = Some(response);
    }

    /// Query of the most recent assistant turn that had one
    pub fn last_query(&self) -> Option<&str> {
        self.turns.iter().rev().find_map(|t| t.query.as_deref())
    }

    pub fn question_count(&self) -> usize {
        self.turns.iter().filter(|t| t.role == Role::User).count()
    }

    pub fn response_count(&self) -> usize {
        self.turns
            .iter()
            .filter(|t| t.role == Role::Assistant)
            .count()
    }

    /// Question/answer pairs, newest first
    ///
    /// An answer whose question was evicted is left out.
    pub fn exchanges(&self) -> Vec<Exchange<'_>> {
        let mut exchanges: Vec<Exchange<'_>> = Vec::new();
        for turn in &self.turns {
            match turn.role {
                Role::User => exchanges.push(Exchange {
                    question: turn,
                    answer: None,
                }),
                Role::Assistant => {
                    if let Some(last) = exchanges.last_mut().filter(|e| e.answer.is_none()) {
                        last.answer = Some(turn);
                    }
                }
            }
        }
        exchanges.reverse();
        exchanges
    }
}

/// Drives one submission: validate, record, ask the agent, record the answer
pub struct Orchestrator {
    client: AgentClient,
    max_turns: usize,
    max_prompt_chars: usize,
}

impl Orchestrator {
    pub fn new(client: AgentClient) -> Self {
        Self {
            client,
            max_turns: DEFAULT_MAX_TURNS,
            max_prompt_chars: DEFAULT_MAX_PROMPT_CHARS,
        }
    }

    /// History cap for sessions created by [`Orchestrator::new_session`]
    pub fn with_max_turns(mut self, max_turns: usize) -> Self {
        self.max_turns = max_turns;
        self
    }

    pub fn with_max_prompt_chars(mut self, max_prompt_chars: usize) -> Self {
        self.max_prompt_chars = max_prompt_chars;
        self
    }

    pub fn client(&self) -> &AgentClient {
        &self.client
    }

    /// Start a session with this orchestrator's history cap
    pub fn new_session(&self) -> Session {
        Session::with_max_turns(self.max_turns)
    }

    /// Pick up an existing session id with this orchestrator's history cap
    pub fn resume_session(&self, id: impl Into<String>) -> Session {
        Session::resume(id, self.max_turns)
    }

    fn check_prompt(&self, prompt: &str) -> Result<()> {
        if prompt.trim().is_empty() {
            return Err(AgentError::InvalidInput("Prompt is empty".to_string()));
        }
        let chars = prompt.chars().count();
        if chars > self.max_prompt_chars {
            return Err(AgentError::InvalidInput(format!(
                "Prompt is {} characters; the limit is {}",
                chars, self.max_prompt_chars
            )));
        }
        Ok(())
    }

    /// Submit a prompt in `session` and return the assistant turn
    ///
    /// Rejected prompts leave the session untouched. Otherwise the user
    /// turn and the assistant turn (success or error) are both appended,
    /// and the request carries the session's id.
    pub async fn submit(&self, session: &mut Session, prompt: &str) -> Result<ConversationTurn> {
        self.submit_until(session, prompt, std::future::pending()).await
    }

    /// Like [`Orchestrator::submit`], but gives up when `interrupt` completes
    ///
    /// An interrupted request is dropped, backoff included, and answered
    /// with a `Cancelled` error turn so every question keeps one response.
    pub async fn submit_until<F>(
        &self,
        session: &mut Session,
        prompt: &str,
        interrupt: F,
    ) -> Result<ConversationTurn>
    where
        F: Future<Output = ()>,
    {
        self.check_prompt(prompt)?;

        session.append_turn(ConversationTurn::user(prompt));

        let response = tokio::select! {
            biased;
            response = self.client.send(prompt, session.id()) => response,
            _ = interrupt => {
                tracing::info!(session_id = %session.id(), "Request aborted by user");
                self.aborted(session.id())
            }
        };

        let formatted = format_response(&response);
        let turn = ConversationTurn::assistant(formatted.text, response.clone())
            .with_table(formatted.table)
            .with_query(formatted.query);

        session.set_last_response(response);
        session.append_turn(turn.clone());
        Ok(turn)
    }

    fn aborted(&self, session_id: &str) -> AgentResponse {
        let info = self.client.info();
        AgentResponse::failure(
            "Request aborted by user",
            ErrorKind::Cancelled,
            session_id,
            ResponseMetadata {
                agent_id: info.agent_id,
                agent_alias_id: info.agent_alias_id,
                timestamp: Utc::now(),
                // the first request was in flight; retries are unknown
                attempts: 1,
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::provider::memory::MemoryProvider;
    use crate::retry::RetryConfig;
    use crate::types::AgentEvent;

    fn orchestrator(provider: &MemoryProvider) -> Orchestrator {
        let client = AgentClient::new(provider.clone()).with_retry_config(RetryConfig {
            base_delay_ms: 1,
            max_delay_ms: 1,
            ..RetryConfig::session(2)
        });
        Orchestrator::new(client)
    }

    // ========================================================================
    // Session lifecycle
    // ========================================================================

    #[test]
    fn test_session_id_format() {
        let id = new_session_id();
        assert!(id.starts_with("a3s-chat-"));
        let suffix = &id["a3s-chat-".len()..];
        assert_eq!(suffix.len(), 8);
        assert!(suffix.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(new_session_id(), new_session_id());
    }

    #[test]
    fn test_history_cap_evicts_oldest() {
        let mut session = Session::new();
        for i in 0..DEFAULT_MAX_TURNS {
            assert!(session.append_turn(ConversationTurn::user(format!("q{i}"))).is_empty());
        }
        assert_eq!(session.len(), 50);

        let evicted = session.append_turn(ConversationTurn::user("q50"));
        assert_eq!(evicted.len(), 1);
        assert_eq!(evicted[0].content, "q0");
        assert_eq!(session.len(), 50);
        assert_eq!(session.turns().next().unwrap().content, "q1");
        assert_eq!(session.last_turn().unwrap().content, "q50");
    }

    #[test]
    fn test_zero_cap_keeps_one() {
        let mut session = Session::with_max_turns(0);
        session.append_turn(ConversationTurn::user("a"));
        session.append_turn(ConversationTurn::user("b"));
        assert_eq!(session.len(), 1);
    }

    #[test]
    fn test_reset_clears_and_renames() {
        let mut session = Session::new();
        let old_id = session.id().to_string();
        session.append_turn(ConversationTurn::user("hello"));
        session.reset();
        assert!(session.is_empty());
        assert!(session.last_response().is_none());
        assert_ne!(session.id(), old_id);
    }

    #[test]
    fn test_resume_keeps_id() {
        let session = Session::resume("user-42", 10);
        assert_eq!(session.id(), "user-42");
        assert_eq!(session.max_turns(), 10);
        assert!(session.is_empty());
    }

    // ========================================================================
    // Orchestrator
    // ========================================================================

    #[tokio::test]
    async fn test_submit_keeps_session_id() {
        let provider = MemoryProvider::default().with_fallback("ok");
        let orchestrator = orchestrator(&provider);
        let mut session = orchestrator.new_session();

        orchestrator.submit(&mut session, "one").await.unwrap();
        orchestrator.submit(&mut session, "two").await.unwrap();

        let requests = provider.requests().await;
        assert_eq!(requests.len(), 2);
        assert!(requests.iter().all(|r| r.session_id == session.id()));
        assert_eq!(session.question_count(), 2);
        assert_eq!(session.response_count(), 2);
    }

    #[tokio::test]
    async fn test_submit_after_reset_uses_new_id() {
        let provider = MemoryProvider::default().with_fallback("ok");
        let orchestrator = orchestrator(&provider);
        let mut session = orchestrator.new_session();

        orchestrator.submit(&mut session, "one").await.unwrap();
        let first = session.id().to_string();
        session.reset();
        orchestrator.submit(&mut session, "two").await.unwrap();

        let requests = provider.requests().await;
        assert_eq!(requests[0].session_id, first);
        assert_ne!(requests[1].session_id, first);
        assert_eq!(session.len(), 2);
    }

    #[tokio::test]
    async fn test_submit_records_table_and_query() {
        let provider = MemoryProvider::default();
        provider
            .push_events(vec![
                AgentEvent::Trace(serde_json::json!({"query": "SELECT region, total FROM sales"})),
                AgentEvent::Chunk("| region | total |\n| --- | --- |\n| east | 10 |".into()),
            ])
            .await;
        let orchestrator = orchestrator(&provider);
        let mut session = orchestrator.new_session();

        let turn = orchestrator.submit(&mut session, "sales?").await.unwrap();
        assert_eq!(turn.role, Role::Assistant);
        assert_eq!(turn.table.as_ref().unwrap().row_count, 1);
        assert_eq!(turn.query.as_deref(), Some("SELECT region, total FROM sales"));
        assert_eq!(session.last_query(), Some("SELECT region, total FROM sales"));
        assert!(session.last_response().unwrap().is_success());
    }

    #[tokio::test]
    async fn test_submit_error_turn() {
        let provider = MemoryProvider::default();
        provider
            .push_error(AgentError::AccessDenied("AccessDeniedException".into()))
            .await;
        let orchestrator = orchestrator(&provider);
        let mut session = orchestrator.new_session();

        let turn = orchestrator.submit(&mut session, "q").await.unwrap();
        assert!(turn.is_error());
        assert!(turn.table.is_none());
        assert!(turn.content.starts_with("Error: "));
        assert_eq!(
            session.last_response().unwrap().error_kind,
            Some(ErrorKind::AccessDenied)
        );
        assert_eq!(session.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_submit_until_interrupt_answers_question() {
        let provider = MemoryProvider::default();
        provider
            .push_error(AgentError::Timeout("Read timed out".into()))
            .await;
        provider.push_text("too late").await;
        // 1s backoff after the timeout; the interrupt fires first
        let client = AgentClient::new(provider.clone()).with_retry_config(RetryConfig::session(2));
        let orchestrator = Orchestrator::new(client);
        let mut session = orchestrator.new_session();

        let interrupt = tokio::time::sleep(std::time::Duration::from_millis(100));
        let turn = orchestrator
            .submit_until(&mut session, "slow question", interrupt)
            .await
            .unwrap();

        assert!(turn.is_error());
        assert_eq!(turn.content, "Error: Request aborted by user");
        let response = turn.raw_response.as_ref().unwrap();
        assert_eq!(response.error_kind, Some(ErrorKind::Cancelled));
        assert_eq!(response.session_id, session.id());

        assert_eq!(session.len(), 2);
        assert_eq!(session.question_count(), 1);
        assert_eq!(session.response_count(), 1);
        assert_eq!(session.last_turn().unwrap().role, Role::Assistant);
        assert_eq!(provider.request_count().await, 1);
        assert_eq!(provider.pending().await, 1);
    }

    #[tokio::test]
    async fn test_submit_until_prefers_ready_answer() {
        let provider = MemoryProvider::default();
        provider.push_text("fast answer").await;
        let orchestrator = orchestrator(&provider);
        let mut session = orchestrator.new_session();

        let turn = orchestrator
            .submit_until(&mut session, "q", std::future::ready(()))
            .await
            .unwrap();
        assert!(!turn.is_error());
        assert_eq!(turn.content, "fast answer");
    }

    #[tokio::test]
    async fn test_submit_rejects_bad_prompts() {
        let provider = MemoryProvider::default().with_fallback("ok");
        let orchestrator = orchestrator(&provider).with_max_prompt_chars(5);
        let mut session = orchestrator.new_session();

        let err = orchestrator.submit(&mut session, "   ").await.unwrap_err();
        assert!(matches!(err, AgentError::InvalidInput(_)));
        let err = orchestrator.submit(&mut session, "too long").await.unwrap_err();
        assert!(matches!(err, AgentError::InvalidInput(_)));

        assert!(session.is_empty());
        assert_eq!(provider.request_count().await, 0);
    }

    #[tokio::test]
    async fn test_exchanges_newest_first() {
        let provider = MemoryProvider::default();
        provider.push_text("first answer").await;
        provider.push_text("second answer").await;
        let orchestrator = orchestrator(&provider);
        let mut session = orchestrator.new_session();

        orchestrator.submit(&mut session, "first").await.unwrap();
        orchestrator.submit(&mut session, "second").await.unwrap();

        let exchanges = session.exchanges();
        assert_eq!(exchanges.len(), 2);
        assert_eq!(exchanges[0].question.content, "second");
        assert_eq!(exchanges[0].answer.unwrap().content, "second answer");
        assert_eq!(exchanges[1].question.content, "first");
    }

    #[test]
    fn test_exchanges_skip_orphan_answer() {
        let mut session = Session::with_max_turns(3);
        let response = AgentResponse::success(
            "a",
            session.id().to_string(),
            vec![],
            crate::types::ResponseMetadata {
                agent_id: "A".into(),
                agent_alias_id: "B".into(),
                timestamp: Utc::now(),
                attempts: 1,
            },
        );
        session.append_turn(ConversationTurn::user("q1"));
        session.append_turn(ConversationTurn::assistant("a1", response.clone()));
        session.append_turn(ConversationTurn::user("q2"));
        session.append_turn(ConversationTurn::assistant("a2", response));

        // q1 evicted, a1 is now an orphan
        let exchanges = session.exchanges();
        assert_eq!(exchanges.len(), 1);
        assert_eq!(exchanges[0].question.content, "q2");
        assert_eq!(exchanges[0].answer.unwrap().content, "a2");
    }
}
