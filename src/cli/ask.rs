use serde::Serialize;

use super::render;
use crate::config::ChatConfig;
use crate::error::Result;
use crate::types::{AgentResponse, TableData};

/// JSON shape printed by `ask --json`
#[derive(Debug, Serialize)]
struct AskOutput<'a> {
    session_id: &'a str,
    text: &'a str,
    has_error: bool,
    table: Option<&'a TableData>,
    query: Option<&'a str>,
    response: Option<&'a AgentResponse>,
}

/// Execute the `ask` command: one question, one answer.
///
/// Returns whether the agent answered successfully.
pub async fn execute(
    config: &ChatConfig,
    prompt: &str,
    session_id: Option<&str>,
    json: bool,
) -> Result<bool> {
    let orchestrator = super::build_orchestrator(config)?;
    let mut session = match session_id {
        Some(id) => orchestrator.resume_session(id),
        None => orchestrator.new_session(),
    };

    let turn = orchestrator.submit(&mut session, prompt).await?;

    if json {
        let output = AskOutput {
            session_id: session.id(),
            text: &turn.content,
            has_error: turn.is_error(),
            table: turn.table.as_ref(),
            query: turn.query.as_deref(),
            response: turn.raw_response.as_ref(),
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        println!("{}", render::render_turn(&turn, false));
        println!("\nSession: {}", session.id());
    }

    Ok(!turn.is_error())
}
