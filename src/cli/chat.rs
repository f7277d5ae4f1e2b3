use std::future::Future;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};

use super::render;
use crate::config::ChatConfig;
use crate::error::Result;
use crate::session::{Orchestrator, Session};

/// What the REPL should do with one input line
#[derive(Debug, PartialEq, Eq)]
pub enum ChatCommand<'a> {
    Ask(&'a str),
    NewSession,
    ShowSql,
    History,
    Stats,
    Help,
    Exit,
    Unknown(&'a str),
    Empty,
}

impl<'a> ChatCommand<'a> {
    pub fn parse(line: &'a str) -> Self {
        let line = line.trim();
        if line.is_empty() {
            return ChatCommand::Empty;
        }
        if !line.starts_with('/') {
            return ChatCommand::Ask(line);
        }
        match line {
            "/new" => ChatCommand::NewSession,
            "/sql" => ChatCommand::ShowSql,
            "/history" => ChatCommand::History,
            "/stats" => ChatCommand::Stats,
            "/help" => ChatCommand::Help,
            "/exit" | "/quit" => ChatCommand::Exit,
            other => ChatCommand::Unknown(other),
        }
    }
}

const HELP: &str = "Commands: /new (new session), /sql (last SQL query), /history, /stats, /exit\n\
Press Ctrl+C while waiting to abort the pending request.";

/// Execute the `chat` command: interactive conversation on stdin/stdout.
pub async fn execute(config: &ChatConfig, humanize: bool) -> Result<()> {
    let orchestrator = super::build_orchestrator(config)?;
    let mut session = orchestrator.new_session();

    let info = orchestrator.client().info();
    println!(
        "Connected to agent {} (alias {}, {})",
        info.agent_id, info.agent_alias_id, info.region
    );
    println!("Session {}", session.id());
    println!("{HELP}");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    loop {
        stdout.write_all(b"\n> ").await?;
        stdout.flush().await?;

        let Some(line) = next_input(&mut lines, interrupted()).await? else {
            break;
        };

        match ChatCommand::parse(&line) {
            ChatCommand::Empty => continue,
            ChatCommand::Exit => break,
            ChatCommand::Help => println!("{HELP}"),
            ChatCommand::NewSession => {
                session.reset();
                println!("Started new session {}", session.id());
            }
            ChatCommand::ShowSql => match session.last_query() {
                Some(query) => println!("{query}"),
                None => println!("No SQL query in this session yet."),
            },
            ChatCommand::History => println!("{}", render::render_history(&session)),
            ChatCommand::Stats => println!("{}", render::render_stats(&session)),
            ChatCommand::Unknown(command) => {
                println!("Unknown command '{command}'. Type /help for the list.")
            }
            ChatCommand::Ask(prompt) => ask(&orchestrator, &mut session, prompt, humanize).await,
        }
    }

    println!("Bye.");
    Ok(())
}

async fn ask(orchestrator: &Orchestrator, session: &mut Session, prompt: &str, humanize: bool) {
    println!("Thinking...");
    match orchestrator.submit_until(session, prompt, interrupted()).await {
        Ok(turn) => println!("\n{}", render::render_turn(&turn, humanize)),
        Err(e) => println!("{e}"),
    }
}

/// Next input line; `None` on end of input or when `interrupt` fires first
async fn next_input<R, I>(lines: &mut Lines<R>, interrupt: I) -> Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
    I: Future<Output = ()>,
{
    tokio::select! {
        biased;
        _ = interrupt => {
            println!();
            Ok(None)
        }
        line = lines.next_line() => Ok(line?),
    }
}

/// Completes on Ctrl-C
///
/// Once polled, `ctrl_c` replaces the default SIGINT action for the process.
async fn interrupted() {
    if tokio::signal::ctrl_c().await.is_err() {
        std::future::pending::<()>().await;
    }
}
