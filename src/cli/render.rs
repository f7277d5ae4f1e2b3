//! Terminal rendering of answers, tables and errors

use std::fmt::Write;

use crate::error::ErrorKind;
use crate::format::format_number;
use crate::session::Session;
use crate::types::{ConversationTurn, TableData};

/// Align a table into fixed-width columns
///
/// With `humanize`, numeric cells are shortened via `format_number`.
pub fn render_table(table: &TableData, humanize: bool) -> String {
    let cell = |value: &str| {
        if humanize {
            format_number(value)
        } else {
            value.to_string()
        }
    };

    let body: Vec<Vec<String>> = table
        .data_rows()
        .iter()
        .map(|row| row.iter().map(|c| cell(c.as_str())).collect())
        .collect();

    let mut widths: Vec<usize> = table.headers.iter().map(|h| h.chars().count()).collect();
    for row in &body {
        for (i, value) in row.iter().enumerate() {
            if let Some(width) = widths.get_mut(i) {
                *width = (*width).max(value.chars().count());
            }
        }
    }

    let line = |cells: &[String]| -> String {
        cells
            .iter()
            .zip(&widths)
            .map(|(c, w)| format!("{:<width$}", c, width = *w))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    let mut out = String::new();
    let _ = writeln!(out, "{}", line(table.headers.as_slice()));
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    let _ = writeln!(out, "{}", rule.join("  "));
    for row in &body {
        let _ = writeln!(out, "{}", line(row.as_slice()));
    }
    let _ = write!(
        out,
        "({} row{})",
        table.row_count,
        if table.row_count == 1 { "" } else { "s" }
    );
    out
}

/// Headline and guidance for a failed request
pub fn render_error(kind: ErrorKind) -> String {
    format!("{}\n{}", kind.headline(), kind.guidance())
}

/// Everything shown for one assistant turn
pub fn render_turn(turn: &ConversationTurn, humanize: bool) -> String {
    let mut out = turn.content.clone();

    if turn.is_error() {
        let kind = turn
            .raw_response
            .as_ref()
            .and_then(|r| r.error_kind)
            .unwrap_or(ErrorKind::Other);
        out.push_str("\n\n");
        out.push_str(&render_error(kind));
        return out;
    }

    if let Some(table) = &turn.table {
        if humanize {
            out.push_str("\n\n");
            out.push_str(&render_table(table, true));
        }
    }
    if let Some(query) = &turn.query {
        out.push_str("\n\nSQL:\n");
        for line in query.lines() {
            let _ = writeln!(out, "  {}", line);
        }
        out.truncate(out.trim_end().len());
    }
    out
}

/// `/history`: questions newest first, with a one-line answer preview
pub fn render_history(session: &Session) -> String {
    let exchanges = session.exchanges();
    if exchanges.is_empty() {
        return "No messages yet.".to_string();
    }

    let mut out = String::new();
    for (i, exchange) in exchanges.iter().enumerate() {
        let _ = writeln!(
            out,
            "{}. [{}] {}",
            i + 1,
            exchange.question.timestamp.format("%H:%M:%S"),
            exchange.question.content
        );
        let summary = match exchange.answer {
            Some(answer) => preview(&answer.content, 80),
            None => "(no answer)".to_string(),
        };
        let _ = writeln!(out, "   -> {}", summary);
    }
    out.truncate(out.trim_end().len());
    out
}

/// `/stats`: session counters
pub fn render_stats(session: &Session) -> String {
    format!(
        "Session: {}\nQuestions: {}\nResponses: {}\nTurns kept: {}/{}",
        session.id(),
        session.question_count(),
        session.response_count(),
        session.len(),
        session.max_turns()
    )
}

fn preview(text: &str, max_chars: usize) -> String {
    let first_line = text.lines().next().unwrap_or_default();
    if first_line.chars().count() <= max_chars {
        return first_line.to_string();
    }
    let cut: String = first_line.chars().take(max_chars).collect();
    format!("{}...", cut)
}
