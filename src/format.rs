//! Response formatting: display text cleanup and markdown table parsing
//!
//! Everything here is total. Odd input produces degraded output or a
//! negative result, never an error.

use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

use crate::types::{AgentResponse, TableData};

/// Text shown when the agent produced nothing
pub const EMPTY_RESPONSE: &str = "No response received.";

/// A response ready for display
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormattedResponse {
    /// Cleaned answer text, or `Error: ...` for failures
    pub text: String,
    pub has_error: bool,
    /// Table found in a successful answer
    pub table: Option<TableData>,
    /// SQL statement found in the answer's traces
    pub query: Option<String>,
    pub session_id: String,
}

impl FormattedResponse {
    pub fn has_table(&self) -> bool {
        self.table.is_some()
    }
}

fn blank_run() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\n\s*\n\s*\n").unwrap())
}

fn separator_line() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*\|[\s\-|]*\|\s*$").unwrap())
}

/// Tidy agent text for display
///
/// Collapses runs of blank lines to one, rewrites table separator lines
/// like `| --- |  --- |` to `|---|---|`, and trims the result. Empty input
/// becomes [`EMPTY_RESPONSE`].
pub fn clean_text(raw: &str) -> String {
    if raw.trim().is_empty() {
        return EMPTY_RESPONSE.to_string();
    }

    // A single pass can leave a new triple behind; repeat until stable
    let mut text = raw.to_string();
    loop {
        let collapsed = blank_run().replace_all(&text, "\n\n").into_owned();
        if collapsed == text {
            break;
        }
        text = collapsed;
    }

    let lines: Vec<String> = text
        .split('\n')
        .map(|line| {
            if !separator_line().is_match(line) {
                return line.to_string();
            }
            let mut squeezed: String = line.chars().filter(|c| !c.is_whitespace()).collect();
            if !squeezed.starts_with('|') {
                squeezed.insert(0, '|');
            }
            if !squeezed.ends_with('|') {
                squeezed.push('|');
            }
            squeezed
        })
        .collect();

    lines.join("\n").trim().to_string()
}

/// Split a markdown table row into trimmed cells
///
/// One leading and one trailing empty cell (from `|` framing) are dropped.
pub fn parse_table_row(line: &str) -> Vec<String> {
    let mut cells: Vec<&str> = line.split('|').collect();
    if cells.first().is_some_and(|c| c.trim().is_empty()) {
        cells.remove(0);
    }
    if cells.last().is_some_and(|c| c.trim().is_empty()) {
        cells.pop();
    }
    cells.into_iter().map(|c| c.trim().to_string()).collect()
}

/// Find the first markdown table in `text`
///
/// A line with `|` and a `---` or `═══` run is a separator: it switches
/// table mode on and is skipped. Other `|` lines are captured while in
/// table mode, or when they hold at least two `|`. A blank line in table
/// mode ends the scan. The first captured line is the header; rows with a
/// different cell count are dropped. Returns `(false, None)` unless at
/// least one data row survives.
pub fn extract_table(text: &str) -> (bool, Option<TableData>) {
    let mut captured: Vec<&str> = Vec::new();
    let mut in_table = false;

    for raw in text.split('\n') {
        let line = raw.trim();
        if line.contains('|') {
            if line.contains("---") || line.contains("═══") {
                in_table = true;
                continue;
            }
            if in_table || line.matches('|').count() >= 2 {
                captured.push(line);
                in_table = true;
            }
        } else if in_table && line.is_empty() {
            break;
        }
    }

    if captured.len() < 2 {
        return (false, None);
    }

    let headers = parse_table_row(captured[0]);
    let mut rows = vec![headers.clone()];
    rows.extend(
        captured[1..]
            .iter()
            .map(|line| parse_table_row(line))
            .filter(|row| row.len() == headers.len()),
    );

    if rows.len() < 2 {
        return (false, None);
    }

    let row_count = rows.len() - 1;
    (
        true,
        Some(TableData {
            headers,
            rows,
            row_count,
        }),
    )
}

/// Prepare an agent response for display
///
/// Failures never carry a table.
pub fn format_response(response: &AgentResponse) -> FormattedResponse {
    if !response.is_success() {
        let detail = if response.text.is_empty() {
            "Unknown error occurred"
        } else {
            response.text.as_str()
        };
        return FormattedResponse {
            text: format!("Error: {}", detail),
            has_error: true,
            table: None,
            query: None,
            session_id: response.session_id.clone(),
        };
    }

    let text = clean_text(&response.text);
    let (_, table) = extract_table(&text);
    FormattedResponse {
        text,
        has_error: false,
        table,
        query: response.embedded_query(),
        session_id: response.session_id.clone(),
    }
}

/// Shorten a number for table display: `1.23M`, `4.5K`, `42`, `3.14`
///
/// Strings that are not numbers come back unchanged.
pub fn format_number(value: &str) -> String {
    let Ok(number) = value.trim().parse::<f64>() else {
        return value.to_string();
    };
    if !number.is_finite() {
        return value.to_string();
    }

    if number.abs() >= 1_000_000.0 {
        format!("{:.2}M", number / 1_000_000.0)
    } else if number.abs() >= 1_000.0 {
        format!("{:.1}K", number / 1_000.0)
    } else if number.fract() == 0.0 {
        format!("{}", number as i64)
    } else {
        format!("{:.2}", number)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::types::{AgentEvent, ResponseMetadata};

    fn metadata() -> ResponseMetadata {
        ResponseMetadata {
            agent_id: "A".into(),
            agent_alias_id: "B".into(),
            timestamp: chrono::Utc::now(),
            attempts: 1,
        }
    }

    // ========================================================================
    // clean_text
    // ========================================================================

    #[test]
    fn test_clean_empty() {
        assert_eq!(clean_text(""), EMPTY_RESPONSE);
        assert_eq!(clean_text("  \n\n "), EMPTY_RESPONSE);
    }

    #[test]
    fn test_clean_collapses_blank_lines() {
        assert_eq!(clean_text("a\n\n\n\nb"), "a\n\nb");
        assert_eq!(clean_text("a\n \n\t\n  \nb"), "a\n\nb");
        assert_eq!(clean_text("a\n\nb"), "a\n\nb");
    }

    #[test]
    fn test_clean_normalizes_separator() {
        let raw = "| a | b |\n| --- |  ---  |\n| 1 | 2 |";
        assert_eq!(clean_text(raw), "| a | b |\n|---|---|\n| 1 | 2 |");
        assert_eq!(clean_text("  |-- - | -|  "), "|---|-|");
        assert_eq!(clean_text("x\n   | :--- | ---: |"), "x\n   | :--- | ---: |");
    }

    #[test]
    fn test_clean_idempotent() {
        let samples = [
            "",
            "   ",
            "hello",
            "a\n\n\n\n\nb",
            "  lead\n\n \n\n \n trail  ",
            "| a | b |\n| --- | --- |\n\n\n\n| 1 | 2 |",
            "\n\n\n|  -  |\n\n",
            "x\n \n \n \n \ny",
        ];
        for sample in samples {
            let once = clean_text(sample);
            assert_eq!(clean_text(&once), once, "{sample:?}");
        }
    }

    // ========================================================================
    // Table extraction
    // ========================================================================

    #[test]
    fn test_parse_table_row() {
        assert_eq!(parse_table_row("| a | b |"), vec!["a", "b"]);
        assert_eq!(parse_table_row("a|b"), vec!["a", "b"]);
        assert_eq!(parse_table_row("| a || c |"), vec!["a", "", "c"]);
        assert_eq!(parse_table_row("|"), Vec::<String>::new());
    }

    #[test]
    fn test_extract_table_basic() {
        let text = "Here you go:\n\n| region | sales |\n|---|---|\n| east | 10 |\n| west | 20 |\n\nAnything else?";
        let (found, table) = extract_table(text);
        assert!(found);
        let table = table.unwrap();
        assert_eq!(table.headers, vec!["region", "sales"]);
        assert_eq!(table.row_count, 2);
        assert_eq!(table.rows.len(), 3);
        assert_eq!(table.data_rows()[1], vec!["west", "20"]);
    }

    #[test]
    fn test_extract_table_drops_mismatched_row() {
        let (found, table) = extract_table("| a | b |\n|---|---|\n| 1 | 2 |\n| 3 |");
        assert!(found);
        let table = table.unwrap();
        assert_eq!(
            table.rows,
            vec![vec!["a".to_string(), "b".to_string()], vec!["1".to_string(), "2".to_string()]]
        );
        assert_eq!(table.row_count, 1);
    }

    #[test]
    fn test_extract_table_without_separator() {
        let (found, table) = extract_table("| a | b |\n| 1 | 2 |\n3");
        assert!(found);
        assert_eq!(table.unwrap().row_count, 1);
    }

    #[test]
    fn test_extract_table_too_few_lines() {
        assert_eq!(extract_table(""), (false, None));
        assert_eq!(extract_table("just text"), (false, None));
        assert_eq!(extract_table("| a | b |\n|---|---|"), (false, None));
        // one pipe outside table mode is not captured
        assert_eq!(extract_table("a | b\nc | d"), (false, None));
    }

    #[test]
    fn test_extract_table_only_header_survives() {
        assert_eq!(
            extract_table("| a | b |\n|---|---|\n| 1 | 2 | 3 |\n| 4 |"),
            (false, None)
        );
    }

    #[test]
    fn test_extract_table_blank_line_ends_table() {
        let text = "| a | b |\n|---|---|\n| 1 | 2 |\n\n| x | y |\n| 5 | 6 |";
        let (_, table) = extract_table(text);
        assert_eq!(table.unwrap().row_count, 1);
    }

    #[test]
    fn test_extract_table_box_drawing_separator() {
        let text = "| name | n |\n|═══|═══|\n| a | 1 |";
        let (found, table) = extract_table(text);
        assert!(found);
        assert_eq!(table.unwrap().headers, vec!["name", "n"]);
    }

    #[test]
    fn test_every_row_matches_header_width() {
        let text = "| a | b | c |\n|---|---|---|\n| 1 | 2 | 3 |\n| 4 | 5 |\n| 6 | 7 | 8 |\n|9|";
        let (_, table) = extract_table(text);
        let table = table.unwrap();
        assert!(table.rows.iter().all(|r| r.len() == table.column_count()));
        assert_eq!(table.row_count, 2);
    }

    // ========================================================================
    // format_response
    // ========================================================================

    #[test]
    fn test_format_success() {
        let response = AgentResponse::success(
            "Totals:\n\n\n\n| a | b |\n| --- | --- |\n| 1 | 2 |",
            "s-1",
            vec![AgentEvent::Trace(serde_json::json!({"sql": "SELECT a, b FROM t"}))],
            metadata(),
        );
        let formatted = format_response(&response);
        assert!(!formatted.has_error);
        assert_eq!(formatted.text, "Totals:\n\n| a | b |\n|---|---|\n| 1 | 2 |");
        assert!(formatted.has_table());
        assert_eq!(formatted.query.as_deref(), Some("SELECT a, b FROM t"));
        assert_eq!(formatted.session_id, "s-1");
    }

    #[test]
    fn test_format_error_has_no_table() {
        let response = AgentResponse::failure(
            "| a | b |\n|---|---|\n| 1 | 2 |",
            ErrorKind::Other,
            "s-1",
            metadata(),
        );
        let formatted = format_response(&response);
        assert!(formatted.has_error);
        assert!(formatted.text.starts_with("Error: "));
        assert!(formatted.table.is_none());
        assert!(formatted.query.is_none());
    }

    #[test]
    fn test_format_empty_success() {
        let response = AgentResponse::success("", "s-1", vec![], metadata());
        let formatted = format_response(&response);
        assert_eq!(formatted.text, EMPTY_RESPONSE);
        assert!(!formatted.has_table());
    }

    // ========================================================================
    // format_number
    // ========================================================================

    #[test]
    fn test_format_number() {
        assert_eq!(format_number("1234567"), "1.23M");
        assert_eq!(format_number("-2500000"), "-2.50M");
        assert_eq!(format_number("4500"), "4.5K");
        assert_eq!(format_number("42"), "42");
        assert_eq!(format_number("42.0"), "42");
        assert_eq!(format_number("3.14159"), "3.14");
        assert_eq!(format_number("east"), "east");
        assert_eq!(format_number(""), "");
        assert_eq!(format_number("NaN"), "NaN");
    }
}
