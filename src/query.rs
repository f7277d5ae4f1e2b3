//! Embedded SQL extraction from agent trace trees
//!
//! Traces are arbitrary JSON. The search walks them depth-first and, at
//! each node, tries in order:
//!
//! 1. the action-group request body (`invocationInput` ->
//!    `actionGroupInvocationInput.requestBody.content["application/json"]`,
//!    a list of `{name, value}` parameters) for a `sql_query` parameter
//! 2. any key named `sql_query`, `query` or `sql` holding SQL-looking text
//! 3. the node's children, where plain strings get a regex scan
//!
//! The first hit anywhere ends the search.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::{Map, Value};

const SQL_KEYWORDS: [&str; 5] = ["select", "with", "insert", "update", "delete"];

const QUERY_KEYS: [&str; 3] = ["sql_query", "query", "sql"];

/// Depth-first visitor over a JSON tree
///
/// `walk` calls the hook for a node before descending into its children
/// and stops as soon as a hook returns `Some`.
pub trait TreeVisitor {
    type Output;

    /// Inspect a mapping before its values are visited
    fn visit_mapping(&self, _map: &Map<String, Value>) -> Option<Self::Output> {
        None
    }

    /// Inspect a string scalar
    fn visit_text(&self, _text: &str) -> Option<Self::Output> {
        None
    }
}

/// Walk `node` depth-first with `visitor`, children in document order
pub fn walk<V: TreeVisitor>(visitor: &V, node: &Value) -> Option<V::Output> {
    match node {
        Value::Object(map) => {
            if let Some(found) = visitor.visit_mapping(map) {
                return Some(found);
            }
            map.values().find_map(|child| walk(visitor, child))
        }
        Value::Array(items) => items.iter().find_map(|child| walk(visitor, child)),
        Value::String(text) => visitor.visit_text(text),
        Value::Null | Value::Bool(_) | Value::Number(_) => None,
    }
}

/// Finds the first SQL statement in a trace tree
#[derive(Debug, Default, Clone, Copy)]
pub struct QueryVisitor;

impl QueryVisitor {
    /// `sql_query` parameter of an action-group invocation
    fn structural(map: &Map<String, Value>) -> Option<String> {
        let invocations: Vec<&Value> = match map.get("invocationInput")? {
            Value::Array(items) => items.iter().collect(),
            single @ Value::Object(_) => vec![single],
            _ => return None,
        };

        invocations.into_iter().find_map(|invocation| {
            let parameters = invocation
                .get("actionGroupInvocationInput")?
                .get("requestBody")?
                .get("content")?
                .get("application/json")?
                .as_array()?;

            parameters.iter().find_map(|parameter| {
                if parameter.get("name")?.as_str()? != "sql_query" {
                    return None;
                }
                let value = parameter.get("value")?.as_str()?;
                looks_like_sql(value).then(|| tidy(value))
            })
        })
    }

    /// A query-named key holding SQL text
    fn key_scan(map: &Map<String, Value>) -> Option<String> {
        map.iter().find_map(|(key, value)| {
            let key = key.to_lowercase();
            if !QUERY_KEYS.contains(&key.as_str()) {
                return None;
            }
            let text = value.as_str()?;
            looks_like_sql(text).then(|| tidy(text))
        })
    }
}

impl TreeVisitor for QueryVisitor {
    type Output = String;

    fn visit_mapping(&self, map: &Map<String, Value>) -> Option<String> {
        Self::structural(map).or_else(|| Self::key_scan(map))
    }

    fn visit_text(&self, text: &str) -> Option<String> {
        if !looks_like_sql(text) {
            return None;
        }
        statement_patterns()
            .iter()
            .find_map(|pattern| pattern.find(text))
            .map(|m| tidy(m.as_str()))
    }
}

/// Extract the first SQL statement from trace trees, if any
///
/// Never fails: a trace without SQL yields `None`.
pub fn extract_embedded_query(traces: &[Value]) -> Option<String> {
    let visitor = QueryVisitor;
    let found = traces.iter().find_map(|trace| walk(&visitor, trace));
    if let Some(query) = &found {
        tracing::debug!(chars = query.len(), "Found embedded query in trace");
    }
    found
}

fn looks_like_sql(text: &str) -> bool {
    let lower = text.to_lowercase();
    SQL_KEYWORDS.iter().any(|keyword| lower.contains(keyword))
}

/// Unescape literal `\n`/`\t` sequences and trim
fn tidy(text: &str) -> String {
    text.replace("\\n", "\n")
        .replace("\\t", "\t")
        .trim()
        .to_string()
}

fn statement_patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            r"(?is)WITH\s+.*?SELECT\s+.*?(?:;|$)",
            r"(?is)SELECT\s+.*?(?:;|$)",
            r"(?is)INSERT\s+.*?(?:;|$)",
            r"(?is)UPDATE\s+.*?(?:;|$)",
            r"(?is)DELETE\s+.*?(?:;|$)",
        ]
        .iter()
        .filter_map(|pattern| Regex::new(pattern).ok())
        .collect()
    })
}
