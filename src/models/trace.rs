//! Trace spans and the invocation tree built from them.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Attribute carrying the agent that produced a span.
pub const AGENT_NAME_ATTRIBUTE: &str = "gen_ai.agent.name";

/// One recorded execution interval. Times are in nanoseconds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Span {
    #[serde(default)]
    pub name: String,
    #[serde(deserialize_with = "deserialize_id")]
    pub span_id: String,
    #[serde(default, deserialize_with = "deserialize_opt_id")]
    pub trace_id: Option<String>,
    #[serde(default)]
    pub start_time: u64,
    #[serde(default)]
    pub end_time: u64,
    #[serde(default)]
    pub attributes: HashMap<String, Value>,
    #[serde(default, deserialize_with = "deserialize_opt_id")]
    pub parent_span_id: Option<String>,
}

/// Response of the trace endpoint: a bare array or `{value, Count}`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum TraceResponse {
    Spans(Vec<Span>),
    Wrapped {
        #[serde(default)]
        value: Vec<Span>,
        #[serde(default, rename = "Count")]
        count: Option<usize>,
    },
}

impl TraceResponse {
    pub fn into_spans(self) -> Vec<Span> {
        match self {
            TraceResponse::Spans(spans) => spans,
            TraceResponse::Wrapped { value, .. } => value,
        }
    }
}

/// A span placed in the call tree.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct InvocationNode {
    pub id: String,
    pub name: String,
    pub duration_ms: f64,
    pub agent_name: Option<String>,
    pub start_time: u64,
    pub children: Vec<InvocationNode>,
}

/// Group spans by parent. Roots are spans with no parent. Spans whose
/// parent is not in the set are dropped, along with their subtrees. Roots
/// and children are ordered by start time.
pub fn build_invocation_tree(spans: &[Span]) -> Vec<InvocationNode> {
    let mut children_of: HashMap<&str, Vec<&Span>> = HashMap::new();
    let mut roots: Vec<&Span> = Vec::new();

    for span in spans {
        match span.parent_span_id.as_deref() {
            None => roots.push(span),
            Some(parent) => children_of.entry(parent).or_default().push(span),
        }
    }

    roots.sort_by_key(|s| s.start_time);
    roots
        .into_iter()
        .map(|span| build_node(span, &children_of, 0))
        .collect()
}

// A trace with duplicate span ids can link a span to itself.
const MAX_DEPTH: usize = 256;

fn build_node(span: &Span, children_of: &HashMap<&str, Vec<&Span>>, depth: usize) -> InvocationNode {
    let mut children: Vec<&Span> = if depth < MAX_DEPTH {
        children_of
            .get(span.span_id.as_str())
            .cloned()
            .unwrap_or_default()
    } else {
        Vec::new()
    };
    children.sort_by_key(|s| s.start_time);

    InvocationNode {
        id: span.span_id.clone(),
        name: span.name.clone(),
        duration_ms: span.end_time.saturating_sub(span.start_time) as f64 / 1_000_000.0,
        agent_name: span
            .attributes
            .get(AGENT_NAME_ATTRIBUTE)
            .and_then(Value::as_str)
            .map(str::to_string),
        start_time: span.start_time,
        children: children
            .into_iter()
            .map(|child| build_node(child, children_of, depth + 1))
            .collect(),
    }
}

/// `450ms`, `1.25s`; empty for zero.
pub fn format_duration(ms: f64) -> String {
    if ms <= 0.0 {
        String::new()
    } else if ms < 1000.0 {
        format!("{:.0}ms", ms)
    } else {
        format!("{:.2}s", ms / 1000.0)
    }
}

/// Span ids arrive as strings or as numbers, sometimes beyond `u64`.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Text(String),
    Unsigned(u64),
    Signed(i64),
    Float(f64),
}

impl From<RawId> for String {
    fn from(id: RawId) -> Self {
        match id {
            RawId::Text(text) => text,
            RawId::Unsigned(n) => n.to_string(),
            RawId::Signed(n) => n.to_string(),
            RawId::Float(n) => format!("{:.0}", n),
        }
    }
}

fn deserialize_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    RawId::deserialize(deserializer).map(String::from)
}

fn deserialize_opt_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<RawId>::deserialize(deserializer)?.map(String::from))
}
