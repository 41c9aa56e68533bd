//! Line-based terminal rendering of the conversation and traces.

use std::collections::{HashMap, HashSet};

use crossterm::style::Stylize;
use unicode_width::UnicodeWidthStr;

use crate::media::{decoded_len, split_segments, Segment};
use crate::models::{format_agent_name, format_duration, DisplayMessage, InvocationNode, MessageRole};
use crate::sse::GroundingMetadata;
use crate::state::ConversationState;

/// Prints conversation snapshots incrementally.
///
/// Each call to [`Transcript::update`] returns only what changed since the
/// previous call: new bubbles with a header, and text appended to bubbles
/// already on screen. When an earlier bubble grows after another one was
/// printed, its header is repeated with "(cont.)". User messages are not
/// printed since the user just typed them.
#[derive(Debug, Default)]
pub struct Transcript {
    styled: bool,
    /// Message id -> bytes of text already printed
    printed: HashMap<u64, usize>,
    grounded: HashSet<u64>,
    last: Option<u64>,
}

impl Transcript {
    pub fn new(styled: bool) -> Self {
        Self {
            styled,
            ..Self::default()
        }
    }

    /// Output for everything that changed in `state`.
    pub fn update(&mut self, state: &ConversationState) -> String {
        let mut out = String::new();
        for message in state.messages() {
            if message.loading || message.role == MessageRole::User {
                continue;
            }
            match self.printed.get(&message.id).copied() {
                None => {
                    self.start_block(&mut out);
                    out.push_str(&self.header(message, false));
                    out.push_str(&render_text(&message.text));
                }
                Some(len) if message.text.len() > len => {
                    if self.last != Some(message.id) {
                        self.start_block(&mut out);
                        out.push_str(&self.header(message, true));
                    }
                    out.push_str(&render_text(message.text.get(len..).unwrap_or_default()));
                }
                Some(_) => continue,
            }
            self.printed.insert(message.id, message.text.len());
            self.last = Some(message.id);
        }
        out
    }

    /// Grounding notes for bubbles that have them, once each. Called when a
    /// turn is over.
    pub fn finish_turn(&mut self, state: &ConversationState) -> String {
        let mut out = String::new();
        for message in state.messages() {
            let Some(grounding) = &message.grounding else {
                continue;
            };
            if self.grounded.insert(message.id) {
                out.push('\n');
                out.push_str(&grounding_lines(grounding).join("\n"));
            }
        }
        if !out.is_empty() || self.last.is_some() {
            out.push('\n');
        }
        self.last = None;
        out
    }

    fn start_block(&self, out: &mut String) {
        if self.last.is_some() {
            out.push('\n');
        }
    }

    fn header(&self, message: &DisplayMessage, continued: bool) -> String {
        let label = match message.role {
            MessageRole::System if self.styled => return format!("{} ", "*".yellow()),
            MessageRole::System => return "* ".to_string(),
            MessageRole::User => "You".to_string(),
            MessageRole::Agent => format_agent_name(message.author.as_deref().unwrap_or("model")),
        };
        let label = if continued {
            format!("{} (cont.)", label)
        } else {
            label
        };
        if self.styled {
            format!("{}\n", label.bold().cyan())
        } else {
            format!("{}\n", label)
        }
    }
}

/// Message text with inline images replaced by a placeholder.
pub fn render_text(text: &str) -> String {
    split_segments(text)
        .into_iter()
        .map(|segment| match segment {
            Segment::Text(text) => text,
            Segment::Image { mime_type, data } => {
                format!("[image: {}, {} bytes]", mime_type, decoded_len(&data))
            }
        })
        .collect()
}

/// Search queries and cited sources.
pub fn grounding_lines(grounding: &GroundingMetadata) -> Vec<String> {
    let mut lines = Vec::new();
    if !grounding.web_search_queries.is_empty() {
        lines.push(format!("  Searched: {}", grounding.web_search_queries.join(", ")));
    }
    let sources = grounding
        .grounding_chunks
        .iter()
        .filter_map(|chunk| chunk.web.as_ref());
    for (i, web) in sources.enumerate() {
        let title = web.title.as_deref().unwrap_or("source");
        match &web.uri {
            Some(uri) => lines.push(format!("  [{}] {} - {}", i + 1, title, uri)),
            None => lines.push(format!("  [{}] {}", i + 1, title)),
        }
    }
    lines
}

/// One line per app: marker for the selected one, id, then display name
/// aligned in a column.
pub fn app_lines(apps: &[String], selected: Option<&str>) -> Vec<String> {
    let width = apps.iter().map(|a| a.width()).max().unwrap_or(0);
    apps.iter()
        .map(|app| {
            let marker = if selected == Some(app.as_str()) { '*' } else { ' ' };
            let pad = " ".repeat(width - app.width());
            format!("{} {}{}  {}", marker, app, pad, format_agent_name(app))
        })
        .collect()
}

/// The invocation tree, one span per line, children indented.
///
/// ```text
/// invocation 1.20s
///   agent_run [my_agent] 1.10s
///     call_llm 950ms
/// ```
pub fn trace_lines(nodes: &[InvocationNode]) -> Vec<String> {
    let mut lines = Vec::new();
    for node in nodes {
        push_node(node, 0, &mut lines);
    }
    lines
}

fn push_node(node: &InvocationNode, depth: usize, lines: &mut Vec<String>) {
    let mut line = format!("{}{}", "  ".repeat(depth), node.name);
    if let Some(agent) = &node.agent_name {
        line.push_str(&format!(" [{}]", agent));
    }
    let duration = format_duration(node.duration_ms);
    if !duration.is_empty() {
        line.push(' ');
        line.push_str(&duration);
    }
    lines.push(line);
    for child in &node.children {
        push_node(child, depth + 1, lines);
    }
}
