//! Event classification.
//!
//! Decides what a decoded payload means for the conversation. Rules, in
//! priority order:
//!
//! 1. a truthy `error` field (or an ADK `errorCode`/`errorMessage`) is an error
//! 2. no `content.parts` sequence: ignored
//! 3. no image content and `partial` not `true`: ignored (the consolidated
//!    final message repeats text already streamed)
//! 4. otherwise the parts are concatenated into a chunk; an empty chunk is
//!    ignored

use serde_json::Value;
use tracing::{debug, warn};

use super::events::SsePayload;
use super::payloads::{AgentEvent, GroundingMetadata, Part, DEFAULT_AUTHOR};
use crate::error::{normalize_error_payload, ErrorPayload, NormalizedError};
use crate::media;

/// A text fragment attributed to one author.
#[derive(Debug, Clone, PartialEq)]
pub struct ContentChunk {
    pub author: String,
    pub text: String,
    pub grounding: Option<GroundingMetadata>,
    /// The event carried a `finishReason`
    pub finished: bool,
}

/// Disposition of one payload.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    Chunk(ContentChunk),
    /// An inline media reference delivered as a raw `data:` URL
    RawMedia(ContentChunk),
    /// Ends consumption of the current stream
    Error(NormalizedError),
    Ignore,
}

impl StreamEvent {
    pub fn is_error(&self) -> bool {
        matches!(self, StreamEvent::Error(_))
    }
}

/// Classify one decoded payload.
pub fn classify(payload: &SsePayload) -> StreamEvent {
    match payload {
        SsePayload::RawMedia(url) => StreamEvent::RawMedia(ContentChunk {
            author: DEFAULT_AUTHOR.to_string(),
            text: media::img_tag_from_data_url(url),
            grounding: None,
            finished: false,
        }),
        SsePayload::Json(value) => classify_value(value),
    }
}

fn classify_value(value: &Value) -> StreamEvent {
    if is_error_event(value) {
        let normalized = normalize_error_payload(&ErrorPayload::from_value(value));
        warn!(category = %normalized.category, "Agent stream reported an error");
        return StreamEvent::Error(normalized);
    }

    let event = AgentEvent::from_value(value);
    let Some(content) = event.content.as_ref() else {
        return StreamEvent::Ignore;
    };

    let has_image = content.parts.iter().any(Part::has_image);
    if !has_image && !event.is_partial() {
        debug!("Skipping non-partial consolidated event");
        return StreamEvent::Ignore;
    }

    let text: String = content.parts.iter().map(render_part).collect();
    if text.is_empty() {
        return StreamEvent::Ignore;
    }

    StreamEvent::Chunk(ContentChunk {
        author: event.resolved_author(),
        text,
        grounding: event.grounding_metadata.filter(|g| !g.is_empty()),
        finished: event.finish_reason.is_some(),
    })
}

fn render_part(part: &Part) -> String {
    if let Some(text) = &part.text {
        return text.clone();
    }
    part.images()
        .iter()
        .map(|image| media::img_tag(&image.mime_type, &image.data))
        .collect()
}

/// JavaScript truthiness of the `error` field, plus ADK's own error fields.
fn is_error_event(value: &Value) -> bool {
    let truthy = match value.get("error") {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Number(n)) => n.as_f64().map_or(false, |n| n != 0.0),
        Some(Value::Array(_)) | Some(Value::Object(_)) => true,
    };
    truthy
        || ["errorCode", "errorMessage", "error_code", "error_message"]
            .iter()
            .any(|key| value.get(*key).and_then(Value::as_str).is_some_and(|s| !s.is_empty()))
}
