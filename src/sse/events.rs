//! Types produced by the SSE decoder.

use serde_json::Value;

/// One payload extracted from an SSE segment.
#[derive(Debug, Clone, PartialEq)]
pub enum SsePayload {
    /// A `data:` line carrying JSON
    Json(Value),
    /// A `data:` line whose payload is itself a `data:` URL (inline media)
    RawMedia(String),
}

/// Why a segment produced no payload. Reported to the diagnostic sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeDiagnostic {
    /// The segment had no line starting with `data:`
    NoDataLine,
    /// The payload did not start with `{` or `[`
    NonJsonPayload { preview: String },
    /// The payload looked like JSON but failed to parse
    InvalidJson { error: String, preview: String },
    /// Text left in the buffer when the stream ended
    DiscardedTrailing { len: usize },
}

/// Counters kept by the decoder over one stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecodeStats {
    pub bytes: usize,
    pub segments: usize,
    pub payloads: usize,
    pub raw_media: usize,
    pub no_data_line: usize,
    pub noise: usize,
    pub parse_failures: usize,
    /// Invalid UTF-8 sequences replaced with U+FFFD
    pub replaced_sequences: usize,
}

impl DecodeStats {
    /// Segments that were dropped for any reason.
    pub fn skipped(&self) -> usize {
        self.no_data_line + self.noise + self.parse_failures
    }
}

const PREVIEW_CHARS: usize = 80;

pub(crate) fn preview(text: &str) -> String {
    if text.chars().count() > PREVIEW_CHARS {
        let head: String = text.chars().take(PREVIEW_CHARS).collect();
        format!("{}...", head)
    } else {
        text.to_string()
    }
}
