//! Incremental byte-to-payload decoder.
//!
//! Bytes are decoded to text as they arrive, carrying an incomplete UTF-8
//! sequence over to the next chunk. The text buffer is split on blank lines
//! (`\n\n`); each complete segment yields at most one payload, taken from its
//! first `data:` line. The incomplete tail stays buffered.

use std::fmt;

use serde_json::Value;
use tracing::debug;

use super::events::{preview, DecodeDiagnostic, DecodeStats, SsePayload};

const SEGMENT_BOUNDARY: &str = "\n\n";
const DATA_PREFIX: &str = "data:";

type DiagnosticSink = Box<dyn FnMut(&DecodeDiagnostic) + Send>;

/// Stateful SSE decoder for a single response stream.
#[derive(Default)]
pub struct SseDecoder {
    /// Decoded text not yet terminated by a segment boundary
    buffer: String,
    /// Trailing bytes of an incomplete UTF-8 sequence
    pending: Vec<u8>,
    stats: DecodeStats,
    sink: Option<DiagnosticSink>,
}

impl fmt::Debug for SseDecoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SseDecoder")
            .field("buffered", &self.buffer.len())
            .field("pending", &self.pending.len())
            .field("stats", &self.stats)
            .finish()
    }
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report every skipped segment to `sink`.
    pub fn with_diagnostics<F>(mut self, sink: F) -> Self
    where
        F: FnMut(&DecodeDiagnostic) + Send + 'static,
    {
        self.sink = Some(Box::new(sink));
        self
    }

    pub fn stats(&self) -> DecodeStats {
        self.stats
    }

    /// Feed one chunk of bytes and return the payloads it completed.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<SsePayload> {
        self.stats.bytes += chunk.len();
        self.decode_utf8(chunk);

        let mut payloads = Vec::new();
        while let Some(pos) = self.buffer.find(SEGMENT_BOUNDARY) {
            let segment: String = self.buffer.drain(..pos + SEGMENT_BOUNDARY.len()).collect();
            if let Some(payload) = self.process_segment(&segment[..pos]) {
                payloads.push(payload);
            }
        }
        payloads
    }

    /// Signal end of stream.
    ///
    /// An unterminated trailing segment is discarded, with one exception: a
    /// bare JSON error body (the backend's non-streaming error response) is
    /// surfaced so that the caller still sees the error.
    pub fn finish(&mut self) -> Vec<SsePayload> {
        if !self.pending.is_empty() {
            let tail = std::mem::take(&mut self.pending);
            self.buffer.push_str(&String::from_utf8_lossy(&tail));
            self.stats.replaced_sequences += 1;
        }

        let rest = std::mem::take(&mut self.buffer);
        let trimmed = rest.trim();
        if trimmed.is_empty() {
            return Vec::new();
        }

        if let Some(body) = bare_error_body(trimmed) {
            debug!("Surfacing non-streaming error body");
            self.stats.payloads += 1;
            return vec![SsePayload::Json(body)];
        }

        self.report(DecodeDiagnostic::DiscardedTrailing { len: rest.len() });
        Vec::new()
    }

    /// Append `chunk` to the text buffer, holding back an incomplete
    /// trailing sequence and replacing invalid ones with U+FFFD.
    fn decode_utf8(&mut self, chunk: &[u8]) {
        let owned;
        let mut input: &[u8] = if self.pending.is_empty() {
            chunk
        } else {
            let mut joined = std::mem::take(&mut self.pending);
            joined.extend_from_slice(chunk);
            owned = joined;
            &owned
        };

        loop {
            match std::str::from_utf8(input) {
                Ok(text) => {
                    self.buffer.push_str(text);
                    return;
                }
                Err(err) => {
                    let (valid, rest) = input.split_at(err.valid_up_to());
                    // `valid_up_to` bytes always form valid UTF-8
                    self.buffer
                        .push_str(std::str::from_utf8(valid).unwrap_or_default());
                    match err.error_len() {
                        None => {
                            self.pending.extend_from_slice(rest);
                            return;
                        }
                        Some(len) => {
                            self.buffer.push(char::REPLACEMENT_CHARACTER);
                            self.stats.replaced_sequences += 1;
                            input = &rest[len..];
                        }
                    }
                }
            }
        }
    }

    fn process_segment(&mut self, segment: &str) -> Option<SsePayload> {
        self.stats.segments += 1;

        let Some(line) = segment.lines().find(|l| l.starts_with(DATA_PREFIX)) else {
            self.report(DecodeDiagnostic::NoDataLine);
            return None;
        };
        let payload = line[DATA_PREFIX.len()..].trim();

        if payload.starts_with(DATA_PREFIX) {
            self.stats.payloads += 1;
            self.stats.raw_media += 1;
            return Some(SsePayload::RawMedia(payload.to_string()));
        }

        if !payload.starts_with('{') && !payload.starts_with('[') {
            self.report(DecodeDiagnostic::NonJsonPayload {
                preview: preview(payload),
            });
            return None;
        }

        match serde_json::from_str::<Value>(payload) {
            Ok(value) => {
                self.stats.payloads += 1;
                Some(SsePayload::Json(value))
            }
            Err(e) => {
                self.report(DecodeDiagnostic::InvalidJson {
                    error: e.to_string(),
                    preview: preview(payload),
                });
                None
            }
        }
    }

    fn report(&mut self, diagnostic: DecodeDiagnostic) {
        match &diagnostic {
            DecodeDiagnostic::NoDataLine => self.stats.no_data_line += 1,
            DecodeDiagnostic::NonJsonPayload { .. } => self.stats.noise += 1,
            DecodeDiagnostic::InvalidJson { .. } => self.stats.parse_failures += 1,
            DecodeDiagnostic::DiscardedTrailing { .. } => {}
        }
        debug!(?diagnostic, "Skipped SSE segment");
        if let Some(sink) = self.sink.as_mut() {
            sink(&diagnostic);
        }
    }
}

/// A whole response body of the form `{"error": ...}` with no SSE framing.
fn bare_error_body(text: &str) -> Option<Value> {
    if !text.starts_with('{') {
        return None;
    }
    let value: Value = serde_json::from_str(text).ok()?;
    value.get("error").is_some().then_some(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    fn feed_all(decoder: &mut SseDecoder, chunks: &[&[u8]]) -> Vec<SsePayload> {
        let mut out: Vec<SsePayload> = chunks.iter().flat_map(|c| decoder.feed(c)).collect();
        out.extend(decoder.finish());
        out
    }

    #[test]
    fn test_single_event() {
        let mut decoder = SseDecoder::new();
        let out = decoder.feed(b"data: {\"a\":1}\n\n");
        assert_eq!(out, vec![SsePayload::Json(json!({"a": 1}))]);
    }

    #[test]
    fn test_incomplete_segment_is_retained() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.feed(b"data: {\"a\":").is_empty());
        assert!(decoder.feed(b"1}\n").is_empty());
        assert_eq!(decoder.feed(b"\n"), vec![SsePayload::Json(json!({"a": 1}))]);
    }

    #[test]
    fn test_multiple_events_in_one_chunk() {
        let mut decoder = SseDecoder::new();
        let out = decoder.feed(b"data: {\"n\":1}\n\ndata: {\"n\":2}\n\ndata: {\"n\"");
        assert_eq!(out.len(), 2);
        assert_eq!(decoder.stats().segments, 2);
    }

    #[test]
    fn test_first_data_line_only() {
        let mut decoder = SseDecoder::new();
        let out = decoder.feed(b"event: message\ndata: {\"n\":1}\ndata: {\"n\":2}\n\n");
        assert_eq!(out, vec![SsePayload::Json(json!({"n": 1}))]);
    }

    #[test]
    fn test_data_prefix_without_space() {
        let mut decoder = SseDecoder::new();
        let out = decoder.feed(b"data:{\"n\":1}\r\n\n");
        assert_eq!(out, vec![SsePayload::Json(json!({"n": 1}))]);
    }

    #[test]
    fn test_segment_without_data_line() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.feed(b": keepalive\n\nevent: ping\n\n").is_empty());
        assert_eq!(decoder.stats().no_data_line, 2);
    }

    #[test]
    fn test_raw_media_payload() {
        let mut decoder = SseDecoder::new();
        let out = decoder.feed(b"data: data:image/png;base64,AAAA\n\n");
        assert_eq!(
            out,
            vec![SsePayload::RawMedia("data:image/png;base64,AAAA".to_string())]
        );
        assert_eq!(decoder.stats().raw_media, 1);
    }

    #[test]
    fn test_noise_and_invalid_json_are_skipped() {
        let diagnostics = Arc::new(Mutex::new(Vec::new()));
        let sink = diagnostics.clone();
        let mut decoder =
            SseDecoder::new().with_diagnostics(move |d| sink.lock().unwrap().push(d.clone()));

        let out = decoder.feed(b"data: [DONE]x\n\ndata: hello\n\ndata: {\"broken\n\ndata: {\"ok\":true}\n\n");

        // "[DONE]x" starts with '[' so it is parsed and fails
        assert_eq!(out, vec![SsePayload::Json(json!({"ok": true}))]);
        let stats = decoder.stats();
        assert_eq!(stats.noise, 1);
        assert_eq!(stats.parse_failures, 2);
        assert_eq!(stats.skipped(), 3);

        let diagnostics = diagnostics.lock().unwrap();
        assert_eq!(diagnostics.len(), 3);
        assert!(matches!(diagnostics[1], DecodeDiagnostic::NonJsonPayload { .. }));
    }

    #[test]
    fn test_multibyte_split_across_chunks() {
        let text = "data: {\"text\":\"héllo 🌍\"}\n\n".as_bytes();
        // Split inside the 4-byte emoji
        let emoji_start = text.windows(4).position(|w| w == "🌍".as_bytes()).unwrap();
        let (a, b) = text.split_at(emoji_start + 2);

        let mut decoder = SseDecoder::new();
        let out = feed_all(&mut decoder, &[a, b]);
        assert_eq!(out, vec![SsePayload::Json(json!({"text": "héllo 🌍"}))]);
        assert_eq!(decoder.stats().replaced_sequences, 0);
    }

    #[test]
    fn test_invalid_utf8_is_replaced() {
        let mut decoder = SseDecoder::new();
        let out = decoder.feed(b"data: {\"t\":\"a\xffb\"}\n\n");
        assert_eq!(out, vec![SsePayload::Json(json!({"t": "a\u{FFFD}b"}))]);
        assert_eq!(decoder.stats().replaced_sequences, 1);
    }

    #[test]
    fn test_finish_discards_unterminated_event() {
        let diagnostics = Arc::new(Mutex::new(Vec::new()));
        let sink = diagnostics.clone();
        let mut decoder =
            SseDecoder::new().with_diagnostics(move |d| sink.lock().unwrap().push(d.clone()));
        decoder.feed(b"data: {\"n\":1}");
        assert!(decoder.finish().is_empty());
        assert!(matches!(
            diagnostics.lock().unwrap()[0],
            DecodeDiagnostic::DiscardedTrailing { .. }
        ));
    }

    #[test]
    fn test_finish_surfaces_bare_error_body() {
        let mut decoder = SseDecoder::new();
        decoder.feed(b"{\"error\": \"Session not found\"}");
        assert_eq!(
            decoder.finish(),
            vec![SsePayload::Json(json!({"error": "Session not found"}))]
        );
    }

    #[test]
    fn test_finish_on_clean_stream_is_empty() {
        let mut decoder = SseDecoder::new();
        decoder.feed(b"data: {}\n\n");
        assert!(decoder.finish().is_empty());
    }
}
