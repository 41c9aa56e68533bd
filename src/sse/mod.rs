//! SSE (Server-Sent Events) stream decoding for the ADK `/run_sse` endpoint.
//!
//! The backend sends one JSON event per `data:` line, with events separated
//! by a blank line:
//!
//! ```text
//! data: {"content":{"parts":[{"text":"Hi"}]},"author":"bot","partial":true}
//!
//! data: {"content":{"parts":[{"text":" there"}]},"author":"bot","partial":true}
//!
//! ```
//!
//! # Module structure
//! - `decoder` - byte chunks to [`SsePayload`]s ([`SseDecoder`])
//! - `stream` - async adapter over a response byte stream, with cancellation
//! - `classify` - payload to [`StreamEvent`] disposition
//! - `payloads` - serde model of the ADK event JSON
//! - `events` - decoder output, diagnostics and counters

pub mod classify;
mod decoder;
mod events;
pub mod payloads;
mod stream;

pub use classify::{classify, ContentChunk, StreamEvent};
pub use decoder::SseDecoder;
pub use events::{DecodeDiagnostic, DecodeStats, SsePayload};
pub use payloads::{AgentEvent, GroundingMetadata, DEFAULT_AUTHOR};
pub use stream::{decode_stream, decode_stream_with};
