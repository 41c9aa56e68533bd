//! Async adapter from a byte stream to decoded payloads.

use std::collections::VecDeque;

use bytes::Bytes;
use futures::stream::{self, Stream};
use futures_util::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::decoder::SseDecoder;
use super::events::SsePayload;
use crate::traits::HttpError;

/// Decode a response byte stream into SSE payloads.
///
/// The stream ends when the transport ends. A transport error is yielded
/// once and ends the stream. When `cancel` fires, `HttpError::Cancelled` is
/// yielded once and no further payload is produced, even ones already
/// decoded.
pub fn decode_stream<S>(
    bytes: S,
    cancel: CancellationToken,
) -> impl Stream<Item = Result<SsePayload, HttpError>> + Send
where
    S: Stream<Item = Result<Bytes, HttpError>> + Send + Unpin + 'static,
{
    decode_stream_with(bytes, SseDecoder::new(), cancel)
}

/// Like [`decode_stream`], with a preconfigured decoder.
pub fn decode_stream_with<S>(
    bytes: S,
    decoder: SseDecoder,
    cancel: CancellationToken,
) -> impl Stream<Item = Result<SsePayload, HttpError>> + Send
where
    S: Stream<Item = Result<Bytes, HttpError>> + Send + Unpin + 'static,
{
    let state = DecodeState {
        bytes,
        decoder,
        ready: VecDeque::new(),
        cancel,
        ended: false,
        done: false,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if state.done {
                return None;
            }
            if state.cancel.is_cancelled() {
                state.done = true;
                debug!(stats = ?state.decoder.stats(), "SSE stream cancelled");
                return Some((Err(HttpError::Cancelled), state));
            }
            if let Some(payload) = state.ready.pop_front() {
                return Some((Ok(payload), state));
            }
            if state.ended {
                return None;
            }

            let next = tokio::select! {
                biased;
                _ = state.cancel.cancelled() => continue,
                next = state.bytes.next() => next,
            };

            match next {
                Some(Ok(chunk)) => {
                    let payloads = state.decoder.feed(&chunk);
                    state.ready.extend(payloads);
                }
                Some(Err(e)) => {
                    state.done = true;
                    debug!(error = %e, "SSE transport failed mid-stream");
                    return Some((Err(e), state));
                }
                None => {
                    let payloads = state.decoder.finish();
                    state.ready.extend(payloads);
                    state.ended = true;
                    debug!(stats = ?state.decoder.stats(), "SSE stream ended");
                }
            }
        }
    })
}

struct DecodeState<S> {
    bytes: S,
    decoder: SseDecoder,
    /// Payloads decoded but not yet yielded
    ready: VecDeque<SsePayload>,
    cancel: CancellationToken,
    /// The transport has ended; only `ready` remains
    ended: bool,
    /// Nothing more will be yielded
    done: bool,
}
