//! Route handlers.

use std::convert::Infallible;

use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
};
use bytes::Bytes;
use futures::stream::{self, Stream};
use futures_util::StreamExt;
use serde_json::{json, Value};
use tracing::{debug, error};

use super::server::ProxyState;
use crate::client::ByteStream;
use crate::models::SessionKey;
use crate::traits::{Headers, HttpError, Response as UpstreamResponse};

const RUN_FAILED_MESSAGE: &str = "Failed to run agent";
const STREAM_ERROR_MESSAGE: &str = "Stream connection error";
const INTERNAL_ERROR_MESSAGE: &str = "Internal server error";
const MAX_ERROR_BODY_CHARS: usize = 200;

/// One SSE frame carrying `{"error": true, status, message, details}`.
pub fn sse_error_event(status: u16, message: &str, details: &str) -> Bytes {
    let event = json!({
        "error": true,
        "status": status,
        "message": message,
        "details": details,
    });
    Bytes::from(format!("data: {}\n\n", event))
}

fn json_headers() -> Headers {
    let mut headers = Headers::new();
    headers.insert("Content-Type".to_string(), "application/json".to_string());
    headers
}

fn error_response(message: &str) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": message })),
    )
        .into_response()
}

/// Relay an upstream response's status, content type and body.
fn passthrough(upstream: UpstreamResponse) -> Response {
    let status = StatusCode::from_u16(upstream.status).unwrap_or(StatusCode::BAD_GATEWAY);
    let content_type = upstream
        .headers
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case("content-type"))
        .map(|(_, value)| value.clone())
        .unwrap_or_else(|| "application/json".to_string());
    (status, [(header::CONTENT_TYPE, content_type)], upstream.body).into_response()
}

/// Answer with an already-formed event stream.
fn event_stream(body: Body) -> Response {
    (
        [
            (header::CONTENT_TYPE, "text/event-stream"),
            (header::CACHE_CONTROL, "no-cache"),
            (header::CONNECTION, "keep-alive"),
        ],
        body,
    )
        .into_response()
}

fn single_event(event: Bytes) -> Response {
    event_stream(Body::from(event))
}

pub(super) async fn health(State(state): State<ProxyState>) -> Json<Value> {
    Json(json!({ "status": "ok", "target": state.target }))
}

pub(super) async fn list_apps(State(state): State<ProxyState>) -> Response {
    match state.http.get(&state.url("/list-apps"), &Headers::new()).await {
        Ok(upstream) => passthrough(upstream),
        Err(e) => {
            error!("Error fetching apps: {}", e);
            error_response("Failed to fetch apps")
        }
    }
}

pub(super) async fn get_session(
    State(state): State<ProxyState>,
    Path((app, user, session)): Path<(String, String, String)>,
) -> Response {
    let url = state.url(&SessionKey::new(app, user, session).path());
    match state.http.get(&url, &Headers::new()).await {
        Ok(upstream) => passthrough(upstream),
        Err(e) => {
            error!("Error fetching session: {}", e);
            error_response("Failed to fetch session")
        }
    }
}

pub(super) async fn create_session(
    State(state): State<ProxyState>,
    Path((app, user, session)): Path<(String, String, String)>,
    body: String,
) -> Response {
    let url = state.url(&SessionKey::new(app, user, session).path());
    match state.http.post(&url, &body, &json_headers()).await {
        Ok(upstream) => passthrough(upstream),
        Err(e) => {
            error!("Error creating session: {}", e);
            error_response("Failed to create session")
        }
    }
}

pub(super) async fn delete_session(
    State(state): State<ProxyState>,
    Path((app, user, session)): Path<(String, String, String)>,
) -> Response {
    let url = state.url(&SessionKey::new(app, user, session).path());
    match state.http.delete(&url, &Headers::new()).await {
        Ok(upstream) => passthrough(upstream),
        Err(e) => {
            error!("Error deleting session: {}", e);
            error_response("Failed to delete session")
        }
    }
}

pub(super) async fn trace(
    State(state): State<ProxyState>,
    Path(session_id): Path<String>,
) -> Response {
    let url = state.url(&format!(
        "/debug/trace/session/{}",
        urlencoding::encode(&session_id)
    ));
    match state.http.get(&url, &Headers::new()).await {
        Ok(upstream) if upstream.is_success() => passthrough(upstream),
        Ok(upstream) => {
            let status =
                StatusCode::from_u16(upstream.status).unwrap_or(StatusCode::BAD_GATEWAY);
            let message = format!("Failed to fetch trace: {}", upstream.status);
            (status, Json(json!({ "error": message }))).into_response()
        }
        Err(e) => {
            error!("Error fetching trace: {}", e);
            error_response("Failed to fetch trace data")
        }
    }
}

pub(super) async fn run_sse(State(state): State<ProxyState>, body: String) -> Response {
    if let Err(e) = serde_json::from_str::<Value>(&body) {
        error!("Error in SSE proxy: {}", e);
        return single_event(sse_error_event(500, INTERNAL_ERROR_MESSAGE, &e.to_string()));
    }

    let mut headers = json_headers();
    headers.insert("Accept".to_string(), "text/event-stream".to_string());

    match state.http.post_stream(&state.url("/run_sse"), &body, &headers).await {
        Ok(upstream) => event_stream(Body::from_stream(relay(upstream))),
        Err(HttpError::ServerError { status, message }) => {
            let (message, details) = upstream_error_message(&message);
            debug!(status, %message, "Backend rejected run");
            single_event(sse_error_event(status, &message, &details))
        }
        Err(e) => {
            error!("Error in SSE proxy: {}", e);
            single_event(sse_error_event(500, INTERNAL_ERROR_MESSAGE, &e.to_string()))
        }
    }
}

/// Message and details for a non-2xx `/run_sse` answer.
///
/// A JSON body contributes `message` (or `error`) and `details`. Any other
/// body becomes the message, cut to 200 characters.
fn upstream_error_message(body: &str) -> (String, String) {
    if body.is_empty() {
        return (RUN_FAILED_MESSAGE.to_string(), String::new());
    }
    match serde_json::from_str::<Value>(body) {
        Ok(value) => {
            let message = ["message", "error"]
                .iter()
                .filter_map(|key| value.get(*key))
                .find_map(non_empty_text)
                .unwrap_or_else(|| RUN_FAILED_MESSAGE.to_string());
            let details = value
                .get("details")
                .and_then(non_empty_text)
                .unwrap_or_default();
            (message, details)
        }
        Err(_) => (body.chars().take(MAX_ERROR_BODY_CHARS).collect(), String::new()),
    }
}

/// A JSON value rendered as text, if it is truthy.
fn non_empty_text(value: &Value) -> Option<String> {
    match value {
        Value::Null | Value::Bool(false) => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Forward upstream bytes unchanged. A mid-stream failure appends one error
/// event and ends the body. The event always starts on a frame boundary.
fn relay(upstream: ByteStream) -> impl Stream<Item = Result<Bytes, Infallible>> + Send {
    // at_boundary: nothing relayed yet, or the last chunk ended a frame
    stream::unfold(Some((upstream, true)), |state| async move {
        let (mut upstream, at_boundary) = state?;
        match upstream.next().await {
            Some(Ok(chunk)) => {
                let at_boundary = if chunk.is_empty() {
                    at_boundary
                } else {
                    chunk.ends_with(b"\n\n")
                };
                Some((Ok(chunk), Some((upstream, at_boundary))))
            }
            Some(Err(e)) => {
                error!("Stream error: {}", e);
                let event = sse_error_event(500, STREAM_ERROR_MESSAGE, &e.to_string());
                let event = if at_boundary {
                    event
                } else {
                    Bytes::from([&b"\n\n"[..], &event[..]].concat())
                };
                Some((Ok(event), None))
            }
            None => None,
        }
    })
}
