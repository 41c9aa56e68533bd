//! Common test utilities for integration tests.
//!
//! ```ignore
//! mod common;
//! use common::{agent_frame, connected_app};
//!
//! let app = connected_app(vec![agent_frame("bot", "Hi", true)]).await;
//! ```

#![allow(dead_code)]

pub mod mocks;

pub use mocks::*;

use std::sync::Arc;

use adk_chat::{AdkClient, ChatApp, ChatConfig};
use serde_json::{json, Value};

pub const BASE: &str = "http://adk.test";

/// One SSE frame carrying `value`.
pub fn frame(value: &Value) -> String {
    format!("data: {}\n\n", value)
}

/// An ADK event frame with a single text part.
pub fn agent_frame(author: &str, text: &str, partial: bool) -> String {
    let mut event = json!({
        "content": {"role": "model", "parts": [{"text": text}]},
        "author": author,
    });
    if partial {
        event["partial"] = json!(true);
    }
    frame(&event)
}

/// The error event the proxy emits for a failed run.
pub fn error_frame(status: u16, message: &str) -> String {
    frame(&json!({"error": true, "status": status, "message": message, "details": ""}))
}

pub fn app_with(mock: &MockHttpClient) -> ChatApp {
    let client = AdkClient::new(BASE, Arc::new(mock.clone()));
    ChatApp::new(client, &ChatConfig::default())
}

/// A connected app whose `/run_sse` streams `frames`.
pub async fn connected_app(frames: Vec<String>) -> (ChatApp, MockHttpClient) {
    let mock = MockHttpConfig::new()
        .with_json_response(&format!("{}/apps", BASE), 200, "{}")
        .with_run_stream(BASE, frames)
        .build();
    let app = connect(&mock).await;
    (app, mock)
}

pub async fn connect(mock: &MockHttpClient) -> ChatApp {
    let app = app_with(mock);
    app.select_app("my_agent");
    app.connect().await.expect("connect against mock");
    app
}
