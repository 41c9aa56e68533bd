//! Mock configurations for integration tests.

pub use adk_chat::adapters::mock::{MockHttpClient, MockResponse};
pub use adk_chat::traits::Response;

use bytes::Bytes;

/// Builder for a `MockHttpClient` standing in for an ADK server.
pub struct MockHttpConfig {
    client: MockHttpClient,
}

impl MockHttpConfig {
    pub fn new() -> Self {
        Self {
            client: MockHttpClient::new(),
        }
    }

    /// Configures a JSON response for a URL (prefix match).
    pub fn with_json_response(self, url: &str, status: u16, json: &str) -> Self {
        self.client.set_response(
            url,
            MockResponse::Success(Response::new(status, Bytes::from(json.to_string()))),
        );
        self
    }

    /// Configures `/run_sse` to stream the given frames.
    pub fn with_run_stream(self, base: &str, frames: Vec<String>) -> Self {
        self.client.set_response(
            &format!("{}/run_sse", base),
            MockResponse::Stream(frames.into_iter().map(Bytes::from).collect()),
        );
        self
    }

    /// Configures `/run_sse` to stream the frames and then stall.
    pub fn with_hanging_run_stream(self, base: &str, frames: Vec<String>) -> Self {
        self.client.set_response(
            &format!("{}/run_sse", base),
            MockResponse::StreamThenHang(frames.into_iter().map(Bytes::from).collect()),
        );
        self
    }

    pub fn build(self) -> MockHttpClient {
        self.client
    }
}

impl Default for MockHttpConfig {
    fn default() -> Self {
        Self::new()
    }
}
