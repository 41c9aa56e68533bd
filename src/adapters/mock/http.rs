//! Mock HTTP client for testing.
//!
//! Returns canned responses keyed by URL (optionally scoped to a method) and
//! records every request for later verification.

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::StreamExt;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::traits::{ByteStream, Headers, HttpClient, HttpError, Response};

/// A recorded HTTP request for verification in tests.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    /// HTTP method (GET, POST or DELETE)
    pub method: String,
    pub url: String,
    pub headers: Headers,
    /// Request body (for POST requests)
    pub body: Option<String>,
}

/// Configuration for a mock response.
#[derive(Debug, Clone)]
pub enum MockResponse {
    /// Return a complete response
    Success(Response),
    /// Fail before any response is produced
    Error(HttpError),
    /// Stream the chunks, then end cleanly
    Stream(Vec<Bytes>),
    /// Fail when the stream is opened
    StreamError(HttpError),
    /// Stream the chunks, then fail mid-stream
    StreamThenError(Vec<Bytes>, HttpError),
    /// Stream the chunks, then never yield again
    StreamThenHang(Vec<Bytes>),
}

/// In-memory [`HttpClient`] with canned responses.
///
/// A request is answered by the route registered for its method and URL,
/// then by a route for the URL under any method, then by the longest
/// matching URL prefix, then by the default. Clones share routes and
/// recorded requests.
///
/// ```ignore
/// let client = MockHttpClient::new();
/// client.set_response(
///     "http://backend/list-apps",
///     MockResponse::Success(Response::new(200, Bytes::from(r#"["my_agent"]"#))),
/// );
/// let response = client.get("http://backend/list-apps", &Headers::new()).await?;
/// assert_eq!(client.get_requests()[0].method, "GET");
/// ```
#[derive(Debug, Clone, Default)]
pub struct MockHttpClient {
    inner: Arc<Mutex<MockState>>,
}

#[derive(Debug, Default)]
struct MockState {
    routes: Vec<Route>,
    fallback: Option<MockResponse>,
    requests: Vec<RecordedRequest>,
}

#[derive(Debug)]
struct Route {
    method: Option<String>,
    url: String,
    response: MockResponse,
}

impl Route {
    fn accepts(&self, method: &str) -> bool {
        self.method.as_deref().map_or(true, |m| m.eq_ignore_ascii_case(method))
    }
}

impl MockState {
    fn upsert(&mut self, method: Option<String>, url: &str, response: MockResponse) {
        self.routes.retain(|r| !(r.method == method && r.url == url));
        self.routes.push(Route {
            method,
            url: url.to_string(),
            response,
        });
    }

    fn lookup(&self, method: &str, url: &str) -> Option<MockResponse> {
        let exact = |scoped: bool| {
            self.routes
                .iter()
                .find(|r| r.url == url && r.method.is_some() == scoped && r.accepts(method))
        };
        exact(true)
            .or_else(|| exact(false))
            .or_else(|| {
                self.routes
                    .iter()
                    .filter(|r| r.accepts(method) && url.starts_with(&r.url))
                    .max_by_key(|r| r.url.len())
            })
            .map(|r| r.response.clone())
            .or_else(|| self.fallback.clone())
    }
}

impl MockHttpClient {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Answer requests to `url` (or URLs starting with it) under any method.
    pub fn set_response(&self, url: &str, response: MockResponse) {
        self.state().upsert(None, url, response);
    }

    /// Answer `method` requests to `url`.
    pub fn set_method_response(&self, method: &str, url: &str, response: MockResponse) {
        self.state()
            .upsert(Some(method.to_ascii_uppercase()), url, response);
    }

    /// Answer anything no route matches.
    pub fn set_default_response(&self, response: MockResponse) {
        self.state().fallback = Some(response);
    }

    pub fn get_requests(&self) -> Vec<RecordedRequest> {
        self.state().requests.clone()
    }

    pub fn clear_requests(&self) {
        self.state().requests.clear();
    }

    /// Record the request and pick its response.
    fn handle(
        &self,
        method: &str,
        url: &str,
        headers: &Headers,
        body: Option<&str>,
    ) -> Result<MockResponse, HttpError> {
        let mut state = self.state();
        state.requests.push(RecordedRequest {
            method: method.to_string(),
            url: url.to_string(),
            headers: headers.clone(),
            body: body.map(str::to_string),
        });
        state
            .lookup(method, url)
            .ok_or_else(|| HttpError::Other(format!("No mock response for {} {}", method, url)))
    }

    fn buffered(
        &self,
        method: &str,
        url: &str,
        headers: &Headers,
        body: Option<&str>,
    ) -> Result<Response, HttpError> {
        match self.handle(method, url, headers, body)? {
            MockResponse::Success(response) => Ok(response),
            MockResponse::Error(err) | MockResponse::StreamError(err) => Err(err),
            _ => Err(HttpError::Other(format!(
                "{} {} is mocked as a stream",
                method, url
            ))),
        }
    }
}

#[async_trait]
impl HttpClient for MockHttpClient {
    async fn get(&self, url: &str, headers: &Headers) -> Result<Response, HttpError> {
        self.buffered("GET", url, headers, None)
    }

    async fn post(&self, url: &str, body: &str, headers: &Headers) -> Result<Response, HttpError> {
        self.buffered("POST", url, headers, Some(body))
    }

    async fn delete(&self, url: &str, headers: &Headers) -> Result<Response, HttpError> {
        self.buffered("DELETE", url, headers, None)
    }

    async fn post_stream(
        &self,
        url: &str,
        body: &str,
        headers: &Headers,
    ) -> Result<ByteStream, HttpError> {
        let chunks = |chunks: Vec<Bytes>| futures::stream::iter(chunks.into_iter().map(Ok));
        match self.handle("POST", url, headers, Some(body))? {
            MockResponse::Stream(body) => Ok(Box::pin(chunks(body))),
            MockResponse::StreamThenError(body, err) => {
                Ok(Box::pin(chunks(body).chain(futures::stream::iter([Err(err)]))))
            }
            MockResponse::StreamThenHang(body) => {
                Ok(Box::pin(chunks(body).chain(futures::stream::pending())))
            }
            MockResponse::Success(response) if !response.is_success() => {
                Err(HttpError::ServerError {
                    status: response.status,
                    message: response.text_lossy(),
                })
            }
            MockResponse::Success(_) => Err(HttpError::Other(format!(
                "POST {} is mocked as a buffered response",
                url
            ))),
            MockResponse::StreamError(err) | MockResponse::Error(err) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SESSION_URL: &str = "http://backend/apps/a/users/u/sessions/s";

    fn ok(body: &'static str) -> MockResponse {
        MockResponse::Success(Response::new(200, Bytes::from_static(body.as_bytes())))
    }

    #[tokio::test]
    async fn test_records_every_request() {
        let client = MockHttpClient::new();
        client.set_default_response(ok(""));

        client.get("http://backend/list-apps", &Headers::new()).await.unwrap();
        client.post(SESSION_URL, r#"{"createdAt":1}"#, &Headers::new()).await.unwrap();

        let requests = client.get_requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].method, "GET");
        assert_eq!(requests[1].body.as_deref(), Some(r#"{"createdAt":1}"#));
    }

    #[tokio::test]
    async fn test_method_route_beats_any_method_route() {
        let client = MockHttpClient::new();
        client.set_response(SESSION_URL, ok("{}"));
        client.set_method_response(
            "delete",
            SESSION_URL,
            MockResponse::Success(Response::new(204, Bytes::new())),
        );

        assert_eq!(client.get(SESSION_URL, &Headers::new()).await.unwrap().status, 200);
        assert_eq!(client.delete(SESSION_URL, &Headers::new()).await.unwrap().status, 204);
    }

    #[tokio::test]
    async fn test_longest_prefix_wins() {
        let client = MockHttpClient::new();
        client.set_response("http://backend/apps", ok("general"));
        client.set_response("http://backend/apps/a/users", ok("specific"));

        let response = client.get(SESSION_URL, &Headers::new()).await.unwrap();
        assert_eq!(response.text_lossy(), "specific");
    }

    #[tokio::test]
    async fn test_unmatched_request_fails() {
        let client = MockHttpClient::new();
        let err = client.get("http://backend/missing", &Headers::new()).await.unwrap_err();
        assert!(err.to_string().contains("GET http://backend/missing"));
        assert_eq!(client.get_requests().len(), 1);
    }

    #[tokio::test]
    async fn test_stream_then_error() {
        let client = MockHttpClient::new();
        client.set_response(
            "http://backend/run_sse",
            MockResponse::StreamThenError(
                vec![Bytes::from("data: {}\n\n")],
                HttpError::Io("reset".to_string()),
            ),
        );

        let items: Vec<_> = client
            .post_stream("http://backend/run_sse", "{}", &Headers::new())
            .await
            .unwrap()
            .collect()
            .await;
        assert_eq!(items.len(), 2);
        assert!(matches!(items[1], Err(HttpError::Io(_))));
    }

    #[tokio::test]
    async fn test_stream_request_with_error_status() {
        let client = MockHttpClient::new();
        client.set_response(
            "http://backend/run_sse",
            MockResponse::Success(Response::new(404, Bytes::from("App not found"))),
        );

        let result = client
            .post_stream("http://backend/run_sse", "{}", &Headers::new())
            .await;
        assert!(matches!(
            result,
            Err(HttpError::ServerError { status: 404, ref message }) if message == "App not found"
        ));
    }

    #[tokio::test]
    async fn test_buffered_request_on_stream_route_fails() {
        let client = MockHttpClient::new();
        client.set_response("http://backend/run_sse", MockResponse::Stream(vec![]));
        assert!(client
            .post("http://backend/run_sse", "{}", &Headers::new())
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_clones_share_state() {
        let client = MockHttpClient::new();
        let cloned = client.clone();
        cloned.set_default_response(ok(""));

        client.get("http://backend", &Headers::new()).await.unwrap();
        assert_eq!(cloned.get_requests().len(), 1);

        cloned.clear_requests();
        assert!(client.get_requests().is_empty());
    }
}
