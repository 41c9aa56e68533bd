//! Typed client for the ADK server's HTTP API.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};

use crate::adapters::ReqwestHttpClient;
use crate::config::ChatConfig;
use crate::error::AdkResult;
use crate::models::{
    CreateSessionRequest, RunRequest, Session, SessionKey, Span, TraceResponse,
};
use crate::traits::{Headers, HttpClient, HttpError, Response};

pub use crate::traits::ByteStream;

/// Client for one ADK server.
#[derive(Clone)]
pub struct AdkClient {
    http: Arc<dyn HttpClient>,
    base_url: String,
}

impl std::fmt::Debug for AdkClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdkClient")
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl AdkClient {
    pub fn new(base_url: impl Into<String>, http: Arc<dyn HttpClient>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { http, base_url }
    }

    /// Client backed by reqwest, using the configured URL and connect timeout.
    pub fn from_config(config: &ChatConfig) -> AdkResult<Self> {
        let http = ReqwestHttpClient::with_connect_timeout(config.connect_timeout())?;
        Ok(Self::new(config.base_url(), Arc::new(http)))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn json_headers() -> Headers {
        let mut headers = Headers::new();
        headers.insert("Content-Type".to_string(), "application/json".to_string());
        headers
    }

    /// Turn a non-2xx response into `HttpError::ServerError`.
    fn check(response: Response) -> AdkResult<Response> {
        if response.is_success() {
            return Ok(response);
        }
        Err(HttpError::ServerError {
            status: response.status,
            message: response.text_lossy(),
        }
        .into())
    }

    /// `GET /list-apps`
    pub async fn list_apps(&self) -> AdkResult<Vec<String>> {
        let response = self.http.get(&self.url("/list-apps"), &Headers::new()).await?;
        let apps = Self::check(response)?.json::<Vec<String>>()?;
        debug!(count = apps.len(), "Listed apps");
        Ok(apps)
    }

    /// `POST /apps/{app}/users/{user}/sessions/{session}` with `{"createdAt": <ms>}`.
    ///
    /// Backends that answer with an empty or unexpected body still yield a
    /// session carrying the requested ids.
    pub async fn create_session(&self, key: &SessionKey) -> AdkResult<Session> {
        let body = serde_json::to_string(&CreateSessionRequest {
            created_at: Utc::now().timestamp_millis(),
        })?;
        let response = self
            .http
            .post(&self.url(&key.path()), &body, &Self::json_headers())
            .await?;
        let response = Self::check(response)?;
        info!(app = %key.app, session = %key.session, "Created session");

        Ok(response
            .json::<Session>()
            .ok()
            .filter(|s| !s.id.is_empty())
            .unwrap_or_else(|| Session {
                id: key.session.clone(),
                app_name: key.app.clone(),
                user_id: key.user.clone(),
                ..Session::default()
            }))
    }

    /// `GET /apps/{app}/users/{user}/sessions/{session}`
    pub async fn get_session(&self, key: &SessionKey) -> AdkResult<Session> {
        let response = self.http.get(&self.url(&key.path()), &Headers::new()).await?;
        Ok(Self::check(response)?.json::<Session>()?)
    }

    /// `DELETE /apps/{app}/users/{user}/sessions/{session}`
    pub async fn delete_session(&self, key: &SessionKey) -> AdkResult<()> {
        let response = self
            .http
            .delete(&self.url(&key.path()), &Headers::new())
            .await?;
        Self::check(response)?;
        info!(app = %key.app, session = %key.session, "Deleted session");
        Ok(())
    }

    /// `GET /debug/trace/session/{session}`, accepting both response shapes.
    pub async fn fetch_trace(&self, session_id: &str) -> AdkResult<Vec<Span>> {
        let path = format!("/debug/trace/session/{}", urlencoding::encode(session_id));
        let response = self.http.get(&self.url(&path), &Headers::new()).await?;
        let trace = Self::check(response)?.json::<TraceResponse>()?;
        Ok(trace.into_spans())
    }

    /// `POST /run_sse`, returning the response body as a byte stream.
    ///
    /// A non-2xx answer is `HttpError::ServerError` with the body as message.
    pub async fn run_sse(&self, request: &RunRequest) -> AdkResult<ByteStream> {
        let body = serde_json::to_string(request)?;
        let mut headers = Self::json_headers();
        headers.insert("Accept".to_string(), "text/event-stream".to_string());
        debug!(app = %request.app_name, session = %request.session_id, "Starting run");
        Ok(self
            .http
            .post_stream(&self.url("/run_sse"), &body, &headers)
            .await?)
    }
}
