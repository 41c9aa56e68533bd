//! [`HttpClient`] backed by reqwest.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::header::HeaderMap;
use reqwest::{Method, RequestBuilder};

use crate::traits::{ByteStream, Headers, HttpClient, HttpError, Response};

impl From<reqwest::Error> for HttpError {
    fn from(err: reqwest::Error) -> Self {
        let text = err.to_string();
        if err.is_timeout() {
            HttpError::Timeout(text)
        } else if err.is_connect() {
            HttpError::ConnectionFailed(text)
        } else if err.is_builder() {
            HttpError::InvalidUrl(text)
        } else if err.is_body() || err.is_decode() {
            HttpError::Io(text)
        } else {
            HttpError::Other(text)
        }
    }
}

/// Talks to a real ADK server.
///
/// Only a connect timeout is set. A `/run_sse` response stays open while the
/// agent works, so a whole-request timeout would cut long runs short.
#[derive(Debug, Clone, Default)]
pub struct ReqwestHttpClient {
    client: reqwest::Client,
}

impl ReqwestHttpClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_connect_timeout(connect_timeout: Duration) -> Result<Self, HttpError> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .build()?;
        Ok(Self { client })
    }

    /// Wrap a preconfigured client (proxies, TLS roots, ...).
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    pub fn inner(&self) -> &reqwest::Client {
        &self.client
    }

    fn request(&self, method: Method, url: &str, headers: &Headers) -> RequestBuilder {
        let mut builder = self.client.request(method, url);
        for (name, value) in headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        builder
    }

    async fn buffered(builder: RequestBuilder) -> Result<Response, HttpError> {
        let response = builder.send().await?;
        let status = response.status().as_u16();
        let headers = header_map(response.headers());
        let body = response.bytes().await?;
        Ok(Response::with_headers(status, headers, body))
    }
}

/// Header map as owned strings. Values that are not visible ASCII are dropped.
fn header_map(headers: &HeaderMap) -> Headers {
    headers
        .iter()
        .filter_map(|(name, value)| Some((name.to_string(), value.to_str().ok()?.to_string())))
        .collect()
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn get(&self, url: &str, headers: &Headers) -> Result<Response, HttpError> {
        Self::buffered(self.request(Method::GET, url, headers)).await
    }

    async fn post(&self, url: &str, body: &str, headers: &Headers) -> Result<Response, HttpError> {
        Self::buffered(self.request(Method::POST, url, headers).body(body.to_owned())).await
    }

    async fn delete(&self, url: &str, headers: &Headers) -> Result<Response, HttpError> {
        Self::buffered(self.request(Method::DELETE, url, headers)).await
    }

    async fn post_stream(
        &self,
        url: &str,
        body: &str,
        headers: &Headers,
    ) -> Result<ByteStream, HttpError> {
        let response = self
            .request(Method::POST, url, headers)
            .body(body.to_owned())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(HttpError::ServerError {
                status: status.as_u16(),
                message,
            });
        }

        Ok(Box::pin(response.bytes_stream().map(|chunk| {
            chunk.map_err(|e| match HttpError::from(e) {
                HttpError::Timeout(text) => HttpError::Timeout(text),
                other => HttpError::Io(other.to_string()),
            })
        })))
    }
}
