//! The streaming send flow.
//!
//! One send is: echo the user text, show the loading placeholder, POST
//! `/run_sse`, then decode, classify and merge payloads in arrival order
//! until the stream ends, an error event arrives, the transport fails or
//! the send is cancelled.

use futures_util::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{lock, ChatApp};
use crate::error::{AdkError, AdkResult, NormalizedError};
use crate::models::RunRequest;
use crate::sse::{classify, decode_stream, StreamEvent};
use crate::state::MergeEvent;
use crate::traits::HttpError;

/// How a call to [`ChatApp::send`] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// The stream ended normally
    Completed,
    /// The backend reported an error, shown as a system message
    Errored,
    /// The request or the stream failed at the transport level
    Failed,
    Cancelled,
    /// Another send was in flight; nothing happened
    Busy,
    /// Blank input; nothing happened
    Skipped,
}

/// Releases the re-entrancy guard and forgets the send token.
struct SendGuard<'a> {
    app: &'a ChatApp,
}

impl Drop for SendGuard<'_> {
    fn drop(&mut self) {
        lock(&self.app.active).take();
        self.app.sending.store(false, std::sync::atomic::Ordering::SeqCst);
    }
}

impl ChatApp {
    /// Send one user message and merge the streamed reply.
    ///
    /// Failures inside the exchange end up in the conversation as a single
    /// system message; only precondition failures are returned as `Err`.
    pub async fn send(&self, text: &str) -> AdkResult<SendOutcome> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(SendOutcome::Skipped);
        }
        if !lock(&self.session).connected {
            return Err(AdkError::NotConnected);
        }
        let key = self.session_key()?;

        if self
            .sending
            .compare_exchange(
                false,
                true,
                std::sync::atomic::Ordering::SeqCst,
                std::sync::atomic::Ordering::SeqCst,
            )
            .is_err()
        {
            debug!("Send ignored: another send is in flight");
            return Ok(SendOutcome::Busy);
        }
        let _guard = SendGuard { app: self };

        let token = self.root.child_token();
        *lock(&self.active) = Some(token.clone());

        self.apply(MergeEvent::RequestStarted {
            user_text: Some(text.to_string()),
        });
        let request = RunRequest::new(&key.app, &self.user, &key.session, text);
        let outcome = self.run(&request, &token).await;
        self.apply(MergeEvent::StreamEnded);

        info!(?outcome, app = %key.app, "Send finished");
        Ok(outcome)
    }

    async fn run(&self, request: &RunRequest, token: &CancellationToken) -> SendOutcome {
        let opened = tokio::select! {
            biased;
            _ = token.cancelled() => {
                self.apply(MergeEvent::Cancelled);
                return SendOutcome::Cancelled;
            }
            opened = self.client.run_sse(request) => opened,
        };

        let bytes = match opened {
            Ok(bytes) => bytes,
            Err(e @ AdkError::Http(HttpError::ServerError { .. })) => {
                warn!(error = %e, "Run request rejected");
                self.apply(MergeEvent::Stream(StreamEvent::Error(e.normalized())));
                return SendOutcome::Errored;
            }
            Err(e) => {
                warn!(error = %e, "Run request failed");
                self.apply(MergeEvent::ConnectionFailed(e.normalized().display_text()));
                return SendOutcome::Failed;
            }
        };

        let mut payloads = Box::pin(decode_stream(bytes, token.clone()));
        while let Some(item) = payloads.next().await {
            match item {
                Ok(payload) => match classify(&payload) {
                    StreamEvent::Ignore => {}
                    event @ StreamEvent::Error(_) => {
                        self.apply(MergeEvent::Stream(event));
                        return SendOutcome::Errored;
                    }
                    event => self.apply(MergeEvent::Stream(event)),
                },
                Err(HttpError::Cancelled) => {
                    self.apply(MergeEvent::Cancelled);
                    return SendOutcome::Cancelled;
                }
                Err(e) => {
                    warn!(error = %e, "Stream failed");
                    let error = NormalizedError::connection(e.to_string());
                    self.apply(MergeEvent::ConnectionFailed(error.display_text()));
                    return SendOutcome::Failed;
                }
            }
        }
        SendOutcome::Completed
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use bytes::Bytes;

    use super::super::test_support::{app_with, BASE};
    use super::*;
    use crate::adapters::mock::{MockHttpClient, MockResponse};
    use crate::error::normalize::{CONNECTION_ERROR_MESSAGE, RATE_LIMIT_MESSAGE};
    use crate::models::MessageRole;
    use crate::state::CANCELLED_MESSAGE;
    use crate::traits::Response;

    const HI: &str = "data: {\"content\":{\"parts\":[{\"text\":\"Hi\"}]},\"author\":\"bot\",\"partial\":true}\n\n";
    const THERE: &str = "data: {\"content\":{\"parts\":[{\"text\":\" there\"}]},\"author\":\"bot\",\"partial\":true}\n\n";

    async fn connected_app(mock: &MockHttpClient, run: MockResponse) -> ChatApp {
        mock.set_response(
            &format!("{}/apps", BASE),
            MockResponse::Success(Response::new(200, Bytes::from("{}"))),
        );
        mock.set_response(&format!("{}/run_sse", BASE), run);
        let app = app_with(mock);
        app.select_app("my_agent");
        app.connect().await.unwrap();
        app
    }

    fn texts(app: &ChatApp) -> Vec<(MessageRole, String)> {
        app.snapshot()
            .messages()
            .iter()
            .map(|m| (m.role, m.text.clone()))
            .collect()
    }

    #[tokio::test]
    async fn test_send_merges_stream() {
        let mock = MockHttpClient::new();
        let app = connected_app(
            &mock,
            MockResponse::Stream(vec![Bytes::from(HI), Bytes::from(THERE)]),
        )
        .await;

        assert_eq!(app.send("  hello ").await.unwrap(), SendOutcome::Completed);

        let state = app.snapshot();
        assert!(!state.has_loading());
        let agents: Vec<_> = state.messages_with_role(MessageRole::Agent).collect();
        assert_eq!(agents.len(), 1);
        assert_eq!(agents[0].author.as_deref(), Some("bot"));
        assert_eq!(agents[0].text, "Hi there");
        assert_eq!(state.messages_with_role(MessageRole::User).next().unwrap().text, "hello");
        assert!(!app.is_sending());

        let run = mock
            .get_requests()
            .into_iter()
            .find(|r| r.url.ends_with("/run_sse"))
            .unwrap();
        let body: RunRequest = serde_json::from_str(run.body.as_deref().unwrap()).unwrap();
        assert_eq!(body.app_name, "my_agent");
        assert_eq!(body.new_message.parts[0].text, "hello");
    }

    #[tokio::test]
    async fn test_blank_input_is_skipped() {
        let mock = MockHttpClient::new();
        let app = connected_app(&mock, MockResponse::Stream(vec![])).await;
        let before = app.snapshot();
        assert_eq!(app.send("   ").await.unwrap(), SendOutcome::Skipped);
        assert_eq!(app.snapshot(), before);
    }

    #[tokio::test]
    async fn test_send_requires_connection() {
        let app = app_with(&MockHttpClient::new());
        app.select_app("my_agent");
        assert!(matches!(app.send("hi").await, Err(AdkError::NotConnected)));
    }

    #[tokio::test]
    async fn test_error_event_stops_consumption() {
        let mock = MockHttpClient::new();
        let app = connected_app(
            &mock,
            MockResponse::Stream(vec![
                Bytes::from(HI),
                Bytes::from("data: {\"error\":true,\"status\":429,\"message\":\"Too Many Requests\"}\n\n"),
                Bytes::from(THERE),
            ]),
        )
        .await;

        assert_eq!(app.send("q").await.unwrap(), SendOutcome::Errored);

        let messages = texts(&app);
        assert_eq!(messages[messages.len() - 2], (MessageRole::Agent, "Hi".to_string()));
        assert_eq!(messages.last().unwrap(), &(MessageRole::System, RATE_LIMIT_MESSAGE.to_string()));
        assert!(!app.snapshot().has_loading());
    }

    #[tokio::test]
    async fn test_rejected_run_request() {
        let mock = MockHttpClient::new();
        let app = connected_app(
            &mock,
            MockResponse::Success(Response::new(429, Bytes::from("Too Many Requests"))),
        )
        .await;

        assert_eq!(app.send("q").await.unwrap(), SendOutcome::Errored);
        assert_eq!(texts(&app).last().unwrap().1, RATE_LIMIT_MESSAGE);
    }

    #[tokio::test]
    async fn test_connection_failure_is_one_system_message() {
        let mock = MockHttpClient::new();
        let app = connected_app(
            &mock,
            MockResponse::StreamError(HttpError::ConnectionFailed("refused".to_string())),
        )
        .await;

        assert_eq!(app.send("q").await.unwrap(), SendOutcome::Failed);
        let state = app.snapshot();
        assert!(!state.has_loading());
        let system: Vec<_> = state
            .messages_with_role(MessageRole::System)
            .filter(|m| m.text.starts_with(CONNECTION_ERROR_MESSAGE))
            .collect();
        assert_eq!(system.len(), 1);
    }

    #[tokio::test]
    async fn test_mid_stream_failure_keeps_partial_text() {
        let mock = MockHttpClient::new();
        let app = connected_app(
            &mock,
            MockResponse::StreamThenError(vec![Bytes::from(HI)], HttpError::Io("reset".to_string())),
        )
        .await;

        assert_eq!(app.send("q").await.unwrap(), SendOutcome::Failed);
        let messages = texts(&app);
        assert!(messages.contains(&(MessageRole::Agent, "Hi".to_string())));
        assert!(messages.last().unwrap().1.starts_with(CONNECTION_ERROR_MESSAGE));
    }

    #[tokio::test]
    async fn test_cancel_in_flight_send() {
        let mock = MockHttpClient::new();
        let app = connected_app(&mock, MockResponse::StreamThenHang(vec![Bytes::from(HI)])).await;

        let (outcome, cancelled) = tokio::join!(app.send("q"), async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            app.cancel()
        });

        assert!(cancelled);
        assert_eq!(outcome.unwrap(), SendOutcome::Cancelled);
        let state = app.snapshot();
        assert!(!state.has_loading());
        assert_eq!(state.messages().last().unwrap().text, CANCELLED_MESSAGE);
        assert!(!app.is_sending());
        assert!(!app.cancel());
    }

    #[tokio::test]
    async fn test_second_send_is_busy() {
        let mock = MockHttpClient::new();
        let app = connected_app(&mock, MockResponse::StreamThenHang(vec![])).await;

        let (first, second) = tokio::join!(app.send("one"), async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            let second = app.send("two").await;
            app.cancel();
            second
        });

        assert_eq!(first.unwrap(), SendOutcome::Cancelled);
        assert_eq!(second.unwrap(), SendOutcome::Busy);
        let users: Vec<_> = app
            .snapshot()
            .messages_with_role(MessageRole::User)
            .map(|m| m.text.clone())
            .collect();
        assert_eq!(users, vec!["one"]);
    }

    #[tokio::test]
    async fn test_next_send_starts_fresh_bubble() {
        let mock = MockHttpClient::new();
        let app = connected_app(&mock, MockResponse::Stream(vec![Bytes::from(HI)])).await;

        app.send("a").await.unwrap();
        app.send("b").await.unwrap();

        let agents: Vec<_> = app
            .snapshot()
            .messages_with_role(MessageRole::Agent)
            .map(|m| m.text.clone())
            .collect();
        assert_eq!(agents, vec!["Hi", "Hi"]);
    }
}
