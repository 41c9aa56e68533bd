//! App selection and session lifecycle.

use tracing::{info, warn};

use super::{lock, ChatApp, CONNECTED_MESSAGE, CONNECTING_MESSAGE, CONNECTION_FAILED_MESSAGE};
use crate::error::{AdkError, AdkResult};
use crate::models::{build_invocation_tree, filter_apps, new_session_id, InvocationNode, SessionKey};
use crate::state::MergeEvent;
use crate::traits::HttpError;

impl ChatApp {
    /// Fetch and filter the app list. Selects the first app if none is
    /// selected yet.
    pub async fn load_apps(&self) -> AdkResult<Vec<String>> {
        let apps = filter_apps(&self.client.list_apps().await?, &self.allowed_apps);
        let mut session = lock(&self.session);
        session.apps = apps.clone();
        if session.selected_app.is_none() {
            session.selected_app = apps.first().cloned();
        }
        Ok(apps)
    }

    /// Switch agent. Clears the conversation and marks the session
    /// disconnected; an in-flight send is cancelled.
    pub fn select_app(&self, app: &str) {
        self.cancel();
        {
            let mut session = lock(&self.session);
            session.selected_app = Some(app.to_string());
            session.connected = false;
        }
        self.apply(MergeEvent::Reset(None));
        info!(app, "Selected app");
    }

    /// The key of the current session, if an app is selected.
    pub fn session_key(&self) -> AdkResult<SessionKey> {
        let session = lock(&self.session);
        let app = session.selected_app.clone().ok_or(AdkError::NoAppSelected)?;
        Ok(SessionKey::new(app, self.user.clone(), session.session_id.clone()))
    }

    /// Create the session on the backend.
    ///
    /// The conversation is reset to a single notice: "Connecting...", then
    /// "Connected. Session ready." or "Connection failed.". A session that
    /// already exists counts as connected.
    pub async fn connect(&self) -> AdkResult<()> {
        let key = self.session_key()?;
        self.cancel();
        self.apply(MergeEvent::Reset(Some(CONNECTING_MESSAGE.to_string())));

        let result = match self.client.create_session(&key).await {
            Err(AdkError::Http(HttpError::ServerError { message, .. }))
                if message.contains("already exists") =>
            {
                Ok(())
            }
            other => other.map(|_| ()),
        };

        let connected = result.is_ok();
        lock(&self.session).connected = connected;
        match &result {
            Ok(()) => {
                info!(app = %key.app, session = %key.session, "Connected");
                self.apply(MergeEvent::Reset(Some(CONNECTED_MESSAGE.to_string())));
            }
            Err(e) => {
                warn!(error = %e, "Failed to create session");
                self.apply(MergeEvent::Reset(Some(CONNECTION_FAILED_MESSAGE.to_string())));
            }
        }
        result
    }

    /// Start over with a fresh session id and connect.
    pub async fn new_session(&self) -> AdkResult<()> {
        {
            let mut session = lock(&self.session);
            session.session_id = new_session_id();
            session.connected = false;
        }
        self.connect().await
    }

    /// Invocation tree of the current session.
    pub async fn fetch_trace(&self) -> AdkResult<Vec<InvocationNode>> {
        let session_id = lock(&self.session).session_id.clone();
        let spans = self.client.fetch_trace(&session_id).await?;
        Ok(build_invocation_tree(&spans))
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::super::test_support::{app_with, BASE};
    use super::*;
    use crate::adapters::mock::{MockHttpClient, MockResponse};
    use crate::models::MessageRole;
    use crate::traits::Response;

    fn ok(body: &str) -> MockResponse {
        MockResponse::Success(Response::new(200, Bytes::from(body.to_string())))
    }

    #[tokio::test]
    async fn test_load_apps_selects_first() {
        let mock = MockHttpClient::new();
        mock.set_response(
            &format!("{}/list-apps", BASE),
            ok(r#"["other","sequential_workflow","my_agent"]"#),
        );
        let app = app_with(&mock);

        let apps = app.load_apps().await.unwrap();
        assert_eq!(apps, vec!["sequential_workflow", "my_agent"]);
        assert_eq!(
            app.session_info().selected_app.as_deref(),
            Some("sequential_workflow")
        );
    }

    #[tokio::test]
    async fn test_connect_success() {
        let mock = MockHttpClient::new();
        mock.set_default_response(ok(r#"{"id":"s_1"}"#));
        let app = app_with(&mock);
        app.select_app("my_agent");

        app.connect().await.unwrap();

        assert!(app.session_info().connected);
        let state = app.snapshot();
        assert_eq!(state.messages().len(), 1);
        assert_eq!(state.messages()[0].role, MessageRole::System);
        assert_eq!(state.messages()[0].text, CONNECTED_MESSAGE);
    }

    #[tokio::test]
    async fn test_connect_failure() {
        let mock = MockHttpClient::new();
        mock.set_default_response(MockResponse::Error(HttpError::ConnectionFailed(
            "refused".to_string(),
        )));
        let app = app_with(&mock);
        app.select_app("my_agent");

        assert!(app.connect().await.is_err());
        assert!(!app.session_info().connected);
        assert_eq!(app.snapshot().messages()[0].text, CONNECTION_FAILED_MESSAGE);
    }

    #[tokio::test]
    async fn test_connect_existing_session() {
        let mock = MockHttpClient::new();
        mock.set_default_response(MockResponse::Success(Response::new(
            400,
            Bytes::from(r#"{"detail":"Session already exists: s_1"}"#),
        )));
        let app = app_with(&mock);
        app.select_app("my_agent");

        app.connect().await.unwrap();
        assert!(app.session_info().connected);
    }

    #[tokio::test]
    async fn test_connect_without_app() {
        let app = app_with(&MockHttpClient::new());
        assert!(matches!(app.connect().await, Err(AdkError::NoAppSelected)));
    }

    #[tokio::test]
    async fn test_select_app_clears_conversation() {
        let mock = MockHttpClient::new();
        mock.set_default_response(ok("{}"));
        let app = app_with(&mock);
        app.select_app("my_agent");
        app.connect().await.unwrap();

        app.select_app("loop_workflow");
        assert!(app.snapshot().messages().is_empty());
        let info = app.session_info();
        assert!(!info.connected);
        assert_eq!(info.selected_app.as_deref(), Some("loop_workflow"));
    }

    #[tokio::test]
    async fn test_new_session_changes_id() {
        let mock = MockHttpClient::new();
        mock.set_default_response(ok("{}"));
        let app = app_with(&mock);
        app.select_app("my_agent");
        let before = app.session_info().session_id;

        tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        app.new_session().await.unwrap();

        assert_ne!(app.session_info().session_id, before);
        assert!(mock.get_requests()[0].url.ends_with(&app.session_info().session_id));
    }

    #[tokio::test]
    async fn test_fetch_trace_builds_tree() {
        let mock = MockHttpClient::new();
        mock.set_default_response(ok(
            r#"[{"name":"root","span_id":1,"start_time":0,"end_time":1000000,"parent_span_id":null},
                {"name":"child","span_id":2,"start_time":10,"end_time":20,"parent_span_id":1}]"#,
        ));
        let app = app_with(&mock);

        let tree = app.fetch_trace().await.unwrap();
        assert_eq!(tree.len(), 1);
        assert_eq!(tree[0].children[0].name, "child");
    }
}
