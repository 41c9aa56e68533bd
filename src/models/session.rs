use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A session resource as returned by the backend.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub app_name: String,
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub state: Value,
    #[serde(default)]
    pub events: Vec<Value>,
    /// Seconds since the epoch
    #[serde(default)]
    pub last_update_time: Option<f64>,
}

/// Identifies one session on the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionKey {
    pub app: String,
    pub user: String,
    pub session: String,
}

impl SessionKey {
    pub fn new(app: impl Into<String>, user: impl Into<String>, session: impl Into<String>) -> Self {
        Self {
            app: app.into(),
            user: user.into(),
            session: session.into(),
        }
    }

    /// `/apps/{app}/users/{user}/sessions/{session}`, percent-encoded.
    pub fn path(&self) -> String {
        format!(
            "/apps/{}/users/{}/sessions/{}",
            urlencoding::encode(&self.app),
            urlencoding::encode(&self.user),
            urlencoding::encode(&self.session)
        )
    }
}

/// Fresh session id of the form `s_<unix-millis>`.
pub fn new_session_id() -> String {
    format!("s_{}", Utc::now().timestamp_millis())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_new_session_id() {
        let id = new_session_id();
        assert!(id.starts_with("s_"));
        assert!(id[2..].parse::<i64>().is_ok());
    }

    #[test]
    fn test_session_key_path_is_encoded() {
        let key = SessionKey::new("my_agent", "jane doe", "s_1");
        assert_eq!(key.path(), "/apps/my_agent/users/jane%20doe/sessions/s_1");
    }

    #[test]
    fn test_session_deserialize() {
        let session: Session = serde_json::from_value(json!({
            "id": "s_1",
            "appName": "my_agent",
            "userId": "demo",
            "state": {"k": 1},
            "events": [{"author": "user"}],
            "lastUpdateTime": 1700000000.5
        }))
        .unwrap();
        assert_eq!(session.app_name, "my_agent");
        assert_eq!(session.events.len(), 1);
        assert_eq!(session.last_update_time, Some(1700000000.5));
    }

    #[test]
    fn test_session_deserialize_minimal() {
        let session: Session = serde_json::from_value(json!({"id": "s_2"})).unwrap();
        assert_eq!(session.id, "s_2");
        assert!(session.events.is_empty());
    }
}
