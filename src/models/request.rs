use serde::{Deserialize, Serialize};

/// Body of `POST /run_sse`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunRequest {
    pub app_name: String,
    pub user_id: String,
    pub session_id: String,
    pub new_message: NewMessage,
    pub streaming: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewMessage {
    pub role: String,
    pub parts: Vec<TextPart>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TextPart {
    pub text: String,
}

impl RunRequest {
    /// A streaming request carrying one user text part.
    pub fn new(app_name: &str, user_id: &str, session_id: &str, text: &str) -> Self {
        Self {
            app_name: app_name.to_string(),
            user_id: user_id.to_string(),
            session_id: session_id.to_string(),
            new_message: NewMessage {
                role: "user".to_string(),
                parts: vec![TextPart {
                    text: text.to_string(),
                }],
            },
            streaming: true,
        }
    }
}

/// Body of `POST /apps/{app}/users/{user}/sessions/{session}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionRequest {
    /// Unix time in milliseconds
    pub created_at: i64,
}
