use serde::{Deserialize, Serialize};

use crate::sse::GroundingMetadata;

/// Who a displayed message belongs to
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Agent,
    System,
}

/// One bubble in the conversation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DisplayMessage {
    /// Assigned at creation, never reused within a conversation
    pub id: u64,
    pub role: MessageRole,
    /// Append-only while streaming
    pub text: String,
    /// Agent that produced the message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    /// Transient placeholder shown while waiting for the first chunk
    #[serde(default)]
    pub loading: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grounding: Option<GroundingMetadata>,
}

impl DisplayMessage {
    pub fn user(id: u64, text: impl Into<String>) -> Self {
        Self::with_role(id, MessageRole::User, text)
    }

    pub fn system(id: u64, text: impl Into<String>) -> Self {
        Self::with_role(id, MessageRole::System, text)
    }

    pub fn agent(id: u64, author: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            author: Some(author.into()),
            ..Self::with_role(id, MessageRole::Agent, text)
        }
    }

    pub fn loading(id: u64) -> Self {
        Self {
            loading: true,
            ..Self::with_role(id, MessageRole::Agent, "")
        }
    }

    fn with_role(id: u64, role: MessageRole, text: impl Into<String>) -> Self {
        Self {
            id,
            role,
            text: text.into(),
            author: None,
            loading: false,
            grounding: None,
        }
    }

    /// True if this is an open agent bubble for `author`.
    pub fn is_from(&self, author: &str) -> bool {
        self.role == MessageRole::Agent && !self.loading && self.author.as_deref() == Some(author)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constructors() {
        let user = DisplayMessage::user(1, "hi");
        assert_eq!(user.role, MessageRole::User);
        assert!(user.author.is_none());

        let agent = DisplayMessage::agent(2, "bot", "hello");
        assert!(agent.is_from("bot"));
        assert!(!agent.is_from("other"));

        let loading = DisplayMessage::loading(3);
        assert!(loading.loading);
        assert!(!loading.is_from("bot"));
    }

    #[test]
    fn test_role_serialization() {
        assert_eq!(serde_json::to_string(&MessageRole::Agent).unwrap(), "\"agent\"");
        let msg = DisplayMessage::system(1, "Connected. Session ready.");
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["role"], "system");
        assert!(json.get("author").is_none());
    }
}
