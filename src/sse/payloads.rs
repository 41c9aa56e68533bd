//! Serde model of the ADK event JSON carried on `data:` lines.
//!
//! The backend's event shape is loose: fields may be missing, arrive in
//! camelCase or snake_case, or carry unexpected types. Leaf structs derive
//! `Deserialize` and are decoded one part at a time, so a single odd part
//! degrades to an empty fragment instead of dropping the whole event.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Author used when an event names neither `author` nor `content.role`.
pub const DEFAULT_AUTHOR: &str = "model";

/// One decoded ADK event.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AgentEvent {
    pub author: Option<String>,
    /// `None` when `content` or `content.parts` is missing or not a sequence
    pub content: Option<Content>,
    /// `Some(true)` marks a streaming fragment
    pub partial: Option<bool>,
    pub finish_reason: Option<String>,
    pub grounding_metadata: Option<GroundingMetadata>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Content {
    pub role: Option<String>,
    pub parts: Vec<Part>,
}

/// A content fragment. At most one of the fields is normally set.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default, alias = "inline_data")]
    pub inline_data: Option<InlineData>,
    #[serde(default, alias = "function_response")]
    pub function_response: Option<FunctionResponse>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    #[serde(default, alias = "mime_type")]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub data: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct FunctionResponse {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub response: Option<Value>,
}

/// An image found in a part: media type plus base64 payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageData {
    pub mime_type: String,
    pub data: String,
}

/// Search-citation side channel attached to a finished turn.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroundingMetadata {
    #[serde(default, alias = "web_search_queries")]
    pub web_search_queries: Vec<String>,
    #[serde(default, alias = "grounding_chunks")]
    pub grounding_chunks: Vec<GroundingChunk>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroundingChunk {
    #[serde(default)]
    pub web: Option<WebSource>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WebSource {
    #[serde(default)]
    pub uri: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
}

impl AgentEvent {
    /// Decode an event leniently. Never fails; unknown shapes yield empty fields.
    pub fn from_value(value: &Value) -> Self {
        let content = value.get("content").and_then(|content| {
            let parts = content.get("parts")?.as_array()?;
            Some(Content {
                role: string_field(content, "role"),
                parts: parts.iter().map(Part::from_value).collect(),
            })
        });

        let grounding_metadata = value
            .get("groundingMetadata")
            .or_else(|| value.get("grounding_metadata"))
            .and_then(|g| serde_json::from_value(g.clone()).ok());

        Self {
            author: string_field(value, "author"),
            content,
            partial: value.get("partial").and_then(Value::as_bool),
            finish_reason: string_field(value, "finishReason")
                .or_else(|| string_field(value, "finish_reason")),
            grounding_metadata,
        }
    }

    pub fn is_partial(&self) -> bool {
        self.partial == Some(true)
    }

    /// `author`, then `content.role`, then [`DEFAULT_AUTHOR`].
    pub fn resolved_author(&self) -> String {
        self.author
            .clone()
            .or_else(|| self.content.as_ref().and_then(|c| c.role.clone()))
            .unwrap_or_else(|| DEFAULT_AUTHOR.to_string())
    }
}

impl Part {
    pub fn from_value(value: &Value) -> Self {
        serde_json::from_value(value.clone()).unwrap_or_default()
    }

    /// Images carried directly or nested inside a function response.
    pub fn images(&self) -> Vec<ImageData> {
        let mut images = Vec::new();
        if let Some(image) = self.inline_data.as_ref().and_then(InlineData::as_image) {
            images.push(image);
        }
        if let Some(response) = self.function_response.as_ref().and_then(|f| f.response.as_ref()) {
            collect_images(response, &mut images);
        }
        images
    }

    pub fn has_image(&self) -> bool {
        !self.images().is_empty()
    }
}

impl InlineData {
    fn as_image(&self) -> Option<ImageData> {
        let mime_type = self.mime_type.as_deref()?;
        let data = self.data.as_deref()?;
        if !mime_type.starts_with("image/") || data.is_empty() {
            return None;
        }
        Some(ImageData {
            mime_type: mime_type.to_string(),
            data: data.to_string(),
        })
    }
}

impl GroundingMetadata {
    pub fn is_empty(&self) -> bool {
        self.web_search_queries.is_empty() && self.grounding_chunks.is_empty()
    }
}

/// Walk a function-response body looking for `{data, mimeType}` image
/// objects, such as MCP `{"type": "image", "data": ..., "mimeType": ...}`.
fn collect_images(value: &Value, out: &mut Vec<ImageData>) {
    match value {
        Value::Object(map) => {
            let mime = map
                .get("mimeType")
                .or_else(|| map.get("mime_type"))
                .and_then(Value::as_str);
            let data = map.get("data").and_then(Value::as_str);
            match (mime, data) {
                (Some(mime), Some(data)) if mime.starts_with("image/") && !data.is_empty() => {
                    out.push(ImageData {
                        mime_type: mime.to_string(),
                        data: data.to_string(),
                    });
                }
                _ => map.values().for_each(|v| collect_images(v, out)),
            }
        }
        Value::Array(items) => items.iter().for_each(|v| collect_images(v, out)),
        _ => {}
    }
}

fn string_field(value: &Value, key: &str) -> Option<String> {
    value
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
