// Core data model for the MCP tool-call pipeline

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A tool advertised by a connected server.
///
/// Owned by the tool index; superseded wholesale (never merged) on refresh.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDescriptor {
    /// Tool name, unique across the active tool set.
    pub name: String,
    /// Name of the server that owns this tool.
    pub server: String,
    /// Human-readable description.
    pub description: String,
    /// JSON-schema-shaped input description.
    pub input_schema: Value,
}

/// One tool invocation requested by an LLM turn or a connected client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallRequest {
    /// Unique per LLM turn or per user action.
    pub id: String,
    /// Tool name to invoke.
    pub name: String,
    /// Argument mapping (JSON object).
    #[serde(default)]
    pub arguments: Value,
}

impl ToolCallRequest {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }
}

/// One typed content item from a tool response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ContentItem {
    Text {
        text: String,
    },
    Image {
        /// Base64-encoded payload.
        data: String,
        #[serde(rename = "mimeType")]
        mime_type: String,
    },
    Video {
        /// Payload reference (URL or storage key).
        url: String,
        #[serde(rename = "mimeType")]
        mime_type: String,
    },
}

impl ContentItem {
    pub fn text(text: impl Into<String>) -> Self {
        ContentItem::Text { text: text.into() }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            ContentItem::Text { text } => Some(text),
            _ => None,
        }
    }
}

/// Normalized result of one tool invocation, as produced by the connection
/// manager. The executor reshapes (never mutates) this into caller-specific
/// presentations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallResult {
    /// Set when the tool server reported an error result.
    pub is_error: bool,
    /// Out-of-band metadata from the response, accumulated separately
    /// from the content items.
    #[serde(default)]
    pub metadata: Value,
    /// Ordered list of typed content items.
    pub content: Vec<ContentItem>,
}

impl ToolCallResult {
    /// Successful result with the given content items.
    pub fn ok(content: Vec<ContentItem>, metadata: Value) -> Self {
        Self {
            is_error: false,
            metadata,
            content,
        }
    }

    /// Error result carrying a single textual description.
    ///
    /// Tool-reported failures (a JSON-RPC error object or `isError: true`)
    /// travel as error-flagged results like this one, never as `McpError` —
    /// they are terminal for the call and must not trigger a retry.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            is_error: true,
            metadata: Value::Null,
            content: vec![ContentItem::text(message)],
        }
    }

    /// First text item, if any. Used as the textual summary of the result.
    pub fn first_text(&self) -> Option<&str> {
        self.content.iter().find_map(|item| item.as_text())
    }
}

/// Parse the raw `tools/call` response content array into typed items.
///
/// Unknown item types degrade to text so nothing is silently dropped.
pub fn parse_content_items(raw: &[Value]) -> Vec<ContentItem> {
    let mut items = Vec::with_capacity(raw.len());
    for item in raw {
        let kind = item.get("type").and_then(Value::as_str).unwrap_or("text");
        let parsed = match kind {
            "text" => ContentItem::Text {
                text: item
                    .get("text")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
            },
            "image" => ContentItem::Image {
                data: item
                    .get("data")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                mime_type: item
                    .get("mimeType")
                    .and_then(Value::as_str)
                    .unwrap_or("image/png")
                    .to_string(),
            },
            "video" => ContentItem::Video {
                url: item
                    .get("url")
                    .or_else(|| item.get("data"))
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                mime_type: item
                    .get("mimeType")
                    .and_then(Value::as_str)
                    .unwrap_or("video/mp4")
                    .to_string(),
            },
            _ => ContentItem::Text {
                text: item.to_string(),
            },
        };
        items.push(parsed);
    }

    // A tool that returns no content still yields one empty text item so
    // downstream consumers always see at least one block.
    if items.is_empty() {
        items.push(ContentItem::text(""));
    }
    items
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_text_and_image_items() {
        let raw = vec![
            json!({"type": "text", "text": "hello"}),
            json!({"type": "image", "data": "aGk=", "mimeType": "image/jpeg"}),
        ];
        let items = parse_content_items(&raw);
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].as_text(), Some("hello"));
        assert_eq!(
            items[1],
            ContentItem::Image {
                data: "aGk=".to_string(),
                mime_type: "image/jpeg".to_string(),
            }
        );
    }

    #[test]
    fn test_parse_video_item_prefers_url() {
        let raw = vec![json!({"type": "video", "url": "https://cdn/a.mp4", "mimeType": "video/mp4"})];
        let items = parse_content_items(&raw);
        assert_eq!(
            items[0],
            ContentItem::Video {
                url: "https://cdn/a.mp4".to_string(),
                mime_type: "video/mp4".to_string(),
            }
        );
    }

    #[test]
    fn test_parse_empty_content_yields_one_empty_text() {
        let items = parse_content_items(&[]);
        assert_eq!(items, vec![ContentItem::text("")]);
    }

    #[test]
    fn test_parse_unknown_type_degrades_to_text() {
        let raw = vec![json!({"type": "audio", "data": "xyz"})];
        let items = parse_content_items(&raw);
        match &items[0] {
            ContentItem::Text { text } => assert!(text.contains("audio")),
            other => panic!("expected text fallback, got {other:?}"),
        }
    }

    #[test]
    fn test_result_error_constructor() {
        let result = ToolCallResult::error("boom");
        assert!(result.is_error);
        assert_eq!(result.first_text(), Some("boom"));
    }

    #[test]
    fn test_content_item_serde_tagging() {
        let item = ContentItem::Image {
            data: "aGk=".to_string(),
            mime_type: "image/png".to_string(),
        };
        let json = serde_json::to_string(&item).unwrap();
        assert!(json.contains("\"type\":\"image\""));
        assert!(json.contains("\"mimeType\":\"image/png\""));
    }

    #[test]
    fn test_request_arguments_default_to_null() {
        let req: ToolCallRequest =
            serde_json::from_str(r#"{"id": "c1", "name": "get_time"}"#).unwrap();
        assert_eq!(req.arguments, Value::Null);
    }
}
