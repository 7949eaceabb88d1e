// Caller-facing projections of the canonical tool set
//
// Both API catalogs and the prompt fragment are pure functions over the one
// descriptor list; nothing here holds state, so the formats can never drift
// apart.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::mcp::types::{ContentItem, ToolDescriptor};

/// Which API convention the caller speaks. Decides how tool catalogs and
/// result content are shaped for them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallerMode {
    /// OpenAI-compatible function calling.
    OpenAi,
    /// Anthropic-style tool use, with inline base64 image blocks.
    Claude,
    /// No native tool calling; tools are described in the prompt text.
    Prompt,
}

/// Tool definition in OpenAI function-calling format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiTool {
    /// Type: always "function"
    #[serde(rename = "type")]
    pub tool_type: String,
    /// Function details
    pub function: FunctionDefinition,
}

/// Function definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionDefinition {
    /// Function name
    pub name: String,
    /// Function description
    pub description: String,
    /// JSON schema for parameters
    pub parameters: Value,
}

/// Tool definition in Anthropic tool-use format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaudeTool {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

/// One block of rendered tool output, shaped for the caller's API.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum RenderedBlock {
    Text { text: String },
    Image { source: ImageSource },
}

/// Inline base64 image payload, Anthropic-style.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageSource {
    #[serde(rename = "type")]
    pub source_type: String,
    pub media_type: String,
    pub data: String,
}

/// Project descriptors into the OpenAI catalog format.
pub fn openai_catalog(descriptors: &[ToolDescriptor]) -> Vec<OpenAiTool> {
    descriptors
        .iter()
        .map(|d| OpenAiTool {
            tool_type: "function".to_string(),
            function: FunctionDefinition {
                name: d.name.clone(),
                description: d.description.clone(),
                parameters: d.input_schema.clone(),
            },
        })
        .collect()
}

/// Project descriptors into the Anthropic catalog format.
pub fn claude_catalog(descriptors: &[ToolDescriptor]) -> Vec<ClaudeTool> {
    descriptors
        .iter()
        .map(|d| ClaudeTool {
            name: d.name.clone(),
            description: d.description.clone(),
            input_schema: d.input_schema.clone(),
        })
        .collect()
}

/// Render the tool set as prompt text for models without native tool calling.
pub fn prompt_fragment(descriptors: &[ToolDescriptor]) -> String {
    if descriptors.is_empty() {
        return String::new();
    }

    let mut out = String::from("Available tools:\n");
    for d in descriptors {
        out.push_str(&format!("- {}: {}\n", d.name, d.description));
        if let Ok(schema) = serde_json::to_string(&d.input_schema) {
            out.push_str(&format!("  Input schema: {schema}\n"));
        }
    }
    out
}

/// Render result content for a caller.
///
/// Text passes through unchanged in every mode. Claude callers get images as
/// inline base64 blocks; everyone else gets a textual placeholder for media
/// they cannot consume.
pub fn render_content(items: &[ContentItem], mode: CallerMode) -> Vec<RenderedBlock> {
    items
        .iter()
        .map(|item| match item {
            ContentItem::Text { text } => RenderedBlock::Text { text: text.clone() },
            ContentItem::Image { data, mime_type } => match mode {
                // Inline only well-formed base64; a malformed payload would be
                // rejected by the API anyway, so degrade it to a placeholder.
                CallerMode::Claude if BASE64.decode(data).is_ok() => RenderedBlock::Image {
                    source: ImageSource {
                        source_type: "base64".to_string(),
                        media_type: mime_type.clone(),
                        data: data.clone(),
                    },
                },
                _ => RenderedBlock::Text {
                    text: format!("[image: {mime_type}]"),
                },
            },
            // No caller consumes inline video; always a reference placeholder.
            ContentItem::Video { url, .. } => RenderedBlock::Text {
                text: format!("[video: {url}]"),
            },
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn descriptor(name: &str) -> ToolDescriptor {
        ToolDescriptor {
            name: name.to_string(),
            server: "time".to_string(),
            description: format!("The {name} tool"),
            input_schema: json!({"type": "object", "properties": {}}),
        }
    }

    #[test]
    fn test_openai_catalog_shape() {
        let catalog = openai_catalog(&[descriptor("get_time")]);
        let json = serde_json::to_value(&catalog[0]).unwrap();
        assert_eq!(json["type"], "function");
        assert_eq!(json["function"]["name"], "get_time");
        assert_eq!(json["function"]["parameters"]["type"], "object");
    }

    #[test]
    fn test_claude_catalog_shape() {
        let catalog = claude_catalog(&[descriptor("get_time")]);
        let json = serde_json::to_value(&catalog[0]).unwrap();
        assert_eq!(json["name"], "get_time");
        assert_eq!(json["input_schema"]["type"], "object");
        assert!(json.get("type").is_none());
    }

    #[test]
    fn test_prompt_fragment_lists_every_tool() {
        let fragment = prompt_fragment(&[descriptor("get_time"), descriptor("get_weather")]);
        assert!(fragment.contains("get_time"));
        assert!(fragment.contains("get_weather"));
        assert!(fragment.contains("Input schema"));
        assert_eq!(prompt_fragment(&[]), "");
    }

    #[test]
    fn test_text_passes_through_in_every_mode() {
        let items = vec![ContentItem::text("2 pm")];
        for mode in [CallerMode::OpenAi, CallerMode::Claude, CallerMode::Prompt] {
            let blocks = render_content(&items, mode);
            assert_eq!(
                blocks,
                vec![RenderedBlock::Text {
                    text: "2 pm".to_string()
                }]
            );
        }
    }

    #[test]
    fn test_claude_gets_inline_images() {
        let items = vec![ContentItem::Image {
            data: "aGk=".to_string(),
            mime_type: "image/png".to_string(),
        }];

        let blocks = render_content(&items, CallerMode::Claude);
        assert_eq!(
            blocks,
            vec![RenderedBlock::Image {
                source: ImageSource {
                    source_type: "base64".to_string(),
                    media_type: "image/png".to_string(),
                    data: "aGk=".to_string(),
                }
            }]
        );

        let blocks = render_content(&items, CallerMode::OpenAi);
        assert_eq!(
            blocks,
            vec![RenderedBlock::Text {
                text: "[image: image/png]".to_string()
            }]
        );
    }

    #[test]
    fn test_malformed_base64_degrades_to_placeholder() {
        let items = vec![ContentItem::Image {
            data: "not base64!!".to_string(),
            mime_type: "image/png".to_string(),
        }];
        let blocks = render_content(&items, CallerMode::Claude);
        assert_eq!(
            blocks,
            vec![RenderedBlock::Text {
                text: "[image: image/png]".to_string()
            }]
        );
    }

    #[test]
    fn test_video_is_always_a_placeholder() {
        let items = vec![ContentItem::Video {
            url: "https://cdn/a.mp4".to_string(),
            mime_type: "video/mp4".to_string(),
        }];
        let blocks = render_content(&items, CallerMode::Claude);
        assert_eq!(
            blocks,
            vec![RenderedBlock::Text {
                text: "[video: https://cdn/a.mp4]".to_string()
            }]
        );
    }
}
