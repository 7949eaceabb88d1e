// Wire messages for the client WebSocket

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Messages a connected client may send.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientMessage {
    /// Direct tool invocation from the client UI.
    McpToolCall {
        tool_name: Option<String>,
        #[serde(default)]
        arguments: Value,
    },
    /// Keep-alive probe.
    Heartbeat,
}

/// Messages the server sends back.
///
/// Batch progress events (`tool_call_status`, `final_tool_results`) are
/// serialized from [`crate::tools::ToolEvent`] and sent alongside these.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ServerMessage {
    /// Terminal reply to one `mcp-tool-call`.
    McpToolResponse {
        tool_name: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        result: Option<Value>,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    /// Reply to a heartbeat.
    HeartbeatAck,
    /// Protocol-level problem with the client's last message.
    Error { message: String },
}
