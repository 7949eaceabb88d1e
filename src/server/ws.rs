// WebSocket bridge between connected clients and the tool pipeline
//
// `GET /client-ws` upgrades to a JSON text-frame WebSocket. Inbound
// `mcp-tool-call` messages become single-call batches on the executor;
// progress events are forwarded as they arrive and the batch outcome is
// summarized into one `mcp-tool-response`. A malformed or unknown message
// gets an error reply; it never tears the connection down.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use serde_json::Value;
use uuid::Uuid;

use crate::mcp::types::ToolCallRequest;
use crate::tools::adapter::CallerMode;
use crate::tools::executor::ToolEvent;

use super::messages::{ClientMessage, ServerMessage};
use super::{AppState, ClientHandle};

/// `GET /client-ws` — WebSocket upgrade endpoint for clients.
pub async fn client_ws(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let uid = Uuid::new_v4();
    state.clients.insert(uid, ClientHandle::new());
    tracing::info!(client = %uid, "Client connected ({} active)", state.clients.len());

    let (mut sender, mut receiver) = socket.split();

    while let Some(msg) = receiver.next().await {
        let text = match msg {
            Ok(Message::Text(text)) => text,
            Ok(Message::Close(_)) | Err(_) => break,
            // Binary, ping and pong frames are not part of the protocol.
            Ok(_) => continue,
        };

        let parsed = match serde_json::from_str::<ClientMessage>(&text) {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::debug!(client = %uid, "Unparseable client message: {}", e);
                let reply = ServerMessage::Error {
                    message: format!("unrecognized message: {e}"),
                };
                if send_json(&mut sender, &reply).await.is_err() {
                    break;
                }
                continue;
            }
        };

        let keep_going = match parsed {
            ClientMessage::Heartbeat => send_json(&mut sender, &ServerMessage::HeartbeatAck)
                .await
                .is_ok(),
            ClientMessage::McpToolCall {
                tool_name,
                arguments,
            } => handle_tool_call(&state, &mut sender, tool_name, arguments).await,
        };
        if !keep_going {
            break;
        }
    }

    state.clients.remove(&uid);
    tracing::info!(client = %uid, "Client disconnected ({} active)", state.clients.len());
}

/// Run one client-initiated tool call and stream its events back.
///
/// Returns false when the socket is gone and the read loop should stop.
async fn handle_tool_call(
    state: &AppState,
    sender: &mut SplitSink<WebSocket, Message>,
    tool_name: Option<String>,
    arguments: Value,
) -> bool {
    let Some(tool_name) = tool_name.filter(|name| !name.is_empty()) else {
        let reply = ServerMessage::McpToolResponse {
            tool_name: String::new(),
            result: None,
            error: Some("no tool name provided".to_string()),
        };
        return send_json(sender, &reply).await.is_ok();
    };

    let call_id = format!("ws_{}_{}", tool_name, Uuid::new_v4());
    let request = ToolCallRequest::new(call_id, tool_name.clone(), arguments);

    // Client-initiated calls render in prompt mode: text only, media as
    // placeholders the UI can display.
    let mut events = state.executor.execute_tools(vec![request], CallerMode::Prompt);

    let mut response = None;
    while let Some(event) = events.recv().await {
        if let ToolEvent::Final { results } = &event {
            response = Some(summarize(&tool_name, results.first()));
        }
        if send_json(sender, &event).await.is_err() {
            // Dropping `events` here abandons the rest of the batch.
            return false;
        }
    }

    let response = response.unwrap_or_else(|| ServerMessage::McpToolResponse {
        tool_name,
        result: None,
        error: Some("tool execution produced no result".to_string()),
    });
    send_json(sender, &response).await.is_ok()
}

fn summarize(
    tool_name: &str,
    outcome: Option<&crate::tools::executor::ExecutedToolCall>,
) -> ServerMessage {
    match outcome {
        Some(outcome) if outcome.is_error => ServerMessage::McpToolResponse {
            tool_name: tool_name.to_string(),
            result: None,
            error: Some(
                outcome
                    .content
                    .iter()
                    .find_map(|block| match block {
                        crate::tools::adapter::RenderedBlock::Text { text } => {
                            Some(text.clone())
                        }
                        _ => None,
                    })
                    .unwrap_or_else(|| "tool reported an error".to_string()),
            ),
        },
        Some(outcome) => ServerMessage::McpToolResponse {
            tool_name: tool_name.to_string(),
            result: serde_json::to_value(&outcome.content).ok(),
            error: None,
        },
        None => ServerMessage::McpToolResponse {
            tool_name: tool_name.to_string(),
            result: None,
            error: Some("tool execution produced no result".to_string()),
        },
    }
}

async fn send_json<T: serde::Serialize>(
    sender: &mut SplitSink<WebSocket, Message>,
    payload: &T,
) -> Result<(), axum::Error> {
    let text = serde_json::to_string(payload).unwrap_or_else(|e| {
        tracing::error!("Failed to serialize outbound message: {}", e);
        "{\"type\":\"error\",\"message\":\"internal serialization failure\"}".to_string()
    });
    sender.send(Message::Text(text)).await
}
