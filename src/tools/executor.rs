// Tool executor - runs tool-call batches and streams progress events
//
// Calls run sequentially in submission order. Every call produces exactly one
// terminal status event (completed or error); the batch always ends with one
// final-results event carrying the full outcome list. Failures are captured
// into the failing call's events, never thrown across the batch. Dropping the
// event receiver abandons the rest of the batch after the in-flight call.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::mcp::client::ToolInvoker;
use crate::mcp::types::ToolCallRequest;

use super::adapter::{render_content, CallerMode, RenderedBlock};
use super::manager::ToolManager;

const EVENT_CHANNEL_CAPACITY: usize = 32;

/// Lifecycle state of one tool call, as reported to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolStatus {
    Running,
    Completed,
    Error,
}

/// Outcome of one executed tool call, shaped for the requesting caller.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutedToolCall {
    pub call_id: String,
    pub tool_name: String,
    pub is_error: bool,
    pub content: Vec<RenderedBlock>,
    #[serde(skip_serializing_if = "Value::is_null")]
    pub metadata: Value,
}

/// Progress and completion events streamed while a batch executes.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum ToolEvent {
    /// Per-call lifecycle update. Terminal when status is completed or error.
    #[serde(rename = "tool_call_status")]
    Status {
        call_id: String,
        tool_name: String,
        status: ToolStatus,
        #[serde(skip_serializing_if = "Option::is_none")]
        content: Option<Vec<RenderedBlock>>,
        #[serde(skip_serializing_if = "Value::is_null")]
        metadata: Value,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    /// Batch completion: the full outcome list, in submission order.
    #[serde(rename = "final_tool_results")]
    Final { results: Vec<ExecutedToolCall> },
}

impl ToolEvent {
    fn running(req: &ToolCallRequest) -> Self {
        ToolEvent::Status {
            call_id: req.id.clone(),
            tool_name: req.name.clone(),
            status: ToolStatus::Running,
            content: None,
            metadata: Value::Null,
            error: None,
        }
    }

    fn terminal(outcome: &ExecutedToolCall, error: Option<String>) -> Self {
        ToolEvent::Status {
            call_id: outcome.call_id.clone(),
            tool_name: outcome.tool_name.clone(),
            status: if outcome.is_error {
                ToolStatus::Error
            } else {
                ToolStatus::Completed
            },
            content: Some(outcome.content.clone()),
            metadata: outcome.metadata.clone(),
            error,
        }
    }
}

/// Executes tool-call batches against the connection manager.
pub struct ToolExecutor {
    invoker: Arc<dyn ToolInvoker>,
    manager: Arc<ToolManager>,
}

impl ToolExecutor {
    pub fn new(invoker: Arc<dyn ToolInvoker>, manager: Arc<ToolManager>) -> Self {
        Self { invoker, manager }
    }

    pub fn manager(&self) -> &ToolManager {
        &self.manager
    }

    /// Run a batch of tool calls, streaming events to the returned receiver.
    ///
    /// The batch runs on its own task; dropping the receiver cancels the
    /// remainder after the in-flight call completes.
    pub fn execute_tools(
        &self,
        requests: Vec<ToolCallRequest>,
        mode: CallerMode,
    ) -> mpsc::Receiver<ToolEvent> {
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let invoker = self.invoker.clone();
        let manager = self.manager.clone();

        tokio::spawn(async move {
            run_batch(invoker, manager, requests, mode, tx).await;
        });

        rx
    }
}

async fn run_batch(
    invoker: Arc<dyn ToolInvoker>,
    manager: Arc<ToolManager>,
    requests: Vec<ToolCallRequest>,
    mode: CallerMode,
    tx: mpsc::Sender<ToolEvent>,
) {
    let mut results = Vec::with_capacity(requests.len());

    for req in requests {
        if tx.send(ToolEvent::running(&req)).await.is_err() {
            tracing::debug!("Event receiver dropped, abandoning tool batch");
            return;
        }

        let (outcome, error) = execute_one(&invoker, &manager, &req, mode).await;

        if tx
            .send(ToolEvent::terminal(&outcome, error))
            .await
            .is_err()
        {
            tracing::debug!("Event receiver dropped, abandoning tool batch");
            return;
        }
        results.push(outcome);
    }

    let _ = tx.send(ToolEvent::Final { results }).await;
}

/// Execute a single call; never returns an error, only an error-flagged
/// outcome. The optional string is the failure detail for the status event.
async fn execute_one(
    invoker: &Arc<dyn ToolInvoker>,
    manager: &Arc<ToolManager>,
    req: &ToolCallRequest,
    mode: CallerMode,
) -> (ExecutedToolCall, Option<String>) {
    let server = match manager.resolve(&req.name) {
        Ok(server) => server,
        Err(e) => {
            tracing::warn!("Tool call '{}' targets unknown tool '{}'", req.id, req.name);
            return error_outcome(req, e.to_string());
        }
    };

    tracing::info!(
        call_id = %req.id,
        tool = %req.name,
        server = %server,
        "Executing tool call"
    );

    match invoker.call_tool(&server, &req.name, req.arguments.clone()).await {
        Ok(result) => {
            let error = if result.is_error {
                Some(
                    result
                        .first_text()
                        .unwrap_or("tool reported an error")
                        .to_string(),
                )
            } else {
                None
            };
            (
                ExecutedToolCall {
                    call_id: req.id.clone(),
                    tool_name: req.name.clone(),
                    is_error: result.is_error,
                    content: render_content(&result.content, mode),
                    metadata: result.metadata,
                },
                error,
            )
        }
        Err(e) => {
            tracing::error!("Tool call '{}' failed: {}", req.id, e);
            error_outcome(req, e.to_string())
        }
    }
}

fn error_outcome(req: &ToolCallRequest, message: String) -> (ExecutedToolCall, Option<String>) {
    (
        ExecutedToolCall {
            call_id: req.id.clone(),
            tool_name: req.name.clone(),
            is_error: true,
            content: vec![RenderedBlock::Text {
                text: message.clone(),
            }],
            metadata: Value::Null,
        },
        Some(message),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_event_serialization() {
        let event = ToolEvent::Status {
            call_id: "c1".to_string(),
            tool_name: "get_time".to_string(),
            status: ToolStatus::Running,
            content: None,
            metadata: Value::Null,
            error: None,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "tool_call_status");
        assert_eq!(json["status"], "running");
        assert!(json.get("content").is_none());
        assert!(json.get("error").is_none());
        assert!(json.get("metadata").is_none());
    }

    #[test]
    fn test_final_event_serialization() {
        let event = ToolEvent::Final {
            results: vec![ExecutedToolCall {
                call_id: "c1".to_string(),
                tool_name: "get_time".to_string(),
                is_error: false,
                content: vec![RenderedBlock::Text {
                    text: "2 pm".to_string(),
                }],
                metadata: Value::Null,
            }],
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "final_tool_results");
        assert_eq!(json["results"][0]["call_id"], "c1");
        assert_eq!(json["results"][0]["is_error"], false);
        assert_eq!(json["results"][0]["content"][0]["text"], "2 pm");
    }
}
