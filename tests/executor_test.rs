// Batch execution tests against a scripted invoker

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use miko::mcp::client::ToolInvoker;
use miko::mcp::error::McpError;
use miko::mcp::types::{ContentItem, ToolCallRequest, ToolCallResult};
use miko::tools::adapter::{CallerMode, RenderedBlock};
use miko::tools::executor::{ToolEvent, ToolExecutor, ToolStatus};
use miko::tools::manager::ToolManager;

use miko::mcp::types::ToolDescriptor;

/// Scripted invoker: responds per tool name, counting invocations.
struct MockInvoker {
    calls: AtomicUsize,
}

impl MockInvoker {
    fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl ToolInvoker for MockInvoker {
    async fn call_tool(
        &self,
        _server: &str,
        tool: &str,
        arguments: Value,
    ) -> Result<ToolCallResult, McpError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match tool {
            "get_time" => Ok(ToolCallResult::ok(
                vec![ContentItem::text("2 pm")],
                Value::Null,
            )),
            "get_weather" => Ok(ToolCallResult::ok(
                vec![ContentItem::text(format!(
                    "sunny in {}",
                    arguments["city"].as_str().unwrap_or("?")
                ))],
                json!({"source": "wttr"}),
            )),
            "take_photo" => Ok(ToolCallResult::ok(
                vec![
                    ContentItem::text("here you go"),
                    ContentItem::Image {
                        data: "aGk=".to_string(),
                        mime_type: "image/png".to_string(),
                    },
                ],
                Value::Null,
            )),
            "broken_tool" => Ok(ToolCallResult::error("division by zero")),
            "flaky_tool" => Err(McpError::Connection {
                server: "time".to_string(),
                reason: "pipe closed".to_string(),
            }),
            other => panic!("unexpected tool {other}"),
        }
    }
}

fn descriptor(name: &str) -> ToolDescriptor {
    ToolDescriptor {
        name: name.to_string(),
        server: "time".to_string(),
        description: String::new(),
        input_schema: json!({"type": "object"}),
    }
}

fn executor(tools: &[&str]) -> (Arc<MockInvoker>, ToolExecutor) {
    let invoker = Arc::new(MockInvoker::new());
    let manager = Arc::new(ToolManager::from_descriptors(
        tools.iter().map(|name| descriptor(name)).collect(),
    ));
    (invoker.clone(), ToolExecutor::new(invoker, manager))
}

async fn collect(mut rx: tokio::sync::mpsc::Receiver<ToolEvent>) -> Vec<ToolEvent> {
    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }
    events
}

fn terminal_statuses(events: &[ToolEvent]) -> Vec<(String, ToolStatus)> {
    events
        .iter()
        .filter_map(|event| match event {
            ToolEvent::Status {
                call_id, status, ..
            } if *status != ToolStatus::Running => Some((call_id.clone(), *status)),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn batch_emits_one_terminal_event_per_call_in_order() {
    let (invoker, executor) = executor(&["get_time", "get_weather"]);

    let rx = executor.execute_tools(
        vec![
            ToolCallRequest::new("c1", "get_time", Value::Null),
            ToolCallRequest::new("c2", "get_weather", json!({"city": "Kyoto"})),
            ToolCallRequest::new("c3", "ghost_tool", Value::Null),
        ],
        CallerMode::OpenAi,
    );
    let events = collect(rx).await;

    let terminals = terminal_statuses(&events);
    assert_eq!(
        terminals,
        vec![
            ("c1".to_string(), ToolStatus::Completed),
            ("c2".to_string(), ToolStatus::Completed),
            ("c3".to_string(), ToolStatus::Error),
        ]
    );

    // Unknown tool never reaches the invoker.
    assert_eq!(invoker.calls.load(Ordering::SeqCst), 2);

    // Exactly one batch-completion event, last, with every outcome in order.
    let finals: Vec<_> = events
        .iter()
        .filter_map(|event| match event {
            ToolEvent::Final { results } => Some(results),
            _ => None,
        })
        .collect();
    assert_eq!(finals.len(), 1);
    assert!(matches!(events.last(), Some(ToolEvent::Final { .. })));

    let results = finals[0];
    assert_eq!(results.len(), 3);
    assert_eq!(results[0].call_id, "c1");
    assert!(!results[0].is_error);
    assert_eq!(
        results[1].content,
        vec![RenderedBlock::Text {
            text: "sunny in Kyoto".to_string()
        }]
    );
    assert_eq!(results[1].metadata, json!({"source": "wttr"}));
    assert!(results[2].is_error);
}

#[tokio::test]
async fn tool_reported_error_is_terminal_not_retried() {
    let (invoker, executor) = executor(&["broken_tool"]);

    let rx = executor.execute_tools(
        vec![ToolCallRequest::new("c1", "broken_tool", Value::Null)],
        CallerMode::OpenAi,
    );
    let events = collect(rx).await;

    assert_eq!(invoker.calls.load(Ordering::SeqCst), 1);
    match &events[1] {
        ToolEvent::Status { status, error, .. } => {
            assert_eq!(*status, ToolStatus::Error);
            assert_eq!(error.as_deref(), Some("division by zero"));
        }
        other => panic!("expected terminal status, got {other:?}"),
    }
}

#[tokio::test]
async fn transport_failure_is_captured_and_batch_continues() {
    let (_, executor) = executor(&["flaky_tool", "get_time"]);

    let rx = executor.execute_tools(
        vec![
            ToolCallRequest::new("c1", "flaky_tool", Value::Null),
            ToolCallRequest::new("c2", "get_time", Value::Null),
        ],
        CallerMode::OpenAi,
    );
    let events = collect(rx).await;

    let terminals = terminal_statuses(&events);
    assert_eq!(
        terminals,
        vec![
            ("c1".to_string(), ToolStatus::Error),
            ("c2".to_string(), ToolStatus::Completed),
        ]
    );
}

#[tokio::test]
async fn image_content_renders_per_caller_mode() {
    let (_, executor) = executor(&["take_photo"]);
    let request = || vec![ToolCallRequest::new("c1", "take_photo", Value::Null)];

    let events = collect(executor.execute_tools(request(), CallerMode::Claude)).await;
    let ToolEvent::Final { results } = events.last().unwrap() else {
        panic!("missing final event");
    };
    assert!(matches!(results[0].content[1], RenderedBlock::Image { .. }));
    assert_eq!(
        results[0].content[0],
        RenderedBlock::Text {
            text: "here you go".to_string()
        }
    );

    let events = collect(executor.execute_tools(request(), CallerMode::Prompt)).await;
    let ToolEvent::Final { results } = events.last().unwrap() else {
        panic!("missing final event");
    };
    assert_eq!(
        results[0].content[1],
        RenderedBlock::Text {
            text: "[image: image/png]".to_string()
        }
    );
}

#[tokio::test]
async fn dropping_the_receiver_abandons_the_batch() {
    let (invoker, executor) = executor(&["get_time"]);

    let rx = executor.execute_tools(
        vec![
            ToolCallRequest::new("c1", "get_time", Value::Null),
            ToolCallRequest::new("c2", "get_time", Value::Null),
        ],
        CallerMode::OpenAi,
    );
    drop(rx);

    // Give the batch task a moment to observe the closed channel.
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    assert_eq!(invoker.calls.load(Ordering::SeqCst), 0);
}
