// A single live tool-server session
//
// Owns the child process and its JSON-RPC transport. Created lazily by the
// connection manager on first use; destroyed explicitly on shutdown or when
// a transport failure is detected.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use tokio::io::AsyncReadExt;
use tokio::process::{Child, Command};
use tokio::sync::Mutex;

use super::error::McpError;
use super::registry::ServerConfig;
use super::transport::{RpcOutcome, StdioTransport};
use super::types::{parse_content_items, ToolCallResult, ToolDescriptor};

/// Timeout for the initialize handshake. Covers slow-starting servers that
/// import heavy frameworks before answering.
const INIT_TIMEOUT: Duration = Duration::from_secs(10);

/// Timeout for graceful shutdown before force-killing the child.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

const PROTOCOL_VERSION: &str = "2024-11-05";

/// The live connection handle to one tool-server process.
pub struct ServerSession {
    name: String,
    process: Mutex<Child>,
    transport: StdioTransport,
    created_at: DateTime<Utc>,
}

impl ServerSession {
    /// Spawn the server process and perform the initialization handshake.
    pub async fn connect(name: &str, config: &ServerConfig) -> Result<Self, McpError> {
        tracing::info!("Starting and connecting to MCP server '{}'", name);

        let mut cmd = Command::new(&config.command);
        cmd.args(&config.args);
        for (key, value) in &config.env {
            cmd.env(key, value);
        }

        // Windows: prevent a console window from appearing for the child.
        #[cfg(target_os = "windows")]
        {
            use std::os::windows::process::CommandExt;
            const CREATE_NO_WINDOW: u32 = 0x08000000;
            cmd.creation_flags(CREATE_NO_WINDOW);
        }

        cmd.stdin(std::process::Stdio::piped());
        cmd.stdout(std::process::Stdio::piped());
        cmd.stderr(std::process::Stdio::piped());
        cmd.kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|e| McpError::Connection {
            server: name.to_string(),
            reason: format!("failed to spawn '{}': {e}", config.command),
        })?;

        let stdin = child.stdin.take().ok_or_else(|| McpError::Connection {
            server: name.to_string(),
            reason: "failed to capture stdin".to_string(),
        })?;
        let stdout = child.stdout.take().ok_or_else(|| McpError::Connection {
            server: name.to_string(),
            reason: "failed to capture stdout".to_string(),
        })?;
        let stderr = child.stderr.take();

        let transport = StdioTransport::new(
            name,
            stdin,
            stdout,
            Duration::from_secs(config.timeout_secs),
        );

        match tokio::time::timeout(INIT_TIMEOUT, initialize(name, &transport)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                let stderr_ctx = read_stderr_on_failure(stderr).await;
                let _ = child.kill().await;
                let reason = match e {
                    McpError::Connection { reason, .. } => reason,
                    other => other.to_string(),
                };
                return Err(McpError::Connection {
                    server: name.to_string(),
                    reason: format!("{reason}{}", stderr_suffix(&stderr_ctx)),
                });
            }
            Err(_) => {
                let stderr_ctx = read_stderr_on_failure(stderr).await;
                let _ = child.kill().await;
                return Err(McpError::Connection {
                    server: name.to_string(),
                    reason: format!(
                        "initialization timed out after {}s{}",
                        INIT_TIMEOUT.as_secs(),
                        stderr_suffix(&stderr_ctx)
                    ),
                });
            }
        }

        tracing::info!("Connected to MCP server '{}'", name);

        Ok(Self {
            name: name.to_string(),
            process: Mutex::new(child),
            transport,
            created_at: Utc::now(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Query the server's advertised tool list.
    pub async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, McpError> {
        let outcome = self.transport.request("tools/list", None).await?;
        let result = match outcome {
            RpcOutcome::Result(result) => result,
            RpcOutcome::Error(err) => {
                return Err(McpError::Connection {
                    server: self.name.clone(),
                    reason: format!("tools/list failed [{}]: {}", err.code, err.message),
                });
            }
        };

        let tools = result
            .get("tools")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        Ok(tools
            .iter()
            .filter_map(|tool| {
                let name = tool.get("name").and_then(Value::as_str)?;
                Some(ToolDescriptor {
                    name: name.to_string(),
                    server: self.name.clone(),
                    description: tool
                        .get("description")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string(),
                    input_schema: tool
                        .get("inputSchema")
                        .cloned()
                        .unwrap_or_else(|| json!({"type": "object"})),
                })
            })
            .collect())
    }

    /// Invoke one tool and normalize the response.
    ///
    /// A server-reported error (JSON-RPC error object or `isError: true`)
    /// comes back as an error-flagged result, not an `Err` — those are
    /// terminal for the call and never retried.
    pub async fn call_tool(&self, tool: &str, arguments: Value) -> Result<ToolCallResult, McpError> {
        let params = json!({
            "name": tool,
            "arguments": arguments,
        });

        let outcome = self.transport.request("tools/call", Some(params)).await?;
        let result = match outcome {
            RpcOutcome::Error(err) => {
                tracing::warn!(
                    server = %self.name,
                    tool,
                    code = err.code,
                    "Tool call rejected by server: {}",
                    err.message
                );
                return Ok(ToolCallResult::error(format!(
                    "[{}] {}",
                    err.code, err.message
                )));
            }
            RpcOutcome::Result(result) => result,
        };

        let is_error = result
            .get("isError")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        let metadata = result.get("_meta").cloned().unwrap_or(Value::Null);
        let raw_content = result
            .get("content")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        let content = parse_content_items(&raw_content);

        Ok(ToolCallResult {
            is_error,
            metadata,
            content,
        })
    }

    /// Gracefully shut the server down, force-killing after a bounded wait.
    pub async fn shutdown(&self) -> Result<(), McpError> {
        // Best-effort notification; some servers exit on stdin close instead.
        let _ = self.transport.notify("shutdown", None).await;

        let mut process = self.process.lock().await;
        match tokio::time::timeout(SHUTDOWN_TIMEOUT, process.wait()).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => {
                let _ = process.kill().await;
                Err(McpError::Shutdown {
                    server: self.name.clone(),
                    reason: format!("wait failed: {e}"),
                })
            }
            Err(_) => {
                process.kill().await.map_err(|e| McpError::Shutdown {
                    server: self.name.clone(),
                    reason: format!("kill failed after shutdown timeout: {e}"),
                })
            }
        }
    }
}

async fn initialize(name: &str, transport: &StdioTransport) -> Result<(), McpError> {
    let params = json!({
        "protocolVersion": PROTOCOL_VERSION,
        "capabilities": {},
        "clientInfo": {
            "name": "miko",
            "version": env!("CARGO_PKG_VERSION"),
        },
    });

    match transport.request("initialize", Some(params)).await? {
        RpcOutcome::Result(_) => {
            transport.notify("notifications/initialized", None).await?;
            Ok(())
        }
        RpcOutcome::Error(err) => Err(McpError::Connection {
            server: name.to_string(),
            reason: format!("initialize rejected [{}]: {}", err.code, err.message),
        }),
    }
}

/// Longest stderr excerpt carried into a connection error message.
const STDERR_EXCERPT_BYTES: usize = 2000;

/// Read any available stderr output from a failed server process.
///
/// Short timeout so an empty stderr does not block; truncated to keep log
/// messages readable.
async fn read_stderr_on_failure(stderr: Option<tokio::process::ChildStderr>) -> String {
    let Some(mut stderr) = stderr else {
        return String::new();
    };

    let mut buf = String::new();
    match tokio::time::timeout(Duration::from_millis(500), stderr.read_to_string(&mut buf)).await {
        Ok(Ok(_)) => {
            if buf.len() > STDERR_EXCERPT_BYTES {
                // Cut on a char boundary: the limit may land inside a
                // multibyte sequence.
                let mut cut = STDERR_EXCERPT_BYTES;
                while !buf.is_char_boundary(cut) {
                    cut -= 1;
                }
                buf.truncate(cut);
                buf.push_str("...(truncated)");
            }
            buf
        }
        _ => String::new(),
    }
}

fn stderr_suffix(stderr: &str) -> String {
    if stderr.is_empty() {
        String::new()
    } else {
        format!(" | stderr: {}", stderr.trim())
    }
}
