// JSON-RPC 2.0 over stdio
//
// Line-delimited JSON to and from a tool-server child process. One request
// is in flight at a time per transport: the io mutex covers both the write
// and the matching read, so concurrent invocations against one server queue
// behind each other instead of interleaving on the shared pipes.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{ChildStdin, ChildStdout};
use tokio::sync::Mutex;

use super::error::McpError;

/// JSON-RPC 2.0 request message.
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub id: u64,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcRequest {
    pub fn new(id: u64, method: &str, params: Option<Value>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            method: method.to_string(),
            params,
        }
    }
}

/// JSON-RPC 2.0 response message (success or error).
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcResponse {
    #[allow(dead_code)]
    pub jsonrpc: String,
    pub id: u64,
    pub result: Option<Value>,
    pub error: Option<JsonRpcError>,
}

/// JSON-RPC 2.0 error object.
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
    pub data: Option<Value>,
}

/// Outcome of one request: the server's result payload, or the server's
/// error object. Transport-level failures are reported separately as
/// `McpError::Connection` so the caller can distinguish what is retryable.
#[derive(Debug)]
pub enum RpcOutcome {
    Result(Value),
    Error(JsonRpcError),
}

struct TransportIo {
    writer: ChildStdin,
    reader: BufReader<ChildStdout>,
}

/// Bi-directional JSON-RPC transport over a child process's stdio.
pub struct StdioTransport {
    server: String,
    next_id: AtomicU64,
    io: Mutex<TransportIo>,
    request_timeout: Duration,
}

impl StdioTransport {
    pub fn new(
        server: &str,
        stdin: ChildStdin,
        stdout: ChildStdout,
        request_timeout: Duration,
    ) -> Self {
        Self {
            server: server.to_string(),
            next_id: AtomicU64::new(1),
            io: Mutex::new(TransportIo {
                writer: stdin,
                reader: BufReader::new(stdout),
            }),
            request_timeout,
        }
    }

    fn connection_err(&self, reason: impl Into<String>) -> McpError {
        McpError::Connection {
            server: self.server.clone(),
            reason: reason.into(),
        }
    }

    /// Send a request and wait for the matching response.
    ///
    /// The whole exchange runs under the per-request timeout. Lines that are
    /// not JSON-RPC responses (server log noise) are skipped.
    pub async fn request(&self, method: &str, params: Option<Value>) -> Result<RpcOutcome, McpError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let req = JsonRpcRequest::new(id, method, params);

        let mut line = serde_json::to_string(&req)
            .map_err(|e| self.connection_err(format!("failed to serialize request: {e}")))?;
        line.push('\n');

        let exchange = async {
            let mut io = self.io.lock().await;

            io.writer
                .write_all(line.as_bytes())
                .await
                .map_err(|e| self.connection_err(format!("failed to write to stdin: {e}")))?;
            io.writer
                .flush()
                .await
                .map_err(|e| self.connection_err(format!("failed to flush stdin: {e}")))?;

            let mut buf = String::new();
            loop {
                buf.clear();
                let n = io
                    .reader
                    .read_line(&mut buf)
                    .await
                    .map_err(|e| self.connection_err(format!("failed to read from stdout: {e}")))?;
                if n == 0 {
                    return Err(self.connection_err("server stdout closed (process may have exited)"));
                }

                let trimmed = buf.trim();
                if trimmed.is_empty() {
                    continue;
                }

                match serde_json::from_str::<JsonRpcResponse>(trimmed) {
                    Ok(resp) if resp.id == id => {
                        if let Some(err) = resp.error {
                            return Ok(RpcOutcome::Error(err));
                        }
                        return match resp.result {
                            Some(result) => Ok(RpcOutcome::Result(result)),
                            None => Err(self
                                .connection_err("response missing both result and error")),
                        };
                    }
                    // Stale response for an earlier timed-out request, or
                    // non-response output — skip and keep reading.
                    Ok(_) | Err(_) => continue,
                }
            }
        };

        match tokio::time::timeout(self.request_timeout, exchange).await {
            Ok(outcome) => outcome,
            Err(_) => Err(self.connection_err(format!(
                "request '{method}' timed out after {}s",
                self.request_timeout.as_secs()
            ))),
        }
    }

    /// Send a notification (no response expected).
    pub async fn notify(&self, method: &str, params: Option<Value>) -> Result<(), McpError> {
        let notification = serde_json::json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
        });

        let mut line = serde_json::to_string(&notification)
            .map_err(|e| self.connection_err(format!("failed to serialize notification: {e}")))?;
        line.push('\n');

        let mut io = self.io.lock().await;
        io.writer
            .write_all(line.as_bytes())
            .await
            .map_err(|e| self.connection_err(format!("failed to write notification: {e}")))?;
        io.writer
            .flush()
            .await
            .map_err(|e| self.connection_err(format!("failed to flush notification: {e}")))?;

        Ok(())
    }
}
