// MCP connection manager
//
// Lazily opens at most one session per configured server and hands out tool
// invocations against it. A transport failure evicts the dead session and the
// call is retried once on a fresh one; tool-reported errors pass through
// untouched. Shutdown drains every session and collects failures instead of
// aborting on the first one.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;

use super::error::McpError;
use super::registry::ServerRegistry;
use super::session::ServerSession;
use super::types::{ToolCallResult, ToolDescriptor};

/// Anything that can invoke a named tool on a named server.
///
/// The executor depends on this seam rather than on the client directly so
/// tests can substitute scripted invokers.
#[async_trait]
pub trait ToolInvoker: Send + Sync {
    async fn call_tool(
        &self,
        server: &str,
        tool: &str,
        arguments: Value,
    ) -> Result<ToolCallResult, McpError>;
}

/// One session failing to close during teardown.
#[derive(Debug)]
pub struct ShutdownFailure {
    pub server: String,
    pub error: McpError,
}

#[derive(Default)]
struct SlotState {
    session: Option<Arc<ServerSession>>,
    tools: Option<Arc<Vec<ToolDescriptor>>>,
}

/// Per-server slot. Its mutex is the unit of connect serialization: two
/// callers racing to use the same server queue here, while different servers
/// connect independently.
#[derive(Default)]
struct ServerSlot {
    state: Mutex<SlotState>,
}

/// Connection manager over all configured tool servers.
pub struct McpClient {
    registry: Arc<ServerRegistry>,
    slots: Mutex<HashMap<String, Arc<ServerSlot>>>,
}

impl McpClient {
    pub fn new(registry: Arc<ServerRegistry>) -> Self {
        Self {
            registry,
            slots: Mutex::new(HashMap::new()),
        }
    }

    pub fn registry(&self) -> &ServerRegistry {
        &self.registry
    }

    /// Get or create the slot for a registered server.
    async fn slot(&self, server: &str) -> Result<Arc<ServerSlot>, McpError> {
        // Validate before allocating a slot so unknown names never get one.
        self.registry.get(server)?;

        let mut slots = self.slots.lock().await;
        Ok(slots.entry(server.to_string()).or_default().clone())
    }

    /// Get the live session for a server, connecting if necessary.
    ///
    /// The slot lock is held across the connect, so concurrent callers for
    /// the same server share the single resulting session.
    async fn session(&self, server: &str) -> Result<Arc<ServerSession>, McpError> {
        let slot = self.slot(server).await?;
        let mut state = slot.state.lock().await;

        if let Some(session) = &state.session {
            return Ok(session.clone());
        }

        let config = self.registry.get(server)?;
        let session = Arc::new(ServerSession::connect(server, config).await?);
        state.session = Some(session.clone());
        Ok(session)
    }

    /// Drop a dead session (and its cached tool list) so the next use
    /// reconnects. Only evicts if the slot still holds the same session,
    /// so a concurrent reconnect is never torn down by a stale failure.
    async fn evict(&self, server: &str, dead: &Arc<ServerSession>) {
        let Ok(slot) = self.slot(server).await else {
            return;
        };
        let mut state = slot.state.lock().await;
        let is_current = state
            .session
            .as_ref()
            .map(|current| Arc::ptr_eq(current, dead))
            .unwrap_or(false);
        if is_current {
            state.session = None;
            state.tools = None;
        }

        let dead = dead.clone();
        tokio::spawn(async move {
            if let Err(e) = dead.shutdown().await {
                tracing::debug!("Teardown of evicted session failed: {}", e);
            }
        });
    }

    /// List the tools advertised by one server, caching the result until the
    /// session is evicted or `invalidate_tools` is called.
    pub async fn list_tools(&self, server: &str) -> Result<Arc<Vec<ToolDescriptor>>, McpError> {
        {
            let slot = self.slot(server).await?;
            let state = slot.state.lock().await;
            if let Some(tools) = &state.tools {
                return Ok(tools.clone());
            }
        }

        let mut last_err = None;
        for attempt in 0..2 {
            let session = match self.session(server).await {
                Ok(session) => session,
                Err(e) => {
                    last_err = Some(e);
                    continue;
                }
            };

            match session.list_tools().await {
                Ok(tools) => {
                    let tools = Arc::new(tools);
                    let slot = self.slot(server).await?;
                    slot.state.lock().await.tools = Some(tools.clone());
                    return Ok(tools);
                }
                Err(e) if e.is_retryable() && attempt == 0 => {
                    tracing::warn!(
                        server,
                        "Tool listing failed, retrying with a fresh session: {}",
                        e
                    );
                    self.evict(server, &session).await;
                    last_err = Some(e);
                }
                Err(e) => {
                    last_err = Some(e);
                    break;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| McpError::Connection {
            server: server.to_string(),
            reason: "tool listing failed".to_string(),
        }))
    }

    /// Drop the cached tool list for a server without touching its session.
    pub async fn invalidate_tools(&self, server: &str) {
        let Ok(slot) = self.slot(server).await else {
            return;
        };
        slot.state.lock().await.tools = None;
    }

    /// Close every open session. Always drains the full map; per-session
    /// failures are collected and returned, never raised mid-teardown. The
    /// client remains usable afterward (a later call reconnects).
    pub async fn close(&self) -> Vec<ShutdownFailure> {
        let drained: Vec<(String, Arc<ServerSlot>)> =
            self.slots.lock().await.drain().collect();

        let mut failures = Vec::new();
        for (server, slot) in drained {
            let session = slot.state.lock().await.session.take();
            let Some(session) = session else {
                continue;
            };

            match session.shutdown().await {
                Ok(()) => tracing::info!("Closed MCP server '{}'", server),
                Err(error) => {
                    tracing::error!("Failed to close MCP server '{}': {}", server, error);
                    failures.push(ShutdownFailure { server, error });
                }
            }
        }
        failures
    }
}

#[async_trait]
impl ToolInvoker for McpClient {
    /// Invoke a tool, retrying once on a fresh session after a transport
    /// failure. Error-flagged results from the server are terminal.
    async fn call_tool(
        &self,
        server: &str,
        tool: &str,
        arguments: Value,
    ) -> Result<ToolCallResult, McpError> {
        let mut last_err = None;
        for attempt in 0..2 {
            let session = match self.session(server).await {
                Ok(session) => session,
                Err(e) if e.is_retryable() && attempt == 0 => {
                    last_err = Some(e);
                    continue;
                }
                Err(e) => return Err(e),
            };

            match session.call_tool(tool, arguments.clone()).await {
                Ok(result) => return Ok(result),
                Err(e) if e.is_retryable() && attempt == 0 => {
                    tracing::warn!(
                        server,
                        tool,
                        "Tool call hit a transport failure, retrying with a fresh session: {}",
                        e
                    );
                    self.evict(server, &session).await;
                    last_err = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_err.unwrap_or_else(|| McpError::Connection {
            server: server.to_string(),
            reason: "tool call failed".to_string(),
        }))
    }
}
