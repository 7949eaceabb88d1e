// Tool manager - canonical tool index and its caller-facing projections
//
// One descriptor list is the source of truth; the OpenAI and Anthropic
// catalogs and the prompt fragment are derived from it at build time and
// swapped atomically on rebuild, so readers never observe a half-updated set.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use crate::mcp::client::McpClient;
use crate::mcp::error::McpError;
use crate::mcp::types::ToolDescriptor;

use super::adapter::{claude_catalog, openai_catalog, prompt_fragment, ClaudeTool, OpenAiTool};

/// How many times to try fetching one server's tool list at startup.
const BUILD_ATTEMPTS: u32 = 3;

/// Immutable snapshot of the active tool set and its projections.
pub struct ToolIndex {
    descriptors: Vec<ToolDescriptor>,
    by_name: HashMap<String, String>,
    openai: Vec<OpenAiTool>,
    claude: Vec<ClaudeTool>,
    prompt: String,
}

impl ToolIndex {
    fn from_descriptors(descriptors: Vec<ToolDescriptor>) -> Self {
        let mut by_name = HashMap::with_capacity(descriptors.len());
        for d in &descriptors {
            if let Some(previous) = by_name.insert(d.name.clone(), d.server.clone()) {
                tracing::warn!(
                    "Tool '{}' from server '{}' shadows the one from '{}'",
                    d.name,
                    d.server,
                    previous
                );
            }
        }

        let openai = openai_catalog(&descriptors);
        let claude = claude_catalog(&descriptors);
        let prompt = prompt_fragment(&descriptors);

        Self {
            descriptors,
            by_name,
            openai,
            claude,
            prompt,
        }
    }
}

/// Registry of active tools across all connected servers.
pub struct ToolManager {
    index: RwLock<Arc<ToolIndex>>,
}

impl ToolManager {
    /// Build the index directly from descriptors. Used by `rebuild` and by
    /// tests that do not want live servers.
    pub fn from_descriptors(descriptors: Vec<ToolDescriptor>) -> Self {
        Self {
            index: RwLock::new(Arc::new(ToolIndex::from_descriptors(descriptors))),
        }
    }

    /// Build the index by querying every enabled server.
    ///
    /// Each server gets a few attempts with backoff; a server that stays
    /// unreachable is skipped with a warning so one broken tool server does
    /// not take the whole pipeline down.
    pub async fn build(client: &McpClient, enabled_servers: &[String]) -> Self {
        let mut descriptors = Vec::new();

        for server in enabled_servers {
            match fetch_with_retry(client, server).await {
                Ok(tools) => {
                    tracing::info!("Loaded {} tools from MCP server '{}'", tools.len(), server);
                    descriptors.extend(tools.iter().cloned());
                }
                Err(e) => {
                    tracing::warn!(
                        "Skipping MCP server '{}' after {} attempts: {}",
                        server,
                        BUILD_ATTEMPTS,
                        e
                    );
                }
            }
        }

        Self::from_descriptors(descriptors)
    }

    /// Replace the whole index in one atomic swap.
    pub fn rebuild(&self, descriptors: Vec<ToolDescriptor>) {
        let next = Arc::new(ToolIndex::from_descriptors(descriptors));
        *self.index.write().expect("tool index lock poisoned") = next;
    }

    fn snapshot(&self) -> Arc<ToolIndex> {
        self.index.read().expect("tool index lock poisoned").clone()
    }

    /// Resolve a tool name to its owning server.
    pub fn resolve(&self, tool: &str) -> Result<String, McpError> {
        self.snapshot()
            .by_name
            .get(tool)
            .cloned()
            .ok_or_else(|| McpError::UnknownTool(tool.to_string()))
    }

    pub fn contains(&self, tool: &str) -> bool {
        self.snapshot().by_name.contains_key(tool)
    }

    pub fn descriptors(&self) -> Vec<ToolDescriptor> {
        self.snapshot().descriptors.clone()
    }

    pub fn openai_catalog(&self) -> Vec<OpenAiTool> {
        self.snapshot().openai.clone()
    }

    pub fn claude_catalog(&self) -> Vec<ClaudeTool> {
        self.snapshot().claude.clone()
    }

    pub fn prompt_fragment(&self) -> String {
        self.snapshot().prompt.clone()
    }

    pub fn len(&self) -> usize {
        self.snapshot().descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

async fn fetch_with_retry(
    client: &McpClient,
    server: &str,
) -> Result<Arc<Vec<ToolDescriptor>>, McpError> {
    let mut last_err = None;
    for attempt in 1..=BUILD_ATTEMPTS {
        match client.list_tools(server).await {
            Ok(tools) => return Ok(tools),
            Err(e) => {
                if attempt < BUILD_ATTEMPTS {
                    let delay = Duration::from_secs(1u64 << (attempt - 1));
                    tracing::debug!(
                        "Attempt {}/{} for server '{}' failed ({}), retrying in {:?}",
                        attempt,
                        BUILD_ATTEMPTS,
                        server,
                        e,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
                last_err = Some(e);
            }
        }
    }
    Err(last_err.unwrap_or_else(|| McpError::UnknownServer(server.to_string())))
}
