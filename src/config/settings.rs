// Configuration structs

use std::collections::HashMap;

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use crate::mcp::registry::ServerConfig as McpServerConfig;

/// HTTP server settings
///
/// Unknown keys are rejected so a top-level setting misplaced under
/// `[server]` fails the load instead of being silently dropped.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerSettings {
    /// Bind address for the client WebSocket server
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
        }
    }
}

fn default_bind_address() -> String {
    "127.0.0.1:12393".to_string()
}

/// Top-level application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// HTTP server settings
    #[serde(default)]
    pub server: ServerSettings,

    /// Tool-server launch configurations, keyed by server name
    #[serde(default)]
    pub mcp_servers: HashMap<String, McpServerConfig>,

    /// Which configured servers to start. Empty means all of them.
    #[serde(default)]
    pub enabled_servers: Vec<String>,
}

impl Config {
    /// The servers to actually use: the enabled subset, or every configured
    /// server when no subset is given. Sorted for stable startup order.
    pub fn active_servers(&self) -> Vec<String> {
        let mut names: Vec<String> = if self.enabled_servers.is_empty() {
            self.mcp_servers.keys().cloned().collect()
        } else {
            self.enabled_servers.clone()
        };
        names.sort();
        names.dedup();
        names
    }

    pub fn validate(&self) -> Result<()> {
        if self.mcp_servers.is_empty() {
            bail!("Config has no [mcp_servers] entries; nothing to serve");
        }
        for name in &self.enabled_servers {
            if !self.mcp_servers.contains_key(name) {
                bail!(
                    "enabled_servers lists '{}' but there is no [mcp_servers.{}] section",
                    name,
                    name
                );
            }
        }
        for (name, server) in &self.mcp_servers {
            if server.command.is_empty() {
                bail!("[mcp_servers.{}] has an empty command", name);
            }
        }
        Ok(())
    }
}
