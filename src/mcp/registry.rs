// Server registry - static mapping from server name to launch configuration

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::error::McpError;

fn default_timeout_secs() -> u64 {
    30
}

/// Launch configuration for one tool server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Command to execute.
    pub command: String,

    /// Command arguments.
    #[serde(default)]
    pub args: Vec<String>,

    /// Environment overrides for the child process.
    #[serde(default)]
    pub env: HashMap<String, String>,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// In-memory table of configured tool servers, keyed by unique server name.
///
/// Populated once at startup from external configuration; lookups of unknown
/// names fail with `UnknownServer` rather than being silently skipped.
#[derive(Debug, Default)]
pub struct ServerRegistry {
    servers: HashMap<String, ServerConfig>,
}

impl ServerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a server. Re-registration replaces the previous entry.
    pub fn register(&mut self, name: impl Into<String>, config: ServerConfig) {
        let name = name.into();
        if self.servers.insert(name.clone(), config).is_some() {
            tracing::debug!("Replaced registration for MCP server '{}'", name);
        }
    }

    pub fn get(&self, name: &str) -> Result<&ServerConfig, McpError> {
        self.servers
            .get(name)
            .ok_or_else(|| McpError::UnknownServer(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.servers.contains_key(name)
    }

    /// Registered server names, sorted for stable iteration.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.servers.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.servers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.servers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg(command: &str) -> ServerConfig {
        ServerConfig {
            command: command.to_string(),
            args: vec![],
            env: HashMap::new(),
            timeout_secs: 30,
        }
    }

    #[test]
    fn test_get_unknown_server_fails() {
        let registry = ServerRegistry::new();
        let err = registry.get("time").unwrap_err();
        assert!(matches!(err, McpError::UnknownServer(name) if name == "time"));
    }

    #[test]
    fn test_register_and_get() {
        let mut registry = ServerRegistry::new();
        registry.register("time", cfg("python"));
        assert_eq!(registry.get("time").unwrap().command, "python");
        assert!(registry.contains("time"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_reregistration_replaces() {
        let mut registry = ServerRegistry::new();
        registry.register("time", cfg("python"));
        registry.register("time", cfg("python3"));
        assert_eq!(registry.get("time").unwrap().command, "python3");
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_names_sorted() {
        let mut registry = ServerRegistry::new();
        registry.register("weather", cfg("a"));
        registry.register("time", cfg("b"));
        assert_eq!(registry.names(), vec!["time", "weather"]);
    }

    #[test]
    fn test_config_deserialization_defaults() {
        let config: ServerConfig =
            toml::from_str("command = \"uv\"\nargs = [\"run\", \"time_server.py\"]").unwrap();
        assert_eq!(config.command, "uv");
        assert_eq!(config.args, vec!["run", "time_server.py"]);
        assert!(config.env.is_empty());
        assert_eq!(config.timeout_secs, 30);
    }
}
