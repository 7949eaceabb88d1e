// Error taxonomy for the MCP subsystem
//
// Call-level failures (unknown server/tool, connection, tool-reported errors)
// are captured into the failing call's result/event, never thrown across a
// batch. Shutdown failures are collected, never raised mid-teardown.

use thiserror::Error;

/// Errors that can occur during MCP client operations.
#[derive(Debug, Error)]
pub enum McpError {
    /// Server name not present in the registry.
    #[error("unknown MCP server: '{0}'")]
    UnknownServer(String),

    /// Tool name not present in the tool index.
    #[error("unknown tool: '{0}'")]
    UnknownTool(String),

    /// Transport-level failure establishing or using a session.
    /// Retried once with a fresh session before being surfaced.
    #[error("connection error for server '{server}': {reason}")]
    Connection { server: String, reason: String },

    /// Failure closing one session during teardown.
    #[error("failed to close session '{server}': {reason}")]
    Shutdown { server: String, reason: String },
}

impl McpError {
    /// Whether a retry with a fresh session is worthwhile.
    pub fn is_retryable(&self) -> bool {
        matches!(self, McpError::Connection { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_is_retryable() {
        let err = McpError::Connection {
            server: "time".to_string(),
            reason: "pipe closed".to_string(),
        };
        assert!(err.is_retryable());
    }

    #[test]
    fn test_unknown_tool_is_not_retryable() {
        assert!(!McpError::UnknownTool("nope".to_string()).is_retryable());
    }

    #[test]
    fn test_display_includes_names() {
        let err = McpError::UnknownServer("weather".to_string());
        assert!(err.to_string().contains("weather"));

        let err = McpError::Shutdown {
            server: "time".to_string(),
            reason: "kill failed".to_string(),
        };
        assert!(err.to_string().contains("time"));
        assert!(err.to_string().contains("kill failed"));
    }
}
