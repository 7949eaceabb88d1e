// MCP subsystem: server registry, stdio transport, sessions, and the
// connection manager that ties them together.

pub mod client;
pub mod error;
pub mod registry;
pub mod session;
pub mod transport;
pub mod types;

pub use client::{McpClient, ShutdownFailure, ToolInvoker};
pub use error::McpError;
pub use registry::{ServerConfig, ServerRegistry};
pub use session::ServerSession;
pub use types::{ContentItem, ToolCallRequest, ToolCallResult, ToolDescriptor};
