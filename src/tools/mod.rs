// Tool pipeline: the canonical tool index, caller-facing projections, and
// the batch executor that streams progress events.

pub mod adapter;
pub mod executor;
pub mod manager;

pub use adapter::{CallerMode, ClaudeTool, OpenAiTool, RenderedBlock};
pub use executor::{ExecutedToolCall, ToolEvent, ToolExecutor, ToolStatus};
pub use manager::ToolManager;
