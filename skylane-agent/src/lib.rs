pub mod tools;

pub use tools::{AgentDispatcher, AgentTool, ToolCall, ToolResult};
