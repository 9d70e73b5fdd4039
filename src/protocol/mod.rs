//! Wire protocols that tie the services together
//!
//! - [`a2a`]: task assignment and result reporting between the task manager
//!   and the worker agents
//! - [`mcp`]: tool invocation from agents to tool servers

pub mod a2a;
pub mod mcp;

pub use a2a::{A2AAck, A2AClient, A2AMessage, AckStatus, MessageType, ResultReporter, TaskStatus};
pub use mcp::{MCPToolCall, MCPToolResult, McpClient, ToolStatus};
