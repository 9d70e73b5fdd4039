// Task Assistant - multi-agent task system over A2A and MCP

pub mod config;
pub mod types;
pub mod protocol;  // A2A and MCP envelopes and clients
pub mod llm;
pub mod tools;
pub mod agents;
pub mod mcp_servers;
pub mod storage;
pub mod supervisor;
pub mod client;    // Task manager client used by `submit`
pub mod routes;
pub mod middleware;
pub mod utils;

// Re-exports for convenience
pub use config::Config;
pub use routes::{create_router, Service};
pub use types::{AppError, AppResult};
