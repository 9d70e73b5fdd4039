//! Agent System
//!
//! - **Task Manager**: accepts user requests, assigns tasks, tracks results
//! - **Researcher**: web research + summary (`research`)
//! - **Article Draft**: long-form draft written to cloud storage (`write_article_draft`)
//!
//! ## Message Flow
//!
//! ```text
//! Client ──trigger──▶ Task Manager ──assign_task──▶ Worker Agent
//!    ▲                     ▲                            │
//!    │                     └────────task_result─────────┤
//!    └──poll status──┘                                  ▼
//!                                               MCP tool servers
//! ```

pub mod article_draft;
pub mod researcher;
pub mod task_manager;
pub mod worker;

pub use article_draft::ArticleDraftAgent;
pub use researcher::ResearcherAgent;
pub use task_manager::{TaskManagerState, TaskRecord, TaskRegistry};
pub use worker::{JobOutcome, Rejection, WorkerAgent, WorkerState};
