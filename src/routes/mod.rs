//! Service routers
//!
//! Every process serves exactly one service. `create_router` builds that
//! service's own routes and adds what all of them share:
//! - `/health` - liveness probe
//! - CORS from `ALLOWED_ORIGINS`
//! - request tracing

pub mod health;

use axum::Router;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::agents::{self, ArticleDraftAgent, ResearcherAgent, TaskManagerState, WorkerState};
use crate::config::Config;
use crate::mcp_servers::{self, CloudStorageState, CreativeLlmState, WebSearchState};
use crate::middleware::cors_layer;
use crate::types::AppResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Service {
    TaskManager,
    Researcher,
    ArticleDraft,
    CreativeLlm,
    WebSearch,
    CloudStorage,
}

impl Service {
    pub fn name(&self) -> &'static str {
        match self {
            Service::TaskManager => "task-manager",
            Service::Researcher => "researcher",
            Service::ArticleDraft => "article-draft",
            Service::CreativeLlm => "creative-llm",
            Service::WebSearch => "web-search",
            Service::CloudStorage => "cloud-storage",
        }
    }

    pub fn default_port(&self) -> u16 {
        match self {
            Service::TaskManager => 8000,
            Service::Researcher => 8001,
            Service::ArticleDraft => 8002,
            Service::CreativeLlm => 8003,
            Service::WebSearch => 8004,
            Service::CloudStorage => 8005,
        }
    }

    async fn service_router(&self, config: &Config) -> AppResult<Router> {
        let router = match self {
            Service::TaskManager => agents::task_manager::router(TaskManagerState::from_config(config)),
            Service::Researcher => {
                let agent = ResearcherAgent::from_config(config)?;
                agents::worker::router(WorkerState::from_config(agent, config))
            }
            Service::ArticleDraft => {
                let agent = ArticleDraftAgent::from_config(config);
                agents::worker::router(WorkerState::from_config(agent, config))
            }
            Service::CreativeLlm => mcp_servers::creative_llm::router(CreativeLlmState::from_config(config)?),
            Service::WebSearch => mcp_servers::web_search::router(WebSearchState::from_config(config)?),
            Service::CloudStorage => {
                mcp_servers::cloud_storage::router(CloudStorageState::from_config(config).await)
            }
        };
        Ok(router)
    }
}

/// Build the full router for one service.
pub async fn create_router(service: Service, config: &Config) -> AppResult<Router> {
    info!(service = service.name(), "Creating service router");

    let router = service
        .service_router(config)
        .await?
        .merge(health::router(service.name()))
        .layer(cors_layer(&config.server.cors_allowed_origins))
        .layer(TraceLayer::new_for_http());
    Ok(router)
}
