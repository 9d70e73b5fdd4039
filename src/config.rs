use anyhow::{Context, Result};
use serde::Deserialize;
use std::env;
use std::str::FromStr;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub llm: LLMConfig,
    pub endpoints: EndpointConfig,
    pub agents: AgentConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    /// Overrides the per-service default port when set.
    pub port: Option<u16>,
    pub cors_allowed_origins: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LLMConfig {
    pub provider: String,
    pub anthropic_api_key: String,
    pub openai_api_key: String,
    pub groq_api_key: String,
    pub api_base: Option<String>,
    pub supervisor_model: String,
    pub agent_model: String,
    pub creative_model: String,
    pub search_model: String,
}

impl LLMConfig {
    /// API key for the configured provider, if one is set.
    pub fn active_api_key(&self) -> Option<String> {
        let key = match self.provider.to_lowercase().as_str() {
            "openai" => &self.openai_api_key,
            "groq" => &self.groq_api_key,
            _ => &self.anthropic_api_key,
        };
        if key.trim().is_empty() {
            None
        } else {
            Some(key.clone())
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct EndpointConfig {
    pub task_manager_url: String,
    pub task_manager_result_url: String,
    pub researcher_agent_url: String,
    pub article_draft_agent_url: String,
    pub creative_llm_mcp_url: String,
    pub web_search_mcp_url: String,
    pub cloud_storage_mcp_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    pub dispatch_timeout_secs: u64,
    pub result_timeout_secs: u64,
    pub mcp_timeout_secs: u64,
    pub research_language: String,
    pub research_max_words: u32,
    pub search_num_results: u32,
    pub bucket_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub provider: String,
    pub local_root: String,
    pub s3_region: String,
    pub s3_endpoint: Option<String>,
    pub s3_access_key_id: Option<String>,
    pub s3_secret_access_key: Option<String>,
    pub public_base_url: String,
}

fn var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn non_empty(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_var<T>(key: &str, default: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    var_or(key, default)
        .trim()
        .parse()
        .with_context(|| format!("{} has an invalid value", key))
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let task_manager_url = var_or("TASK_MANAGER_URL", "http://localhost:8000")
            .trim_end_matches('/')
            .to_string();

        Ok(Self {
            server: ServerConfig {
                host: var_or("HOST", "0.0.0.0"),
                port: match non_empty("PORT") {
                    Some(port) => Some(port.trim().parse().context("PORT has an invalid value")?),
                    None => None,
                },
                cors_allowed_origins: var_or("ALLOWED_ORIGINS", "*")
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
            },
            llm: LLMConfig {
                provider: var_or("LLM_PROVIDER", "anthropic"),
                anthropic_api_key: env::var("ANTHROPIC_API_KEY").unwrap_or_default(),
                openai_api_key: env::var("OPENAI_API_KEY").unwrap_or_default(),
                groq_api_key: env::var("GROQ_API_KEY").unwrap_or_default(),
                api_base: non_empty("LLM_API_BASE"),
                supervisor_model: var_or("SUPERVISOR_MODEL", "claude-3-7-sonnet-20250219"),
                agent_model: var_or("AGENT_MODEL", "claude-3-haiku-20240307"),
                creative_model: var_or("CREATIVE_MODEL", "claude-3-5-sonnet-20241022"),
                search_model: var_or("SEARCH_MODEL", "claude-3-haiku-20240307"),
            },
            endpoints: EndpointConfig {
                task_manager_result_url: non_empty("TASK_MANAGER_RESULT_URL")
                    .unwrap_or_else(|| format!("{}/a2a/result", task_manager_url)),
                task_manager_url,
                researcher_agent_url: var_or("RESEARCHER_AGENT_URL", "http://localhost:8001/a2a/message"),
                article_draft_agent_url: var_or(
                    "ARTICLE_DRAFT_AGENT_URL",
                    "http://localhost:8002/a2a/message",
                ),
                creative_llm_mcp_url: var_or("CREATIVE_LLM_MCP_URL", "http://localhost:8003/mcp/tool"),
                web_search_mcp_url: var_or("WEB_SEARCH_MCP_URL", "http://localhost:8004/mcp/tool"),
                cloud_storage_mcp_url: var_or("CLOUD_STORAGE_MCP_URL", "http://localhost:8005/mcp/tool"),
            },
            agents: AgentConfig {
                dispatch_timeout_secs: parse_var("DISPATCH_TIMEOUT_SECS", "5")?,
                result_timeout_secs: parse_var("RESULT_TIMEOUT_SECS", "10")?,
                mcp_timeout_secs: parse_var("MCP_TIMEOUT_SECS", "300")?,
                research_language: var_or("RESEARCH_LANGUAGE", "English"),
                research_max_words: parse_var("RESEARCH_MAX_WORDS", "500")?,
                search_num_results: parse_var("SEARCH_NUM_RESULTS", "3")?,
                bucket_name: non_empty("CLOUD_STORAGE_BUCKET_NAME"),
            },
            storage: StorageConfig {
                provider: var_or("STORAGE_PROVIDER", "local"),
                local_root: var_or("STORAGE_LOCAL_ROOT", "./storage"),
                s3_region: var_or("S3_REGION", "us-east-1"),
                s3_endpoint: non_empty("S3_ENDPOINT"),
                s3_access_key_id: non_empty("AWS_ACCESS_KEY_ID"),
                s3_secret_access_key: non_empty("AWS_SECRET_ACCESS_KEY"),
                public_base_url: var_or("STORAGE_PUBLIC_BASE_URL", "https://storage.googleapis.com")
                    .trim_end_matches('/')
                    .to_string(),
            },
        })
    }

    /// Configuration with every default applied and no credentials, used by tests.
    pub fn for_tests() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: None,
                cors_allowed_origins: vec!["*".to_string()],
            },
            llm: LLMConfig {
                provider: "anthropic".to_string(),
                anthropic_api_key: String::new(),
                openai_api_key: String::new(),
                groq_api_key: String::new(),
                api_base: None,
                supervisor_model: "supervisor-model".to_string(),
                agent_model: "agent-model".to_string(),
                creative_model: "creative-model".to_string(),
                search_model: "search-model".to_string(),
            },
            endpoints: EndpointConfig {
                task_manager_url: "http://127.0.0.1:9".to_string(),
                task_manager_result_url: "http://127.0.0.1:9/a2a/result".to_string(),
                researcher_agent_url: "http://127.0.0.1:9/a2a/message".to_string(),
                article_draft_agent_url: "http://127.0.0.1:9/a2a/message".to_string(),
                creative_llm_mcp_url: "http://127.0.0.1:9/mcp/tool".to_string(),
                web_search_mcp_url: "http://127.0.0.1:9/mcp/tool".to_string(),
                cloud_storage_mcp_url: "http://127.0.0.1:9/mcp/tool".to_string(),
            },
            agents: AgentConfig {
                dispatch_timeout_secs: 5,
                result_timeout_secs: 10,
                mcp_timeout_secs: 30,
                research_language: "English".to_string(),
                research_max_words: 500,
                search_num_results: 3,
                bucket_name: Some("drafts".to_string()),
            },
            storage: StorageConfig {
                provider: "memory".to_string(),
                local_root: "./storage".to_string(),
                s3_region: "us-east-1".to_string(),
                s3_endpoint: None,
                s3_access_key_id: None,
                s3_secret_access_key: None,
                public_base_url: "https://storage.googleapis.com".to_string(),
            },
        }
    }
}
