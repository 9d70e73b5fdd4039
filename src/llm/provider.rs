use async_trait::async_trait;
use std::sync::Arc;

use crate::config::LLMConfig;
use crate::types::{AppError, AppResult, LLMMessage, LLMProvider, LLMRequest, LLMResponse};

#[async_trait]
pub trait LLMAdapter: Send + Sync {
    async fn create_chat_completion(&self, request: &LLMRequest) -> AppResult<LLMResponse>;
}

/// Configuration for one LLM provider connection.
pub struct LLMProviderConfig {
    pub name: String,
    pub api_key: String,
    /// Overrides the provider's default API base URL.
    pub api_base: Option<String>,
}

#[derive(Clone)]
pub struct LLM {
    adapter: Arc<dyn LLMAdapter>,
    provider_name: String,
}

impl LLM {
    pub fn new(provider: LLMProviderConfig) -> AppResult<Self> {
        let kind = LLMProvider::parse(&provider.name)
            .ok_or_else(|| AppError::Config(format!("Unsupported LLM provider: {}", provider.name)))?;
        let base = provider.api_base.as_deref();

        let adapter: Arc<dyn LLMAdapter> = match kind {
            LLMProvider::Anthropic => Arc::new(crate::llm::anthropic::AnthropicAdapter::new(&provider.api_key, base)),
            LLMProvider::OpenAI => Arc::new(crate::llm::openai::OpenAIAdapter::new(&provider.api_key, base)),
            LLMProvider::Groq => Arc::new(crate::llm::groq::GroqAdapter::new(&provider.api_key, base)),
        };

        Ok(Self {
            adapter,
            provider_name: kind.to_string(),
        })
    }

    /// Build the client for the configured provider. `Ok(None)` when no API
    /// key is set, so callers can report the LLM as not initialized.
    pub fn from_config(config: &LLMConfig) -> AppResult<Option<Self>> {
        match config.active_api_key() {
            Some(api_key) => Self::new(LLMProviderConfig {
                name: config.provider.clone(),
                api_key,
                api_base: config.api_base.clone(),
            })
            .map(Some),
            None => Ok(None),
        }
    }

    pub fn from_adapter(provider_name: impl Into<String>, adapter: Arc<dyn LLMAdapter>) -> Self {
        Self {
            adapter,
            provider_name: provider_name.into(),
        }
    }

    pub fn provider_name(&self) -> &str {
        &self.provider_name
    }

    pub async fn create_chat_completion(&self, request: &LLMRequest) -> AppResult<LLMResponse> {
        self.adapter.create_chat_completion(request).await
    }

    /// Single-turn completion returning just the text.
    pub async fn complete(
        &self,
        model: &str,
        system: Option<&str>,
        prompt: &str,
        max_tokens: u32,
        temperature: f32,
    ) -> AppResult<String> {
        let request = LLMRequest {
            model: model.to_string(),
            messages: vec![LLMMessage::user(prompt)],
            max_tokens: Some(max_tokens),
            temperature: Some(temperature),
            system_instruction: system.map(str::to_string),
        };
        Ok(self.create_chat_completion(&request).await?.content)
    }
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;

    #[test]
    fn test_unknown_provider_is_config_error() {
        let result = LLM::new(LLMProviderConfig {
            name: "palm".to_string(),
            api_key: "k".to_string(),
            api_base: None,
        });
        assert!(matches!(result, Err(AppError::Config(_))));
    }

    #[test]
    fn test_from_config_without_key() {
        let config = crate::config::Config::for_tests();
        assert!(LLM::from_config(&config.llm).unwrap().is_none());

        let mut llm_config = config.llm.clone();
        llm_config.anthropic_api_key = "sk-ant".to_string();
        let llm = LLM::from_config(&llm_config).unwrap().unwrap();
        assert_eq!(llm.provider_name(), "anthropic");
    }

    #[tokio::test]
    async fn test_complete_builds_single_turn_request() {
        let adapter = ScriptedAdapter::replying("hello");
        let llm = scripted_llm(adapter.clone());

        let text = llm.complete("m-1", Some("be brief"), "hi", 100, 0.2).await.unwrap();
        assert_eq!(text, "hello");

        let request = adapter.last_request().unwrap();
        assert_eq!(request.model, "m-1");
        assert_eq!(request.system_instruction.as_deref(), Some("be brief"));
        assert_eq!(request.messages, vec![LLMMessage::user("hi")]);
        assert_eq!(request.max_tokens, Some(100));
    }
}
