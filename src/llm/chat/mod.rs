pub mod gemini;
pub mod hosted;

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use super::{ LlmConfig, LlmType };
use self::gemini::GeminiChatClient;
use self::hosted::HostedChatClient;
use crate::conversation::Exchange;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("no API key configured for {0}")]
    MissingCredential(LlmType),
    #[error("request to provider failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("provider returned HTTP {status}: {body}")]
    Status {
        status: u16,
        body: String,
    },
    #[error("prompt was blocked by the provider: {0}")]
    Blocked(String),
    #[error("provider returned no text")]
    EmptyResponse,
    #[error("provider error: {0}")]
    Provider(String),
    #[error("invalid client configuration: {0}")]
    Config(String),
}

/// A chat-completion backend. One call per user turn, no retries.
#[async_trait]
pub trait ChatClient: Send + Sync {
    async fn generate(&self, exchange: &Exchange) -> Result<String, GatewayError>;

    /// Whether the backend takes system instructions in a dedicated field.
    fn supports_system_instruction(&self) -> bool {
        false
    }

    fn get_model(&self) -> String;
    fn get_llm_type(&self) -> LlmType;
}

pub fn new_client(config: &LlmConfig) -> Result<Arc<dyn ChatClient>, GatewayError> {
    let client: Arc<dyn ChatClient> = match config.llm_type {
        LlmType::Gemini => {
            let specific_client = GeminiChatClient::from_config(config)?;
            Arc::new(specific_client)
        }
        | LlmType::Ollama
        | LlmType::OpenAI
        | LlmType::Anthropic
        | LlmType::DeepSeek
        | LlmType::XAI
        | LlmType::Groq => {
            let specific_client = HostedChatClient::from_config(config)?;
            Arc::new(specific_client)
        }
    };
    Ok(client)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn factory_picks_backend_by_type() {
        let gemini = new_client(&LlmConfig::default()).unwrap();
        assert_eq!(gemini.get_llm_type(), LlmType::Gemini);
        assert!(!gemini.supports_system_instruction());

        let openai = new_client(&LlmConfig {
            llm_type: LlmType::OpenAI,
            ..LlmConfig::default()
        }).unwrap();
        assert_eq!(openai.get_llm_type(), LlmType::OpenAI);
        assert!(openai.supports_system_instruction());
    }

    #[test]
    fn missing_key_is_not_a_construction_error() {
        let config = LlmConfig { api_key: None, ..LlmConfig::default() };
        assert!(new_client(&config).is_ok());
    }
}
