use async_trait::async_trait;
use log::info;
use rllm::builder::{ LLMBackend, LLMBuilder };
use rllm::chat::{ ChatMessage as RllmMessage, ChatRole, MessageType };

use super::{ ChatClient, GatewayError };
use crate::conversation::Exchange;
use crate::llm::{ LlmConfig, LlmType };
use crate::models::chat::{ ChatMessage, Role };

/// Chat client for providers reached through `rllm`. All of them take a system field.
pub struct HostedChatClient {
    llm_type: LlmType,
    api_key: Option<String>,
    model: String,
    base_url: Option<String>,
    timeout_secs: Option<u64>,
}

fn backend_for(llm_type: LlmType) -> Result<LLMBackend, GatewayError> {
    match llm_type {
        LlmType::Ollama => Ok(LLMBackend::Ollama),
        LlmType::OpenAI => Ok(LLMBackend::OpenAI),
        LlmType::Anthropic => Ok(LLMBackend::Anthropic),
        LlmType::DeepSeek => Ok(LLMBackend::DeepSeek),
        LlmType::XAI => Ok(LLMBackend::XAI),
        LlmType::Groq => Ok(LLMBackend::Groq),
        LlmType::Gemini =>
            Err(GatewayError::Config("Gemini is served by GeminiChatClient".to_string())),
    }
}

fn default_model(llm_type: LlmType) -> &'static str {
    match llm_type {
        LlmType::Ollama => "cogito:3b",
        LlmType::OpenAI => "gpt-4o",
        LlmType::Anthropic => "claude-3-5-sonnet-latest",
        LlmType::DeepSeek => "deepseek-chat",
        LlmType::XAI => "grok-3-latest",
        LlmType::Groq => "llama-3.1-8b-instant",
        LlmType::Gemini => super::gemini::DEFAULT_MODEL,
    }
}

fn to_rllm(message: &ChatMessage) -> RllmMessage {
    let role = match message.role {
        Role::User => ChatRole::User,
        Role::Assistant => ChatRole::Assistant,
    };
    RllmMessage {
        role,
        content: message.content.clone(),
        message_type: MessageType::Text,
    }
}

impl HostedChatClient {
    pub fn from_config(config: &LlmConfig) -> Result<Self, GatewayError> {
        backend_for(config.llm_type)?;
        let model = config.completion_model
            .clone()
            .unwrap_or_else(|| default_model(config.llm_type).to_string());
        Ok(Self {
            llm_type: config.llm_type,
            api_key: config.api_key.clone().filter(|k| !k.trim().is_empty()),
            model,
            base_url: config.base_url.clone(),
            timeout_secs: config.request_timeout.map(|d| d.as_secs().max(1)),
        })
    }

    fn conversation(exchange: &Exchange) -> Vec<RllmMessage> {
        let mut messages: Vec<RllmMessage> = exchange.history.iter().map(to_rllm).collect();
        messages.push(to_rllm(&ChatMessage::user(exchange.live.clone())));
        messages
    }
}

#[async_trait]
impl ChatClient for HostedChatClient {
    async fn generate(&self, exchange: &Exchange) -> Result<String, GatewayError> {
        // Local Ollama runs keyless; every hosted provider needs a credential.
        let api_key = match (&self.api_key, self.llm_type) {
            (Some(key), _) => key.clone(),
            (None, LlmType::Ollama) => String::new(),
            (None, other) => {
                return Err(GatewayError::MissingCredential(other));
            }
        };

        let mut builder = LLMBuilder::new()
            .backend(backend_for(self.llm_type)?)
            .api_key(api_key)
            .model(&self.model)
            .stream(false);

        if let Some(url) = &self.base_url {
            builder = builder.base_url(url);
        }
        if let Some(secs) = self.timeout_secs {
            builder = builder.timeout_seconds(secs);
        }
        if let Some(system) = &exchange.system {
            builder = builder.system(system.as_str());
        }

        let provider = builder.build().map_err(|e| GatewayError::Config(e.to_string()))?;
        let messages = Self::conversation(exchange);
        info!(
            "HostedChatClient::generate() → backend={} model={} turns={}",
            self.llm_type,
            self.model,
            messages.len()
        );

        let resp = provider.chat(&messages).await.map_err(|e| GatewayError::Provider(e.to_string()))?;
        let text = resp.text().unwrap_or_default();
        if text.trim().is_empty() {
            return Err(GatewayError::EmptyResponse);
        }
        Ok(text)
    }

    fn supports_system_instruction(&self) -> bool {
        true
    }

    fn get_model(&self) -> String {
        self.model.clone()
    }

    fn get_llm_type(&self) -> LlmType {
        self.llm_type
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::knowledge::KnowledgeBase;
    use crate::config::prompt::{ build_system_prompt, PromptSettings, PromptTemplate };
    use crate::conversation::{ build_exchange, SystemPromptMode };

    fn exchange() -> Exchange {
        let kb = KnowledgeBase { treatments: vec![], clinics: vec![], faq: vec![] };
        let settings = PromptSettings {
            clinic_name: "テストクリニック".to_string(),
            site_url: "https://clinic.example.jp/".to_string(),
        };
        let prompt = build_system_prompt(&PromptTemplate::builtin(), &kb, &settings).unwrap();
        build_exchange(
            &prompt,
            &[ChatMessage::user("A"), ChatMessage::assistant("B"), ChatMessage::user("C")],
            SystemPromptMode::Native
        ).unwrap()
    }

    #[test]
    fn uses_provider_default_model() {
        let client = HostedChatClient::from_config(&LlmConfig {
            llm_type: LlmType::Anthropic,
            ..LlmConfig::default()
        }).unwrap();
        assert_eq!(client.get_model(), "claude-3-5-sonnet-latest");
    }

    #[test]
    fn refuses_gemini() {
        assert!(HostedChatClient::from_config(&LlmConfig::default()).is_err());
    }

    #[test]
    fn live_turn_is_appended_after_history() {
        let messages = HostedChatClient::conversation(&exchange());
        let contents: Vec<&str> = messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["A", "B", "C"]);
    }

    #[tokio::test]
    async fn hosted_provider_without_key_fails_at_call_time() {
        let client = HostedChatClient::from_config(&LlmConfig {
            llm_type: LlmType::OpenAI,
            api_key: Some("   ".to_string()),
            ..LlmConfig::default()
        }).unwrap();
        let err = client.generate(&exchange()).await.unwrap_err();
        assert!(matches!(err, GatewayError::MissingCredential(LlmType::OpenAI)));
    }
}
