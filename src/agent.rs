use crate::cli::Args;
use crate::config::knowledge::{ load_knowledge, KnowledgeBase };
use crate::config::prompt::{
    build_system_prompt,
    load_template,
    PromptSettings,
    PromptTemplate,
    SystemPrompt,
};
use crate::conversation::{ build_exchange, ConversationError, SystemPromptMode };
use crate::llm::chat::{ new_client as new_chat_client, ChatClient, GatewayError };
use crate::llm::{ LlmConfig, LlmType };
use crate::models::chat::ChatMessage;

use log::{ info, warn };
use std::error::Error;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum AgentError {
    #[error(transparent)]
    Conversation(#[from] ConversationError),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

/// Immutable per-process context shared by every request handler.
pub struct ConciergeAgent {
    chat_client: Arc<dyn ChatClient>,
    knowledge: Arc<KnowledgeBase>,
    system_prompt: SystemPrompt,
}

impl ConciergeAgent {
    fn initialize_chat_client(args: &Args) -> Result<Arc<dyn ChatClient>, Box<dyn Error + Send + Sync>> {
        let llm_type: LlmType = args.chat_llm_type.parse()?;
        let chat_api_key = if !args.chat_api_key.trim().is_empty() {
            Some(args.chat_api_key.clone())
        } else {
            None
        };
        if chat_api_key.is_none() && llm_type != LlmType::Ollama {
            warn!("CHAT_API_KEY / GEMINI_API_KEY not set - chat requests will fail");
        }
        let chat_config = LlmConfig {
            llm_type,
            api_key: chat_api_key,
            completion_model: args.chat_model.clone(),
            base_url: args.chat_base_url.clone(),
            request_timeout: args.request_timeout_secs
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs),
            native_system_instruction: args.gemini_system_instruction,
        };
        let chat_client = new_chat_client(&chat_config)?;
        info!(
            "Chat client configured: Type={}, Model={}, BaseURL={:?}, SystemField={}",
            llm_type,
            chat_client.get_model(),
            chat_config.base_url.as_deref().unwrap_or("adapter default"),
            chat_client.supports_system_instruction()
        );
        Ok(chat_client)
    }

    pub fn new(args: &Args) -> Result<Self, Box<dyn Error + Send + Sync>> {
        let knowledge = load_knowledge(&args.knowledge_path)?;
        let template = match &args.prompt_template_path {
            Some(path) => load_template(path)?,
            None => PromptTemplate::builtin(),
        };
        let settings = PromptSettings {
            clinic_name: args.clinic_name.clone(),
            site_url: args.site_url.clone(),
        };
        let system_prompt = build_system_prompt(&template, &knowledge, &settings)?;
        info!("System prompt assembled ({} chars)", system_prompt.as_str().chars().count());

        let chat_client = Self::initialize_chat_client(args)?;
        Ok(Self::from_parts(chat_client, knowledge, system_prompt))
    }

    pub fn from_parts(
        chat_client: Arc<dyn ChatClient>,
        knowledge: Arc<KnowledgeBase>,
        system_prompt: SystemPrompt
    ) -> Self {
        Self {
            chat_client,
            knowledge,
            system_prompt,
        }
    }

    pub fn prompt_mode(&self) -> SystemPromptMode {
        SystemPromptMode::for_capability(self.chat_client.supports_system_instruction())
    }

    pub fn model(&self) -> String {
        self.chat_client.get_model()
    }

    pub fn knowledge(&self) -> &KnowledgeBase {
        &self.knowledge
    }

    pub async fn process_message(&self, messages: &[ChatMessage]) -> Result<String, AgentError> {
        let exchange = build_exchange(&self.system_prompt, messages, self.prompt_mode())?;
        info!(
            "Forwarding {} prior turn(s) to {} ({:?})",
            exchange.history.len(),
            self.chat_client.get_model(),
            self.prompt_mode()
        );
        let reply = self.chat_client.generate(&exchange).await?;
        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::{ Exchange, ACKNOWLEDGMENT };
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct RecordingClient {
        native: bool,
        fail: bool,
        seen: Mutex<Vec<Exchange>>,
    }

    #[async_trait]
    impl ChatClient for RecordingClient {
        async fn generate(&self, exchange: &Exchange) -> Result<String, GatewayError> {
            self.seen.lock().unwrap().push(exchange.clone());
            if self.fail {
                Err(GatewayError::EmptyResponse)
            } else {
                Ok(format!("echo: {}", exchange.live))
            }
        }

        fn supports_system_instruction(&self) -> bool {
            self.native
        }

        fn get_model(&self) -> String {
            "recording".to_string()
        }

        fn get_llm_type(&self) -> LlmType {
            LlmType::Gemini
        }
    }

    fn agent(native: bool, fail: bool) -> (ConciergeAgent, Arc<RecordingClient>) {
        let client = Arc::new(RecordingClient { native, fail, seen: Mutex::new(vec![]) });
        let knowledge = Arc::new(KnowledgeBase { treatments: vec![], clinics: vec![], faq: vec![] });
        let settings = PromptSettings {
            clinic_name: "テストクリニック".to_string(),
            site_url: "https://clinic.example.jp/".to_string(),
        };
        let prompt = build_system_prompt(&PromptTemplate::builtin(), &knowledge, &settings).unwrap();
        (ConciergeAgent::from_parts(client.clone(), knowledge, prompt), client)
    }

    #[tokio::test]
    async fn forwards_synthetic_history_when_client_lacks_system_field() {
        let (agent, client) = agent(false, false);
        let reply = agent
            .process_message(&[ChatMessage::user("シワが気になります")]).await
            .unwrap();
        assert_eq!(reply, "echo: シワが気になります");

        let seen = client.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].history[0].content, agent.system_prompt.as_str());
        assert_eq!(seen[0].history[1].content, ACKNOWLEDGMENT);
        assert!(seen[0].system.is_none());
    }

    #[tokio::test]
    async fn uses_system_field_when_client_supports_it() {
        let (agent, client) = agent(true, false);
        assert_eq!(agent.prompt_mode(), SystemPromptMode::Native);
        agent.process_message(&[ChatMessage::user("料金は？")]).await.unwrap();
        let seen = client.seen.lock().unwrap();
        assert!(seen[0].history.is_empty());
        assert_eq!(seen[0].system.as_ref(), Some(&agent.system_prompt));
    }

    #[tokio::test]
    async fn invalid_conversation_never_reaches_the_gateway() {
        let (agent, client) = agent(false, false);
        let err = agent.process_message(&[]).await.unwrap_err();
        assert!(matches!(err, AgentError::Conversation(ConversationError::Empty)));
        assert!(client.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn gateway_failure_is_surfaced() {
        let (agent, _client) = agent(false, true);
        let err = agent.process_message(&[ChatMessage::user("q")]).await.unwrap_err();
        assert!(matches!(err, AgentError::Gateway(GatewayError::EmptyResponse)));
    }
}
