use async_trait::async_trait;
use log::{ info, warn };
use reqwest::Client as HttpClient;
use serde::{ Deserialize, Serialize };
use url::Url;

use super::{ ChatClient, GatewayError };
use crate::conversation::Exchange;
use crate::llm::{ LlmConfig, LlmType };
use crate::models::chat::{ ChatMessage, Role };

pub const DEFAULT_MODEL: &str = "gemini-2.0-flash-exp";
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent>,
}

#[derive(Serialize, Deserialize)]
struct GeminiContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Serialize, Deserialize)]
struct GeminiPart {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    content: Option<GeminiContent>,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

impl GeminiContent {
    fn text(role: Option<&str>, text: &str) -> Self {
        Self {
            role: role.map(str::to_string),
            parts: vec![GeminiPart { text: Some(text.to_string()) }],
        }
    }

    fn from_message(message: &ChatMessage) -> Self {
        let role = match message.role {
            Role::User => "user",
            Role::Assistant => "model",
        };
        Self::text(Some(role), &message.content)
    }
}

fn extract_text(response: GenerateContentResponse) -> Result<String, GatewayError> {
    let candidate = match response.candidates.into_iter().next() {
        Some(c) => c,
        None => {
            return match response.prompt_feedback.and_then(|f| f.block_reason) {
                Some(reason) => Err(GatewayError::Blocked(reason)),
                None => Err(GatewayError::EmptyResponse),
            };
        }
    };

    let text: String = candidate.content
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    if text.is_empty() {
        let reason = candidate.finish_reason.unwrap_or_default();
        return match reason.as_str() {
            "SAFETY" | "BLOCKLIST" | "PROHIBITED_CONTENT" => Err(GatewayError::Blocked(reason.clone())),
            _ => Err(GatewayError::EmptyResponse),
        };
    }
    Ok(text)
}

pub struct GeminiChatClient {
    http: HttpClient,
    api_key: Option<String>,
    model: String,
    endpoint: Url,
    native_system_instruction: bool,
}

impl GeminiChatClient {
    pub fn new(
        api_key: Option<String>,
        model: Option<String>,
        base_url: Option<String>,
        request_timeout: Option<std::time::Duration>,
        native_system_instruction: bool
    ) -> Result<Self, GatewayError> {
        let chat_model = model.unwrap_or_else(|| DEFAULT_MODEL.to_string());
        let base = base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let endpoint = Url::parse(
            &format!("{}/models/{}:generateContent", base.trim_end_matches('/'), chat_model)
        ).map_err(|e| GatewayError::Config(format!("invalid Gemini base URL '{}': {}", base, e)))?;

        let mut builder = HttpClient::builder();
        if let Some(timeout) = request_timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build()?;

        if api_key.as_deref().map_or(true, |k| k.trim().is_empty()) {
            warn!("Gemini API key is not set; chat requests will fail until it is configured");
        }

        Ok(Self {
            http,
            api_key,
            model: chat_model,
            endpoint,
            native_system_instruction,
        })
    }

    pub fn from_config(config: &LlmConfig) -> Result<Self, GatewayError> {
        Self::new(
            config.api_key.clone(),
            config.completion_model.clone(),
            config.base_url.clone(),
            config.request_timeout,
            config.native_system_instruction
        )
    }
}

#[async_trait]
impl ChatClient for GeminiChatClient {
    async fn generate(&self, exchange: &Exchange) -> Result<String, GatewayError> {
        let api_key = self.api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or(GatewayError::MissingCredential(LlmType::Gemini))?;

        let mut contents: Vec<GeminiContent> = exchange.history
            .iter()
            .map(GeminiContent::from_message)
            .collect();
        contents.push(GeminiContent::text(Some("user"), &exchange.live));

        let payload = GenerateContentRequest {
            contents,
            system_instruction: exchange.system
                .as_ref()
                .map(|s| GeminiContent::text(None, s.as_str())),
        };

        info!(
            "GeminiChatClient::generate() → model={} turns={} system_field={}",
            self.model,
            payload.contents.len(),
            payload.system_instruction.is_some()
        );

        let resp = self.http
            .post(self.endpoint.clone())
            .header("x-goog-api-key", api_key)
            .json(&payload)
            .send().await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(GatewayError::Status { status: status.as_u16(), body });
        }

        let parsed: GenerateContentResponse = resp.json().await?;
        extract_text(parsed)
    }

    fn supports_system_instruction(&self) -> bool {
        self.native_system_instruction
    }

    fn get_model(&self) -> String {
        self.model.clone()
    }

    fn get_llm_type(&self) -> LlmType {
        LlmType::Gemini
    }
}
