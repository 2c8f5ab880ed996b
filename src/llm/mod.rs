pub mod chat;
use serde::{ Deserialize, Serialize };
use std::str::FromStr;
use std::fmt;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmType {
    Gemini,
    Ollama,
    OpenAI,
    Anthropic,
    DeepSeek,
    XAI,
    Groq,
}

impl fmt::Display for LlmType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LlmType::Gemini => "gemini",
            LlmType::Ollama => "ollama",
            LlmType::OpenAI => "openai",
            LlmType::Anthropic => "anthropic",
            LlmType::DeepSeek => "deepseek",
            LlmType::XAI => "xai",
            LlmType::Groq => "groq",
        };
        f.write_str(name)
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct ParseLlmTypeError {
    message: String,
}

impl fmt::Display for ParseLlmTypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ParseLlmTypeError {}
impl FromStr for LlmType {
    type Err = ParseLlmTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "gemini" | "google" => Ok(LlmType::Gemini),
            "ollama" => Ok(LlmType::Ollama),
            "openai" => Ok(LlmType::OpenAI),
            "anthropic" => Ok(LlmType::Anthropic),
            "deepseek" => Ok(LlmType::DeepSeek),
            "xai" => Ok(LlmType::XAI),
            "groq" => Ok(LlmType::Groq),
            _ =>
                Err(ParseLlmTypeError {
                    message: format!("Invalid LLM type: '{}'", s),
                }),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub llm_type: LlmType,
    pub api_key: Option<String>,
    pub completion_model: Option<String>,
    pub base_url: Option<String>,
    pub request_timeout: Option<Duration>,
    /// Gemini only: send the prompt through `systemInstruction` instead of synthetic turns.
    pub native_system_instruction: bool,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            llm_type: LlmType::Gemini,
            api_key: None,
            completion_model: None,
            base_url: None,
            request_timeout: None,
            native_system_instruction: false,
        }
    }
}
