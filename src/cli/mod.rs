use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    // --- Chat LLM Provider Args ---
    /// Type of LLM provider for chat completion (gemini, openai, anthropic, deepseek, groq, xai, ollama)
    #[arg(long, env = "CHAT_LLM_TYPE", default_value = "gemini")]
    pub chat_llm_type: String,

    /// Base URL for the Chat LLM provider API (e.g., https://generativelanguage.googleapis.com/v1beta)
    #[arg(long, env = "CHAT_BASE_URL")] // No default, let adapters handle defaults if None
    pub chat_base_url: Option<String>,

    /// API Key for the Chat LLM provider. GEMINI_API_KEY is read when CHAT_API_KEY is unset.
    #[arg(long, env = "CHAT_API_KEY", default_value = "")]
    pub chat_api_key: String,

    /// Model name for chat completion (e.g., gemini-2.0-flash-exp, gpt-4o)
    #[arg(long, env = "CHAT_MODEL")] // No default, rely on adapter defaults if None
    pub chat_model: Option<String>,

    /// Send the system prompt through Gemini's systemInstruction field instead of a leading user turn.
    #[arg(long, env = "GEMINI_SYSTEM_INSTRUCTION", default_value = "false")]
    pub gemini_system_instruction: bool,

    /// Timeout in seconds for a single upstream call. 0 or unset leaves the HTTP client default.
    #[arg(long, env = "REQUEST_TIMEOUT_SECS")]
    pub request_timeout_secs: Option<u64>,

    // --- Concierge Content Args ---
    /// Path to the knowledge base (treatments, prices, clinics).
    #[arg(long, env = "KNOWLEDGE_PATH", default_value = "json/treatments.json")]
    pub knowledge_path: String,

    /// Optional prompt template replacing the built-in instructions. Must contain {knowledge_base} once.
    #[arg(long, env = "PROMPT_TEMPLATE_PATH")]
    pub prompt_template_path: Option<String>,

    /// Clinic name the concierge speaks for.
    #[arg(long, env = "CLINIC_NAME", default_value = "エルムクリニック")]
    pub clinic_name: String,

    /// Top-level site URL, quoted for campaigns and when a treatment has no page of its own.
    #[arg(long, env = "SITE_URL", default_value = "https://www.elm-clinic.jp/")]
    pub site_url: String,

    // --- Server Args ---
    /// Host address and port for the server to listen on.
    #[arg(long, env = "SERVER_ADDR", default_value = "127.0.0.1:4000")]
    pub server_addr: String,

    /// Requests per second accepted on /api/chat across all clients. 0 disables the limiter.
    #[arg(long, env = "RATE_LIMIT_PER_SECOND", default_value = "10")]
    pub rate_limit_per_second: u32,

    /// Optional path to the TLS certificate file (PEM format). Requires --tls-key-path.
    #[arg(long, env = "TLS_CERT_PATH")]
    pub tls_cert_path: Option<String>,

    /// Optional path to the TLS private key file (PEM format). Requires --tls-cert-path.
    #[arg(long, env = "TLS_KEY_PATH")]
    pub tls_key_path: Option<String>,

    #[arg(long, env = "ENABLE_TLS", default_value = "false")]
    pub enable_tls: bool,
}

impl Args {
    /// Falls back to GEMINI_API_KEY, the variable the site has always been deployed with.
    pub fn with_env_fallbacks(self) -> Self {
        self.with_key_fallback(|name| std::env::var(name).ok())
    }

    fn with_key_fallback(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if self.chat_api_key.trim().is_empty() {
            if let Some(key) = lookup("GEMINI_API_KEY") {
                self.chat_api_key = key;
            }
        }
        self
    }
}
