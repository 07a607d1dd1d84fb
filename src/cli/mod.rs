use clap::{ Parser, ValueEnum };
use crate::history::DEFAULT_SEARCH_LIMIT;
use crate::llm::{ DEFAULT_MAX_TOKENS, DEFAULT_TIMEOUT_SECS };

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum RunMode {
    /// WebSocket server, plus the HTTP API when --http-port is set
    Server,
    /// Interactive chat on stdin/stdout
    Repl,
}

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// How to expose the chat agent
    #[arg(long, env = "RUN_MODE", value_enum, default_value = "server")]
    pub mode: RunMode,

    // --- Chat LLM Provider Args ---
    /// Type of LLM provider for chat completion (anthropic, openai, ollama)
    #[arg(long, env = "CHAT_LLM_TYPE", default_value = "anthropic")]
    pub chat_llm_type: String,

    /// Base URL for the Chat LLM provider API (e.g., http://localhost:11434 for Ollama)
    #[arg(long, env = "CHAT_BASE_URL")] // No default, let adapters handle defaults if None
    pub chat_base_url: Option<String>,

    /// API Key for the Chat LLM provider (Anthropic, OpenAI)
    #[arg(long, env = "CHAT_API_KEY", default_value = "", hide_env_values = true)]
    pub chat_api_key: String,

    /// Model name for chat completion (e.g., claude-3-haiku-20240307, gpt-4o, llama3)
    #[arg(long, env = "CHAT_MODEL")] // No default, rely on adapter defaults if None
    pub chat_model: Option<String>,

    /// Maximum number of tokens the provider may generate per reply
    #[arg(long, env = "CHAT_MAX_TOKENS", default_value_t = DEFAULT_MAX_TOKENS)]
    pub chat_max_tokens: u32,

    /// HTTP timeout in seconds for a single completion request
    #[arg(long, env = "CHAT_TIMEOUT_SECS", default_value_t = DEFAULT_TIMEOUT_SECS)]
    pub chat_timeout_secs: u64,

    // --- History Args ---
    /// Number of earlier messages of the session to prepend to each prompt. 0 sends only the user text.
    #[arg(long, env = "HISTORY_CONTEXT_LEN", default_value = "0")]
    pub history_context_len: usize,

    /// Number of search results returned when the caller gives no limit.
    #[arg(long, env = "SEARCH_DEFAULT_LIMIT", default_value_t = DEFAULT_SEARCH_LIMIT)]
    pub search_default_limit: usize,

    // --- Server Args ---
    /// Host address and port for the WebSocket server to listen on.
    #[arg(long, env = "SERVER_ADDR", default_value = "127.0.0.1:4000")]
    pub server_addr: String,

    /// Port for the HTTP JSON API. Disabled when unset.
    #[arg(long, env = "HTTP_PORT")]
    pub http_port: Option<u16>,

    /// Optional path to the TLS certificate file (PEM format). Requires --tls-key-path.
    #[arg(long, env = "TLS_CERT_PATH")]
    pub tls_cert_path: Option<String>,

    /// Optional path to the TLS private key file (PEM format). Requires --tls-cert-path.
    #[arg(long, env = "TLS_KEY_PATH")]
    pub tls_key_path: Option<String>,

    #[arg(long, env = "ENABLE_TLS", default_value = "false")]
    pub enable_tls: bool,

    /// Enable debug logging/output
    #[arg(long, env = "DEBUG", default_value = "false")]
    pub debug: bool,
}

impl Args {
    pub fn tls_paths(&self) -> Option<(&str, &str)> {
        if !self.enable_tls {
            return None;
        }
        match (&self.tls_cert_path, &self.tls_key_path) {
            (Some(cert), Some(key)) => Some((cert.as_str(), key.as_str())),
            _ => None,
        }
    }
}
