//! Environment-driven configuration.
//!
//! All settings load from environment variables with sensible defaults;
//! API keys stay empty when unset and the components that need them degrade
//! or fail with [`Error::AdapterConfig`](crate::error::Error::AdapterConfig)
//! at construction.

use std::str::FromStr;

/// Which chat-completion provider backs the LLM client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LlmProvider {
    /// Primary provider (OpenAI-compatible chat completions).
    #[default]
    OpenAi,
    /// Secondary provider (Anthropic messages API).
    Anthropic,
}

impl FromStr for LlmProvider {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.to_ascii_lowercase().as_str() {
            "openai" | "primary" => Ok(LlmProvider::OpenAi),
            "anthropic" | "secondary" => Ok(LlmProvider::Anthropic),
            other => Err(format!("unknown LLM provider '{other}'")),
        }
    }
}

/// Application settings.
#[derive(Debug, Clone)]
pub struct Settings {
    pub openai_api_key: String,
    pub anthropic_api_key: String,
    pub newsapi_key: String,

    pub llm_provider: LlmProvider,
    pub llm_model: String,
    pub embedding_model: String,
    pub llm_temperature: f64,
    pub llm_max_tokens: u32,

    pub rate_limit_requests_per_minute: usize,

    pub memory_db_path: String,
    pub vectorstore_dir: String,

    pub debug: bool,
    pub log_level: String,
}

fn env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn env_parse<T: FromStr>(name: &str, default: T) -> T {
    env_string(name)
        .and_then(|raw| raw.parse().ok())
        .unwrap_or(default)
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            openai_api_key: String::new(),
            anthropic_api_key: String::new(),
            newsapi_key: String::new(),
            llm_provider: LlmProvider::OpenAi,
            llm_model: "gpt-4o-mini".to_string(),
            embedding_model: "text-embedding-3-small".to_string(),
            llm_temperature: 0.7,
            llm_max_tokens: 4096,
            rate_limit_requests_per_minute: 60,
            memory_db_path: "data/memory/memory.db".to_string(),
            vectorstore_dir: "data/memory/vectorstore".to_string(),
            debug: false,
            log_level: "info".to_string(),
        }
    }
}

impl Settings {
    /// Load settings from the environment, falling back to defaults.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Settings::default();
        Self {
            openai_api_key: env_string("OPENAI_API_KEY").unwrap_or_default(),
            anthropic_api_key: env_string("ANTHROPIC_API_KEY").unwrap_or_default(),
            newsapi_key: env_string("NEWSAPI_KEY").unwrap_or_default(),
            llm_provider: env_string("LLM_PROVIDER")
                .and_then(|raw| raw.parse().ok())
                .unwrap_or_default(),
            llm_model: env_string("LLM_MODEL").unwrap_or(defaults.llm_model),
            embedding_model: env_string("EMBEDDING_MODEL").unwrap_or(defaults.embedding_model),
            llm_temperature: env_parse("LLM_TEMPERATURE", defaults.llm_temperature)
                .clamp(0.0, 2.0),
            llm_max_tokens: env_parse("LLM_MAX_TOKENS", defaults.llm_max_tokens).max(1),
            rate_limit_requests_per_minute: env_parse(
                "RATE_LIMIT_REQUESTS_PER_MINUTE",
                defaults.rate_limit_requests_per_minute,
            )
            .max(1),
            memory_db_path: env_string("MEMORY_DB_PATH").unwrap_or(defaults.memory_db_path),
            vectorstore_dir: env_string("VECTORSTORE_DIR").unwrap_or(defaults.vectorstore_dir),
            debug: env_parse("DEBUG", defaults.debug),
            log_level: env_string("LOG_LEVEL")
                .map(|level| level.to_ascii_lowercase())
                .filter(|level| matches!(level.as_str(), "debug" | "info" | "warning" | "error"))
                .unwrap_or(defaults.log_level),
        }
    }
}
