//! Configuration loading, validation, and management for the Celsia assistant.
//!
//! Loads configuration from `~/.celsia/config.toml` (or an explicit path),
//! then applies environment variable overrides (a `.env` file is honoured)
//! and validates every setting before anything is built from it.

use celsia_core::provider::SamplingParams;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// The root configuration structure.
///
/// Maps directly to `~/.celsia/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Language engine settings
    #[serde(default)]
    pub llm: LlmConfig,

    /// Embedding engine settings
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Vector index and retrieval settings
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// Orchestrator settings
    #[serde(default)]
    pub agent: AgentConfig,

    /// HTTP gateway settings
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Session store settings
    #[serde(default)]
    pub sessions: SessionsConfig,
}

/// Redact a secret for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Adapter: "ollama" (native API) or "openai" (any OpenAI-compatible endpoint)
    #[serde(default = "default_provider")]
    pub provider: String,

    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_llm_model")]
    pub model: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_top_k")]
    pub top_k: u32,

    #[serde(default = "default_top_p")]
    pub top_p: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,
}

fn default_provider() -> String {
    "ollama".into()
}
fn default_base_url() -> String {
    "http://localhost:11434".into()
}
fn default_llm_model() -> String {
    "qwen3:4b".into()
}
fn default_temperature() -> f32 {
    0.5
}
fn default_top_k() -> u32 {
    40
}
fn default_top_p() -> f32 {
    0.9
}
fn default_max_tokens() -> u32 {
    1024
}
fn default_llm_timeout() -> u64 {
    120
}

impl LlmConfig {
    pub fn sampling(&self) -> SamplingParams {
        SamplingParams {
            temperature: self.temperature,
            top_k: self.top_k,
            top_p: self.top_p,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            base_url: default_base_url(),
            model: default_llm_model(),
            api_key: None,
            temperature: default_temperature(),
            top_k: default_top_k(),
            top_p: default_top_p(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_llm_timeout(),
        }
    }
}

impl std::fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmConfig")
            .field("provider", &self.provider)
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("api_key", &redact(&self.api_key))
            .field("temperature", &self.temperature)
            .field("top_k", &self.top_k)
            .field("top_p", &self.top_p)
            .field("max_tokens", &self.max_tokens)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,

    /// Falls back to `llm.base_url` when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    #[serde(default = "default_embedding_model")]
    pub model: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_embedding_timeout")]
    pub timeout_secs: u64,
}

fn default_embedding_model() -> String {
    "nomic-embed-text".into()
}
fn default_embedding_timeout() -> u64 {
    30
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            base_url: None,
            model: default_embedding_model(),
            api_key: None,
            timeout_secs: default_embedding_timeout(),
        }
    }
}

impl std::fmt::Debug for EmbeddingConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingConfig")
            .field("provider", &self.provider)
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("api_key", &redact(&self.api_key))
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Directory holding the persisted collections
    #[serde(default = "default_persist_directory")]
    pub persist_directory: PathBuf,

    #[serde(default = "default_collection")]
    pub collection: String,

    /// Passages returned per query
    #[serde(default = "default_retriever_k")]
    pub retriever_k: usize,

    /// Candidates fetched before re-ranking = retriever_k × multiplier
    #[serde(default = "default_fetch_k_multiplier")]
    pub fetch_k_multiplier: usize,

    /// MMR trade-off: 1.0 = pure relevance, 0.0 = pure diversity
    #[serde(default = "default_diversity_lambda")]
    pub diversity_lambda: f32,

    /// Upper bound on the context handed to the knowledge tool's prompt
    #[serde(default = "default_max_context_tokens")]
    pub max_context_tokens: usize,
}

fn default_persist_directory() -> PathBuf {
    PathBuf::from("./chromadb_storage")
}
fn default_collection() -> String {
    "rag_collection".into()
}
fn default_retriever_k() -> usize {
    5
}
fn default_fetch_k_multiplier() -> usize {
    4
}
fn default_diversity_lambda() -> f32 {
    0.5
}
fn default_max_context_tokens() -> usize {
    3000
}

impl RetrievalConfig {
    pub fn fetch_k(&self) -> usize {
        self.retriever_k.saturating_mul(self.fetch_k_multiplier)
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            persist_directory: default_persist_directory(),
            collection: default_collection(),
            retriever_k: default_retriever_k(),
            fetch_k_multiplier: default_fetch_k_multiplier(),
            diversity_lambda: default_diversity_lambda(),
            max_context_tokens: default_max_context_tokens(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Language engine calls allowed per user turn
    #[serde(default = "default_max_loop_iterations")]
    pub max_loop_iterations: u32,

    #[serde(default = "default_tool_timeout")]
    pub tool_timeout_secs: u64,

    /// Run the tool calls of one model turn concurrently
    #[serde(default = "default_true")]
    pub parallel_tool_calls: bool,

    /// Replace the built-in system prompt entirely
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt_override: Option<String>,
}

fn default_max_loop_iterations() -> u32 {
    10
}
fn default_tool_timeout() -> u64 {
    60
}
fn default_true() -> bool {
    true
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_loop_iterations: default_max_loop_iterations(),
            tool_timeout_secs: default_tool_timeout(),
            parallel_tool_calls: true,
            system_prompt_override: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,
}

fn default_port() -> u16 {
    8000
}
fn default_host() -> String {
    "127.0.0.1".into()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionsConfig {
    /// When set, every turn is appended to `<log_dir>/<session>.jsonl`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_dir: Option<PathBuf>,

    /// Sessions kept in memory before the least recently used is evicted
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,
}

fn default_max_sessions() -> usize {
    10_000
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            log_dir: None,
            max_sessions: default_max_sessions(),
        }
    }
}

const KNOWN_PROVIDERS: [&str; 2] = ["ollama", "openai"];

impl AppConfig {
    /// Load configuration from the default path (~/.celsia/config.toml).
    ///
    /// Reads `.env` first, then applies environment overrides:
    /// - `OLLAMA_BASE_URL`, `OLLAMA_LLM_MODEL`, `OLLAMA_EMBED_MODEL`
    /// - `LLM_TEMPERATURE`, `LLM_TOP_K`, `LLM_TOP_P`, `RETRIEVER_K`
    /// - `CELSIA_API_KEY`, `CELSIA_PORT`
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with_env(&Self::config_dir().join("config.toml"))
    }

    /// Load from `path`, then apply `.env` and environment overrides.
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        let mut config = Self::load_from(path)?;
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path (no env overrides).
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from a variable lookup (the process environment in production).
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("OLLAMA_BASE_URL") {
            self.llm.base_url = url;
        }
        if let Some(model) = lookup("OLLAMA_LLM_MODEL") {
            self.llm.model = model;
        }
        if let Some(model) = lookup("OLLAMA_EMBED_MODEL") {
            self.embedding.model = model;
        }
        if let Some(key) = lookup("CELSIA_API_KEY") {
            self.llm.api_key = Some(key);
        }
        if let Some(v) = lookup("LLM_TEMPERATURE") {
            self.llm.temperature = parse_env("LLM_TEMPERATURE", &v)?;
        }
        if let Some(v) = lookup("LLM_TOP_K") {
            self.llm.top_k = parse_env("LLM_TOP_K", &v)?;
        }
        if let Some(v) = lookup("LLM_TOP_P") {
            self.llm.top_p = parse_env("LLM_TOP_P", &v)?;
        }
        if let Some(v) = lookup("RETRIEVER_K") {
            self.retrieval.retriever_k = parse_env("RETRIEVER_K", &v)?;
        }
        if let Some(v) = lookup("CELSIA_PORT") {
            self.gateway.port = parse_env("CELSIA_PORT", &v)?;
        }
        Ok(())
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".celsia")
    }

    /// Base URL of the embedding engine (inherits the language engine's).
    pub fn embedding_base_url(&self) -> &str {
        self.embedding.base_url.as_deref().unwrap_or(&self.llm.base_url)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.llm.sampling().validate().map_err(ConfigError::ValidationError)?;

        for (section, provider) in [("llm", &self.llm.provider), ("embedding", &self.embedding.provider)] {
            if !KNOWN_PROVIDERS.contains(&provider.as_str()) {
                return Err(ConfigError::ValidationError(format!(
                    "{section}.provider must be one of {KNOWN_PROVIDERS:?}, got '{provider}'"
                )));
            }
        }

        if self.llm.timeout_secs == 0 || self.embedding.timeout_secs == 0 || self.agent.tool_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "timeouts must be at least 1 second".into(),
            ));
        }

        if self.retrieval.retriever_k == 0 {
            return Err(ConfigError::ValidationError("retriever_k must be >= 1".into()));
        }

        if self.retrieval.fetch_k_multiplier == 0 {
            return Err(ConfigError::ValidationError(
                "fetch_k_multiplier must be >= 1".into(),
            ));
        }

        if !(0.0..=1.0).contains(&self.retrieval.diversity_lambda) {
            return Err(ConfigError::ValidationError(
                "diversity_lambda must be between 0.0 and 1.0".into(),
            ));
        }

        if self.agent.max_loop_iterations == 0 {
            return Err(ConfigError::ValidationError(
                "max_loop_iterations must be >= 1".into(),
            ));
        }

        if self.sessions.max_sessions == 0 {
            return Err(ConfigError::ValidationError("max_sessions must be >= 1".into()));
        }

        Ok(())
    }

    /// Generate a default config TOML string (for `celsia config init`).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| {
        ConfigError::ValidationError(format!("{key} has an invalid value: '{value}'"))
    })
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
