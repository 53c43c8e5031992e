//! Provider router: selects the engine adapter based on config.

use crate::ollama::OllamaProvider;
use crate::openai_compat::OpenAiCompatProvider;
use celsia_config::{AppConfig, LlmConfig};
use celsia_core::provider::Provider;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Build the language engine adapter named by `[llm].provider`.
pub fn build_chat_provider(config: &LlmConfig) -> Arc<dyn Provider> {
    let timeout = Duration::from_secs(config.timeout_secs);
    info!(provider = %config.provider, base_url = %config.base_url, model = %config.model, "Building chat provider");
    build(&config.provider, &config.base_url, config.api_key.as_deref(), timeout)
}

/// Build the embedding engine adapter named by `[embedding].provider`.
///
/// The base URL and API key fall back to the `[llm]` section.
pub fn build_embedding_provider(config: &AppConfig) -> Arc<dyn Provider> {
    let timeout = Duration::from_secs(config.embedding.timeout_secs);
    let api_key = config
        .embedding
        .api_key
        .as_deref()
        .or(config.llm.api_key.as_deref());
    info!(provider = %config.embedding.provider, model = %config.embedding.model, "Building embedding provider");
    build(
        &config.embedding.provider,
        config.embedding_base_url(),
        api_key,
        timeout,
    )
}

fn build(kind: &str, base_url: &str, api_key: Option<&str>, timeout: Duration) -> Arc<dyn Provider> {
    match kind {
        "openai" => Arc::new(
            OpenAiCompatProvider::new("openai", base_url, api_key.unwrap_or_default())
                .with_timeout(timeout),
        ),
        // Validation restricts the value; anything else is the native adapter.
        _ => Arc::new(OllamaProvider::new(base_url).with_timeout(timeout)),
    }
}
