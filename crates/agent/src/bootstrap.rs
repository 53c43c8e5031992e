//! Wire providers, index, tools and the agent loop from configuration.

use crate::loop_runner::AgentLoop;
use crate::service::ChatService;
use crate::session::{SessionLog, SessionStore};
use anyhow::Context;
use celsia_config::AppConfig;
use celsia_providers::router::{build_chat_provider, build_embedding_provider};
use celsia_retrieval::{JsonlCollection, QueryOptions, VectorIndex};
use celsia_tools::{KnowledgeSettings, KnowledgeTool, TicketStore, default_registry};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// The vector index over the configured collection.
pub fn build_index(config: &AppConfig) -> VectorIndex {
    let store = JsonlCollection::open(&config.retrieval.persist_directory, &config.retrieval.collection);
    VectorIndex::new(
        Arc::new(store),
        build_embedding_provider(config),
        config.embedding.model.clone(),
    )
    .with_timeout(Duration::from_secs(config.embedding.timeout_secs))
}

/// Build the chat service described by `config`.
pub async fn build_chat_service(config: &AppConfig) -> anyhow::Result<ChatService> {
    config.validate().context("invalid configuration")?;

    let engine = build_chat_provider(&config.llm);
    let index = build_index(config);
    match index.count().await {
        Ok(0) => warn!(
            collection = %config.retrieval.collection,
            "Knowledge collection is empty; run `celsia ingest` to load the corpus"
        ),
        Ok(n) => info!(documents = n, collection = %config.retrieval.collection, "Knowledge collection loaded"),
        Err(e) => warn!(error = %e, "Could not read knowledge collection"),
    }

    let knowledge = KnowledgeTool::new(
        Arc::new(index),
        Arc::clone(&engine),
        KnowledgeSettings {
            model: config.llm.model.clone(),
            sampling: config.llm.sampling(),
            max_tokens: Some(config.llm.max_tokens),
            query: QueryOptions::new(config.retrieval.retriever_k)
                .with_fetch_k(config.retrieval.fetch_k())
                .with_diversity(Some(config.retrieval.diversity_lambda)),
            max_context_tokens: config.retrieval.max_context_tokens,
            retrieval_timeout: Duration::from_secs(config.embedding.timeout_secs),
            llm_timeout: config.llm.timeout(),
        },
    );
    let tools = default_registry(TicketStore::new(), Some(knowledge)).context("failed to build tool registry")?;
    info!(tools = tools.len(), "Tool registry ready");

    let mut agent = AgentLoop::new(engine, config.llm.model.clone(), Arc::new(tools))
        .with_sampling(config.llm.sampling())
        .with_max_tokens(config.llm.max_tokens)
        .with_max_iterations(config.agent.max_loop_iterations)
        .with_llm_timeout(config.llm.timeout())
        .with_tool_timeout(Duration::from_secs(config.agent.tool_timeout_secs))
        .with_parallel_tool_calls(config.agent.parallel_tool_calls);
    if let Some(prompt) = &config.agent.system_prompt_override {
        agent = agent.with_system_prompt(prompt.clone());
    }

    let mut service = ChatService::new(agent, SessionStore::new(config.sessions.max_sessions));
    if let Some(dir) = &config.sessions.log_dir {
        service = service.with_log(SessionLog::new(dir.clone()));
    }
    Ok(service)
}
