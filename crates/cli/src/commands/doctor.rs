//! `celsia doctor`: diagnose configuration and connectivity.

use super::{config_file, load_config};
use celsia_providers::router::{build_chat_provider, build_embedding_provider};
use std::path::Path;

pub async fn run(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    println!("🩺 Celsia Doctor: System Diagnostics");
    println!("====================================\n");

    let mut issues = 0;

    let path = config_file(config_path);
    if !path.exists() {
        println!("  ⚠️  No config file at {} (defaults in use; `celsia config init` creates one)", path.display());
    }

    let config = match load_config(config_path) {
        Ok(config) => {
            println!("  ✅ Configuration valid");
            config
        }
        Err(e) => {
            println!("  ❌ {e}");
            println!("\n  ⚠️  Fix the configuration before running other checks.");
            return Ok(());
        }
    };

    let engine = build_chat_provider(&config.llm);
    match engine.health_check().await {
        Ok(true) => println!("  ✅ Language engine reachable ({} at {})", config.llm.model, config.llm.base_url),
        Ok(false) => {
            println!("  ❌ Language engine answered but is not healthy ({})", config.llm.base_url);
            issues += 1;
        }
        Err(e) => {
            println!("  ❌ Language engine unreachable: {e}");
            issues += 1;
        }
    }

    let embedder = build_embedding_provider(&config);
    match embedder.health_check().await {
        Ok(true) => println!("  ✅ Embedding engine reachable ({})", config.embedding.model),
        Ok(_) | Err(_) => {
            println!("  ❌ Embedding engine unreachable at {}", config.embedding_base_url());
            issues += 1;
        }
    }

    let index = celsia_agent::bootstrap::build_index(&config);
    match index.count().await {
        Ok(0) => {
            println!(
                "  ⚠️  Collection '{}' is empty; run `celsia ingest <files>`",
                config.retrieval.collection
            );
            issues += 1;
        }
        Ok(n) => println!("  ✅ Collection '{}': {n} documents", config.retrieval.collection),
        Err(e) => {
            println!("  ❌ Collection unreadable: {e}");
            issues += 1;
        }
    }

    if let Some(dir) = &config.sessions.log_dir {
        println!("  ✅ Session log: {}", dir.display());
    }

    // Summary
    println!();
    if issues == 0 {
        println!("  🎉 All checks passed!");
    } else {
        println!("  ⚠️  {issues} issue(s) found. See above for details.");
    }

    Ok(())
}
