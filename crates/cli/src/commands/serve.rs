//! `celsia serve`: start the HTTP API server.

use super::load_config;
use std::path::Path;

pub async fn run(config_path: Option<&Path>, port_override: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = load_config(config_path)?;

    if let Some(port) = port_override {
        config.gateway.port = port;
    }

    println!("⚡ Celsia Gateway");
    println!("   Listening: {}:{}", config.gateway.host, config.gateway.port);
    println!("   Model:     {} ({})", config.llm.model, config.llm.provider);

    celsia_gateway::start(config).await?;

    Ok(())
}
