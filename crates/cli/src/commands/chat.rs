//! `celsia chat`: interactive or single-message chat mode.

use super::load_config;
use celsia_core::message::SessionId;
use std::io::Write;
use std::path::Path;
use tokio::io::{AsyncBufReadExt, BufReader};

pub async fn run(
    config_path: Option<&Path>,
    message: Option<String>,
    session: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(config_path)?;
    let service = celsia_agent::build_chat_service(&config)
        .await
        .map_err(|e| format!("Failed to initialize the agent: {e:#}"))?;
    let session_id = session.map(SessionId::from).unwrap_or_default();

    if let Some(msg) = message {
        // Single message mode
        eprint!("  Pensando...");
        let response = service.chat(&session_id, &msg).await;
        eprint!("\r              \r");
        println!("{response}");
        return Ok(());
    }

    // Interactive mode
    println!();
    println!("  ╔══════════════════════════════════════════════╗");
    println!("  ║      Asistente Celsia (modo interactivo)     ║");
    println!("  ╚══════════════════════════════════════════════╝");
    println!();
    println!("  Provider:  {}", config.llm.provider);
    println!("  Model:     {}", config.llm.model);
    println!("  Tools:     {}", service.agent().tools().len());
    println!("  Session:   {session_id}");
    println!();
    println!("  Escribe tu pregunta y presiona Enter.");
    println!("  Escribe 'salir' o Ctrl+C para terminar.");
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("  Tú > ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if matches!(line, "salir" | "exit" | "quit") {
            break;
        }

        eprint!("  ...");
        let response = service.chat(&session_id, line).await;
        eprint!("\r     \r");
        println!();
        for text in response.lines() {
            println!("  Celsia > {text}");
        }
        println!();
    }

    println!();
    println!("  ¡Hasta pronto! 👋");
    println!();
    Ok(())
}
