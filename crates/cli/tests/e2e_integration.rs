//! End-to-end tests for the Celsia assistant.
//!
//! These tests exercise the full pipeline from user message to answer:
//! session store, agent loop, tool registry, knowledge retrieval over an
//! ingested corpus, and the HTTP surface. The language engine is scripted.

use std::path::Path;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use celsia_agent::test_helpers::{
    FixedEmbedder, SequentialMockProvider, make_text_response, make_tool_call, make_tool_call_response,
};
use celsia_agent::{AgentLoop, ChatService, SessionStore, TurnStatus};
use celsia_core::message::{Role, SessionId};
use celsia_retrieval::{MemoryCollection, VectorIndex, load_documents};
use celsia_tools::{FALLBACK_ANSWER, KnowledgeSettings, KnowledgeTool, TicketStore, default_registry, reference};
use http_body_util::BodyExt;
use tower::ServiceExt;

const CORPUS: &str = r#"{
  "chunks": [
    {
      "content": "Celsia anunció que las tarifas de energía para hogares en el Valle del Cauca se ajustarán en noviembre según la regulación vigente de la comisión.",
      "source_url": "https://www.celsia.com/noticias/tarifas",
      "title": "Ajuste de tarifas",
      "date": "2025-10-01",
      "region": "Valle del Cauca",
      "category": "tarifas",
      "source_type": "news"
    },
    {
      "content": "Los clientes pueden solicitar la instalación de paneles solares residenciales a través de la línea de atención o la página web de soluciones energéticas.",
      "source_url": "https://www.celsia.com/solar",
      "title": "Techos solares",
      "date": null,
      "region": "Tolima",
      "category": "solar",
      "source_type": "news"
    }
  ]
}"#;

/// A service with every tool, the knowledge tool reading `corpus` (if any).
async fn service_with(engine: Arc<SequentialMockProvider>, corpus: Option<&Path>) -> ChatService {
    let index = VectorIndex::new(
        Arc::new(MemoryCollection::new()),
        Arc::new(FixedEmbedder::default()),
        "fixed",
    );
    if let Some(path) = corpus {
        index.upsert(load_documents(path).unwrap()).await.unwrap();
    }

    let knowledge = KnowledgeTool::new(Arc::new(index), engine.clone(), KnowledgeSettings::default());
    let tools = default_registry(TicketStore::new(), Some(knowledge)).unwrap();
    let agent = AgentLoop::new(engine, "mock-model", Arc::new(tools));
    ChatService::new(agent, SessionStore::new(100))
}

fn write_corpus(dir: &Path) -> std::path::PathBuf {
    let path = dir.join("noticias.json");
    std::fs::write(&path, CORPUS).unwrap();
    path
}

// ── E2E: direct tools ────────────────────────────────────────────────────

#[tokio::test]
async fn e2e_phone_question_uses_direct_tool_only() {
    let engine = Arc::new(SequentialMockProvider::tool_then_answer(
        vec![make_tool_call("get_phone", serde_json::json!({}))],
        "",
        "Puedes comunicarte con Celsia al 01 8000 112 115 (Colombia).",
    ));
    let service = service_with(engine.clone(), None).await;

    let outcome = service
        .turn(&SessionId::from("cliente"), "¿Cuál es el número de teléfono de Celsia?")
        .await;

    assert_eq!(outcome.status, TurnStatus::Done);
    assert_eq!(outcome.answer, "Puedes comunicarte con Celsia al 01 8000 112 115 (Colombia).");
    assert_eq!(outcome.tool_calls_made, 1);
    let tool_result = outcome.new_messages.iter().find(|m| m.role == Role::Tool).unwrap();
    assert_eq!(tool_result.content, reference::PHONE);
    // Decision, final answer: the knowledge tool never reached the engine.
    assert_eq!(engine.call_count(), 2);

    // Every tool was bound on the first call.
    assert_eq!(engine.requests()[0].tools.len(), 11);
}

#[tokio::test]
async fn e2e_damage_report_then_status_across_turns() {
    let engine = Arc::new(SequentialMockProvider::new(vec![
        make_tool_call_response(
            vec![make_tool_call(
                "report_service_damage",
                serde_json::json!({
                    "damage_type": "fallen_cable",
                    "address": "Calle 5 # 20-10, Tuluá",
                    "phone": "3104567890"
                }),
            )],
            "",
        ),
        make_text_response("Tu reporte quedó registrado con el ticket TKT-1001."),
        make_tool_call_response(
            vec![make_tool_call("check_report_status", serde_json::json!({"ticket_id": "TKT-1001"}))],
            "",
        ),
        make_text_response("Tu ticket TKT-1001 está en proceso."),
    ]));
    let service = service_with(engine.clone(), None).await;
    let session = SessionId::from("reporte");

    let first = service.turn(&session, "Hay un cable caído en mi calle").await;
    assert!(first.new_messages[2].content.contains("Ticket: TKT-1001"));
    assert!(first.new_messages[2].content.contains("URGENTE"));

    let second = service.turn(&session, "¿Cómo va mi reporte TKT-1001?").await;
    assert_eq!(second.answer, "Tu ticket TKT-1001 está en proceso.");
    assert!(second.new_messages[2].content.contains("Estado: En proceso"));
    assert!(second.new_messages[2].content.contains("Calle 5 # 20-10, Tuluá"));

    // The second turn's first engine call carried the whole first turn.
    let request = &engine.requests()[2];
    assert_eq!(request.messages.len(), 1 + first.new_messages.len() + 1);
}

#[tokio::test]
async fn e2e_invalid_tool_arguments_keep_the_conversation_going() {
    let engine = Arc::new(SequentialMockProvider::tool_then_answer(
        vec![make_tool_call(
            "estimate_solar_installation",
            serde_json::json!({"monthly_consumption_kwh": 0, "city": "Cali"}),
        )],
        "",
        "El consumo debe estar entre 1 y 5000 kWh. ¿Cuál es tu consumo mensual?",
    ));
    let service = service_with(engine, None).await;

    let outcome = service.turn(&SessionId::from("solar"), "Quiero paneles solares").await;
    assert_eq!(outcome.status, TurnStatus::Done);
    let tool_result = &outcome.new_messages[2];
    assert!(tool_result.content.starts_with("Error: invalid arguments for 'estimate_solar_installation'"));
    assert!(outcome.answer.contains("¿Cuál es tu consumo mensual?"));
}

// ── E2E: knowledge tool ─────────────────────────────────────────────────

#[tokio::test]
async fn e2e_knowledge_question_answers_from_ingested_corpus() {
    let dir = tempfile::tempdir().unwrap();
    let corpus = write_corpus(dir.path());

    let engine = Arc::new(SequentialMockProvider::new(vec![
        make_tool_call_response(
            vec![make_tool_call(
                "search_knowledge_base",
                serde_json::json!({"query": "¿Cuándo se ajustan las tarifas de energía?"}),
            )],
            "",
        ),
        make_text_response("Las tarifas se ajustarán en noviembre."),
        make_text_response("Según Celsia, las tarifas de energía se ajustarán en noviembre."),
    ]));
    let service = service_with(engine.clone(), Some(&corpus)).await;

    let outcome = service
        .turn(&SessionId::from("tarifas"), "¿Cuándo suben las tarifas de energía?")
        .await;
    assert_eq!(outcome.answer, "Según Celsia, las tarifas de energía se ajustarán en noviembre.");
    assert_eq!(outcome.new_messages[2].content, "Las tarifas se ajustarán en noviembre.");

    // The knowledge tool's own engine call: one grounded prompt, no tools.
    let knowledge_request = &engine.requests()[1];
    assert!(knowledge_request.tools.is_empty());
    assert_eq!(knowledge_request.messages.len(), 1);
    let prompt = &knowledge_request.messages[0].content;
    assert!(prompt.contains("se ajustarán en noviembre según la regulación"));
    assert!(prompt.contains("Pregunta: ¿Cuándo se ajustan las tarifas de energía?"));
}

#[tokio::test]
async fn e2e_knowledge_question_on_empty_corpus_returns_fixed_fallback() {
    let engine = Arc::new(SequentialMockProvider::tool_then_answer(
        vec![make_tool_call(
            "search_knowledge_base",
            serde_json::json!({"query": "¿Qué es la energía solar?"}),
        )],
        "",
        FALLBACK_ANSWER,
    ));
    let service = service_with(engine.clone(), None).await;

    let outcome = service.turn(&SessionId::from("vacio"), "¿Qué es la energía solar?").await;
    assert_eq!(outcome.new_messages[2].content, FALLBACK_ANSWER);
    // Decision and final answer only: the empty corpus never reached the engine.
    assert_eq!(engine.call_count(), 2);
}

// ── E2E: termination and isolation ──────────────────────────────────────

#[tokio::test]
async fn e2e_endless_tool_requests_stop_at_the_iteration_cap() {
    let engine = Arc::new(SequentialMockProvider::repeating(make_tool_call_response(
        vec![make_tool_call("buscar_en_internet", serde_json::json!({"q": "celsia"}))],
        "",
    )));
    let service = service_with(engine.clone(), None).await;

    let outcome = service.turn(&SessionId::from("bucle"), "Busca en internet").await;
    assert!(matches!(outcome.status, TurnStatus::Failed(_)));
    assert_eq!(outcome.iterations, 10);
    assert_eq!(engine.call_count(), 10);
    assert!(outcome.answer.starts_with("Lo siento"));
}

#[tokio::test]
async fn e2e_concurrent_sessions_stay_isolated() {
    let engine = Arc::new(SequentialMockProvider::repeating(make_text_response("¡Hola!")));
    let service = Arc::new(service_with(engine, None).await);

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let service = Arc::clone(&service);
            tokio::spawn(async move {
                let id = SessionId::from(format!("s{i}"));
                service.chat(&id, &format!("mensaje {i}")).await;
                service.chat(&id, "otra pregunta").await;
            })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(service.sessions().len(), 8);
    for i in 0..8 {
        let session = service.sessions().snapshot(&SessionId::from(format!("s{i}"))).await.unwrap();
        assert_eq!(session.len(), 4);
        assert_eq!(session.messages[0].content, format!("mensaje {i}"));
    }
}

// ── E2E: HTTP ───────────────────────────────────────────────────────────

#[tokio::test]
async fn e2e_http_chat_phone_question() {
    let engine = Arc::new(SequentialMockProvider::tool_then_answer(
        vec![make_tool_call("get_phone", serde_json::json!({}))],
        "",
        "Llámanos al 01 8000 112 115.",
    ));
    let state = Arc::new(celsia_gateway::GatewayState::ready(service_with(engine, None).await));
    let app = celsia_gateway::build_router(state);

    let request = Request::builder()
        .method("POST")
        .uri("/chat")
        .header("content-type", "application/json")
        .body(Body::from(
            r#"{"user_message": "¿Cuál es el teléfono?", "session_id": "web-1"}"#,
        ))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["response"], "Llámanos al 01 8000 112 115.");
}
