//! HTTP API for the Celsia assistant.
//!
//! - `GET /health`: whether the agent finished loading
//! - `POST /chat`: one user message in, one answer out
//!
//! The chat service is built in the background after the listener is up,
//! so `/health` answers 503 until it is ready. Built on Axum.

use axum::extract::DefaultBodyLimit;
use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
};
use celsia_agent::ChatService;
use celsia_core::message::SessionId;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;
use tracing::{error, info};

const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Shared application state for the gateway.
#[derive(Default)]
pub struct GatewayState {
    service: RwLock<Option<Arc<ChatService>>>,
}

impl GatewayState {
    /// State with no agent yet; `/chat` answers 503 until [`install`](Self::install).
    pub fn new() -> Self {
        Self::default()
    }

    /// State with the agent already loaded.
    pub fn ready(service: ChatService) -> Self {
        Self {
            service: RwLock::new(Some(Arc::new(service))),
        }
    }

    pub async fn install(&self, service: ChatService) {
        *self.service.write().await = Some(Arc::new(service));
    }

    async fn service(&self) -> Option<Arc<ChatService>> {
        self.service.read().await.clone()
    }
}

type SharedState = Arc<GatewayState>;

/// Build the Axum router with all gateway routes.
///
/// Layers: permissive CORS, 1 MiB body limit, HTTP trace logging.
pub fn build_router(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/chat", post(chat_handler))
        .with_state(state)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(CorsLayer::permissive())
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

/// Start the gateway HTTP server.
///
/// Binds first, then builds the chat service in a background task.
pub async fn start(config: celsia_config::AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);
    let state: SharedState = Arc::new(GatewayState::new());

    let loader = Arc::clone(&state);
    tokio::spawn(async move {
        match celsia_agent::build_chat_service(&config).await {
            Ok(service) => {
                loader.install(service).await;
                info!("Agent loaded");
            }
            Err(e) => error!(error = %format!("{e:#}"), "Failed to initialize the agent"),
        }
    });

    let app = build_router(state);
    info!(addr = %addr, "Gateway starting");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// --- Handlers ---

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    message: &'static str,
}

#[derive(Serialize)]
struct ErrorResponse {
    detail: &'static str,
}

fn error_response(status: StatusCode, detail: &'static str) -> Response {
    (status, Json(ErrorResponse { detail })).into_response()
}

async fn health_handler(State(state): State<SharedState>) -> Response {
    match state.service().await {
        Some(_) => Json(HealthResponse {
            status: "ok",
            message: "Agent loaded.",
        })
        .into_response(),
        None => error_response(StatusCode::SERVICE_UNAVAILABLE, "Agent not loaded yet."),
    }
}

#[derive(Deserialize)]
struct ChatRequest {
    user_message: String,
    session_id: String,
}

#[derive(Serialize)]
struct ChatResponse {
    response: String,
}

async fn chat_handler(State(state): State<SharedState>, Json(payload): Json<ChatRequest>) -> Response {
    let Some(service) = state.service().await else {
        return error_response(StatusCode::SERVICE_UNAVAILABLE, "Agent not initialized.");
    };

    info!(
        session_id = %payload.session_id,
        message_len = payload.user_message.len(),
        "Chat message received"
    );

    // Run the turn in its own task so a panic becomes a 500, not a dropped connection.
    let session_id = SessionId::from(payload.session_id);
    let turn = tokio::spawn(async move { service.chat(&session_id, &payload.user_message).await });

    match turn.await {
        Ok(response) => Json(ChatResponse { response }).into_response(),
        Err(e) => {
            error!(error = %e, "Chat turn aborted");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error during chat processing.",
            )
        }
    }
}
