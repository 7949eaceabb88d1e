// HTTP/WebSocket server for connected clients

pub mod messages;
mod ws;

pub use messages::{ClientMessage, ServerMessage};
pub use ws::client_ws;

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::tools::executor::ToolExecutor;

/// Configuration for the HTTP server
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (e.g., "127.0.0.1:12393")
    pub bind_address: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:12393".to_string(),
        }
    }
}

/// Per-client bookkeeping entry.
#[derive(Debug, Clone)]
pub struct ClientHandle {
    pub connected_at: DateTime<Utc>,
}

impl ClientHandle {
    pub fn new() -> Self {
        Self {
            connected_at: Utc::now(),
        }
    }
}

impl Default for ClientHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub executor: Arc<ToolExecutor>,
    pub clients: Arc<DashMap<Uuid, ClientHandle>>,
}

impl AppState {
    pub fn new(executor: Arc<ToolExecutor>) -> Self {
        Self {
            executor,
            clients: Arc::new(DashMap::new()),
        }
    }
}

/// Build the application router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/client-ws", get(client_ws))
        .route("/health", get(health_check))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health_check(
    axum::extract::State(state): axum::extract::State<AppState>,
) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "active_clients": state.clients.len(),
        "tools": state.executor.manager().len(),
    }))
}

/// Bind and serve until the task is cancelled.
pub async fn serve(config: &ServerConfig, state: AppState) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(&config.bind_address)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_address))?;

    tracing::info!("Server listening on {}", config.bind_address);

    axum::serve(listener, create_router(state))
        .await
        .context("server error")?;
    Ok(())
}
