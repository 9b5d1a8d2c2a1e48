//! HTTP transport: JSON-RPC over `POST /mcp`.

use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::server::{McpServer, SERVER_NAME};

pub fn create_router(server: Arc<McpServer>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT]);

    Router::new()
        .route("/health", get(health))
        .route("/mcp", post(handle_mcp_request))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(server)
}

async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "service": SERVER_NAME,
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// The raw body is parsed by the server so malformed JSON becomes a
/// JSON-RPC parse error rather than an HTTP rejection.
async fn handle_mcp_request(State(server): State<Arc<McpServer>>, body: String) -> Response {
    match server.handle_line(&body).await {
        Some(response) => Json(response).into_response(),
        None => StatusCode::ACCEPTED.into_response(),
    }
}
