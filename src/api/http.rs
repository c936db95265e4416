//! HTTP API Server
//!
//! REST boundary over the node's local operations: triggering elections,
//! requesting and releasing the critical section, logging multicast
//! messages, and status queries.

use std::sync::Arc;

use axum::{
    extract::{Json, State},
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::json;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::ApiConfig;
use crate::error::{Error, Result};
use crate::node::Node;

/// Shared application state
pub struct AppState {
    /// The hosted node
    pub node: Arc<Node>,
    /// Process start time
    pub started_at: chrono::DateTime<chrono::Utc>,
}

/// HTTP API server
pub struct HttpServer {
    config: ApiConfig,
    state: Arc<AppState>,
}

impl HttpServer {
    /// Create a new HTTP server
    pub fn new(config: ApiConfig, node: Arc<Node>) -> Self {
        let state = Arc::new(AppState {
            node,
            started_at: chrono::Utc::now(),
        });

        Self { config, state }
    }

    /// Create the router
    fn create_router(state: Arc<AppState>) -> Router {
        Router::new()
            // Election
            .route("/election/start", post(handle_election_start))
            .route("/election/status", get(handle_election_status))
            // Mutex
            .route("/mutex/request", post(handle_mutex_request))
            .route("/mutex/release", post(handle_mutex_release))
            .route("/mutex/status", get(handle_mutex_status))
            // Multicast placeholder
            .route("/multicast/send", post(handle_multicast_send))
            .route("/multicast/observe", post(handle_multicast_observe))
            .route("/multicast/log", get(handle_multicast_log))
            .route("/multicast/status", get(handle_multicast_status))
            // Status and info
            .route("/status", get(handle_status))
            .route("/health", get(handle_health))
            .route("/", get(handle_root))
            .with_state(state)
    }

    /// Start the HTTP server
    pub async fn start(&self) -> Result<()> {
        if !self.config.enabled {
            tracing::info!("HTTP API disabled");
            return Ok(());
        }

        let mut app = Self::create_router(Arc::clone(&self.state));
        if self.config.cors_enabled {
            app = app.layer(CorsLayer::permissive());
        }
        let app = app.layer(TraceLayer::new_for_http());

        let listener = tokio::net::TcpListener::bind(&self.config.bind_address).await?;
        tracing::info!("HTTP API listening on {}", self.config.bind_address);

        axum::serve(listener, app)
            .await
            .map_err(|e| Error::Network(format!("HTTP server error: {}", e)))?;

        Ok(())
    }
}

// ============ Request bodies ============

#[derive(Deserialize)]
struct SendRequest {
    content: String,
}

#[derive(Deserialize)]
struct ObserveRequest {
    timestamp: u64,
}

// ============ Handlers ============

async fn handle_election_start(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    state.node.election().start_election().await;
    Json(json!({
        "success": true,
        "status": state.node.election().status().await,
    }))
}

async fn handle_election_status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.node.election().status().await)
}

async fn handle_mutex_request(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    state.node.mutex().request_access().await;
    Json(json!({
        "success": true,
        "status": state.node.mutex().status().await,
    }))
}

async fn handle_mutex_release(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    state.node.mutex().release_access().await;
    Json(json!({
        "success": true,
        "status": state.node.mutex().status().await,
    }))
}

async fn handle_mutex_status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.node.mutex().status().await)
}

async fn handle_multicast_send(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SendRequest>,
) -> impl IntoResponse {
    let record = state.node.multicast().record(request.content).await;
    Json(json!({
        "success": true,
        "message": record,
    }))
}

async fn handle_multicast_observe(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ObserveRequest>,
) -> impl IntoResponse {
    let logical_clock = state.node.multicast().observe(request.timestamp).await;
    Json(json!({
        "success": true,
        "logical_clock": logical_clock,
    }))
}

async fn handle_multicast_log(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.node.multicast().records().await)
}

async fn handle_multicast_status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.node.multicast().status().await)
}

async fn handle_status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.node.status().await)
}

async fn handle_health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "rank": state.node.identity().rank(),
        "uptime_secs": (chrono::Utc::now() - state.started_at).num_seconds(),
    }))
}

async fn handle_root(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(json!({
        "service": "ringleader",
        "rank": state.node.identity().rank(),
        "cluster_size": state.node.identity().cluster_size(),
        "endpoints": {
            "election": ["/election/start", "/election/status"],
            "mutex": ["/mutex/request", "/mutex/release", "/mutex/status"],
            "multicast": [
                "/multicast/send",
                "/multicast/observe",
                "/multicast/log",
                "/multicast/status",
            ],
            "node": ["/status", "/health"],
        },
    }))
}
