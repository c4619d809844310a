//! HTTP server setup.
//!
//! # Responsibilities
//! - Create the Axum router with the status and WebSocket handlers
//! - Wire up middleware (request timeout, request id, tracing)
//! - Serve on a bound listener until the shutdown broadcast fires

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::agent::Orchestrator;
use crate::http::connections::ConnectionManager;
use crate::http::websocket::ws_handler;
use crate::resilience::{BreakerRegistry, BreakerStatus};

/// Application state injected into handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    pub breakers: Arc<BreakerRegistry>,
    pub orchestrator: Arc<Orchestrator>,
    pub connections: ConnectionManager,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    /// Unix seconds.
    pub timestamp: u64,
    pub services: BTreeMap<String, String>,
}

pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    pub fn new(state: AppState, request_timeout: Duration) -> Self {
        Self {
            router: Self::build_router(state, request_timeout),
        }
    }

    #[allow(deprecated)]
    fn build_router(state: AppState, request_timeout: Duration) -> Router {
        Router::new()
            .route("/health", get(health))
            .route("/breakers", get(list_breakers))
            .route("/breakers/{name}", get(get_breaker))
            .route("/ws/{connection_id}", get(ws_handler))
            .with_state(state)
            .layer(TimeoutLayer::new(request_timeout))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// The configured router, for serving in-process.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serve until a value arrives on `shutdown` (or its sender is dropped).
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("HTTP server draining connections");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let mut services = BTreeMap::new();
    services.insert(
        "websocket".to_string(),
        format!("{} connections", state.connections.len()),
    );
    services.insert(
        "agent".to_string(),
        format!("ready ({})", state.orchestrator.model_name()),
    );
    for status in state.breakers.statuses() {
        services.insert(format!("breaker:{}", status.name), status.state.to_string());
    }

    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs(),
        services,
    })
}

async fn list_breakers(State(state): State<AppState>) -> Json<Vec<BreakerStatus>> {
    Json(state.breakers.statuses())
}

async fn get_breaker(State(state): State<AppState>, Path(name): Path<String>) -> Response {
    match state.breakers.status(&name) {
        Some(status) => Json(status).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "error": format!("unknown breaker '{name}'") })),
        )
            .into_response(),
    }
}
