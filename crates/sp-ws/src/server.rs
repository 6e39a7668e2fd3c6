//! WebSocket server
//!
//! Axum-based server exposing the `/ws` event channel and a `/health`
//! endpoint reporting the number of live browser sessions.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{Json, Router, extract::State, routing::get};
use serde_json::{Value, json};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing::info;

use sp_browser::SessionRegistry;
use sp_core::{Assistant, Config};

use crate::Result;
use crate::handler::websocket_handler;
use crate::message::now;

/// Shared WebSocket server state
pub struct WsState {
    /// Browser session registry
    pub registry: Arc<SessionRegistry>,
    /// Assistant shared by all connections
    pub assistant: Arc<Assistant>,
    /// Server configuration
    pub config: Config,
}

/// Build the router for the gateway endpoints.
pub fn router(state: Arc<WsState>) -> Router {
    let cors = match &state.config.server.allowed_origins {
        Some(origins) if !origins.is_empty() => {
            let origins: Vec<axum::http::HeaderValue> = origins
                .iter()
                .filter_map(|origin| origin.parse().ok())
                .collect();
            CorsLayer::new()
                .allow_origin(AllowOrigin::list(origins))
                .allow_methods(Any)
                .allow_headers(Any)
        }
        _ => CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any),
    };

    Router::new()
        .route("/ws", get(websocket_handler))
        .route("/health", get(health))
        .layer(cors)
        .with_state(state)
}

/// Start the WebSocket server and serve until the task is aborted.
pub async fn start_ws_server(state: Arc<WsState>) -> Result<()> {
    let port = state.config.server.port;
    let app = router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("WebSocket server listening on {}", addr);
    info!("WebSocket endpoint: ws://localhost:{}/ws", port);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn health(State(state): State<Arc<WsState>>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "activeSessions": state.registry.len(),
        "timestamp": now(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use sp_browser::{BrowserConfig, testing::MockLauncher};

    fn test_state() -> Arc<WsState> {
        Arc::new(WsState {
            registry: Arc::new(SessionRegistry::new(
                Arc::new(MockLauncher::new()),
                BrowserConfig::default(),
            )),
            assistant: Arc::new(Assistant::offline()),
            config: Config::default(),
        })
    }

    #[tokio::test]
    async fn test_health_reports_session_count() {
        let state = test_state();
        state.registry.create("s1").await.unwrap();
        state.registry.create("s2").await.unwrap();

        let Json(body) = health(State(Arc::clone(&state))).await;
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["activeSessions"], 2);
    }

    #[tokio::test]
    async fn test_router_builds_with_origin_list() {
        let mut config = Config::default();
        config.server.allowed_origins = Some(vec!["http://localhost:3000".to_string()]);
        let state = Arc::new(WsState {
            registry: Arc::new(SessionRegistry::new(
                Arc::new(MockLauncher::new()),
                BrowserConfig::default(),
            )),
            assistant: Arc::new(Assistant::offline()),
            config,
        });
        let _router = router(state);
    }
}
