//! `RelayServer` — Axum HTTP + WebSocket server.

use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::extract::{State, WebSocketUpgrade};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use banter_core::{ChatMessage, ChatStore, ids};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::config::ServerConfig;
use crate::health::{self, HealthResponse};
use crate::shutdown::ShutdownCoordinator;
use crate::websocket::dispatcher::RelayContext;
use crate::websocket::presence::PresenceDirectory;
use crate::websocket::registry::ConnectionRegistry;
use crate::websocket::session::run_ws_session;

/// Shared state accessible from Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Connection registry and broadcast fan-out.
    pub registry: Arc<ConnectionRegistry>,
    /// The roster of joined users.
    pub presence: Arc<PresenceDirectory>,
    /// Persistence gateway.
    pub store: Arc<dyn ChatStore>,
    /// Shutdown coordinator.
    pub shutdown: Arc<ShutdownCoordinator>,
    /// When the server started.
    pub start_time: Instant,
    /// Server configuration.
    pub config: ServerConfig,
}

impl AppState {
    /// The relay context handed to each session.
    fn relay_context(&self) -> RelayContext {
        RelayContext {
            registry: self.registry.clone(),
            presence: self.presence.clone(),
            store: self.store.clone(),
            history_limit: self.config.history_limit,
        }
    }
}

/// The relay server.
pub struct RelayServer {
    state: AppState,
}

impl RelayServer {
    /// Create a new server around an explicitly owned registry and store.
    pub fn new(config: ServerConfig, store: Arc<dyn ChatStore>) -> Self {
        Self {
            state: AppState {
                registry: Arc::new(ConnectionRegistry::new()),
                presence: Arc::new(PresenceDirectory::new()),
                store,
                shutdown: Arc::new(ShutdownCoordinator::new()),
                start_time: Instant::now(),
                config,
            },
        }
    }

    /// Build the Axum router with all routes.
    pub fn router(&self) -> Router {
        Router::new()
            .route("/health", get(health_handler))
            .route("/messages", get(messages_handler))
            .route("/ws", get(ws_handler))
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive())
            .with_state(self.state.clone())
    }

    /// Get the connection registry.
    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.state.registry
    }

    /// Get the presence directory.
    pub fn presence(&self) -> &Arc<PresenceDirectory> {
        &self.state.presence
    }

    /// Get the shutdown coordinator.
    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.state.shutdown
    }

    /// Get the server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.state.config
    }
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let connections = state.registry.connection_count().await;
    let online = state.presence.len();
    Json(health::health_check(state.start_time, connections, online))
}

/// GET /messages — recent history, oldest first.
async fn messages_handler(State(state): State<AppState>) -> Json<Vec<ChatMessage>> {
    let messages = match state.store.recent_messages(state.config.history_limit) {
        Ok(messages) => messages,
        Err(e) => {
            warn!(error = %e, "failed to load messages for HTTP query");
            Vec::new()
        }
    };
    Json(messages)
}

/// GET /ws — WebSocket upgrade into a relay session.
async fn ws_handler(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    if state.registry.connection_count().await >= state.config.max_connections {
        warn!(
            limit = state.config.max_connections,
            "connection limit reached, rejecting upgrade"
        );
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }

    let ctx = state.relay_context();
    let config = state.config.clone();
    let cancel = state.shutdown.token();
    ws.max_message_size(state.config.max_message_size)
        .on_upgrade(move |socket| async move {
            run_ws_session(socket, ids::connection_id(), ctx, &config, cancel).await;
        })
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use banter_store::SqliteChatStore;
    use tower::ServiceExt;

    fn make_server() -> RelayServer {
        let store: Arc<dyn ChatStore> = Arc::new(SqliteChatStore::in_memory().unwrap());
        RelayServer::new(ServerConfig::default(), store)
    }

    async fn get_json(server: &RelayServer, uri: &str) -> (StatusCode, serde_json::Value) {
        let app = server.router();
        let req = Request::builder().uri(uri).body(Body::empty()).unwrap();
        let resp = app.oneshot(req).await.unwrap();
        let status = resp.status();
        let body = axum::body::to_bytes(resp.into_body(), 100_000).await.unwrap();
        let value = if body.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&body).unwrap()
        };
        (status, value)
    }

    #[tokio::test]
    async fn health_endpoint_reports_counters() {
        let server = make_server();
        let (status, body) = get_json(&server, "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["connections"], 0);
        assert_eq!(body["online_users"], 0);
        assert!(body["uptime_secs"].is_number());
    }

    #[tokio::test]
    async fn messages_endpoint_returns_history() {
        let server = make_server();
        server
            .state
            .store
            .save_message("m1", "alice", "hello", false)
            .unwrap();

        let (status, body) = get_json(&server, "/messages").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 1);
        assert_eq!(body[0]["id"], "m1");
        assert_eq!(body[0]["senderUsername"], "alice");
    }

    #[tokio::test]
    async fn messages_endpoint_empty_history() {
        let server = make_server();
        let (status, body) = get_json(&server, "/messages").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, serde_json::json!([]));
    }

    #[tokio::test]
    async fn unknown_route_returns_404() {
        let server = make_server();
        let (status, _) = get_json(&server, "/nonexistent").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn ws_route_requires_upgrade_headers() {
        let server = make_server();
        let app = server.router();
        let req = Request::builder().uri("/ws").body(Body::empty()).unwrap();
        let resp = app.oneshot(req).await.unwrap();
        // A plain GET without the upgrade handshake is rejected by the
        // extractor rather than reaching the session.
        assert_ne!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn server_exposes_components() {
        let server = make_server();
        assert_eq!(server.registry().connection_count().await, 0);
        assert!(server.presence().is_empty());
        assert!(!server.shutdown().is_shutting_down());
        assert_eq!(server.config().history_limit, 50);
    }

    #[tokio::test]
    async fn custom_config_is_kept() {
        let store: Arc<dyn ChatStore> = Arc::new(SqliteChatStore::in_memory().unwrap());
        let config = ServerConfig {
            host: "0.0.0.0".into(),
            port: 9090,
            max_connections: 10,
            ..ServerConfig::default()
        };
        let server = RelayServer::new(config, store);
        assert_eq!(server.config().host, "0.0.0.0");
        assert_eq!(server.config().port, 9090);
        assert_eq!(server.config().max_connections, 10);
    }
}
