// SPDX-FileCopyrightText: 2026 Wagate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gateway HTTP server built on axum.
//!
//! Sets up routes, middleware, and shared state for the gateway.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Router, middleware as axum_middleware,
    routing::{delete, get, post},
};
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;

use wagate_core::GateError;
use wagate_core::traits::CredentialVerifier;
use wagate_jobs::JobQueue;
use wagate_session::{LoginRateLimiter, SessionManager};

use crate::auth::{TokenService, auth_middleware};
use crate::handlers;
use crate::ws;

/// Shared state for axum request handlers.
#[derive(Clone)]
pub struct GatewayState {
    pub manager: SessionManager,
    pub queue: JobQueue,
    pub limiter: Arc<LoginRateLimiter>,
    pub verifier: Arc<dyn CredentialVerifier>,
    pub tokens: TokenService,
    /// Process start time for uptime reporting.
    pub start_time: std::time::Instant,
}

/// Gateway server configuration (mirrors GatewayConfig from wagate-config).
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Build the full gateway router.
pub fn build_router(state: GatewayState) -> Router {
    // Unauthenticated: health for probes, login because it issues the tokens.
    let public_routes = Router::new()
        .route("/health", get(handlers::get_health))
        .route("/v1/login", post(handlers::login))
        .with_state(state.clone());

    let api_routes = Router::new()
        .route(
            "/v1/sessions",
            post(handlers::create_session).get(handlers::list_sessions),
        )
        .route(
            "/v1/sessions/{id}",
            get(handlers::get_session).delete(handlers::delete_session),
        )
        .route("/v1/sessions/{id}/connect", post(handlers::connect_session))
        .route(
            "/v1/sessions/{id}/disconnect",
            post(handlers::disconnect_session),
        )
        .route("/v1/sessions/{id}/logout", post(handlers::logout_session))
        .route("/v1/sessions/{id}/send/text", post(handlers::send_text))
        .route(
            "/v1/sessions/{id}/send/location",
            post(handlers::send_location),
        )
        .route(
            "/v1/sessions/{id}/send/attachment",
            post(handlers::send_attachment),
        )
        .route(
            "/v1/jobs",
            post(handlers::enqueue_job)
                .get(handlers::list_jobs)
                .delete(handlers::cleanup_jobs),
        )
        .route("/v1/jobs/{id}", get(handlers::get_job))
        .route("/v1/jobs/{id}/cancel", post(handlers::cancel_job))
        .route("/v1/jobs/{id}/retry", post(handlers::retry_job))
        .route_layer(axum_middleware::from_fn_with_state(
            state.tokens.clone(),
            auth_middleware,
        ))
        .with_state(state.clone());

    // WebSocket auth happens during the handshake, not via middleware.
    let ws_routes = Router::new()
        .route("/ws/{session_id}", get(ws::pairing_ws))
        .with_state(state);

    Router::new()
        .merge(public_routes)
        .merge(api_routes)
        .merge(ws_routes)
        .layer(CorsLayer::permissive())
}

/// Start the gateway HTTP/WebSocket server; runs until `shutdown` fires.
pub async fn start_server(
    config: &ServerConfig,
    state: GatewayState,
    shutdown: CancellationToken,
) -> Result<(), GateError> {
    let app = build_router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| GateError::Internal(format!("failed to bind gateway to {addr}: {e}")))?;

    tracing::info!("gateway listening on {addr}");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown.cancelled_owned())
    .await
    .map_err(|e| GateError::Internal(format!("gateway server error: {e}")))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use tempfile::tempdir;
    use wagate_core::types::{Identity, Role};
    use wagate_storage::Database;
    use wagate_test_utils::MockClientFactory;

    struct DenyAll;

    #[async_trait]
    impl CredentialVerifier for DenyAll {
        async fn verify(&self, _username: &str, _password: &str) -> Result<Identity, GateError> {
            Err(GateError::Forbidden)
        }
    }

    #[tokio::test]
    async fn router_builds_with_full_state() {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("test.db").to_str().unwrap())
            .await
            .unwrap();
        let manager = SessionManager::new(db.clone(), Arc::new(MockClientFactory::new()));
        let state = GatewayState {
            manager,
            queue: JobQueue::new(db, 3),
            limiter: Arc::new(LoginRateLimiter::new()),
            verifier: Arc::new(DenyAll),
            tokens: TokenService::new(Some("secret".into()), 3600),
            start_time: std::time::Instant::now(),
        };
        let _router = build_router(state);
    }

    #[test]
    fn server_config_debug() {
        let config = ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 3000,
        };
        assert!(format!("{config:?}").contains("127.0.0.1"));
    }

    #[tokio::test]
    async fn issued_tokens_authenticate_as_the_user() {
        let tokens = TokenService::new(Some("secret".into()), 3600);
        let (token, _) = tokens.issue("alice", Role::Admin).unwrap();
        let identity = tokens.verify(&token).unwrap();
        assert!(identity.is_admin());
    }
}
