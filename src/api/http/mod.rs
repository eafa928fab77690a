// src/api/http/mod.rs

pub mod auth;
pub mod chatrooms;
pub mod health;

use axum::http::HeaderValue;
use axum::routing::get;
use axum::Router;
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::metrics::{metrics_handler, track_request_metrics};
use crate::state::AppState;
use crate::ws::ws_chat_handler;

/// Composes the full axum router: the socket upgrade endpoint plus the
/// HTTP glue (auth, chatroom CRUD, message history, health, metrics). The
/// CORS layer mirrors the same allowed-origins policy the socket upgrade
/// handler enforces.
pub fn create_router(state: AppState) -> Router {
    let allowed = state.config.cors.allowed_origins.clone();
    let cors = CorsLayer::new()
        .allow_methods(tower_http::cors::Any)
        .allow_headers(tower_http::cors::Any)
        .allow_origin(AllowOrigin::predicate(move |origin: &HeaderValue, _| {
            let Ok(origin) = origin.to_str() else {
                return false;
            };
            allowed.iter().any(|allowed| allowed == "*" || allowed == origin)
        }));

    Router::new()
        .route("/ws/chat/{chatroom_id}", get(ws_chat_handler))
        .nest("/api/v1/auth", auth::router())
        .nest("/api/v1/chatrooms", chatrooms::router())
        .route("/health", get(health::health_check))
        .route("/health/ready", get(health::readiness_check))
        .route("/metrics", get(metrics_handler))
        .layer(axum::middleware::from_fn(track_request_metrics))
        .layer(cors)
        .with_state(state)
}
