//! Route Configuration
//!
//! Configures all HTTP and WebSocket routes.

use axum::{
    middleware,
    response::IntoResponse,
    routing::{get, patch, post},
    Router,
};

use super::handlers;
use crate::infrastructure::metrics;
use crate::presentation::middleware::track_metrics;
use crate::presentation::websocket::{notifications_ws, private_chat_ws, public_chat_ws};
use crate::startup::AppState;

/// Create the main router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .nest("/api", api_routes())
        // Health check endpoints
        .route("/health", get(handlers::health::health_check))
        .route("/health/live", get(handlers::health::liveness))
        .route("/health/ready", get(handlers::health::readiness))
        // Prometheus metrics endpoint
        .route("/metrics", get(metrics_handler))
        .route_layer(middleware::from_fn(track_metrics))
        .with_state(state)
}

/// Prometheus metrics endpoint handler
async fn metrics_handler() -> impl IntoResponse {
    let metrics = metrics::gather_metrics();
    (
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        metrics,
    )
}

/// API routes
fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/chats", chat_routes())
        .route("/users/me/chats", get(handlers::chat::my_chats))
}

/// Chat routes. REST handlers authenticate with the `AuthUser` extractor;
/// socket handlers authenticate after the upgrade.
fn chat_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::chat::search_chats).post(handlers::chat::create_chat),
        )
        // WebSocket endpoints
        .route("/notifications", get(notifications_ws))
        .route("/users/{target_id}", get(private_chat_ws))
        .route("/{chat_id}/ws", get(public_chat_ws))
        // Private chat history
        .route("/users/{target_id}/messages", get(handlers::chat::private_messages))
        // Chat administration
        .route(
            "/{chat_id}",
            get(handlers::chat::get_chat)
                .put(handlers::chat::update_chat)
                .delete(handlers::chat::delete_chat),
        )
        .route("/{chat_id}/invite", get(handlers::chat::create_invite))
        .route(
            "/{chat_id}/members",
            get(handlers::chat::list_members).post(handlers::chat::enroll),
        )
        .route(
            "/{chat_id}/members/{target_id}",
            patch(handlers::chat::update_member).delete(handlers::chat::remove_member),
        )
        .route("/{chat_id}/owner", post(handlers::chat::transfer_ownership))
        .route("/{chat_id}/messages", get(handlers::chat::chat_messages))
}

