//! WebSocket Connection Handlers
//!
//! Upgrade endpoints for the three socket flavours. The upgrade is accepted
//! before credentials are checked so that a failed login is reported with a
//! policy-violation close instead of an HTTP status the browser cannot read.

use std::sync::Arc;

use axum::{
    extract::{ws::WebSocket, Path, State, WebSocketUpgrade},
    http::HeaderMap,
    response::Response,
};

use super::managers::{NotificationsManager, PrivateManager, PublicManager};
use super::session::{MessagingManager, SessionKind};
use super::transport::Transport;
use crate::startup::AppState;

/// `GET /api/chats/users/{target_id}`: private messaging with one user.
pub async fn private_chat_ws(
    ws: WebSocketUpgrade,
    Path(target_id): Path<i64>,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Response {
    upgrade(ws, &state).on_upgrade(move |socket| async move {
        let ctx = state.messaging.clone();
        handle_socket(socket, state, headers, SessionKind::Private, |user_id| {
            PrivateManager::new(ctx, user_id, target_id)
        })
        .await
    })
}

/// `GET /api/chats/{chat_id}/ws`: messaging inside a public chat.
pub async fn public_chat_ws(
    ws: WebSocketUpgrade,
    Path(chat_id): Path<i64>,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Response {
    upgrade(ws, &state).on_upgrade(move |socket| async move {
        let ctx = state.messaging.clone();
        handle_socket(socket, state, headers, SessionKind::Public, |user_id| {
            PublicManager::new(ctx, user_id, chat_id)
        })
        .await
    })
}

/// `GET /api/chats/notifications`: receive-only notification feed.
pub async fn notifications_ws(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Response {
    upgrade(ws, &state).on_upgrade(move |socket| async move {
        let ctx = state.messaging.clone();
        handle_socket(socket, state, headers, SessionKind::Notifications, |user_id| {
            NotificationsManager::new(ctx, user_id)
        })
        .await
    })
}

fn upgrade(ws: WebSocketUpgrade, state: &AppState) -> WebSocketUpgrade {
    let limits = &state.settings.websocket;
    ws.max_message_size(limits.max_message_size)
        .max_frame_size(limits.max_frame_size)
}

async fn handle_socket<M, F>(
    socket: WebSocket,
    state: AppState,
    headers: HeaderMap,
    kind: SessionKind,
    manager: F,
) where
    M: MessagingManager,
    F: FnOnce(i64) -> M,
{
    serve_transport(Transport::from_socket(socket), state, headers, kind, manager).await
}

/// Authenticate an upgraded connection and hand it to the session runner.
///
/// `manager` builds the session behaviour once the user id is known.
pub async fn serve_transport<M, F>(
    transport: Transport,
    state: AppState,
    headers: HeaderMap,
    kind: SessionKind,
    manager: F,
) where
    M: MessagingManager,
    F: FnOnce(i64) -> M,
{
    match state.auth.authenticate(&headers) {
        Ok(user_id) => {
            tracing::debug!(user_id, kind = kind.as_str(), "WebSocket connection authenticated");
            state.sessions.run(Arc::new(manager(user_id)), transport).await;
        }
        Err(e) => {
            tracing::debug!(kind = kind.as_str(), error = %e, "WebSocket authentication failed");
            state.sessions.reject_unauthenticated(kind, transport).await;
        }
    }
}
