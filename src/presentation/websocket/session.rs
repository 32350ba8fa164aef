//! WebSocket Session Runner
//!
//! Drives one authenticated connection through its lifecycle:
//!
//! ```text
//! authorize -> subscribe -> spawn receive loop + send loop
//!                                |                 |
//!                                +---- first exit -+
//!                                        |
//!                         abort + await the other loop
//!                                        |
//!                              close frame, metrics
//! ```
//!
//! The receive loop turns client frames into persisted messages and
//! publishes. The send loop forwards bus deliveries and pings, and ends the
//! session when a delivery revokes its access. Neither loop outlives the other.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::ws::{close_code, Message};
use futures::StreamExt;
use tokio::time::{interval_at, timeout, Instant};
use uuid::Uuid;

use super::messages::{Envelope, ErrorFrame, FrameError};
use super::transport::{FrameStream, Outbound, Transport};
use crate::domain::services::{Access, Denial};
use crate::domain::Topic;
use crate::infrastructure::bus::{BroadcastBus, Subscription};
use crate::infrastructure::metrics;
use crate::shared::error::AppError;

/// Close reason for connections without valid credentials.
pub const INVALID_CREDENTIALS: &str = "Invalid credentials.";

/// The three socket flavours.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionKind {
    Private,
    Public,
    Notifications,
}

impl SessionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionKind::Private => "private",
            SessionKind::Public => "public",
            SessionKind::Notifications => "notifications",
        }
    }
}

/// Why a session ended other than by a clean client close.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("transport error: {0}")]
    Transport(#[from] axum::Error),

    #[error("no inbound traffic within the idle timeout")]
    Idle,

    #[error("protocol violation: {0}")]
    Protocol(#[from] FrameError),

    #[error("access denied: {0}")]
    Denied(Denial),

    #[error("store failure: {0}")]
    Store(#[from] AppError),

    #[error("bus subscription ended")]
    SubscriptionEnded,

    #[error("session task failed: {0}")]
    Task(String),
}

impl SessionError {
    /// Close code and reason to send, if the connection is still writable.
    fn close_frame(&self) -> Option<(u16, String)> {
        match self {
            SessionError::Transport(_) => None,
            SessionError::Idle => Some((close_code::AWAY, "Idle timeout".into())),
            SessionError::Protocol(_) => Some((close_code::POLICY, "Malformed frame".into())),
            SessionError::Denied(denial) => Some((close_code::POLICY, denial.reason().into())),
            SessionError::Store(_) | SessionError::SubscriptionEnded | SessionError::Task(_) => {
                Some((close_code::ERROR, "Internal error".into()))
            }
        }
    }

    fn label(&self) -> &'static str {
        match self {
            SessionError::Transport(_) => "transport",
            SessionError::Idle => "idle",
            SessionError::Protocol(_) => "protocol",
            SessionError::Denied(_) => "denied",
            SessionError::Store(_) => "store",
            SessionError::SubscriptionEnded => "subscription",
            SessionError::Task(_) => "task",
        }
    }
}

/// Behaviour of one socket flavour, plugged into the session runner.
#[async_trait]
pub trait MessagingManager: Send + Sync + 'static {
    fn kind(&self) -> SessionKind;

    fn user_id(&self) -> i64;

    /// Topic the send loop listens on.
    fn topic(&self) -> Topic;

    /// Connect-time authorization.
    async fn authorize(&self) -> Result<Access, AppError>;

    /// Handle one text frame from the client.
    async fn handle_frame(&self, text: &str) -> Result<(), SessionError>;

    /// Whether a bus delivery is forwarded to this client.
    fn accepts(&self, envelope: &Envelope) -> bool;

    /// Whether a bus delivery ends this session, and why.
    fn revoked_by(&self, _envelope: &Envelope) -> Option<Denial> {
        None
    }
}

/// Runs sessions against a broadcast bus.
#[derive(Clone)]
pub struct SessionRunner {
    bus: Arc<dyn BroadcastBus>,
    heartbeat_interval: Duration,
    idle_timeout: Duration,
}

impl SessionRunner {
    pub fn new(bus: Arc<dyn BroadcastBus>, heartbeat_interval: Duration, idle_timeout: Duration) -> Self {
        Self {
            bus,
            heartbeat_interval,
            idle_timeout,
        }
    }

    /// Close a connection whose credentials could not be verified.
    pub async fn reject_unauthenticated(&self, kind: SessionKind, transport: Transport) {
        let (outbound, _) = transport.split();
        outbound.close(close_code::POLICY, INVALID_CREDENTIALS).await;
        metrics::record_session_close(kind.as_str(), "unauthenticated");
    }

    /// Run a session until either side ends it.
    pub async fn run<M: MessagingManager>(&self, manager: Arc<M>, transport: Transport) {
        let session_id = Uuid::new_v4();
        let kind = manager.kind();
        let user_id = manager.user_id();
        let (outbound, inbound) = transport.split();

        match manager.authorize().await {
            Ok(Access::Granted) => {}
            Ok(Access::Denied(denial)) => {
                tracing::info!(%session_id, user_id, kind = kind.as_str(), reason = %denial, "Session rejected");
                self.finish(kind, &outbound, Err(SessionError::Denied(denial))).await;
                return;
            }
            Err(e) => {
                tracing::error!(%session_id, user_id, error = %e, "Authorization check failed");
                self.finish(kind, &outbound, Err(SessionError::Store(e))).await;
                return;
            }
        }

        let topic = manager.topic();
        let subscription = match self.bus.subscribe(&topic).await {
            Ok(subscription) => subscription,
            Err(e) => {
                tracing::error!(%session_id, user_id, topic = %topic, error = %e, "Subscribe failed");
                self.finish(kind, &outbound, Err(SessionError::SubscriptionEnded)).await;
                return;
            }
        };

        metrics::add_active_session(kind.as_str(), 1);
        tracing::info!(%session_id, user_id, kind = kind.as_str(), topic = %topic, "Session opened");

        let mut receive_task = tokio::spawn(receive_loop(manager.clone(), inbound, self.idle_timeout));
        let mut send_task = tokio::spawn(send_loop(
            manager.clone(),
            subscription,
            outbound.clone(),
            self.heartbeat_interval,
        ));

        let joined = tokio::select! {
            result = &mut receive_task => {
                send_task.abort();
                let _ = send_task.await;
                result
            }
            result = &mut send_task => {
                receive_task.abort();
                let _ = receive_task.await;
                result
            }
        };
        let outcome = joined.unwrap_or_else(|e| Err(SessionError::Task(e.to_string())));

        metrics::add_active_session(kind.as_str(), -1);
        match &outcome {
            Ok(()) => tracing::info!(%session_id, user_id, "Session closed by client"),
            Err(e @ (SessionError::Store(_) | SessionError::SubscriptionEnded | SessionError::Task(_))) => {
                tracing::warn!(%session_id, user_id, error = %e, "Session terminated")
            }
            Err(e) => tracing::info!(%session_id, user_id, reason = %e, "Session ended"),
        }
        self.finish(kind, &outbound, outcome).await;
    }

    async fn finish(&self, kind: SessionKind, outbound: &Outbound, outcome: Result<(), SessionError>) {
        match outcome {
            Ok(()) => {
                outbound.close(close_code::NORMAL, "").await;
                metrics::record_session_close(kind.as_str(), "normal");
            }
            Err(e) => {
                if let SessionError::Protocol(violation) = &e {
                    let frame = ErrorFrame {
                        detail: violation.to_string(),
                    };
                    let _ = outbound.send_json(&frame).await;
                }
                if let Some((code, reason)) = e.close_frame() {
                    outbound.close(code, &reason).await;
                }
                metrics::record_session_close(kind.as_str(), e.label());
            }
        }
    }
}

/// Reads client frames until the client leaves, goes idle, or misbehaves.
async fn receive_loop<M: MessagingManager>(
    manager: Arc<M>,
    mut inbound: FrameStream,
    idle_timeout: Duration,
) -> Result<(), SessionError> {
    loop {
        let next = timeout(idle_timeout, inbound.next())
            .await
            .map_err(|_| SessionError::Idle)?;

        match next {
            None | Some(Ok(Message::Close(_))) => return Ok(()),
            Some(Err(e)) => return Err(SessionError::Transport(e)),
            Some(Ok(Message::Text(text))) => manager.handle_frame(text.as_str()).await?,
            Some(Ok(Message::Binary(_))) => return Err(FrameError::Binary.into()),
            // Pings and pongs only refresh the idle timer.
            Some(Ok(_)) => {}
        }
    }
}

/// Forwards bus deliveries accepted by the manager and keeps the connection alive.
async fn send_loop<M: MessagingManager>(
    manager: Arc<M>,
    mut subscription: Subscription,
    outbound: Outbound,
    heartbeat_interval: Duration,
) -> Result<(), SessionError> {
    let mut heartbeat = interval_at(Instant::now() + heartbeat_interval, heartbeat_interval);

    loop {
        tokio::select! {
            delivery = subscription.next() => {
                let Some(payload) = delivery else {
                    return Err(SessionError::SubscriptionEnded);
                };
                match serde_json::from_str::<Envelope>(&payload) {
                    Ok(envelope) => {
                        if let Some(denial) = manager.revoked_by(&envelope) {
                            return Err(SessionError::Denied(denial));
                        }
                        if manager.accepts(&envelope) {
                            outbound.send_text(payload).await?;
                        }
                    }
                    Err(e) => tracing::warn!(user_id = manager.user_id(), error = %e, "Dropping undecodable envelope"),
                }
            }
            _ = heartbeat.tick() => outbound.ping().await?,
        }
    }
}
