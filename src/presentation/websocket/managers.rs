//! Messaging Managers
//!
//! One manager per socket flavour. Each decides what its connection listens
//! to, how an inbound frame is persisted and fanned out, and which bus
//! deliveries reach the client.
//!
//! | manager       | listens on              | publishes to                         |
//! |---------------|-------------------------|--------------------------------------|
//! | private       | own inbox               | counterpart inbox (message + notice) |
//! | public        | chat room               | chat room, other members' inboxes    |
//! | notifications | own inbox               | nothing                              |

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::OnceCell;

use super::messages::{ClientFrame, Envelope};
use super::session::{MessagingManager, SessionError, SessionKind};
use crate::application::services::MessageStore;
use crate::domain::services::{Access, Denial, MembershipAuthorizer};
use crate::domain::{
    Chat, ChatRef, Message, MembershipRepository, PublicProfile, Topic, UserRepository,
};
use crate::infrastructure::bus::BroadcastBus;
use crate::infrastructure::metrics;
use crate::shared::error::AppError;

/// Collaborators shared by every manager.
#[derive(Clone)]
pub struct MessagingContext {
    pub store: MessageStore,
    pub users: Arc<dyn UserRepository>,
    pub memberships: Arc<dyn MembershipRepository>,
    pub authorizer: MembershipAuthorizer,
    pub bus: Arc<dyn BroadcastBus>,
}

impl MessagingContext {
    /// Re-read the sender profile so every envelope is self-contained.
    async fn sender_profile(&self, user_id: i64) -> Result<PublicProfile, SessionError> {
        self.users
            .find_public_profile(user_id)
            .await?
            .ok_or(SessionError::Denied(Denial::UnknownUser))
    }

    /// Publish an envelope. Failures are logged and counted; the session goes on.
    async fn publish(&self, kind: SessionKind, topic: &Topic, envelope: &Envelope) {
        let payload = match serde_json::to_string(envelope) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!(topic = %topic, error = %e, "Failed to serialize envelope");
                return;
            }
        };

        if let Err(e) = self.bus.publish(topic, payload).await {
            tracing::warn!(topic = %topic, error = %e, "Bus publish failed");
            metrics::record_publish_failure(kind.as_str());
        }
    }
}

fn notification(message: &Message, from: &PublicProfile) -> Envelope {
    Envelope::Notification {
        chat_id: message.chat_id,
        message: message.body.clone(),
        from: from.clone(),
    }
}

/// Private messaging between the connected user and one counterpart.
///
/// The chat is resolved (and created on first contact) when the first frame
/// arrives, then cached for the rest of the connection.
pub struct PrivateManager {
    ctx: MessagingContext,
    user_id: i64,
    counterpart_id: i64,
    chat: OnceCell<Chat>,
}

impl PrivateManager {
    pub fn new(ctx: MessagingContext, user_id: i64, counterpart_id: i64) -> Self {
        Self {
            ctx,
            user_id,
            counterpart_id,
            chat: OnceCell::new(),
        }
    }

    fn chat_ref(&self) -> ChatRef {
        ChatRef::Private {
            counterpart_id: self.counterpart_id,
        }
    }

    async fn chat(&self) -> Result<&Chat, AppError> {
        self.chat
            .get_or_try_init(|| {
                self.ctx
                    .store
                    .find_or_create_private_chat(self.user_id, self.counterpart_id)
            })
            .await
    }
}

#[async_trait]
impl MessagingManager for PrivateManager {
    fn kind(&self) -> SessionKind {
        SessionKind::Private
    }

    fn user_id(&self) -> i64 {
        self.user_id
    }

    fn topic(&self) -> Topic {
        Topic::private_inbox(self.user_id)
    }

    async fn authorize(&self) -> Result<Access, AppError> {
        self.ctx.authorizer.can_connect(self.user_id, self.chat_ref()).await
    }

    async fn handle_frame(&self, text: &str) -> Result<(), SessionError> {
        let frame = ClientFrame::parse_private(text, self.counterpart_id)?;

        if let Access::Denied(denial) = self.ctx.authorizer.can_post(self.user_id, self.chat_ref()).await? {
            return Err(SessionError::Denied(denial));
        }

        let chat_id = self.chat().await?.id;
        let message = self
            .ctx
            .store
            .create_message(chat_id, self.user_id, &frame.message)
            .await?;
        metrics::record_message_persisted(self.kind().as_str());

        let from = self.ctx.sender_profile(self.user_id).await?;
        let inbox = Topic::for_chat(self.chat_ref());
        let envelope = Envelope::Message {
            message: message.body.clone(),
            to: Some(self.counterpart_id),
            chat_id,
            created_at: message.created_at,
            from: from.clone(),
        };

        // Both land on the counterpart inbox; private sockets keep the
        // message and notification sockets keep the notification.
        self.ctx.publish(self.kind(), &inbox, &envelope).await;
        self.ctx
            .publish(self.kind(), &inbox, &notification(&message, &from))
            .await;

        tracing::debug!(user_id = self.user_id, chat_id, message_id = message.id, "Private message sent");
        Ok(())
    }

    /// Messages from any counterpart land in the same inbox.
    fn accepts(&self, envelope: &Envelope) -> bool {
        matches!(envelope, Envelope::Message { .. })
    }
}

/// Messaging inside a public chat the connected user is a member of.
pub struct PublicManager {
    ctx: MessagingContext,
    user_id: i64,
    chat_id: i64,
}

impl PublicManager {
    pub fn new(ctx: MessagingContext, user_id: i64, chat_id: i64) -> Self {
        Self { ctx, user_id, chat_id }
    }

    fn chat_ref(&self) -> ChatRef {
        ChatRef::Public { chat_id: self.chat_id }
    }

    /// Hint every other accepted member that the room has a new message.
    async fn notify_members(&self, message: &Message, from: &PublicProfile) {
        let members = match self.ctx.memberships.list_by_chat(self.chat_id).await {
            Ok(members) => members,
            Err(e) => {
                tracing::warn!(chat_id = self.chat_id, error = %e, "Could not list members for notifications");
                return;
            }
        };

        let envelope = notification(message, from);
        for member in members
            .iter()
            .filter(|m| m.accepted && m.user_id != self.user_id)
        {
            self.ctx
                .publish(self.kind(), &Topic::private_inbox(member.user_id), &envelope)
                .await;
        }
    }
}

#[async_trait]
impl MessagingManager for PublicManager {
    fn kind(&self) -> SessionKind {
        SessionKind::Public
    }

    fn user_id(&self) -> i64 {
        self.user_id
    }

    fn topic(&self) -> Topic {
        Topic::public_chat(self.chat_id)
    }

    async fn authorize(&self) -> Result<Access, AppError> {
        self.ctx.authorizer.can_connect(self.user_id, self.chat_ref()).await
    }

    async fn handle_frame(&self, text: &str) -> Result<(), SessionError> {
        let frame = ClientFrame::parse_public(text)?;

        // Membership may have been revoked since the socket opened.
        if let Access::Denied(denial) = self.ctx.authorizer.can_post(self.user_id, self.chat_ref()).await? {
            return Err(SessionError::Denied(denial));
        }

        let message = self
            .ctx
            .store
            .create_message(self.chat_id, self.user_id, &frame.message)
            .await?;
        metrics::record_message_persisted(self.kind().as_str());

        let from = self.ctx.sender_profile(self.user_id).await?;
        let envelope = Envelope::Message {
            message: message.body.clone(),
            to: None,
            chat_id: self.chat_id,
            created_at: message.created_at,
            from: from.clone(),
        };

        self.ctx.publish(self.kind(), &self.topic(), &envelope).await;
        self.notify_members(&message, &from).await;

        tracing::debug!(user_id = self.user_id, chat_id = self.chat_id, message_id = message.id, "Public message sent");
        Ok(())
    }

    /// The room topic is shared, so the sender's own messages come back and are dropped here.
    fn accepts(&self, envelope: &Envelope) -> bool {
        matches!(envelope, Envelope::Message { .. }) && envelope.sender_id() != Some(self.user_id)
    }

    /// Removal from the chat, or its deletion, closes the socket before the
    /// next room message can reach it.
    fn revoked_by(&self, envelope: &Envelope) -> Option<Denial> {
        envelope
            .revokes(self.chat_id, self.user_id)
            .then_some(Denial::NotMember)
    }
}

/// Receive-only socket delivering notifications from the user's inbox.
pub struct NotificationsManager {
    ctx: MessagingContext,
    user_id: i64,
}

impl NotificationsManager {
    pub fn new(ctx: MessagingContext, user_id: i64) -> Self {
        Self { ctx, user_id }
    }
}

#[async_trait]
impl MessagingManager for NotificationsManager {
    fn kind(&self) -> SessionKind {
        SessionKind::Notifications
    }

    fn user_id(&self) -> i64 {
        self.user_id
    }

    fn topic(&self) -> Topic {
        Topic::private_inbox(self.user_id)
    }

    async fn authorize(&self) -> Result<Access, AppError> {
        self.ctx.authorizer.can_open_inbox(self.user_id).await
    }

    async fn handle_frame(&self, _text: &str) -> Result<(), SessionError> {
        tracing::trace!(user_id = self.user_id, "Ignoring frame on notifications socket");
        Ok(())
    }

    fn accepts(&self, envelope: &Envelope) -> bool {
        matches!(envelope, Envelope::Notification { .. })
    }
}
