//! Message Store Service
//!
//! Assigns ids and timestamps, resolves private chats and persists messages
//! on behalf of the socket sessions and the history endpoints.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::domain::{Chat, ChatRepository, Message, MessageRepository};
use crate::shared::error::AppError;
use crate::shared::snowflake::SnowflakeGenerator;

/// Message persistence facade over the chat and message repositories.
#[derive(Clone)]
pub struct MessageStore {
    chats: Arc<dyn ChatRepository>,
    messages: Arc<dyn MessageRepository>,
    ids: Arc<SnowflakeGenerator>,
}

impl MessageStore {
    pub fn new(
        chats: Arc<dyn ChatRepository>,
        messages: Arc<dyn MessageRepository>,
        ids: Arc<SnowflakeGenerator>,
    ) -> Self {
        Self { chats, messages, ids }
    }

    /// The private chat of two users, created with both memberships on first use.
    pub async fn find_or_create_private_chat(&self, user_a: i64, user_b: i64) -> Result<Chat, AppError> {
        let (chat, created) = self
            .chats
            .find_or_create_private_chat(user_a, user_b, self.ids.generate())
            .await?;

        if created {
            tracing::debug!(chat_id = chat.id, user_a, user_b, "First contact, private chat created");
        }
        Ok(chat)
    }

    /// The private chat of two users, if they ever exchanged a message.
    pub async fn find_private_chat(&self, user_a: i64, user_b: i64) -> Result<Option<Chat>, AppError> {
        self.chats.find_private_chat(user_a, user_b).await
    }

    /// Persist a message. The timestamp is taken from the id so both orders agree.
    pub async fn create_message(&self, chat_id: i64, sender_id: i64, body: &str) -> Result<Message, AppError> {
        let id = self.ids.generate();
        let created_at = DateTime::from_timestamp_millis(self.ids.timestamp_of(id) as i64)
            .unwrap_or_else(Utc::now);

        let message = Message {
            id,
            chat_id,
            sender_id,
            body: body.to_owned(),
            created_at,
        };
        self.messages.create(&message).await
    }

    /// Messages of a chat, newest first.
    pub async fn history(&self, chat_id: i64, before: Option<i64>, limit: i64) -> Result<Vec<Message>, AppError> {
        self.messages.find_by_chat(chat_id, before, limit).await
    }

    /// Checks that the backing store is reachable.
    pub async fn ping(&self) -> Result<(), AppError> {
        self.messages.ping().await
    }
}
