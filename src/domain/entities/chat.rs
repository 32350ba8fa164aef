//! Chat entity and repository trait.
//!
//! Maps to the `chats` table in the database schema.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::message::Message;
use crate::shared::error::AppError;

/// A conversation: either a private chat between exactly two users or a
/// named public chat with any number of members.
///
/// Maps to the `chats` table:
/// - id: BIGINT PRIMARY KEY (Snowflake ID)
/// - name: VARCHAR(150) NULL UNIQUE (public chats only)
/// - private: BOOLEAN NOT NULL
/// - private_pair: TEXT NULL UNIQUE ("{low}:{high}" user ids, private chats only)
/// - created_at: TIMESTAMPTZ NOT NULL DEFAULT NOW()
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chat {
    pub id: i64,
    pub name: Option<String>,
    pub private: bool,
    pub created_at: DateTime<Utc>,
}

impl Chat {
    pub fn is_public(&self) -> bool {
        !self.private
    }
}

/// Canonical key of the unordered user pair of a private chat.
///
/// `pair_key(a, b) == pair_key(b, a)`; the store keeps it unique so a pair
/// can never own two private chats.
pub fn pair_key(user_a: i64, user_b: i64) -> String {
    format!("{}:{}", user_a.min(user_b), user_a.max(user_b))
}

/// A member to enroll when a public chat is created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMember {
    pub user_id: i64,
    pub is_admin: bool,
}

/// Everything needed to create a public chat and its memberships atomically.
#[derive(Debug, Clone)]
pub struct NewPublicChat {
    pub id: i64,
    pub name: String,
    pub owner_id: i64,
    /// Additional members; an entry for the owner is ignored.
    pub members: Vec<NewMember>,
}

/// A public chat with its member count, as found by chat search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatSummary {
    pub chat: Chat,
    pub members_count: i64,
}

/// A chat with its most recent message, as listed in a user's inbox.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatActivity {
    pub chat: Chat,
    pub last_message: Option<Message>,
}

/// Name filter and page window of a chat listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChatListing<'a> {
    /// Case-insensitive substring of the chat name. Unnamed private chats
    /// never match a keyword.
    pub keyword: Option<&'a str>,
    pub limit: i64,
    pub offset: i64,
}

impl ChatListing<'_> {
    /// Whether a chat name passes the keyword filter.
    pub fn matches(&self, name: Option<&str>) -> bool {
        match (self.keyword, name) {
            (None, _) => true,
            (Some(keyword), Some(name)) => name.to_lowercase().contains(&keyword.to_lowercase()),
            (Some(_), None) => false,
        }
    }
}

/// Repository trait for Chat data access operations.
#[async_trait]
pub trait ChatRepository: Send + Sync {
    /// Find a chat by id.
    async fn find_by_id(&self, id: i64) -> Result<Option<Chat>, AppError>;

    /// Find the private chat shared by two users.
    async fn find_private_chat(&self, user_a: i64, user_b: i64) -> Result<Option<Chat>, AppError>;

    /// Find the private chat of two users or create it with two accepted
    /// memberships. `new_chat_id` is only used when the chat is created.
    ///
    /// Safe under concurrent invocation for the same pair: exactly one chat is
    /// ever created, and the boolean is `true` only for the creating caller.
    async fn find_or_create_private_chat(
        &self,
        user_a: i64,
        user_b: i64,
        new_chat_id: i64,
    ) -> Result<(Chat, bool), AppError>;

    /// Create a public chat with its owner and initial members.
    ///
    /// Fails with `Conflict` if the name is taken and `NotFound` if a member
    /// does not exist.
    async fn create_public_chat(&self, chat: NewPublicChat) -> Result<Chat, AppError>;

    /// Rename a public chat. Fails with `Conflict` if the name is taken.
    async fn rename(&self, chat_id: i64, name: &str) -> Result<Chat, AppError>;

    /// Delete a chat together with its memberships and messages.
    async fn delete(&self, chat_id: i64) -> Result<(), AppError>;

    /// Number of memberships in a chat.
    async fn count_members(&self, chat_id: i64) -> Result<i64, AppError>;

    /// Public chats matching the listing filter, ordered by name.
    async fn search_public(&self, listing: ChatListing<'_>) -> Result<Vec<ChatSummary>, AppError>;

    /// Chats `user_id` is enrolled in, most recently active first. Chats
    /// without messages come last, newest chat first.
    async fn list_by_user(&self, user_id: i64, listing: ChatListing<'_>) -> Result<Vec<ChatActivity>, AppError>;
}
