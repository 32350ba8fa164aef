//! Response DTOs
//!
//! Data structures for API response bodies.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::{Chat, ChatActivity, ChatSummary, Membership, Message};

/// Chat response
#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub id: i64,
    pub name: Option<String>,
    pub private: bool,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub members_count: Option<i64>,
}

impl ChatResponse {
    pub fn with_members_count(chat: Chat, members_count: i64) -> Self {
        Self {
            members_count: Some(members_count),
            ..Self::from(chat)
        }
    }
}

impl From<Chat> for ChatResponse {
    fn from(chat: Chat) -> Self {
        Self {
            id: chat.id,
            name: chat.name,
            private: chat.private,
            created_at: chat.created_at,
            members_count: None,
        }
    }
}

impl From<ChatSummary> for ChatResponse {
    fn from(summary: ChatSummary) -> Self {
        Self::with_members_count(summary.chat, summary.members_count)
    }
}

/// A chat in the caller's inbox with its latest message
#[derive(Debug, Serialize)]
pub struct UserChatResponse {
    #[serde(flatten)]
    pub chat: ChatResponse,
    pub last_message: Option<MessageResponse>,
}

impl From<ChatActivity> for UserChatResponse {
    fn from(activity: ChatActivity) -> Self {
        Self {
            chat: activity.chat.into(),
            last_message: activity.last_message.map(MessageResponse::from),
        }
    }
}

/// Membership response
#[derive(Debug, Serialize)]
pub struct MemberResponse {
    pub chat_id: i64,
    pub user_id: i64,
    pub is_admin: bool,
    pub is_owner: bool,
    pub accepted: bool,
}

impl From<Membership> for MemberResponse {
    fn from(m: Membership) -> Self {
        Self {
            chat_id: m.chat_id,
            user_id: m.user_id,
            is_admin: m.is_admin,
            is_owner: m.is_owner,
            accepted: m.accepted,
        }
    }
}

/// Message response
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub id: i64,
    pub chat_id: i64,
    pub sender_id: i64,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

impl From<Message> for MessageResponse {
    fn from(m: Message) -> Self {
        Self {
            id: m.id,
            chat_id: m.chat_id,
            sender_id: m.sender_id,
            message: m.body,
            created_at: m.created_at,
        }
    }
}

/// One page of message history, newest first
#[derive(Debug, Serialize)]
pub struct MessagePage {
    pub messages: Vec<MessageResponse>,
    /// Cursor for the next (older) page; absent on the last page
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_before: Option<i64>,
}

impl MessagePage {
    pub fn new(messages: Vec<Message>, limit: i64) -> Self {
        let next_before = if messages.len() as i64 == limit {
            messages.last().map(|m| m.id)
        } else {
            None
        };
        Self {
            messages: messages.into_iter().map(MessageResponse::from).collect(),
            next_before,
        }
    }
}

/// Invitation token response
#[derive(Debug, Serialize)]
pub struct InviteResponse {
    pub token: String,
}
