//! Bus Envelopes
//!
//! Payloads fanned out over broadcast bus topics. Chat sockets forward
//! `message` envelopes, notification sockets forward `notification`
//! envelopes, and `revoked` envelopes end the sessions they name.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::PublicProfile;

/// Payload carried over a bus topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Envelope {
    /// A chat message, delivered to chat sockets.
    Message {
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        to: Option<i64>,
        chat_id: i64,
        created_at: DateTime<Utc>,
        from: PublicProfile,
    },
    /// A new-message hint, delivered to notification sockets.
    Notification {
        chat_id: i64,
        message: String,
        from: PublicProfile,
    },
    /// Read access to a chat was withdrawn. Without a `user_id` the chat
    /// itself is gone and every member is affected.
    Revoked {
        chat_id: i64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        user_id: Option<i64>,
    },
}

impl Envelope {
    /// Id of the user whose message produced the envelope.
    pub fn sender_id(&self) -> Option<i64> {
        match self {
            Envelope::Message { from, .. } | Envelope::Notification { from, .. } => Some(from.id),
            Envelope::Revoked { .. } => None,
        }
    }

    /// Whether this envelope withdraws `user_id`'s access to `chat_id`.
    pub fn revokes(&self, chat_id: i64, user_id: i64) -> bool {
        match self {
            Envelope::Revoked { chat_id: revoked, user_id: target } => {
                *revoked == chat_id && target.map_or(true, |target| target == user_id)
            }
            _ => false,
        }
    }
}
