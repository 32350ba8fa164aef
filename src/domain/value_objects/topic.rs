//! Broadcast bus topics.
//!
//! Topics are derived from chat identity on demand and never stored.
//! Private messaging uses one inbox topic per user rather than one per pair,
//! so a single subscription receives messages from every counterpart.

use std::fmt;

const PRIVATE_INBOX_PREFIX: &str = "private-chat:user-";
const PUBLIC_CHAT_PREFIX: &str = "public-chat:chat-";

/// The chat a connection or frame addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChatRef {
    /// A private chat, addressed by the counterpart user id.
    Private { counterpart_id: i64 },
    /// A public chat, addressed by its chat id.
    Public { chat_id: i64 },
}

/// Name of a channel on the broadcast bus.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Topic(String);

impl Topic {
    /// Inbox of a user: private messages and notifications addressed to them.
    pub fn private_inbox(user_id: i64) -> Self {
        Self(format!("{PRIVATE_INBOX_PREFIX}{user_id}"))
    }

    /// Room shared by every member connection of a public chat.
    pub fn public_chat(chat_id: i64) -> Self {
        Self(format!("{PUBLIC_CHAT_PREFIX}{chat_id}"))
    }

    /// Where a message sent over `chat` is published.
    pub fn for_chat(chat: ChatRef) -> Self {
        match chat {
            ChatRef::Private { counterpart_id } => Self::private_inbox(counterpart_id),
            ChatRef::Public { chat_id } => Self::public_chat(chat_id),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Topic {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
