//! Membership authorization domain service.
//!
//! Decides who may open, post to, and administer a chat. Data-plane checks
//! (`can_connect`, `can_post`) return a [`Access`] decision the socket layer
//! turns into a policy-violation close; control-plane checks (`require_*`)
//! fail with `AppError::Forbidden`.

use std::fmt;
use std::sync::Arc;

use crate::domain::entities::{Membership, MembershipRepository, UserRepository};
use crate::domain::value_objects::ChatRef;
use crate::shared::error::AppError;

/// Why a data-plane request was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Denial {
    /// The authenticated user no longer exists.
    UnknownUser,
    /// A private chat with oneself was requested.
    SelfChat,
    /// The private chat counterpart does not exist.
    UnknownCounterpart,
    /// No accepted membership in the public chat.
    NotMember,
}

impl Denial {
    /// Close reason sent to the client.
    pub fn reason(&self) -> &'static str {
        match self {
            Denial::UnknownUser => "Auth user not found.",
            Denial::SelfChat => "Cannot open a private chat with yourself.",
            Denial::UnknownCounterpart => "Target user not found.",
            // Non-members cannot tell a private room from a missing one.
            Denial::NotMember => "Chat does not exist",
        }
    }
}

impl fmt::Display for Denial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.reason())
    }
}

/// Outcome of a data-plane authorization check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Granted,
    Denied(Denial),
}

/// Domain service deciding chat access from memberships.
#[derive(Clone)]
pub struct MembershipAuthorizer {
    memberships: Arc<dyn MembershipRepository>,
    users: Arc<dyn UserRepository>,
}

impl MembershipAuthorizer {
    pub fn new(memberships: Arc<dyn MembershipRepository>, users: Arc<dyn UserRepository>) -> Self {
        Self { memberships, users }
    }

    /// May `user_id` open a connection to `chat`?
    ///
    /// Private chats are always open to existing counterparts because the chat
    /// is created on the first message. Public chats need an accepted membership.
    pub async fn can_connect(&self, user_id: i64, chat: ChatRef) -> Result<Access, AppError> {
        if !self.users.exists(user_id).await? {
            return Ok(Access::Denied(Denial::UnknownUser));
        }

        match chat {
            ChatRef::Private { counterpart_id } => {
                if counterpart_id == user_id {
                    return Ok(Access::Denied(Denial::SelfChat));
                }
                if !self.users.exists(counterpart_id).await? {
                    return Ok(Access::Denied(Denial::UnknownCounterpart));
                }
                Ok(Access::Granted)
            }
            ChatRef::Public { chat_id } => self.accepted_member(user_id, chat_id).await,
        }
    }

    /// May `user_id` listen on their own inbox? Always, while the account exists.
    pub async fn can_open_inbox(&self, user_id: i64) -> Result<Access, AppError> {
        if self.users.exists(user_id).await? {
            Ok(Access::Granted)
        } else {
            Ok(Access::Denied(Denial::UnknownUser))
        }
    }

    /// May `user_id` post a message to `chat` right now?
    ///
    /// Re-checked per message so a member removed mid-connection loses write access.
    pub async fn can_post(&self, user_id: i64, chat: ChatRef) -> Result<Access, AppError> {
        match chat {
            ChatRef::Private { counterpart_id } if counterpart_id == user_id => {
                Ok(Access::Denied(Denial::SelfChat))
            }
            ChatRef::Private { .. } => Ok(Access::Granted),
            ChatRef::Public { chat_id } => self.accepted_member(user_id, chat_id).await,
        }
    }

    /// The caller's accepted membership, or `Forbidden`.
    pub async fn require_member(&self, user_id: i64, chat_id: i64) -> Result<Membership, AppError> {
        match self.memberships.find(chat_id, user_id).await? {
            Some(m) if m.accepted => Ok(m),
            _ => Err(AppError::Forbidden(
                "This action is only available for chat members.".into(),
            )),
        }
    }

    /// The caller's membership if they administer the chat, or `Forbidden`.
    pub async fn require_admin(&self, user_id: i64, chat_id: i64) -> Result<Membership, AppError> {
        match self.memberships.find(chat_id, user_id).await? {
            Some(m) if m.can_administer() => Ok(m),
            _ => Err(AppError::Forbidden(
                "This action is only available for chat admins.".into(),
            )),
        }
    }

    /// The caller's membership if they own the chat, or `Forbidden`.
    pub async fn require_owner(&self, user_id: i64, chat_id: i64) -> Result<Membership, AppError> {
        match self.memberships.find(chat_id, user_id).await? {
            Some(m) if m.is_owner => Ok(m),
            _ => Err(AppError::Forbidden(
                "This action is only available for chat owner.".into(),
            )),
        }
    }

    async fn accepted_member(&self, user_id: i64, chat_id: i64) -> Result<Access, AppError> {
        let access = match self.memberships.find(chat_id, user_id).await? {
            Some(m) if m.accepted => Access::Granted,
            _ => Access::Denied(Denial::NotMember),
        };
        Ok(access)
    }
}
