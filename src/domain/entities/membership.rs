//! Membership entity and repository trait.
//!
//! Maps to the `memberships` table in the database schema.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::shared::error::AppError;

/// Grants a user access to a chat, with role flags.
///
/// Maps to the `memberships` table:
/// - chat_id: BIGINT NOT NULL REFERENCES chats(id) ON DELETE CASCADE (composite PK)
/// - user_id: BIGINT NOT NULL REFERENCES users(id) (composite PK)
/// - is_admin: BOOLEAN NOT NULL DEFAULT FALSE
/// - is_owner: BOOLEAN NOT NULL DEFAULT FALSE (at most one per chat)
/// - accepted: BOOLEAN NOT NULL DEFAULT TRUE
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Membership {
    pub chat_id: i64,
    pub user_id: i64,
    pub is_admin: bool,
    pub is_owner: bool,
    pub accepted: bool,
}

impl Membership {
    /// A plain accepted member without roles.
    pub fn member(chat_id: i64, user_id: i64) -> Self {
        Self {
            chat_id,
            user_id,
            is_admin: false,
            is_owner: false,
            accepted: true,
        }
    }

    /// Owners always administer their chat.
    pub fn can_administer(&self) -> bool {
        self.accepted && (self.is_admin || self.is_owner)
    }
}

/// Repository trait for Membership data access operations.
#[async_trait]
pub trait MembershipRepository: Send + Sync {
    /// Find the membership of a user in a chat.
    async fn find(&self, chat_id: i64, user_id: i64) -> Result<Option<Membership>, AppError>;

    /// All memberships of a chat, ordered by user id.
    async fn list_by_chat(&self, chat_id: i64) -> Result<Vec<Membership>, AppError>;

    /// Add a membership. Fails with `Conflict` if the user is already a member.
    async fn create(&self, membership: &Membership) -> Result<Membership, AppError>;

    /// Change the admin flag of a member.
    async fn set_admin(&self, chat_id: i64, user_id: i64, is_admin: bool) -> Result<Membership, AppError>;

    /// Remove a membership. Fails with `NotFound` if absent.
    async fn delete(&self, chat_id: i64, user_id: i64) -> Result<(), AppError>;

    /// Move the owner flag from one member to another in one step.
    /// The new owner also becomes an admin.
    async fn transfer_ownership(&self, chat_id: i64, from_user: i64, to_user: i64) -> Result<(), AppError>;
}
