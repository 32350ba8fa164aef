//! Public user profile and the user directory trait.
//!
//! Accounts are managed elsewhere; the messaging core only reads the public
//! part of the `users` table to stamp outgoing envelopes.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::shared::error::AppError;

/// The public view of a user, embedded as `from` in envelopes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicProfile {
    pub id: i64,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub profile_picture: Option<String>,
}

/// Read access to user profiles.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Find the public profile of a user.
    async fn find_public_profile(&self, user_id: i64) -> Result<Option<PublicProfile>, AppError>;

    /// Check whether a user exists.
    async fn exists(&self, user_id: i64) -> Result<bool, AppError> {
        Ok(self.find_public_profile(user_id).await?.is_some())
    }
}
