//! User Repository Implementation
//!
//! Read-only PostgreSQL access to public user profiles.

use async_trait::async_trait;
use sqlx::PgPool;

use crate::domain::{PublicProfile, UserRepository};
use crate::shared::error::AppError;

/// Public columns of the users table.
#[derive(Debug, sqlx::FromRow)]
struct ProfileRow {
    id: i64,
    username: String,
    first_name: String,
    last_name: String,
    profile_picture: Option<String>,
}

impl ProfileRow {
    fn into_profile(self) -> PublicProfile {
        PublicProfile {
            id: self.id,
            username: self.username,
            first_name: self.first_name,
            last_name: self.last_name,
            profile_picture: self.profile_picture,
        }
    }
}

/// PostgreSQL user directory implementation.
#[derive(Clone)]
pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    /// Create a new PgUserRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn find_public_profile(&self, user_id: i64) -> Result<Option<PublicProfile>, AppError> {
        let row = sqlx::query_as::<_, ProfileRow>(
            r#"
            SELECT id, username, first_name, last_name, profile_picture
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(ProfileRow::into_profile))
    }

    async fn exists(&self, user_id: i64) -> Result<bool, AppError> {
        let exists = sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM users WHERE id = $1)")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(exists)
    }
}
