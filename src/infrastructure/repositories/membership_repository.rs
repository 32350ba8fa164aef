//! Membership Repository Implementation
//!
//! PostgreSQL implementation of the MembershipRepository trait.

use async_trait::async_trait;
use sqlx::PgPool;

use crate::domain::{Membership, MembershipRepository};
use crate::infrastructure::database::{is_foreign_key_violation, is_unique_violation};
use crate::shared::error::AppError;

/// Database row representation of the memberships table.
#[derive(Debug, sqlx::FromRow)]
struct MembershipRow {
    chat_id: i64,
    user_id: i64,
    is_admin: bool,
    is_owner: bool,
    accepted: bool,
}

impl MembershipRow {
    fn into_membership(self) -> Membership {
        Membership {
            chat_id: self.chat_id,
            user_id: self.user_id,
            is_admin: self.is_admin,
            is_owner: self.is_owner,
            accepted: self.accepted,
        }
    }
}

/// PostgreSQL membership repository implementation.
#[derive(Clone)]
pub struct PgMembershipRepository {
    pool: PgPool,
}

impl PgMembershipRepository {
    /// Create a new PgMembershipRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MembershipRepository for PgMembershipRepository {
    async fn find(&self, chat_id: i64, user_id: i64) -> Result<Option<Membership>, AppError> {
        let row = sqlx::query_as::<_, MembershipRow>(
            r#"
            SELECT chat_id, user_id, is_admin, is_owner, accepted
            FROM memberships
            WHERE chat_id = $1 AND user_id = $2
            "#,
        )
        .bind(chat_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(MembershipRow::into_membership))
    }

    async fn list_by_chat(&self, chat_id: i64) -> Result<Vec<Membership>, AppError> {
        let rows = sqlx::query_as::<_, MembershipRow>(
            r#"
            SELECT chat_id, user_id, is_admin, is_owner, accepted
            FROM memberships
            WHERE chat_id = $1
            ORDER BY user_id
            "#,
        )
        .bind(chat_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(MembershipRow::into_membership).collect())
    }

    async fn create(&self, membership: &Membership) -> Result<Membership, AppError> {
        let row = sqlx::query_as::<_, MembershipRow>(
            r#"
            INSERT INTO memberships (chat_id, user_id, is_admin, is_owner, accepted)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING chat_id, user_id, is_admin, is_owner, accepted
            "#,
        )
        .bind(membership.chat_id)
        .bind(membership.user_id)
        .bind(membership.is_admin)
        .bind(membership.is_owner)
        .bind(membership.accepted)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e, "memberships_pkey") {
                AppError::Conflict("You are already enrolled in this chat.".into())
            } else if is_foreign_key_violation(&e) {
                AppError::NotFound("Chat or user not found".into())
            } else {
                AppError::Database(e)
            }
        })?;

        Ok(row.into_membership())
    }

    async fn set_admin(&self, chat_id: i64, user_id: i64, is_admin: bool) -> Result<Membership, AppError> {
        let row = sqlx::query_as::<_, MembershipRow>(
            r#"
            UPDATE memberships
            SET is_admin = $3
            WHERE chat_id = $1 AND user_id = $2
            RETURNING chat_id, user_id, is_admin, is_owner, accepted
            "#,
        )
        .bind(chat_id)
        .bind(user_id)
        .bind(is_admin)
        .fetch_optional(&self.pool)
        .await?;

        row.map(MembershipRow::into_membership)
            .ok_or_else(|| AppError::NotFound("Member not found.".into()))
    }

    async fn delete(&self, chat_id: i64, user_id: i64) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM memberships WHERE chat_id = $1 AND user_id = $2")
            .bind(chat_id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(
                "Member with given id cannot be found in chat.".into(),
            ));
        }

        Ok(())
    }

    async fn transfer_ownership(&self, chat_id: i64, from_user: i64, to_user: i64) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;

        // The single-owner index requires clearing the old owner first.
        let cleared = sqlx::query(
            r#"
            UPDATE memberships
            SET is_owner = FALSE
            WHERE chat_id = $1 AND user_id = $2 AND is_owner
            "#,
        )
        .bind(chat_id)
        .bind(from_user)
        .execute(&mut *tx)
        .await?;

        if cleared.rows_affected() == 0 {
            return Err(AppError::Forbidden(
                "This action is only available for chat owner.".into(),
            ));
        }

        let promoted = sqlx::query(
            r#"
            UPDATE memberships
            SET is_owner = TRUE, is_admin = TRUE
            WHERE chat_id = $1 AND user_id = $2 AND accepted
            "#,
        )
        .bind(chat_id)
        .bind(to_user)
        .execute(&mut *tx)
        .await?;

        if promoted.rows_affected() == 0 {
            return Err(AppError::NotFound("Member not found.".into()));
        }

        tx.commit().await?;
        Ok(())
    }
}
