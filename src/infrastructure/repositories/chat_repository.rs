//! Chat Repository Implementation
//!
//! PostgreSQL implementation of the ChatRepository trait, including the
//! race-safe find-or-create of private chats.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::domain::{
    pair_key, Chat, ChatActivity, ChatListing, ChatRepository, ChatSummary, Message, NewPublicChat,
};
use crate::infrastructure::database::{is_foreign_key_violation, is_unique_violation};
use crate::shared::error::AppError;

const CHAT_NAME_KEY: &str = "chats_name_key";

/// Database row representation of the chats table.
#[derive(Debug, sqlx::FromRow)]
struct ChatRow {
    id: i64,
    name: Option<String>,
    private: bool,
    created_at: DateTime<Utc>,
}

impl ChatRow {
    fn into_chat(self) -> Chat {
        Chat {
            id: self.id,
            name: self.name,
            private: self.private,
            created_at: self.created_at,
        }
    }
}

/// Chat row joined with its member count.
#[derive(Debug, sqlx::FromRow)]
struct ChatSummaryRow {
    id: i64,
    name: Option<String>,
    private: bool,
    created_at: DateTime<Utc>,
    members_count: i64,
}

impl ChatSummaryRow {
    fn into_summary(self) -> ChatSummary {
        ChatSummary {
            chat: Chat {
                id: self.id,
                name: self.name,
                private: self.private,
                created_at: self.created_at,
            },
            members_count: self.members_count,
        }
    }
}

/// Chat row joined with its latest message, if any.
#[derive(Debug, sqlx::FromRow)]
struct ChatActivityRow {
    id: i64,
    name: Option<String>,
    private: bool,
    created_at: DateTime<Utc>,
    last_message_id: Option<i64>,
    last_message_sender_id: Option<i64>,
    last_message_body: Option<String>,
    last_message_created_at: Option<DateTime<Utc>>,
}

impl ChatActivityRow {
    fn into_activity(self) -> ChatActivity {
        let last_message = match (
            self.last_message_id,
            self.last_message_sender_id,
            self.last_message_body,
            self.last_message_created_at,
        ) {
            (Some(id), Some(sender_id), Some(body), Some(created_at)) => Some(Message {
                id,
                chat_id: self.id,
                sender_id,
                body,
                created_at,
            }),
            _ => None,
        };

        ChatActivity {
            chat: Chat {
                id: self.id,
                name: self.name,
                private: self.private,
                created_at: self.created_at,
            },
            last_message,
        }
    }
}

/// `ILIKE` pattern matching `keyword` anywhere, with wildcards escaped.
fn contains_pattern(keyword: &str) -> String {
    let escaped = keyword
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

fn map_write_error(err: sqlx::Error) -> AppError {
    if is_unique_violation(&err, CHAT_NAME_KEY) {
        AppError::Conflict("Chat with given name already exists.".into())
    } else if is_foreign_key_violation(&err) {
        AppError::NotFound("Nonexistent user passed as a member.".into())
    } else {
        AppError::Database(err)
    }
}

/// PostgreSQL chat repository implementation.
#[derive(Clone)]
pub struct PgChatRepository {
    pool: PgPool,
}

impl PgChatRepository {
    /// Create a new PgChatRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ChatRepository for PgChatRepository {
    async fn find_by_id(&self, id: i64) -> Result<Option<Chat>, AppError> {
        let row = sqlx::query_as::<_, ChatRow>(
            r#"
            SELECT id, name, private, created_at
            FROM chats
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(ChatRow::into_chat))
    }

    async fn find_private_chat(&self, user_a: i64, user_b: i64) -> Result<Option<Chat>, AppError> {
        let row = sqlx::query_as::<_, ChatRow>(
            r#"
            SELECT id, name, private, created_at
            FROM chats
            WHERE private_pair = $1
            "#,
        )
        .bind(pair_key(user_a, user_b))
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(ChatRow::into_chat))
    }

    /// Serialized per pair by a transaction-scoped advisory lock. The unique
    /// `private_pair` column backs it up should the lock ever be bypassed.
    #[tracing::instrument(skip(self), err)]
    async fn find_or_create_private_chat(
        &self,
        user_a: i64,
        user_b: i64,
        new_chat_id: i64,
    ) -> Result<(Chat, bool), AppError> {
        let key = pair_key(user_a, user_b);
        let mut tx = self.pool.begin().await?;

        sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
            .bind(format!("private-chat:{key}"))
            .execute(&mut *tx)
            .await?;

        let existing = sqlx::query_as::<_, ChatRow>(
            r#"
            SELECT id, name, private, created_at
            FROM chats
            WHERE private_pair = $1
            "#,
        )
        .bind(&key)
        .fetch_optional(&mut *tx)
        .await?;

        if let Some(row) = existing {
            tx.commit().await?;
            return Ok((row.into_chat(), false));
        }

        let row = sqlx::query_as::<_, ChatRow>(
            r#"
            INSERT INTO chats (id, name, private, private_pair)
            VALUES ($1, NULL, TRUE, $2)
            RETURNING id, name, private, created_at
            "#,
        )
        .bind(new_chat_id)
        .bind(&key)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO memberships (chat_id, user_id, is_admin, is_owner, accepted)
            VALUES ($1, $2, FALSE, FALSE, TRUE), ($1, $3, FALSE, FALSE, TRUE)
            "#,
        )
        .bind(new_chat_id)
        .bind(user_a)
        .bind(user_b)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            if is_foreign_key_violation(&e) {
                AppError::NotFound("Target user not found.".into())
            } else {
                AppError::Database(e)
            }
        })?;

        tx.commit().await?;
        tracing::info!(chat_id = new_chat_id, user_a, user_b, "Private chat created");
        Ok((row.into_chat(), true))
    }

    async fn create_public_chat(&self, chat: NewPublicChat) -> Result<Chat, AppError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, ChatRow>(
            r#"
            INSERT INTO chats (id, name, private, private_pair)
            VALUES ($1, $2, FALSE, NULL)
            RETURNING id, name, private, created_at
            "#,
        )
        .bind(chat.id)
        .bind(&chat.name)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_write_error)?;

        sqlx::query(
            r#"
            INSERT INTO memberships (chat_id, user_id, is_admin, is_owner, accepted)
            VALUES ($1, $2, TRUE, TRUE, TRUE)
            "#,
        )
        .bind(chat.id)
        .bind(chat.owner_id)
        .execute(&mut *tx)
        .await
        .map_err(map_write_error)?;

        for member in chat.members.iter().filter(|m| m.user_id != chat.owner_id) {
            sqlx::query(
                r#"
                INSERT INTO memberships (chat_id, user_id, is_admin, is_owner, accepted)
                VALUES ($1, $2, $3, FALSE, TRUE)
                ON CONFLICT (chat_id, user_id) DO NOTHING
                "#,
            )
            .bind(chat.id)
            .bind(member.user_id)
            .bind(member.is_admin)
            .execute(&mut *tx)
            .await
            .map_err(map_write_error)?;
        }

        tx.commit().await?;
        Ok(row.into_chat())
    }

    async fn rename(&self, chat_id: i64, name: &str) -> Result<Chat, AppError> {
        let row = sqlx::query_as::<_, ChatRow>(
            r#"
            UPDATE chats
            SET name = $2
            WHERE id = $1 AND NOT private
            RETURNING id, name, private, created_at
            "#,
        )
        .bind(chat_id)
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_write_error)?;

        row.map(ChatRow::into_chat)
            .ok_or_else(|| AppError::NotFound("Public chat with given id has not been found.".into()))
    }

    async fn delete(&self, chat_id: i64) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM chats WHERE id = $1")
            .bind(chat_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Chat not found".into()));
        }

        Ok(())
    }

    async fn count_members(&self, chat_id: i64) -> Result<i64, AppError> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM memberships WHERE chat_id = $1",
        )
        .bind(chat_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    async fn search_public(&self, listing: ChatListing<'_>) -> Result<Vec<ChatSummary>, AppError> {
        let rows = sqlx::query_as::<_, ChatSummaryRow>(
            r#"
            SELECT c.id, c.name, c.private, c.created_at,
                   (SELECT COUNT(*) FROM memberships m WHERE m.chat_id = c.id) AS members_count
            FROM chats c
            WHERE NOT c.private
              AND ($1::TEXT IS NULL OR c.name ILIKE $1)
            ORDER BY c.name, c.id
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(listing.keyword.map(contains_pattern))
        .bind(listing.limit)
        .bind(listing.offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(ChatSummaryRow::into_summary).collect())
    }

    async fn list_by_user(&self, user_id: i64, listing: ChatListing<'_>) -> Result<Vec<ChatActivity>, AppError> {
        let rows = sqlx::query_as::<_, ChatActivityRow>(
            r#"
            SELECT c.id, c.name, c.private, c.created_at,
                   last.id AS last_message_id,
                   last.sender_id AS last_message_sender_id,
                   last.body AS last_message_body,
                   last.created_at AS last_message_created_at
            FROM memberships mb
            JOIN chats c ON c.id = mb.chat_id
            LEFT JOIN LATERAL (
                SELECT id, sender_id, body, created_at
                FROM messages
                WHERE chat_id = c.id
                ORDER BY id DESC
                LIMIT 1
            ) last ON TRUE
            WHERE mb.user_id = $1
              AND ($2::TEXT IS NULL OR c.name ILIKE $2)
            ORDER BY last.id DESC NULLS LAST, c.id DESC
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(user_id)
        .bind(listing.keyword.map(contains_pattern))
        .bind(listing.limit)
        .bind(listing.offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(ChatActivityRow::into_activity).collect())
    }
}
