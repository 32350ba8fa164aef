//! Request DTOs
//!
//! Data structures for API request bodies and query strings.

use serde::Deserialize;
use validator::Validate;

/// Default page size of message history
pub const DEFAULT_PAGE_SIZE: i64 = 10;

/// Member to enroll when creating a public chat
#[derive(Debug, Clone, Deserialize)]
pub struct MemberRequest {
    pub id: i64,
    #[serde(default)]
    pub is_admin: bool,
}

/// Create public chat request
#[derive(Debug, Deserialize, Validate)]
pub struct CreateChatRequest {
    #[validate(length(min = 1, max = 150, message = "Name must be 1-150 characters"))]
    pub name: String,

    #[serde(default)]
    pub members: Vec<MemberRequest>,
}

/// Rename chat request
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateChatRequest {
    #[validate(length(min = 1, max = 150, message = "Name must be 1-150 characters"))]
    pub name: String,
}

/// Change a member's admin flag
#[derive(Debug, Deserialize)]
pub struct UpdateMemberRequest {
    pub is_admin: bool,
}

/// Join a chat with an invitation token
#[derive(Debug, Deserialize, Validate)]
pub struct EnrollRequest {
    #[validate(length(min = 1, message = "Token is required"))]
    pub token: String,
}

/// Hand chat ownership to another member
#[derive(Debug, Deserialize)]
pub struct TransferOwnershipRequest {
    pub user_id: i64,
}

/// Message history query parameters
#[derive(Debug, Default, Deserialize, Validate)]
pub struct HistoryQuery {
    /// Only messages older than this message id
    pub before: Option<i64>,

    #[validate(range(min = 1, max = 100, message = "Limit must be between 1 and 100"))]
    pub limit: Option<i64>,
}

impl HistoryQuery {
    pub fn limit(&self) -> i64 {
        self.limit.unwrap_or(DEFAULT_PAGE_SIZE)
    }
}

/// Default page size of chat listings
pub const DEFAULT_LISTING_SIZE: i64 = 50;

/// Chat listing query parameters
#[derive(Debug, Default, Deserialize, Validate)]
pub struct ChatListQuery {
    /// Case-insensitive substring of the chat name
    pub keyword: Option<String>,

    #[validate(range(min = 1, max = 100, message = "Limit must be between 1 and 100"))]
    pub limit: Option<i64>,

    #[validate(range(min = 0, message = "Offset must not be negative"))]
    pub offset: Option<i64>,
}

impl ChatListQuery {
    /// The keyword, ignoring a blank one.
    pub fn keyword(&self) -> Option<&str> {
        self.keyword
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
    }

    pub fn limit(&self) -> i64 {
        self.limit.unwrap_or(DEFAULT_LISTING_SIZE)
    }

    pub fn offset(&self) -> i64 {
        self.offset.unwrap_or(0)
    }
}
