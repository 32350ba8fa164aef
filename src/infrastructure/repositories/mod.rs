//! Repository Implementations
//!
//! PostgreSQL implementations of domain repository traits.
//!
//! ## Available Repositories
//!
//! - **PgChatRepository** - Chats, including race-safe private chat creation
//! - **PgMembershipRepository** - Memberships and role flags
//! - **PgMessageRepository** - Message persistence with cursor pagination
//! - **PgUserRepository** - Read-only public user profiles
//!
//! ## Usage Example
//!
//! ```rust,ignore
//! use sqlx::PgPool;
//! use chatapp_server::infrastructure::repositories::{PgChatRepository, PgMessageRepository};
//!
//! async fn setup_repositories(pool: PgPool) {
//!     let chats = PgChatRepository::new(pool.clone());
//!     let messages = PgMessageRepository::new(pool);
//! }
//! ```

pub mod chat_repository;
pub mod membership_repository;
pub mod message_repository;
pub mod user_repository;

pub use chat_repository::PgChatRepository;
pub use membership_repository::PgMembershipRepository;
pub use message_repository::PgMessageRepository;
pub use user_repository::PgUserRepository;
