//! # Domain Entities
//!
//! Core domain entities of the chat backend. Each entity maps to a database
//! table and has a repository trait implemented in the infrastructure layer.
//!
//! - **Chat**: a private pair chat or a named public chat
//! - **Membership**: a user's access to a chat, with admin/owner flags
//! - **Message**: an immutable message in a chat
//! - **PublicProfile**: the public part of a user account

mod chat;
mod membership;
mod message;
mod user;

pub use chat::{
    pair_key, Chat, ChatActivity, ChatListing, ChatRepository, ChatSummary, NewMember, NewPublicChat,
};
pub use membership::{Membership, MembershipRepository};
pub use message::{Message, MessageRepository, MAX_MESSAGE_CHARS};
pub use user::{PublicProfile, UserRepository};
