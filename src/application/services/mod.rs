//! Application Services
//!
//! ## Available Services
//!
//! - **MessageStore**: Message persistence and private chat resolution
//! - **ChatService**: Chat and membership administration

mod chat_service;
mod message_store;

pub use chat_service::ChatService;
pub use message_store::MessageStore;
