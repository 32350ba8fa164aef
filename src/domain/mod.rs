//! # Domain Layer
//!
//! Core business rules of the messaging backend, independent of the web
//! framework, the database and the broadcast bus.
//!
//! ## Structure
//!
//! - **entities**: Chats, memberships, messages and public user profiles,
//!   each with the repository trait the infrastructure layer implements
//! - **value_objects**: Chat references and broadcast topics
//! - **services**: Membership authorization

pub mod entities;
pub mod services;
pub mod value_objects;

// Re-export commonly used types
pub use entities::*;
pub use value_objects::*;
