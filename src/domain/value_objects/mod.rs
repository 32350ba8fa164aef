//! # Domain Value Objects
//!
//! - **ChatRef**: the chat a connection or frame addresses
//! - **Topic**: a broadcast bus channel name derived from a chat

mod topic;

pub use topic::*;
