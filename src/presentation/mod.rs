//! Presentation Layer
//!
//! HTTP routes and WebSocket messaging handlers.

pub mod http;
pub mod middleware;
pub mod websocket;
