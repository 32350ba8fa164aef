//! WebSocket Messaging
//!
//! Real-time private chats, public chats and notifications.
//!
//! - **handler**: upgrade endpoints and authentication
//! - **session**: the paired receive/send loops of one connection
//! - **managers**: per-flavour persistence, fan-out and filtering
//! - **messages**: client frames and bus envelopes
//! - **transport**: boxed sink/stream over a socket

pub mod handler;
pub mod managers;
pub mod messages;
pub mod session;
pub mod transport;

pub use handler::{notifications_ws, private_chat_ws, public_chat_ws, serve_transport};
pub use managers::{MessagingContext, NotificationsManager, PrivateManager, PublicManager};
pub use messages::{ClientFrame, Envelope, ErrorFrame, FrameError};
pub use session::{MessagingManager, SessionError, SessionKind, SessionRunner, INVALID_CREDENTIALS};
pub use transport::{Outbound, Transport};
