//! WebSocket Message Types
//!
//! Client frames and the error frame sent ahead of a protocol-violation
//! close. Bus envelopes are re-exported from the application DTOs.
//!
//! Client -> server:
//! ```json
//! {"type": "message", "message": "hi", "to": 2}   // private socket
//! {"type": "message", "message": "hi"}            // public socket
//! ```
//!
//! Server -> client envelopes mirror the frame and add the persisted message
//! identity plus the sender profile under `from`.

use serde::{Deserialize, Serialize};

pub use crate::application::dto::Envelope;
use crate::domain::MAX_MESSAGE_CHARS;

/// Why a client frame was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    #[error("Frame is not a valid message object: {0}")]
    Malformed(String),

    #[error("Binary frames are not supported")]
    Binary,

    #[error("Field 'to' is required")]
    MissingRecipient,

    #[error("Field 'to' must be the user this chat was opened with")]
    WrongRecipient,

    #[error("Message must not be empty")]
    EmptyBody,

    #[error("Message must be at most 4000 characters")]
    BodyTooLong,
}

/// Inbound frames, tagged by `type`. Any other tag is malformed.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum InboundFrame {
    Message {
        message: String,
        #[serde(default)]
        to: Option<i64>,
    },
}

/// A message frame as submitted by a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientFrame {
    pub message: String,
    pub to: Option<i64>,
}

impl ClientFrame {
    /// Parse and validate a frame sent over a public chat socket.
    pub fn parse_public(text: &str) -> Result<Self, FrameError> {
        let frame = Self::parse(text)?;
        frame.check_body()?;
        Ok(frame)
    }

    /// Parse and validate a frame sent over a private socket opened with `counterpart_id`.
    pub fn parse_private(text: &str, counterpart_id: i64) -> Result<Self, FrameError> {
        let frame = Self::parse(text)?;
        match frame.to {
            None => return Err(FrameError::MissingRecipient),
            Some(to) if to != counterpart_id => return Err(FrameError::WrongRecipient),
            Some(_) => {}
        }
        frame.check_body()?;
        Ok(frame)
    }

    fn parse(text: &str) -> Result<Self, FrameError> {
        match serde_json::from_str(text) {
            Ok(InboundFrame::Message { message, to }) => Ok(Self { message, to }),
            Err(e) => Err(FrameError::Malformed(e.to_string())),
        }
    }

    fn check_body(&self) -> Result<(), FrameError> {
        if self.message.trim().is_empty() {
            return Err(FrameError::EmptyBody);
        }
        if self.message.chars().count() > MAX_MESSAGE_CHARS {
            return Err(FrameError::BodyTooLong);
        }
        Ok(())
    }
}

/// Sent to the client right before a protocol-violation close.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename = "error")]
pub struct ErrorFrame {
    pub detail: String,
}
