//! WebSocket Transport
//!
//! A split, boxed view of a WebSocket connection. Sessions only see a sink
//! and a stream of `ws::Message`, so they run the same over a real socket
//! and over in-memory channels.

use std::pin::Pin;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::ws::{CloseFrame, Message, WebSocket};
use futures::{Sink, SinkExt, Stream, StreamExt};
use serde::Serialize;
use tokio::sync::Mutex;

/// Outgoing half of a connection.
pub type FrameSink = Pin<Box<dyn Sink<Message, Error = axum::Error> + Send>>;

/// Incoming half of a connection.
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<Message, axum::Error>> + Send>>;

/// Both halves of a connection.
pub struct Transport {
    sink: FrameSink,
    stream: FrameStream,
}

impl Transport {
    pub fn new<S, R>(sink: S, stream: R) -> Self
    where
        S: Sink<Message, Error = axum::Error> + Send + 'static,
        R: Stream<Item = Result<Message, axum::Error>> + Send + 'static,
    {
        Self {
            sink: Box::pin(sink),
            stream: Box::pin(stream),
        }
    }

    pub fn from_socket(socket: WebSocket) -> Self {
        let (sink, stream) = socket.split();
        Self::new(sink, stream)
    }

    pub fn split(self) -> (Outbound, FrameStream) {
        (Outbound::new(self.sink), self.stream)
    }
}

/// Shared writer used by both loops of a session and by the teardown path.
#[derive(Clone)]
pub struct Outbound {
    sink: Arc<Mutex<FrameSink>>,
}

impl Outbound {
    fn new(sink: FrameSink) -> Self {
        Self {
            sink: Arc::new(Mutex::new(sink)),
        }
    }

    /// Send an already serialized text frame.
    pub async fn send_text(&self, text: String) -> Result<(), axum::Error> {
        self.sink.lock().await.send(Message::Text(text.into())).await
    }

    /// Serialize and send a JSON frame.
    pub async fn send_json<T: Serialize>(&self, frame: &T) -> Result<(), axum::Error> {
        let text = serde_json::to_string(frame).map_err(axum::Error::new)?;
        self.send_text(text).await
    }

    pub async fn ping(&self) -> Result<(), axum::Error> {
        self.sink.lock().await.send(Message::Ping(Bytes::new())).await
    }

    /// Send a close frame and shut the sink. Failures are ignored: the peer
    /// may already be gone.
    pub async fn close(&self, code: u16, reason: &str) {
        let mut sink = self.sink.lock().await;
        let frame = CloseFrame {
            code,
            reason: reason.to_owned().into(),
        };
        if let Err(e) = sink.send(Message::Close(Some(frame))).await {
            tracing::trace!(error = %e, "Close frame not delivered");
        }
        let _ = sink.close().await;
    }
}
