//! Common Test Utilities
//!
//! An application wired to the in-memory store and bus, REST helpers, and
//! socket clients that talk to real sessions over in-memory channels.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::ws::Message,
    http::{header, HeaderMap, HeaderValue, Method, Request, StatusCode},
    Router,
};
use futures::channel::mpsc;
use futures::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::task::JoinHandle;
use tower::ServiceExt;

use chatapp_server::config::*;
use chatapp_server::domain::{PublicProfile, Topic};
use chatapp_server::infrastructure::bus::{BroadcastBus, MemoryBus};
use chatapp_server::infrastructure::memory_store::MemoryStore;
use chatapp_server::presentation::websocket::{
    serve_transport, MessagingManager, NotificationsManager, PrivateManager, PublicManager,
    SessionKind, SessionRunner, Transport,
};
use chatapp_server::startup::{build_router, AppState, Store};

pub const ALICE: i64 = 1;
pub const BOB: i64 = 2;
pub const CAROL: i64 = 3;
pub const DAVE: i64 = 4;

const WAIT: Duration = Duration::from_secs(2);

pub fn test_settings() -> Settings {
    Settings {
        server: ServerSettings { host: "127.0.0.1".into(), port: 0 },
        database: DatabaseSettings {
            url: String::new(),
            max_connections: 1,
            min_connections: 1,
            acquire_timeout: 1,
            run_migrations: false,
        },
        redis: RedisSettings { url: String::new() },
        storage: StorageSettings { backend: StorageBackend::Memory },
        bus: BusSettings { backend: BusBackend::Memory, channel_capacity: 256 },
        jwt: JwtSettings {
            secret: "integration-test-secret-with-enough-bytes".into(),
            invite_token_expiry_secs: 3600,
        },
        snowflake: SnowflakeSettings { machine_id: 1, epoch: 1_577_836_800_000 },
        cors: CorsSettings { allowed_origins: vec![] },
        websocket: WebSocketSettings {
            max_message_size: 65536,
            max_frame_size: 16384,
            heartbeat_interval_secs: 30,
            idle_timeout_secs: 90,
        },
        telemetry: TelemetrySettings { log_format: LogFormat::Pretty },
        environment: "test".into(),
    }
}

fn profile(id: i64, name: &str) -> PublicProfile {
    PublicProfile {
        id,
        username: name.to_lowercase(),
        first_name: name.into(),
        last_name: "Tester".into(),
        profile_picture: None,
    }
}

/// Test application builder
pub struct TestApp {
    pub state: AppState,
    pub store: Arc<MemoryStore>,
    pub bus: Arc<MemoryBus>,
    pub router: Router,
}

impl TestApp {
    /// Alice, Bob, Carol and Dave exist in the user directory.
    pub fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        for (id, name) in [(ALICE, "Alice"), (BOB, "Bob"), (CAROL, "Carol"), (DAVE, "Dave")] {
            store.insert_user(profile(id, name));
        }
        Self::on(store, Arc::new(MemoryBus::new(256)), 1)
    }

    /// An application whose sessions use short heartbeat and idle timeouts.
    pub fn with_timeouts(heartbeat: Duration, idle: Duration) -> Self {
        let mut app = Self::new();
        let bus: Arc<dyn BroadcastBus> = app.bus.clone();
        app.state.sessions = SessionRunner::new(bus, heartbeat, idle);
        app.router = build_router(app.state.clone());
        app
    }

    /// A second server process sharing this one's store and bus.
    pub fn replica(&self) -> Self {
        Self::on(self.store.clone(), self.bus.clone(), 2)
    }

    fn on(store: Arc<MemoryStore>, bus: Arc<MemoryBus>, machine_id: u16) -> Self {
        let mut settings = test_settings();
        settings.snowflake.machine_id = machine_id;
        let shared_bus: Arc<dyn BroadcastBus> = bus.clone();
        let state = AppState::new(settings, Store::memory(store.clone()), shared_bus);
        let router = build_router(state.clone());
        Self { state, store, bus, router }
    }

    pub fn token(&self, user_id: i64) -> String {
        self.state
            .auth
            .issue_access_token(user_id, chrono::Duration::hours(1))
            .unwrap()
    }

    pub fn auth_headers(&self, user_id: i64) -> HeaderMap {
        let mut headers = HeaderMap::new();
        let value = format!("Bearer {}", self.token(user_id));
        headers.insert(header::AUTHORIZATION, HeaderValue::from_str(&value).unwrap());
        headers
    }

    /// Create a public chat owned by `owner` with the given plain members.
    pub async fn public_chat(&self, owner: i64, name: &str, members: &[i64]) -> i64 {
        let members: Vec<Value> = members.iter().map(|id| serde_json::json!({"id": id})).collect();
        let (status, body) = self
            .request(
                Method::POST,
                "/api/chats",
                Some(owner),
                Some(serde_json::json!({"name": name, "members": members})),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["id"].as_i64().unwrap()
    }

    // REST helpers

    /// Send a request through the full router; the JSON body is `Null` when empty.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        user_id: Option<i64>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(user_id) = user_id {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", self.token(user_id)));
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into()))
        };
        (status, json)
    }

    pub async fn get(&self, uri: &str, user_id: i64) -> (StatusCode, Value) {
        self.request(Method::GET, uri, Some(user_id), None).await
    }

    // Socket helpers

    pub fn private_socket(&self, user_id: i64, target_id: i64) -> TestClient {
        let ctx = self.state.messaging.clone();
        self.connect(self.auth_headers(user_id), SessionKind::Private, move |uid| {
            PrivateManager::new(ctx, uid, target_id)
        })
    }

    pub fn public_socket(&self, user_id: i64, chat_id: i64) -> TestClient {
        let ctx = self.state.messaging.clone();
        self.connect(self.auth_headers(user_id), SessionKind::Public, move |uid| {
            PublicManager::new(ctx, uid, chat_id)
        })
    }

    pub fn notifications_socket(&self, user_id: i64) -> TestClient {
        let ctx = self.state.messaging.clone();
        self.connect(self.auth_headers(user_id), SessionKind::Notifications, move |uid| {
            NotificationsManager::new(ctx, uid)
        })
    }

    /// Connect with arbitrary upgrade headers.
    pub fn connect<M, F>(&self, headers: HeaderMap, kind: SessionKind, manager: F) -> TestClient
    where
        M: MessagingManager,
        F: FnOnce(i64) -> M + Send + 'static,
    {
        let (client, transport) = TestClient::pair();
        let task = tokio::spawn(serve_transport(transport, self.state.clone(), headers, kind, manager));
        client.with_task(task)
    }

    /// Wait until `topic` has at least `count` live subscriptions.
    pub async fn wait_for_subscribers(&self, topic: &Topic, count: usize) {
        let deadline = tokio::time::Instant::now() + WAIT;
        while self.bus.subscriber_count(topic) < count {
            assert!(
                tokio::time::Instant::now() < deadline,
                "timed out waiting for {count} subscribers on {topic}"
            );
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }
}

/// Client end of an in-memory socket.
pub struct TestClient {
    to_server: mpsc::UnboundedSender<Result<Message, axum::Error>>,
    from_server: mpsc::UnboundedReceiver<Message>,
    task: Option<JoinHandle<()>>,
}

impl TestClient {
    fn pair() -> (Self, Transport) {
        let (server_tx, client_rx) = mpsc::unbounded::<Message>();
        let (client_tx, server_rx) = mpsc::unbounded::<Result<Message, axum::Error>>();

        let transport = Transport::new(server_tx.sink_map_err(axum::Error::new), server_rx);
        let client = Self {
            to_server: client_tx,
            from_server: client_rx,
            task: None,
        };
        (client, transport)
    }

    fn with_task(mut self, task: JoinHandle<()>) -> Self {
        self.task = Some(task);
        self
    }

    pub fn send_text(&self, text: impl Into<String>) {
        let text: String = text.into();
        self.to_server
            .unbounded_send(Ok(Message::Text(text.into())))
            .unwrap();
    }

    pub fn send_json(&self, value: Value) {
        self.send_text(value.to_string());
    }

    /// Send a close frame and wait for the session to finish.
    pub async fn close(mut self) -> (u16, String) {
        let _ = self.to_server.unbounded_send(Ok(Message::Close(None)));
        let close = self.expect_close().await;
        self.finished().await;
        close
    }

    /// Next frame that is not a ping.
    async fn next_frame(&mut self) -> Option<Message> {
        loop {
            let frame = tokio::time::timeout(WAIT, self.from_server.next())
                .await
                .expect("timed out waiting for a frame");
            match frame {
                Some(Message::Ping(_)) | Some(Message::Pong(_)) => continue,
                other => return other,
            }
        }
    }

    /// Next text frame, parsed as JSON.
    pub async fn next_json(&mut self) -> Value {
        match self.next_frame().await {
            Some(Message::Text(text)) => serde_json::from_str(text.as_str()).unwrap(),
            other => panic!("expected a text frame, got {other:?}"),
        }
    }

    /// Next frame must be a close frame; returns its code and reason.
    pub async fn expect_close(&mut self) -> (u16, String) {
        match self.next_frame().await {
            Some(Message::Close(Some(frame))) => (frame.code, frame.reason.as_str().to_owned()),
            other => panic!("expected a close frame, got {other:?}"),
        }
    }

    /// No text frame arrives within `within`.
    pub async fn assert_silent(&mut self, within: Duration) {
        let received = tokio::time::timeout(within, async {
            loop {
                match self.from_server.next().await {
                    Some(Message::Ping(_)) | Some(Message::Pong(_)) => continue,
                    other => return other,
                }
            }
        })
        .await;
        if let Ok(frame) = received {
            panic!("expected no frame, got {frame:?}");
        }
    }

    /// Drop the connection without a close frame and wait for the session to end.
    pub async fn disconnect(mut self) {
        let task = self.task.take();
        drop(self);
        if let Some(task) = task {
            tokio::time::timeout(WAIT, task)
                .await
                .expect("session did not finish")
                .expect("session task panicked");
        }
    }

    /// Wait for the server side of the session to end.
    pub async fn finished(&mut self) {
        if let Some(task) = self.task.take() {
            tokio::time::timeout(WAIT, task)
                .await
                .expect("session did not finish")
                .expect("session task panicked");
        }
    }

    /// Count of pings received before the next non-ping frame.
    pub async fn count_pings_until_frame(&mut self) -> (usize, Option<Message>) {
        let mut pings = 0;
        loop {
            let frame = tokio::time::timeout(WAIT, self.from_server.next())
                .await
                .expect("timed out waiting for a frame");
            match frame {
                Some(Message::Ping(_)) => pings += 1,
                other => return (pings, other),
            }
        }
    }
}

/// A private message frame.
pub fn private_frame(to: i64, message: &str) -> Value {
    serde_json::json!({"type": "message", "to": to, "message": message})
}

/// A public message frame.
pub fn public_frame(message: &str) -> Value {
    serde_json::json!({"type": "message", "message": message})
}
