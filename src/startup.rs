//! Application Startup
//!
//! Backend selection, state wiring and server initialization.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use sqlx::PgPool;
use tokio::net::TcpListener;

use crate::application::services::{ChatService, MessageStore};
use crate::config::{BusBackend, Settings, StorageBackend};
use crate::domain::services::MembershipAuthorizer;
use crate::domain::{ChatRepository, MembershipRepository, MessageRepository, UserRepository};
use crate::infrastructure::auth::JwtAuthenticator;
use crate::infrastructure::bus::{BroadcastBus, MemoryBus, RedisBus};
use crate::infrastructure::database;
use crate::infrastructure::memory_store::MemoryStore;
use crate::infrastructure::repositories::{
    PgChatRepository, PgMembershipRepository, PgMessageRepository, PgUserRepository,
};
use crate::presentation::http::handlers::health;
use crate::presentation::http::routes;
use crate::presentation::middleware::{cors, logging};
use crate::presentation::websocket::{MessagingContext, SessionRunner};
use crate::shared::snowflake::SnowflakeGenerator;

/// Repositories backing the application
#[derive(Clone)]
pub struct Store {
    pub chats: Arc<dyn ChatRepository>,
    pub memberships: Arc<dyn MembershipRepository>,
    pub messages: Arc<dyn MessageRepository>,
    pub users: Arc<dyn UserRepository>,
}

impl Store {
    /// PostgreSQL repositories sharing one pool
    pub fn postgres(pool: PgPool) -> Self {
        Self {
            chats: Arc::new(PgChatRepository::new(pool.clone())),
            memberships: Arc::new(PgMembershipRepository::new(pool.clone())),
            messages: Arc::new(PgMessageRepository::new(pool.clone())),
            users: Arc::new(PgUserRepository::new(pool)),
        }
    }

    /// Process-local store
    pub fn memory(store: Arc<MemoryStore>) -> Self {
        Self {
            chats: store.clone(),
            memberships: store.clone(),
            messages: store.clone(),
            users: store,
        }
    }
}

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub auth: JwtAuthenticator,
    pub bus: Arc<dyn BroadcastBus>,
    pub chat_service: ChatService,
    pub messaging: MessagingContext,
    pub sessions: SessionRunner,
}

impl AppState {
    /// Wire services on top of the selected store and bus.
    pub fn new(settings: Settings, store: Store, bus: Arc<dyn BroadcastBus>) -> Self {
        let ids = Arc::new(SnowflakeGenerator::new(
            settings.snowflake.machine_id,
            settings.snowflake.epoch,
        ));
        let auth = JwtAuthenticator::new(&settings.jwt);
        let authorizer = MembershipAuthorizer::new(store.memberships.clone(), store.users.clone());
        let message_store = MessageStore::new(store.chats.clone(), store.messages.clone(), ids.clone());

        let chat_service = ChatService::new(
            store.chats.clone(),
            store.memberships.clone(),
            message_store.clone(),
            authorizer.clone(),
            auth.clone(),
            bus.clone(),
            ids,
        );

        let messaging = MessagingContext {
            store: message_store,
            users: store.users.clone(),
            memberships: store.memberships.clone(),
            authorizer,
            bus: bus.clone(),
        };

        let sessions = SessionRunner::new(
            bus.clone(),
            settings.websocket.heartbeat_interval(),
            settings.websocket.idle_timeout(),
        );

        Self {
            settings: Arc::new(settings),
            auth,
            bus,
            chat_service,
            messaging,
            sessions,
        }
    }
}

/// Build the router with every middleware layer applied
pub fn build_router(state: AppState) -> Router {
    let cors_layer = cors::create_cors_layer(&state.settings.cors);
    routes::create_router(state)
        .layer(logging::create_trace_layer())
        .layer(cors_layer)
}

/// Application instance
pub struct Application {
    listener: TcpListener,
    router: Router,
}

impl Application {
    /// Build the application from settings
    pub async fn build(settings: Settings) -> Result<Self> {
        health::init_server_start();

        let store = match settings.storage.backend {
            StorageBackend::Postgres => {
                let pool = database::create_pool(&settings.database)
                    .await
                    .context("Failed to connect to PostgreSQL")?;
                tracing::info!("Database connection pool created");

                if settings.database.run_migrations {
                    database::run_migrations(&pool)
                        .await
                        .context("Failed to run database migrations")?;
                    tracing::info!("Database migrations applied");
                }
                Store::postgres(pool)
            }
            StorageBackend::Memory => {
                tracing::warn!("Using the in-memory store; data is lost on restart");
                Store::memory(Arc::new(MemoryStore::new()))
            }
        };

        let bus: Arc<dyn BroadcastBus> = match settings.bus.backend {
            BusBackend::Redis => {
                let bus = RedisBus::connect(&settings.redis)
                    .await
                    .context("Failed to connect to Redis")?;
                tracing::info!("Redis connection established");
                Arc::new(bus)
            }
            BusBackend::Memory => {
                tracing::warn!("Using the in-memory bus; messages do not reach other server processes");
                Arc::new(MemoryBus::new(settings.bus.channel_capacity))
            }
        };

        let addr = settings.server_addr();
        let router = build_router(AppState::new(settings, store, bus));

        let listener = TcpListener::bind(&addr)
            .await
            .with_context(|| format!("Failed to bind {}", addr))?;
        tracing::info!("Listening on {}", addr);

        Ok(Self { listener, router })
    }

    /// Run the server until a shutdown signal arrives
    pub async fn run_until_stopped(self) -> Result<()> {
        axum::serve(self.listener, self.router)
            .with_graceful_shutdown(shutdown_signal())
            .await?;
        tracing::info!("Server stopped");
        Ok(())
    }

    /// Get the bound address
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }
}

/// Resolves on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, draining connections");
}
