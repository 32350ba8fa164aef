//! # Chatapp Server Library
//!
//! Real-time messaging core of a chat backend:
//! - Private chats, created on first contact, over WebSockets
//! - Public chats with memberships, admins and an owner
//! - A notification socket per user
//! - Topic fan-out over Redis pub/sub (or in-process for a single node)
//! - PostgreSQL message store (or in-memory for development and tests)
//!
//! ## Architecture
//!
//! The crate follows Clean Architecture principles:
//!
//! - **Domain Layer**: Entities, repository traits, topics and the membership authorizer
//! - **Application Layer**: Message store and chat administration services, DTOs
//! - **Infrastructure Layer**: Database, broadcast bus, JWT and metrics implementations
//! - **Presentation Layer**: HTTP handlers and WebSocket sessions
//!
//! ## Module Structure
//!
//! ```text
//! chatapp_server/
//! +-- config/         Configuration management
//! +-- domain/         Domain entities, value objects, and traits
//! +-- application/    Application services and DTOs
//! +-- infrastructure/ Store, bus, auth and metrics implementations
//! +-- presentation/   HTTP routes and WebSocket handlers
//! +-- shared/         Common utilities (errors, snowflake IDs, validation)
//! ```

// Configuration module
pub mod config;

// Domain layer - Core business logic
pub mod domain;

// Application layer - Business services
pub mod application;

// Infrastructure layer - External implementations
pub mod infrastructure;

// Presentation layer - HTTP and WebSocket handlers
pub mod presentation;

// Shared utilities
pub mod shared;

// Application startup and state management
pub mod startup;

// Telemetry and observability
pub mod telemetry;
