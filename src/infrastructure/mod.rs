//! Infrastructure Layer
//!
//! Contains implementations for external services including:
//! - Database pool, migrations and PostgreSQL repositories
//! - The in-memory store for single-node setups and tests
//! - The broadcast bus (Redis pub/sub or in-process)
//! - JWT verification and invitation tokens
//! - Prometheus metrics

pub mod auth;
pub mod bus;
pub mod database;
pub mod memory_store;
pub mod metrics;
pub mod repositories;
