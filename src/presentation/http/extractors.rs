//! Custom Extractors
//!
//! Axum extractors for authentication and request parsing.

use axum::{extract::FromRequestParts, http::request::Parts};

use crate::shared::error::AppError;
use crate::startup::AppState;

/// Authenticated user extracted from the bearer token (header or cookie).
#[derive(Debug, Clone, Copy)]
pub struct AuthUser {
    pub user_id: i64,
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let user_id = state.auth.authenticate(&parts.headers).map_err(|e| {
            tracing::debug!(error = %e, "Rejected request credentials");
            AppError::Unauthorized("Invalid credentials.".into())
        })?;

        Ok(AuthUser { user_id })
    }
}
