//! JWT Authentication
//!
//! Verifies the bearer credentials issued by the account service and signs
//! chat invitation tokens. Both token kinds share the configured secret but
//! carry disjoint claim sets, so one can never be accepted as the other.

use axum::http::{header::AUTHORIZATION, HeaderMap};
use axum_extra::extract::CookieJar;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, errors::ErrorKind, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::config::JwtSettings;

/// Cookie carrying `Bearer <token>` for browser WebSocket clients.
pub const AUTH_COOKIE: &str = "Authorization";

const INVITE_TOKEN_TYPE: &str = "chat-invitation";

/// Access token claims
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issued at time (Unix timestamp)
    pub iat: i64,
}

/// Chat invitation token claims
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct InviteClaims {
    #[serde(rename = "type")]
    pub kind: String,
    pub chat_id: i64,
    pub exp: i64,
    pub iat: i64,
}

/// Authentication errors
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("Missing credentials")]
    MissingCredentials,

    #[error("Token expired")]
    TokenExpired,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Token generation failed: {0}")]
    Signing(String),
}

/// Signs and verifies JWTs with the configured secret.
#[derive(Clone)]
pub struct JwtAuthenticator {
    encoding: EncodingKey,
    decoding: DecodingKey,
    invite_ttl: Duration,
}

impl JwtAuthenticator {
    pub fn new(settings: &JwtSettings) -> Self {
        Self {
            encoding: EncodingKey::from_secret(settings.secret.as_bytes()),
            decoding: DecodingKey::from_secret(settings.secret.as_bytes()),
            invite_ttl: Duration::seconds(settings.invite_token_expiry_secs),
        }
    }

    /// Issue an access token for `user_id`. Access tokens normally come from
    /// the account service; this exists for tooling and tests.
    pub fn issue_access_token(&self, user_id: i64, ttl: Duration) -> Result<String, AuthError> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id.to_string(),
            exp: (now + ttl).timestamp(),
            iat: now.timestamp(),
        };
        encode(&Header::default(), &claims, &self.encoding)
            .map_err(|e| AuthError::Signing(e.to_string()))
    }

    /// Validate an access token and return the authenticated user id.
    pub fn verify_access_token(&self, token: &str) -> Result<i64, AuthError> {
        let data = decode::<Claims>(token, &self.decoding, &Validation::default())
            .map_err(classify)?;

        data.claims.sub.parse().map_err(|_| AuthError::InvalidToken)
    }

    /// Issue an invitation token granting entry to `chat_id`.
    pub fn issue_invite_token(&self, chat_id: i64) -> Result<String, AuthError> {
        let now = Utc::now();
        let claims = InviteClaims {
            kind: INVITE_TOKEN_TYPE.to_owned(),
            chat_id,
            exp: (now + self.invite_ttl).timestamp(),
            iat: now.timestamp(),
        };
        encode(&Header::default(), &claims, &self.encoding)
            .map_err(|e| AuthError::Signing(e.to_string()))
    }

    /// Check that `token` is a live invitation to exactly `chat_id`.
    pub fn verify_invite_token(&self, token: &str, chat_id: i64) -> Result<(), AuthError> {
        let data = decode::<InviteClaims>(token, &self.decoding, &Validation::default())
            .map_err(classify)?;

        if data.claims.kind != INVITE_TOKEN_TYPE || data.claims.chat_id != chat_id {
            return Err(AuthError::InvalidToken);
        }
        Ok(())
    }

    /// Authenticate a request from its bearer header or auth cookie.
    pub fn authenticate(&self, headers: &HeaderMap) -> Result<i64, AuthError> {
        let token = bearer_token(headers).ok_or(AuthError::MissingCredentials)?;
        self.verify_access_token(&token)
    }
}

fn classify(err: jsonwebtoken::errors::Error) -> AuthError {
    match err.kind() {
        ErrorKind::ExpiredSignature => AuthError::TokenExpired,
        _ => AuthError::InvalidToken,
    }
}

/// The bearer token from the `Authorization` header, falling back to the
/// `Authorization` cookie browsers can attach to WebSocket upgrades.
pub fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let from_header = headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(strip_bearer)
        .map(str::to_owned);

    from_header.or_else(|| {
        CookieJar::from_headers(headers)
            .get(AUTH_COOKIE)
            .and_then(|c| strip_bearer(c.value()).map(str::to_owned))
    })
}

fn strip_bearer(value: &str) -> Option<&str> {
    value
        .strip_prefix("Bearer ")
        .or_else(|| value.strip_prefix("Bearer%20"))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}
