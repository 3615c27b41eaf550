use std::collections::HashSet;

use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use thiserror::Error;
use tracing::debug;

use crate::http::{ApiError, AppState};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub token: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("missing bearer token")]
    Missing,
    #[error("invalid authentication credentials")]
    Invalid,
}

pub trait Authenticator: Send + Sync {
    fn verify(&self, credential: &str) -> Result<Identity, AuthError>;
}

/// Bearer tokens from a fixed allowlist. An empty allowlist accepts any non-empty token.
#[derive(Debug, Clone, Default)]
pub struct TokenAuthenticator {
    allowed: HashSet<String>,
}

impl TokenAuthenticator {
    pub fn new(tokens: impl IntoIterator<Item = String>) -> Self {
        Self {
            allowed: tokens.into_iter().filter(|t| !t.trim().is_empty()).collect(),
        }
    }
}

impl Authenticator for TokenAuthenticator {
    fn verify(&self, credential: &str) -> Result<Identity, AuthError> {
        let token = credential.trim();
        if token.is_empty() {
            return Err(AuthError::Missing);
        }
        if !self.allowed.is_empty() && !self.allowed.contains(token) {
            return Err(AuthError::Invalid);
        }
        Ok(Identity {
            token: token.to_string(),
        })
    }
}

/// Rejects requests without a valid `Authorization: Bearer` header.
pub async fn require_bearer(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let header = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(AuthError::Missing)?;
    let credential = header
        .strip_prefix("Bearer ")
        .or_else(|| header.strip_prefix("bearer "))
        .ok_or(AuthError::Invalid)?;

    let identity = state.auth.verify(credential)?;
    debug!(path = %req.uri().path(), "authenticated");
    req.extensions_mut().insert(identity);
    Ok(next.run(req).await)
}
