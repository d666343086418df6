//! Bearer token authentication
//!
//! Every request except those under an allow-listed path prefix must carry
//! `Authorization: Bearer <token>`. The token is checked by a
//! [`TokenVerifier`] and the resulting identity is attached to the request as
//! an [`AuthContext`] extension for the handler to read.

use async_trait::async_trait;
use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::Response,
};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, warn};

use modelgate_core::AuthSettings;

use crate::error::ApiError;

const BEARER_PREFIX: &str = "Bearer ";

/// Authentication failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("Missing Authorization header")]
    MissingCredentials,

    #[error("Invalid or expired token")]
    InvalidToken,

    #[error("Token expired or invalidated")]
    Revoked,

    #[error("Forbidden: {0}")]
    Forbidden(String),
}

/// Identity attached to an authenticated request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthContext {
    pub identity: String,
}

/// Validates a bearer token and resolves it to an identity
#[async_trait]
pub trait TokenVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Result<String, AuthError>;
}

/// Verifier backed by a fixed token table plus a revocation list
#[derive(Debug, Clone, Default)]
pub struct StaticTokenVerifier {
    tokens: HashMap<String, String>,
    revoked: HashSet<String>,
}

impl StaticTokenVerifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_settings(settings: &AuthSettings) -> Self {
        Self {
            tokens: settings
                .tokens
                .iter()
                .map(|entry| (entry.token.clone(), entry.identity.clone()))
                .collect(),
            revoked: settings.revoked.iter().cloned().collect(),
        }
    }

    pub fn with_token(mut self, token: impl Into<String>, identity: impl Into<String>) -> Self {
        self.tokens.insert(token.into(), identity.into());
        self
    }

    pub fn revoke(mut self, token: impl Into<String>) -> Self {
        self.revoked.insert(token.into());
        self
    }
}

#[async_trait]
impl TokenVerifier for StaticTokenVerifier {
    async fn verify(&self, token: &str) -> Result<String, AuthError> {
        // Revocation wins even if the token is still in the table
        if self.revoked.contains(token) {
            return Err(AuthError::Revoked);
        }
        self.tokens
            .get(token)
            .cloned()
            .ok_or(AuthError::InvalidToken)
    }
}

/// Extract the token from an `Authorization: Bearer <token>` header.
///
/// A bare `Bearer`, an empty token, or a token containing whitespace is
/// treated the same as a missing header.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let value = headers
        .get(AUTHORIZATION)
        .ok_or(AuthError::MissingCredentials)?
        .to_str()
        .map_err(|_| AuthError::MissingCredentials)?;

    let token = value
        .strip_prefix(BEARER_PREFIX)
        .ok_or(AuthError::MissingCredentials)?
        .trim();

    if token.is_empty() || token.contains(char::is_whitespace) {
        return Err(AuthError::MissingCredentials);
    }

    Ok(token)
}

/// Middleware state: the verifier and the unauthenticated path prefixes
#[derive(Clone)]
pub struct AuthGate {
    verifier: Arc<dyn TokenVerifier>,
    public_prefixes: Arc<Vec<String>>,
}

impl AuthGate {
    pub fn new(verifier: Arc<dyn TokenVerifier>, public_prefixes: Vec<String>) -> Self {
        Self {
            verifier,
            public_prefixes: Arc::new(public_prefixes),
        }
    }

    pub fn from_settings(settings: &AuthSettings) -> Self {
        Self::new(
            Arc::new(StaticTokenVerifier::from_settings(settings)),
            settings.public_prefixes.clone(),
        )
    }

    pub fn is_public(&self, path: &str) -> bool {
        self.public_prefixes
            .iter()
            .any(|prefix| path.starts_with(prefix.as_str()))
    }

    /// Resolve the identity for a request's headers
    pub async fn authenticate(&self, headers: &HeaderMap) -> Result<AuthContext, AuthError> {
        let token = bearer_token(headers)?;
        let identity = self.verifier.verify(token).await?;
        Ok(AuthContext { identity })
    }
}

/// Reject unauthenticated requests before they reach a handler
pub async fn require_bearer(
    State(gate): State<AuthGate>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let path = request.uri().path().to_string();

    if gate.is_public(&path) {
        return Ok(next.run(request).await);
    }

    let outcome = gate.authenticate(request.headers()).await;
    match outcome {
        Ok(context) => {
            debug!(path = %path, identity = %context.identity, "Request authenticated");
            request.extensions_mut().insert(context);
            Ok(next.run(request).await)
        }
        Err(AuthError::MissingCredentials) => {
            debug!(path = %path, "Rejected request without bearer token");
            Err(AuthError::MissingCredentials.into())
        }
        Err(e) => {
            warn!(path = %path, reason = %e, "Rejected request with bad bearer token");
            Err(e.into())
        }
    }
}
