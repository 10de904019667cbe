//! Admin authorization gate.
//!
//! Every `/admin/*` route except `/admin/grant` requires a bearer token that
//! the configured [`AdminGate`] maps to an identity carrying the admin flag.

use std::collections::HashMap;

use async_trait::async_trait;
use axum::http::StatusCode;
use serde::Serialize;

use crate::config::AdminEntry;

/// The caller behind a verified bearer token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct AdminIdentity {
    pub(crate) uid: String,
    pub(crate) email: Option<String>,
    pub(crate) admin: bool,
}

impl AdminIdentity {
    pub(crate) fn is_admin(&self) -> bool {
        self.admin
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub(crate) enum AuthError {
    #[error("Missing token")]
    MissingToken,
    #[error("Invalid token")]
    InvalidToken,
    #[error("Admin only")]
    NotAdmin,
}

impl AuthError {
    pub(crate) fn status(&self) -> StatusCode {
        match self {
            AuthError::MissingToken | AuthError::InvalidToken => StatusCode::UNAUTHORIZED,
            AuthError::NotAdmin => StatusCode::FORBIDDEN,
        }
    }
}

/// Verifies bearer tokens.
#[async_trait]
pub(crate) trait AdminGate: Send + Sync {
    async fn verify(&self, token: &str) -> Result<AdminIdentity, AuthError>;
}

/// Gate backed by the `[[admins]]` entries of the configuration.
pub(crate) struct StaticTokenGate {
    tokens: HashMap<String, AdminIdentity>,
}

impl StaticTokenGate {
    pub(crate) fn from_entries(entries: &[AdminEntry]) -> Self {
        let tokens = entries
            .iter()
            .map(|entry| {
                (
                    entry.token.clone(),
                    AdminIdentity {
                        uid: entry.uid.clone(),
                        email: entry.email.clone(),
                        admin: entry.admin,
                    },
                )
            })
            .collect();
        Self { tokens }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

#[async_trait]
impl AdminGate for StaticTokenGate {
    async fn verify(&self, token: &str) -> Result<AdminIdentity, AuthError> {
        self.tokens
            .get(token)
            .cloned()
            .ok_or(AuthError::InvalidToken)
    }
}

/// Pull the token out of an `Authorization: Bearer <token>` header value.
pub(crate) fn bearer_token(header: Option<&str>) -> Result<&str, AuthError> {
    header
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(AuthError::MissingToken)
}

/// Run the full check: token present, known, and admin.
pub(crate) async fn authorize(
    gate: &dyn AdminGate,
    header: Option<&str>,
) -> Result<AdminIdentity, AuthError> {
    let token = bearer_token(header)?;
    let identity = gate.verify(token).await?;
    if !identity.is_admin() {
        return Err(AuthError::NotAdmin);
    }
    Ok(identity)
}
