//! Authentication and session lifecycle.
//!
//! Leaf components first: password hashing and the credential gateway,
//! the token issuer, the revocation ledger, session bindings with their
//! anomaly detector, and the failed-login throttle. [`service::AuthService`]
//! composes them and is the only entry point callers need.

pub mod anomaly;
pub mod binding;
pub mod gateway;
pub mod jwt;
pub mod password;
pub mod revocation;
pub mod service;
pub mod store;
pub mod throttle;
pub mod user_agent;

use thiserror::Error;

use crate::cache::CacheError;

/// Authentication errors.
///
/// `InvalidCredentials`, `Conflict`, `Validation`, `InvalidToken` and
/// `Revoked` are ordinary user-facing outcomes. Only `DependencyUnavailable`
/// and `Internal` are server faults.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid token")]
    InvalidToken,

    #[error("Token revoked")]
    Revoked,

    #[error("Dependency unavailable: {0}")]
    DependencyUnavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// What a caller is told. Which defence fired stays in the audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    Unauthorized,
    Conflict,
    Invalid,
    ServerError,
}

impl AuthError {
    pub fn rejection(&self) -> Rejection {
        match self {
            AuthError::InvalidCredentials | AuthError::InvalidToken | AuthError::Revoked => {
                Rejection::Unauthorized
            }
            AuthError::Conflict(_) => Rejection::Conflict,
            AuthError::Validation(_) => Rejection::Invalid,
            AuthError::DependencyUnavailable(_) | AuthError::Internal(_) => {
                Rejection::ServerError
            }
        }
    }

    pub fn is_server_fault(&self) -> bool {
        self.rejection() == Rejection::ServerError
    }
}

impl From<CacheError> for AuthError {
    fn from(e: CacheError) -> Self {
        AuthError::DependencyUnavailable(e.to_string())
    }
}

impl From<jwt::TokenError> for AuthError {
    fn from(e: jwt::TokenError) -> Self {
        match e {
            jwt::TokenError::Signing(msg) => AuthError::Internal(msg),
            _ => AuthError::InvalidToken,
        }
    }
}

impl From<gateway::StoreError> for AuthError {
    fn from(e: gateway::StoreError) -> Self {
        match e {
            gateway::StoreError::Duplicate(what) => AuthError::Conflict(what),
            gateway::StoreError::Unavailable(msg) => AuthError::DependencyUnavailable(msg),
        }
    }
}
