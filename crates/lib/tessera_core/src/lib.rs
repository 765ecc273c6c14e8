//! # tessera_core
//!
//! Authentication and session-lifecycle engine for Tessera.
//!
//! Issues and verifies access/refresh tokens, keeps a TTL-indexed revocation
//! ledger, binds sessions to the origin they were opened from and tears them
//! down when a request arrives from somewhere else, and flags brute-force
//! login attempts. All mutable state lives behind the [`cache::KvCache`]
//! trait so that every process sharing a cache sees the same revocations.

pub mod audit;
pub mod auth;
pub mod cache;
pub mod config;
pub mod models;
pub mod transport;

pub use auth::AuthError;
pub use auth::service::{AuthService, Session, SessionStatus};
pub use config::AuthConfig;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
