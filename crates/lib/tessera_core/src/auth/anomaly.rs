//! Origin comparison for bound sessions.

use std::net::{IpAddr, SocketAddr};

use super::AuthError;
use super::binding::{SessionBinding, SessionBindingStore};
use super::user_agent::parse_user_agent;
use crate::models::auth::Origin;

/// Result of comparing a request origin with the bound one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OriginCheck {
    Match,
    Mismatch,
    /// Nothing is bound for the identity (logged out, deauthorized or lapsed).
    Unbound,
}

/// Canonical textual form of a peer address.
///
/// Accepts bare IPs, `ip:port`, `[v6]:port` and `[v6]`. IPv4-mapped IPv6
/// addresses collapse to their IPv4 form. Anything unparsable is compared as
/// trimmed, lower-cased text.
pub fn normalize_address(raw: &str) -> String {
    let trimmed = raw.trim();
    let parsed = trimmed
        .parse::<IpAddr>()
        .ok()
        .or_else(|| trimmed.parse::<SocketAddr>().ok().map(|s| s.ip()))
        .or_else(|| {
            trimmed
                .strip_prefix('[')
                .and_then(|s| s.strip_suffix(']'))
                .and_then(|s| s.parse::<IpAddr>().ok())
        });
    match parsed {
        Some(ip) => ip.to_canonical().to_string(),
        None => trimmed.to_ascii_lowercase(),
    }
}

/// Whether two origins are the same device at the same address.
pub fn same_origin(bound: &Origin, current: &Origin) -> bool {
    normalize_address(&bound.address) == normalize_address(&current.address)
        && parse_user_agent(&bound.user_agent) == parse_user_agent(&current.user_agent)
}

#[derive(Clone)]
pub struct AnomalyDetector {
    bindings: SessionBindingStore,
}

impl AnomalyDetector {
    pub fn new(bindings: SessionBindingStore) -> Self {
        Self { bindings }
    }

    /// Compare `current` with the origin bound to `identity_id`.
    pub async fn check_origin(&self, identity_id: &str, current: &Origin) -> Result<OriginCheck, AuthError> {
        Ok(self.evaluate(identity_id, current).await?.0)
    }

    /// Like [`check_origin`](Self::check_origin), also returning the binding
    /// the decision was made against.
    pub async fn evaluate(
        &self,
        identity_id: &str,
        current: &Origin,
    ) -> Result<(OriginCheck, Option<SessionBinding>), AuthError> {
        let Some(binding) = self.bindings.get(identity_id).await? else {
            return Ok((OriginCheck::Unbound, None));
        };
        let check = if same_origin(&binding.origin(), current) {
            OriginCheck::Match
        } else {
            OriginCheck::Mismatch
        };
        Ok((check, Some(binding)))
    }
}
