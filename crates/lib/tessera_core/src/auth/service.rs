//! Authentication service: register/login/refresh/verify/logout flows.
//!
//! `AuthService` is the only component callers talk to. Its dependencies
//! (credential store, shared cache, audit sink and signing key) are injected
//! once at startup and shared by every request task; the service itself
//! holds no mutable state.
//!
//! Session states, seen from here:
//! `Unauthenticated -> Authenticated(bound) -> {Authenticated(bound), Invalidated}`.

use std::future::Future;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::AuthError;
use super::anomaly::{AnomalyDetector, OriginCheck};
use super::binding::{SessionBinding, SessionBindingStore};
use super::gateway::{CredentialGateway, CredentialStore};
use super::jwt::{SigningKey, TokenIssuer, fingerprint};
use super::revocation::{RevocationLedger, short};
use super::throttle::FailedLoginThrottle;
use crate::audit::{
    ACTION_DEAUTHORIZE, ACTION_REVOKED_TOKEN, ACTION_SESSION_ANOMALY, AuditEvent, AuditSink,
};
use crate::cache::KvCache;
use crate::config::AuthConfig;
use crate::models::auth::{Identity, Origin, TokenClaims, TokenKind, TokenPair};

/// Result of a successful register or login.
#[derive(Debug, Clone)]
pub struct Session {
    pub identity: Identity,
    pub tokens: TokenPair,
}

/// Outcome of [`AuthService::verify_session`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Verified,
    /// The session is gone; the caller must re-authenticate.
    Invalidated,
}

#[derive(Clone)]
pub struct AuthService {
    gateway: CredentialGateway,
    issuer: TokenIssuer,
    ledger: RevocationLedger,
    bindings: SessionBindingStore,
    detector: AnomalyDetector,
    audit: Arc<dyn AuditSink>,
    config: AuthConfig,
}

impl AuthService {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        cache: Arc<dyn KvCache>,
        audit: Arc<dyn AuditSink>,
        key: &SigningKey,
        config: AuthConfig,
    ) -> Self {
        let issuer = TokenIssuer::new(key, config.access_ttl_secs, config.refresh_ttl_secs);
        let throttle = FailedLoginThrottle::new(
            cache.clone(),
            audit.clone(),
            config.failed_login_threshold,
            config.failed_login_window_secs,
        );
        let bindings = SessionBindingStore::new(cache.clone());
        Self {
            gateway: CredentialGateway::new(store, throttle, config.bcrypt_cost),
            ledger: RevocationLedger::new(cache, issuer.clone()),
            detector: AnomalyDetector::new(bindings.clone()),
            bindings,
            issuer,
            audit,
            config,
        }
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    pub fn issuer(&self) -> &TokenIssuer {
        &self.issuer
    }

    pub fn ledger(&self) -> &RevocationLedger {
        &self.ledger
    }

    pub fn bindings(&self) -> &SessionBindingStore {
        &self.bindings
    }

    pub fn throttle(&self) -> &FailedLoginThrottle {
        self.gateway.throttle()
    }

    // -----------------------------------------------------------------------
    // Entry
    // -----------------------------------------------------------------------

    /// Create an identity and open a session for it.
    ///
    /// Username and email uniqueness are both checked before the identity is
    /// created and before any token exists.
    pub async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
        origin: &Origin,
    ) -> Result<Session, AuthError> {
        let identity = self.gateway.enroll(username, email, password).await?;
        info!(identity = %identity.id, username, "identity registered");
        self.open_session(identity, origin).await
    }

    /// Check credentials and open a session.
    pub async fn login(&self, username: &str, password: &str, origin: &Origin) -> Result<Session, AuthError> {
        let identity = self.gateway.verify(username, password).await?;
        info!(identity = %identity.id, username, "login succeeded");
        self.open_session(identity, origin).await
    }

    async fn open_session(&self, identity: Identity, origin: &Origin) -> Result<Session, AuthError> {
        let tokens = self.issuer.issue(&identity)?;
        let refresh = self.issuer.verify(&tokens.refresh_token, TokenKind::Refresh)?;
        let binding = SessionBinding::new(origin, fingerprint(&tokens.refresh_token), refresh.exp);
        self.write_binding(identity.id.to_string(), binding, self.config.refresh_ttl_secs)
            .await?;
        Ok(Session { identity, tokens })
    }

    // -----------------------------------------------------------------------
    // Verification
    // -----------------------------------------------------------------------

    /// Compare the request origin with the session's bound origin.
    ///
    /// A mismatch is not an error: the active refresh token is revoked, the
    /// binding is cleared, a `warn` audit event is emitted and the caller is
    /// told the session is invalidated.
    pub async fn verify_session(&self, identity_id: Uuid, origin: &Origin) -> Result<SessionStatus, AuthError> {
        let id = identity_id.to_string();
        let (check, binding) = self.detector.evaluate(&id, origin).await?;
        match (check, binding) {
            (OriginCheck::Match, _) => Ok(SessionStatus::Verified),
            (OriginCheck::Mismatch, Some(binding)) => {
                warn!(identity = %id, bound = %binding.address, observed = %origin.address, "session origin mismatch");
                self.tear_down(&id, Some(&binding)).await?;
                self.audit.record(
                    AuditEvent::warn(
                        ACTION_SESSION_ANOMALY,
                        format!(
                            "session bound to {} ({}) used from {} ({}); forced logout",
                            binding.address, binding.user_agent, origin.address, origin.user_agent
                        ),
                    )
                    .with_identity(&id)
                    .with_outcome("invalidated"),
                );
                Ok(SessionStatus::Invalidated)
            }
            (OriginCheck::Mismatch, None) | (OriginCheck::Unbound, _) => {
                debug!(identity = %id, "no session bound");
                Ok(SessionStatus::Invalidated)
            }
        }
    }

    /// Check a bearer access token: signature, expiry, kind and revocation.
    pub async fn authenticate_access(&self, access_token: &str, origin: &Origin) -> Result<TokenClaims, AuthError> {
        let claims = self.verify_token(access_token, TokenKind::Access, origin).await?;
        Ok(claims)
    }

    async fn verify_token(&self, token: &str, kind: TokenKind, origin: &Origin) -> Result<TokenClaims, AuthError> {
        let claims = match self.issuer.verify(token, kind) {
            Ok(claims) => claims,
            Err(e) => {
                debug!(kind = %kind, reason = %e, "token rejected");
                return Err(AuthError::InvalidToken);
            }
        };
        if self.ledger.is_revoked(token).await? {
            self.report_revoked(token, &claims, origin);
            return Err(AuthError::Revoked);
        }
        Ok(claims)
    }

    fn report_revoked(&self, token: &str, claims: &TokenClaims, origin: &Origin) {
        let fp = fingerprint(token);
        info!(identity = %claims.sub, token = short(&fp), "revoked token presented");
        self.audit.record(
            AuditEvent::warn(
                ACTION_REVOKED_TOKEN,
                format!(
                    "revoked {} token presented from {} ({})",
                    claims.kind, origin.address, origin.user_agent
                ),
            )
            .with_identity(&claims.sub)
            .with_outcome("rejected"),
        );
    }

    // -----------------------------------------------------------------------
    // Refresh
    // -----------------------------------------------------------------------

    /// Exchange a refresh token for a new access token.
    ///
    /// Without rotation the same refresh token is handed back. With rotation
    /// the presented token is revoked and a new pair is issued.
    ///
    /// A refresh never re-homes a session. If the presented token is the one
    /// bound to the identity, the binding is rewritten with its origin kept
    /// and its TTL renewed; a token from an older, superseded session leaves
    /// the live binding alone; with no binding at all the current origin is
    /// bound.
    pub async fn refresh(&self, refresh_token: &str, origin: &Origin) -> Result<TokenPair, AuthError> {
        let claims = self.verify_token(refresh_token, TokenKind::Refresh, origin).await?;
        let identity_id = claims.subject_id().ok_or(AuthError::InvalidToken)?;
        let identity = match self.gateway.store().find_by_id(identity_id).await? {
            Some(stored) => stored.identity,
            None => {
                debug!(identity = %identity_id, "refresh for unknown identity");
                return Err(AuthError::InvalidToken);
            }
        };

        if self.config.rotate_refresh {
            return self.rotate(identity, refresh_token, &claims, origin).await;
        }

        let access_token = self.issuer.issue_access(&identity)?;
        let remaining = claims.remaining_secs(Utc::now()).ok_or(AuthError::InvalidToken)?;
        let presented = fingerprint(refresh_token);
        let id = identity.id.to_string();
        let rebound = match self.bindings.get(&id).await? {
            Some(b) if b.refresh_fingerprint == presented => Some(b),
            Some(_) => None,
            None => Some(SessionBinding::new(origin, presented, claims.exp)),
        };
        if let Some(binding) = rebound {
            self.write_binding(id, binding, remaining).await?;
        }
        Ok(TokenPair {
            access_token,
            refresh_token: refresh_token.to_string(),
            access_expires_in: self.issuer.access_ttl_secs() as i64,
            refresh_expires_in: remaining as i64,
        })
    }

    /// Claim the presented refresh token on the blocklist, then issue a new
    /// pair. Of several refreshes racing with one token only the claimant
    /// gets a pair; the rest fail as revoked.
    async fn rotate(
        &self,
        identity: Identity,
        refresh_token: &str,
        claims: &TokenClaims,
        origin: &Origin,
    ) -> Result<TokenPair, AuthError> {
        let old_fp = fingerprint(refresh_token);
        let ledger = self.ledger.clone();
        let fp = old_fp.clone();
        let exp = claims.exp;
        let claimed = detached(async move { ledger.claim_fingerprint(&fp, exp).await }).await?;
        if !claimed {
            self.report_revoked(refresh_token, claims, origin);
            return Err(AuthError::Revoked);
        }

        let tokens = self.issuer.issue(&identity)?;
        let new_claims = self.issuer.verify(&tokens.refresh_token, TokenKind::Refresh)?;
        let new_fp = fingerprint(&tokens.refresh_token);
        let id = identity.id.to_string();
        let rebound = match self.bindings.get(&id).await? {
            Some(b) if b.refresh_fingerprint == old_fp => Some(SessionBinding {
                refresh_fingerprint: new_fp,
                refresh_expires_at: new_claims.exp,
                ..b
            }),
            Some(_) => None,
            None => Some(SessionBinding::new(origin, new_fp, new_claims.exp)),
        };
        if let Some(binding) = rebound {
            self.write_binding(id, binding, self.config.refresh_ttl_secs).await?;
        }
        debug!(identity = %identity.id, "refresh token rotated");
        Ok(tokens)
    }

    // -----------------------------------------------------------------------
    // Exit
    // -----------------------------------------------------------------------

    /// Revoke a refresh token and end the session it belongs to.
    ///
    /// Only refresh tokens are accepted. The binding is cleared only when it
    /// points at this token; logging out a superseded token leaves the live
    /// session alone. Revoking an already revoked or expired token succeeds.
    pub async fn logout(&self, refresh_token: &str) -> Result<(), AuthError> {
        let claims = self.issuer.decode_allow_expired(refresh_token)?;
        if claims.kind != TokenKind::Refresh {
            debug!(kind = %claims.kind, "logout rejected, not a refresh token");
            return Err(AuthError::InvalidToken);
        }
        let presented = fingerprint(refresh_token);
        let current = self.bindings.get(&claims.sub).await?;

        let ledger = self.ledger.clone();
        let token = refresh_token.to_string();
        detached(async move { ledger.revoke(&token).await.map(|_| ()) }).await?;

        match current {
            Some(binding) if binding.refresh_fingerprint == presented => {
                let bindings = self.bindings.clone();
                let id = claims.sub.clone();
                detached(async move { bindings.clear(&id).await }).await?;
                info!(identity = %claims.sub, "logged out");
            }
            _ => debug!(
                identity = %claims.sub,
                token = short(&presented),
                "logged out a token not bound to the live session"
            ),
        }
        Ok(())
    }

    /// Revoke whatever session `identity_id` has and clear its binding.
    pub async fn deauthorize_identity(&self, identity_id: Uuid) -> Result<(), AuthError> {
        let id = identity_id.to_string();
        let binding = self.bindings.get(&id).await?;
        let had_session = binding.is_some();
        self.tear_down(&id, binding.as_ref()).await?;
        self.audit.record(
            AuditEvent::info(
                ACTION_DEAUTHORIZE,
                if had_session {
                    "active session revoked"
                } else {
                    "no active session"
                },
            )
            .with_identity(&id)
            .with_outcome("success"),
        );
        info!(identity = %id, had_session, "identity deauthorized");
        Ok(())
    }

    /// Remove an identity from the credential store and kill its session.
    pub async fn delete_identity(&self, identity_id: Uuid) -> Result<Option<Identity>, AuthError> {
        let removed = self.gateway.store().remove(identity_id).await?;
        self.deauthorize_identity(identity_id).await?;
        Ok(removed)
    }

    async fn tear_down(&self, identity_id: &str, binding: Option<&SessionBinding>) -> Result<(), AuthError> {
        if let Some(binding) = binding {
            let ledger = self.ledger.clone();
            let fp = binding.refresh_fingerprint.clone();
            let exp = binding.refresh_expires_at;
            detached(async move { ledger.revoke_fingerprint(&fp, exp).await.map(|_| ()) }).await?;
        }
        let bindings = self.bindings.clone();
        let id = identity_id.to_string();
        detached(async move { bindings.clear(&id).await }).await
    }

    async fn write_binding(&self, identity_id: String, binding: SessionBinding, ttl_secs: u64) -> Result<(), AuthError> {
        let bindings = self.bindings.clone();
        detached(async move { bindings.bind(&identity_id, &binding, ttl_secs).await }).await
    }
}

/// Run a security-relevant cache write on its own task and wait for it.
///
/// If the caller's future is dropped mid-way, the spawned write still runs
/// to completion, so a revoke or bind is never left half-done.
async fn detached<T, F>(write: F) -> Result<T, AuthError>
where
    T: Send + 'static,
    F: Future<Output = Result<T, AuthError>> + Send + 'static,
{
    tokio::spawn(write)
        .await
        .map_err(|e| AuthError::Internal(format!("detached write: {e}")))?
}
