//! JWT token issuance and verification.
//!
//! Access and refresh tokens are both HS256 JWTs signed with one
//! process-wide key. Verification here is stateless: signature, schema,
//! expiry and kind. Revocation is layered on top by the ledger.

use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use rand::distr::Alphanumeric;
use rand::{Rng, rng};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::models::auth::{Identity, TokenClaims, TokenKind, TokenPair};

/// Length of generated signing secrets.
const GENERATED_SECRET_LEN: usize = 64;

/// Token verification errors.
#[derive(Debug, Error)]
pub enum TokenError {
    #[error("token expired")]
    Expired,

    #[error("bad token signature")]
    BadSignature,

    #[error("malformed token: {0}")]
    Malformed(String),

    #[error("expected {expected} token, got {found}")]
    WrongKind { expected: TokenKind, found: TokenKind },

    #[error("jwt encode: {0}")]
    Signing(String),
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(e: jsonwebtoken::errors::Error) -> Self {
        match e.kind() {
            ErrorKind::ExpiredSignature => TokenError::Expired,
            ErrorKind::InvalidSignature => TokenError::BadSignature,
            _ => TokenError::Malformed(e.to_string()),
        }
    }
}

/// HMAC signing secret. `Debug` never prints the bytes.
#[derive(Clone)]
pub struct SigningKey(Vec<u8>);

impl SigningKey {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self(secret.as_ref().to_vec())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl std::fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("SigningKey").field(&"<redacted>").finish()
    }
}

/// SHA-256 hex fingerprint of a token. Used wherever a token must be named
/// without storing or logging the token itself.
pub fn fingerprint(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Mints and verifies access/refresh tokens.
#[derive(Clone)]
pub struct TokenIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    access_ttl_secs: u64,
    refresh_ttl_secs: u64,
}

impl std::fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenIssuer")
            .field("access_ttl_secs", &self.access_ttl_secs)
            .field("refresh_ttl_secs", &self.refresh_ttl_secs)
            .finish_non_exhaustive()
    }
}

impl TokenIssuer {
    pub fn new(key: &SigningKey, access_ttl_secs: u64, refresh_ttl_secs: u64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(key.as_bytes()),
            decoding: DecodingKey::from_secret(key.as_bytes()),
            access_ttl_secs,
            refresh_ttl_secs,
        }
    }

    pub fn access_ttl_secs(&self) -> u64 {
        self.access_ttl_secs
    }

    pub fn refresh_ttl_secs(&self) -> u64 {
        self.refresh_ttl_secs
    }

    /// Mint an access/refresh pair for `identity`.
    pub fn issue(&self, identity: &Identity) -> Result<TokenPair, TokenError> {
        self.issue_at(identity, Utc::now())
    }

    /// Mint a pair as if the current time were `now`.
    pub fn issue_at(&self, identity: &Identity, now: DateTime<Utc>) -> Result<TokenPair, TokenError> {
        Ok(TokenPair {
            access_token: self.sign(identity, TokenKind::Access, now)?,
            refresh_token: self.sign(identity, TokenKind::Refresh, now)?,
            access_expires_in: self.access_ttl_secs as i64,
            refresh_expires_in: self.refresh_ttl_secs as i64,
        })
    }

    /// Mint a lone access token (refresh without rotation).
    pub fn issue_access(&self, identity: &Identity) -> Result<String, TokenError> {
        self.sign(identity, TokenKind::Access, Utc::now())
    }

    fn sign(&self, identity: &Identity, kind: TokenKind, now: DateTime<Utc>) -> Result<String, TokenError> {
        let ttl = match kind {
            TokenKind::Access => self.access_ttl_secs,
            TokenKind::Refresh => self.refresh_ttl_secs,
        };
        let claims = TokenClaims {
            sub: identity.id.to_string(),
            username: identity.username.clone(),
            iat: now.timestamp(),
            exp: (now + Duration::seconds(ttl as i64)).timestamp(),
            kind,
            jti: Uuid::new_v4().to_string(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| TokenError::Signing(e.to_string()))
    }

    /// Verify signature, schema, expiry and kind.
    pub fn verify(&self, token: &str, expected: TokenKind) -> Result<TokenClaims, TokenError> {
        let claims = self.decode_with(token, true)?;
        if claims.kind != expected {
            return Err(TokenError::WrongKind {
                expected,
                found: claims.kind,
            });
        }
        Ok(claims)
    }

    /// Verify signature and schema but accept expired tokens.
    pub fn decode_allow_expired(&self, token: &str) -> Result<TokenClaims, TokenError> {
        self.decode_with(token, false)
    }

    fn decode_with(&self, token: &str, validate_exp: bool) -> Result<TokenClaims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_exp = validate_exp;
        let data = decode::<TokenClaims>(token, &self.decoding, &validation)?;
        Ok(data.claims)
    }
}

/// Resolve the signing secret: env `TESSERA_JWT_SECRET` → `JWT_SECRET` →
/// persisted file → freshly generated (and persisted).
pub fn resolve_signing_secret() -> std::io::Result<SigningKey> {
    resolve_signing_secret_with(|key| std::env::var(key).ok(), &default_secret_path())
}

/// [`resolve_signing_secret`] with an explicit env lookup and secret file.
pub fn resolve_signing_secret_with<F>(lookup: F, path: &Path) -> std::io::Result<SigningKey>
where
    F: Fn(&str) -> Option<String>,
{
    for var in ["TESSERA_JWT_SECRET", "JWT_SECRET"] {
        if let Some(secret) = lookup(var)
            && !secret.is_empty()
        {
            return Ok(SigningKey::new(secret));
        }
    }
    load_or_generate(path)
}

/// Read the secret at `path`, generating and persisting one if missing or empty.
pub fn load_or_generate(path: &Path) -> std::io::Result<SigningKey> {
    match std::fs::read_to_string(path) {
        Ok(existing) if !existing.trim().is_empty() => {
            return Ok(SigningKey::new(existing.trim()));
        }
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }
    let secret = generate_secret();
    write_secret(path, &secret)?;
    info!(path = %path.display(), "generated new JWT secret");
    Ok(SigningKey::new(secret))
}

/// Random alphanumeric secret.
pub fn generate_secret() -> String {
    rng()
        .sample_iter(&Alphanumeric)
        .take(GENERATED_SECRET_LEN)
        .map(char::from)
        .collect()
}

/// Write a secret file readable only by its owner.
pub fn write_secret(path: &Path, secret: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut options = std::fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options.open(path)?;
    file.write_all(secret.as_bytes())
}

/// Path to the persisted JWT secret file.
pub fn default_secret_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("tessera")
        .join("jwt-secret")
}
