//! End-to-end session scenarios against the in-memory backends.

use std::sync::Arc;

use tessera_core::audit::{ACTION_FAILED_LOGIN, ACTION_SESSION_ANOMALY, AuditLevel, MemoryAuditSink};
use tessera_core::auth::jwt::SigningKey;
use tessera_core::auth::store::MemoryCredentialStore;
use tessera_core::cache::MemoryCache;
use tessera_core::models::auth::Origin;
use tessera_core::{AuthConfig, AuthError, AuthService, SessionStatus};

const DESKTOP_UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
const PHONE_UA: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_1 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.1 Mobile/15E148 Safari/604.1";

struct Harness {
    service: AuthService,
    audit: Arc<MemoryAuditSink>,
}

fn harness() -> Harness {
    let audit = Arc::new(MemoryAuditSink::new());
    let service = AuthService::new(
        Arc::new(MemoryCredentialStore::new()),
        Arc::new(MemoryCache::new()),
        audit.clone(),
        &SigningKey::new("integration-secret"),
        AuthConfig {
            bcrypt_cost: 4,
            ..AuthConfig::default()
        },
    );
    Harness { service, audit }
}

#[tokio::test]
async fn stolen_session_is_torn_down() {
    let h = harness();
    let office = Origin::new("10.0.0.5", DESKTOP_UA);
    let alice = h
        .service
        .register("alice", "alice@x.com", "correct horse", &office)
        .await
        .unwrap();

    let thief = Origin::new("10.9.9.9", PHONE_UA);
    let status = h.service.verify_session(alice.identity.id, &thief).await.unwrap();
    assert_eq!(status, SessionStatus::Invalidated);

    let err = h
        .service
        .refresh(&alice.tokens.refresh_token, &office)
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::Revoked));

    let anomalies = h.audit.with_action(ACTION_SESSION_ANOMALY);
    assert_eq!(anomalies.len(), 1);
    assert_eq!(anomalies[0].level, AuditLevel::Warn);
    assert_eq!(
        anomalies[0].identity.as_deref(),
        Some(alice.identity.id.to_string().as_str())
    );

    // Logging in again from the office opens a fresh, working session.
    let again = h.service.login("alice", "correct horse", &office).await.unwrap();
    assert_eq!(
        h.service.verify_session(again.identity.id, &office).await.unwrap(),
        SessionStatus::Verified
    );
    h.service.refresh(&again.tokens.refresh_token, &office).await.unwrap();
}

#[tokio::test]
async fn brute_force_is_flagged_once() {
    let h = harness();
    let origin = Origin::new("10.0.0.8", DESKTOP_UA);
    h.service
        .register("bob", "bob@x.com", "hunter2hunter2", &origin)
        .await
        .unwrap();

    for _ in 0..8 {
        let err = h.service.login("bob", "wrong-guess", &origin).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
    }
    let warnings = h.audit.with_action(ACTION_FAILED_LOGIN);
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].level, AuditLevel::Warn);
    assert_eq!(warnings[0].identity.as_deref(), Some("bob"));

    h.service.login("bob", "hunter2hunter2", &origin).await.unwrap();
    assert_eq!(h.service.throttle().attempts("bob").await.unwrap(), 0);

    // The counter restarted, so one more failure stays below the threshold.
    let _ = h.service.login("bob", "wrong-guess", &origin).await;
    assert_eq!(h.audit.with_action(ACTION_FAILED_LOGIN).len(), 1);
}

#[tokio::test]
async fn unknown_user_and_wrong_password_look_alike() {
    let h = harness();
    let origin = Origin::new("10.0.0.8", DESKTOP_UA);
    h.service
        .register("carol", "carol@x.com", "long-enough", &origin)
        .await
        .unwrap();

    let unknown = h.service.login("mallory", "long-enough", &origin).await.unwrap_err();
    let wrong = h.service.login("carol", "not-it-at-all", &origin).await.unwrap_err();
    assert_eq!(unknown.to_string(), wrong.to_string());
    assert_eq!(unknown.rejection(), wrong.rejection());
}

#[tokio::test]
async fn logout_then_refresh_is_rejected() {
    let h = harness();
    let origin = Origin::new("192.168.1.20", DESKTOP_UA);
    let dave = h
        .service
        .register("dave", "dave@x.com", "p4ssw0rd!", &origin)
        .await
        .unwrap();

    let pair = h.service.refresh(&dave.tokens.refresh_token, &origin).await.unwrap();
    assert_eq!(pair.refresh_token, dave.tokens.refresh_token);

    h.service.logout(&dave.tokens.refresh_token).await.unwrap();
    assert!(matches!(
        h.service.refresh(&dave.tokens.refresh_token, &origin).await,
        Err(AuthError::Revoked)
    ));
    assert_eq!(
        h.service.verify_session(dave.identity.id, &origin).await.unwrap(),
        SessionStatus::Invalidated
    );
}

#[tokio::test]
async fn sessions_are_isolated_per_identity() {
    let h = harness();
    let a_origin = Origin::new("10.1.1.1", DESKTOP_UA);
    let b_origin = Origin::new("10.2.2.2", PHONE_UA);
    let erin = h
        .service
        .register("erin", "erin@x.com", "erin-pass", &a_origin)
        .await
        .unwrap();
    let frank = h
        .service
        .register("frank", "frank@x.com", "frank-pass", &b_origin)
        .await
        .unwrap();

    h.service.deauthorize_identity(erin.identity.id).await.unwrap();

    assert!(h.service.refresh(&erin.tokens.refresh_token, &a_origin).await.is_err());
    h.service.refresh(&frank.tokens.refresh_token, &b_origin).await.unwrap();
    assert_eq!(
        h.service.verify_session(frank.identity.id, &b_origin).await.unwrap(),
        SessionStatus::Verified
    );
}
