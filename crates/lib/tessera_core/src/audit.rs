//! Security audit events.
//!
//! The engine only emits events; buffering, persistence and retention belong
//! to whoever implements [`AuditSink`]. Recording is fire-and-forget: a sink
//! must not block the caller and has no way to fail the operation that
//! produced the event.

use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

/// Action tag for brute-force warnings.
pub const ACTION_FAILED_LOGIN: &str = "Failed Login Attempt";
/// Action tag for origin mismatches that forced a logout.
pub const ACTION_SESSION_ANOMALY: &str = "Session Anomaly";
/// Action tag for a revoked token presented again.
pub const ACTION_REVOKED_TOKEN: &str = "Revoked Token Reuse";
/// Action tag for identity deauthorization.
pub const ACTION_DEAUTHORIZE: &str = "Identity Deauthorized";

/// Severity of an audit event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditLevel {
    Info,
    Warn,
    Error,
    Critical,
}

/// A structured security event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub level: AuditLevel,
    pub action: String,
    /// Identity id or username the event is about, when known.
    pub identity: Option<String>,
    pub details: String,
    pub outcome: Option<String>,
}

impl AuditEvent {
    pub fn new(level: AuditLevel, action: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            level,
            action: action.into(),
            identity: None,
            details: details.into(),
            outcome: None,
        }
    }

    pub fn warn(action: impl Into<String>, details: impl Into<String>) -> Self {
        Self::new(AuditLevel::Warn, action, details)
    }

    pub fn info(action: impl Into<String>, details: impl Into<String>) -> Self {
        Self::new(AuditLevel::Info, action, details)
    }

    pub fn with_identity(mut self, identity: impl Into<String>) -> Self {
        self.identity = Some(identity.into());
        self
    }

    pub fn with_outcome(mut self, outcome: impl Into<String>) -> Self {
        self.outcome = Some(outcome.into());
        self
    }
}

/// Receiver of audit events.
pub trait AuditSink: Send + Sync {
    fn record(&self, event: AuditEvent);
}

/// Writes audit events to the `audit` tracing target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, event: AuditEvent) {
        let identity = event.identity.as_deref().unwrap_or("-");
        let outcome = event.outcome.as_deref().unwrap_or("-");
        match event.level {
            AuditLevel::Info => info!(
                target: "audit",
                action = %event.action,
                identity,
                outcome,
                "{}",
                event.details
            ),
            AuditLevel::Warn => warn!(
                target: "audit",
                action = %event.action,
                identity,
                outcome,
                "{}",
                event.details
            ),
            AuditLevel::Error | AuditLevel::Critical => error!(
                target: "audit",
                level = ?event.level,
                action = %event.action,
                identity,
                outcome,
                "{}",
                event.details
            ),
        }
    }
}

/// Keeps events in memory, in arrival order.
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    events: Mutex<Vec<AuditEvent>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every recorded event.
    pub fn events(&self) -> Vec<AuditEvent> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Events with the given action tag.
    pub fn with_action(&self, action: &str) -> Vec<AuditEvent> {
        self.events()
            .into_iter()
            .filter(|e| e.action == action)
            .collect()
    }

    pub fn clear(&self) {
        match self.events.lock() {
            Ok(mut events) => events.clear(),
            Err(poisoned) => poisoned.into_inner().clear(),
        }
    }
}

impl AuditSink for MemoryAuditSink {
    fn record(&self, event: AuditEvent) {
        match self.events.lock() {
            Ok(mut events) => events.push(event),
            Err(poisoned) => poisoned.into_inner().push(event),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_sink_keeps_order() {
        let sink = MemoryAuditSink::new();
        sink.record(AuditEvent::info("a", "first"));
        sink.record(AuditEvent::warn("b", "second").with_identity("alice"));
        let events = sink.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].action, "a");
        assert_eq!(events[1].identity.as_deref(), Some("alice"));
        assert_eq!(events[1].level, AuditLevel::Warn);
    }

    #[test]
    fn with_action_filters() {
        let sink = MemoryAuditSink::new();
        sink.record(AuditEvent::warn(ACTION_FAILED_LOGIN, "x"));
        sink.record(AuditEvent::warn(ACTION_SESSION_ANOMALY, "y"));
        assert_eq!(sink.with_action(ACTION_FAILED_LOGIN).len(), 1);
        sink.clear();
        assert!(sink.events().is_empty());
    }

    #[test]
    fn levels_are_ordered_by_severity() {
        assert!(AuditLevel::Info < AuditLevel::Warn);
        assert!(AuditLevel::Error < AuditLevel::Critical);
    }

    #[test]
    fn tracing_sink_accepts_every_level() {
        let sink = TracingAuditSink;
        for level in [
            AuditLevel::Info,
            AuditLevel::Warn,
            AuditLevel::Error,
            AuditLevel::Critical,
        ] {
            sink.record(AuditEvent::new(level, "sample", "details").with_outcome("ok"));
        }
    }
}
