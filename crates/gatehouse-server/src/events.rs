//! Session event tracking.
//!
//! The core calls these hooks synchronously at well-defined points and
//! does not depend on what the implementation does with them (audit
//! log, metrics, nothing).

use tracing::{info, warn};

/// Result of a tracked operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpOutcome {
    /// Operation completed.
    Success,
    /// Operation was rejected or failed.
    Failure,
}

/// Observer of session lifecycle and per-operation events.
pub trait SessionTracker: Send + Sync {
    /// A session was bound for `username`.
    fn session_opened(&self, username: &str);

    /// The session for `username` ended.
    fn session_closed(&self, username: &str);

    /// A file operation ran inside a session.
    fn operation(&self, username: &str, op: &str, path: &str, outcome: OpOutcome);

    /// An authentication attempt was refused.
    fn auth_rejected(&self, username: &str, method: &str);
}

/// Tracker that writes structured log events.
pub struct LogTracker;

impl SessionTracker for LogTracker {
    fn session_opened(&self, username: &str) {
        info!(username, "session opened");
    }

    fn session_closed(&self, username: &str) {
        info!(username, "session closed");
    }

    fn operation(&self, username: &str, op: &str, path: &str, outcome: OpOutcome) {
        match outcome {
            OpOutcome::Success => info!(username, op, path, "operation"),
            OpOutcome::Failure => warn!(username, op, path, "operation failed"),
        }
    }

    fn auth_rejected(&self, username: &str, method: &str) {
        warn!(username, method, "authentication rejected");
    }
}

/// Tracker that ignores everything.
pub struct NoopTracker;

impl SessionTracker for NoopTracker {
    fn session_opened(&self, _username: &str) {}
    fn session_closed(&self, _username: &str) {}
    fn operation(&self, _username: &str, _op: &str, _path: &str, _outcome: OpOutcome) {}
    fn auth_rejected(&self, _username: &str, _method: &str) {}
}
