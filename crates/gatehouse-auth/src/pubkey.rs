//! Multi-key public-key authenticator.

use std::sync::Arc;

use russh::keys::ssh_key;
use tracing::debug;

use crate::authority::IdentityAuthority;
use crate::error::AuthError;
use crate::registry::UserRegistry;

/// Outcome of an authentication attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthDecision {
    /// Credential accepted; bind the session.
    Accept,
    /// Credential rejected; refuse the connection.
    Reject,
}

/// Accepts a connection only when the presented key is byte-equal to one
/// of the user's registered keys *and* the identity authority agrees.
///
/// Holds the read-only registry and the authority handle; safe to share
/// across every connection.
pub struct PubkeyAuthenticator {
    registry: Arc<UserRegistry>,
    authority: Arc<dyn IdentityAuthority>,
}

impl PubkeyAuthenticator {
    /// Create the authenticator over a built registry.
    pub fn new(registry: Arc<UserRegistry>, authority: Arc<dyn IdentityAuthority>) -> Self {
        Self {
            registry,
            authority,
        }
    }

    /// Decide an authentication attempt.
    ///
    /// A user with no registered keys is rejected outright. A matched key
    /// is still forwarded to the authority for the final verdict.
    pub async fn authenticate(
        &self,
        username: &str,
        presented: &ssh_key::PublicKey,
    ) -> Result<AuthDecision, AuthError> {
        let Some(record) = self.registry.get(username) else {
            debug!(username, "public key auth: unknown user");
            return Ok(AuthDecision::Reject);
        };

        if record.keys.is_empty() {
            debug!(username, "public key auth: no registered keys");
            return Ok(AuthDecision::Reject);
        }

        if !record.has_key(presented) {
            debug!(username, "public key auth: presented key not registered");
            return Ok(AuthDecision::Reject);
        }

        if self.authority.verify_public_key(username, presented).await? {
            Ok(AuthDecision::Accept)
        } else {
            debug!(username, "public key auth: authority veto");
            Ok(AuthDecision::Reject)
        }
    }
}
