//! External identity authority seam.

use std::sync::Arc;

use async_trait::async_trait;
use russh::keys::ssh_key;

use crate::error::AuthError;
use crate::registry::UserRegistry;

/// Final accept/deny authority for authentication attempts.
///
/// The gateway treats the user directory as an opaque external
/// capability: the authenticators establish that a credential is
/// *registered*, then ask the authority whether it is *acceptable*.
/// Deployments back this with whatever directory service they run.
#[async_trait]
pub trait IdentityAuthority: Send + Sync {
    /// Final verdict on a public key that matched the registry.
    async fn verify_public_key(
        &self,
        username: &str,
        key: &ssh_key::PublicKey,
    ) -> Result<bool, AuthError>;

    /// Verdict on a password attempt.
    async fn verify_password(&self, username: &str, password: &str) -> Result<bool, AuthError>;
}

/// Authority answering from the configured user list.
///
/// Stands in for an external directory when none is wired up: a matched
/// key is acceptable iff the user still exists, and passwords compare
/// against the configured secret.
pub struct ConfigAuthority {
    registry: Arc<UserRegistry>,
}

impl ConfigAuthority {
    /// Create an authority backed by the given registry.
    pub fn new(registry: Arc<UserRegistry>) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl IdentityAuthority for ConfigAuthority {
    async fn verify_public_key(
        &self,
        username: &str,
        _key: &ssh_key::PublicKey,
    ) -> Result<bool, AuthError> {
        Ok(self.registry.get(username).is_some())
    }

    async fn verify_password(&self, username: &str, password: &str) -> Result<bool, AuthError> {
        Ok(self
            .registry
            .get(username)
            .and_then(|record| record.password.as_deref())
            .is_some_and(|configured| configured == password))
    }
}
