//! Password authenticator.

use std::sync::Arc;

use tracing::debug;

use crate::authority::IdentityAuthority;
use crate::error::AuthError;
use crate::pubkey::AuthDecision;

/// Thin passthrough to the identity authority.
pub struct PasswordAuthenticator {
    authority: Arc<dyn IdentityAuthority>,
}

impl PasswordAuthenticator {
    /// Create the authenticator.
    pub fn new(authority: Arc<dyn IdentityAuthority>) -> Self {
        Self { authority }
    }

    /// Decide a password attempt.
    pub async fn authenticate(
        &self,
        username: &str,
        password: &str,
    ) -> Result<AuthDecision, AuthError> {
        if self.authority.verify_password(username, password).await? {
            Ok(AuthDecision::Accept)
        } else {
            debug!(username, "password auth rejected");
            Ok(AuthDecision::Reject)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{UserEntry, UserRegistry};
    use crate::ConfigAuthority;

    fn authenticator() -> PasswordAuthenticator {
        let registry = Arc::new(
            UserRegistry::build(&[UserEntry {
                username: "carol".into(),
                password: Some("hunter2".into()),
                public_key: None,
            }])
            .unwrap(),
        );
        PasswordAuthenticator::new(Arc::new(ConfigAuthority::new(registry)))
    }

    #[tokio::test]
    async fn test_correct_password_accepted() {
        let auth = authenticator();
        assert_eq!(
            auth.authenticate("carol", "hunter2").await.unwrap(),
            AuthDecision::Accept
        );
    }

    #[tokio::test]
    async fn test_wrong_password_rejected() {
        let auth = authenticator();
        assert_eq!(
            auth.authenticate("carol", "wrong").await.unwrap(),
            AuthDecision::Reject
        );
        assert_eq!(
            auth.authenticate("nobody", "hunter2").await.unwrap(),
            AuthDecision::Reject
        );
    }
}
