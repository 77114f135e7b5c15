//! Short-lived credentials via STS role assumption.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use aws_credential_types::provider::{error::CredentialsError, future, ProvideCredentials};
use aws_credential_types::Credentials;
use aws_sdk_sts::config::{BehaviorVersion, Region};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Session name STS reports in audit trails for this gateway.
const SESSION_NAME: &str = "gatehouse-sftp";

/// Credentials within this window of expiry are refreshed eagerly, so
/// in-flight operations never run on a set that lapses mid-request.
const REFRESH_WINDOW: Duration = Duration::from_secs(60);

/// Role-assumption parameters. All three are required together.
#[derive(Debug, Clone)]
pub struct RoleAssumption {
    /// Long-lived access key used only to call the token service.
    pub access_key: String,
    /// Matching secret key.
    pub secret_key: String,
    /// Identifier of the role to assume.
    pub role_arn: String,
}

/// Failure to obtain fresh credentials from the token service.
///
/// Fatal to the operation that needed them; never silently retried with
/// a stale set past expiry.
#[derive(Debug, Error)]
pub enum CredentialExchangeError {
    /// The AssumeRole call itself failed.
    #[error("role assumption failed for {role_arn}: {reason}")]
    Exchange {
        /// The role that could not be assumed.
        role_arn: String,
        /// Service diagnostic.
        reason: String,
    },

    /// The service answered without a credential set.
    #[error("role assumption for {role_arn} returned no credentials")]
    MissingCredentials {
        /// The role that was assumed.
        role_arn: String,
    },
}

/// Obtains and refreshes short-lived credentials for the object store.
///
/// The cached set lives behind an `RwLock`: concurrent sessions read
/// either the old or the new credentials, never a partial swap. Refresh
/// happens under the write lock when the cache is within
/// [`REFRESH_WINDOW`] of expiry.
#[derive(Debug)]
pub struct AssumeRoleProvider {
    sts: aws_sdk_sts::Client,
    role_arn: String,
    cached: RwLock<Option<Credentials>>,
}

impl AssumeRoleProvider {
    /// Create a provider from role-assumption parameters.
    pub fn new(role: RoleAssumption, region: Option<String>) -> Self {
        let bootstrap = Credentials::new(
            role.access_key,
            role.secret_key,
            None,
            None,
            "gatehouse-role-assumption",
        );

        let mut builder = aws_sdk_sts::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .credentials_provider(bootstrap);
        if let Some(region) = region {
            builder = builder.region(Region::new(region));
        }

        Self {
            sts: aws_sdk_sts::Client::from_conf(builder.build()),
            role_arn: role.role_arn,
            cached: RwLock::new(None),
        }
    }

    /// Current credential set, refreshed if close to expiry.
    pub async fn credentials(&self) -> Result<Credentials, CredentialExchangeError> {
        let now = SystemTime::now();

        {
            let cached = self.cached.read().await;
            if let Some(creds) = cached.as_ref() {
                if !needs_refresh(creds, now) {
                    return Ok(creds.clone());
                }
            }
        }

        let mut cached = self.cached.write().await;
        // Another session may have refreshed while we waited for the lock.
        if let Some(creds) = cached.as_ref() {
            if !needs_refresh(creds, now) {
                return Ok(creds.clone());
            }
        }

        debug!(role_arn = %self.role_arn, "assuming role for fresh credentials");
        let fresh = self.exchange().await?;
        *cached = Some(fresh.clone());
        Ok(fresh)
    }

    async fn exchange(&self) -> Result<Credentials, CredentialExchangeError> {
        let output = self
            .sts
            .assume_role()
            .role_arn(&self.role_arn)
            .role_session_name(SESSION_NAME)
            .send()
            .await
            .map_err(|e| {
                warn!(role_arn = %self.role_arn, error = %e, "AssumeRole failed");
                CredentialExchangeError::Exchange {
                    role_arn: self.role_arn.clone(),
                    reason: e.to_string(),
                }
            })?;

        let creds = output
            .credentials()
            .ok_or_else(|| CredentialExchangeError::MissingCredentials {
                role_arn: self.role_arn.clone(),
            })?;

        let expiry = UNIX_EPOCH + Duration::from_secs(creds.expiration().secs().max(0) as u64);

        Ok(Credentials::new(
            creds.access_key_id(),
            creds.secret_access_key(),
            Some(creds.session_token().to_string()),
            Some(expiry),
            "gatehouse-assume-role",
        ))
    }
}

/// True when the set has an expiry inside the refresh window.
fn needs_refresh(creds: &Credentials, now: SystemTime) -> bool {
    match creds.expiry() {
        Some(expiry) => now + REFRESH_WINDOW >= expiry,
        None => false,
    }
}

impl ProvideCredentials for AssumeRoleProvider {
    fn provide_credentials<'a>(&'a self) -> future::ProvideCredentials<'a>
    where
        Self: 'a,
    {
        future::ProvideCredentials::new(async move {
            self.credentials()
                .await
                .map_err(CredentialsError::provider_error)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn creds_expiring_at(expiry: Option<SystemTime>) -> Credentials {
        Credentials::new("AKIA", "secret", None, expiry, "test")
    }

    #[test]
    fn test_fresh_credentials_kept() {
        let now = SystemTime::now();
        let creds = creds_expiring_at(Some(now + Duration::from_secs(3600)));
        assert!(!needs_refresh(&creds, now));
    }

    #[test]
    fn test_near_expiry_refreshes() {
        let now = SystemTime::now();
        let creds = creds_expiring_at(Some(now + Duration::from_secs(30)));
        assert!(needs_refresh(&creds, now));
    }

    #[test]
    fn test_expired_refreshes() {
        let now = SystemTime::now();
        let creds = creds_expiring_at(Some(now - Duration::from_secs(1)));
        assert!(needs_refresh(&creds, now));
    }

    #[test]
    fn test_no_expiry_never_refreshes() {
        let creds = creds_expiring_at(None);
        assert!(!needs_refresh(&creds, SystemTime::now()));
    }
}
