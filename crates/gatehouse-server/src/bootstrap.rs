//! Server bootstrap.
//!
//! Components are built in dependency order (backend, host identity,
//! authenticators, tracker, listener) and any fatal error aborts before
//! the socket is bound, so a partially configured server never accepts a
//! connection.

use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use gatehouse_auth::{
    ConfigAuthority, IdentityAuthority, PasswordAuthenticator, PubkeyAuthenticator,
    RegistryError, UserRegistry,
};
use gatehouse_s3::{AssumeRoleProvider, S3Backend, S3Settings};
use gatehouse_vfs::{LocalBackend, StorageError, StorageOps};

use crate::config::{ConfigError, ServerConfig, StorageMode};
use crate::events::{LogTracker, SessionTracker};
use crate::host_key::{self, HostKeyError};
use crate::ssh::{SessionHub, SshServer, SshServerConfig};

/// Fatal startup failure. The listener is never bound.
#[derive(Debug, Error)]
pub enum BootstrapError {
    /// One or more configuration problems.
    #[error("invalid configuration:\n{}", format_list(.0))]
    Config(Vec<ConfigError>),

    /// One or more user-entry problems.
    #[error("invalid user configuration:\n{}", format_list(.0))]
    Users(Vec<RegistryError>),

    /// The storage backend could not be constructed.
    #[error("storage backend construction failed: {0}")]
    Storage(#[from] StorageError),

    /// Host identity could not be established.
    #[error(transparent)]
    HostKey(#[from] HostKeyError),
}

fn format_list(errors: &[impl std::fmt::Display]) -> String {
    errors
        .iter()
        .map(|e| format!("  - {e}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// A fully constructed gateway, ready to accept sessions.
pub struct Gateway {
    server: SshServer,
}

impl Gateway {
    /// Build every component from configuration.
    pub async fn build(config: ServerConfig) -> Result<Self, BootstrapError> {
        Self::build_with(config, None).await
    }

    /// Build with an injected identity authority (the default answers
    /// from the configured user list).
    pub async fn build_with(
        config: ServerConfig,
        authority: Option<Arc<dyn IdentityAuthority>>,
    ) -> Result<Self, BootstrapError> {
        let issues = config.validate();
        if !issues.is_empty() {
            return Err(BootstrapError::Config(issues));
        }

        let backend = build_backend(&config).await?;

        // Host identity before anything network-facing: a returning
        // client must never see it change.
        let host_key = host_key::load_or_generate(backend.as_ref()).await?;

        let registry =
            Arc::new(UserRegistry::build(&config.users).map_err(BootstrapError::Users)?);
        info!(users = registry.len(), "user registry built");

        let authority: Arc<dyn IdentityAuthority> =
            authority.unwrap_or_else(|| Arc::new(ConfigAuthority::new(registry.clone())));

        let tracker: Arc<dyn SessionTracker> = Arc::new(LogTracker);

        let hub = Arc::new(SessionHub {
            pubkey: PubkeyAuthenticator::new(registry.clone(), authority.clone()),
            password: PasswordAuthenticator::new(authority),
            backend,
            tracker,
        });

        let server = SshServer::new(SshServerConfig::new(config.port, host_key), hub);
        Ok(Self { server })
    }

    /// Bind the listener and serve until shutdown.
    pub async fn run(&self) -> Result<(), std::io::Error> {
        self.server.run().await
    }
}

/// Construct exactly one backend for the configured storage mode.
async fn build_backend(config: &ServerConfig) -> Result<Arc<dyn StorageOps>, BootstrapError> {
    match config.storage.mode {
        StorageMode::Local => {
            let Some(base) = config.storage.base_folder.as_ref() else {
                return Err(BootstrapError::Config(vec![ConfigError::MissingBaseFolder]));
            };
            info!(base = %base.display(), "using local storage");
            Ok(Arc::new(LocalBackend::new(base)?))
        }
        StorageMode::S3 => {
            let Some(bucket) = config.storage.bucket.as_ref() else {
                return Err(BootstrapError::Config(vec![ConfigError::MissingBucket]));
            };

            // Role assumption only when the block is configured;
            // otherwise the SDK's ambient chain is used as-is.
            let provider = match &config.storage.assume_role {
                Some(role_config) => {
                    let role = role_config
                        .resolve()
                        .map_err(|e| BootstrapError::Config(vec![e]))?;
                    info!(role_arn = %role.role_arn, "using assumed-role credentials");
                    Some(AssumeRoleProvider::new(
                        role,
                        config.storage.region.clone(),
                    ))
                }
                None => {
                    info!("using ambient object-store credentials");
                    None
                }
            };

            let settings = S3Settings {
                bucket: bucket.clone(),
                region: config.storage.region.clone(),
                endpoint: config.storage.endpoint.clone(),
            };
            info!(bucket = %settings.bucket, "using object storage");
            Ok(Arc::new(S3Backend::connect(settings, provider).await?))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use tempfile::TempDir;

    fn local_config(dir: &TempDir) -> ServerConfig {
        ServerConfig::from_toml(&format!(
            r#"
            port = 0

            [storage]
            mode = "local"
            base_folder = "{}"

            [[users]]
            username = "alice"
            password = "secret"
            "#,
            dir.path().display()
        ))
        .unwrap()
    }

    #[tokio::test]
    async fn test_build_persists_host_identity() {
        let dir = TempDir::new().unwrap();

        let _gateway = Gateway::build(local_config(&dir)).await.unwrap();
        let first = std::fs::read(dir.path().join("_key")).unwrap();

        // A second startup against the same root loads the identity
        // unchanged.
        let _gateway = Gateway::build(local_config(&dir)).await.unwrap();
        let second = std::fs::read(dir.path().join("_key")).unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_partial_role_assumption_aborts_before_bind() {
        let err = Gateway::build(
            ServerConfig::from_toml(
                r#"
                [storage]
                mode = "s3"
                bucket = "transfers"

                [storage.assume_role]
                access_key = "AKIAEXAMPLE"
                "#,
            )
            .unwrap(),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, BootstrapError::Config(_)));
    }

    #[tokio::test]
    async fn test_bad_user_key_aborts_before_bind() {
        let dir = TempDir::new().unwrap();
        let mut config = local_config(&dir);
        config.users[0].public_key = Some("ssh-ed25519 %%%garbage%%%".into());

        let err = Gateway::build(config).await.unwrap_err();
        assert!(matches!(err, BootstrapError::Users(_)));
    }
}
