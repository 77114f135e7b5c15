//! Server configuration.
//!
//! Parsed once at startup from a TOML file; validation problems are
//! collected into a list of [`ConfigError`]s, and any problem at all
//! prevents the listener from binding.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use gatehouse_auth::UserEntry;
use gatehouse_s3::RoleAssumption;

/// Default SFTP port.
pub const DEFAULT_PORT: u16 = 22;

/// Problem with the configuration. Fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("cannot read config file {path}: {source}")]
    Read {
        /// The file that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The config file is not valid TOML for this schema.
    #[error("cannot parse config file {path}: {reason}")]
    Parse {
        /// The file that was attempted.
        path: PathBuf,
        /// Parser diagnostic.
        reason: String,
    },

    /// Local mode needs a base folder.
    #[error("storage.mode = \"local\" requires storage.base_folder")]
    MissingBaseFolder,

    /// Cloud mode needs a bucket.
    #[error("storage.mode = \"s3\" requires storage.bucket")]
    MissingBucket,

    /// The role-assumption block is all-or-none.
    #[error("storage.assume_role is missing {missing}; access_key, secret_key and role_arn are required together")]
    PartialRoleAssumption {
        /// The fields that were not supplied.
        missing: String,
    },
}

/// Which storage medium backs the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageMode {
    /// Host filesystem under `base_folder`.
    Local,
    /// Object store bucket.
    S3,
}

/// Role-assumption parameters as configured.
///
/// Fields are individually optional so a partial block can be reported
/// as a [`ConfigError`] naming what is missing, instead of a generic
/// parse failure.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RoleAssumptionConfig {
    /// Long-lived access key for the token exchange.
    pub access_key: Option<String>,
    /// Matching secret key.
    pub secret_key: Option<String>,
    /// Role to assume.
    pub role_arn: Option<String>,
}

impl RoleAssumptionConfig {
    /// Resolve into usable parameters, or report what is missing.
    pub fn resolve(&self) -> Result<RoleAssumption, ConfigError> {
        match (&self.access_key, &self.secret_key, &self.role_arn) {
            (Some(access_key), Some(secret_key), Some(role_arn)) => Ok(RoleAssumption {
                access_key: access_key.clone(),
                secret_key: secret_key.clone(),
                role_arn: role_arn.clone(),
            }),
            _ => {
                let mut missing = Vec::new();
                if self.access_key.is_none() {
                    missing.push("access_key");
                }
                if self.secret_key.is_none() {
                    missing.push("secret_key");
                }
                if self.role_arn.is_none() {
                    missing.push("role_arn");
                }
                Err(ConfigError::PartialRoleAssumption {
                    missing: missing.join(", "),
                })
            }
        }
    }
}

/// Storage section of the config.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Backend selection.
    pub mode: StorageMode,
    /// Root path for local mode.
    #[serde(default)]
    pub base_folder: Option<PathBuf>,
    /// Bucket for cloud mode.
    #[serde(default)]
    pub bucket: Option<String>,
    /// Region override for cloud mode.
    #[serde(default)]
    pub region: Option<String>,
    /// Custom endpoint for S3-compatible stores.
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Role assumption; absent means ambient credentials.
    #[serde(default)]
    pub assume_role: Option<RoleAssumptionConfig>,
}

/// Full server configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Listener port.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Storage backend selection and settings.
    pub storage: StorageConfig,
    /// Configured users. Entries may repeat a username to add keys.
    #[serde(default)]
    pub users: Vec<UserEntry>,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

impl ServerConfig {
    /// Load and parse the config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&text).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Parse from a TOML string.
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|e| ConfigError::Parse {
            path: PathBuf::from("<inline>"),
            reason: e.to_string(),
        })
    }

    /// Collect every configuration problem.
    ///
    /// User-entry problems (blank usernames, undecodable keys) are
    /// reported separately when the registry is built; this covers the
    /// storage surface.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        match self.storage.mode {
            StorageMode::Local => {
                if self.storage.base_folder.is_none() {
                    errors.push(ConfigError::MissingBaseFolder);
                }
            }
            StorageMode::S3 => {
                if self.storage.bucket.is_none() {
                    errors.push(ConfigError::MissingBucket);
                }
            }
        }

        if let Some(role) = &self.storage.assume_role {
            if let Err(e) = role.resolve() {
                errors.push(e);
            }
        }

        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_local_config() {
        let config = ServerConfig::from_toml(
            r#"
            [storage]
            mode = "local"
            base_folder = "/srv/gatehouse"
            "#,
        )
        .unwrap();

        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.storage.mode, StorageMode::Local);
        assert!(config.validate().is_empty());
    }

    #[test]
    fn test_users_parse() {
        let config = ServerConfig::from_toml(
            r#"
            port = 2222

            [storage]
            mode = "local"
            base_folder = "/srv/gatehouse"

            [[users]]
            username = "alice"
            public_key = "ssh-ed25519 AAAA alice@laptop"

            [[users]]
            username = "alice"
            public_key = "ssh-ed25519 BBBB alice@desktop"
            "#,
        )
        .unwrap();

        assert_eq!(config.port, 2222);
        assert_eq!(config.users.len(), 2);
        assert_eq!(config.users[0].username, "alice");
    }

    #[test]
    fn test_local_without_base_folder() {
        let config = ServerConfig::from_toml(
            r#"
            [storage]
            mode = "local"
            "#,
        )
        .unwrap();

        let errors = config.validate();
        assert!(matches!(errors[0], ConfigError::MissingBaseFolder));
    }

    #[test]
    fn test_s3_without_bucket() {
        let config = ServerConfig::from_toml(
            r#"
            [storage]
            mode = "s3"
            "#,
        )
        .unwrap();

        let errors = config.validate();
        assert!(matches!(errors[0], ConfigError::MissingBucket));
    }

    #[test]
    fn test_s3_without_assume_role_is_valid() {
        let config = ServerConfig::from_toml(
            r#"
            [storage]
            mode = "s3"
            bucket = "transfers"
            "#,
        )
        .unwrap();

        assert!(config.validate().is_empty());
        assert!(config.storage.assume_role.is_none());
    }

    #[test]
    fn test_partial_assume_role_is_fatal() {
        let config = ServerConfig::from_toml(
            r#"
            [storage]
            mode = "s3"
            bucket = "transfers"

            [storage.assume_role]
            access_key = "AKIAEXAMPLE"
            "#,
        )
        .unwrap();

        let errors = config.validate();
        assert!(matches!(
            &errors[0],
            ConfigError::PartialRoleAssumption { missing } if missing.contains("secret_key") && missing.contains("role_arn")
        ));
    }

    #[test]
    fn test_complete_assume_role_resolves() {
        let config = ServerConfig::from_toml(
            r#"
            [storage]
            mode = "s3"
            bucket = "transfers"

            [storage.assume_role]
            access_key = "AKIAEXAMPLE"
            secret_key = "wJalrXUt"
            role_arn = "arn:aws:iam::123456789012:role/transfer"
            "#,
        )
        .unwrap();

        assert!(config.validate().is_empty());
        let role = config.storage.assume_role.unwrap().resolve().unwrap();
        assert_eq!(role.role_arn, "arn:aws:iam::123456789012:role/transfer");
    }
}
