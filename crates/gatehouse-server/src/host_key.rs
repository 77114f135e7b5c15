//! Stable host identity.
//!
//! The server's keypair lives at `_key` under the storage root and goes
//! through the backend adapter, so cloud deployments persist it in the
//! bucket alongside user data. Generated exactly once on first boot;
//! every later boot loads it unchanged, so returning clients never see a
//! host-identity change.

use std::path::Path;

use russh::keys::ssh_key::LineEnding;
use russh::keys::{Algorithm, PrivateKey};
use thiserror::Error;
use tracing::info;

use gatehouse_vfs::{StorageError, StorageOps};

/// Path of the host key file, relative to the storage root.
pub const HOST_KEY_PATH: &str = "_key";

/// Failure to establish host identity.
#[derive(Debug, Error)]
pub enum HostKeyError {
    /// The persisted key exists but does not parse.
    #[error("persisted host key is unreadable: {0}")]
    Corrupt(String),

    /// Key generation failed.
    #[error("host key generation failed: {0}")]
    Generate(String),

    /// The storage backend failed.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Load the persisted host key, generating and persisting one on first
/// boot.
///
/// Runs to completion before the listener starts, so there is no race
/// between generate and load.
pub async fn load_or_generate(backend: &dyn StorageOps) -> Result<PrivateKey, HostKeyError> {
    let path = Path::new(HOST_KEY_PATH);

    match backend.read_all(path).await {
        Ok(bytes) => {
            PrivateKey::from_openssh(&bytes).map_err(|e| HostKeyError::Corrupt(e.to_string()))
        }
        Err(StorageError::NotFound(_)) => {
            info!("no host key at {HOST_KEY_PATH}, generating one");
            let key = PrivateKey::random(&mut rand::thread_rng(), Algorithm::Ed25519)
                .map_err(|e| HostKeyError::Generate(e.to_string()))?;
            let encoded = key
                .to_openssh(LineEnding::LF)
                .map_err(|e| HostKeyError::Generate(e.to_string()))?;
            backend.write_all(path, encoded.as_bytes()).await?;
            Ok(key)
        }
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gatehouse_vfs::MemoryBackend;

    #[tokio::test]
    async fn test_generated_then_loaded_unchanged() {
        let backend = MemoryBackend::new();

        let first = load_or_generate(&backend).await.unwrap();
        let second = load_or_generate(&backend).await.unwrap();

        assert_eq!(
            first.public_key().to_openssh().unwrap(),
            second.public_key().to_openssh().unwrap()
        );

        // The persisted material itself is byte-stable across loads.
        let on_disk = backend.read_all(Path::new(HOST_KEY_PATH)).await.unwrap();
        let _third = load_or_generate(&backend).await.unwrap();
        let still = backend.read_all(Path::new(HOST_KEY_PATH)).await.unwrap();
        assert_eq!(on_disk, still);
    }

    #[tokio::test]
    async fn test_corrupt_key_is_fatal() {
        let backend = MemoryBackend::new();
        backend
            .write_all(Path::new(HOST_KEY_PATH), b"not a key")
            .await
            .unwrap();

        let err = load_or_generate(&backend).await.unwrap_err();
        assert!(matches!(err, HostKeyError::Corrupt(_)));
    }
}
