//! Immutable user registry.

use std::collections::HashMap;

use russh::keys::ssh_key;
use serde::Deserialize;

use crate::error::RegistryError;

/// One user entry as it appears in configuration.
///
/// Entries may repeat a username; repeated entries contribute additional
/// public keys to the same record (one entry per client device is a
/// normal configuration shape).
#[derive(Debug, Clone, Deserialize)]
pub struct UserEntry {
    /// Unique, non-blank identifier.
    pub username: String,
    /// Optional shared secret for password auth.
    #[serde(default)]
    pub password: Option<String>,
    /// Optional OpenSSH-encoded public key.
    #[serde(default)]
    pub public_key: Option<String>,
}

/// A fully resolved user: username, optional password, trusted key set.
#[derive(Debug, Clone)]
pub struct UserRecord {
    /// The unique username.
    pub username: String,
    /// Optional shared secret.
    pub password: Option<String>,
    /// Trusted public keys, deduplicated by canonical key data.
    pub keys: Vec<ssh_key::PublicKey>,
}

impl UserRecord {
    /// True if `presented` matches one of this user's registered keys.
    ///
    /// Equality is by canonical key data, not encoding or comment.
    pub fn has_key(&self, presented: &ssh_key::PublicKey) -> bool {
        self.keys.iter().any(|k| k.key_data() == presented.key_data())
    }
}

/// Read-only username-to-record mapping.
///
/// Built once at startup from the full configured user list and shared
/// immutably across sessions; no locking is needed afterwards.
#[derive(Debug)]
pub struct UserRegistry {
    users: HashMap<String, UserRecord>,
}

impl UserRegistry {
    /// Build the registry from configuration entries.
    ///
    /// Fails fast: every problem in the list is reported, and any problem
    /// at all means the server must not start.
    pub fn build(entries: &[UserEntry]) -> Result<Self, Vec<RegistryError>> {
        let mut users: HashMap<String, UserRecord> = HashMap::new();
        let mut errors = Vec::new();

        for (index, entry) in entries.iter().enumerate() {
            let username = entry.username.trim();
            if username.is_empty() {
                errors.push(RegistryError::BlankUsername { index });
                continue;
            }

            let record = users
                .entry(username.to_string())
                .or_insert_with(|| UserRecord {
                    username: username.to_string(),
                    password: None,
                    keys: Vec::new(),
                });

            match (&record.password, &entry.password) {
                (Some(existing), Some(new)) if existing != new => {
                    errors.push(RegistryError::ConflictingPassword {
                        username: username.to_string(),
                    });
                }
                (None, Some(new)) => record.password = Some(new.clone()),
                _ => {}
            }

            if let Some(encoded) = entry.public_key.as_deref() {
                if encoded.trim().is_empty() {
                    continue;
                }
                match ssh_key::PublicKey::from_openssh(encoded.trim()) {
                    Ok(key) => {
                        // Registering the same key twice is idempotent.
                        if !record.has_key(&key) {
                            record.keys.push(key);
                        }
                    }
                    Err(e) => errors.push(RegistryError::InvalidKey {
                        username: username.to_string(),
                        reason: e.to_string(),
                    }),
                }
            }
        }

        if errors.is_empty() {
            Ok(Self { users })
        } else {
            Err(errors)
        }
    }

    /// Look up a user by name.
    pub fn get(&self, username: &str) -> Option<&UserRecord> {
        self.users.get(username)
    }

    /// Number of registered users.
    pub fn len(&self) -> usize {
        self.users.len()
    }

    /// True if no users are registered.
    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use russh::keys::{Algorithm, PrivateKey};

    fn generated_key() -> ssh_key::PublicKey {
        let private = PrivateKey::random(&mut rand::thread_rng(), Algorithm::Ed25519)
            .expect("key generation");
        private.public_key().clone()
    }

    fn encoded(key: &ssh_key::PublicKey) -> String {
        key.to_openssh().expect("openssh encoding")
    }

    fn entry(username: &str, key: Option<String>) -> UserEntry {
        UserEntry {
            username: username.to_string(),
            password: None,
            public_key: key,
        }
    }

    #[test]
    fn test_keys_group_by_username() {
        let key_a = generated_key();
        let key_b = generated_key();
        let entries = vec![
            entry("alice", Some(encoded(&key_a))),
            entry("alice", Some(encoded(&key_b))),
        ];

        let registry = UserRegistry::build(&entries).unwrap();
        let alice = registry.get("alice").unwrap();
        assert_eq!(alice.keys.len(), 2);
        assert!(alice.has_key(&key_a));
        assert!(alice.has_key(&key_b));
    }

    #[test]
    fn test_duplicate_key_collapses() {
        let key = generated_key();
        let entries = vec![
            entry("alice", Some(encoded(&key))),
            entry("alice", Some(encoded(&key))),
        ];

        let registry = UserRegistry::build(&entries).unwrap();
        assert_eq!(registry.get("alice").unwrap().keys.len(), 1);
    }

    #[test]
    fn test_blank_username_fatal() {
        let entries = vec![entry("  ", None)];
        let errors = UserRegistry::build(&entries).unwrap_err();
        assert!(matches!(errors[0], RegistryError::BlankUsername { index: 0 }));
    }

    #[test]
    fn test_undecodable_key_fatal() {
        let entries = vec![entry("alice", Some("ssh-ed25519 not!base64".into()))];
        let errors = UserRegistry::build(&entries).unwrap_err();
        assert!(matches!(
            errors[0],
            RegistryError::InvalidKey { ref username, .. } if username == "alice"
        ));
    }

    #[test]
    fn test_conflicting_passwords_fatal() {
        let entries = vec![
            UserEntry {
                username: "alice".into(),
                password: Some("one".into()),
                public_key: None,
            },
            UserEntry {
                username: "alice".into(),
                password: Some("two".into()),
                public_key: None,
            },
        ];
        let errors = UserRegistry::build(&entries).unwrap_err();
        assert!(matches!(
            errors[0],
            RegistryError::ConflictingPassword { ref username } if username == "alice"
        ));
    }

    #[test]
    fn test_entry_without_key_still_registers_user() {
        let entries = vec![UserEntry {
            username: "bob".into(),
            password: Some("secret".into()),
            public_key: None,
        }];
        let registry = UserRegistry::build(&entries).unwrap();
        let bob = registry.get("bob").unwrap();
        assert!(bob.keys.is_empty());
        assert_eq!(bob.password.as_deref(), Some("secret"));
    }
}
