//! Authentication error types.

use thiserror::Error;

/// Fatal problem with a configured user entry.
///
/// Any of these aborts server startup; none are deferred to the first
/// connection attempt.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// A user entry has an empty or whitespace-only username.
    #[error("user entry {index} has a blank username")]
    BlankUsername {
        /// Position in the configured user list.
        index: usize,
    },

    /// Two entries define conflicting records for the same username.
    #[error("duplicate user entry for '{username}' with conflicting password")]
    ConflictingPassword {
        /// The offending username.
        username: String,
    },

    /// A configured public key does not parse.
    #[error("public key for '{username}' is not valid OpenSSH: {reason}")]
    InvalidKey {
        /// The offending username.
        username: String,
        /// Parser diagnostic.
        reason: String,
    },
}

/// Runtime authentication failure.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The external identity authority could not be consulted.
    #[error("identity authority unavailable: {0}")]
    AuthorityUnavailable(String),
}
