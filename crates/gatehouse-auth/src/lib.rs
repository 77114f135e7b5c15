//! Authentication for the gatehouse gateway.
//!
//! Identity is decided in two layers:
//!
//! 1. The immutable [`UserRegistry`], built once from configuration,
//!    maps each username to its set of trusted public keys.
//! 2. An [`IdentityAuthority`] gives the final accept/deny verdict.
//!    Registry membership is necessary but not sufficient; the authority
//!    can veto a key that matched (defense in depth).
//!
//! [`PubkeyAuthenticator`] and [`PasswordAuthenticator`] compose the two
//! for the transport layer.

mod authority;
mod error;
mod password;
mod pubkey;
mod registry;

pub use authority::{ConfigAuthority, IdentityAuthority};
pub use error::{AuthError, RegistryError};
pub use password::PasswordAuthenticator;
pub use pubkey::{AuthDecision, PubkeyAuthenticator};
pub use registry::{UserEntry, UserRecord, UserRegistry};
