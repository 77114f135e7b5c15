//! Cloud object-store backend for gatehouse.
//!
//! [`S3Backend`] maps the hierarchical operation set onto a flat key
//! namespace: directories are synthesized from key prefixes, and
//! metadata the store cannot represent is declared ignorable rather than
//! failed (see `AttributePolicy` in `gatehouse-vfs`).
//!
//! When role-assumption parameters are configured, an
//! [`AssumeRoleProvider`] trades the long-lived keypair for short-lived
//! session credentials and refreshes them before expiry, transparently
//! to the backend. Without it the SDK's ambient credential chain
//! (environment, profile, instance metadata) is used unchanged.

mod backend;
mod credentials;

pub use backend::{S3Backend, S3Settings};
pub use credentials::{AssumeRoleProvider, CredentialExchangeError, RoleAssumption};
