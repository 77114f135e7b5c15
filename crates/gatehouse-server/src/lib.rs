//! Gatehouse server library
//!
//! Multi-tenant SFTP gateway: authenticated clients get a confined view
//! of a file tree backed by local disk or an object store.

pub mod bootstrap;
pub mod config;
pub mod events;
pub mod host_key;
pub mod session;
pub mod ssh;

pub use bootstrap::{BootstrapError, Gateway};
pub use config::{ConfigError, RoleAssumptionConfig, ServerConfig, StorageConfig, StorageMode};
pub use events::{LogTracker, NoopTracker, OpOutcome, SessionTracker};
pub use session::SftpSession;
pub use ssh::{SshServer, SshServerConfig};
