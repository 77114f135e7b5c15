//! Storage abstraction for the gatehouse file-transfer gateway.
//!
//! Every storage medium the gateway can serve is expressed as a
//! [`StorageOps`] implementation:
//!
//! - [`LocalBackend`] - host filesystem rooted at a base folder
//! - [`MemoryBackend`] - ephemeral in-memory tree (testing)
//! - `S3Backend` (in `gatehouse-s3`) - bucket exposed as a hierarchy
//!
//! Sessions never touch a backend directly. [`RootedView`] wraps a backend
//! with a per-user prefix and rejects any path that would resolve outside
//! it, so one shared backend instance safely serves many tenants.
//!
//! ## Design Decisions
//!
//! - **Path-based, no handles**: operations take relative paths with
//!   explicit offset/size where it matters. Handle lifecycles live in the
//!   protocol layer, keeping backends stateless and trivially shareable.
//! - **Declared capabilities**: a backend that cannot represent POSIX
//!   attribute bits says so via [`AttributePolicy`] instead of failing
//!   client `setstat` calls.

pub mod backends;
mod error;
mod ops;
mod rooted;
mod types;
pub mod virtual_path;

pub use backends::{LocalBackend, MemoryBackend};
pub use error::{StorageError, StorageResult};
pub use ops::StorageOps;
pub use rooted::RootedView;
pub use types::{AttributePolicy, DirEntry, FileAttr, FileType, SetAttr};
