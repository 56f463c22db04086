//! Atrium Gate - Workspace Resolution Cache
//!
//! Three-tier resolver for workspace records: local snapshot → shared
//! cache → authoritative directory, with pub/sub invalidation keeping the
//! local snapshots of cooperating gateway processes eventually consistent.
//!
//! The directory service and the shared cache/pub-sub transport are
//! external collaborators, expressed here only as boundary traits.

pub mod boundary;
pub mod cache;
pub mod memory;

pub use boundary::{DirectoryClient, DirectoryError, SharedCache, SharedCacheError};
pub use cache::WorkspaceCache;
pub use memory::MemorySharedCache;
