//! Boundary traits for the external collaborators of the cache.
//!
//! Both traits are object-safe (boxed futures) so concrete clients can be
//! constructor-injected as `Arc<dyn _>` without generics spreading through
//! the dispatcher.

use futures_util::future::BoxFuture;
use futures_util::stream::BoxStream;
use gate_core::WorkspaceRecord;
use thiserror::Error;

/// Failure modes of an authoritative directory lookup.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DirectoryError {
    #[error("user has no directory entry")]
    NotFound,
    #[error("directory unavailable: {0}")]
    Unavailable(String),
}

/// Transport-level failure of the shared cache. These never fail a fetch
/// that the directory can still answer; callers log and degrade to a miss.
#[derive(Debug, Clone, Error)]
#[error("shared cache transport error: {0}")]
pub struct SharedCacheError(pub String);

/// Authoritative per-user workspace lookup. A fetch calls this at most
/// once — there is no retry policy at this layer.
pub trait DirectoryClient: Send + Sync {
    fn lookup<'a>(
        &'a self,
        username: &'a str,
    ) -> BoxFuture<'a, Result<WorkspaceRecord, DirectoryError>>;
}

/// Distributed key-value store doubling as the pub/sub transport for
/// invalidation events.
pub trait SharedCache: Send + Sync {
    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<String>, SharedCacheError>>;

    fn set<'a>(&'a self, key: &'a str, value: &'a str)
        -> BoxFuture<'a, Result<(), SharedCacheError>>;

    fn publish<'a>(
        &'a self,
        channel: &'a str,
        payload: &'a str,
    ) -> BoxFuture<'a, Result<(), SharedCacheError>>;

    /// Subscribe to the given channels; the stream yields
    /// `(channel, payload)` pairs for the lifetime of the subscription.
    fn subscribe<'a>(
        &'a self,
        channels: &'a [&'a str],
    ) -> BoxFuture<'a, Result<BoxStream<'static, (String, String)>, SharedCacheError>>;
}
