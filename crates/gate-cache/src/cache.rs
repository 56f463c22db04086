//! The workspace resolution cache.
//!
//! Two operating modes, selected at construction:
//!
//! - **Polling** — every fetch consults the shared store; misses fall
//!   through to the directory and the result is written back. No local
//!   snapshot, so every replica always sees the store's current value.
//! - **Streaming** — fetches hit a local snapshot first, then the shared
//!   store, then the directory. Directory answers are written to the
//!   shared store and announced on the `NewWorkspace` channel so sibling
//!   processes converge without re-querying the directory.
//!
//! Snapshot entries never expire; a later write or invalidation event for
//! the same username supersedes them. Events carry no sequence numbers, so
//! the last delivery observed wins, racing fetch-path writes included.

use std::sync::Arc;

use dashmap::DashMap;
use futures_util::StreamExt;
use gate_core::{ResolveError, WorkspaceRecord, CHANNEL_NEW_WORKSPACE, INVALIDATION_CHANNELS};
use tracing::{debug, warn};

use crate::boundary::{DirectoryClient, DirectoryError, SharedCache, SharedCacheError};

type Snapshot = Arc<DashMap<String, WorkspaceRecord>>;

/// Three-tier workspace resolver. One instance is shared by every
/// dispatcher in the process.
pub enum WorkspaceCache {
    Polling(PollingCache),
    Streaming(StreamingCache),
}

impl WorkspaceCache {
    pub fn polling(shared: Arc<dyn SharedCache>, directory: Arc<dyn DirectoryClient>) -> Self {
        Self::Polling(PollingCache { shared, directory })
    }

    pub fn streaming(shared: Arc<dyn SharedCache>, directory: Arc<dyn DirectoryClient>) -> Self {
        Self::Streaming(StreamingCache {
            shared,
            directory,
            snapshot: Arc::new(DashMap::new()),
        })
    }

    /// Resolve the workspace record for a user.
    pub async fn fetch(&self, username: &str) -> Result<WorkspaceRecord, ResolveError> {
        match self {
            Self::Polling(cache) => cache.fetch(username).await,
            Self::Streaming(cache) => cache.fetch(username).await,
        }
    }

    /// Subscribe to the invalidation feed and spawn the perpetual consumer
    /// task. A no-op in polling mode.
    pub async fn start(&self) -> Result<(), SharedCacheError> {
        match self {
            Self::Polling(_) => Ok(()),
            Self::Streaming(cache) => cache.start().await,
        }
    }

    /// Peek at the local snapshot without touching any remote tier.
    /// Always `None` in polling mode, which keeps no snapshot.
    pub fn cached(&self, username: &str) -> Option<WorkspaceRecord> {
        match self {
            Self::Polling(_) => None,
            Self::Streaming(cache) => cache.snapshot.get(username).map(|r| r.value().clone()),
        }
    }
}

pub struct PollingCache {
    shared: Arc<dyn SharedCache>,
    directory: Arc<dyn DirectoryClient>,
}

impl PollingCache {
    async fn fetch(&self, username: &str) -> Result<WorkspaceRecord, ResolveError> {
        if let Some(record) = pull_shared(self.shared.as_ref(), username).await {
            return Ok(record);
        }

        let record = pull_directory(self.directory.as_ref(), username).await?;
        write_back(self.shared.as_ref(), &record, false).await;
        Ok(record)
    }
}

pub struct StreamingCache {
    shared: Arc<dyn SharedCache>,
    directory: Arc<dyn DirectoryClient>,
    snapshot: Snapshot,
}

impl StreamingCache {
    async fn fetch(&self, username: &str) -> Result<WorkspaceRecord, ResolveError> {
        if let Some(record) = self.snapshot.get(username) {
            return Ok(record.value().clone());
        }

        if let Some(record) = pull_shared(self.shared.as_ref(), username).await {
            self.snapshot.insert(username.to_string(), record.clone());
            return Ok(record);
        }

        let record = pull_directory(self.directory.as_ref(), username).await?;
        debug!(username, ip = ?record.ip, "resolved workspace from directory");

        self.snapshot.insert(username.to_string(), record.clone());
        write_back(self.shared.as_ref(), &record, true).await;
        Ok(record)
    }

    async fn start(&self) -> Result<(), SharedCacheError> {
        let mut feed = self.shared.subscribe(&INVALIDATION_CHANNELS).await?;
        debug!(channels = ?INVALIDATION_CHANNELS, "subscribed to invalidation feed");

        let snapshot = self.snapshot.clone();
        tokio::spawn(async move {
            while let Some((channel, payload)) = feed.next().await {
                apply_event(&snapshot, &channel, &payload);
            }
            warn!("invalidation feed ended");
        });
        Ok(())
    }
}

/// Consume one invalidation event. Malformed payloads are dropped here and
/// must never crash the subscriber; both channels overwrite the snapshot
/// entry unconditionally.
fn apply_event(snapshot: &DashMap<String, WorkspaceRecord>, channel: &str, payload: &str) {
    let record: WorkspaceRecord = match serde_json::from_str(payload) {
        Ok(record) => record,
        Err(e) => {
            warn!(channel, "dropping malformed invalidation payload: {e}");
            return;
        }
    };
    if record.username.is_empty() {
        warn!(channel, "dropping invalidation event without a username");
        return;
    }

    debug!(channel, username = %record.username, "invalidation event applied");
    snapshot.insert(record.username.clone(), record);
}

/// Shared-store read. Transport failures and undecodable values degrade to
/// a miss so the directory tier still gets its chance to answer.
async fn pull_shared(shared: &dyn SharedCache, username: &str) -> Option<WorkspaceRecord> {
    let raw = match shared.get(username).await {
        Ok(Some(raw)) => raw,
        Ok(None) => return None,
        Err(e) => {
            warn!(username, "shared cache read failed, treating as miss: {e}");
            return None;
        }
    };

    match serde_json::from_str(&raw) {
        Ok(record) => Some(record),
        Err(e) => {
            warn!(username, "shared cache held an undecodable record, treating as miss: {e}");
            None
        }
    }
}

async fn pull_directory(
    directory: &dyn DirectoryClient,
    username: &str,
) -> Result<WorkspaceRecord, ResolveError> {
    directory.lookup(username).await.map_err(|e| match e {
        DirectoryError::NotFound => ResolveError::NotFound,
        DirectoryError::Unavailable(msg) => ResolveError::Directory(msg),
    })
}

/// Write a directory answer back to the shared store, announcing it on the
/// invalidation feed in streaming mode. Neither failure aborts the fetch —
/// the caller already holds a good record.
async fn write_back(shared: &dyn SharedCache, record: &WorkspaceRecord, announce: bool) {
    let raw = match serde_json::to_string(record) {
        Ok(raw) => raw,
        Err(e) => {
            warn!(username = %record.username, "failed to encode record for shared cache: {e}");
            return;
        }
    };

    if let Err(e) = shared.set(&record.username, &raw).await {
        warn!(username = %record.username, "shared cache write failed: {e}");
    }
    if announce {
        if let Err(e) = shared.publish(CHANNEL_NEW_WORKSPACE, &raw).await {
            warn!(username = %record.username, "invalidation publish failed: {e}");
        }
    }
}
