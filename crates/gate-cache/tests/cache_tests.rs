//! Workspace cache behavior — tier fallback, write-back, invalidation feed
//! consumption, and failure propagation, exercised against scripted
//! collaborators.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use futures_util::stream::BoxStream;
use gate_cache::{
    DirectoryClient, DirectoryError, MemorySharedCache, SharedCache, SharedCacheError,
    WorkspaceCache,
};
use gate_core::{ResolveError, WorkspaceRecord, CHANNEL_NEW_WORKSPACE, CHANNEL_WORKSPACE_CONFLICT};

// ─────────────────────────────────────────────────────────────────────────────
// Scripted collaborators
// ─────────────────────────────────────────────────────────────────────────────

/// Directory that serves a fixed set of records (or a fixed failure) and
/// counts lookups.
struct ScriptedDirectory {
    records: HashMap<String, WorkspaceRecord>,
    failure: Option<DirectoryError>,
    calls: AtomicUsize,
}

impl ScriptedDirectory {
    fn with_records(records: impl IntoIterator<Item = WorkspaceRecord>) -> Arc<Self> {
        Arc::new(Self {
            records: records.into_iter().map(|r| (r.username.clone(), r)).collect(),
            failure: None,
            calls: AtomicUsize::new(0),
        })
    }

    fn failing(failure: DirectoryError) -> Arc<Self> {
        Arc::new(Self {
            records: HashMap::new(),
            failure: Some(failure),
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl DirectoryClient for ScriptedDirectory {
    fn lookup<'a>(
        &'a self,
        username: &'a str,
    ) -> BoxFuture<'a, Result<WorkspaceRecord, DirectoryError>> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(failure) = &self.failure {
                return Err(failure.clone());
            }
            self.records.get(username).cloned().ok_or(DirectoryError::NotFound)
        })
    }
}

/// Shared store that delegates to the in-memory implementation and counts
/// reads and writes.
struct CountingStore {
    inner: MemorySharedCache,
    gets: AtomicUsize,
    sets: AtomicUsize,
}

impl CountingStore {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: MemorySharedCache::new(),
            gets: AtomicUsize::new(0),
            sets: AtomicUsize::new(0),
        })
    }

    fn gets(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    fn sets(&self) -> usize {
        self.sets.load(Ordering::SeqCst)
    }
}

impl SharedCache for CountingStore {
    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<String>, SharedCacheError>> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        self.inner.get(key)
    }

    fn set<'a>(
        &'a self,
        key: &'a str,
        value: &'a str,
    ) -> BoxFuture<'a, Result<(), SharedCacheError>> {
        self.sets.fetch_add(1, Ordering::SeqCst);
        self.inner.set(key, value)
    }

    fn publish<'a>(
        &'a self,
        channel: &'a str,
        payload: &'a str,
    ) -> BoxFuture<'a, Result<(), SharedCacheError>> {
        self.inner.publish(channel, payload)
    }

    fn subscribe<'a>(
        &'a self,
        channels: &'a [&'a str],
    ) -> BoxFuture<'a, Result<BoxStream<'static, (String, String)>, SharedCacheError>> {
        self.inner.subscribe(channels)
    }
}

fn record(username: &str, ip: &str, credential: &str) -> WorkspaceRecord {
    WorkspaceRecord::new(username, Some(ip.parse().unwrap()), credential)
}

/// Poll until the condition holds; the feed task runs concurrently.
async fn wait_until(mut cond: impl FnMut() -> bool) {
    for _ in 0..400 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not met within 2s");
}

// ─────────────────────────────────────────────────────────────────────────────
// Fetch tiers
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn cold_fetch_hits_directory_once_and_writes_shared_once() {
    let store = CountingStore::new();
    let directory = ScriptedDirectory::with_records([record("alice", "10.0.0.5", "pub1:sec1")]);
    let cache = WorkspaceCache::streaming(store.clone(), directory.clone());

    let resolved = cache.fetch("alice").await.unwrap();
    assert_eq!(resolved.username, "alice");
    assert_eq!(directory.calls(), 1);
    assert_eq!(store.sets(), 1);

    // Second fetch is served from the local snapshot.
    cache.fetch("alice").await.unwrap();
    assert_eq!(directory.calls(), 1);
    assert_eq!(store.sets(), 1);
}

#[tokio::test]
async fn streaming_fetch_prefers_shared_store_over_directory() {
    let store = CountingStore::new();
    let seeded = record("bob", "10.0.0.7", "pub2:sec2");
    store
        .set("bob", &serde_json::to_string(&seeded).unwrap())
        .await
        .unwrap();

    let directory = ScriptedDirectory::with_records([]);
    let cache = WorkspaceCache::streaming(store.clone(), directory.clone());

    let resolved = cache.fetch("bob").await.unwrap();
    assert_eq!(resolved, seeded);
    assert_eq!(directory.calls(), 0);
    // The shared-store hit lands in the local snapshot too.
    assert_eq!(cache.cached("bob"), Some(seeded));
}

#[tokio::test]
async fn polling_mode_consults_shared_store_every_fetch() {
    let store = CountingStore::new();
    let directory = ScriptedDirectory::with_records([record("alice", "10.0.0.5", "pub1:sec1")]);
    let cache = WorkspaceCache::polling(store.clone(), directory.clone());

    cache.fetch("alice").await.unwrap();
    cache.fetch("alice").await.unwrap();

    // No snapshot in polling mode: both fetches read the store, but the
    // directory answered only the cold one.
    assert_eq!(store.gets(), 2);
    assert_eq!(directory.calls(), 1);
    assert_eq!(cache.cached("alice"), None);
}

#[tokio::test]
async fn directory_errors_propagate_and_are_not_cached() {
    let store = CountingStore::new();
    let directory = ScriptedDirectory::failing(DirectoryError::Unavailable("boom".into()));
    let cache = WorkspaceCache::streaming(store.clone(), directory.clone());

    let err = cache.fetch("alice").await.unwrap_err();
    assert_eq!(err, ResolveError::Directory("boom".into()));
    assert_eq!(store.sets(), 0);

    // Not cached: the next fetch asks the directory again.
    let _ = cache.fetch("alice").await.unwrap_err();
    assert_eq!(directory.calls(), 2);
}

#[tokio::test]
async fn unknown_user_resolves_to_not_found() {
    let store = CountingStore::new();
    let directory = ScriptedDirectory::with_records([]);
    let cache = WorkspaceCache::streaming(store, directory);

    assert_eq!(cache.fetch("ghost").await.unwrap_err(), ResolveError::NotFound);
}

// ─────────────────────────────────────────────────────────────────────────────
// Invalidation feed
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn new_workspace_event_updates_only_that_user() {
    let store: Arc<MemorySharedCache> = Arc::new(MemorySharedCache::new());
    let directory = ScriptedDirectory::with_records([
        record("alice", "10.0.0.5", "pub1:sec1"),
        record("bob", "10.0.0.7", "pub2:sec2"),
    ]);
    let cache = WorkspaceCache::streaming(store.clone(), directory.clone());
    cache.start().await.unwrap();

    let bob_before = cache.fetch("bob").await.unwrap();
    cache.fetch("alice").await.unwrap();

    let moved = record("alice", "10.0.0.99", "pub1:sec1");
    store
        .publish(CHANNEL_NEW_WORKSPACE, &serde_json::to_string(&moved).unwrap())
        .await
        .unwrap();

    wait_until(|| cache.cached("alice") == Some(moved.clone())).await;
    assert_eq!(cache.cached("bob"), Some(bob_before));
}

#[tokio::test]
async fn conflict_events_overwrite_exactly_like_new_workspace() {
    let store: Arc<MemorySharedCache> = Arc::new(MemorySharedCache::new());
    let directory = ScriptedDirectory::with_records([record("carol", "10.0.0.3", "p:s")]);
    let cache = WorkspaceCache::streaming(store.clone(), directory);
    cache.start().await.unwrap();

    cache.fetch("carol").await.unwrap();

    let superseded = record("carol", "10.0.0.4", "p:s");
    store
        .publish(CHANNEL_WORKSPACE_CONFLICT, &serde_json::to_string(&superseded).unwrap())
        .await
        .unwrap();

    wait_until(|| cache.cached("carol") == Some(superseded.clone())).await;
}

#[tokio::test]
async fn malformed_feed_payloads_are_dropped() {
    let store: Arc<MemorySharedCache> = Arc::new(MemorySharedCache::new());
    let directory = ScriptedDirectory::with_records([record("alice", "10.0.0.5", "pub1:sec1")]);
    let cache = WorkspaceCache::streaming(store.clone(), directory);
    cache.start().await.unwrap();

    let before = cache.fetch("alice").await.unwrap();

    // Garbage first, then a valid event: if the garbage killed the
    // subscriber, the valid event would never land.
    store.publish(CHANNEL_NEW_WORKSPACE, "{not json").await.unwrap();
    store
        .publish(CHANNEL_NEW_WORKSPACE, r#"{"username":"","ip":null}"#)
        .await
        .unwrap();

    let moved = record("alice", "10.0.0.50", "pub1:sec1");
    store
        .publish(CHANNEL_NEW_WORKSPACE, &serde_json::to_string(&moved).unwrap())
        .await
        .unwrap();

    wait_until(|| cache.cached("alice") == Some(moved.clone())).await;
    assert_ne!(before, moved);
}

#[tokio::test]
async fn events_on_other_channels_are_ignored() {
    let store: Arc<MemorySharedCache> = Arc::new(MemorySharedCache::new());
    let directory = ScriptedDirectory::with_records([record("alice", "10.0.0.5", "pub1:sec1")]);
    let cache = WorkspaceCache::streaming(store.clone(), directory);
    cache.start().await.unwrap();

    let before = cache.fetch("alice").await.unwrap();

    let moved = record("alice", "10.0.0.60", "pub1:sec1");
    store
        .publish("SomethingElse", &serde_json::to_string(&moved).unwrap())
        .await
        .unwrap();

    // Give the feed task a chance to misbehave, then confirm it did not.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(cache.cached("alice"), Some(before));
}
