//! In-process `SharedCache` — a plain map plus a broadcast channel standing
//! in for the distributed store. Used by tests and by single-node
//! deployments where no external store is configured.

use std::collections::HashMap;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use futures_util::stream::{self, BoxStream, StreamExt};
use parking_lot::RwLock;
use tokio::sync::broadcast;

use crate::boundary::{SharedCache, SharedCacheError};

pub struct MemorySharedCache {
    entries: RwLock<HashMap<String, String>>,
    events: broadcast::Sender<(String, String)>,
}

impl MemorySharedCache {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(256);
        Self {
            entries: RwLock::new(HashMap::new()),
            events,
        }
    }
}

impl Default for MemorySharedCache {
    fn default() -> Self {
        Self::new()
    }
}

impl SharedCache for MemorySharedCache {
    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<String>, SharedCacheError>> {
        Box::pin(async move { Ok(self.entries.read().get(key).cloned()) })
    }

    fn set<'a>(
        &'a self,
        key: &'a str,
        value: &'a str,
    ) -> BoxFuture<'a, Result<(), SharedCacheError>> {
        Box::pin(async move {
            self.entries.write().insert(key.to_string(), value.to_string());
            Ok(())
        })
    }

    fn publish<'a>(
        &'a self,
        channel: &'a str,
        payload: &'a str,
    ) -> BoxFuture<'a, Result<(), SharedCacheError>> {
        Box::pin(async move {
            // Ignore send errors (no subscribers is fine)
            let _ = self.events.send((channel.to_string(), payload.to_string()));
            Ok(())
        })
    }

    fn subscribe<'a>(
        &'a self,
        channels: &'a [&'a str],
    ) -> BoxFuture<'a, Result<BoxStream<'static, (String, String)>, SharedCacheError>> {
        let rx = self.events.subscribe();
        let wanted: Arc<Vec<String>> = Arc::new(channels.iter().map(|c| c.to_string()).collect());

        Box::pin(async move {
            let feed = stream::unfold(rx, move |mut rx| {
                let wanted = wanted.clone();
                async move {
                    loop {
                        match rx.recv().await {
                            Ok((channel, payload)) if wanted.iter().any(|w| *w == channel) => {
                                return Some(((channel, payload), rx));
                            }
                            Ok(_) => continue,
                            Err(broadcast::error::RecvError::Lagged(_)) => continue,
                            Err(broadcast::error::RecvError::Closed) => return None,
                        }
                    }
                }
            });
            Ok(feed.boxed())
        })
    }
}
