//! In-process store and broadcaster.
//!
//! Used for single-process deployments (the mutator runs on its own runtime
//! inside the server process) and throughout the test suites. Both types
//! are safe to share across tokio runtimes.

use std::collections::HashMap;

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt as _;
use thingcast_types::Channel;
use tokio::sync::{Mutex, RwLock, broadcast};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tracing::warn;

use crate::broadcast::{Broadcaster, Subscription};
use crate::error::StoreError;
use crate::store::SnapshotStore;

/// Per-channel buffer of the in-memory broadcaster.
///
/// A subscriber that falls more than this many payloads behind skips ahead
/// to the oldest retained payload.
pub const CHANNEL_CAPACITY: usize = 256;

/// `HashMap`-backed snapshot store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SnapshotStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: String) -> Result<(), StoreError> {
        self.entries.write().await.insert(key.to_owned(), value);
        Ok(())
    }
}

/// Broadcaster built on [`tokio::sync::broadcast`] channels.
///
/// One channel is created lazily per subject. Slow subscribers never block
/// the publisher or each other: each has its own cursor into the buffer.
#[derive(Debug)]
pub struct MemoryBroadcaster {
    channels: Mutex<HashMap<String, broadcast::Sender<Bytes>>>,
    capacity: usize,
}

impl MemoryBroadcaster {
    /// Create a broadcaster with the default per-channel capacity.
    pub fn new() -> Self {
        Self::with_capacity(CHANNEL_CAPACITY)
    }

    /// Create a broadcaster with a custom per-channel capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            channels: Mutex::new(HashMap::new()),
            capacity: capacity.max(1),
        }
    }

    /// Number of live subscriptions on `channel`.
    pub async fn subscriber_count(&self, channel: &Channel) -> usize {
        self.channels
            .lock()
            .await
            .get(&channel.subject())
            .map_or(0, broadcast::Sender::receiver_count)
    }

    async fn sender(&self, channel: &Channel) -> broadcast::Sender<Bytes> {
        let mut channels = self.channels.lock().await;
        channels
            .entry(channel.subject())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .clone()
    }
}

impl Default for MemoryBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Broadcaster for MemoryBroadcaster {
    async fn publish(&self, channel: &Channel, payload: Bytes) -> Result<(), StoreError> {
        // send fails only when nobody is subscribed, which is not an error.
        let _ = self.sender(channel).await.send(payload);
        Ok(())
    }

    async fn subscribe(&self, channel: &Channel) -> Result<Subscription, StoreError> {
        let rx = self.sender(channel).await.subscribe();
        let name = channel.to_string();
        let stream = BroadcastStream::new(rx).filter_map(move |item| {
            let payload = match item {
                Ok(payload) => Some(payload),
                Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                    warn!(channel = %name, skipped, "subscriber lagged, skipping ahead");
                    None
                }
            };
            futures::future::ready(payload)
        });
        Ok(Subscription::new(channel.clone(), stream.boxed()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use thingcast_types::ThingId;

    use super::*;

    fn thing_channel(raw: &str) -> Channel {
        Channel::Thing(ThingId::new(raw).unwrap())
    }

    #[tokio::test]
    async fn store_is_last_write_wins() {
        let store = MemoryStore::new();
        assert_eq!(store.get("k").await.unwrap(), None);
        store.set("k", String::from("1")).await.unwrap();
        store.set("k", String::from("2")).await.unwrap();
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("2"));
    }

    #[tokio::test]
    async fn publish_without_subscribers_is_ok() {
        let hub = MemoryBroadcaster::new();
        assert!(hub.publish(&Channel::All, Bytes::from_static(b"x")).await.is_ok());
    }

    #[tokio::test]
    async fn subscribers_only_see_later_publishes() {
        let hub = MemoryBroadcaster::new();
        hub.publish(&Channel::All, Bytes::from_static(b"early")).await.unwrap();
        let mut sub = hub.subscribe(&Channel::All).await.unwrap();
        hub.publish(&Channel::All, Bytes::from_static(b"late")).await.unwrap();
        assert_eq!(sub.recv().await, Some(Bytes::from_static(b"late")));
    }

    #[tokio::test]
    async fn every_subscriber_gets_every_payload() {
        let hub = MemoryBroadcaster::new();
        let mut first = hub.subscribe(&Channel::All).await.unwrap();
        let mut second = hub.subscribe(&Channel::All).await.unwrap();

        for n in 0..5u8 {
            hub.publish(&Channel::All, Bytes::from(vec![n])).await.unwrap();
        }

        for n in 0..5u8 {
            assert_eq!(first.recv().await, Some(Bytes::from(vec![n])));
        }
        for n in 0..5u8 {
            assert_eq!(second.recv().await, Some(Bytes::from(vec![n])));
        }
    }

    #[tokio::test]
    async fn channels_are_isolated() {
        let hub = MemoryBroadcaster::new();
        let mut a = hub.subscribe(&thing_channel("a")).await.unwrap();
        hub.publish(&thing_channel("b"), Bytes::from_static(b"b")).await.unwrap();
        hub.publish(&thing_channel("a"), Bytes::from_static(b"a")).await.unwrap();
        assert_eq!(a.recv().await, Some(Bytes::from_static(b"a")));
    }

    #[tokio::test]
    async fn dropping_a_subscription_releases_it() {
        let hub = MemoryBroadcaster::new();
        let sub = hub.subscribe(&Channel::All).await.unwrap();
        assert_eq!(hub.subscriber_count(&Channel::All).await, 1);
        drop(sub);
        assert_eq!(hub.subscriber_count(&Channel::All).await, 0);
    }

    #[tokio::test]
    async fn slow_subscriber_does_not_block_fast_one() {
        let hub = MemoryBroadcaster::with_capacity(2);
        let mut slow = hub.subscribe(&Channel::All).await.unwrap();
        let mut fast = hub.subscribe(&Channel::All).await.unwrap();

        for n in 0..4u8 {
            hub.publish(&Channel::All, Bytes::from(vec![n])).await.unwrap();
            let got = tokio::time::timeout(Duration::from_secs(1), fast.recv()).await;
            assert_eq!(got.unwrap(), Some(Bytes::from(vec![n])));
        }

        // The slow one lagged past capacity and resumes at the retained tail.
        assert_eq!(slow.recv().await, Some(Bytes::from(vec![2])));
        assert_eq!(slow.recv().await, Some(Bytes::from(vec![3])));
    }
}
