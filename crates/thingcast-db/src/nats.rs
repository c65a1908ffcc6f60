//! NATS broadcaster.
//!
//! Each [`Channel`] maps to one NATS subject (`thing.all`, `thing.{id}`).
//! NATS preserves publish order per connection and subject, which gives the
//! per-thing ordering subscribers rely on. Dropping the [`Subscription`]
//! drops the underlying `async_nats::Subscriber`, which unsubscribes.

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt as _;
use thingcast_types::Channel;
use tracing::{debug, info};

use crate::broadcast::{Broadcaster, Subscription};
use crate::error::StoreError;

/// Broadcaster backed by a NATS connection.
#[derive(Clone)]
pub struct NatsBroadcaster {
    client: async_nats::Client,
}

impl NatsBroadcaster {
    /// Connect to a NATS server.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Nats`] if the connection cannot be established.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        info!(url = url, "connecting to NATS server");
        let client = async_nats::connect(url)
            .await
            .map_err(|e| StoreError::Nats(format!("failed to connect to {url}: {e}")))?;
        info!("NATS connection established");
        Ok(Self { client })
    }

    /// Wrap an already connected client.
    pub const fn new(client: async_nats::Client) -> Self {
        Self { client }
    }
}

impl std::fmt::Debug for NatsBroadcaster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NatsBroadcaster").finish_non_exhaustive()
    }
}

#[async_trait]
impl Broadcaster for NatsBroadcaster {
    async fn publish(&self, channel: &Channel, payload: Bytes) -> Result<(), StoreError> {
        let subject = channel.subject();
        debug!(subject = subject, bytes = payload.len(), "publishing");
        self.client
            .publish(subject.clone(), payload)
            .await
            .map_err(|e| StoreError::Nats(format!("failed to publish to {subject}: {e}")))
    }

    async fn subscribe(&self, channel: &Channel) -> Result<Subscription, StoreError> {
        let subject = channel.subject();
        let subscriber = self
            .client
            .subscribe(subject.clone())
            .await
            .map_err(|e| StoreError::Nats(format!("failed to subscribe to {subject}: {e}")))?;
        let stream = subscriber.map(|message| message.payload).boxed();
        Ok(Subscription::new(channel.clone(), stream))
    }

    async fn flush(&self) -> Result<(), StoreError> {
        self.client
            .flush()
            .await
            .map_err(|e| StoreError::Nats(format!("failed to flush: {e}")))
    }
}
