//! Broadcast backend contract.
//!
//! Channels are implicit: publishing to or subscribing on a channel that
//! nobody used before simply creates it. Channels keep no history, so a
//! subscriber only sees payloads published after it attached.
//!
//! A [`Subscription`] owns its backend registration. Dropping it, on any
//! path including a panic or an early `?` return, releases the
//! registration.

use std::pin::Pin;
use std::task::{Context, Poll};

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{BoxStream, Stream, StreamExt as _};
use thingcast_types::Channel;
use tracing::debug;

use crate::error::StoreError;

/// Publish/subscribe backend.
#[async_trait]
pub trait Broadcaster: Send + Sync {
    /// Publish `payload` to every current subscriber of `channel`.
    ///
    /// Payloads published by one caller to one channel are delivered in
    /// publish order.
    async fn publish(&self, channel: &Channel, payload: Bytes) -> Result<(), StoreError>;

    /// Attach a new subscriber to `channel`.
    async fn subscribe(&self, channel: &Channel) -> Result<Subscription, StoreError>;

    /// Wait until previously published payloads have left the process.
    async fn flush(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

/// A live subscription to one channel.
///
/// Yields payloads in publish order until the backend closes the channel.
pub struct Subscription {
    channel: Channel,
    stream: BoxStream<'static, Bytes>,
}

impl Subscription {
    /// Wrap a backend payload stream.
    pub fn new(channel: Channel, stream: BoxStream<'static, Bytes>) -> Self {
        debug!(channel = %channel, "subscription attached");
        Self { channel, stream }
    }

    /// The channel this subscription is bound to.
    pub const fn channel(&self) -> &Channel {
        &self.channel
    }

    /// Wait for the next payload. `None` means the channel is gone.
    pub async fn recv(&mut self) -> Option<Bytes> {
        self.stream.next().await
    }
}

impl Stream for Subscription {
    type Item = Bytes;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.stream.poll_next_unpin(cx)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        debug!(channel = %self.channel, "subscription released");
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("channel", &self.channel)
            .finish_non_exhaustive()
    }
}
