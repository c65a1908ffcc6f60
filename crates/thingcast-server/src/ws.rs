//! `WebSocket` subscription bridge.
//!
//! Clients connect to `/thing/` for every update or `/thing/{id}` for the
//! updates of one thing. Each connection subscribes to the matching
//! broadcast channel and receives every published payload verbatim, as a
//! text frame when it is UTF-8 and a binary frame otherwise.
//!
//! The relay loop ends cleanly when the peer goes away. Any other write
//! failure is logged and returned as a [`BridgeError`]. The subscription is
//! released on every exit path because the [`Subscription`] is owned by the
//! loop and dropped with it.

use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};
use axum::response::Response;
use bytes::Bytes;
use thingcast_db::{Broadcaster, Subscription};
use thingcast_types::Channel;
use tracing::{debug, error};

use crate::error::BridgeError;
use crate::handlers::invalid_id_response;
use crate::negotiate::{PathParams, PendingUpgrade};
use crate::state::AppState;

/// Transport error messages that mean the peer already closed.
const PEER_CLOSED_MESSAGES: [&str; 3] = [
    "Connection closed normally",
    "Trying to work with closed connection",
    "connection closed",
];

/// Why a push to the client failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// The peer closed the connection.
    #[error("closed by peer")]
    Closed,
    /// Any other write failure.
    #[error("{0}")]
    Failed(String),
}

/// Something the client sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Inbound {
    /// The client closed the connection or it broke.
    Closed,
    /// Anything else; the bridge never consumes client messages.
    Ignored,
}

/// A push-only client connection.
#[async_trait]
pub trait PushTransport: Send {
    /// Send one payload to the client.
    async fn push(&mut self, payload: Bytes) -> Result<(), TransportError>;

    /// Wait for the next client message.
    async fn next_inbound(&mut self) -> Inbound;
}

#[async_trait]
impl PushTransport for WebSocket {
    async fn push(&mut self, payload: Bytes) -> Result<(), TransportError> {
        let message = match String::from_utf8(payload.to_vec()) {
            Ok(text) => Message::Text(text.into()),
            Err(_) => Message::Binary(payload),
        };
        self.send(message).await.map_err(|e| classify(&e))
    }

    async fn next_inbound(&mut self) -> Inbound {
        match self.recv().await {
            Some(Ok(Message::Close(_))) | None => Inbound::Closed,
            Some(Ok(Message::Ping(data))) => {
                if self.send(Message::Pong(data)).await.is_err() {
                    debug!("WebSocket client disconnected (pong failed)");
                    return Inbound::Closed;
                }
                Inbound::Ignored
            }
            Some(Err(e)) => {
                debug!("WebSocket error: {e}");
                Inbound::Closed
            }
            // Text and binary frames from the client carry no meaning here.
            Some(Ok(_)) => Inbound::Ignored,
        }
    }
}

/// Decide whether a send error means the peer is gone.
fn classify(err: &(dyn std::error::Error + 'static)) -> TransportError {
    let mut current = Some(err);
    while let Some(e) = current {
        if let Some(io) = e.downcast_ref::<std::io::Error>() {
            if matches!(
                io.kind(),
                std::io::ErrorKind::BrokenPipe
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
            ) {
                return TransportError::Closed;
            }
        }
        let text = e.to_string();
        if PEER_CLOSED_MESSAGES.iter().any(|m| text.contains(m)) {
            return TransportError::Closed;
        }
        current = e.source();
    }
    TransportError::Failed(err.to_string())
}

/// Relay `subscription` to `transport` until either side ends.
///
/// # Errors
///
/// Returns [`BridgeError::Transport`] when a push fails for any reason
/// other than the peer closing.
pub async fn bridge<T>(subscription: Subscription, transport: &mut T) -> Result<(), BridgeError>
where
    T: PushTransport + ?Sized,
{
    let mut subscription = subscription;
    let channel = subscription.channel().subject();
    let mut forwarded: u64 = 0;

    let result = loop {
        tokio::select! {
            payload = subscription.recv() => {
                let Some(payload) = payload else {
                    debug!(channel = %channel, "channel closed, ending relay");
                    break Ok(());
                };
                match transport.push(payload).await {
                    Ok(()) => forwarded = forwarded.saturating_add(1),
                    Err(TransportError::Closed) => {
                        debug!(channel = %channel, "WebSocket client disconnected (send failed)");
                        break Ok(());
                    }
                    Err(TransportError::Failed(message)) => {
                        error!(channel = %channel, error = %message, "WebSocket send failed");
                        break Err(BridgeError::Transport {
                            channel: channel.clone(),
                            message,
                        });
                    }
                }
            }
            inbound = transport.next_inbound() => {
                if inbound == Inbound::Closed {
                    debug!(channel = %channel, "WebSocket client disconnected");
                    break Ok(());
                }
            }
        }
    };

    drop(subscription);
    debug!(channel = %channel, forwarded, "relay finished");
    result
}

/// Subscribe to `channel` and relay it to `transport`.
///
/// # Errors
///
/// Returns [`BridgeError::Subscribe`] if the backend refuses the
/// subscription, otherwise whatever [`bridge`] returns.
pub async fn serve_channel<T>(
    broadcaster: &dyn Broadcaster,
    channel: Channel,
    transport: &mut T,
) -> Result<(), BridgeError>
where
    T: PushTransport + ?Sized,
{
    let subscription = broadcaster.subscribe(&channel).await?;
    bridge(subscription, transport).await
}

// ---------------------------------------------------------------------------
// Upgrade handlers
// ---------------------------------------------------------------------------

/// `WS /thing/` -- every update of every thing.
pub async fn subscribe_all(state: Arc<AppState>, _params: PathParams, pending: PendingUpgrade) -> Response {
    relay(state, Channel::All, pending).await
}

/// `WS /thing/{id}` -- updates of one thing.
///
/// An invalid or untracked id is rejected with the not-found body before
/// the connection is upgraded.
pub async fn subscribe_thing(state: Arc<AppState>, params: PathParams, pending: PendingUpgrade) -> Response {
    let id = params.get("id").and_then(|raw| state.tracked_id(raw));
    let Some(id) = id else {
        debug!(id = ?params.get("id"), "rejecting WebSocket for unknown thing id");
        return invalid_id_response();
    };
    relay(state, Channel::Thing(id), pending).await
}

async fn relay(state: Arc<AppState>, channel: Channel, pending: PendingUpgrade) -> Response {
    let upgrade = match pending.accept().await {
        Ok(upgrade) => upgrade,
        Err(rejection) => return rejection,
    };
    let broadcaster = Arc::clone(state.context().broadcaster());
    upgrade.on_upgrade(move |mut socket| async move {
        debug!(channel = %channel, "WebSocket client connected");
        if let Err(e) = serve_channel(broadcaster.as_ref(), channel, &mut socket).await {
            error!(error = %e, "WebSocket relay ended with error");
        }
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use std::time::Duration;

    use thingcast_db::MemoryBroadcaster;
    use thingcast_types::ThingId;
    use tokio::sync::mpsc;

    use super::*;

    /// Records pushes; the push numbered `fail_at` (1-based) fails.
    struct FakeTransport {
        sent: Vec<Bytes>,
        fail_at: Option<(usize, TransportError)>,
        inbound: mpsc::UnboundedReceiver<Inbound>,
    }

    impl FakeTransport {
        fn new(fail_at: Option<(usize, TransportError)>) -> (Self, mpsc::UnboundedSender<Inbound>) {
            let (tx, rx) = mpsc::unbounded_channel();
            let transport = Self {
                sent: Vec::new(),
                fail_at,
                inbound: rx,
            };
            (transport, tx)
        }
    }

    #[async_trait]
    impl PushTransport for FakeTransport {
        async fn push(&mut self, payload: Bytes) -> Result<(), TransportError> {
            if let Some((at, err)) = &self.fail_at {
                if self.sent.len().saturating_add(1) == *at {
                    return Err(err.clone());
                }
            }
            self.sent.push(payload);
            Ok(())
        }

        async fn next_inbound(&mut self) -> Inbound {
            match self.inbound.recv().await {
                Some(inbound) => inbound,
                None => std::future::pending().await,
            }
        }
    }

    fn thing_channel(raw: &str) -> Channel {
        Channel::Thing(ThingId::new(raw).unwrap())
    }

    async fn wait_for_subscribers(hub: &MemoryBroadcaster, channel: &Channel, count: usize) {
        for _ in 0..200 {
            if hub.subscriber_count(channel).await == count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("expected {count} subscribers on {channel}");
    }

    fn spawn_bridge(
        hub: &Arc<MemoryBroadcaster>,
        channel: Channel,
        mut transport: FakeTransport,
    ) -> tokio::task::JoinHandle<(Result<(), BridgeError>, FakeTransport)> {
        let hub = Arc::clone(hub);
        tokio::spawn(async move {
            let result = serve_channel(hub.as_ref(), channel, &mut transport).await;
            (result, transport)
        })
    }

    #[tokio::test]
    async fn relays_in_order_until_peer_closes() {
        let hub = Arc::new(MemoryBroadcaster::new());
        let (transport, _inbound) = FakeTransport::new(Some((4, TransportError::Closed)));
        let task = spawn_bridge(&hub, Channel::All, transport);
        wait_for_subscribers(&hub, &Channel::All, 1).await;

        for payload in ["1", "2", "3", "4"] {
            hub.publish(&Channel::All, Bytes::from(payload)).await.unwrap();
        }

        let (result, transport) = task.await.unwrap();
        assert!(result.is_ok());
        assert_eq!(transport.sent, vec!["1", "2", "3"]);
        wait_for_subscribers(&hub, &Channel::All, 0).await;
    }

    #[tokio::test]
    async fn write_failure_is_reported_and_releases_subscription() {
        let hub = Arc::new(MemoryBroadcaster::new());
        let channel = thing_channel("a");
        let failure = TransportError::Failed("disk on fire".to_owned());
        let (transport, _inbound) = FakeTransport::new(Some((1, failure)));
        let task = spawn_bridge(&hub, channel.clone(), transport);
        wait_for_subscribers(&hub, &channel, 1).await;

        hub.publish(&channel, Bytes::from("x")).await.unwrap();

        let (result, _) = task.await.unwrap();
        match result {
            Err(BridgeError::Transport { channel, message }) => {
                assert_eq!(channel, "thing.a");
                assert_eq!(message, "disk on fire");
            }
            other => panic!("expected transport error, got {other:?}"),
        }
        wait_for_subscribers(&hub, &thing_channel("a"), 0).await;
    }

    #[tokio::test]
    async fn client_close_ends_the_relay() {
        let hub = Arc::new(MemoryBroadcaster::new());
        let (transport, inbound) = FakeTransport::new(None);
        let task = spawn_bridge(&hub, Channel::All, transport);
        wait_for_subscribers(&hub, &Channel::All, 1).await;

        inbound.send(Inbound::Ignored).unwrap();
        inbound.send(Inbound::Closed).unwrap();

        let (result, transport) = task.await.unwrap();
        assert!(result.is_ok());
        assert!(transport.sent.is_empty());
        wait_for_subscribers(&hub, &Channel::All, 0).await;
    }

    #[tokio::test]
    async fn thing_channel_only_sees_its_own_updates() {
        let hub = Arc::new(MemoryBroadcaster::new());
        let (transport, inbound) = FakeTransport::new(None);
        let task = spawn_bridge(&hub, thing_channel("a"), transport);
        wait_for_subscribers(&hub, &thing_channel("a"), 1).await;

        hub.publish(&thing_channel("b"), Bytes::from("b1")).await.unwrap();
        hub.publish(&thing_channel("a"), Bytes::from("a1")).await.unwrap();
        hub.publish(&Channel::All, Bytes::from("all")).await.unwrap();
        hub.publish(&thing_channel("a"), Bytes::from("a2")).await.unwrap();

        // Let the relay drain before closing.
        tokio::time::sleep(Duration::from_millis(50)).await;
        inbound.send(Inbound::Closed).unwrap();

        let (result, transport) = task.await.unwrap();
        assert!(result.is_ok());
        assert_eq!(transport.sent, vec!["a1", "a2"]);
    }

    #[test]
    fn broken_pipe_counts_as_peer_close() {
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe");
        assert_eq!(classify(&io), TransportError::Closed);

        let closed = std::io::Error::other("Trying to work with closed connection");
        assert_eq!(classify(&closed), TransportError::Closed);

        let other = std::io::Error::other("protocol violation");
        assert_eq!(
            classify(&other),
            TransportError::Failed("protocol violation".to_owned())
        );
    }
}
