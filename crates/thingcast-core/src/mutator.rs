//! Snapshot mutator.
//!
//! For every tracked id the mutator runs one autonomous update loop:
//!
//! 1. generate a new random [`Thing`] for the id
//! 2. store it (last write wins)
//! 3. publish the stored JSON to the id's channel, then to the `all` channel
//! 4. sleep a random delay from the configured range, then repeat
//!
//! Loops are supervised independently. A failed iteration is logged and
//! the loop carries on; a loop that panics is restarted after a backoff
//! without disturbing its siblings. The `created` timestamp of an id only
//! ever moves forward, including across restarts, because each loop seeds
//! itself from the stored snapshot.

use std::panic::AssertUnwindSafe;
use std::time::Duration;

use bytes::Bytes;
use chrono::{DateTime, SubsecRound as _, TimeDelta, Utc};
use futures::FutureExt as _;
use rand::Rng as _;
use thingcast_types::{Channel, Thing, ThingId};
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::config::MutatorConfig;
use crate::context::ServiceContext;
use crate::error::MutatorError;

/// Shutdown signal observed by every update loop.
///
/// Triggered by sending `true` on the paired sender. Dropping the sender
/// counts as a trigger too.
#[derive(Debug, Clone)]
pub struct Shutdown {
    rx: watch::Receiver<bool>,
}

impl Shutdown {
    /// Create a trigger and its signal.
    pub fn channel() -> (watch::Sender<bool>, Self) {
        let (tx, rx) = watch::channel(false);
        (tx, Self { rx })
    }

    /// Whether shutdown has been requested.
    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow() || self.rx.has_changed().is_err()
    }

    /// Wait until shutdown is requested.
    pub async fn wait(&mut self) {
        // An error means the sender is gone, which also ends the wait.
        let _ = self.rx.wait_for(|stop| *stop).await;
    }
}

/// How a supervised loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoopExit {
    Stopped,
    Panicked,
}

/// Generates and publishes snapshots for every tracked id.
#[derive(Debug, Clone)]
pub struct Mutator {
    ctx: ServiceContext,
    min_delay_ms: u64,
    max_delay_ms: u64,
    restart_backoff: Duration,
}

impl Mutator {
    /// Create a mutator publishing through `ctx` with the timing from `config`.
    pub fn new(ctx: ServiceContext, config: &MutatorConfig) -> Self {
        Self {
            ctx,
            min_delay_ms: config.min_delay_ms,
            max_delay_ms: config.max_delay_ms,
            restart_backoff: config.restart_backoff(),
        }
    }

    /// The context this mutator publishes through.
    pub const fn context(&self) -> &ServiceContext {
        &self.ctx
    }

    /// Run one iteration for `id`: generate, store, publish to the id's
    /// channel and then to `all`.
    ///
    /// The new snapshot's `created` is strictly later than `previous`'s.
    ///
    /// # Errors
    ///
    /// Returns [`MutatorError::Backend`] if the write or either publish
    /// fails. A failed publish leaves the stored snapshot in place.
    pub async fn mutate_once(
        &self,
        id: &ThingId,
        previous: Option<&Thing>,
    ) -> Result<Thing, MutatorError> {
        let created = next_created(Utc::now(), previous);
        let thing = Thing::new_random(id.clone(), created, &mut rand::rng());

        let payload = Bytes::from(self.ctx.store().save(&thing).await?);
        let broadcaster = self.ctx.broadcaster();
        broadcaster
            .publish(&Channel::Thing(id.clone()), payload.clone())
            .await?;
        broadcaster.publish(&Channel::All, payload).await?;

        debug!(
            thing_id = %id,
            color = %thing.color,
            kind = %thing.kind,
            created = %thing.created_iso(),
            "published snapshot"
        );
        Ok(thing)
    }

    /// Run every update loop until `shutdown` fires.
    ///
    /// # Errors
    ///
    /// Returns [`MutatorError::NoIds`] if the context tracks no ids.
    pub async fn run(&self, shutdown: Shutdown) -> Result<(), MutatorError> {
        if self.ctx.thing_ids().is_empty() {
            return Err(MutatorError::NoIds);
        }

        let mut loops = JoinSet::new();
        for id in self.ctx.thing_ids() {
            loops.spawn(
                self.clone()
                    .supervised(id.clone(), shutdown.clone(), Duration::ZERO),
            );
        }
        info!(ids = self.ctx.thing_ids().len(), "Mutator started");

        while let Some(joined) = loops.join_next().await {
            match joined {
                Ok((id, LoopExit::Panicked)) if !shutdown.is_triggered() => {
                    warn!(
                        thing_id = %id,
                        backoff_ms = self.restart_backoff.as_millis(),
                        "update loop panicked, restarting"
                    );
                    loops.spawn(
                        self.clone()
                            .supervised(id, shutdown.clone(), self.restart_backoff),
                    );
                }
                Ok((id, _)) => debug!(thing_id = %id, "update loop stopped"),
                Err(e) => error!(error = %e, "update loop task failed"),
            }
        }

        info!("Mutator stopped");
        Ok(())
    }

    /// One loop under panic supervision. Waits `backoff` before starting.
    async fn supervised(
        self,
        id: ThingId,
        mut shutdown: Shutdown,
        backoff: Duration,
    ) -> (ThingId, LoopExit) {
        if !backoff.is_zero() {
            tokio::select! {
                () = tokio::time::sleep(backoff) => {}
                () = shutdown.wait() => return (id, LoopExit::Stopped),
            }
        }
        let outcome = AssertUnwindSafe(self.update_loop(&id, shutdown))
            .catch_unwind()
            .await;
        match outcome {
            Ok(()) => (id, LoopExit::Stopped),
            Err(_) => (id, LoopExit::Panicked),
        }
    }

    async fn update_loop(&self, id: &ThingId, mut shutdown: Shutdown) {
        let mut previous = match self.ctx.store().load(id).await {
            Ok(previous) => previous,
            Err(e) => {
                warn!(thing_id = %id, error = %e, "could not load stored snapshot");
                None
            }
        };
        debug!(thing_id = %id, seeded = previous.is_some(), "update loop started");

        while !shutdown.is_triggered() {
            match self.mutate_once(id, previous.as_ref()).await {
                Ok(thing) => previous = Some(thing),
                Err(e) => error!(thing_id = %id, error = %e, "mutation failed"),
            }
            tokio::select! {
                () = tokio::time::sleep(self.next_delay()) => {}
                () = shutdown.wait() => break,
            }
        }
    }

    fn next_delay(&self) -> Duration {
        let ms = if self.min_delay_ms >= self.max_delay_ms {
            self.min_delay_ms
        } else {
            rand::rng().random_range(self.min_delay_ms..=self.max_delay_ms)
        };
        Duration::from_millis(ms)
    }
}

/// `now` at microsecond precision, pushed past `previous.created` if needed.
fn next_created(now: DateTime<Utc>, previous: Option<&Thing>) -> DateTime<Utc> {
    let now = now.trunc_subsecs(6);
    match previous {
        Some(prev) if now <= prev.created => prev
            .created
            .checked_add_signed(TimeDelta::microseconds(1))
            .unwrap_or(now),
        _ => now,
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::panic,
    clippy::indexing_slicing,
    clippy::arithmetic_side_effects
)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use futures::StreamExt as _;
    use thingcast_db::{
        Broadcaster, MemoryStore, SnapshotStore, StoreError, Subscription, ThingStore,
    };
    use thingcast_types::{ThingColor, ThingType};

    use super::*;

    /// Records every publish in order.
    #[derive(Default)]
    struct RecordingBroadcaster {
        published: Mutex<Vec<(String, Bytes)>>,
    }

    impl RecordingBroadcaster {
        fn subjects(&self) -> Vec<String> {
            self.published
                .lock()
                .unwrap()
                .iter()
                .map(|(subject, _)| subject.clone())
                .collect()
        }

        fn count(&self, subject: &str) -> usize {
            self.subjects().iter().filter(|s| *s == subject).count()
        }
    }

    #[async_trait]
    impl Broadcaster for RecordingBroadcaster {
        async fn publish(&self, channel: &Channel, payload: Bytes) -> Result<(), StoreError> {
            self.published
                .lock()
                .unwrap()
                .push((channel.subject(), payload));
            Ok(())
        }

        async fn subscribe(&self, channel: &Channel) -> Result<Subscription, StoreError> {
            Ok(Subscription::new(
                channel.clone(),
                futures::stream::empty::<Bytes>().boxed(),
            ))
        }
    }

    /// Memory store that always fails writes for one key and panics on the
    /// first write to another.
    #[derive(Default)]
    struct FaultyStore {
        inner: MemoryStore,
        failing_key: Option<String>,
        panicking_key: Option<String>,
        panicked: AtomicBool,
    }

    #[async_trait]
    impl SnapshotStore for FaultyStore {
        async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
            self.inner.get(key).await
        }

        async fn set(&self, key: &str, value: String) -> Result<(), StoreError> {
            if self.failing_key.as_deref() == Some(key) {
                return Err(StoreError::Config(format!("write to {key} refused")));
            }
            if self.panicking_key.as_deref() == Some(key)
                && !self.panicked.swap(true, Ordering::SeqCst)
            {
                panic!("store exploded on {key}");
            }
            self.inner.set(key, value).await
        }
    }

    fn id(raw: &str) -> ThingId {
        ThingId::new(raw).unwrap()
    }

    fn fast_config() -> MutatorConfig {
        MutatorConfig {
            min_delay_ms: 10,
            max_delay_ms: 20,
            restart_backoff_ms: 5,
            ..MutatorConfig::default()
        }
    }

    fn recording_mutator(ids: &[&str]) -> (Mutator, Arc<RecordingBroadcaster>, ThingStore) {
        let hub = Arc::new(RecordingBroadcaster::default());
        let store = ThingStore::new(Arc::new(MemoryStore::new()));
        let ctx = ServiceContext::new(
            store.clone(),
            hub.clone(),
            ids.iter().map(|raw| id(raw)).collect(),
        );
        (Mutator::new(ctx, &fast_config()), hub, store)
    }

    #[tokio::test]
    async fn publishes_id_channel_then_all() {
        let (mutator, hub, store) = recording_mutator(&["a"]);
        let thing = mutator.mutate_once(&id("a"), None).await.unwrap();

        assert_eq!(hub.subjects(), vec!["thing.a", "thing.all"]);
        let published = hub.published.lock().unwrap().clone();
        assert_eq!(published[0].1, published[1].1);
        let decoded: Thing = serde_json::from_slice(&published[0].1).unwrap();
        assert_eq!(decoded, thing);
        assert_eq!(store.load(&id("a")).await.unwrap(), Some(thing));
    }

    #[tokio::test]
    async fn created_strictly_increases() {
        let (mutator, _hub, store) = recording_mutator(&["a"]);
        let future = Utc::now() + TimeDelta::hours(1);
        let seed = Thing::new(id("a"), ThingColor::Red, ThingType::Dog, future);

        let mut previous = seed.clone();
        for _ in 0..5 {
            let next = mutator.mutate_once(&id("a"), Some(&previous)).await.unwrap();
            assert!(next.created > previous.created);
            previous = next;
        }
        assert_eq!(previous.created, seed.created + TimeDelta::microseconds(5));
        assert_eq!(store.load(&id("a")).await.unwrap(), Some(previous));
    }

    #[test]
    fn next_created_uses_now_when_later() {
        let now = DateTime::from_timestamp_micros(2_000_000).unwrap();
        let earlier = Thing::new(
            id("a"),
            ThingColor::Blue,
            ThingType::Sign,
            DateTime::from_timestamp_micros(1_000_000).unwrap(),
        );
        assert_eq!(next_created(now, Some(&earlier)), now);
        assert_eq!(next_created(now, None), now);
    }

    #[test]
    fn next_created_truncates_before_comparing() {
        let prev_at = DateTime::from_timestamp_micros(1_000_000).unwrap();
        let prev = Thing::new(id("a"), ThingColor::Blue, ThingType::Sign, prev_at);
        // Same microsecond as `prev`, plus some nanoseconds.
        let now = prev_at + TimeDelta::nanoseconds(400);
        assert_eq!(
            next_created(now, Some(&prev)),
            prev_at + TimeDelta::microseconds(1)
        );
    }

    #[tokio::test]
    async fn run_without_ids_is_an_error() {
        let (mutator, _hub, _store) = recording_mutator(&[]);
        let (_trigger, shutdown) = Shutdown::channel();
        assert!(matches!(mutator.run(shutdown).await, Err(MutatorError::NoIds)));
    }

    #[tokio::test(start_paused = true)]
    async fn run_updates_every_id_until_shutdown() {
        let (mutator, hub, store) = recording_mutator(&["a", "b"]);
        let (trigger, shutdown) = Shutdown::channel();
        let running = tokio::spawn(async move { mutator.run(shutdown).await });

        tokio::time::sleep(Duration::from_millis(100)).await;
        trigger.send_replace(true);
        running.await.unwrap().unwrap();

        assert!(hub.count("thing.a") >= 2);
        assert!(hub.count("thing.b") >= 2);
        assert_eq!(hub.count("thing.all"), hub.count("thing.a") + hub.count("thing.b"));
        assert!(store.load(&id("a")).await.unwrap().is_some());

        // Nothing is published after the loops stopped.
        let published = hub.subjects().len();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(hub.subjects().len(), published);
    }

    #[tokio::test(start_paused = true)]
    async fn per_id_publishes_are_ordered() {
        let (mutator, hub, _store) = recording_mutator(&["a"]);
        let (trigger, shutdown) = Shutdown::channel();
        let running = tokio::spawn(async move { mutator.run(shutdown).await });
        tokio::time::sleep(Duration::from_millis(100)).await;
        trigger.send_replace(true);
        running.await.unwrap().unwrap();

        let published = hub.published.lock().unwrap().clone();
        let mut last_created = None;
        for pair in published.chunks(2) {
            assert_eq!(pair[0].0, "thing.a");
            assert_eq!(pair[1].0, "thing.all");
            let thing: Thing = serde_json::from_slice(&pair[1].1).unwrap();
            if let Some(last) = last_created {
                assert!(thing.created > last);
            }
            last_created = Some(thing.created);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn failing_loop_does_not_stop_others() {
        let hub = Arc::new(RecordingBroadcaster::default());
        let faulty = FaultyStore {
            failing_key: Some(id("bad").state_key()),
            ..FaultyStore::default()
        };
        let ctx = ServiceContext::new(
            ThingStore::new(Arc::new(faulty)),
            hub.clone(),
            vec![id("bad"), id("good")],
        );
        let mutator = Mutator::new(ctx, &fast_config());
        let (trigger, shutdown) = Shutdown::channel();
        let running = tokio::spawn(async move { mutator.run(shutdown).await });

        tokio::time::sleep(Duration::from_millis(100)).await;
        trigger.send_replace(true);
        running.await.unwrap().unwrap();

        assert!(hub.count("thing.good") >= 2);
        assert_eq!(hub.count("thing.bad"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn panicking_loop_is_restarted() {
        let hub = Arc::new(RecordingBroadcaster::default());
        let faulty = FaultyStore {
            panicking_key: Some(id("p").state_key()),
            ..FaultyStore::default()
        };
        let store = ThingStore::new(Arc::new(faulty));
        let ctx = ServiceContext::new(store.clone(), hub.clone(), vec![id("p"), id("q")]);
        let mutator = Mutator::new(ctx, &fast_config());
        let (trigger, shutdown) = Shutdown::channel();
        let running = tokio::spawn(async move { mutator.run(shutdown).await });

        tokio::time::sleep(Duration::from_millis(100)).await;
        trigger.send_replace(true);
        running.await.unwrap().unwrap();

        assert!(store.load(&id("p")).await.unwrap().is_some());
        assert!(hub.count("thing.p") >= 1);
        assert!(hub.count("thing.q") >= 2);
    }

    #[tokio::test]
    async fn dropped_trigger_counts_as_shutdown() {
        let (trigger, mut shutdown) = Shutdown::channel();
        assert!(!shutdown.is_triggered());
        drop(trigger);
        assert!(shutdown.is_triggered());
        shutdown.wait().await;
    }

    #[test]
    fn delay_stays_in_range() {
        let (mutator, _hub, _store) = recording_mutator(&["a"]);
        for _ in 0..100 {
            let delay = mutator.next_delay();
            assert!(delay >= Duration::from_millis(10));
            assert!(delay <= Duration::from_millis(20));
        }
    }
}
