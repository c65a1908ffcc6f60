//! The explicitly constructed service context.
//!
//! A [`ServiceContext`] bundles the collaborators that both the request
//! path and the mutator need: the snapshot store, the broadcaster, and the
//! list of tracked ids. It is built once at startup, cloned into every
//! consumer, and torn down with [`ServiceContext::shutdown`].

use std::sync::Arc;

use thingcast_db::{
    Broadcaster, DragonflyStore, MemoryBroadcaster, MemoryStore, NatsBroadcaster, ThingStore,
};
use thingcast_types::ThingId;
use tracing::info;

use crate::config::{BackendKind, ServiceConfig};
use crate::error::ContextError;

/// Shared collaborators of the server and the mutator.
#[derive(Clone)]
pub struct ServiceContext {
    store: ThingStore,
    broadcaster: Arc<dyn Broadcaster>,
    thing_ids: Arc<[ThingId]>,
}

impl ServiceContext {
    /// Assemble a context from already-connected parts.
    pub fn new(store: ThingStore, broadcaster: Arc<dyn Broadcaster>, thing_ids: Vec<ThingId>) -> Self {
        Self {
            store,
            broadcaster,
            thing_ids: thing_ids.into(),
        }
    }

    /// Connect the backends selected by `config`.
    ///
    /// # Errors
    ///
    /// Returns [`ContextError::Config`] if the tracked ids are invalid, or
    /// [`ContextError::Backend`] if `Dragonfly` or NATS cannot be reached.
    pub async fn connect(config: &ServiceConfig) -> Result<Self, ContextError> {
        let thing_ids = config.mutator.thing_ids()?;
        match config.backend.kind {
            BackendKind::Memory => {
                info!(ids = thing_ids.len(), "Using in-memory backends");
                Ok(Self::in_memory(thing_ids))
            }
            BackendKind::External => {
                info!(url = %config.backend.dragonfly_url, "Connecting to Dragonfly");
                let store = DragonflyStore::connect(&config.backend.dragonfly_url).await?;
                info!(url = %config.backend.nats_url, "Connecting to NATS");
                let broadcaster = NatsBroadcaster::connect(&config.backend.nats_url).await?;
                Ok(Self::new(
                    ThingStore::new(Arc::new(store)),
                    Arc::new(broadcaster),
                    thing_ids,
                ))
            }
        }
    }

    /// Build a context on in-process backends.
    pub fn in_memory(thing_ids: Vec<ThingId>) -> Self {
        Self::new(
            ThingStore::new(Arc::new(MemoryStore::new())),
            Arc::new(MemoryBroadcaster::new()),
            thing_ids,
        )
    }

    /// The snapshot store.
    pub const fn store(&self) -> &ThingStore {
        &self.store
    }

    /// The broadcast backend.
    pub fn broadcaster(&self) -> &Arc<dyn Broadcaster> {
        &self.broadcaster
    }

    /// Tracked ids, in configuration order.
    pub fn thing_ids(&self) -> &[ThingId] {
        &self.thing_ids
    }

    /// Whether `id` is one of the tracked ids.
    pub fn is_tracked(&self, id: &ThingId) -> bool {
        self.thing_ids.contains(id)
    }

    /// Flush pending publishes and close the store connection.
    ///
    /// # Errors
    ///
    /// Returns [`ContextError::Backend`] if either backend fails to shut
    /// down cleanly. The store is closed even when the flush fails.
    pub async fn shutdown(&self) -> Result<(), ContextError> {
        let flushed = self.broadcaster.flush().await;
        self.store.close().await?;
        flushed?;
        info!("Service context shut down");
        Ok(())
    }
}

impl std::fmt::Debug for ServiceContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceContext")
            .field("thing_ids", &self.thing_ids)
            .finish_non_exhaustive()
    }
}
