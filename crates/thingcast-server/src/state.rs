//! Shared application state for the Thingcast server.
//!
//! [`AppState`] wraps the [`ServiceContext`] so handlers reach the snapshot
//! store, the broadcaster, and the tracked ids without any process-global
//! state. The server never writes snapshots; it only reads the store and
//! subscribes to channels.

use thingcast_core::ServiceContext;
use thingcast_db::ThingStore;
use thingcast_types::ThingId;

/// State shared by every handler, wrapped in an `Arc` by the router.
#[derive(Debug, Clone)]
pub struct AppState {
    ctx: ServiceContext,
}

impl AppState {
    /// Serve from `ctx`.
    pub const fn new(ctx: ServiceContext) -> Self {
        Self { ctx }
    }

    /// The service context.
    pub const fn context(&self) -> &ServiceContext {
        &self.ctx
    }

    /// The snapshot store.
    pub const fn store(&self) -> &ThingStore {
        self.ctx.store()
    }

    /// Resolve a raw path segment to a tracked id.
    ///
    /// Returns `None` when the segment is not a valid id or names a thing
    /// this service does not track.
    pub fn tracked_id(&self, raw: &str) -> Option<ThingId> {
        ThingId::new(raw).ok().filter(|id| self.ctx.is_tracked(id))
    }
}
