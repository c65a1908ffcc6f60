//! Shared state backends for Thingcast.
//!
//! Two collaborators connect the request-serving process and the mutator:
//!
//! - a **snapshot store** holding the latest serialized snapshot of every
//!   thing ([`SnapshotStore`], last write wins per key), and
//! - a **broadcast backend** fanning published snapshots out to any number
//!   of subscribers per channel ([`Broadcaster`]).
//!
//! Each has a production implementation (`Dragonfly` via `fred`, NATS via
//! `async-nats`) that works across process boundaries, and an in-memory
//! implementation for single-process runs and tests.
//!
//! # Modules
//!
//! - [`store`] -- [`SnapshotStore`] contract and the typed [`ThingStore`]
//! - [`dragonfly`] -- `Dragonfly` (Redis-compatible) snapshot store
//! - [`memory`] -- In-process store and broadcaster
//! - [`broadcast`] -- [`Broadcaster`] contract and [`Subscription`] handle
//! - [`nats`] -- NATS broadcaster
//! - [`error`] -- Shared error type

pub mod broadcast;
pub mod dragonfly;
pub mod error;
pub mod memory;
pub mod nats;
pub mod store;

pub use broadcast::{Broadcaster, Subscription};
pub use dragonfly::DragonflyStore;
pub use error::StoreError;
pub use memory::{MemoryBroadcaster, MemoryStore};
pub use nats::NatsBroadcaster;
pub use store::{SnapshotStore, ThingStore};
