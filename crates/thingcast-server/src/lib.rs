//! HTTP and `WebSocket` server for Thingcast.
//!
//! This crate provides an Axum server that exposes:
//!
//! - **Negotiated REST endpoints** (`/thing/`, `/thing/{id}`) rendering
//!   thing snapshots as JSON or any representation registered in the
//!   [`RepresentationRegistry`](thingcast_repr::RepresentationRegistry),
//!   chosen from the `Accept` header
//! - **`WebSocket` endpoints** on the same paths relaying every published
//!   snapshot to connected clients
//! - **Route metadata** (`/openapi.json`) listing every representation a
//!   route can produce, with examples
//! - **Minimal HTML status page** (`GET /`) and a health check
//!
//! # Architecture
//!
//! The server only reads: snapshots come from the store and live updates
//! from the broadcaster, both reached through the
//! [`ServiceContext`](thingcast_core::ServiceContext). Writes happen in the
//! mutator, which runs on its own runtime (embedded) or in the separate
//! `thingcast-publisher` process.
//!
//! The [`negotiate`] module holds the generic machinery (registration-time
//! representation discovery and the per-request dispatcher); the rest of
//! the crate is the Thingcast application built on it.

pub mod error;
pub mod handlers;
pub mod negotiate;
pub mod router;
pub mod server;
pub mod startup;
pub mod state;
pub mod ws;

// Re-export primary types for convenience.
pub use error::{BridgeError, DispatchError};
pub use router::{build_router, build_router_with};
pub use server::{ServerError, start_server};
pub use startup::StartupError;
pub use state::AppState;
