//! Content negotiation on top of axum.
//!
//! - [`router`] -- route registration, representation discovery, and the
//!   split between negotiated and `WebSocket` handlers on a path
//! - [`dispatch`] -- the per-request state machine
//! - [`args`] -- aggregated argument resolution
//! - [`body`] -- JSON and form body intake
//! - [`carrier`] -- status, header and background work staged by handlers
//! - [`serialize`] -- include/exclude/alias shaping of JSON output
//! - [`openapi`] -- the route metadata document

pub mod args;
pub mod body;
pub mod carrier;
pub mod dispatch;
pub mod openapi;
pub mod router;
pub mod serialize;

pub use args::{ArgError, ArgErrors, ArgResolver, Extract, RequestInput};
pub use body::{BodyKind, MAX_BODY_BYTES};
pub use carrier::ResponseCarrier;
pub use dispatch::{Endpoint, HandlerOutput, HandlerResult, JSON_MIME, blocking};
pub use router::{NegotiatingRouter, PathParams, PendingUpgrade, RouteDescriptor, RouteSpec};
pub use serialize::SerializeOptions;
