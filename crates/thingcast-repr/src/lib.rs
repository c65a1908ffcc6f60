//! Wire representations for Thingcast resources.
//!
//! A *representation* is a mime type a domain value can be rendered as,
//! beyond the default JSON body every route produces. This crate holds the
//! pieces the negotiating router needs to reason about representations
//! without knowing anything about the concrete domain:
//!
//! - [`kind`] -- the closed set of representation kinds the server knows
//! - [`registry`] -- mime string to kind mapping, consulted at route
//!   registration and at request time
//! - [`capability`] -- the per-type encode/decode contract
//!   ([`Representable`], [`Capability`])
//! - [`model`] -- declared route result types (single value or sequence)
//!   and registration-time capability discovery
//! - [`error`] -- conversion failures
//!
//! # Static capability table
//!
//! A domain type declares, at definition time, exactly which kinds it can
//! be rendered as by implementing [`Representable::capability`]. Nothing is
//! inferred at runtime: the router asks the type, and a `None` answer means
//! the pairing simply does not exist.

pub mod capability;
pub mod error;
pub mod kind;
pub mod model;
pub mod registry;

pub use capability::{Capability, DecodeFn, EncodeFn, Representable};
pub use error::ReprError;
pub use kind::RepresentationKind;
pub use model::{Renderable, ResultModel, Shape, discover};
pub use registry::RepresentationRegistry;
