//! Configuration, service context, and the snapshot mutator for Thingcast.
//!
//! # Modules
//!
//! - [`config`] -- YAML configuration with environment overrides
//! - [`logging`] -- `tracing` subscriber setup shared by the binaries
//! - [`context`] -- [`ServiceContext`], the shared store/broadcaster bundle
//! - [`mutator`] -- Per-id update loops that generate and publish snapshots
//! - [`runtime`] -- Runs the mutator on its own thread and scheduler
//! - [`error`] -- Context and mutator errors

pub mod config;
pub mod context;
pub mod error;
pub mod logging;
pub mod mutator;
pub mod runtime;

pub use config::{BackendKind, ConfigError, ServiceConfig};
pub use context::ServiceContext;
pub use error::{ContextError, MutatorError};
pub use mutator::{Mutator, Shutdown};
pub use runtime::MutatorRuntime;
