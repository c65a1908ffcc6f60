//! Error types for the state backends.
//!
//! All errors are propagated via [`StoreError`] which wraps the underlying
//! [`fred`] and NATS errors with context about which operation failed.

/// Errors that can occur in the store or broadcast backends.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A `Dragonfly`/Redis operation failed.
    #[error("Dragonfly error: {0}")]
    Dragonfly(#[from] fred::error::Error),

    /// A NATS operation failed.
    #[error("NATS error: {0}")]
    Nats(String),

    /// A snapshot could not be serialized or deserialized.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A configuration error (bad URL and the like).
    #[error("Configuration error: {0}")]
    Config(String),
}
