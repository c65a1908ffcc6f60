//! Error types for representation conversion.

/// Errors raised while converting a value to or from a wire representation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReprError {
    /// The converter does not support this direction (usually decoding).
    #[error("converting from {mime} content is not supported")]
    Unsupported {
        /// The mime type of the representation.
        mime: &'static str,
    },

    /// Rendering a value failed. Treated as a server fault.
    #[error("failed to encode {mime}: {message}")]
    Encode {
        /// The mime type of the representation.
        mime: &'static str,
        /// Description of the failure.
        message: String,
    },

    /// Parsing bytes of a representation failed.
    #[error("failed to decode {mime}: {message}")]
    Decode {
        /// The mime type of the representation.
        mime: &'static str,
        /// Description of the failure.
        message: String,
    },
}
