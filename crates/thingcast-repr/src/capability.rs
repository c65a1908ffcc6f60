//! Per-type conversion capabilities.
//!
//! A [`Capability`] pairs a [`RepresentationKind`] with the functions that
//! convert a domain value to and from that representation. Encoding is
//! always present. Decoding is optional: a type may be renderable as HTML
//! without being parseable from it, in which case [`Capability::decode`]
//! reports [`ReprError::Unsupported`] instead of silently succeeding.

use std::fmt;

use crate::error::ReprError;
use crate::kind::RepresentationKind;

/// Function rendering a value into representation bytes.
pub type EncodeFn<T> = fn(&T) -> Result<Vec<u8>, ReprError>;

/// Function parsing representation bytes into a value.
pub type DecodeFn<T> = fn(&[u8]) -> Result<T, ReprError>;

/// Conversion functions for one `(type, kind)` pairing.
pub struct Capability<T> {
    kind: RepresentationKind,
    encode: EncodeFn<T>,
    decode: Option<DecodeFn<T>>,
}

impl<T> Capability<T> {
    /// A capability supporting both directions.
    pub const fn new(kind: RepresentationKind, encode: EncodeFn<T>, decode: DecodeFn<T>) -> Self {
        Self {
            kind,
            encode,
            decode: Some(decode),
        }
    }

    /// A capability that can only render values.
    pub const fn encode_only(kind: RepresentationKind, encode: EncodeFn<T>) -> Self {
        Self {
            kind,
            encode,
            decode: None,
        }
    }

    /// The representation this capability converts.
    pub const fn kind(&self) -> RepresentationKind {
        self.kind
    }

    /// Whether [`decode`](Self::decode) is implemented.
    pub const fn can_decode(&self) -> bool {
        self.decode.is_some()
    }

    /// Render `value` as this representation.
    ///
    /// # Errors
    ///
    /// Returns [`ReprError::Encode`] if the type's encoder fails.
    pub fn encode(&self, value: &T) -> Result<Vec<u8>, ReprError> {
        (self.encode)(value)
    }

    /// Parse `bytes` of this representation.
    ///
    /// # Errors
    ///
    /// Returns [`ReprError::Unsupported`] for encode-only capabilities, or
    /// [`ReprError::Decode`] if the bytes are not a valid rendering.
    pub fn decode(&self, bytes: &[u8]) -> Result<T, ReprError> {
        self.decode.map_or(
            Err(ReprError::Unsupported {
                mime: self.kind.mime(),
            }),
            |decode| decode(bytes),
        )
    }
}

impl<T> Clone for Capability<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Capability<T> {}

impl<T> fmt::Debug for Capability<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Capability")
            .field("kind", &self.kind)
            .field("can_decode", &self.can_decode())
            .finish_non_exhaustive()
    }
}

/// A domain type with a static table of supported representations.
pub trait Representable: Sized {
    /// The capability for `kind`, or `None` if the type cannot be rendered
    /// that way.
    fn capability(kind: RepresentationKind) -> Option<Capability<Self>>;

    /// A representative value used to produce documentation examples.
    fn sample() -> Self;
}
