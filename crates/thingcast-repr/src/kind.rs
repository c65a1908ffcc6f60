//! The closed set of alternate representations.

use std::fmt;

/// A wire representation a domain type may support in addition to JSON.
///
/// JSON is always available and is deliberately not a variant here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RepresentationKind {
    /// Human-readable one line summary (`text/plain`).
    TextPlain,
    /// HTML summary document (`text/html`).
    TextHtml,
}

impl RepresentationKind {
    /// Every known kind, in registration order.
    pub const ALL: [Self; 2] = [Self::TextPlain, Self::TextHtml];

    /// The canonical mime type for this kind.
    pub const fn mime(self) -> &'static str {
        match self {
            Self::TextPlain => "text/plain",
            Self::TextHtml => "text/html",
        }
    }

    /// Resolve a canonical mime type back to its kind.
    pub fn from_mime(mime: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.mime().eq_ignore_ascii_case(mime.trim()))
    }
}

impl fmt::Display for RepresentationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mime())
    }
}
