//! Mapping from requested mime strings to representation kinds.
//!
//! The registry is built once at startup and handed to the negotiating
//! router. It is read in two places:
//!
//! - **Route registration** -- every entry is offered to the route's
//!   declared result type to discover which mime types the route can
//!   render (see [`discover`](crate::model::discover)).
//! - **Request time** -- the client's requested mime type is looked up to
//!   find the kind whose capability should encode the handler's value.
//!
//! Several mime strings may map to the same kind (for example an alias such
//! as `text/x-summary` for [`RepresentationKind::TextPlain`]).

use std::collections::BTreeMap;

use crate::kind::RepresentationKind;

/// Mime type to [`RepresentationKind`] table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepresentationRegistry {
    entries: BTreeMap<String, RepresentationKind>,
}

impl RepresentationRegistry {
    /// Create an empty registry.
    pub const fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Registry with every [`RepresentationKind`] under its canonical mime type.
    pub fn standard() -> Self {
        RepresentationKind::ALL
            .into_iter()
            .fold(Self::new(), |registry, kind| registry.with(kind.mime(), kind))
    }

    /// Register `mime` as rendering `kind`.
    ///
    /// The mime string is stored trimmed and lowercased. Returns the kind
    /// previously registered under the same mime type, if any.
    pub fn register(
        &mut self,
        mime: impl AsRef<str>,
        kind: RepresentationKind,
    ) -> Option<RepresentationKind> {
        self.entries.insert(normalize(mime.as_ref()), kind)
    }

    /// Builder-style variant of [`register`](Self::register).
    #[must_use]
    pub fn with(mut self, mime: impl AsRef<str>, kind: RepresentationKind) -> Self {
        self.register(mime, kind);
        self
    }

    /// Look up the kind registered for `mime`.
    pub fn lookup(&self, mime: &str) -> Option<RepresentationKind> {
        self.entries.get(&normalize(mime)).copied()
    }

    /// Iterate over `(mime, kind)` pairs in mime order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, RepresentationKind)> {
        self.entries.iter().map(|(mime, kind)| (mime.as_str(), *kind))
    }

    /// Number of registered mime types.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no mime type is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn normalize(mime: &str) -> String {
    mime.trim().to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_registers_canonical_mimes() {
        let registry = RepresentationRegistry::standard();
        assert_eq!(registry.len(), 2);
        assert_eq!(
            registry.lookup("text/plain"),
            Some(RepresentationKind::TextPlain)
        );
        assert_eq!(
            registry.lookup("text/html"),
            Some(RepresentationKind::TextHtml)
        );
    }

    #[test]
    fn lookup_of_unregistered_mime_is_none() {
        let registry = RepresentationRegistry::standard();
        assert_eq!(registry.lookup("application/xml"), None);
        assert_eq!(registry.lookup("application/json"), None);
    }

    #[test]
    fn register_normalizes_and_replaces() {
        let mut registry = RepresentationRegistry::new();
        assert!(registry.is_empty());
        assert_eq!(
            registry.register(" Text/X-Summary ", RepresentationKind::TextPlain),
            None
        );
        assert_eq!(
            registry.lookup("text/x-summary"),
            Some(RepresentationKind::TextPlain)
        );

        let previous = registry.register("text/x-summary", RepresentationKind::TextHtml);
        assert_eq!(previous, Some(RepresentationKind::TextPlain));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn iter_is_sorted_by_mime() {
        let registry = RepresentationRegistry::standard();
        let mimes: Vec<&str> = registry.iter().map(|(mime, _)| mime).collect();
        assert_eq!(mimes, vec!["text/html", "text/plain"]);
    }
}
