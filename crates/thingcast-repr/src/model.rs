//! Declared route result types and registration-time discovery.
//!
//! A route declares the type its handler produces. That type is either a
//! single [`Representable`] value or a sequence of them (`Vec<T>`). The
//! [`ResultModel`] trait captures that shape so the router can:
//!
//! 1. discover, once at registration, which registered mime types the
//!    route can render ([`discover`]), and
//! 2. encode a handler's value with the element type's capability at
//!    request time ([`ResultModel::encode_with`]).
//!
//! Sequences are rendered element by element and joined with the same
//! bracket notation used for documentation examples: `[<e1>, <e2>]`.

use serde::Serialize;

use crate::capability::{Capability, Representable};
use crate::error::ReprError;
use crate::kind::RepresentationKind;
use crate::registry::RepresentationRegistry;

/// Whether a route returns one value or a sequence of values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    /// A single element value.
    Single,
    /// A sequence of element values.
    Sequence,
}

/// A type a route may declare as its result.
pub trait ResultModel: Serialize + Send + 'static {
    /// The element type whose capabilities govern negotiation.
    type Item: Representable;

    /// Single value or sequence.
    const SHAPE: Shape;

    /// Render this value with the element capability `cap`.
    ///
    /// # Errors
    ///
    /// Propagates the element encoder's [`ReprError`].
    fn encode_with(&self, cap: &Capability<Self::Item>) -> Result<Vec<u8>, ReprError>;

    /// Parse bytes rendered with the element capability `cap`.
    ///
    /// # Errors
    ///
    /// Propagates the element decoder's [`ReprError`].
    fn decode_with(cap: &Capability<Self::Item>, bytes: &[u8]) -> Result<Self, ReprError>
    where
        Self: Sized;

    /// The element capability for `kind`, if the element type has one.
    fn item_capability(kind: RepresentationKind) -> Option<Capability<Self::Item>> {
        Self::Item::capability(kind)
    }
}

/// Implements [`ResultModel`] for a single [`Representable`] type.
///
/// ```rust,ignore
/// thingcast_repr::single_result_model!(Thing);
/// ```
#[macro_export]
macro_rules! single_result_model {
    ($ty:ty) => {
        impl $crate::model::ResultModel for $ty {
            type Item = Self;

            const SHAPE: $crate::model::Shape = $crate::model::Shape::Single;

            fn encode_with(
                &self,
                cap: &$crate::capability::Capability<Self>,
            ) -> Result<Vec<u8>, $crate::error::ReprError> {
                cap.encode(self)
            }

            fn decode_with(
                cap: &$crate::capability::Capability<Self>,
                bytes: &[u8],
            ) -> Result<Self, $crate::error::ReprError> {
                cap.decode(bytes)
            }
        }
    };
}

impl<T> ResultModel for Vec<T>
where
    T: Representable + Serialize + Send + 'static,
{
    type Item = T;

    const SHAPE: Shape = Shape::Sequence;

    fn encode_with(&self, cap: &Capability<T>) -> Result<Vec<u8>, ReprError> {
        let mut out = vec![b'['];
        for (index, item) in self.iter().enumerate() {
            if index > 0 {
                out.extend_from_slice(b", ");
            }
            out.extend(cap.encode(item)?);
        }
        out.push(b']');
        Ok(out)
    }

    fn decode_with(cap: &Capability<T>, _bytes: &[u8]) -> Result<Self, ReprError> {
        Err(ReprError::Unsupported {
            mime: cap.kind().mime(),
        })
    }
}

/// A mime type a route can render, with its documentation example.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Renderable {
    /// The registered mime type clients request.
    pub mime: String,
    /// The kind that mime type resolves to.
    pub kind: RepresentationKind,
    /// Example body produced by encoding the element type's sample.
    pub example: String,
}

/// Compute the renderable mime types for result model `M`.
///
/// Every registry entry whose kind the element type supports is recorded,
/// with an example rendered from [`Representable::sample`]. Sequence
/// results wrap the example in brackets. Pairings the element type does
/// not support, and samples that fail to encode, are skipped rather than
/// reported: discovery only produces metadata.
pub fn discover<M: ResultModel>(registry: &RepresentationRegistry) -> Vec<Renderable> {
    let sample = M::Item::sample();
    registry
        .iter()
        .filter_map(|(mime, kind)| {
            let cap = M::item_capability(kind)?;
            let bytes = cap.encode(&sample).ok()?;
            let example = String::from_utf8_lossy(&bytes).into_owned();
            let example = match M::SHAPE {
                Shape::Single => example,
                Shape::Sequence => format!("[{example}]"),
            };
            Some(Renderable {
                mime: mime.to_owned(),
                kind,
                example,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use serde::Serialize;

    use super::*;

    /// Supports text/plain only.
    #[derive(Debug, Clone, PartialEq, Eq, Serialize)]
    struct Label {
        text: String,
    }

    fn encode_label(label: &Label) -> Result<Vec<u8>, ReprError> {
        Ok(format!("label {}", label.text).into_bytes())
    }

    fn decode_label(bytes: &[u8]) -> Result<Label, ReprError> {
        let text = std::str::from_utf8(bytes).map_err(|e| ReprError::Decode {
            mime: "text/plain",
            message: e.to_string(),
        })?;
        text.strip_prefix("label ")
            .map(|t| Label { text: t.to_owned() })
            .ok_or_else(|| ReprError::Decode {
                mime: "text/plain",
                message: String::from("missing prefix"),
            })
    }

    impl Representable for Label {
        fn capability(kind: RepresentationKind) -> Option<Capability<Self>> {
            match kind {
                RepresentationKind::TextPlain => Some(Capability::new(
                    RepresentationKind::TextPlain,
                    encode_label,
                    decode_label,
                )),
                RepresentationKind::TextHtml => None,
            }
        }

        fn sample() -> Self {
            Self {
                text: String::from("x"),
            }
        }
    }

    single_result_model!(Label);

    #[test]
    fn discovery_skips_unsupported_kinds() {
        let registry = RepresentationRegistry::standard();
        let found = discover::<Label>(&registry);
        assert_eq!(
            found,
            vec![Renderable {
                mime: String::from("text/plain"),
                kind: RepresentationKind::TextPlain,
                example: String::from("label x"),
            }]
        );
    }

    #[test]
    fn discovery_brackets_sequence_examples() {
        let registry = RepresentationRegistry::standard();
        let found = discover::<Vec<Label>>(&registry);
        assert_eq!(found.len(), 1);
        assert_eq!(found.first().map(|r| r.example.as_str()), Some("[label x]"));
    }

    #[test]
    fn discovery_includes_aliases() {
        let registry =
            RepresentationRegistry::standard().with("text/x-label", RepresentationKind::TextPlain);
        let mimes: Vec<String> = discover::<Label>(&registry)
            .into_iter()
            .map(|r| r.mime)
            .collect();
        assert_eq!(mimes, vec!["text/plain", "text/x-label"]);
    }

    #[test]
    fn empty_registry_discovers_nothing() {
        assert!(discover::<Label>(&RepresentationRegistry::new()).is_empty());
    }

    #[test]
    fn single_model_round_trips_through_capability() {
        let cap = Label::capability(RepresentationKind::TextPlain);
        let label = Label {
            text: String::from("hello"),
        };
        let decoded = cap.ok_or(ReprError::Unsupported { mime: "text/plain" }).and_then(|cap| {
            let bytes = label.encode_with(&cap)?;
            Label::decode_with(&cap, &bytes)
        });
        assert_eq!(decoded, Ok(label));
    }

    #[test]
    fn sequence_encoding_joins_elements() {
        let labels = vec![
            Label {
                text: String::from("a"),
            },
            Label {
                text: String::from("b"),
            },
        ];
        let encoded = <Vec<Label>>::item_capability(RepresentationKind::TextPlain)
            .map(|cap| labels.encode_with(&cap));
        assert_eq!(encoded, Some(Ok(b"[label a, label b]".to_vec())));
    }

    #[test]
    fn empty_sequence_renders_empty_brackets() {
        let labels: Vec<Label> = Vec::new();
        let encoded = <Vec<Label>>::item_capability(RepresentationKind::TextPlain)
            .map(|cap| labels.encode_with(&cap));
        assert_eq!(encoded, Some(Ok(b"[]".to_vec())));
    }

    #[test]
    fn sequence_decoding_is_unsupported() {
        let decoded = <Vec<Label>>::item_capability(RepresentationKind::TextPlain)
            .map(|cap| <Vec<Label>>::decode_with(&cap, b"[label a]"));
        assert_eq!(
            decoded,
            Some(Err(ReprError::Unsupported { mime: "text/plain" }))
        );
    }
}
