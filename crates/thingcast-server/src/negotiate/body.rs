//! Request body intake.
//!
//! Routes that declare a body get it parsed before argument resolution.
//! Malformed JSON is a validation failure pointing at the character offset
//! of the error; anything else that prevents reading or parsing the body is a
//! generic body parse failure.

use axum::body::Body;
use serde_json::{Map, Value};

use crate::error::DispatchError;

/// Largest body the dispatcher will buffer.
pub const MAX_BODY_BYTES: usize = 2_097_152;

/// How a route's body is encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyKind {
    /// `application/json`.
    Json,
    /// `application/x-www-form-urlencoded`.
    Form,
}

impl BodyKind {
    /// The mime type documented for this body kind.
    pub const fn mime(self) -> &'static str {
        match self {
            Self::Json => "application/json",
            Self::Form => "application/x-www-form-urlencoded",
        }
    }
}

/// Buffer and parse `body` as `kind`.
///
/// # Errors
///
/// See [`parse_body`]; a body that cannot be buffered is a
/// [`DispatchError::BodyParse`].
pub async fn read_body(kind: BodyKind, body: Body) -> Result<Option<Value>, DispatchError> {
    let bytes = axum::body::to_bytes(body, MAX_BODY_BYTES)
        .await
        .map_err(|e| DispatchError::BodyParse(format!("failed to read body: {e}")))?;
    parse_body(kind, &bytes)
}

/// Parse buffered body bytes.
///
/// An empty JSON body yields `None`. A form body always yields an object of
/// string values, where a repeated field keeps its last value.
///
/// # Errors
///
/// Returns [`DispatchError::MalformedJson`] for invalid JSON.
pub fn parse_body(kind: BodyKind, bytes: &[u8]) -> Result<Option<Value>, DispatchError> {
    match kind {
        BodyKind::Json => {
            if bytes.is_empty() {
                return Ok(None);
            }
            serde_json::from_slice(bytes)
                .map(Some)
                .map_err(|e| DispatchError::MalformedJson {
                    offset: json_error_offset(bytes, &e),
                    message: e.to_string(),
                })
        }
        BodyKind::Form => {
            let fields: Map<String, Value> = url::form_urlencoded::parse(bytes)
                .map(|(key, value)| (key.into_owned(), Value::String(value.into_owned())))
                .collect();
            Ok(Some(Value::Object(fields)))
        }
    }
}

/// Character offset of a JSON error, from its 1-based line and byte column.
fn json_error_offset(bytes: &[u8], err: &serde_json::Error) -> usize {
    if err.line() == 0 {
        return char_count(bytes);
    }
    let preceding: usize = bytes
        .split(|b| *b == b'\n')
        .take(err.line().saturating_sub(1))
        .map(|line| line.len().saturating_add(1))
        .sum();
    let end = preceding
        .saturating_add(err.column().saturating_sub(1))
        .min(bytes.len());
    char_count(bytes.get(..end).unwrap_or(bytes))
}

/// Number of UTF-8 characters in `bytes`, counting lead bytes only.
fn char_count(bytes: &[u8]) -> usize {
    bytes.iter().filter(|b| (**b & 0xC0) != 0x80).count()
}
