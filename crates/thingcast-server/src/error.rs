//! Error types for the Thingcast server.
//!
//! [`DispatchError`] covers every way a negotiated request can fail and
//! converts into a structured JSON response via its
//! [`IntoResponse`](axum::response::IntoResponse) implementation.
//! [`BridgeError`] covers the `WebSocket` subscription bridge.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::{Value, json};
use thingcast_db::StoreError;
use thingcast_repr::ReprError;
use tracing::error;

use crate::negotiate::ArgErrors;

/// Body of every body parse failure.
pub const BODY_PARSE_DETAIL: &str = "There was an error parsing the body";

/// Errors raised while dispatching a negotiated request.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// One or more arguments could not be resolved.
    #[error("request validation failed ({} errors)", .0.len())]
    Validation(ArgErrors),

    /// The JSON body is not valid JSON.
    #[error("malformed JSON body at char {offset}: {message}")]
    MalformedJson {
        /// Character offset of the error within the body.
        offset: usize,
        /// Parser message.
        message: String,
    },

    /// The body could not be read or decoded.
    #[error("body parse error: {0}")]
    BodyParse(String),

    /// The requested representation is not available for this route.
    #[error("unable to format content for Accept: {0}")]
    NotAcceptable(String),

    /// A converter failed to encode the handler's value.
    #[error("encoding failed: {0}")]
    Encoding(#[from] ReprError),

    /// The store or broadcaster failed.
    #[error("backend error: {0}")]
    Backend(#[from] StoreError),

    /// Any other internal failure.
    #[error("internal error: {0}")]
    Internal(String),
}

impl IntoResponse for DispatchError {
    fn into_response(self) -> Response {
        let (status, detail) = match &self {
            Self::Validation(errors) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                serde_json::to_value(errors).unwrap_or(Value::Array(Vec::new())),
            ),
            Self::MalformedJson { offset, message } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                json!([{
                    "loc": ["body", offset],
                    "msg": message,
                    "type": "value_error.jsondecode",
                }]),
            ),
            Self::BodyParse(reason) => {
                tracing::debug!(reason = %reason, "rejecting request body");
                (StatusCode::BAD_REQUEST, Value::from(BODY_PARSE_DETAIL))
            }
            Self::NotAcceptable(mime) => (
                StatusCode::NOT_ACCEPTABLE,
                Value::from(format!("Unable to format content for Accept: {mime}")),
            ),
            Self::Encoding(_) | Self::Backend(_) | Self::Internal(_) => {
                error!(error = %self, "request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Value::from("Internal Server Error"),
                )
            }
        };

        (status, Json(json!({ "detail": detail }))).into_response()
    }
}

/// Errors that end a `WebSocket` subscription abnormally.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// Subscribing to the channel failed.
    #[error("subscribe failed: {0}")]
    Subscribe(#[from] StoreError),

    /// Writing to the client failed for a reason other than a peer close.
    #[error("transport failed on channel {channel}: {message}")]
    Transport {
        /// The channel being relayed.
        channel: String,
        /// The transport's error message.
        message: String,
    },
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    async fn body_of(err: DispatchError) -> (StatusCode, Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn not_acceptable_names_the_mime() {
        let (status, body) = body_of(DispatchError::NotAcceptable("application/xml".into())).await;
        assert_eq!(status, StatusCode::NOT_ACCEPTABLE);
        assert_eq!(
            body["detail"],
            "Unable to format content for Accept: application/xml"
        );
    }

    #[tokio::test]
    async fn malformed_json_points_at_offset() {
        let (status, body) = body_of(DispatchError::MalformedJson {
            offset: 6,
            message: "expected value".into(),
        })
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["detail"][0]["loc"], json!(["body", 6]));
    }

    #[tokio::test]
    async fn body_parse_is_generic() {
        let (status, body) = body_of(DispatchError::BodyParse("length limit".into())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["detail"], BODY_PARSE_DETAIL);
    }

    #[tokio::test]
    async fn validation_lists_every_error() {
        let mut errors = ArgErrors::new();
        errors.push(vec!["query".into(), "type".into()], "bad type", "value_error");
        errors.push(vec!["query".into(), "color".into()], "bad color", "value_error");
        let (status, body) = body_of(DispatchError::Validation(errors)).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["detail"].as_array().map(Vec::len), Some(2));
        assert_eq!(body["detail"][1]["type"], "value_error");
    }

    #[tokio::test]
    async fn internal_errors_hide_details() {
        let (status, body) = body_of(DispatchError::Internal("secret".into())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["detail"], "Internal Server Error");
    }
}
