//! REST endpoint handlers for the Thingcast server.
//!
//! The thing endpoints are negotiated: they return domain values and the
//! dispatcher renders them as JSON, `text/plain` or `text/html` depending on
//! the `Accept` header. The status page and health check are plain axum
//! handlers.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET` | `/` | Minimal HTML status page |
//! | `GET` | `/health` | Liveness probe |
//! | `GET` | `/thing/` | List things (`?type=` and `?color=` filters) |
//! | `GET` | `/thing/{id}` | Single thing |

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::header::CACHE_CONTROL;
use axum::http::{HeaderValue, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use serde_json::json;
use thingcast_types::{Thing, ThingColor, ThingType};
use tracing::debug;

use crate::negotiate::{ArgResolver, Extract, HandlerOutput, HandlerResult, ResponseCarrier};
use crate::state::AppState;

/// Snapshots change every few seconds, so no response may be cached.
const fn no_store() -> HeaderValue {
    HeaderValue::from_static("no-store")
}

/// The body returned for an unknown or invalid thing id.
pub fn invalid_id_response() -> Response {
    (StatusCode::NOT_FOUND, Json(json!({ "error": "Invalid Id" }))).into_response()
}

// ---------------------------------------------------------------------------
// GET / -- minimal HTML status page
// ---------------------------------------------------------------------------

/// Serve a minimal HTML page listing the endpoints and tracked ids.
pub async fn index(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let ids: String = state
        .context()
        .thing_ids()
        .iter()
        .map(|id| format!("<li><a href=\"/thing/{id}\">/thing/{id}</a></li>"))
        .collect();

    Html(format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="utf-8">
    <title>Thingcast</title>
    <style>
        body {{
            background: #0d1117;
            color: #c9d1d9;
            font-family: 'Cascadia Code', 'Fira Code', 'Consolas', monospace;
            padding: 2rem;
            max-width: 800px;
            margin: 0 auto;
        }}
        h1 {{ color: #58a6ff; }}
        a {{ color: #58a6ff; text-decoration: none; }}
        ul {{ list-style: none; padding: 0; }}
        li {{ padding: 0.3rem 0; }}
    </style>
</head>
<body>
    <h1>Thingcast</h1>

    <h2>API Endpoints</h2>
    <ul>
        <li><a href="/thing/">/thing/</a> -- List things (?type=car, ?color=red)</li>
        <li><a href="/openapi.json">/openapi.json</a> -- Route metadata</li>
        <li><a href="/health">/health</a> -- Liveness probe</li>
    </ul>
    <p>Send <code>Accept: text/plain</code> or <code>Accept: text/html</code> for alternate representations.</p>

    <h2>Tracked things</h2>
    <ul>
        {ids}
    </ul>

    <h2>WebSocket</h2>
    <ul>
        <li><code>ws://host:port/thing/</code> -- Every update</li>
        <li><code>ws://host:port/thing/{{id}}</code> -- Updates for one thing</li>
    </ul>
</body>
</html>"#
    ))
}

// ---------------------------------------------------------------------------
// GET /health
// ---------------------------------------------------------------------------

/// Liveness probe.
pub async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

// ---------------------------------------------------------------------------
// GET /thing/ -- list things
// ---------------------------------------------------------------------------

/// Optional filters for the list endpoint.
///
/// Unknown enumeration values are validation failures; both parameters are
/// checked so every bad value is reported at once.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ThingFilter {
    /// Keep only things of this type.
    pub kind: Option<ThingType>,
    /// Keep only things of this color.
    pub color: Option<ThingColor>,
}

impl ThingFilter {
    /// Whether `thing` passes the filter.
    pub fn matches(&self, thing: &Thing) -> bool {
        self.kind.is_none_or(|kind| thing.kind == kind)
            && self.color.is_none_or(|color| thing.color == color)
    }
}

impl Extract for ThingFilter {
    fn extract(args: &mut ArgResolver<'_>) -> Option<Self> {
        let kind = args.query_opt("type");
        let color = args.query_opt("color");
        Some(Self {
            kind: kind?,
            color: color?,
        })
    }
}

/// List the current snapshot of every tracked thing that has one.
pub async fn list_things(
    state: Arc<AppState>,
    filter: ThingFilter,
    carrier: ResponseCarrier,
) -> HandlerResult<Vec<Thing>> {
    let things: Vec<Thing> = state
        .store()
        .load_many(state.context().thing_ids())
        .await?
        .into_iter()
        .filter(|thing| filter.matches(thing))
        .collect();

    debug!(count = things.len(), ?filter, "listed things");
    carrier.insert_header(CACHE_CONTROL, no_store());
    Ok(HandlerOutput::Model(things))
}

// ---------------------------------------------------------------------------
// GET /thing/{id} -- single thing
// ---------------------------------------------------------------------------

/// The `{id}` path segment, kept raw so an invalid id maps to the
/// not-found body instead of a validation failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThingPath {
    /// The raw id segment.
    pub id: String,
}

impl Extract for ThingPath {
    fn extract(args: &mut ArgResolver<'_>) -> Option<Self> {
        args.path("id").map(|id| Self { id })
    }
}

/// Return the current snapshot of one thing.
///
/// An id that is invalid, untracked, or not generated yet yields
/// `404 {"error": "Invalid Id"}`.
pub async fn get_thing(
    state: Arc<AppState>,
    path: ThingPath,
    carrier: ResponseCarrier,
) -> HandlerResult<Thing> {
    carrier.insert_header(CACHE_CONTROL, no_store());

    let Some(id) = state.tracked_id(&path.id) else {
        debug!(id = %path.id, "rejecting unknown thing id");
        return Ok(HandlerOutput::Response(invalid_id_response()));
    };
    match state.store().load(&id).await? {
        Some(thing) => Ok(HandlerOutput::Model(thing)),
        None => {
            debug!(thing_id = %id, "no snapshot yet");
            Ok(HandlerOutput::Response(invalid_id_response()))
        }
    }
}
