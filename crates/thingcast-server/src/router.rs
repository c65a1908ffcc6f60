//! Axum router construction for the Thingcast API.
//!
//! Assembles the negotiated thing routes, their `WebSocket` twins and the
//! plain endpoints into a single [`Router`] with CORS and request tracing.

use std::sync::Arc;

use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use thingcast_repr::RepresentationRegistry;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::negotiate::{NegotiatingRouter, RouteSpec, openapi};
use crate::state::AppState;
use crate::ws;

/// Title of the route metadata document.
const API_TITLE: &str = "Thingcast";

/// Build the complete Axum router with the standard representations.
///
/// The router includes:
/// - `GET /` -- minimal HTML status page
/// - `GET /health` -- liveness probe
/// - `GET /openapi.json` -- route metadata document
/// - `GET /thing/` -- list things, negotiated
/// - `GET /thing/{id}` -- single thing, negotiated
/// - `WS /thing/` -- every update
/// - `WS /thing/{id}` -- updates of one thing
///
/// CORS is configured to allow any origin.
pub fn build_router(state: Arc<AppState>) -> Router {
    build_router_with(state, RepresentationRegistry::standard())
}

/// Build the router negotiating against a custom `registry`.
pub fn build_router_with(state: Arc<AppState>, registry: RepresentationRegistry) -> Router {
    let (things, descriptors) = NegotiatingRouter::<Arc<AppState>>::new(registry)
        .route(
            RouteSpec::get("/thing/")
                .description("List the current snapshot of every thing")
                .operation_id("list_things"),
            handlers::list_things,
        )
        .route(
            RouteSpec::get("/thing/{id}")
                .description("Get the current snapshot of one thing")
                .operation_id("get_thing")
                .status(StatusCode::CREATED),
            handlers::get_thing,
        )
        .websocket("/thing/", "Stream every thing update", ws::subscribe_all)
        .websocket("/thing/{id}", "Stream the updates of one thing", ws::subscribe_thing)
        .into_parts();

    let document = Arc::new(openapi::document(
        API_TITLE,
        env!("CARGO_PKG_VERSION"),
        &descriptors,
    ));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Status page
        .route("/", get(handlers::index))
        .route("/health", get(handlers::health))
        .route(
            "/openapi.json",
            get(move || {
                let document = Arc::clone(&document);
                async move { Json(document.as_ref().clone()) }
            }),
        )
        // Negotiated REST + WebSocket
        .merge(things)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
