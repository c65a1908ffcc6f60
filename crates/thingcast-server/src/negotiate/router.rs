//! Route registration with representation discovery.
//!
//! [`NegotiatingRouter`] sits in front of an axum [`Router`]. Registering a
//! route runs [`discover`] once for the route's declared result type, so the
//! request path only does a map lookup. Every registration also produces a
//! [`RouteDescriptor`] for the route metadata document.
//!
//! A path may carry both negotiated endpoints and a `WebSocket` handler. A
//! `GET` request asking for a `websocket` upgrade goes to the `WebSocket`
//! handler; everything else goes to the negotiated endpoint.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;

use axum::Router;
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{FromRequestParts, Path, Request, State};
use axum::http::header::UPGRADE;
use axum::http::request::Parts;
use axum::http::{HeaderMap, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{MethodFilter, MethodRouter};
use futures::future::BoxFuture;
use thingcast_repr::{Renderable, RepresentationRegistry, ResultModel, Shape, discover};
use tracing::{debug, warn};

use super::args::Extract;
use super::body::BodyKind;
use super::dispatch::{Endpoint, RoutePlan, dispatch};
use super::serialize::SerializeOptions;

/// Matched path parameters of a `WebSocket` route.
pub type PathParams = BTreeMap<String, String>;

type ErasedHandler<S> = Arc<dyn Fn(S, Request) -> BoxFuture<'static, Response> + Send + Sync>;

/// HTTP methods a negotiated route can be registered for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RouteMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl RouteMethod {
    const fn filter(self) -> MethodFilter {
        match self {
            Self::Get => MethodFilter::GET,
            Self::Post => MethodFilter::POST,
            Self::Put => MethodFilter::PUT,
            Self::Delete => MethodFilter::DELETE,
        }
    }

    const fn method(self) -> Method {
        match self {
            Self::Get => Method::GET,
            Self::Post => Method::POST,
            Self::Put => Method::PUT,
            Self::Delete => Method::DELETE,
        }
    }
}

/// Declaration of one negotiated route.
#[derive(Debug, Clone)]
pub struct RouteSpec {
    method: RouteMethod,
    path: String,
    status: StatusCode,
    description: Option<String>,
    operation_id: Option<String>,
    body: Option<BodyKind>,
    serialize: SerializeOptions,
}

impl RouteSpec {
    fn new(method: RouteMethod, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            status: StatusCode::OK,
            description: None,
            operation_id: None,
            body: None,
            serialize: SerializeOptions::new(),
        }
    }

    /// A `GET` route.
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(RouteMethod::Get, path)
    }

    /// A `POST` route.
    pub fn post(path: impl Into<String>) -> Self {
        Self::new(RouteMethod::Post, path)
    }

    /// A `PUT` route.
    pub fn put(path: impl Into<String>) -> Self {
        Self::new(RouteMethod::Put, path)
    }

    /// A `DELETE` route.
    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(RouteMethod::Delete, path)
    }

    /// Default status of a successful response (`200` unless set).
    #[must_use]
    pub const fn status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    /// Human-readable summary for the metadata document.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Stable operation name for the metadata document.
    #[must_use]
    pub fn operation_id(mut self, operation_id: impl Into<String>) -> Self {
        self.operation_id = Some(operation_id.into());
        self
    }

    /// Parse a request body of `kind` before resolving arguments.
    #[must_use]
    pub const fn body(mut self, kind: BodyKind) -> Self {
        self.body = Some(kind);
        self
    }

    /// Shape the JSON representation.
    #[must_use]
    pub fn serialize(mut self, options: SerializeOptions) -> Self {
        self.serialize = options;
        self
    }
}

/// Registration-time metadata of one route.
#[derive(Debug, Clone)]
pub struct RouteDescriptor {
    /// HTTP method.
    pub method: Method,
    /// Path template, e.g. `/thing/{id}`.
    pub path: String,
    /// Default success status.
    pub status: StatusCode,
    /// Summary, if declared.
    pub description: Option<String>,
    /// Operation name, if declared.
    pub operation_id: Option<String>,
    /// Whether the route returns one value or a sequence. `None` for
    /// `WebSocket` routes.
    pub shape: Option<Shape>,
    /// Declared body encoding.
    pub body: Option<BodyKind>,
    /// Alternate representations the route can produce.
    pub renderables: Vec<Renderable>,
    /// Whether this is a `WebSocket` route.
    pub websocket: bool,
}

/// A `WebSocket` request that has not been upgraded yet.
///
/// Handlers validate the target first and only then call
/// [`accept`](Self::accept), so a rejected request never upgrades.
#[derive(Debug)]
pub struct PendingUpgrade {
    parts: Parts,
}

impl PendingUpgrade {
    /// Perform the upgrade handshake checks.
    ///
    /// # Errors
    ///
    /// Returns the rejection response when the request is not a valid
    /// `WebSocket` upgrade (for example `426 Upgrade Required` when the
    /// connection cannot be upgraded).
    pub async fn accept(mut self) -> Result<WebSocketUpgrade, Response> {
        WebSocketUpgrade::from_request_parts(&mut self.parts, &())
            .await
            .map_err(IntoResponse::into_response)
    }
}

struct PathEntry<S> {
    endpoints: Vec<(RouteMethod, ErasedHandler<S>)>,
    websocket: Option<ErasedHandler<S>>,
}

impl<S> Default for PathEntry<S> {
    fn default() -> Self {
        Self {
            endpoints: Vec::new(),
            websocket: None,
        }
    }
}

/// Builds an axum [`Router`] of negotiated routes.
pub struct NegotiatingRouter<S> {
    registry: RepresentationRegistry,
    paths: BTreeMap<String, PathEntry<S>>,
    descriptors: Vec<RouteDescriptor>,
}

impl<S> NegotiatingRouter<S>
where
    S: Clone + Send + Sync + 'static,
{
    /// A router negotiating against `registry`.
    pub fn new(registry: RepresentationRegistry) -> Self {
        Self {
            registry,
            paths: BTreeMap::new(),
            descriptors: Vec::new(),
        }
    }

    /// Register a negotiated route.
    ///
    /// `A` is the argument type resolved per request and `M` the declared
    /// result type. Registering the same method and path twice replaces the
    /// earlier handler.
    #[must_use]
    pub fn route<A, M, H>(mut self, spec: RouteSpec, handler: H) -> Self
    where
        A: Extract,
        M: ResultModel,
        H: Endpoint<S, A, M>,
    {
        let renderables = discover::<M>(&self.registry);
        debug!(
            path = %spec.path,
            method = %spec.method.method(),
            mimes = ?renderables.iter().map(|r| r.mime.as_str()).collect::<Vec<_>>(),
            "registered negotiated route"
        );

        let plan = Arc::new(RoutePlan {
            status: spec.status,
            body: spec.body,
            serialize: spec.serialize,
            kinds: renderables
                .iter()
                .map(|r| (r.mime.clone(), r.kind))
                .collect(),
        });
        let erased: ErasedHandler<S> =
            Arc::new(move |state: S, request: Request| -> BoxFuture<'static, Response> {
                Box::pin(dispatch::<S, A, M, H>(Arc::clone(&plan), handler.clone(), state, request))
            });

        let entry = self.paths.entry(spec.path.clone()).or_default();
        let before = entry.endpoints.len();
        entry.endpoints.retain(|(method, _)| *method != spec.method);
        if entry.endpoints.len() != before {
            warn!(path = %spec.path, method = %spec.method.method(), "route registered twice, replacing");
            self.descriptors
                .retain(|d| !(d.path == spec.path && d.method == spec.method.method() && !d.websocket));
        }
        entry.endpoints.push((spec.method, erased));

        self.descriptors.push(RouteDescriptor {
            method: spec.method.method(),
            path: spec.path,
            status: spec.status,
            description: spec.description,
            operation_id: spec.operation_id,
            shape: Some(M::SHAPE),
            body: spec.body,
            renderables,
            websocket: false,
        });
        self
    }

    /// Register a `WebSocket` handler on `path`.
    #[must_use]
    pub fn websocket<H, Fut>(mut self, path: impl Into<String>, description: impl Into<String>, handler: H) -> Self
    where
        H: Fn(S, PathParams, PendingUpgrade) -> Fut + Clone + Send + Sync + 'static,
        Fut: Future<Output = Response> + Send + 'static,
    {
        let path = path.into();
        let erased: ErasedHandler<S> =
            Arc::new(move |state: S, request: Request| -> BoxFuture<'static, Response> {
                let handler = handler.clone();
                Box::pin(async move {
                    let (mut parts, _body) = request.into_parts();
                    let params = Path::<PathParams>::from_request_parts(&mut parts, &())
                        .await
                        .map(|Path(params)| params)
                        .unwrap_or_default();
                    handler(state, params, PendingUpgrade { parts }).await
                })
            });

        let entry = self.paths.entry(path.clone()).or_default();
        if entry.websocket.replace(erased).is_some() {
            warn!(path = %path, "websocket route registered twice, replacing");
            self.descriptors.retain(|d| !(d.path == path && d.websocket));
        }
        self.descriptors.push(RouteDescriptor {
            method: Method::GET,
            path,
            status: StatusCode::SWITCHING_PROTOCOLS,
            description: Some(description.into()),
            operation_id: None,
            shape: None,
            body: None,
            renderables: Vec::new(),
            websocket: true,
        });
        self
    }

    /// The route descriptors registered so far.
    pub fn descriptors(&self) -> &[RouteDescriptor] {
        &self.descriptors
    }

    /// Finish registration, yielding the axum router and the descriptors.
    pub fn into_parts(self) -> (Router<S>, Vec<RouteDescriptor>) {
        let mut router = Router::new();
        for (path, entry) in self.paths {
            let mut methods: MethodRouter<S> = MethodRouter::new();
            let mut websocket = entry.websocket;

            for (method, handler) in entry.endpoints {
                let upgrade = match method {
                    RouteMethod::Get => websocket.take(),
                    RouteMethod::Post | RouteMethod::Put | RouteMethod::Delete => None,
                };
                methods = methods.on(
                    method.filter(),
                    move |State(state): State<S>, request: Request| {
                        let handler = Arc::clone(&handler);
                        let upgrade = upgrade.clone();
                        async move {
                            match upgrade {
                                Some(ws) if wants_websocket(request.headers()) => {
                                    ws(state, request).await
                                }
                                _ => handler(state, request).await,
                            }
                        }
                    },
                );
            }

            if let Some(ws) = websocket {
                methods = methods.on(
                    MethodFilter::GET,
                    move |State(state): State<S>, request: Request| {
                        let ws = Arc::clone(&ws);
                        async move { ws(state, request).await }
                    },
                );
            }
            router = router.route(&path, methods);
        }
        (router, self.descriptors)
    }
}

impl<S> std::fmt::Debug for NegotiatingRouter<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NegotiatingRouter")
            .field("registry", &self.registry)
            .field("paths", &self.paths.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

/// Whether the request asks for a `WebSocket` upgrade.
fn wants_websocket(headers: &HeaderMap) -> bool {
    headers
        .get(UPGRADE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.trim().eq_ignore_ascii_case("websocket"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use axum::body::Body;
    use axum::http::Request;
    use axum::http::header::{ACCEPT, CONTENT_TYPE};
    use serde_json::{Value, json};
    use thingcast_repr::Representable;
    use thingcast_types::Thing;
    use tower::ServiceExt;

    use super::*;
    use crate::negotiate::args::ArgResolver;
    use crate::negotiate::carrier::ResponseCarrier;
    use crate::negotiate::dispatch::{HandlerOutput, HandlerResult, blocking};

    struct Limit(u32);

    impl Extract for Limit {
        fn extract(args: &mut ArgResolver<'_>) -> Option<Self> {
            args.query("limit").map(Self)
        }
    }

    #[derive(serde::Deserialize)]
    struct Rename {
        color: String,
    }

    struct RenameArgs(Rename);

    impl Extract for RenameArgs {
        fn extract(args: &mut ArgResolver<'_>) -> Option<Self> {
            args.body().map(Self)
        }
    }

    async fn things(_state: (), Limit(limit): Limit, _carrier: ResponseCarrier) -> HandlerResult<Vec<Thing>> {
        let thing = Thing::sample();
        Ok(HandlerOutput::Model(vec![thing; usize::try_from(limit).unwrap()]))
    }

    async fn one(_state: (), _args: (), carrier: ResponseCarrier) -> HandlerResult<Thing> {
        carrier.insert_header(
            axum::http::HeaderName::from_static("x-served-by"),
            axum::http::HeaderValue::from_static("test"),
        );
        Ok(HandlerOutput::Model(Thing::sample()))
    }

    fn app() -> Router {
        let (router, _) = NegotiatingRouter::<()>::new(RepresentationRegistry::standard())
            .route(RouteSpec::get("/things"), things)
            .route(RouteSpec::get("/thing").status(StatusCode::CREATED), one)
            .route(
                RouteSpec::post("/thing").body(BodyKind::Json),
                blocking(|_state: (), RenameArgs(body): RenameArgs, _carrier: ResponseCarrier| {
                    let response = (StatusCode::ACCEPTED, body.color).into_response();
                    Ok(HandlerOutput::<Thing>::Response(response))
                }),
            )
            .into_parts();
        router.with_state(())
    }

    async fn send(request: Request<Body>) -> (StatusCode, HeaderMap, Vec<u8>) {
        let response = app().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, headers, bytes.to_vec())
    }

    #[tokio::test]
    async fn sequence_route_renders_json_by_default() {
        let (status, _, body) = send(
            Request::get("/things?limit=2").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let json: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json.as_array().map(Vec::len), Some(2));
    }

    #[tokio::test]
    async fn missing_query_is_a_validation_error() {
        let (status, _, body) = send(Request::get("/things").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        let json: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["detail"][0]["loc"], json!(["query", "limit"]));
    }

    #[tokio::test]
    async fn route_status_and_carrier_headers_apply() {
        let (status, headers, _) = send(
            Request::get("/thing")
                .header(ACCEPT, "text/html")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(headers[CONTENT_TYPE], "text/html; charset=utf-8");
        assert_eq!(headers["x-served-by"], "test");
    }

    #[tokio::test]
    async fn not_acceptable_keeps_carrier_headers() {
        let (status, headers, _) = send(
            Request::get("/thing")
                .header(ACCEPT, "application/xml")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_ACCEPTABLE);
        assert_eq!(headers["x-served-by"], "test");
    }

    #[tokio::test]
    async fn malformed_body_is_rejected_before_the_handler() {
        let (status, _, body) = send(
            Request::post("/thing")
                .header(CONTENT_TYPE, "application/json")
                .body(Body::from("{\"color\": }"))
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        let json: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["detail"][0]["type"], "value_error.jsondecode");
    }

    #[tokio::test]
    async fn handler_response_passes_through() {
        let (status, _, body) = send(
            Request::post("/thing")
                .header(CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{"color": "red"}"#))
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(body, b"red");
    }

    #[test]
    fn descriptors_record_discovered_representations() {
        let router = NegotiatingRouter::<()>::new(RepresentationRegistry::standard())
            .route(RouteSpec::get("/things").description("all"), things)
            .route(RouteSpec::get("/things"), things);
        let descriptors = router.descriptors();
        assert_eq!(descriptors.len(), 1);
        assert_eq!(descriptors[0].shape, Some(Shape::Sequence));
        let mimes: Vec<_> = descriptors[0]
            .renderables
            .iter()
            .map(|r| r.mime.as_str())
            .collect();
        assert_eq!(mimes, vec!["text/html", "text/plain"]);
        assert!(descriptors[0].renderables[1].example.starts_with("[Thing a"));
    }

    #[tokio::test]
    async fn put_and_delete_routes_share_a_path() {
        let (router, descriptors) = NegotiatingRouter::<()>::new(RepresentationRegistry::standard())
            .route(RouteSpec::put("/thing"), one)
            .route(RouteSpec::delete("/thing").status(StatusCode::ACCEPTED), one)
            .into_parts();
        let methods: Vec<_> = descriptors.iter().map(|d| d.method.clone()).collect();
        assert_eq!(methods, vec![Method::PUT, Method::DELETE]);

        let router = router.with_state(());
        let put = Request::put("/thing").body(Body::empty()).unwrap();
        let response = router.clone().oneshot(put).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let delete = Request::delete("/thing").body(Body::empty()).unwrap();
        let response = router.clone().oneshot(delete).await.unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);

        let get = Request::get("/thing").body(Body::empty()).unwrap();
        let response = router.oneshot(get).await.unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[test]
    fn upgrade_detection_is_case_insensitive() {
        let mut headers = HeaderMap::new();
        assert!(!wants_websocket(&headers));
        headers.insert(UPGRADE, axum::http::HeaderValue::from_static("WebSocket"));
        assert!(wants_websocket(&headers));
    }
}
