//! Per-request dispatch for negotiated routes.
//!
//! For every request the dispatcher:
//!
//! 1. parses the body if the route declares one
//! 2. resolves the handler's arguments, aggregating every failure
//! 3. invokes the handler
//! 4. passes a handler-built response through, or negotiates the
//!    representation of the returned value from the `Accept` header
//! 5. applies the handler's [`ResponseCarrier`] on every exit path

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{FromRequestParts, Path, Request};
use axum::http::header::{ACCEPT, CONTENT_TYPE};
use axum::http::request::Parts;
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use futures::future::BoxFuture;
use thingcast_repr::{RepresentationKind, ResultModel};
use tracing::debug;

use super::args::{ArgResolver, Extract, RequestInput};
use super::body::{BodyKind, read_body};
use super::carrier::{ApplyMode, ResponseCarrier};
use super::serialize::SerializeOptions;
use crate::error::DispatchError;

/// The default structured representation.
pub const JSON_MIME: &str = "application/json";

/// What a handler produced.
#[derive(Debug)]
pub enum HandlerOutput<M> {
    /// A value to render in the negotiated representation.
    Model(M),
    /// A complete response, returned as-is without negotiation.
    Response(Response),
}

/// Result type of every negotiated handler.
pub type HandlerResult<M> = Result<HandlerOutput<M>, DispatchError>;

/// A negotiated route handler.
///
/// Implemented for every `Fn(S, A, ResponseCarrier) -> impl Future` that
/// resolves to a [`HandlerResult`], so plain `async fn`s qualify.
pub trait Endpoint<S, A, M>: Clone + Send + Sync + 'static {
    /// Invoke the handler.
    fn call(&self, state: S, args: A, carrier: ResponseCarrier) -> BoxFuture<'static, HandlerResult<M>>;
}

impl<S, A, M, F, Fut> Endpoint<S, A, M> for F
where
    F: Fn(S, A, ResponseCarrier) -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult<M>> + Send + 'static,
{
    fn call(&self, state: S, args: A, carrier: ResponseCarrier) -> BoxFuture<'static, HandlerResult<M>> {
        Box::pin(self(state, args, carrier))
    }
}

/// Adapt a synchronous handler. It runs on the blocking thread pool so it
/// never stalls the request-serving scheduler.
pub fn blocking<S, A, M, F>(
    handler: F,
) -> impl Fn(S, A, ResponseCarrier) -> BoxFuture<'static, HandlerResult<M>> + Clone + Send + Sync + 'static
where
    S: Send + 'static,
    A: Send + 'static,
    M: Send + 'static,
    F: Fn(S, A, ResponseCarrier) -> HandlerResult<M> + Clone + Send + Sync + 'static,
{
    move |state, args, carrier| {
        let handler = handler.clone();
        Box::pin(async move {
            tokio::task::spawn_blocking(move || handler(state, args, carrier))
                .await
                .map_err(|e| DispatchError::Internal(format!("blocking handler failed: {e}")))?
        })
    }
}

/// Everything fixed at registration that a request needs.
#[derive(Debug)]
pub(crate) struct RoutePlan {
    pub(crate) status: StatusCode,
    pub(crate) body: Option<BodyKind>,
    pub(crate) serialize: SerializeOptions,
    /// Renderable mime types (normalized) and the kind each resolves to.
    pub(crate) kinds: BTreeMap<String, RepresentationKind>,
}

/// Serve one request on a negotiated route.
pub(crate) async fn dispatch<S, A, M, H>(
    plan: Arc<RoutePlan>,
    handler: H,
    state: S,
    request: Request,
) -> Response
where
    S: Send + 'static,
    A: Extract,
    M: ResultModel,
    H: Endpoint<S, A, M>,
{
    let accept = requested_mime(request.headers());
    let (mut parts, body) = request.into_parts();

    let input = match gather(&plan, &mut parts, body).await {
        Ok(input) => input,
        Err(e) => return e.into_response(),
    };

    let mut resolver = ArgResolver::new(&input);
    let args = A::extract(&mut resolver);
    let errors = resolver.finish();
    let args = match args {
        Some(args) if errors.is_empty() => args,
        _ if !errors.is_empty() => return DispatchError::Validation(errors).into_response(),
        _ => {
            return DispatchError::Internal("argument extraction failed silently".to_owned())
                .into_response();
        }
    };

    let carrier = ResponseCarrier::new();
    let (response, mode) = match handler.call(state, args, carrier.clone()).await {
        Ok(HandlerOutput::Response(response)) => (response, ApplyMode::Passthrough),
        Ok(HandlerOutput::Model(model)) => match negotiate(&plan, &model, accept.as_deref()) {
            Ok(response) => (response, ApplyMode::Negotiated),
            Err(e) => (e.into_response(), ApplyMode::Failure),
        },
        Err(e) => (e.into_response(), ApplyMode::Failure),
    };
    carrier.finish(response, mode)
}

/// The trimmed `Accept` value, if present and not blank.
fn requested_mime(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(ACCEPT)?;
    let text = String::from_utf8_lossy(value.as_bytes());
    let trimmed = text.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_owned())
}

/// Whether `mime` selects the default JSON representation.
fn is_default(mime: &str) -> bool {
    mime.eq_ignore_ascii_case(JSON_MIME) || mime == "*/*"
}

async fn gather(plan: &RoutePlan, parts: &mut Parts, body: Body) -> Result<RequestInput, DispatchError> {
    let path = match Path::<BTreeMap<String, String>>::from_request_parts(parts, &()).await {
        Ok(Path(params)) => params,
        Err(_) => BTreeMap::new(),
    };
    let query = parts
        .uri
        .query()
        .map(|query| url::form_urlencoded::parse(query.as_bytes()).into_owned().collect())
        .unwrap_or_default();
    let body = match plan.body {
        Some(kind) => read_body(kind, body).await?,
        None => None,
    };
    Ok(RequestInput {
        path,
        query,
        headers: parts.headers.clone(),
        body,
    })
}

fn negotiate<M: ResultModel>(
    plan: &RoutePlan,
    model: &M,
    accept: Option<&str>,
) -> Result<Response, DispatchError> {
    match accept {
        Some(mime) if !is_default(mime) => render_alternate(plan, model, mime),
        _ => render_json(plan, model),
    }
}

fn render_json<M: ResultModel>(plan: &RoutePlan, model: &M) -> Result<Response, DispatchError> {
    let value = serde_json::to_value(model)
        .map_err(|e| DispatchError::Internal(format!("JSON serialization failed: {e}")))?;
    let bytes = serde_json::to_vec(&plan.serialize.apply(value))
        .map_err(|e| DispatchError::Internal(format!("JSON serialization failed: {e}")))?;
    Ok((
        plan.status,
        [(CONTENT_TYPE, HeaderValue::from_static(JSON_MIME))],
        bytes,
    )
        .into_response())
}

fn render_alternate<M: ResultModel>(
    plan: &RoutePlan,
    model: &M,
    mime: &str,
) -> Result<Response, DispatchError> {
    let normalized = mime.to_ascii_lowercase();
    let capability = plan
        .kinds
        .get(&normalized)
        .and_then(|kind| M::item_capability(*kind))
        .ok_or_else(|| DispatchError::NotAcceptable(mime.to_owned()))?;

    let bytes = model.encode_with(&capability)?;
    debug!(mime = %normalized, bytes = bytes.len(), "rendered alternate representation");

    let content_type = if normalized.starts_with("text/") {
        format!("{normalized}; charset=utf-8")
    } else {
        normalized
    };
    let content_type = HeaderValue::from_str(&content_type)
        .map_err(|e| DispatchError::Internal(format!("invalid content type: {e}")))?;
    Ok((plan.status, [(CONTENT_TYPE, content_type)], bytes).into_response())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use thingcast_repr::{RepresentationRegistry, discover};
    use thingcast_types::Thing;

    use super::*;

    fn plan_for<M: ResultModel>() -> RoutePlan {
        let registry = RepresentationRegistry::standard();
        RoutePlan {
            status: StatusCode::OK,
            body: None,
            serialize: SerializeOptions::new(),
            kinds: discover::<M>(&registry)
                .into_iter()
                .map(|r| (r.mime, r.kind))
                .collect(),
        }
    }

    async fn text(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[test]
    fn accept_is_trimmed_and_blank_is_absent() {
        let mut headers = HeaderMap::new();
        assert_eq!(requested_mime(&headers), None);
        headers.insert(ACCEPT, HeaderValue::from_static("  text/plain "));
        assert_eq!(requested_mime(&headers).as_deref(), Some("text/plain"));
        headers.insert(ACCEPT, HeaderValue::from_static("   "));
        assert_eq!(requested_mime(&headers), None);
    }

    #[test]
    fn default_representation_matches() {
        assert!(is_default("application/json"));
        assert!(is_default("Application/JSON"));
        assert!(is_default("*/*"));
        assert!(!is_default("text/plain"));
    }

    #[tokio::test]
    async fn text_plain_uses_converter() {
        let plan = plan_for::<Thing>();
        let thing = <Thing as thingcast_repr::Representable>::sample();
        let response = negotiate(&plan, &thing, Some("text/plain")).unwrap();
        assert_eq!(
            response.headers()[CONTENT_TYPE],
            "text/plain; charset=utf-8"
        );
        assert_eq!(text(response).await, thing.to_text_plain());
    }

    #[tokio::test]
    async fn sequences_are_bracketed() {
        let plan = plan_for::<Vec<Thing>>();
        let thing = <Thing as thingcast_repr::Representable>::sample();
        let things = vec![thing.clone(), thing.clone()];
        let response = negotiate(&plan, &things, Some("TEXT/PLAIN")).unwrap();
        let plain = thing.to_text_plain();
        assert_eq!(text(response).await, format!("[{plain}, {plain}]"));
    }

    #[test]
    fn unknown_mime_is_not_acceptable() {
        let plan = plan_for::<Thing>();
        let thing = <Thing as thingcast_repr::Representable>::sample();
        let result = negotiate(&plan, &thing, Some("application/xml"));
        assert!(matches!(
            result,
            Err(DispatchError::NotAcceptable(mime)) if mime == "application/xml"
        ));
    }

    #[tokio::test]
    async fn missing_accept_is_json() {
        let plan = plan_for::<Thing>();
        let thing = <Thing as thingcast_repr::Representable>::sample();
        let response = negotiate(&plan, &thing, None).unwrap();
        assert_eq!(response.headers()[CONTENT_TYPE], JSON_MIME);
        let body: Thing = serde_json::from_str(&text(response).await).unwrap();
        assert_eq!(body, thing);
    }

    #[tokio::test]
    async fn blocking_handlers_run_off_the_runtime() {
        let handler = blocking(|state: u32, args: u32, _carrier: ResponseCarrier| {
            Ok(HandlerOutput::Model(vec![state, args]))
        });
        let output = handler(1, 2, ResponseCarrier::new()).await.unwrap();
        assert!(matches!(output, HandlerOutput::Model(v) if v == vec![1, 2]));
    }
}
