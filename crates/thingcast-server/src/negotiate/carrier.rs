//! Out-of-band response adjustments staged by a handler.
//!
//! Handlers never build the negotiated response themselves, so anything
//! they want to add to it (a status override, extra headers, work to run
//! after the response) goes through a [`ResponseCarrier`]. The dispatcher
//! applies the carrier on every exit path once the handler has run.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::Response;
use futures::future::BoxFuture;

/// How staged adjustments are applied to an outgoing response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ApplyMode {
    /// A negotiated result: status override and all headers apply.
    Negotiated,
    /// A handler-built response: only headers it did not set are added.
    Passthrough,
    /// An error response produced after the handler ran: headers only.
    Failure,
}

#[derive(Default)]
struct Staged {
    status: Option<StatusCode>,
    headers: HeaderMap,
    tasks: Vec<BoxFuture<'static, ()>>,
}

/// Handle a handler uses to stage response adjustments.
///
/// Cloning yields another handle to the same staged state.
#[derive(Clone, Default)]
pub struct ResponseCarrier {
    staged: Arc<Mutex<Staged>>,
}

impl ResponseCarrier {
    /// A carrier with nothing staged.
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the route's default status code.
    pub fn set_status(&self, status: StatusCode) {
        self.lock().status = Some(status);
    }

    /// The staged status override, if any.
    pub fn status(&self) -> Option<StatusCode> {
        self.lock().status
    }

    /// Stage a header, replacing any staged value of the same name.
    pub fn insert_header(&self, name: HeaderName, value: HeaderValue) {
        self.lock().headers.insert(name, value);
    }

    /// Stage an additional value for a header.
    pub fn append_header(&self, name: HeaderName, value: HeaderValue) {
        self.lock().headers.append(name, value);
    }

    /// Run `task` once the response has been produced.
    pub fn add_task<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.lock().tasks.push(Box::pin(task));
    }

    /// Apply everything staged to `response` and start the background tasks.
    pub(crate) fn finish(&self, mut response: Response, mode: ApplyMode) -> Response {
        let staged = std::mem::take(&mut *self.lock());

        if let (ApplyMode::Negotiated, Some(status)) = (mode, staged.status) {
            *response.status_mut() = status;
        }

        let headers = response.headers_mut();
        let own: Vec<HeaderName> = match mode {
            ApplyMode::Passthrough => headers.keys().cloned().collect(),
            ApplyMode::Negotiated | ApplyMode::Failure => Vec::new(),
        };
        let mut last_name = None;
        for (name, value) in staged.headers {
            // `None` repeats the previous name for multi-valued headers.
            let Some(name) = name.or_else(|| last_name.clone()) else {
                continue;
            };
            last_name = Some(name.clone());
            if own.contains(&name) {
                continue;
            }
            headers.append(name, value);
        }

        for task in staged.tasks {
            tokio::spawn(task);
        }
        response
    }

    fn lock(&self) -> MutexGuard<'_, Staged> {
        self.staged.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for ResponseCarrier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let staged = self.lock();
        f.debug_struct("ResponseCarrier")
            .field("status", &staged.status)
            .field("headers", &staged.headers)
            .field("tasks", &staged.tasks.len())
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::response::IntoResponse;

    use super::*;

    fn header(value: &'static str) -> HeaderValue {
        HeaderValue::from_static(value)
    }

    #[test]
    fn negotiated_applies_status_and_headers() {
        let carrier = ResponseCarrier::new();
        carrier.set_status(StatusCode::CREATED);
        carrier.insert_header(HeaderName::from_static("x-trace"), header("1"));

        let response = carrier.finish(StatusCode::OK.into_response(), ApplyMode::Negotiated);
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(response.headers()["x-trace"], "1");
    }

    #[test]
    fn failure_keeps_error_status() {
        let carrier = ResponseCarrier::new();
        carrier.set_status(StatusCode::CREATED);
        carrier.insert_header(HeaderName::from_static("x-trace"), header("1"));

        let response = carrier.finish(
            StatusCode::NOT_ACCEPTABLE.into_response(),
            ApplyMode::Failure,
        );
        assert_eq!(response.status(), StatusCode::NOT_ACCEPTABLE);
        assert_eq!(response.headers()["x-trace"], "1");
    }

    #[test]
    fn passthrough_keeps_handler_headers() {
        let carrier = ResponseCarrier::new();
        carrier.set_status(StatusCode::CREATED);
        carrier.insert_header(HeaderName::from_static("x-owner"), header("carrier"));
        carrier.insert_header(HeaderName::from_static("x-extra"), header("yes"));

        let built = (
            StatusCode::NOT_FOUND,
            [(HeaderName::from_static("x-owner"), header("handler"))],
        )
            .into_response();
        let response = carrier.finish(built, ApplyMode::Passthrough);
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(response.headers()["x-owner"], "handler");
        assert_eq!(response.headers()["x-extra"], "yes");
    }

    #[test]
    fn multi_valued_headers_survive() {
        let carrier = ResponseCarrier::new();
        carrier.append_header(HeaderName::from_static("x-tag"), header("a"));
        carrier.append_header(HeaderName::from_static("x-tag"), header("b"));

        let response = carrier.finish(StatusCode::OK.into_response(), ApplyMode::Negotiated);
        let values: Vec<_> = response
            .headers()
            .get_all("x-tag")
            .iter()
            .map(|v| v.to_str().unwrap())
            .collect();
        assert_eq!(values, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn tasks_run_after_finish() {
        let carrier = ResponseCarrier::new();
        let (tx, rx) = tokio::sync::oneshot::channel();
        carrier.add_task(async move {
            let _ = tx.send(7);
        });
        let _ = carrier.finish(StatusCode::OK.into_response(), ApplyMode::Negotiated);
        assert_eq!(rx.await.unwrap(), 7);
    }

    #[test]
    fn clones_share_staged_state() {
        let carrier = ResponseCarrier::new();
        carrier.clone().set_status(StatusCode::ACCEPTED);
        assert_eq!(carrier.status(), Some(StatusCode::ACCEPTED));
    }
}
