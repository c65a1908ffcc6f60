//! Argument resolution for negotiated routes.
//!
//! A route's argument type implements [`Extract`]. Extraction pulls values
//! out of the gathered [`RequestInput`] through an [`ArgResolver`], which
//! records every failure instead of stopping at the first one. The
//! dispatcher only invokes the handler once extraction finished with no
//! recorded errors; otherwise all of them are reported together.

use std::collections::BTreeMap;
use std::fmt::Display;
use std::str::FromStr;

use axum::http::HeaderMap;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// One failed argument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArgError {
    /// Where the failure is, e.g. `["query", "color"]`.
    pub loc: Vec<Value>,
    /// Human-readable reason.
    pub msg: String,
    /// Machine-readable error class.
    #[serde(rename = "type")]
    pub kind: String,
}

/// Accumulated argument failures, in the order they were found.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ArgErrors(Vec<ArgError>);

impl ArgErrors {
    /// An empty accumulator.
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    /// Record a failure.
    pub fn push(&mut self, loc: Vec<Value>, msg: impl Into<String>, kind: impl Into<String>) {
        self.0.push(ArgError {
            loc,
            msg: msg.into(),
            kind: kind.into(),
        });
    }

    /// Whether nothing failed.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of recorded failures.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Iterate over the failures.
    pub fn iter(&self) -> impl Iterator<Item = &ArgError> {
        self.0.iter()
    }
}

/// Everything a route's arguments can be resolved from.
#[derive(Debug, Clone, Default)]
pub struct RequestInput {
    /// Matched path parameters, percent-decoded.
    pub path: BTreeMap<String, String>,
    /// Query pairs in request order.
    pub query: Vec<(String, String)>,
    /// Request headers.
    pub headers: HeaderMap,
    /// The parsed body, when the route declares one and it was not empty.
    pub body: Option<Value>,
}

/// Resolves individual arguments and collects their failures.
#[derive(Debug)]
pub struct ArgResolver<'a> {
    input: &'a RequestInput,
    errors: ArgErrors,
}

const MISSING: &str = "value_error.missing";
const INVALID: &str = "value_error";

impl<'a> ArgResolver<'a> {
    /// Start resolving against `input`.
    pub const fn new(input: &'a RequestInput) -> Self {
        Self {
            input,
            errors: ArgErrors::new(),
        }
    }

    /// Record a custom failure.
    pub fn fail(&mut self, loc: Vec<Value>, msg: impl Into<String>, kind: impl Into<String>) {
        self.errors.push(loc, msg, kind);
    }

    /// A required path parameter.
    pub fn path<T>(&mut self, name: &str) -> Option<T>
    where
        T: FromStr,
        T::Err: Display,
    {
        let raw = self.input.path.get(name).map(String::as_str);
        self.required("path", name, raw)
    }

    /// A required query parameter.
    pub fn query<T>(&mut self, name: &str) -> Option<T>
    where
        T: FromStr,
        T::Err: Display,
    {
        let raw = self.first_query(name);
        self.required("query", name, raw)
    }

    /// An optional query parameter. The outer `None` means a failure was
    /// recorded; `Some(None)` means the parameter was absent.
    pub fn query_opt<T>(&mut self, name: &str) -> Option<Option<T>>
    where
        T: FromStr,
        T::Err: Display,
    {
        let raw = self.first_query(name);
        self.optional("query", name, raw)
    }

    /// An optional header, with the same conventions as [`Self::query_opt`].
    pub fn header_opt<T>(&mut self, name: &str) -> Option<Option<T>>
    where
        T: FromStr,
        T::Err: Display,
    {
        let input = self.input;
        match input.headers.get(name).map(|v| v.to_str()) {
            None => Some(None),
            Some(Ok(raw)) => self.optional("header", name, Some(raw)),
            Some(Err(e)) => {
                self.fail(loc("header", name), e.to_string(), INVALID);
                None
            }
        }
    }

    /// The whole body deserialized as `T`.
    pub fn body<T: DeserializeOwned>(&mut self) -> Option<T> {
        let Some(body) = self.input.body.as_ref() else {
            self.fail(vec![Value::from("body")], "field required", MISSING);
            return None;
        };
        match T::deserialize(body) {
            Ok(value) => Some(value),
            Err(e) => {
                self.fail(vec![Value::from("body")], e.to_string(), INVALID);
                None
            }
        }
    }

    /// Finish resolution and hand back the recorded failures.
    pub fn finish(self) -> ArgErrors {
        self.errors
    }

    fn first_query(&self, name: &str) -> Option<&'a str> {
        self.input
            .query
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    fn required<T>(&mut self, source: &str, name: &str, raw: Option<&str>) -> Option<T>
    where
        T: FromStr,
        T::Err: Display,
    {
        if raw.is_none() {
            self.fail(loc(source, name), "field required", MISSING);
            return None;
        }
        self.optional(source, name, raw).flatten()
    }

    fn optional<T>(&mut self, source: &str, name: &str, raw: Option<&str>) -> Option<Option<T>>
    where
        T: FromStr,
        T::Err: Display,
    {
        let Some(raw) = raw else {
            return Some(None);
        };
        match raw.parse() {
            Ok(value) => Some(Some(value)),
            Err(e) => {
                self.fail(loc(source, name), e.to_string(), INVALID);
                None
            }
        }
    }
}

fn loc(source: &str, name: &str) -> Vec<Value> {
    vec![Value::from(source), Value::from(name)]
}

/// A route argument type.
pub trait Extract: Sized + Send + 'static {
    /// Resolve the arguments.
    ///
    /// Returns `None` only after recording at least one failure on `args`.
    fn extract(args: &mut ArgResolver<'_>) -> Option<Self>;
}

impl Extract for () {
    fn extract(_args: &mut ArgResolver<'_>) -> Option<Self> {
        Some(())
    }
}
