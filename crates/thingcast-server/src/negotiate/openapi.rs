//! Route metadata document.
//!
//! Renders the [`RouteDescriptor`]s collected at registration as an
//! OpenAPI-shaped JSON document. Each negotiated operation lists
//! `application/json` plus every discovered representation with the example
//! computed during discovery.

use serde_json::{Map, Value, json};
use thingcast_repr::Shape;

use super::dispatch::JSON_MIME;
use super::router::RouteDescriptor;

/// Build the metadata document for `routes`.
///
/// A `WebSocket` route sharing its path with a negotiated `GET` is listed
/// as an `x-websocket` extension of that operation.
pub fn document(title: &str, version: &str, routes: &[RouteDescriptor]) -> Value {
    let mut paths = Map::new();
    let (sockets, negotiated): (Vec<_>, Vec<_>) = routes.iter().partition(|r| r.websocket);
    for route in negotiated {
        if let Value::Object(operations) = path_entry(&mut paths, route) {
            operations.insert(route.method.as_str().to_ascii_lowercase(), operation(route));
        }
    }
    for route in sockets {
        if let Value::Object(operations) = path_entry(&mut paths, route) {
            if let Some(Value::Object(get)) = operations.get_mut("get") {
                get.insert("x-websocket".into(), websocket_extension(route));
            } else {
                operations.insert("get".into(), operation(route));
            }
        }
    }

    json!({
        "openapi": "3.0.3",
        "info": {
            "title": title,
            "version": version,
        },
        "paths": paths,
    })
}

fn path_entry<'a>(paths: &'a mut Map<String, Value>, route: &RouteDescriptor) -> &'a mut Value {
    paths
        .entry(route.path.clone())
        .or_insert_with(|| Value::Object(Map::new()))
}

fn websocket_extension(route: &RouteDescriptor) -> Value {
    json!({ "summary": route.description.as_deref().unwrap_or("WebSocket stream") })
}

fn operation(route: &RouteDescriptor) -> Value {
    let mut op = Map::new();
    if let Some(description) = &route.description {
        op.insert("summary".into(), Value::from(description.as_str()));
    }
    if let Some(operation_id) = &route.operation_id {
        op.insert("operationId".into(), Value::from(operation_id.as_str()));
    }
    if let Some(kind) = route.body {
        op.insert(
            "requestBody".into(),
            json!({ "content": { kind.mime(): { "schema": { "type": "object" } } } }),
        );
    }
    if route.websocket {
        op.insert("x-websocket".into(), websocket_extension(route));
    }

    let description = route
        .description
        .clone()
        .unwrap_or_else(|| "Successful Response".to_owned());
    let mut response = Map::new();
    response.insert("description".into(), Value::from(description));
    if let Some(shape) = route.shape {
        response.insert("content".into(), Value::Object(content(route, shape)));
    }

    let mut responses = Map::new();
    responses.insert(route.status.as_u16().to_string(), Value::Object(response));
    op.insert("responses".into(), Value::Object(responses));
    Value::Object(op)
}

fn content(route: &RouteDescriptor, shape: Shape) -> Map<String, Value> {
    let schema = match shape {
        Shape::Single => json!({ "type": "object" }),
        Shape::Sequence => json!({ "type": "array", "items": { "type": "object" } }),
    };
    let mut content = Map::new();
    content.insert(JSON_MIME.to_owned(), json!({ "schema": schema }));
    for renderable in &route.renderables {
        content.insert(
            renderable.mime.clone(),
            json!({
                "schema": { "type": "string" },
                "example": renderable.example,
            }),
        );
    }
    content
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::{Method, StatusCode};
    use thingcast_repr::{Renderable, RepresentationKind};

    use super::*;
    use crate::negotiate::body::BodyKind;

    fn descriptor(method: Method, shape: Option<Shape>) -> RouteDescriptor {
        RouteDescriptor {
            method,
            path: "/thing/".to_owned(),
            status: StatusCode::OK,
            description: Some("List things".to_owned()),
            operation_id: Some("list_things".to_owned()),
            shape,
            body: None,
            renderables: vec![Renderable {
                mime: "text/plain".to_owned(),
                kind: RepresentationKind::TextPlain,
                example: "[Thing a]".to_owned(),
            }],
            websocket: false,
        }
    }

    #[test]
    fn operations_list_every_representation() {
        let doc = document("thingcast", "0.1.0", &[descriptor(Method::GET, Some(Shape::Sequence))]);
        let content = &doc["paths"]["/thing/"]["get"]["responses"]["200"]["content"];
        assert_eq!(content["application/json"]["schema"]["type"], "array");
        assert_eq!(content["text/plain"]["example"], "[Thing a]");
        assert_eq!(doc["paths"]["/thing/"]["get"]["operationId"], "list_things");
    }

    #[test]
    fn methods_share_a_path_entry() {
        let mut post = descriptor(Method::POST, Some(Shape::Single));
        post.body = Some(BodyKind::Form);
        let doc = document("t", "1", &[descriptor(Method::GET, Some(Shape::Sequence)), post]);
        let path = doc["paths"]["/thing/"].as_object().unwrap();
        assert_eq!(path.len(), 2);
        assert!(
            path["post"]["requestBody"]["content"]
                .get("application/x-www-form-urlencoded")
                .is_some()
        );
    }

    #[test]
    fn websocket_routes_have_no_content() {
        let mut ws = descriptor(Method::GET, None);
        ws.websocket = true;
        ws.status = StatusCode::SWITCHING_PROTOCOLS;
        let doc = document("t", "1", &[ws]);
        let op = &doc["paths"]["/thing/"]["get"];
        assert_eq!(op["x-websocket"]["summary"], "List things");
        assert!(op["responses"]["101"].get("content").is_none());
    }

    #[test]
    fn websocket_twin_extends_the_get_operation() {
        let mut ws = descriptor(Method::GET, None);
        ws.websocket = true;
        ws.status = StatusCode::SWITCHING_PROTOCOLS;
        ws.description = Some("Stream every thing update".to_owned());
        let doc = document("t", "1", &[ws, descriptor(Method::GET, Some(Shape::Sequence))]);
        let op = &doc["paths"]["/thing/"]["get"];
        assert_eq!(op["operationId"], "list_things");
        assert_eq!(op["x-websocket"]["summary"], "Stream every thing update");
        assert!(op["responses"]["200"]["content"].get("text/plain").is_some());
    }
}
