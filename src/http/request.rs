//! Request handling and normalization.
//!
//! # Responsibilities
//! - Generate unique request ID (UUID v4) as early as possible
//! - Decode the query string and JSON body once per request
//! - Hand a framework-agnostic [`NormalizedRequest`] to the adapter
//!
//! # Design Decisions
//! - The normalized record is built fresh per call and never mutated after
//! - Body size is bounded before JSON decoding

use std::collections::HashMap;

use axum::{
    body::Body,
    extract::Query,
    http::{request::Parts, HeaderMap, HeaderValue, Method, Request},
};
use serde_json::{Map, Value};
use tower_http::request_id::{
    MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer,
};
use uuid::Uuid;

use crate::error::AdapterError;

/// Header carrying the request ID.
pub const X_REQUEST_ID: &str = "x-request-id";

/// Framework-agnostic view of an inbound request.
#[derive(Debug, Clone)]
pub struct NormalizedRequest {
    /// Decoded JSON body, `Null` when empty.
    pub body: Value,
    pub headers: HeaderMap,
    pub method: Method,
    /// Query string as a JSON object of strings.
    pub query: Value,
}

impl NormalizedRequest {
    /// Normalize request head plus an already-buffered body.
    pub fn from_parts(parts: &Parts, body: &[u8]) -> Result<Self, AdapterError> {
        let query = match parts.uri.query() {
            Some(_) => {
                let Query(params) = Query::<HashMap<String, String>>::try_from_uri(&parts.uri)
                    .map_err(|e| AdapterError::InvalidQueryString(e.body_text()))?;
                params
                    .into_iter()
                    .map(|(key, value)| (key, Value::String(value)))
                    .collect::<Map<_, _>>()
            }
            None => Map::new(),
        };

        let body = if body.iter().all(u8::is_ascii_whitespace) {
            Value::Null
        } else {
            serde_json::from_slice(body).map_err(AdapterError::InvalidJson)?
        };

        Ok(Self {
            body,
            headers: parts.headers.clone(),
            method: parts.method.clone(),
            query: Value::Object(query),
        })
    }

    /// Buffer at most `limit` body bytes and normalize.
    pub async fn from_request(request: Request<Body>, limit: usize) -> Result<Self, AdapterError> {
        let (parts, body) = request.into_parts();
        let bytes = axum::body::to_bytes(body, limit)
            .await
            .map_err(|e| AdapterError::Body(e.to_string()))?;
        Self::from_parts(&parts, &bytes)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn request_id(&self) -> Option<&str> {
        self.header(X_REQUEST_ID)
    }
}

/// Generates UUID v4 request IDs.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidRequestId;

impl MakeRequestId for UuidRequestId {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        HeaderValue::from_str(&Uuid::new_v4().to_string())
            .ok()
            .map(RequestId::new)
    }
}

/// Assigns `x-request-id` to requests lacking one.
pub fn set_request_id_layer() -> SetRequestIdLayer<UuidRequestId> {
    SetRequestIdLayer::x_request_id(UuidRequestId)
}

/// Copies `x-request-id` onto the response.
pub fn propagate_request_id_layer() -> PropagateRequestIdLayer {
    PropagateRequestIdLayer::x_request_id()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parts(method: Method, uri: &str) -> Parts {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(())
            .unwrap()
            .into_parts()
            .0
    }

    #[test]
    fn decodes_query_string() {
        let req = NormalizedRequest::from_parts(
            &parts(Method::GET, "/graphql?query=%7B%20hello%20%7D&operationName=Op"),
            b"",
        )
        .unwrap();

        assert_eq!(req.query, json!({ "query": "{ hello }", "operationName": "Op" }));
        assert_eq!(req.body, Value::Null);
    }

    #[test]
    fn decodes_json_body() {
        let req = NormalizedRequest::from_parts(
            &parts(Method::POST, "/graphql"),
            br#"{"query":"{ hello }"}"#,
        )
        .unwrap();

        assert_eq!(req.body, json!({ "query": "{ hello }" }));
        assert_eq!(req.query, json!({}));
        assert_eq!(req.header("content-type"), Some("application/json"));
    }

    #[test]
    fn invalid_json_is_an_error() {
        let err = NormalizedRequest::from_parts(&parts(Method::POST, "/graphql"), b"{nope").unwrap_err();
        assert!(matches!(err, AdapterError::InvalidJson(_)));
    }

    #[test]
    fn generates_uuid_ids() {
        let id = UuidRequestId
            .make_request_id(&Request::new(()))
            .unwrap();
        let text = id.header_value().to_str().unwrap();
        assert!(Uuid::parse_str(text).is_ok());
    }
}
