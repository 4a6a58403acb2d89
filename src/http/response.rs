//! Response serialization for the three result shapes.
//!
//! # Responsibilities
//! - `Single`: status + headers + JSON body
//! - `Multipart`: chunked `multipart/mixed` with one JSON part per chunk
//! - `Push`: `text/event-stream` with one `data:` frame per chunk
//!
//! # Design Decisions
//! - Chunks are written in upstream order, one at a time, never buffered
//! - The body stream owns the subscription; a client disconnect drops the
//!   body and with it the upstream stream
//! - An error after headers are sent is logged and ends the stream; multipart
//!   still gets its closing boundary so clients see a well-formed end

use std::convert::Infallible;
use std::future::ready;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, HeaderValue},
    response::{IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use futures_util::{stream, Stream, StreamExt};

use crate::error::AdapterError;
use crate::graphql::pipeline::{IncrementalChunk, SingleResult, StreamResult, Subscription};

/// Boundary announced in the multipart content type.
pub const MULTIPART_BOUNDARY: &str = "-";

const MULTIPART_OPENING: &[u8] = b"---";
const MULTIPART_CLOSING: &[u8] = b"\r\n-----\r\n";
/// Completes a `\r\n---` marker already written after the last part.
const MULTIPART_CLOSING_TAIL: &[u8] = b"--\r\n";
const PART_DELIMITER: &[u8] = b"\r\n---";

/// Serialize a complete result.
pub fn single_response(result: SingleResult) -> Response {
    let mut response = (result.status, Json(result.payload)).into_response();
    let headers = response.headers_mut();
    for (name, value) in result.headers {
        headers.append(name, value);
    }
    response
}

/// Serialize a streamed result as `multipart/mixed`.
pub fn multipart_response(result: StreamResult) -> Response {
    let body = multipart_body(result.subscribe()).map(Ok::<_, Infallible>);

    let mut response = Response::new(Body::from_stream(body));
    let headers = response.headers_mut();
    headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("multipart/mixed; boundary=\"-\""),
    );
    headers.insert(header::TRANSFER_ENCODING, HeaderValue::from_static("chunked"));
    response
}

/// Serialize a streamed result as server-sent events.
pub fn push_response(result: StreamResult) -> Response {
    let body = event_stream_body(result.subscribe()).map(Ok::<_, Infallible>);

    let mut response = Response::new(Body::from_stream(body));
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/event-stream"));
    headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    response
}

/// Full multipart body: opening boundary, one part per chunk, closing boundary.
///
/// Upstream streams rarely mark their last chunk, so the final part usually
/// ends with a delimiter already. The closing boundary reuses it instead of
/// opening an empty part.
pub fn multipart_body(subscription: Subscription) -> impl Stream<Item = Bytes> + Send {
    let delimited = Arc::new(AtomicBool::new(false));
    let last = delimited.clone();
    let parts = until_error(subscription, "multipart", encode_part)
        .inspect(move |part| last.store(part.ends_with(PART_DELIMITER), Ordering::Relaxed));

    let closing = stream::once(async move {
        if delimited.load(Ordering::Relaxed) {
            Bytes::from_static(MULTIPART_CLOSING_TAIL)
        } else {
            Bytes::from_static(MULTIPART_CLOSING)
        }
    });

    stream::once(ready(Bytes::from_static(MULTIPART_OPENING)))
        .chain(parts)
        .chain(closing)
}

/// SSE body: one `data:` frame per chunk.
pub fn event_stream_body(subscription: Subscription) -> impl Stream<Item = Bytes> + Send {
    until_error(subscription, "event-stream", encode_event)
}

/// One MIME part, followed by a boundary marker when more parts follow.
pub fn encode_part(chunk: &IncrementalChunk) -> Result<Bytes, AdapterError> {
    let json = serde_json::to_vec(&chunk.payload).map_err(AdapterError::Serialize)?;

    let mut part = Vec::with_capacity(json.len() + 96);
    part.extend_from_slice(b"\r\nContent-Type: application/json; charset=utf-8");
    part.extend_from_slice(format!("\r\nContent-Length: {}", json.len()).as_bytes());
    part.extend_from_slice(b"\r\n\r\n");
    part.extend_from_slice(&json);
    if chunk.has_next {
        part.extend_from_slice(PART_DELIMITER);
    }
    Ok(Bytes::from(part))
}

/// One SSE frame.
pub fn encode_event(chunk: &IncrementalChunk) -> Result<Bytes, AdapterError> {
    let json = serde_json::to_string(&chunk.payload).map_err(AdapterError::Serialize)?;
    Ok(Bytes::from(format!("data: {json}\n\n")))
}

fn until_error(
    subscription: Subscription,
    format: &'static str,
    encode: fn(&IncrementalChunk) -> Result<Bytes, AdapterError>,
) -> impl Stream<Item = Bytes> + Send {
    subscription.scan((), move |_, item| {
        let encoded = item.and_then(|chunk| encode(&chunk));
        ready(match encoded {
            Ok(bytes) => Some(bytes),
            Err(error) => {
                tracing::error!(format, error = %error, "Stream failed after headers were sent");
                None
            }
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use serde_json::json;

    fn chunks(items: Vec<Result<IncrementalChunk, AdapterError>>) -> Subscription {
        StreamResult::new(stream::iter(items)).subscribe()
    }

    fn chunk(payload: serde_json::Value, has_next: bool) -> Result<IncrementalChunk, AdapterError> {
        Ok(IncrementalChunk { payload, has_next })
    }

    async fn collect(body: impl Stream<Item = Bytes>) -> String {
        let parts: Vec<Bytes> = body.collect().await;
        String::from_utf8(parts.concat()).unwrap()
    }

    #[test]
    fn part_has_headers_and_length() {
        let part = encode_part(&IncrementalChunk {
            payload: json!({ "data": { "a": "é" } }),
            has_next: true,
        })
        .unwrap();

        let body = r#"{"data":{"a":"é"}}"#;
        assert_eq!(
            std::str::from_utf8(&part).unwrap(),
            format!(
                "\r\nContent-Type: application/json; charset=utf-8\r\nContent-Length: {}\r\n\r\n{body}\r\n---",
                body.len()
            )
        );
    }

    #[tokio::test]
    async fn multipart_writes_one_part_per_chunk() {
        let body = collect(multipart_body(chunks(vec![
            chunk(json!({ "data": { "n": 1 } }), true),
            chunk(json!({ "data": { "n": 2 } }), true),
            chunk(json!({ "data": { "n": 3 } }), false),
        ])))
        .await;

        assert!(body.starts_with("---\r\nContent-Type"));
        assert!(body.ends_with("{\"data\":{\"n\":3}}\r\n-----\r\n"));
        assert_eq!(body.matches("Content-Type: application/json; charset=utf-8").count(), 3);
        assert_eq!(body.matches("Content-Length: 16").count(), 3);
        // Opening boundary plus one marker after every chunk that has a successor.
        assert_eq!(body.matches("\r\n---\r\n").count(), 2);
    }

    #[tokio::test]
    async fn multipart_without_final_marker_has_no_empty_part() {
        let body = collect(multipart_body(chunks(vec![
            chunk(json!({ "n": 1 }), true),
            chunk(json!({ "n": 2 }), true),
        ])))
        .await;

        let part = |n: u8| {
            format!("\r\nContent-Type: application/json; charset=utf-8\r\nContent-Length: 7\r\n\r\n{{\"n\":{n}}}")
        };
        assert_eq!(body, format!("---{}\r\n---{}\r\n-----\r\n", part(1), part(2)));
        assert!(!body.contains("\r\n---\r\n-----"));
    }

    #[tokio::test]
    async fn multipart_empty_stream_is_just_boundaries() {
        let body = collect(multipart_body(chunks(vec![]))).await;
        assert_eq!(body, "---\r\n-----\r\n");
    }

    #[tokio::test]
    async fn multipart_error_mid_stream_still_closes() {
        let body = collect(multipart_body(chunks(vec![
            chunk(json!({ "n": 1 }), true),
            Err(AdapterError::Execution("upstream gone".into())),
            chunk(json!({ "n": 3 }), false),
        ])))
        .await;

        assert_eq!(body.matches("Content-Length").count(), 1);
        assert!(body.ends_with("{\"n\":1}\r\n-----\r\n"));
    }

    #[tokio::test]
    async fn event_stream_frames() {
        let body = collect(event_stream_body(chunks(vec![
            chunk(json!({ "data": { "n": 1 } }), true),
            chunk(json!({ "data": { "n": 2 } }), false),
        ])))
        .await;

        assert_eq!(body, "data: {\"data\":{\"n\":1}}\n\ndata: {\"data\":{\"n\":2}}\n\n");
    }

    #[tokio::test]
    async fn single_uses_status_headers_and_payload() {
        let response = single_response(
            SingleResult::error(StatusCode::METHOD_NOT_ALLOWED, "nope")
                .with_header(header::ALLOW, HeaderValue::from_static("POST")),
        );
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(response.headers()[header::ALLOW], "POST");

        let bytes = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json, json!({ "errors": [{ "message": "nope" }] }));
    }

    #[test]
    fn streaming_headers() {
        let multipart = multipart_response(StreamResult::new(stream::empty()));
        assert_eq!(
            multipart.headers()[header::CONTENT_TYPE],
            "multipart/mixed; boundary=\"-\""
        );
        assert_eq!(multipart.headers()[header::TRANSFER_ENCODING], "chunked");

        let push = push_response(StreamResult::new(stream::empty()));
        assert_eq!(push.headers()[header::CONTENT_TYPE], "text/event-stream");
        assert_eq!(push.headers()[header::CACHE_CONTROL], "no-cache");
        assert_eq!(push.headers()[header::CONNECTION], "keep-alive");
    }
}
