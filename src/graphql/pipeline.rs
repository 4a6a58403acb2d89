//! Execution pipeline seam and result shapes.
//!
//! The pipeline turns extracted parameters plus a merged context into exactly
//! one [`ExecutionResult`]. The adapter dispatches on the variant to pick a
//! serialization strategy.

use std::pin::Pin;
use std::task::{Context, Poll};

use async_graphql::{Executor, ObjectType, Schema, SubscriptionType, Variables};
use async_graphql_parser::types::{DocumentOperations, OperationType};
use async_trait::async_trait;
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use futures_util::stream::{AbortHandle, Abortable, BoxStream};
use futures_util::{Stream, StreamExt};
use serde_json::{json, Value};

use crate::error::AdapterError;
use crate::graphql::context::{internal_context, BuildContextArgs, ContextMap, RequestContext};
use crate::graphql::params::GraphQLParams;

/// One streamed payload.
#[derive(Debug, Clone, PartialEq)]
pub struct IncrementalChunk {
    pub payload: Value,
    /// More chunks follow.
    pub has_next: bool,
}

/// Chunks as produced upstream. An `Err` ends the stream.
pub type ChunkStream = BoxStream<'static, Result<IncrementalChunk, AdapterError>>;

/// A complete, non-streamed response.
#[derive(Debug, Clone)]
pub struct SingleResult {
    pub status: StatusCode,
    pub headers: Vec<(HeaderName, HeaderValue)>,
    pub payload: Value,
}

impl SingleResult {
    pub fn ok(payload: Value) -> Self {
        Self {
            status: StatusCode::OK,
            headers: Vec::new(),
            payload,
        }
    }

    /// A GraphQL error payload with a single message.
    pub fn error(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            payload: json!({ "errors": [{ "message": message.into() }] }),
        }
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.push((name, value));
        self
    }
}

/// A streamed result that can be consumed once and cancelled at any time.
pub struct StreamResult {
    stream: Abortable<ChunkStream>,
    handle: AbortHandle,
}

impl StreamResult {
    pub fn new(stream: impl Stream<Item = Result<IncrementalChunk, AdapterError>> + Send + 'static) -> Self {
        let (handle, registration) = AbortHandle::new_pair();
        Self {
            stream: Abortable::new(stream.boxed(), registration),
            handle,
        }
    }

    /// Start consuming chunks. Dropping the subscription unsubscribes.
    pub fn subscribe(self) -> Subscription {
        Subscription {
            inner: self.stream,
            handle: self.handle,
        }
    }

    /// Stop the upstream stream; no further chunks are produced.
    pub fn unsubscribe(&self) {
        self.handle.abort();
    }

    /// A handle that can unsubscribe after `subscribe` consumed the result.
    pub fn unsubscribe_handle(&self) -> AbortHandle {
        self.handle.clone()
    }
}

impl std::fmt::Debug for StreamResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamResult")
            .field("aborted", &self.handle.is_aborted())
            .finish()
    }
}

/// Live chunk stream of a [`StreamResult`].
pub struct Subscription {
    inner: Abortable<ChunkStream>,
    handle: AbortHandle,
}

impl Stream for Subscription {
    type Item = Result<IncrementalChunk, AdapterError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Exactly one of these is produced per request.
#[derive(Debug)]
pub enum ExecutionResult {
    Single(SingleResult),
    /// Incremental delivery over `multipart/mixed`.
    Multipart(StreamResult),
    /// Server push over `text/event-stream`.
    Push(StreamResult),
}

/// Wire format preferred for streamed results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StreamFormat {
    #[default]
    EventStream,
    Multipart,
}

impl StreamFormat {
    /// Multipart only when the client asks for it and not for event streams.
    pub fn from_accept(headers: &HeaderMap) -> Self {
        let accept = headers
            .get_all(header::ACCEPT)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .collect::<Vec<_>>()
            .join(",");

        if accept.contains("multipart/mixed") && !accept.contains("text/event-stream") {
            Self::Multipart
        } else {
            Self::EventStream
        }
    }
}

/// Everything the pipeline needs for one execution.
#[derive(Debug)]
pub struct ExecutionRequest {
    pub params: GraphQLParams,
    pub method: Method,
    pub context: ContextMap,
    pub stream_format: StreamFormat,
}

/// The external parse → validate → execute/subscribe engine.
#[async_trait]
pub trait ExecutionPipeline: Send + Sync + 'static {
    /// The pipeline's own context factory.
    async fn context(&self, args: &BuildContextArgs) -> ContextMap;

    async fn execute(&self, request: ExecutionRequest) -> Result<ExecutionResult, AdapterError>;
}

/// Schemas that can print their SDL.
pub trait PrintSchema {
    fn sdl(&self) -> String;
}

impl<Q, M, S> PrintSchema for Schema<Q, M, S>
where
    Q: ObjectType + 'static,
    M: ObjectType + 'static,
    S: SubscriptionType + 'static,
{
    fn sdl(&self) -> String {
        Schema::sdl(self)
    }
}

/// Production pipeline backed by an async-graphql executor.
#[derive(Clone)]
pub struct SchemaPipeline<E> {
    executor: E,
}

impl<E: Executor> SchemaPipeline<E> {
    pub fn new(executor: E) -> Self {
        Self { executor }
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }
}

#[async_trait]
impl<E: Executor> ExecutionPipeline for SchemaPipeline<E> {
    async fn context(&self, args: &BuildContextArgs) -> ContextMap {
        internal_context(args)
    }

    async fn execute(&self, request: ExecutionRequest) -> Result<ExecutionResult, AdapterError> {
        let Some(query) = request.params.query.as_deref() else {
            return Ok(ExecutionResult::Single(SingleResult::error(
                StatusCode::BAD_REQUEST,
                "Must provide query string.",
            )));
        };

        let kind = match operation_kind(query, request.params.operation_name.as_deref()) {
            Ok(kind) => kind,
            Err(message) => {
                return Ok(ExecutionResult::Single(SingleResult::error(
                    StatusCode::BAD_REQUEST,
                    message,
                )))
            }
        };

        if kind == OperationType::Mutation && request.method == Method::GET {
            return Ok(ExecutionResult::Single(
                SingleResult::error(
                    StatusCode::METHOD_NOT_ALLOWED,
                    "Can only perform a mutation operation from a POST request.",
                )
                .with_header(header::ALLOW, HeaderValue::from_static("POST")),
            ));
        }

        let graphql_request = to_graphql_request(request.params, request.context);

        if kind == OperationType::Subscription {
            let chunks = self
                .executor
                .execute_stream(graphql_request, None)
                .map(|response| {
                    serde_json::to_value(&response)
                        .map(|payload| IncrementalChunk {
                            payload,
                            has_next: true,
                        })
                        .map_err(AdapterError::Serialize)
                });
            let result = StreamResult::new(chunks);

            return Ok(match request.stream_format {
                StreamFormat::EventStream => ExecutionResult::Push(result),
                StreamFormat::Multipart => ExecutionResult::Multipart(result),
            });
        }

        let response = self.executor.execute(graphql_request).await;
        let headers = response
            .http_headers
            .iter()
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();
        let payload = serde_json::to_value(&response).map_err(AdapterError::Serialize)?;

        Ok(ExecutionResult::Single(SingleResult {
            status: StatusCode::OK,
            headers,
            payload,
        }))
    }
}

fn to_graphql_request(params: GraphQLParams, context: ContextMap) -> async_graphql::Request {
    let mut request = async_graphql::Request::new(params.query.unwrap_or_default());
    if let Some(name) = params.operation_name {
        request = request.operation_name(name);
    }
    if let Some(variables) = params.variables {
        request = request.variables(Variables::from_json(variables));
    }
    request.data(RequestContext(context))
}

/// Parse just far enough to learn which kind of operation will run.
pub(crate) fn operation_kind(query: &str, operation_name: Option<&str>) -> Result<OperationType, String> {
    let document = async_graphql_parser::parse_query(query).map_err(|e| e.to_string())?;

    match (&document.operations, operation_name) {
        (DocumentOperations::Single(operation), _) => Ok(operation.node.ty),
        (DocumentOperations::Multiple(operations), Some(name)) => operations
            .iter()
            .find(|(candidate, _)| candidate.as_str() == name)
            .map(|(_, operation)| operation.node.ty)
            .ok_or_else(|| format!("Unknown operation named \"{name}\".")),
        (DocumentOperations::Multiple(operations), None) if operations.len() == 1 => operations
            .values()
            .next()
            .map(|operation| operation.node.ty)
            .ok_or_else(|| "Could not determine what operation to perform.".to_string()),
        (DocumentOperations::Multiple(_), None) => {
            Err("Must provide operation name if query contains multiple operations.".to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_operation_kinds() {
        assert_eq!(operation_kind("{ hello }", None), Ok(OperationType::Query));
        assert_eq!(
            operation_kind("mutation M { a }", None),
            Ok(OperationType::Mutation)
        );
        assert_eq!(
            operation_kind("query A { a } subscription B { b }", Some("B")),
            Ok(OperationType::Subscription)
        );
    }

    #[test]
    fn ambiguous_or_unknown_operations_fail() {
        assert!(operation_kind("query A { a } query B { b }", None).is_err());
        assert_eq!(
            operation_kind("query A { a } query B { b }", Some("C")),
            Err("Unknown operation named \"C\".".to_string())
        );
        assert!(operation_kind("{ hello", None).is_err());
    }

    #[test]
    fn stream_format_from_accept() {
        let mut headers = HeaderMap::new();
        assert_eq!(StreamFormat::from_accept(&headers), StreamFormat::EventStream);

        headers.insert(header::ACCEPT, HeaderValue::from_static("multipart/mixed"));
        assert_eq!(StreamFormat::from_accept(&headers), StreamFormat::Multipart);

        headers.insert(
            header::ACCEPT,
            HeaderValue::from_static("text/event-stream, multipart/mixed"),
        );
        assert_eq!(StreamFormat::from_accept(&headers), StreamFormat::EventStream);
    }

    #[tokio::test]
    async fn unsubscribe_stops_the_stream() {
        let result = StreamResult::new(futures_util::stream::iter((0..3).map(|i| {
            Ok(IncrementalChunk {
                payload: json!(i),
                has_next: true,
            })
        })));
        let handle = result.unsubscribe_handle();
        let mut subscription = result.subscribe();

        assert_eq!(subscription.next().await.unwrap().unwrap().payload, json!(0));
        handle.abort();
        assert!(subscription.next().await.is_none());
    }

    #[tokio::test]
    async fn dropping_the_subscription_aborts_upstream() {
        let result = StreamResult::new(futures_util::stream::pending());
        let handle = result.unsubscribe_handle();
        drop(result.subscribe());
        assert!(handle.is_aborted());
    }
}
