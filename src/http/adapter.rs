//! The GraphQL request adapter.
//!
//! # Data Flow
//! ```text
//! axum Request
//!     → NormalizedRequest (body + query decoded once)
//!     → GraphQLParams + merged context
//!     → ExecutionPipeline::execute
//!     → Single | Multipart | Push serializer
//! ```
//!
//! # Design Decisions
//! - Any error before headers are written becomes `500 {"message"}`
//! - Streamed results own their subscription through the response body

use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Body,
    extract::State,
    http::Request,
    response::{IntoResponse, Response},
};

use crate::error::AdapterError;
use crate::graphql::context::{BuildContextArgs, ContextBuilders};
use crate::graphql::params::GraphQLParams;
use crate::graphql::pipeline::{ExecutionPipeline, ExecutionRequest, ExecutionResult, StreamFormat};
use crate::http::request::NormalizedRequest;
use crate::http::response::{multipart_response, push_response, single_response};
use crate::observability::metrics;

/// State shared by every GraphQL HTTP request.
#[derive(Clone)]
pub struct GraphQLState {
    pub pipeline: Arc<dyn ExecutionPipeline>,
    pub contexts: ContextBuilders,
    pub body_limit: usize,
}

/// Axum handler mounted on `GET|POST <graphql path>`.
pub async fn graphql_handler(State(state): State<GraphQLState>, request: Request<Body>) -> Response {
    let start = Instant::now();

    let normalized = match NormalizedRequest::from_request(request, state.body_limit).await {
        Ok(normalized) => normalized,
        Err(error) => {
            let response = error.into_response();
            metrics::record_request("error", response.status().as_u16(), start);
            return response;
        }
    };

    let (response, kind) = handle(normalized, &state.contexts, state.pipeline.as_ref()).await;
    metrics::record_request(kind, response.status().as_u16(), start);
    response
}

/// Run one request through the pipeline and serialize the result.
///
/// Returns the response and the result kind for metrics.
pub async fn handle(
    request: NormalizedRequest,
    contexts: &ContextBuilders,
    pipeline: &dyn ExecutionPipeline,
) -> (Response, &'static str) {
    let request_id = request.request_id().unwrap_or("unknown").to_string();

    match execute(request, contexts, pipeline).await {
        Ok(ExecutionResult::Single(single)) => {
            tracing::debug!(request_id = %request_id, status = %single.status, "Sending single result");
            (single_response(single), "single")
        }
        Ok(ExecutionResult::Multipart(result)) => {
            tracing::debug!(request_id = %request_id, "Streaming multipart result");
            (multipart_response(result), "multipart")
        }
        Ok(ExecutionResult::Push(result)) => {
            tracing::debug!(request_id = %request_id, "Streaming event-stream result");
            (push_response(result), "push")
        }
        Err(error) => {
            tracing::error!(request_id = %request_id, error = %error, "GraphQL request failed");
            (error.into_response(), "error")
        }
    }
}

async fn execute(
    request: NormalizedRequest,
    contexts: &ContextBuilders,
    pipeline: &dyn ExecutionPipeline,
) -> Result<ExecutionResult, AdapterError> {
    let params = GraphQLParams::extract(&request)?;
    let stream_format = StreamFormat::from_accept(&request.headers);
    let method = request.method.clone();

    let args = BuildContextArgs::http(request);
    let context = contexts.build(pipeline, &args).await?;

    pipeline
        .execute(ExecutionRequest {
            params,
            method,
            context,
            stream_format,
        })
        .await
}
