//! GraphQL execution glue.
//!
//! # Data Flow
//! ```text
//! NormalizedRequest
//!     → params.rs (query / operationName / variables)
//!     → context.rs (internal context ⊕ user build_context, user wins)
//!     → pipeline.rs (async-graphql parse → validate → execute | subscribe)
//!     → ExecutionResult::{Single, Multipart, Push}
//! ```
//!
//! # Design Decisions
//! - Parsing, validation and execution belong to async-graphql; this module
//!   only decides which result shape a request gets
//! - Context is a flat JSON object so user fields can override internal ones

pub mod context;
pub mod params;
pub mod pipeline;

pub use context::{context_fn, BuildContextArgs, ContextBuilder, ContextBuilders, ContextMap, RequestContext};
pub use params::GraphQLParams;
pub use pipeline::{
    ExecutionPipeline, ExecutionRequest, ExecutionResult, IncrementalChunk, PrintSchema, SchemaPipeline,
    SingleResult, StreamFormat, StreamResult,
};
