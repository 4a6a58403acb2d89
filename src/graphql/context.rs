//! Execution context assembly.
//!
//! The context handed to resolvers is the pipeline's own context with the
//! user's `build_context` result shallow-merged on top. The same merge is used
//! for HTTP requests and websocket connections.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::AdapterError;
use crate::graphql::pipeline::ExecutionPipeline;
use crate::http::request::NormalizedRequest;

/// A flat JSON object of context fields.
pub type ContextMap = Map<String, Value>;

/// Merged context attached to every async-graphql request as data.
///
/// Resolvers read it with `ctx.data::<RequestContext>()`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestContext(pub ContextMap);

impl RequestContext {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }
}

/// Shallow merge where `overlay` wins on key collision.
pub fn merge_right(base: ContextMap, overlay: ContextMap) -> ContextMap {
    let mut merged = base;
    merged.extend(overlay);
    merged
}

/// How the request reached us.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transport {
    Http,
    /// Carries the negotiated sub-protocol token.
    WebSocket { protocol: String },
}

/// Input to every context builder.
#[derive(Debug, Clone)]
pub struct BuildContextArgs {
    /// For websockets this is the upgrade request, with a null body.
    pub request: NormalizedRequest,
    pub transport: Transport,
    /// `connection_init` payload; only set for websockets.
    pub connection_params: Option<Value>,
}

impl BuildContextArgs {
    pub fn http(request: NormalizedRequest) -> Self {
        Self {
            request,
            transport: Transport::Http,
            connection_params: None,
        }
    }

    pub fn websocket(request: NormalizedRequest, protocol: &str, connection_params: Value) -> Self {
        Self {
            request,
            transport: Transport::WebSocket {
                protocol: protocol.to_string(),
            },
            connection_params: Some(connection_params),
        }
    }
}

/// User hook producing extra context fields.
#[async_trait]
pub trait ContextBuilder: Send + Sync + 'static {
    async fn build(&self, args: &BuildContextArgs) -> Result<ContextMap, AdapterError>;
}

/// Adapter turning an async closure into a [`ContextBuilder`].
pub struct FnContextBuilder<F>(F);

/// Wrap an async closure as a context builder.
///
/// ```ignore
/// let builder = context_fn(|args| async move {
///     let mut ctx = ContextMap::new();
///     ctx.insert("user".into(), "anonymous".into());
///     Ok(ctx)
/// });
/// ```
pub fn context_fn<F, Fut>(f: F) -> FnContextBuilder<F>
where
    F: Fn(BuildContextArgs) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<ContextMap, AdapterError>> + Send + 'static,
{
    FnContextBuilder(f)
}

#[async_trait]
impl<F, Fut> ContextBuilder for FnContextBuilder<F>
where
    F: Fn(BuildContextArgs) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<ContextMap, AdapterError>> + Send + 'static,
{
    async fn build(&self, args: &BuildContextArgs) -> Result<ContextMap, AdapterError> {
        (self.0)(args.clone()).await
    }
}

/// The optional user builder, combined with the pipeline's own factory.
#[derive(Clone, Default)]
pub struct ContextBuilders {
    user: Option<Arc<dyn ContextBuilder>>,
}

impl ContextBuilders {
    pub fn new(user: Option<Arc<dyn ContextBuilder>>) -> Self {
        Self { user }
    }

    /// Await both sources, then merge user fields over internal ones.
    pub async fn build(
        &self,
        pipeline: &dyn ExecutionPipeline,
        args: &BuildContextArgs,
    ) -> Result<ContextMap, AdapterError> {
        match &self.user {
            None => Ok(pipeline.context(args).await),
            Some(user) => {
                let (internal, user) = futures_util::join!(pipeline.context(args), user.build(args));
                Ok(merge_right(internal, user?))
            }
        }
    }
}

impl std::fmt::Debug for ContextBuilders {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextBuilders")
            .field("user", &self.user.is_some())
            .finish()
    }
}

/// Fields every context starts with.
pub fn internal_context(args: &BuildContextArgs) -> ContextMap {
    let mut ctx = ContextMap::new();

    let headers: Map<String, Value> = args
        .request
        .headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_string(), Value::String(v.to_string())))
        })
        .collect();

    ctx.insert("method".into(), Value::String(args.request.method.to_string()));
    ctx.insert("headers".into(), Value::Object(headers));
    if let Some(id) = args.request.request_id() {
        ctx.insert("requestId".into(), Value::String(id.to_string()));
    }

    match &args.transport {
        Transport::Http => {
            ctx.insert("transport".into(), Value::String("http".into()));
        }
        Transport::WebSocket { protocol } => {
            ctx.insert("transport".into(), Value::String("websocket".into()));
            ctx.insert("protocol".into(), Value::String(protocol.clone()));
        }
    }
    if let Some(params) = &args.connection_params {
        ctx.insert("connectionParams".into(), params.clone());
    }

    ctx
}
