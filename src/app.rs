//! Application assembly.
//!
//! # Data Flow
//! ```text
//! AppConfig + executor (+ context builder)
//!     → GraphQL route (GET/POST, http::adapter)
//!     → IDE routes (ide::ide_router)
//!     → websocket upgrade middleware (when subscriptions are on)
//!     → timeout / body limit / CORS / request id / trace layers
//!     → codegen task (when enabled)
//! ```

use std::sync::Arc;
use std::time::Duration;

use async_graphql::Executor;
use axum::{
    body::Body,
    http::{HeaderValue, Method, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use tokio::task::JoinHandle;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::codegen::{self, CodegenReport, CodegenTrigger, OnError};
use crate::config::{AppConfig, CorsConfig};
use crate::graphql::{ContextBuilder, ContextBuilders, ExecutionPipeline, PrintSchema, SchemaPipeline};
use crate::http::adapter::{graphql_handler, GraphQLState};
use crate::http::request::{propagate_request_id_layer, set_request_id_layer};
use crate::http::websocket::{upgrade_middleware, SubscriptionMultiplexer, WebSocketState};
use crate::http::HttpServer;
use crate::ide::ide_router;
use crate::observability::tracing::make_request_span;

/// Builder for the GraphQL application.
pub struct GraphQLApp<E> {
    executor: E,
    config: AppConfig,
    pipeline: Option<Arc<dyn ExecutionPipeline>>,
    context: Option<Arc<dyn ContextBuilder>>,
    on_codegen_error: OnError,
}

/// A built application: the router plus the handles shutdown and tests need.
pub struct App {
    pub router: Router,
    pub multiplexer: Option<Arc<SubscriptionMultiplexer>>,
    pub codegen: Option<JoinHandle<CodegenReport>>,
}

impl App {
    pub fn into_server(self) -> HttpServer {
        HttpServer::new(self.router, self.multiplexer)
    }
}

impl<E> GraphQLApp<E>
where
    E: Executor + PrintSchema,
{
    pub fn new(executor: E, config: AppConfig) -> Self {
        Self {
            executor,
            config,
            pipeline: None,
            context: None,
            on_codegen_error: codegen::log_error(),
        }
    }

    /// User context merged over the internal one for every request.
    pub fn context_builder(mut self, builder: impl ContextBuilder + 'static) -> Self {
        self.context = Some(Arc::new(builder));
        self
    }

    /// Replace the default executor-backed pipeline.
    pub fn pipeline(mut self, pipeline: Arc<dyn ExecutionPipeline>) -> Self {
        self.pipeline = Some(pipeline);
        self
    }

    pub fn on_codegen_error(mut self, on_error: OnError) -> Self {
        self.on_codegen_error = on_error;
        self
    }

    /// Assemble the router. Must run inside a Tokio runtime when codegen is enabled.
    #[allow(deprecated)]
    pub fn build(self) -> App {
        let config = self.config;
        let pipeline = self
            .pipeline
            .unwrap_or_else(|| Arc::new(SchemaPipeline::new(self.executor.clone())));
        let contexts = ContextBuilders::new(self.context);

        let graphql_state = GraphQLState {
            pipeline: pipeline.clone(),
            contexts: contexts.clone(),
            body_limit: config.security.max_body_size,
        };

        let multiplexer = SubscriptionMultiplexer::new(config.subscriptions.mode, config.subscription_path()).map(Arc::new);
        let subscription_endpoint = multiplexer.as_ref().map(|m| m.path().to_string());

        let mut router = Router::new()
            .route(&config.graphql.path, get(graphql_handler).post(graphql_handler))
            .with_state(graphql_state)
            .merge(ide_router(&config.ide, &config.graphql.path, subscription_endpoint.as_deref()))
            .fallback(not_found);

        if let Some(multiplexer) = &multiplexer {
            tracing::info!(
                path = %multiplexer.path(),
                mode = ?config.subscriptions.mode,
                "Websocket subscriptions enabled"
            );
            let ws_state = WebSocketState {
                executor: self.executor.clone(),
                pipeline,
                contexts,
                multiplexer: multiplexer.clone(),
                keepalive_timeout: config.subscriptions.keepalive_timeout_secs.map(Duration::from_secs),
            };
            router = router.layer(middleware::from_fn_with_state(ws_state, upgrade_middleware::<E>));
        }

        router = router
            .layer(RequestBodyLimitLayer::new(config.security.max_body_size))
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)));
        if config.security.cors.enabled {
            router = router.layer(cors_layer(&config.security.cors));
        }
        let router = router
            .layer(TraceLayer::new_for_http().make_span_with(make_request_span::<Body>))
            .layer(propagate_request_id_layer())
            .layer(set_request_id_layer());

        let codegen = config.codegen.enabled.then(|| {
            tracing::info!(target_path = %config.codegen.target_path.display(), "Codegen scheduled");
            CodegenTrigger::spawn(self.executor, config.codegen.clone(), self.on_codegen_error)
        });

        App {
            router,
            multiplexer,
            codegen,
        }
    }
}

fn cors_layer(config: &CorsConfig) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    if config.allowed_origins.is_empty() {
        return layer.allow_origin(Any);
    }
    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(origins))
}

async fn not_found() -> Response {
    (StatusCode::NOT_FOUND, Json(serde_json::json!({ "message": "Not Found" }))).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_graphql::{EmptyMutation, EmptySubscription, Object, Schema};
    use axum::http::Request;
    use tower::ServiceExt;

    struct Query;

    #[Object]
    impl Query {
        async fn hello(&self) -> &str {
            "Hello World!"
        }
    }

    fn app(config: AppConfig) -> App {
        GraphQLApp::new(Schema::new(Query, EmptyMutation, EmptySubscription), config).build()
    }

    #[tokio::test]
    async fn subscriptions_off_builds_no_multiplexer() {
        let built = app(AppConfig::default());
        assert!(built.multiplexer.is_none());
        assert!(built.codegen.is_none());
    }

    #[tokio::test]
    async fn responses_carry_request_ids() {
        let response = app(AppConfig::default())
            .router
            .oneshot(
                Request::builder()
                    .uri("/graphql?query=%7Bhello%7D")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));
    }

    #[tokio::test]
    async fn unknown_paths_are_json_404() {
        let response = app(AppConfig::default())
            .router
            .oneshot(Request::builder().uri("/nope").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
