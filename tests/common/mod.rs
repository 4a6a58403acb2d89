//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_graphql::{Context, Object, Schema, Subscription};
use futures_util::Stream;
use graphql_bridge::graphql::RequestContext;
use graphql_bridge::http::SubscriptionMultiplexer;
use graphql_bridge::{AppConfig, GraphQLApp, Shutdown};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

pub struct Query;

#[Object]
impl Query {
    async fn hello(&self) -> &str {
        "Hello World!"
    }

    async fn echo(&self, message: String) -> String {
        message
    }

    /// A value from the merged request context.
    async fn context_value(&self, ctx: &Context<'_>, key: String) -> Option<String> {
        ctx.data_opt::<RequestContext>()
            .and_then(|context| context.get(&key))
            .map(|value| match value {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            })
    }
}

pub struct Mutation;

#[Object]
impl Mutation {
    async fn rename(&self, name: String) -> String {
        name
    }
}

pub struct SubscriptionRoot;

#[Subscription]
impl SubscriptionRoot {
    async fn countdown(&self, #[graphql(default = 3)] from: i32) -> impl Stream<Item = i32> {
        futures_util::stream::iter((0..=from).rev())
    }

    /// Never completes; for websocket lifecycle tests.
    async fn ticks(&self) -> impl Stream<Item = i32> {
        futures_util::stream::unfold(0, |n| async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            Some((n, n + 1))
        })
    }
}

pub type TestSchema = Schema<Query, Mutation, SubscriptionRoot>;

pub fn schema() -> TestSchema {
    Schema::new(Query, Mutation, SubscriptionRoot)
}

/// A server on an ephemeral port.
pub struct TestServer {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    pub multiplexer: Option<Arc<SubscriptionMultiplexer>>,
    pub handle: JoinHandle<()>,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }

    pub fn ws_url(&self, path: &str) -> String {
        format!("ws://{}{path}", self.addr)
    }

    /// Trigger graceful shutdown and wait for the server task.
    pub async fn stop(self) {
        self.shutdown.trigger();
        let _ = tokio::time::timeout(Duration::from_secs(5), self.handle).await;
    }
}

pub async fn start_server(config: AppConfig) -> TestServer {
    start_app(GraphQLApp::new(schema(), config)).await
}

pub async fn start_app(app: GraphQLApp<TestSchema>) -> TestServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let built = app.build();
    let multiplexer = built.multiplexer.clone();
    let server = built.into_server();

    let shutdown = Shutdown::new();
    let signalled = shutdown.signalled();
    let handle = tokio::spawn(async move {
        server.run(listener, signalled).await.unwrap();
    });

    TestServer {
        addr,
        shutdown,
        multiplexer,
        handle,
    }
}
