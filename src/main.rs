//! graphql-bridge demo server.
//!
//! ```text
//!   HTTP GET/POST ──▶ adapter ──▶ async-graphql ──▶ JSON | multipart | SSE
//!   WS upgrade ────▶ multiplexer ──▶ graphql-transport-ws | graphql-ws
//!   /altair, /graphiql ──▶ IDE pages
//!   codegen task ──▶ TypeScript + schema files
//! ```

use std::path::PathBuf;
use std::time::Duration;

use async_graphql::{Context, EmptyMutation, Object, Schema, Subscription};
use clap::Parser;
use futures_util::Stream;
use tokio::net::TcpListener;

use graphql_bridge::graphql::RequestContext;
use graphql_bridge::lifecycle::{init_observability, load_startup_config, wait_for_signal, Shutdown};
use graphql_bridge::GraphQLApp;

#[derive(Parser)]
#[command(name = "graphql-bridge", about = "GraphQL server with subscriptions, IDEs and codegen")]
struct Args {
    /// TOML config file; defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

struct Query;

#[Object]
impl Query {
    async fn hello(&self) -> &str {
        "Hello World!"
    }

    /// Returns `message`, tagged with the request id when one is known.
    async fn echo(&self, ctx: &Context<'_>, message: String) -> String {
        match ctx.data_opt::<RequestContext>().and_then(|c| c.get_str("requestId")) {
            Some(id) => format!("{message} ({id})"),
            None => message,
        }
    }
}

struct SubscriptionRoot;

#[Subscription]
impl SubscriptionRoot {
    /// Counts down from `from` to zero, one number per second.
    async fn countdown(&self, #[graphql(default = 3)] from: i32) -> impl Stream<Item = i32> {
        futures_util::stream::unfold((from, true), |(n, first)| async move {
            if n < 0 {
                return None;
            }
            if !first {
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
            Some((n, (n - 1, false)))
        })
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = load_startup_config(args.config.as_deref())?;
    init_observability(&config);

    tracing::info!(
        bind_address = %config.listener.bind_address,
        graphql_path = %config.graphql.path,
        subscriptions = ?config.subscriptions.mode,
        "graphql-bridge v0.1.0 starting"
    );

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let schema = Schema::build(Query, EmptyMutation, SubscriptionRoot).finish();
    let server = GraphQLApp::new(schema, config).build().into_server();

    let shutdown = Shutdown::new();
    let signalled = shutdown.signalled();
    tokio::spawn(async move {
        wait_for_signal().await;
        shutdown.trigger();
    });

    server.run(listener, signalled).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
