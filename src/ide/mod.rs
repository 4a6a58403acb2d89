//! In-browser GraphQL IDEs.
//!
//! # Data Flow
//! ```text
//! IdeConfig
//!     → graphiql.rs (HTML rendered once, served verbatim)
//!     → altair.rs (rendered index + static distribution files)
//!     → merged into the application router
//! ```
//!
//! # Design Decisions
//! - Each surface is mounted only when enabled
//! - Pages are rendered at startup; requests never re-render

pub mod altair;
pub mod graphiql;

use axum::Router;

use crate::config::IdeConfig;

pub use altair::{altair_router, render_altair, resolve_asset, AltairOptions, AssetPath};
pub use graphiql::{graphiql_router, render_graphiql};

/// Routes for every enabled IDE.
pub fn ide_router(config: &IdeConfig, endpoint: &str, subscription_endpoint: Option<&str>) -> Router {
    let mut router = Router::new();

    if config.altair.enabled {
        tracing::info!(path = %config.altair.path, "Serving Altair");
        router = router.merge(altair_router(&config.altair, endpoint, subscription_endpoint));
    }
    if config.graphiql.enabled {
        tracing::info!(path = %config.graphiql.path, "Serving GraphiQL");
        router = router.merge(graphiql_router(&config.graphiql, endpoint, subscription_endpoint));
    }

    router
}
