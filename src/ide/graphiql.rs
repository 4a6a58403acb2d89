//! GraphiQL, a single page rendered once at startup.

use std::sync::Arc;

use async_graphql::http::GraphiQLSource;
use axum::{response::Html, routing::get, Router};

use crate::config::GraphiqlConfig;

/// Render the GraphiQL page for the given endpoints.
pub fn render_graphiql(config: &GraphiqlConfig, endpoint: &str, subscription_endpoint: Option<&str>) -> String {
    let source = GraphiQLSource::build().endpoint(endpoint).title(&config.title);
    match subscription_endpoint {
        Some(subscription_endpoint) => source.subscription_endpoint(subscription_endpoint).finish(),
        None => source.finish(),
    }
}

/// `GET <path>` serving the pre-rendered page verbatim.
pub fn graphiql_router(config: &GraphiqlConfig, endpoint: &str, subscription_endpoint: Option<&str>) -> Router {
    let html: Arc<str> = render_graphiql(config, endpoint, subscription_endpoint).into();

    Router::new().route(
        &config.path,
        get(move || {
            let html = html.clone();
            async move { Html(html.to_string()) }
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_points_at_endpoints() {
        let config = GraphiqlConfig {
            enabled: true,
            title: "Bridge IDE".to_string(),
            ..GraphiqlConfig::default()
        };
        let html = render_graphiql(&config, "/graphql", Some("/graphql"));

        assert!(html.contains("/graphql"));
        assert!(html.contains("Bridge IDE"));
    }
}
