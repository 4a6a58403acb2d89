//! Altair, served as a rendered index plus static distribution files.
//!
//! # Routes
//! - `GET <path>` redirects to `<path>/` so relative asset URLs resolve
//! - `GET <path>/` returns the rendered index
//! - `GET <path>/<file>` returns the file from `assets_dir`
//!
//! Missing files are `404`; any other failure is `500 {"message"}`.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    response::{Html, IntoResponse, Redirect, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use serde_json::json;
use tower::ServiceExt;
use tower_http::services::ServeFile;

use crate::config::AltairConfig;

/// Options baked into the rendered index.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AltairOptions<'a> {
    #[serde(skip)]
    pub base_url: &'a str,
    #[serde(skip)]
    pub title: &'a str,
    #[serde(rename = "endpointURL")]
    pub endpoint_url: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscriptions_endpoint: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub initial_query: Option<&'a str>,
    #[serde(skip_serializing_if = "std::collections::BTreeMap::is_empty")]
    pub initial_headers: &'a std::collections::BTreeMap<String, String>,
}

/// Render the Altair index page.
pub fn render_altair(options: &AltairOptions<'_>) -> String {
    // `</` inside a script block would end it early.
    let init = serde_json::to_string(options)
        .unwrap_or_else(|_| "{}".to_string())
        .replace("</", "<\\/");

    r##"<!DOCTYPE html>
<html lang="en">
  <head>
    <meta charset="utf-8" />
    <title>{{TITLE}}</title>
    <base href="{{BASE_URL}}" />
    <meta name="viewport" content="width=device-width,initial-scale=1" />
    <link rel="icon" type="image/x-icon" href="favicon.ico" />
    <link href="styles.css" rel="stylesheet" />
  </head>
  <body>
    <app-root>
      <div class="loading-screen styled">
        <div class="loading-screen-inner">
          <div class="loading-screen-logo-container">
            <img src="assets/img/logo_350.svg" alt="Altair" />
          </div>
          <div class="loading-screen-loading-indicator">
            <span class="loading-indicator-dot"></span>
            <span class="loading-indicator-dot"></span>
            <span class="loading-indicator-dot"></span>
          </div>
        </div>
      </div>
    </app-root>
    <script rel="preload" as="script" type="text/javascript" src="runtime.js"></script>
    <script rel="preload" as="script" type="text/javascript" src="polyfills.js"></script>
    <script rel="preload" as="script" type="text/javascript" src="main.js"></script>
    <script>
      AltairGraphQL.init({{INIT}});
    </script>
  </body>
</html>
"##
    .replace("{{TITLE}}", &escape_html(options.title))
    .replace("{{BASE_URL}}", &escape_html(options.base_url))
    .replace("{{INIT}}", &init)
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// What a request under the mount path refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetPath {
    Index,
    File(PathBuf),
    NotFound,
}

/// Resolve `request_path` relative to `base`.
///
/// The root of the mount is the index; anything else must name a file inside
/// `assets_dir` without escaping it.
pub fn resolve_asset(base: &str, request_path: &str, assets_dir: Option<&Path>) -> AssetPath {
    let Some(suffix) = request_path.strip_prefix(base) else {
        return AssetPath::NotFound;
    };
    let suffix = suffix.trim_start_matches('/');
    if suffix.is_empty() || suffix == "index.html" {
        return AssetPath::Index;
    }

    let Some(dir) = assets_dir else {
        return AssetPath::NotFound;
    };

    let mut path = dir.to_path_buf();
    for segment in suffix.split('/') {
        match segment {
            "" | "." => continue,
            ".." => return AssetPath::NotFound,
            segment if segment.contains('\\') || segment.contains('%') => return AssetPath::NotFound,
            segment => path.push(segment),
        }
    }
    AssetPath::File(path)
}

#[derive(Debug)]
struct AltairAssets {
    base: String,
    index: String,
    assets_dir: Option<PathBuf>,
}

/// Routes for the Altair surface.
pub fn altair_router(config: &AltairConfig, endpoint: &str, subscription_endpoint: Option<&str>) -> Router {
    let base = config.path.trim_end_matches('/').to_string();
    let slashed = format!("{base}/");

    let index = render_altair(&AltairOptions {
        base_url: &slashed,
        title: &config.title,
        endpoint_url: endpoint,
        subscriptions_endpoint: subscription_endpoint,
        initial_query: config.initial_query.as_deref(),
        initial_headers: &config.initial_headers,
    });

    let assets = Arc::new(AltairAssets {
        base: base.clone(),
        index,
        assets_dir: config.assets_dir.clone(),
    });

    let mut router = Router::new();
    // A root mount has no bare form to redirect from.
    if !base.is_empty() {
        let redirect_to = slashed.clone();
        router = router.route(
            &base,
            get(move || {
                let location = redirect_to.clone();
                async move { Redirect::permanent(&location) }
            }),
        );
    }
    router
        .route(&slashed, get(serve_altair))
        .route(&format!("{base}/{{*asset}}"), get(serve_altair))
        .with_state(assets)
}

async fn serve_altair(State(assets): State<Arc<AltairAssets>>, request: Request<Body>) -> Response {
    let resolved = resolve_asset(&assets.base, request.uri().path(), assets.assets_dir.as_deref());

    match resolved {
        AssetPath::Index => Html(assets.index.clone()).into_response(),
        AssetPath::NotFound => StatusCode::NOT_FOUND.into_response(),
        AssetPath::File(path) => match serve_file(&path, request).await {
            Ok(response) => response,
            Err(error) if error.kind() == io::ErrorKind::NotFound => StatusCode::NOT_FOUND.into_response(),
            Err(error) => {
                tracing::error!(path = %path.display(), error = %error, "Failed to serve Altair asset");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "message": error.to_string() })),
                )
                    .into_response()
            }
        },
    }
}

async fn serve_file(path: &Path, request: Request<Body>) -> io::Result<Response> {
    let metadata = tokio::fs::metadata(path).await?;
    if !metadata.is_file() {
        return Err(io::Error::new(io::ErrorKind::NotFound, "not a file"));
    }

    let response = match ServeFile::new(path).oneshot(request).await {
        Ok(response) => response,
        Err(infallible) => match infallible {},
    };
    if response.status() == StatusCode::INTERNAL_SERVER_ERROR {
        return Err(io::Error::other(format!("could not read {}", path.display())));
    }
    Ok(response.map(Body::new))
}
