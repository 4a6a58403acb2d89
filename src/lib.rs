//! GraphQL adapter layer for axum.
//!
//! Mounts any async-graphql executor behind an HTTP endpoint with
//! multipart and event-stream delivery, a websocket subscription
//! multiplexer, in-browser IDEs and a TypeScript codegen trigger.

pub mod app;
pub mod codegen;
pub mod config;
pub mod error;
pub mod graphql;
pub mod http;
pub mod ide;
pub mod lifecycle;
pub mod observability;

pub use app::{App, GraphQLApp};
pub use config::AppConfig;
pub use error::AdapterError;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
