//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (axum serve, graceful shutdown)
//!     → websocket.rs (upgrade requests: route to a subscription server or reject)
//!     → request.rs (NormalizedRequest, request id)
//!     → adapter.rs (params → context → pipeline)
//!     → response.rs (Single JSON | multipart/mixed | text/event-stream)
//!     → Send to client
//! ```

pub mod adapter;
pub mod request;
pub mod response;
pub mod server;
pub mod websocket;

pub use adapter::{graphql_handler, GraphQLState};
pub use request::{NormalizedRequest, X_REQUEST_ID};
pub use server::HttpServer;
pub use websocket::{SubProtocol, SubscriptionMultiplexer, UpgradeDecision};
