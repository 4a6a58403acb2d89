//! Websocket subscription multiplexer.
//!
//! # Responsibilities
//! - Detect websocket upgrade requests anywhere on the router
//! - Route each upgrade to the modern or legacy subscription server
//! - Reject stray or late upgrades by closing with `1001`
//! - Track connected clients so shutdown can close them
//!
//! # Data Flow
//! ```text
//! Upgrade request
//!     → upgrade_middleware (path + Sec-WebSocket-Protocol)
//!     → SubscriptionMultiplexer::route
//!         → Reject: complete handshake, send Close(1001)
//!         → Accept(protocol): async-graphql websocket state machine
//! ```
//!
//! # Design Decisions
//! - The multiplexer is an owned value shared by `Arc`, never a global
//! - `closing` flips before clients are closed so late upgrades are refused
//! - In `Both` mode the modern protocol wins unless only legacy is offered

use std::future::ready;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_graphql::http::{WebSocket as GraphQLWebSocket, WebSocketProtocols, WsMessage};
use async_graphql::{Data, Executor};
use axum::{
    body::Body,
    extract::{
        ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade},
        FromRequestParts, State,
    },
    http::{header, HeaderMap, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use dashmap::DashMap;
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::sync::mpsc;

use crate::config::SubscriptionMode;
use crate::graphql::context::{BuildContextArgs, ContextBuilders, RequestContext};
use crate::graphql::pipeline::ExecutionPipeline;
use crate::http::request::NormalizedRequest;
use crate::observability::metrics;

/// `graphql-transport-ws`, spoken by graphql-ws clients.
pub const MODERN_PROTOCOL: &str = "graphql-transport-ws";

/// `graphql-ws`, spoken by subscriptions-transport-ws clients.
pub const LEGACY_PROTOCOL: &str = "graphql-ws";

/// Close code sent to rejected and shut-down clients.
pub const GOING_AWAY: u16 = 1001;

const GOING_AWAY_REASON: &str = "Going away";

/// A subscription sub-protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubProtocol {
    Modern,
    Legacy,
}

impl SubProtocol {
    /// The `Sec-WebSocket-Protocol` token.
    pub fn token(self) -> &'static str {
        match self {
            Self::Modern => MODERN_PROTOCOL,
            Self::Legacy => LEGACY_PROTOCOL,
        }
    }

    fn engine_protocol(self) -> WebSocketProtocols {
        match self {
            Self::Modern => WebSocketProtocols::GraphQLWS,
            Self::Legacy => WebSocketProtocols::SubscriptionsTransportWS,
        }
    }
}

/// Protocol choice when both servers are mounted.
///
/// Legacy only when the client offers `graphql-ws` without
/// `graphql-transport-ws`; everything else, including a missing header, goes
/// to the modern server.
pub fn select_protocol(header: Option<&str>) -> SubProtocol {
    let offered: Vec<&str> = header
        .map(|value| value.split(',').map(str::trim).collect())
        .unwrap_or_default();

    if offered.contains(&LEGACY_PROTOCOL) && !offered.contains(&MODERN_PROTOCOL) {
        SubProtocol::Legacy
    } else {
        SubProtocol::Modern
    }
}

pub type ClientId = u64;

/// Instructions pushed to a live connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientCommand {
    Close { code: u16, reason: String },
}

/// One websocket server: a protocol plus the clients speaking it.
#[derive(Debug)]
pub struct SubscriptionServer {
    protocol: SubProtocol,
    clients: DashMap<ClientId, mpsc::UnboundedSender<ClientCommand>>,
    next_id: AtomicU64,
}

impl SubscriptionServer {
    pub fn new(protocol: SubProtocol) -> Self {
        Self {
            protocol,
            clients: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn protocol(&self) -> SubProtocol {
        self.protocol
    }

    /// Track a new client. The receiver delivers commands for that client.
    pub fn register(&self) -> (ClientId, mpsc::UnboundedReceiver<ClientCommand>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();
        self.clients.insert(id, tx);
        (id, rx)
    }

    pub fn unregister(&self, id: ClientId) {
        self.clients.remove(&id);
    }

    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    /// Ask every tracked client to close. Returns how many were reached.
    pub fn close_all(&self, code: u16, reason: &str) -> usize {
        self.clients
            .iter()
            .filter(|client| {
                client
                    .value()
                    .send(ClientCommand::Close {
                        code,
                        reason: reason.to_string(),
                    })
                    .is_ok()
            })
            .count()
    }
}

/// The servers mounted for a subscription mode.
#[derive(Debug)]
pub enum SubscriptionServerSet {
    Modern(SubscriptionServer),
    Legacy(SubscriptionServer),
    Both {
        modern: SubscriptionServer,
        legacy: SubscriptionServer,
    },
}

impl SubscriptionServerSet {
    pub fn for_mode(mode: SubscriptionMode) -> Option<Self> {
        match mode {
            SubscriptionMode::Off => None,
            SubscriptionMode::Modern => Some(Self::Modern(SubscriptionServer::new(SubProtocol::Modern))),
            SubscriptionMode::Legacy => Some(Self::Legacy(SubscriptionServer::new(SubProtocol::Legacy))),
            SubscriptionMode::Both => Some(Self::Both {
                modern: SubscriptionServer::new(SubProtocol::Modern),
                legacy: SubscriptionServer::new(SubProtocol::Legacy),
            }),
        }
    }

    pub fn server(&self, protocol: SubProtocol) -> Option<&SubscriptionServer> {
        self.servers().find(|server| server.protocol() == protocol)
    }

    pub fn servers(&self) -> impl Iterator<Item = &SubscriptionServer> {
        let (first, second) = match self {
            Self::Modern(server) | Self::Legacy(server) => (server, None),
            Self::Both { modern, legacy } => (modern, Some(legacy)),
        };
        std::iter::once(first).chain(second)
    }

    fn select(&self, header: Option<&str>) -> SubProtocol {
        match self {
            Self::Modern(_) => SubProtocol::Modern,
            Self::Legacy(_) => SubProtocol::Legacy,
            Self::Both { .. } => select_protocol(header),
        }
    }
}

/// Why an upgrade was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    Closing,
    PathMismatch,
    MalformedRequest,
}

impl RejectReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Closing => "closing",
            Self::PathMismatch => "path_mismatch",
            Self::MalformedRequest => "malformed_request",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpgradeDecision {
    Accept(SubProtocol),
    Reject(RejectReason),
}

/// Shared upgrade router and client registry.
#[derive(Debug)]
pub struct SubscriptionMultiplexer {
    path: String,
    closing: AtomicBool,
    servers: SubscriptionServerSet,
}

impl SubscriptionMultiplexer {
    /// `None` when subscriptions are off.
    pub fn new(mode: SubscriptionMode, path: impl Into<String>) -> Option<Self> {
        SubscriptionServerSet::for_mode(mode).map(|servers| Self {
            path: path.into(),
            closing: AtomicBool::new(false),
            servers,
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn is_closing(&self) -> bool {
        self.closing.load(Ordering::SeqCst)
    }

    pub fn servers(&self) -> &SubscriptionServerSet {
        &self.servers
    }

    pub fn server(&self, protocol: SubProtocol) -> Option<&SubscriptionServer> {
        self.servers.server(protocol)
    }

    /// Decide what to do with an upgrade for `path` (query string ignored).
    pub fn route(&self, path: &str, protocol_header: Option<&str>) -> UpgradeDecision {
        let pathname = path.split_once('?').map_or(path, |(pathname, _)| pathname);

        if self.is_closing() {
            return UpgradeDecision::Reject(RejectReason::Closing);
        }
        if pathname != self.path {
            return UpgradeDecision::Reject(RejectReason::PathMismatch);
        }
        UpgradeDecision::Accept(self.servers.select(protocol_header))
    }

    /// Refuse new upgrades, then close every tracked client with `1001`.
    ///
    /// Returns the number of clients asked to close.
    pub fn shutdown(&self) -> usize {
        self.closing.store(true, Ordering::SeqCst);

        let closed = self
            .servers
            .servers()
            .map(|server| server.close_all(GOING_AWAY, GOING_AWAY_REASON))
            .sum();
        tracing::info!(clients = closed, "Subscription servers closing");
        closed
    }
}

/// State for the upgrade middleware.
pub struct WebSocketState<E> {
    pub executor: E,
    pub pipeline: Arc<dyn ExecutionPipeline>,
    pub contexts: ContextBuilders,
    pub multiplexer: Arc<SubscriptionMultiplexer>,
    pub keepalive_timeout: Option<Duration>,
}

impl<E: Clone> Clone for WebSocketState<E> {
    fn clone(&self) -> Self {
        Self {
            executor: self.executor.clone(),
            pipeline: self.pipeline.clone(),
            contexts: self.contexts.clone(),
            multiplexer: self.multiplexer.clone(),
            keepalive_timeout: self.keepalive_timeout,
        }
    }
}

/// True for `Connection: upgrade` + `Upgrade: websocket` requests.
pub fn is_websocket_upgrade(headers: &HeaderMap) -> bool {
    let has_token = |name: header::HeaderName, token: &str| {
        headers
            .get_all(name)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(|value| value.split(','))
            .any(|part| part.trim().eq_ignore_ascii_case(token))
    };
    has_token(header::UPGRADE, "websocket") && has_token(header::CONNECTION, "upgrade")
}

/// Router-wide middleware handling every websocket upgrade.
pub async fn upgrade_middleware<E: Executor>(
    State(state): State<WebSocketState<E>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if !is_websocket_upgrade(request.headers()) {
        return next.run(request).await;
    }

    let (mut parts, _body) = request.into_parts();
    let upgrade = match WebSocketUpgrade::from_request_parts(&mut parts, &()).await {
        Ok(upgrade) => upgrade,
        Err(rejection) => return rejection.into_response(),
    };

    let protocol_header = parts
        .headers
        .get(header::SEC_WEBSOCKET_PROTOCOL)
        .and_then(|value| value.to_str().ok());

    let decision = match state.multiplexer.route(parts.uri.path(), protocol_header) {
        UpgradeDecision::Accept(protocol) => match NormalizedRequest::from_parts(&parts, &[]) {
            Ok(normalized) => Ok((protocol, normalized)),
            Err(error) => {
                tracing::warn!(error = %error, "Malformed upgrade request");
                Err(RejectReason::MalformedRequest)
            }
        },
        UpgradeDecision::Reject(reason) => Err(reason),
    };

    match decision {
        Ok((protocol, normalized)) => upgrade
            .protocols([protocol.token()])
            .on_upgrade(move |socket| serve_connection(socket, protocol, normalized, state)),
        Err(reason) => {
            tracing::debug!(path = %parts.uri.path(), reason = reason.as_str(), "Rejecting websocket upgrade");
            metrics::record_ws_rejected(reason.as_str());
            upgrade
                .protocols([MODERN_PROTOCOL, LEGACY_PROTOCOL])
                .on_upgrade(reject_connection)
        }
    }
}

fn close_message(code: u16, reason: String) -> Message {
    Message::Close(Some(CloseFrame {
        code,
        reason: reason.into(),
    }))
}

async fn reject_connection(mut socket: WebSocket) {
    let _ = socket
        .send(close_message(GOING_AWAY, GOING_AWAY_REASON.to_string()))
        .await;
}

async fn serve_connection<E: Executor>(
    socket: WebSocket,
    protocol: SubProtocol,
    request: NormalizedRequest,
    state: WebSocketState<E>,
) {
    let Some(server) = state.multiplexer.server(protocol) else {
        return;
    };
    let (client_id, mut control) = server.register();
    metrics::record_ws_connected(protocol.token());
    tracing::debug!(client_id, protocol = protocol.token(), "Subscription client connected");

    let (mut sink, stream) = socket.split();
    let input = stream
        .scan((), |_, message| ready(message.ok()))
        .filter_map(|message| {
            ready(match message {
                Message::Text(_) | Message::Binary(_) => Some(message.into_data()),
                _ => None,
            })
        })
        .boxed();

    let pipeline = state.pipeline.clone();
    let contexts = state.contexts.clone();
    let on_init = move |connection_params: Value| async move {
        let args = BuildContextArgs::websocket(request, protocol.token(), connection_params);
        let context = contexts
            .build(pipeline.as_ref(), &args)
            .await
            .map_err(|error| async_graphql::Error::new(error.to_string()))?;

        let mut data = Data::default();
        data.insert(RequestContext(context));
        Ok::<_, async_graphql::Error>(data)
    };

    let outgoing = GraphQLWebSocket::new(state.executor.clone(), input, protocol.engine_protocol())
        .on_connection_init(on_init)
        .keepalive_timeout(state.keepalive_timeout);
    futures_util::pin_mut!(outgoing);

    loop {
        tokio::select! {
            message = outgoing.next() => match message {
                Some(WsMessage::Text(text)) => {
                    if sink.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                Some(WsMessage::Close(code, reason)) => {
                    let _ = sink.send(close_message(code, reason)).await;
                    break;
                }
                None => break,
            },
            command = control.recv() => {
                let (code, reason) = match command {
                    Some(ClientCommand::Close { code, reason }) => (code, reason),
                    None => (GOING_AWAY, GOING_AWAY_REASON.to_string()),
                };
                let _ = sink.send(close_message(code, reason)).await;
                break;
            }
        }
    }

    server.unregister(client_id);
    metrics::record_ws_disconnected(protocol.token());
    tracing::debug!(client_id, protocol = protocol.token(), "Subscription client disconnected");
}
