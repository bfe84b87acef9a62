//! Reference binary wiring [`GatewayHandler`] to an axum HTTP server over an
//! in-process [`FakeBus`] scripted with the same `success`/`fail`/`error`
//! command set as the original echo peer, so the gateway can be driven
//! end-to-end without a real downstream bus.
//!
//! Grounded on `cmd/rinq-httpd`'s upgrade-or-statuspage dispatch and
//! `cmd/echo-server`'s command set, adapted to an axum entrypoint the way
//! `turbomcp-server::transport::websocket` wires its upgrade handler.

mod statuspage;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::connect_info::ConnectInfo;
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{FromRequestParts, Request, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use clap::Parser;
use rinq_bus::{CallOutcome, FakeBus};
use rinq_gateway::{AxumSocket, Encoding, GatewayHandler, Options};
use rinq_wire::Payload;
use tower_http::trace::TraceLayer;
use tracing::info;

const ECHO_NAMESPACE: &str = "echo";

/// A WebSocket-to-RPC gateway demo, backed by an in-memory echo bus.
#[derive(Parser, Debug)]
#[command(name = "echo-server", version)]
struct Cli {
    /// Address to bind the HTTP listener to.
    #[arg(long, env = "RINQ_BIND", default_value = "0.0.0.0:8080")]
    bind: SocketAddr,

    /// Origin pattern allowed to open connections (empty matches the
    /// request's own Host header, `*` allows any origin).
    #[arg(long, env = "RINQ_ORIGIN", default_value = "")]
    origin: String,

    /// Wire sub-protocol encoding this instance negotiates.
    #[arg(long, value_enum, default_value = "json")]
    encoding: EncodingArg,

    /// Liveness ping interval, in milliseconds.
    #[arg(long, default_value_t = 10_000)]
    ping_interval_ms: u64,

    /// Maximum number of calls in flight per connection.
    #[arg(long, default_value_t = 100)]
    max_calls_per_connection: usize,

    /// Maximum number of calls in flight across all connections.
    #[arg(long, default_value_t = 10_000)]
    max_calls_global: usize,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum EncodingArg {
    Json,
    Cbor,
}

impl From<EncodingArg> for Encoding {
    fn from(value: EncodingArg) -> Self {
        match value {
            EncodingArg::Json => Encoding::Json,
            EncodingArg::Cbor => Encoding::Cbor,
        }
    }
}

#[derive(Clone)]
struct AppState {
    handler: Arc<GatewayHandler<FakeBus>>,
    local_addr: SocketAddr,
}

fn echo_bus() -> FakeBus {
    let bus = FakeBus::new();
    bus.script(
        ECHO_NAMESPACE,
        "success",
        CallOutcome::Success(Payload::Foreign(serde_json::json!({"echo": true}))),
    );
    bus.script(
        ECHO_NAMESPACE,
        "fail",
        CallOutcome::Failure {
            failure_type: "echo-failure".to_string(),
            failure_message: "Failure requested by client.".to_string(),
            payload: Payload::empty_foreign(),
        },
    );
    bus.script(ECHO_NAMESPACE, "error", CallOutcome::Error);
    bus
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let options = Options::default()
        .with_origin_pattern(cli.origin.clone())
        .with_ping_interval(Duration::from_millis(cli.ping_interval_ms))
        .with_max_concurrent_calls(cli.max_calls_per_connection, cli.max_calls_global);

    let handler = GatewayHandler::new(Arc::new(echo_bus()), cli.encoding.into(), options)
        .expect("handler options are valid");

    let listener = tokio::net::TcpListener::bind(cli.bind)
        .await
        .unwrap_or_else(|err| panic!("failed to bind {}: {err}", cli.bind));
    let local_addr = listener
        .local_addr()
        .expect("a bound listener has a local address");

    let state = AppState {
        handler: Arc::new(handler),
        local_addr,
    };

    let app = Router::new()
        .route("/", get(upgrade_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    info!(addr = %local_addr, "echo-server listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .expect("server error");
}

fn is_websocket_upgrade(headers: &HeaderMap) -> bool {
    let has_upgrade_token = headers
        .get(header::CONNECTION)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.split(',').any(|tok| tok.trim().eq_ignore_ascii_case("upgrade")));
    let is_websocket = headers
        .get(header::UPGRADE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.eq_ignore_ascii_case("websocket"));
    has_upgrade_token && is_websocket
}

async fn upgrade_handler(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    req: Request,
) -> Response {
    let headers = req.headers().clone();

    if !is_websocket_upgrade(&headers) {
        return statuspage::write(&headers, StatusCode::UPGRADE_REQUIRED, "expected a WebSocket upgrade");
    }

    if !state.handler.bus_healthy() {
        return statuspage::write(&headers, StatusCode::SERVICE_UNAVAILABLE, "bus unavailable");
    }

    let host = headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    let origin = headers.get("origin").and_then(|v| v.to_str().ok()).map(str::to_string);
    let forwarded_for = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    if !state.handler.origin_allowed(origin.as_deref(), &host) {
        return statuspage::write(&headers, StatusCode::FORBIDDEN, "origin not allowed");
    }

    let (mut parts, _body) = req.into_parts();
    let ws = match WebSocketUpgrade::from_request_parts(&mut parts, &state).await {
        Ok(ws) => ws,
        Err(rejection) => return rejection.into_response(),
    };

    let attrs = GatewayHandler::<FakeBus>::request_attrs(
        forwarded_for.as_deref(),
        &addr.to_string(),
        &state.local_addr.to_string(),
        &host,
    );
    let handler = state.handler.clone();
    let protocol = handler.protocol();
    let max_frame = handler.max_message_size();

    ws.protocols([protocol])
        .max_frame_size(max_frame)
        .on_upgrade(move |socket| async move {
            handler.handle(AxumSocket(socket), attrs).await;
        })
}
