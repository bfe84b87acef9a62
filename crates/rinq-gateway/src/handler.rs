//! Per-connection handler façade: configuration, origin matching, session
//! attribute derivation, and the `handle()` entry point that binds the I/O
//! loop to the multiplexer and owns teardown.
//!
//! Grounded on `examples/original_source/src/websock/{options,origin,handler}.go`
//! and `examples/original_source/src/websock/native/{handler,attr}.go`.

use std::sync::Arc;
use std::time::Duration;

use axum::http::Uri;
use rinq_bus::BusClient;
use rinq_wire::{CborCodec, FrameCodec, JsonCodec};
use tokio::sync::Semaphore;
use tracing::{error, warn};

use crate::capacity::CapacityGovernor;
use crate::error::GatewayError;
use crate::io::{ConnectionIo, WsSocket};
use crate::multiplexer::Multiplexer;

pub const PROTOCOL_PREFIX: &str = "rinq-1.0+";

/// The namespace session attributes derived from the HTTP request are
/// installed under, so other collaborators can add their own without
/// colliding (`native/attr.go`'s `attrNamespace`).
pub const ATTR_NAMESPACE: &str = "rinq.httpd";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Cbor,
    Json,
}

impl Encoding {
    pub fn name(self) -> &'static str {
        match self {
            Encoding::Cbor => "cbor",
            Encoding::Json => "json",
        }
    }

    pub fn codec(self) -> Arc<dyn FrameCodec> {
        match self {
            Encoding::Cbor => Arc::new(CborCodec),
            Encoding::Json => Arc::new(JsonCodec),
        }
    }

    /// Recover the encoding from a negotiated sub-protocol label such as
    /// `rinq-1.0+cbor`.
    pub fn from_subprotocol(label: &str) -> Option<Self> {
        match label.strip_prefix(PROTOCOL_PREFIX)? {
            "cbor" => Some(Encoding::Cbor),
            "json" => Some(Encoding::Json),
            _ => None,
        }
    }
}

/// Matches a request's `Origin` header against a configured pattern.
/// Mirrors `newOriginChecker` in `websock/origin.go`: exact match, `*` for
/// any origin, or a single leading/trailing wildcard. An empty pattern falls
/// back to comparing against the request's own `Host` header, the way
/// Gorilla's default `CheckOrigin` does.
#[derive(Debug, Clone)]
enum OriginMatcher {
    MatchHost,
    Any,
    Suffix(String),
    Prefix(String),
    Exact(String),
}

impl OriginMatcher {
    fn new(pattern: &str) -> Self {
        let pattern = pattern.to_lowercase();
        if pattern.is_empty() {
            OriginMatcher::MatchHost
        } else if pattern == "*" {
            OriginMatcher::Any
        } else if let Some(suffix) = pattern.strip_prefix('*') {
            OriginMatcher::Suffix(suffix.to_string())
        } else if let Some(prefix) = pattern.strip_suffix('*') {
            OriginMatcher::Prefix(prefix.to_string())
        } else {
            OriginMatcher::Exact(pattern)
        }
    }

    fn matches(&self, origin_host: &str, request_host: &str) -> bool {
        match self {
            OriginMatcher::MatchHost => origin_host == request_host.to_lowercase(),
            OriginMatcher::Any => true,
            OriginMatcher::Suffix(suffix) => origin_host.ends_with(suffix.as_str()),
            OriginMatcher::Prefix(prefix) => origin_host.starts_with(prefix.as_str()),
            OriginMatcher::Exact(exact) => origin_host == exact,
        }
    }
}

/// Lowercased `host[:port]` out of a raw `Origin` header value, or empty if
/// it can't be parsed as a URI with an authority (matches `getOrigin`'s
/// "parse fails or header absent -> empty string" fallback).
fn origin_authority(origin_header: Option<&str>) -> String {
    origin_header
        .and_then(|raw| raw.parse::<Uri>().ok())
        .and_then(|uri| uri.authority().map(|a| a.as_str().to_lowercase()))
        .unwrap_or_default()
}

/// Configuration for a [`GatewayHandler`]. Built with the `with_*` methods
/// and validated fail-fast by [`GatewayHandler::new`].
#[derive(Debug, Clone)]
pub struct Options {
    origin_pattern: String,
    ping_interval: Duration,
    max_message_size: usize,
    max_calls_per_connection: usize,
    max_calls_global: usize,
    max_call_timeout: Option<Duration>,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            origin_pattern: String::new(),
            ping_interval: Duration::from_secs(10),
            max_message_size: 1024 * 1024,
            max_calls_per_connection: 100,
            max_calls_global: 10_000,
            max_call_timeout: None,
        }
    }
}

impl Options {
    pub fn with_origin_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.origin_pattern = pattern.into();
        self
    }

    pub fn with_ping_interval(mut self, interval: Duration) -> Self {
        self.ping_interval = interval;
        self
    }

    pub fn with_max_message_size(mut self, bytes: usize) -> Self {
        self.max_message_size = bytes;
        self
    }

    /// `0` for `per_connection` is accepted: it is the scenario 6
    /// "capacity black-hole" configuration, not a misconfiguration.
    pub fn with_max_concurrent_calls(mut self, per_connection: usize, global: usize) -> Self {
        self.max_calls_per_connection = per_connection;
        self.max_calls_global = global;
        self
    }

    /// `Duration::ZERO` means "no server-side cap" (the client's own
    /// timeout wins), matching the wire default.
    pub fn with_max_call_timeout(mut self, timeout: Duration) -> Self {
        self.max_call_timeout = (!timeout.is_zero()).then_some(timeout);
        self
    }

    pub fn max_message_size(&self) -> usize {
        self.max_message_size
    }

    fn validate(&self) -> Result<(), GatewayError> {
        if self.ping_interval.is_zero() {
            return Err(GatewayError::Configuration(
                "ping interval must be positive".into(),
            ));
        }
        if self.max_message_size == 0 {
            return Err(GatewayError::Configuration(
                "max message size must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// The per-connection driver. One `GatewayHandler` is constructed per
/// negotiated sub-protocol and shared across every connection that
/// negotiates it, the way `native.Handler` is constructed once per encoding
/// and reused by `websock.httpHandler`.
pub struct GatewayHandler<B: BusClient> {
    bus: Arc<B>,
    encoding: Encoding,
    options: Options,
    global_capacity: Arc<Semaphore>,
}

impl<B: BusClient> GatewayHandler<B> {
    pub fn new(bus: Arc<B>, encoding: Encoding, options: Options) -> Result<Self, GatewayError> {
        options.validate()?;
        let global_capacity = Arc::new(Semaphore::new(options.max_calls_global));
        Ok(GatewayHandler {
            bus,
            encoding,
            options,
            global_capacity,
        })
    }

    /// The sub-protocol label this handler negotiates, e.g. `rinq-1.0+cbor`.
    pub fn protocol(&self) -> String {
        format!("{PROTOCOL_PREFIX}{}", self.encoding.name())
    }

    pub fn max_message_size(&self) -> usize {
        self.options.max_message_size()
    }

    /// Whether the downstream bus currently reports itself healthy. An HTTP
    /// front end can use this to reject upgrade requests with `503` instead
    /// of accepting a connection the bus can't serve.
    pub fn bus_healthy(&self) -> bool {
        self.bus.is_healthy()
    }

    /// Whether a request's `Origin` header is allowed to open a connection
    /// against `request_host` (the request's own `Host` header).
    pub fn origin_allowed(&self, origin_header: Option<&str>, request_host: &str) -> bool {
        let origin_host = origin_authority(origin_header);
        OriginMatcher::new(&self.options.origin_pattern).matches(&origin_host, request_host)
    }

    /// Session attributes derived from the HTTP request, installed under
    /// [`ATTR_NAMESPACE`] by the caller: the first `X-Forwarded-For` entry if
    /// present, else `remote_addr`'s host, plus the listener's own
    /// `local_addr` and the `Host` header. Mirrors `native.sessionAttributes`.
    pub fn request_attrs(
        forwarded_for: Option<&str>,
        remote_addr: &str,
        local_addr: &str,
        host: &str,
    ) -> Vec<(String, String)> {
        let remote = forwarded_for
            .and_then(|header| header.split(',').next())
            .map(str::trim)
            .filter(|ip| !ip.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| remote_addr.to_string());

        vec![
            ("remote-addr".to_string(), remote),
            ("local-addr".to_string(), local_addr.to_string()),
            ("host".to_string(), host.to_string()),
        ]
    }

    /// Drive an upgraded socket until the connection ends: wires the I/O
    /// loop to a fresh [`Multiplexer`], dispatches every decoded message,
    /// then tears down (cancel, destroy remaining sessions, join I/O tasks).
    pub async fn handle<S: WsSocket>(&self, socket: S, attrs: Vec<(String, String)>) {
        let codec = self.encoding.codec();
        let mut io = ConnectionIo::spawn(socket, codec, self.options.ping_interval);
        let cancel = io.cancellation();

        let capacity = Arc::new(CapacityGovernor::new(
            self.options.max_calls_per_connection,
            self.global_capacity.clone(),
        ));

        let mux = Arc::new(Multiplexer::new(
            self.bus.clone(),
            io.outgoing.clone(),
            cancel.clone(),
            capacity,
            self.options.max_call_timeout,
            attrs,
        ));

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                msg = io.incoming.recv() => {
                    let Some(msg) = msg else { break };
                    if let Err(err) = mux.dispatch(msg).await {
                        error!(error = %err, "terminating connection after a fatal dispatch error");
                        mux.fail(err);
                        break;
                    }
                }
            }
        }

        mux.teardown().await;

        if let Some(err) = io.shutdown().await {
            warn!(error = %err, "connection I/O closed with an error");
        }
        if let Some(err) = mux.take_fatal() {
            warn!(error = %err, "connection closed after a fatal call-task error");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_pattern_matches_the_request_host() {
        let matcher = OriginMatcher::new("");
        assert!(matcher.matches("example.com", "example.com"));
        assert!(!matcher.matches("evil.com", "example.com"));
    }

    #[test]
    fn wildcard_pattern_matches_anything() {
        let matcher = OriginMatcher::new("*");
        assert!(matcher.matches("anything.test", "example.com"));
    }

    #[test]
    fn suffix_pattern_matches_subdomains() {
        let matcher = OriginMatcher::new("*.example.com");
        assert!(matcher.matches("api.example.com", "irrelevant"));
        assert!(!matcher.matches("example.com.evil.test", "irrelevant"));
    }

    #[test]
    fn prefix_pattern_matches_leading_segment() {
        let matcher = OriginMatcher::new("api.*");
        assert!(matcher.matches("api.example.com", "irrelevant"));
        assert!(!matcher.matches("example.com", "irrelevant"));
    }

    #[test]
    fn exact_pattern_is_case_insensitive() {
        let matcher = OriginMatcher::new("Example.COM");
        assert!(matcher.matches("example.com", "irrelevant"));
    }

    #[test]
    fn origin_authority_parses_host_and_port() {
        assert_eq!(
            origin_authority(Some("https://Example.com:8443/path")),
            "example.com:8443"
        );
        assert_eq!(origin_authority(None), "");
        assert_eq!(origin_authority(Some("not a uri")), "");
    }

    #[test]
    fn request_attrs_prefers_forwarded_for_first_entry() {
        let attrs = GatewayHandler::<rinq_bus::FakeBus>::request_attrs(
            Some("203.0.113.9, 10.0.0.1"),
            "127.0.0.1:9000",
            "127.0.0.1:8080",
            "example.com",
        );
        assert_eq!(
            attrs,
            vec![
                ("remote-addr".to_string(), "203.0.113.9".to_string()),
                ("local-addr".to_string(), "127.0.0.1:8080".to_string()),
                ("host".to_string(), "example.com".to_string()),
            ]
        );
    }

    #[test]
    fn request_attrs_falls_back_to_remote_addr() {
        let attrs = GatewayHandler::<rinq_bus::FakeBus>::request_attrs(
            None,
            "127.0.0.1:9000",
            "127.0.0.1:8080",
            "example.com",
        );
        assert_eq!(attrs[0], ("remote-addr".to_string(), "127.0.0.1:9000".to_string()));
        assert_eq!(attrs[1], ("local-addr".to_string(), "127.0.0.1:8080".to_string()));
    }

    #[test]
    fn options_reject_a_zero_ping_interval() {
        let opts = Options::default().with_ping_interval(Duration::ZERO);
        assert!(opts.validate().is_err());
    }

    #[test]
    fn options_accept_zero_per_connection_capacity() {
        let opts = Options::default().with_max_concurrent_calls(0, 10);
        assert!(opts.validate().is_ok());
    }
}
