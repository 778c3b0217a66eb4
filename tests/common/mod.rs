//! Shared fixtures for the integration tests.
//!
//! Every fixture binds `127.0.0.1:0` so tests can run in parallel.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Bytes,
    extract::ws::{Message, WebSocket, WebSocketUpgrade},
    http::{HeaderMap, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use rewrite_proxy::config::{ProxyConfig, RelayConfig, RouteConfig};
use rewrite_proxy::{HttpServer, RelayTracker, Shutdown};
use serde_json::{json, Value};
use tokio::net::TcpListener;

/// A running proxy instance.
pub struct TestProxy {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    pub relays: RelayTracker,
}

impl TestProxy {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn ws_url(&self, path: &str) -> String {
        format!("ws://{}{}", self.addr, path)
    }
}

impl Drop for TestProxy {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

/// Start the proxy with `routes` on an ephemeral port.
pub async fn start_proxy(routes: Vec<RouteConfig>) -> TestProxy {
    let mut config = ProxyConfig::default();
    config.routes = routes;
    start_proxy_with(config).await
}

/// Start the proxy with a full config; the bind address is replaced.
pub async fn start_proxy_with(mut config: ProxyConfig) -> TestProxy {
    config.listener.bind_address = "127.0.0.1:0".to_string();

    let listener = TcpListener::bind(&config.listener.bind_address).await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let server = HttpServer::new(config).expect("routes compile");
    let relays = server.relays();
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, server_shutdown).await;
    });

    TestProxy {
        addr,
        shutdown,
        relays,
    }
}

/// Relay settings with short keep-alive intervals.
pub fn fast_relay(pong_wait_ms: u64, ping_period_ms: u64, max_message_size: usize) -> RelayConfig {
    RelayConfig {
        write_wait_ms: 1_000,
        pong_wait_ms,
        ping_period_ms,
        max_message_size,
    }
}

/// An address nothing listens on.
pub async fn closed_port() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}

async fn serve(app: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    addr
}

/// HTTP backend that describes the request it received as JSON.
///
/// `/status/204` answers with an empty 204 and an `X-Header: foo` header;
/// `/teapot` answers 418 with a plain-text body.
pub async fn start_echo_backend(label: &'static str) -> SocketAddr {
    let app = Router::new()
        .route(
            "/status/204",
            get(|| async { (StatusCode::NO_CONTENT, [("x-header", "foo")]) }),
        )
        .route(
            "/teapot",
            get(|| async { (StatusCode::IM_A_TEAPOT, [("x-teapot", "short")], "short and stout") }),
        )
        .fallback(move |method: Method, uri: Uri, headers: HeaderMap, body: Bytes| async move {
            let headers: BTreeMap<String, String> = headers
                .iter()
                .map(|(name, value)| {
                    (name.to_string(), value.to_str().unwrap_or_default().to_string())
                })
                .collect();
            Json(json!({
                "label": label,
                "method": method.as_str(),
                "path": uri.path(),
                "query": uri.query(),
                "headers": headers,
                "body": String::from_utf8_lossy(&body),
            }))
        });
    serve(app).await
}

/// Decode a response produced by [`start_echo_backend`].
pub async fn echo_of(response: reqwest::Response) -> Value {
    response.json::<Value>().await.unwrap()
}

/// WebSocket backend that echoes data frames.
///
/// A text frame reading `whoami` is answered with the path and query the
/// backend saw during the handshake.
pub async fn start_ws_echo_backend() -> SocketAddr {
    let app = Router::new().fallback(|uri: Uri, upgrade: WebSocketUpgrade| async move {
        upgrade.on_upgrade(move |socket| echo(socket, uri))
    });
    serve(app).await
}

async fn echo(mut socket: WebSocket, uri: Uri) {
    while let Some(Ok(message)) = socket.recv().await {
        let reply = match message {
            Message::Text(text) if text.as_str() == "whoami" => {
                Message::Text(uri.to_string().into())
            }
            Message::Text(_) | Message::Binary(_) => message,
            Message::Close(_) => break,
            Message::Ping(_) | Message::Pong(_) => continue,
        };
        if socket.send(reply).await.is_err() {
            break;
        }
    }
}

/// WebSocket backend that accepts the upgrade and then never reads,
/// so it never answers a ping.
pub async fn start_silent_ws_backend() -> SocketAddr {
    let app = Router::new().fallback(|upgrade: WebSocketUpgrade| async move {
        upgrade.on_upgrade(|socket| async move {
            tokio::time::sleep(Duration::from_secs(30)).await;
            drop(socket);
        })
    });
    serve(app).await
}

/// Backend that refuses every WebSocket handshake with 403.
pub async fn start_rejecting_backend() -> SocketAddr {
    let app = Router::new().fallback(|| async {
        let response: Response =
            (StatusCode::FORBIDDEN, [("x-reason", "denied")], "forbidden by backend").into_response();
        response
    });
    serve(app).await
}

/// Observed lifecycle of the slow backend's handler.
#[derive(Clone, Default)]
pub struct HandlerWatch {
    dropped: Arc<AtomicBool>,
    finished: Arc<AtomicBool>,
}

impl HandlerWatch {
    pub fn dropped(&self) -> bool {
        self.dropped.load(Ordering::SeqCst)
    }

    pub fn finished(&self) -> bool {
        self.finished.load(Ordering::SeqCst)
    }

    /// Poll until the handler was dropped or `timeout` lapses.
    pub async fn wait_dropped(&self, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        while !self.dropped() {
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        true
    }
}

struct DropFlag(Arc<AtomicBool>);

impl Drop for DropFlag {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

/// HTTP backend whose handler sleeps for `delay` before answering.
///
/// The returned watch records whether the handler ran to completion or
/// was dropped mid-flight.
pub async fn start_slow_backend(delay: Duration) -> (SocketAddr, HandlerWatch) {
    let watch = HandlerWatch::default();
    let handler_watch = watch.clone();
    let app = Router::new().fallback(move || {
        let watch = handler_watch.clone();
        async move {
            let _flag = DropFlag(watch.dropped.clone());
            tokio::time::sleep(delay).await;
            watch.finished.store(true, Ordering::SeqCst);
            "slow answer"
        }
    });
    (serve(app).await, watch)
}
