//! HTTP server setup and request dispatch.
//!
//! # Responsibilities
//! - Create Axum Router with the catch-all dispatcher
//! - Wire up middleware (request ID, tracing, timeout)
//! - Bind server to listener with graceful shutdown
//! - Dispatch each request: no route, HTTP forward, or WebSocket relay
//! - Record request metrics

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::Request,
    response::{IntoResponse, Response},
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::ProxyConfig;
use crate::http::forward::{self, HttpClient};
use crate::http::request::{decoded_path, request_id, UuidRequestId};
use crate::http::response::ProxyError;
use crate::http::websocket;
use crate::observability::metrics;
use crate::relay::RelayTracker;
use crate::routing::matcher::is_websocket_scheme;
use crate::routing::{Router as ProxyRouter, RoutingError};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub router: Arc<ProxyRouter>,
    pub client: HttpClient,
    pub relays: RelayTracker,
}

/// HTTP server for the reverse proxy.
pub struct HttpServer {
    router: Router,
    routes: usize,
    relays: RelayTracker,
}

impl HttpServer {
    /// Create a new HTTP server, compiling the configured routes.
    ///
    /// Fails if any route pattern is malformed; no partial rule set is served.
    pub fn new(config: ProxyConfig) -> Result<Self, RoutingError> {
        let proxy_router = Arc::new(ProxyRouter::from_config(&config.routes)?);
        Ok(Self::with_router(config, proxy_router))
    }

    /// Create a server around an already compiled router.
    pub fn with_router(config: ProxyConfig, proxy_router: Arc<ProxyRouter>) -> Self {
        let relays = RelayTracker::new();
        let routes = proxy_router.len();
        let state = AppState {
            router: proxy_router,
            client: forward::build_client(),
            relays: relays.clone(),
        };

        let router = Self::build_router(&config, state);
        Self {
            router,
            routes,
            relays,
        }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &ProxyConfig, state: AppState) -> Router {
        Router::new()
            .fallback(dispatch)
            .with_state(state)
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                tracing::info_span!(
                    "request",
                    method = %request.method(),
                    path = %request.uri().path(),
                    request_id = %request_id(request),
                )
            }))
            .layer(SetRequestIdLayer::x_request_id(UuidRequestId))
    }

    /// Run the server until the shutdown signal fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            routes = self.routes,
            "HTTP server starting"
        );

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tracing::info!(live_relays = self.relays.active_count(), "HTTP server stopped");
        Ok(())
    }

    /// Tracker of live WebSocket relays started by this server.
    pub fn relays(&self) -> RelayTracker {
        self.relays.clone()
    }
}

/// Catch-all handler.
/// Looks up the first matching route and forwards or relays the request.
async fn dispatch(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    request: Request<Body>,
) -> Response {
    let start_time = Instant::now();
    let method = request.method().to_string();
    let path = decoded_path(request.uri());

    let Some(rule) = state.router.dispatch(&path) else {
        tracing::warn!(path = %path, peer = %peer, "No route matched");
        metrics::record_request(&method, 404, "none", start_time);
        return ProxyError::NoRouteMatched { path }.into_response();
    };

    let target = match rule.target_url(&path, request.uri().query()) {
        Ok(target) => target,
        Err(e) => {
            tracing::error!(path = %path, route = %rule.pattern(), error = %e, "Invalid rewritten URL");
            metrics::record_request(&method, 500, rule.pattern(), start_time);
            return ProxyError::InvalidDestination {
                location: rule.rewrite_location(&path),
                source: e,
            }
            .into_response();
        }
    };

    tracing::debug!(
        path = %path,
        route = %rule.pattern(),
        target = %target,
        peer = %peer,
        "Route matched"
    );

    let response = if is_websocket_scheme(target.scheme()) {
        websocket::serve(request, target, rule.relay_options(), state.relays.clone()).await
    } else {
        match forward::forward(&state.client, request, &target).await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(path = %path, target = %target, error = %e, "Forwarding failed");
                e.into_response()
            }
        }
    };

    metrics::record_request(&method, response.status().as_u16(), rule.pattern(), start_time);
    response
}
