//! Metrics collection and exposition.
//!
//! # Metrics
//! - `proxy_requests_total` (counter): requests by method, status, route
//! - `proxy_request_duration_seconds` (histogram): latency distribution
//! - `proxy_active_relays` (gauge): live WebSocket relays
//! - `proxy_relay_frames_total` (counter): relayed frames by direction
//!
//! Recording is always safe: without an installed exporter the macros
//! hit the no-op recorder.

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

pub const REQUESTS_TOTAL: &str = "proxy_requests_total";
pub const REQUEST_DURATION: &str = "proxy_request_duration_seconds";
pub const ACTIVE_RELAYS: &str = "proxy_active_relays";
pub const RELAY_FRAMES_TOTAL: &str = "proxy_relay_frames_total";

/// Install the Prometheus recorder and serve `/metrics` on `addr`.
///
/// Must be called from inside a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

/// Record one proxied request.
pub fn record_request(method: &str, status: u16, route: &str, start: Instant) {
    let method = method.to_string();
    let status = status.to_string();
    let route = route.to_string();
    ::metrics::counter!(
        REQUESTS_TOTAL,
        "method" => method.clone(),
        "status" => status.clone(),
        "route" => route.clone()
    )
    .increment(1);
    ::metrics::histogram!(
        REQUEST_DURATION,
        "method" => method,
        "status" => status,
        "route" => route
    )
    .record(start.elapsed().as_secs_f64());
}

pub fn relay_opened() {
    ::metrics::gauge!(ACTIVE_RELAYS).increment(1.0);
}

pub fn relay_closed() {
    ::metrics::gauge!(ACTIVE_RELAYS).decrement(1.0);
}

/// Count a relayed data frame. `direction` is `inbound` (to the backend)
/// or `outbound` (to the client).
pub fn record_frame(direction: &'static str) {
    ::metrics::counter!(RELAY_FRAMES_TOTAL, "direction" => direction).increment(1);
}
