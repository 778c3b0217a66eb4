//! HTTP request forwarding.
//!
//! # Responsibilities
//! - Clone the inbound request onto the rewritten destination URL
//! - Preserve method, body, headers, cookies and query string
//! - Relay the backend's status, headers and body back to the caller
//! - Classify backend failures (connection refused vs everything else)
//!
//! # Design Decisions
//! - Exactly one outbound attempt per inbound request, no retries
//! - The outbound call runs inside the inbound request's future; dropping
//!   that future (client gone, request timeout) aborts the backend call
//! - Hop-by-hop headers are not forwarded in either direction
//! - The backend body is read in full before the response is written

use axum::body::Body;
use axum::http::header::{self, HeaderMap, HeaderName, HeaderValue};
use axum::http::{Request, Uri};
use axum::response::Response;
use hyper_tls::HttpsConnector;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use url::Url;

use crate::http::request::decoded_path;
use crate::http::response::{error_chain, ProxyError};

/// Shared outbound client for http and https destinations.
pub type HttpClient = Client<HttpsConnector<HttpConnector>, Body>;

/// Headers that describe a single connection and are never forwarded.
const HOP_BY_HOP: [HeaderName; 5] = [
    header::CONNECTION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

/// Non-standard hop-by-hop headers without a typed constant.
const HOP_BY_HOP_EXTRA: [&str; 2] = ["keep-alive", "proxy-connection"];

pub fn build_client() -> HttpClient {
    Client::builder(TokioExecutor::new()).build(HttpsConnector::new())
}

/// Forward a request to `target` and relay the backend's response.
///
/// `target` already carries the rewritten path and the inbound query string.
pub async fn forward(
    client: &HttpClient,
    request: Request<Body>,
    target: &Url,
) -> Result<Response, ProxyError> {
    let path = decoded_path(request.uri());
    let outbound = redirect_request(request, target)?;

    let response = client.request(outbound).await.map_err(|e| {
        if is_connection_refused(&e) {
            ProxyError::ConnectionRefused { path: path.clone() }
        } else {
            ProxyError::Backend(error_chain(&e))
        }
    })?;

    let (mut parts, body) = response.into_parts();
    let body = axum::body::to_bytes(Body::new(body), usize::MAX)
        .await
        .map_err(|e| ProxyError::Backend(error_chain(&e)))?;

    strip_hop_by_hop(&mut parts.headers);

    tracing::debug!(
        path = %path,
        target = %target,
        status = %parts.status,
        bytes = body.len(),
        "Backend responded"
    );

    Ok(Response::from_parts(parts, Body::from(body)))
}

/// Copy a request onto a new URL.
///
/// Method, body and every header value are kept, except `Host` (regenerated
/// for the backend), hop-by-hop headers, and `Cookie` (re-emitted as one
/// normalized header).
pub fn redirect_request(request: Request<Body>, target: &Url) -> Result<Request<Body>, ProxyError> {
    let uri: Uri = target
        .as_str()
        .parse()
        .map_err(|e: axum::http::uri::InvalidUri| ProxyError::Backend(e.to_string()))?;

    let (parts, body) = request.into_parts();

    let mut outbound = Request::builder().method(parts.method).uri(uri);
    if let Some(headers) = outbound.headers_mut() {
        for (name, value) in parts.headers.iter() {
            if name == header::HOST || name == header::COOKIE || is_hop_by_hop(name) {
                continue;
            }
            headers.append(name.clone(), value.clone());
        }
        if let Some(cookies) = normalize_cookies(&parts.headers) {
            headers.insert(header::COOKIE, cookies);
        }
    }

    outbound
        .body(body)
        .map_err(|e| ProxyError::Backend(e.to_string()))
}

/// Merge every `Cookie` header into one `name=value; name=value` header.
///
/// Pairs without a name or without `=` are dropped.
pub fn normalize_cookies(headers: &HeaderMap) -> Option<HeaderValue> {
    let pairs: Vec<&str> = headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .map(str::trim)
        .filter(|pair| matches!(pair.split_once('='), Some((name, _)) if !name.trim().is_empty()))
        .collect();

    if pairs.is_empty() {
        return None;
    }
    HeaderValue::from_str(&pairs.join("; ")).ok()
}

pub(crate) fn is_hop_by_hop(name: &HeaderName) -> bool {
    HOP_BY_HOP.contains(name) || HOP_BY_HOP_EXTRA.contains(&name.as_str())
}

/// Remove hop-by-hop headers in place.
pub(crate) fn strip_hop_by_hop(headers: &mut HeaderMap) {
    for name in HOP_BY_HOP.iter() {
        headers.remove(name);
    }
    for name in HOP_BY_HOP_EXTRA {
        headers.remove(name);
    }
}

/// Returns true if connection refused appears anywhere in the error's source chain.
pub fn is_connection_refused(error: &(dyn std::error::Error + 'static)) -> bool {
    let mut current = Some(error);
    while let Some(e) = current {
        if let Some(io) = e.downcast_ref::<std::io::Error>() {
            if io.kind() == std::io::ErrorKind::ConnectionRefused {
                return true;
            }
        }
        if e.to_string().to_ascii_lowercase().contains("connection refused") {
            return true;
        }
        current = e.source();
    }
    false
}
