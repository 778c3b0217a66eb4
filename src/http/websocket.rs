//! WebSocket proxy handling.
//!
//! # Responsibilities
//! - Validate the client's upgrade request
//! - Establish the WebSocket connection to the backend
//! - Complete the client handshake and hand both sockets to a relay pump
//!
//! # Data Flow
//! ```text
//! Client ←──── WebSocket frames ────→ Proxy ←──── WebSocket frames ────→ Backend
//! ```
//!
//! # Design Decisions
//! - The backend is dialed before the client gets its 101, so a failed dial
//!   can still be reported as an HTTP response
//! - A failed dial is terminal: no pump is ever started without a backend
//! - The handler returns once the pump is spawned; the relay outlives it

use axum::body::Body;
use axum::extract::ws::{Message as AxumMessage, WebSocketUpgrade};
use axum::extract::FromRequestParts;
use axum::http::Request;
use axum::response::{IntoResponse, Response};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::http::Response as HandshakeResponse;
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tokio_tungstenite::tungstenite::{Error as WsError, Message as TungsteniteMessage};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use url::Url;

use crate::http::forward::strip_hop_by_hop;
use crate::http::response::{error_chain, ProxyError};
use crate::relay::{FrameSocket, Pump, RelayOptions, RelayTracker};

type BackendSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Relay a WebSocket upgrade request to `target`.
pub async fn serve(
    request: Request<Body>,
    target: Url,
    options: RelayOptions,
    relays: RelayTracker,
) -> Response {
    let (mut parts, _body) = request.into_parts();

    let upgrade = match WebSocketUpgrade::from_request_parts(&mut parts, &()).await {
        Ok(upgrade) => upgrade,
        Err(rejection) => {
            tracing::warn!(
                target = %target,
                reason = %rejection.body_text(),
                "Client websocket upgrade rejected"
            );
            return ProxyError::UpgradeFailed.into_response();
        }
    };

    let internal = match dial(&target, &options).await {
        Ok(socket) => socket,
        Err(response) => return response,
    };

    tracing::debug!(target = %target, "Backend websocket connected");

    upgrade
        .max_message_size(options.max_message_size)
        .max_frame_size(options.max_message_size)
        .on_failed_upgrade(|e| tracing::warn!(error = %e, "Client websocket upgrade failed"))
        .on_upgrade(move |external| async move {
            let pump = Pump::new(
                FrameSocket::<_, AxumMessage>::new(external),
                FrameSocket::<_, TungsteniteMessage>::new(internal),
                options,
            );
            let tasks = pump.start(relays.track());
            tracing::info!(relay_id = %tasks.relay_id, target = %target, "Relay started");
        })
}

/// Connect to the backend as a WebSocket client.
///
/// On failure the returned response is what the caller should see.
async fn dial(target: &Url, options: &RelayOptions) -> Result<BackendSocket, Response> {
    let mut config = WebSocketConfig::default();
    config.max_message_size = Some(options.max_message_size);
    config.max_frame_size = Some(options.max_message_size);

    match tokio_tungstenite::connect_async_with_config(target.as_str(), Some(config), false).await {
        Ok((socket, _)) => Ok(socket),
        Err(WsError::Http(response)) => {
            tracing::warn!(
                target = %target,
                status = %response.status(),
                "Backend rejected websocket handshake"
            );
            Err(rejection_response(&response))
        }
        Err(e) => {
            tracing::warn!(target = %target, error = %error_chain(&e), "Backend websocket dial failed");
            Err(ProxyError::InternalUpgradeFailed.into_response())
        }
    }
}

/// Pass a backend's handshake rejection through to the client.
fn rejection_response(rejection: &HandshakeResponse<Option<Vec<u8>>>) -> Response {
    let mut response = Response::builder().status(rejection.status());
    if let Some(headers) = response.headers_mut() {
        for (name, value) in rejection.headers() {
            headers.append(name.clone(), value.clone());
        }
        strip_hop_by_hop(headers);
        // The captured body may be partial; let the server recompute the length.
        headers.remove(axum::http::header::CONTENT_LENGTH);
    }

    let body = rejection.body().clone().unwrap_or_default();
    response
        .body(Body::from(body))
        .unwrap_or_else(|_| ProxyError::InternalUpgradeFailed.into_response())
}
