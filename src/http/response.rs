//! Proxy error responses.
//!
//! # Responsibilities
//! - Define the per-request failure taxonomy
//! - Map each failure to its status code and plain-text body
//!
//! # Design Decisions
//! - Bodies carry the error message only, never a backtrace
//! - Connection refused is the only backend failure reported as 502

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Per-request proxy failures. Contained to the request that raised them.
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("no route found for {path}")]
    NoRouteMatched { path: String },

    #[error("connection refused for {path}")]
    ConnectionRefused { path: String },

    /// Any other backend or forwarding failure; the message is returned verbatim.
    #[error("{0}")]
    Backend(String),

    /// The rewritten location is not a valid URL.
    #[error("invalid destination {location}: {source}")]
    InvalidDestination {
        location: String,
        #[source]
        source: url::ParseError,
    },

    #[error("could not upgrade to websocket")]
    UpgradeFailed,

    #[error("could not upgrade internal connection")]
    InternalUpgradeFailed,
}

impl ProxyError {
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::NoRouteMatched { .. } => StatusCode::NOT_FOUND,
            ProxyError::ConnectionRefused { .. } => StatusCode::BAD_GATEWAY,
            ProxyError::Backend(_) | ProxyError::InvalidDestination { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ProxyError::UpgradeFailed => StatusCode::BAD_REQUEST,
            ProxyError::InternalUpgradeFailed => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        (self.status(), self.to_string()).into_response()
    }
}

/// Render an error and its source chain as one line.
pub fn error_chain(error: &(dyn std::error::Error + 'static)) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !message.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = cause.source();
    }
    message
}
