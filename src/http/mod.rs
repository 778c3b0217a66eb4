//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, tracing, timeout)
//!     → dispatch: routing::Router lookup by path
//!         → no match: 404
//!         → http/https destination: forward.rs (clone request, relay response)
//!         → ws/wss destination: websocket.rs (upgrade, dial, start relay pump)
//!     → response.rs (error taxonomy → status + plain-text body)
//! ```

pub mod forward;
pub mod request;
pub mod response;
pub mod server;
pub mod websocket;

pub use request::{UuidRequestId, X_REQUEST_ID};
pub use response::ProxyError;
pub use server::{AppState, HttpServer};
