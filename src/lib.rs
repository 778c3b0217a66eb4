//! Regex-routed reverse proxy library.
//!
//! Requests are matched against an ordered list of route rules, their path is
//! rewritten with a regex template and they are either forwarded as plain HTTP
//! or relayed as WebSocket traffic to the chosen backend.

// Core subsystems
pub mod config;
pub mod http;
pub mod relay;
pub mod routing;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;

pub use config::schema::ProxyConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use relay::RelayTracker;
pub use routing::Router;
