//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Compile every route pattern so malformed regexes fail at load time
//! - Validate destination schemes and keep-alive ranges
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use url::Url;

use crate::config::schema::{ProxyConfig, RelayConfig};
use crate::routing::{RouteRule, RoutingError};

/// A single semantic problem found in the configuration.
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("no routes configured")]
    NoRoutes,

    #[error("route {index}: {source}")]
    Pattern {
        index: usize,
        #[source]
        source: RoutingError,
    },

    #[error("route {index}: invalid destination `{destination}`: {reason}")]
    Destination {
        index: usize,
        destination: String,
        reason: String,
    },

    #[error("route {index}: {reason}")]
    Relay { index: usize, reason: &'static str },

    #[error("timeouts.request_secs must be greater than zero")]
    RequestTimeout,
}

/// Check a parsed configuration, collecting every problem found.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.routes.is_empty() {
        errors.push(ValidationError::NoRoutes);
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::RequestTimeout);
    }

    for (index, route) in config.routes.iter().enumerate() {
        if let Err(source) = RouteRule::from_config(route) {
            errors.push(ValidationError::Pattern { index, source });
        }

        if let Err(reason) = check_destination(&route.destination) {
            errors.push(ValidationError::Destination {
                index,
                destination: route.destination.clone(),
                reason,
            });
        }

        if let Some(relay) = &route.websocket {
            errors.extend(
                check_relay(relay)
                    .into_iter()
                    .map(|reason| ValidationError::Relay { index, reason }),
            );
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_destination(destination: &str) -> Result<(), String> {
    let url = Url::parse(destination).map_err(|e| e.to_string())?;
    match url.scheme() {
        "http" | "https" | "ws" | "wss" => Ok(()),
        other => Err(format!("unsupported scheme `{}`", other)),
    }
}

fn check_relay(relay: &RelayConfig) -> Vec<&'static str> {
    let mut problems = Vec::new();
    if relay.write_wait_ms == 0 {
        problems.push("websocket.write_wait_ms must be greater than zero");
    }
    if relay.pong_wait_ms == 0 {
        problems.push("websocket.pong_wait_ms must be greater than zero");
    }
    if relay.ping_period_ms == 0 {
        problems.push("websocket.ping_period_ms must be greater than zero");
    }
    if relay.ping_period_ms >= relay.pong_wait_ms {
        problems.push("websocket.ping_period_ms must be shorter than websocket.pong_wait_ms");
    }
    if relay.max_message_size == 0 {
        problems.push("websocket.max_message_size must be greater than zero");
    }
    problems
}
