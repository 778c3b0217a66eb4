//! Route rule matching.
//!
//! # Responsibilities
//! - Test a request path against the rule's match pattern
//! - Rewrite the path and prefix it with the destination base
//! - Carry the per-route WebSocket relay options
//!
//! # Design Decisions
//! - The match pattern and the rewrite pattern are independent: a path the
//!   rewrite pattern does not cover is forwarded unrewritten
//! - The destination base is concatenated verbatim with the rewritten path

use regex::Regex;
use url::Url;

use super::{compile_pattern, RewriteRule, RoutingError};
use crate::config::RouteConfig;
use crate::relay::RelayOptions;

/// A compiled routing rule: which paths to take, how to rewrite them, and
/// where to send them.
#[derive(Debug, Clone)]
pub struct RouteRule {
    pattern: Regex,
    rewrite: RewriteRule,
    destination: String,
    relay: RelayOptions,
}

impl RouteRule {
    /// Compile a rule from its match pattern, rewrite pair and destination base.
    pub fn new(
        pattern: &str,
        rewrite_from: &str,
        rewrite_to: &str,
        destination: impl Into<String>,
    ) -> Result<Self, RoutingError> {
        Ok(Self {
            pattern: compile_pattern(pattern)?,
            rewrite: RewriteRule::new(rewrite_from, rewrite_to)?,
            destination: destination.into(),
            relay: RelayOptions::default(),
        })
    }

    /// Compile a rule from its on-disk representation.
    pub fn from_config(config: &RouteConfig) -> Result<Self, RoutingError> {
        let rule = Self::new(
            &config.pattern,
            &config.rewrite.from,
            &config.rewrite.to,
            config.destination.clone(),
        )?;
        Ok(match &config.websocket {
            Some(relay) => rule.with_relay_options(relay.into()),
            None => rule,
        })
    }

    /// Override the keep-alive options used when this rule relays WebSockets.
    pub fn with_relay_options(mut self, relay: RelayOptions) -> Self {
        self.relay = relay;
        self
    }

    /// Returns true if the path matches this rule.
    pub fn matches(&self, path: &str) -> bool {
        self.pattern.is_match(path)
    }

    /// Rewrite the path without the destination base.
    pub fn rewrite_path(&self, path: &str) -> String {
        self.rewrite.rewrite(path)
    }

    /// Destination base followed by the rewritten path.
    pub fn rewrite_location(&self, path: &str) -> String {
        format!("{}{}", self.destination, self.rewrite_path(path))
    }

    /// Resolve the full forwarding URL for a request.
    ///
    /// The inbound query string replaces whatever query the destination carries.
    pub fn target_url(&self, path: &str, query: Option<&str>) -> Result<Url, url::ParseError> {
        let mut url = Url::parse(&self.rewrite_location(path))?;
        url.set_query(query);
        Ok(url)
    }

    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }

    pub fn destination(&self) -> &str {
        &self.destination
    }

    pub fn relay_options(&self) -> RelayOptions {
        self.relay
    }
}

/// Returns true for destination schemes served by the WebSocket relay.
pub fn is_websocket_scheme(scheme: &str) -> bool {
    scheme.eq_ignore_ascii_case("ws") || scheme.eq_ignore_ascii_case("wss")
}
