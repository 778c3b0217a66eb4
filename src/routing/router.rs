//! Route lookup and dispatch.
//!
//! # Responsibilities
//! - Store compiled routes in declaration order
//! - Look up the first rule matching a request path
//! - Return matched rule or explicit no-match
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - O(n) scan; rule sets are expected to be small
//! - Overlapping patterns are allowed, the earlier rule always wins

use super::{RouteRule, RoutingError};
use crate::config::RouteConfig;

/// Ordered, first-match-wins rule table.
#[derive(Debug, Clone, Default)]
pub struct Router {
    rules: Vec<RouteRule>,
}

impl Router {
    /// Build a router from already compiled rules, keeping their order.
    pub fn new(rules: impl IntoIterator<Item = RouteRule>) -> Self {
        Self {
            rules: rules.into_iter().collect(),
        }
    }

    /// Compile every route; any malformed pattern fails the whole build.
    pub fn from_config(routes: &[RouteConfig]) -> Result<Self, RoutingError> {
        let rules = routes
            .iter()
            .map(RouteRule::from_config)
            .collect::<Result<Vec<_>, _>>()?;

        tracing::debug!(routes = rules.len(), "Router compiled");
        Ok(Self { rules })
    }

    /// Find the first rule matching the path.
    pub fn dispatch(&self, path: &str) -> Option<&RouteRule> {
        self.rules.iter().find(|rule| rule.matches(path))
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
