//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request path
//!     → router.rs (ordered scan over compiled rules)
//!     → matcher.rs (evaluate the rule's match pattern)
//!     → Return: matched RouteRule or no match
//!
//! Matched RouteRule:
//!     → rewrite.rs (capture/replace on the path)
//!     → destination base + rewritten path = forwarding target
//!
//! Route Compilation (at startup):
//!     RouteConfig[]
//!     → Compile match and rewrite patterns
//!     → Freeze as immutable Router (shared via Arc)
//! ```
//!
//! # Design Decisions
//! - Routes compiled at startup, immutable at runtime
//! - Declaration order is the only tie-break (first match wins)
//! - A malformed pattern aborts router construction entirely

pub mod matcher;
pub mod rewrite;
pub mod router;

pub use matcher::RouteRule;
pub use rewrite::RewriteRule;
pub use router::Router;

/// Errors raised while compiling routing rules.
#[derive(Debug, thiserror::Error)]
pub enum RoutingError {
    #[error("invalid pattern `{pattern}`")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// Compile a regex, tagging failures with the offending pattern.
pub(crate) fn compile_pattern(pattern: &str) -> Result<regex::Regex, RoutingError> {
    regex::Regex::new(pattern).map_err(|source| RoutingError::InvalidPattern {
        pattern: pattern.to_string(),
        source,
    })
}
