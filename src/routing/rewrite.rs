//! Path rewriting.
//!
//! A rewrite rule is an input pattern plus an output template. Every region of
//! the path matched by the pattern is replaced by the template, with `$N` /
//! `${N}` / `$name` expanded from the capture groups. Groups that do not exist
//! expand to the empty string.

use regex::Regex;

use super::{compile_pattern, RoutingError};

/// A compiled path transformation.
#[derive(Debug, Clone)]
pub struct RewriteRule {
    input: Regex,
    output: String,
}

impl RewriteRule {
    /// Compile a rewrite rule from its input pattern and output template.
    pub fn new(input: &str, output: impl Into<String>) -> Result<Self, RoutingError> {
        Ok(Self {
            input: compile_pattern(input)?,
            output: output.into(),
        })
    }

    /// Apply the rule to a path.
    ///
    /// Paths the input pattern does not match come back unchanged.
    pub fn rewrite(&self, path: &str) -> String {
        self.input.replace_all(path, self.output.as_str()).into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_prefix() {
        let rule = RewriteRule::new(r"^/abc(/?.*)$", "$1").unwrap();
        assert_eq!(rule.rewrite("/abc/test"), "/test");
        assert_eq!(rule.rewrite("/abc"), "");
    }

    #[test]
    fn test_literal_prefix_with_capture() {
        let rule = RewriteRule::new(r"^/xyz(/?.*)$", "/etc$1").unwrap();
        assert_eq!(rule.rewrite("/xyz/test"), "/etc/test");
        assert_eq!(rule.rewrite("/xyz"), "/etc");
    }

    #[test]
    fn test_no_match_passes_through() {
        let rule = RewriteRule::new(r"^/xyz(/.*)$", "/etc$1").unwrap();
        assert_eq!(rule.rewrite("/other/path"), "/other/path");
    }

    #[test]
    fn test_undefined_group_expands_empty() {
        let rule = RewriteRule::new(r"^/a(/.*)$", "/b$2").unwrap();
        assert_eq!(rule.rewrite("/a/c"), "/b");
    }

    #[test]
    fn test_replaces_every_match_region() {
        let rule = RewriteRule::new("old", "new").unwrap();
        assert_eq!(rule.rewrite("/old/x/old"), "/new/x/new");
    }

    #[test]
    fn test_braced_group_reference() {
        let rule = RewriteRule::new(r"^/v(\d+)/(.*)$", "/api/${2}_v${1}").unwrap();
        assert_eq!(rule.rewrite("/v2/users"), "/api/users_v2");
    }

    #[test]
    fn test_invalid_pattern() {
        let err = RewriteRule::new("^/(unclosed", "$1").unwrap_err();
        match err {
            RoutingError::InvalidPattern { pattern, .. } => assert_eq!(pattern, "^/(unclosed"),
        }
    }
}
