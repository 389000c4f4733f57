//! Route matching logic.
//!
//! # Responsibilities
//! - Match the request method against a rule's method pattern
//! - Match the request path against a rule's path prefix
//! - Strip the matched prefix into an absolute remainder
//!
//! # Design Decisions
//! - Method matching is case-insensitive (`get` and `GET` are the same rule)
//! - Path matching is case-sensitive, plain prefix comparison
//! - No regex to guarantee O(n) matching

use axum::http::Method;

/// Trait for matching a request's method and path against a condition.
pub trait Matcher: Send + Sync + std::fmt::Debug {
    /// Returns true if the request matches this condition.
    fn matches(&self, method: &Method, path: &str) -> bool;
}

/// Error returned when a method pattern is not a valid HTTP method token.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid method pattern {0:?}")]
pub struct InvalidMethodPattern(pub String);

/// Matches the request method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MethodMatcher {
    /// `*` or `ANY`: every method.
    Any,
    /// A single method, normalized to upper case.
    Exact(Method),
}

impl MethodMatcher {
    /// Parse a configured method pattern.
    pub fn parse(pattern: &str) -> Result<Self, InvalidMethodPattern> {
        let trimmed = pattern.trim();
        if trimmed == "*" || trimmed.eq_ignore_ascii_case("any") {
            return Ok(Self::Any);
        }

        let upper = trimmed.to_ascii_uppercase();
        if upper.is_empty() {
            return Err(InvalidMethodPattern(pattern.to_string()));
        }
        Method::from_bytes(upper.as_bytes())
            .map(Self::Exact)
            .map_err(|_| InvalidMethodPattern(pattern.to_string()))
    }

    /// True if this pattern accepts every request `other` accepts.
    pub fn covers(&self, other: &MethodMatcher) -> bool {
        match (self, other) {
            (Self::Any, _) => true,
            (Self::Exact(a), Self::Exact(b)) => a == b,
            (Self::Exact(_), Self::Any) => false,
        }
    }
}

impl Matcher for MethodMatcher {
    fn matches(&self, method: &Method, _path: &str) -> bool {
        match self {
            Self::Any => true,
            // Method tokens are case-sensitive in `http`, so compare folded.
            Self::Exact(expected) => expected.as_str().eq_ignore_ascii_case(method.as_str()),
        }
    }
}

impl std::fmt::Display for MethodMatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Any => f.write_str("*"),
            Self::Exact(method) => f.write_str(method.as_str()),
        }
    }
}

/// Matches the request path prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPrefixMatcher {
    prefix: String,
}

impl PathPrefixMatcher {
    /// Create a new path prefix matcher.
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Strip the prefix from `path`, returning an absolute remainder.
    ///
    /// An empty remainder becomes `/`; a remainder that does not start with
    /// `/` (prefix `/sales` against `/salesforce`) gets one prepended.
    /// Returns `None` when the path does not carry the prefix.
    pub fn strip(&self, path: &str) -> Option<String> {
        let rest = path.strip_prefix(self.prefix.as_str())?;
        let remainder = if rest.is_empty() {
            "/".to_string()
        } else if rest.starts_with('/') {
            rest.to_string()
        } else {
            format!("/{}", rest)
        };
        Some(remainder)
    }
}

impl Matcher for PathPrefixMatcher {
    fn matches(&self, _method: &Method, path: &str) -> bool {
        path.starts_with(&self.prefix)
    }
}
