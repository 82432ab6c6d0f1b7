// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Ant-style path patterns and method-constrained request matchers.
//!
//! Supported syntax:
//!
//! - `/exact/path` matches that path only
//! - `/prefix/**` matches `/prefix` itself and anything below it
//! - `/**` matches every path
//!
//! Matching is segment-aware: `/manage/health/**` does not match
//! `/manage/healthz`.

use std::fmt;

use axum::http::Method;

use crate::config::ConfigError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathPattern {
    Exact(String),
    Prefix(String),
    Any,
}

impl PathPattern {
    pub fn parse(pattern: &str) -> Result<Self, ConfigError> {
        if !pattern.starts_with('/') {
            return Err(ConfigError::invalid(pattern, "path pattern must start with '/'"));
        }
        if pattern == "/**" {
            return Ok(PathPattern::Any);
        }
        let (base, prefix) = match pattern.strip_suffix("/**") {
            Some(base) => (base, true),
            None => (pattern, false),
        };
        if base.contains('*') {
            return Err(ConfigError::invalid(
                pattern,
                "wildcards are only supported as a trailing '/**'",
            ));
        }
        Ok(if prefix {
            PathPattern::Prefix(base.to_string())
        } else {
            PathPattern::Exact(base.to_string())
        })
    }

    pub fn matches(&self, path: &str) -> bool {
        match self {
            PathPattern::Exact(p) => path == p,
            PathPattern::Prefix(p) => path
                .strip_prefix(p.as_str())
                .is_some_and(|rest| rest.is_empty() || rest.starts_with('/')),
            PathPattern::Any => true,
        }
    }
}

impl fmt::Display for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathPattern::Exact(p) => f.write_str(p),
            PathPattern::Prefix(p) => write!(f, "{p}/**"),
            PathPattern::Any => f.write_str("/**"),
        }
    }
}

/// A path pattern, optionally restricted to one HTTP method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestMatcher {
    pub method: Option<Method>,
    pub pattern: PathPattern,
}

impl RequestMatcher {
    /// Any method on `pattern`.
    pub fn path(pattern: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            method: None,
            pattern: PathPattern::parse(pattern)?,
        })
    }

    /// Only `method` on `pattern`.
    pub fn method(method: Method, pattern: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            method: Some(method),
            pattern: PathPattern::parse(pattern)?,
        })
    }

    pub fn matches(&self, method: &Method, path: &str) -> bool {
        self.method.as_ref().is_none_or(|m| m == method) && self.pattern.matches(path)
    }

    /// True for the unconstrained `/**` matcher.
    pub fn is_catch_all(&self) -> bool {
        self.method.is_none() && self.pattern == PathPattern::Any
    }
}

impl fmt::Display for RequestMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.method {
            Some(method) => write!(f, "{method} {}", self.pattern),
            None => write!(f, "{}", self.pattern),
        }
    }
}

/// Whether `path` is safe to match against patterns.
///
/// Dot segments, empty segments and encoded separators could make a path
/// select one chain and resolve to a route owned by another, so such paths
/// are refused outright.
pub fn is_normalized(path: &str) -> bool {
    let Some(rest) = path.strip_prefix('/') else {
        return false;
    };
    if rest.is_empty() {
        return true;
    }
    let lower = rest.to_ascii_lowercase();
    if lower.contains("%2e") || lower.contains("%2f") || lower.contains("%5c") || rest.contains('\\') {
        return false;
    }
    // A single trailing slash is fine; anything else empty is not.
    let rest = rest.strip_suffix('/').unwrap_or(rest);
    rest.split('/')
        .all(|segment| !segment.is_empty() && segment != "." && segment != "..")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_patterns() {
        assert_eq!(PathPattern::parse("/**").unwrap(), PathPattern::Any);
        assert_eq!(
            PathPattern::parse("/manage/**").unwrap(),
            PathPattern::Prefix("/manage".into())
        );
        assert_eq!(
            PathPattern::parse("/api-docs").unwrap(),
            PathPattern::Exact("/api-docs".into())
        );
        assert!(PathPattern::parse("manage").is_err());
        assert!(PathPattern::parse("/a/*/b").is_err());
    }

    #[test]
    fn prefix_matching_is_segment_aware() {
        let health = PathPattern::parse("/manage/health/**").unwrap();
        assert!(health.matches("/manage/health"));
        assert!(health.matches("/manage/health/"));
        assert!(health.matches("/manage/health/liveness"));
        assert!(!health.matches("/manage/healthz"));
        assert!(!health.matches("/manage"));
    }

    #[test]
    fn exact_matching() {
        let docs = PathPattern::parse("/api-docs").unwrap();
        assert!(docs.matches("/api-docs"));
        assert!(!docs.matches("/api-docs/x"));
        assert!(!docs.matches("/api"));
    }

    #[test]
    fn method_constraint() {
        let root = RequestMatcher::method(Method::GET, "/").unwrap();
        assert!(root.matches(&Method::GET, "/"));
        assert!(!root.matches(&Method::POST, "/"));
        assert!(!root.matches(&Method::GET, "/api"));
        assert!(!root.is_catch_all());
        assert!(RequestMatcher::path("/**").unwrap().is_catch_all());
        assert!(!RequestMatcher::method(Method::OPTIONS, "/**").unwrap().is_catch_all());
    }

    #[test]
    fn renders_for_display() {
        assert_eq!(
            RequestMatcher::method(Method::GET, "/").unwrap().to_string(),
            "GET /"
        );
        assert_eq!(RequestMatcher::path("/manage/**").unwrap().to_string(), "/manage/**");
    }

    #[test]
    fn rejects_non_normalized_paths() {
        assert!(is_normalized("/"));
        assert!(is_normalized("/api/v1/items"));
        assert!(is_normalized("/manage/health/"));
        assert!(!is_normalized("/manage/health/../info"));
        assert!(!is_normalized("/manage/./info"));
        assert!(!is_normalized("//manage/info"));
        assert!(!is_normalized("/manage/health/%2e%2e/info"));
        assert!(!is_normalized("/manage%2Finfo"));
        assert!(!is_normalized("relative"));
    }
}
