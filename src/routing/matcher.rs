//! Rule predicate matching.
//!
//! # Responsibilities
//! - Compile path patterns once, at rule load time
//! - Match request paths segment by segment
//! - Match the request method when a rule restricts it
//!
//! # Pattern Syntax
//! - `literal`: exact, case-sensitive segment
//! - `*` or `{name}`: exactly one segment
//! - `**`: zero or more trailing segments (last position only)
//!
//! # Design Decisions
//! - Empty segments are ignored, so `/users/` matches `/users`
//! - Empty condition = always matches (wildcard)
//! - No regex to guarantee O(n) matching

use axum::http::Method;
use thiserror::Error;

/// Trait for matching a request's method and path against a condition.
pub trait Matcher: Send + Sync + std::fmt::Debug {
    /// Returns true if the request matches this condition.
    fn matches(&self, method: &Method, path: &str) -> bool;
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatternError {
    #[error("path pattern is empty")]
    Empty,
    #[error("path pattern must start with '/'")]
    MissingLeadingSlash,
    #[error("'**' is only allowed as the last segment")]
    MisplacedRest,
    #[error("invalid segment '{0}'")]
    InvalidSegment(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    /// `*` or `{name}`.
    Single,
    /// Trailing `**`.
    Rest,
}

/// A compiled path pattern.
#[derive(Debug, Clone)]
pub struct PathPattern {
    raw: String,
    segments: Vec<Segment>,
}

impl PathPattern {
    pub fn compile(raw: &str) -> Result<Self, PatternError> {
        if raw.is_empty() {
            return Err(PatternError::Empty);
        }
        if !raw.starts_with('/') {
            return Err(PatternError::MissingLeadingSlash);
        }

        let parts: Vec<&str> = split_segments(raw).collect();
        let mut segments = Vec::with_capacity(parts.len());
        for (i, part) in parts.iter().enumerate() {
            let segment = match *part {
                "**" if i + 1 == parts.len() => Segment::Rest,
                "**" => return Err(PatternError::MisplacedRest),
                "*" => Segment::Single,
                p if p.starts_with('{') && p.ends_with('}') && p.len() > 2 => {
                    let name = &p[1..p.len() - 1];
                    if name.contains(['{', '}', '*']) {
                        return Err(PatternError::InvalidSegment(p.to_string()));
                    }
                    Segment::Single
                }
                p if p.contains(['{', '}', '*']) => {
                    return Err(PatternError::InvalidSegment(p.to_string()))
                }
                p => Segment::Literal(p.to_string()),
            };
            segments.push(segment);
        }

        Ok(Self {
            raw: raw.to_string(),
            segments,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Returns true if the path matches this pattern.
    pub fn matches_path(&self, path: &str) -> bool {
        let mut parts = split_segments(path);
        for segment in &self.segments {
            match segment {
                Segment::Rest => return true,
                Segment::Single => {
                    if parts.next().is_none() {
                        return false;
                    }
                }
                Segment::Literal(expected) => match parts.next() {
                    Some(part) if part == expected => {}
                    _ => return false,
                },
            }
        }
        parts.next().is_none()
    }
}

impl Matcher for PathPattern {
    fn matches(&self, _method: &Method, path: &str) -> bool {
        self.matches_path(path)
    }
}

fn split_segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

/// Matches the request method; `None` matches any method.
#[derive(Debug, Clone, Default)]
pub struct MethodMatcher {
    method: Option<Method>,
}

impl MethodMatcher {
    pub fn new(method: Option<Method>) -> Self {
        Self { method }
    }

    pub fn method(&self) -> Option<&Method> {
        self.method.as_ref()
    }
}

impl Matcher for MethodMatcher {
    fn matches(&self, method: &Method, _path: &str) -> bool {
        self.method.as_ref().map(|m| m == method).unwrap_or(true)
    }
}

/// Path and method conditions, combined with AND semantics.
#[derive(Debug, Clone)]
pub struct Predicate {
    pub path: PathPattern,
    pub method: MethodMatcher,
}

impl Matcher for Predicate {
    fn matches(&self, method: &Method, path: &str) -> bool {
        self.method.matches(method, path) && self.path.matches(method, path)
    }
}
