//! Compiled, immutable rule definitions.

use std::collections::BTreeSet;
use std::str::FromStr;

use axum::http::Method;
use serde_json::{Map, Value};
use thiserror::Error;
use url::Url;

use crate::config::schema::{PostProcessingStep, RateLimiterConfig, RuleConfig};
use crate::routing::matcher::{Matcher, MethodMatcher, PathPattern, PatternError, Predicate};

/// Identity of a rule within one rule snapshot (its declaration index).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RuleId(pub usize);

impl std::fmt::Display for RuleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Why a single rule entry could not be compiled.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuleError {
    #[error("path is required")]
    MissingPath,
    #[error("invalid path pattern: {0}")]
    InvalidPath(#[from] PatternError),
    #[error("invalid method '{0}'")]
    InvalidMethod(String),
    #[error("one of 'service' or 'uri' is required")]
    MissingTarget,
    #[error("'service' and 'uri' are mutually exclusive")]
    ConflictingTarget,
    #[error("service name is empty")]
    EmptyService,
    #[error("invalid uri '{uri}': {reason}")]
    InvalidUri { uri: String, reason: String },
    #[error("invalid rate limiter: {0}")]
    InvalidRateLimiter(&'static str),
    #[error("request parameter '{0}' must be a string, number or boolean")]
    InvalidParam(String),
}

/// Where a matched request is forwarded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// Logical name, resolved by the service resolver at request time.
    Service(String),
    /// Literal base URI.
    Uri(Url),
}

impl std::fmt::Display for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Route::Service(name) => write!(f, "service:{}", name),
            Route::Uri(url) => write!(f, "uri:{}", url),
        }
    }
}

/// One validated routing rule.
#[derive(Debug, Clone)]
pub struct RuleDefinition {
    id: RuleId,
    predicate: Predicate,
    rate_limiter: Option<RateLimiterConfig>,
    authority: BTreeSet<String>,
    route: Route,
    request_params: Vec<(String, String)>,
    request_body: Map<String, Value>,
    post_processing: Vec<PostProcessingStep>,
    secure_headers: bool,
}

impl RuleDefinition {
    /// Validate and compile one configuration entry.
    pub fn compile(index: usize, config: &RuleConfig) -> Result<Self, RuleError> {
        if config.path.trim().is_empty() {
            return Err(RuleError::MissingPath);
        }
        let path = PathPattern::compile(&config.path)?;

        let method = match &config.method {
            Some(m) => Some(
                Method::from_str(&m.to_ascii_uppercase())
                    .map_err(|_| RuleError::InvalidMethod(m.clone()))?,
            ),
            None => None,
        };

        let route = match (&config.service, &config.uri) {
            (Some(_), Some(_)) => return Err(RuleError::ConflictingTarget),
            (None, None) => return Err(RuleError::MissingTarget),
            (Some(service), None) => {
                if service.trim().is_empty() {
                    return Err(RuleError::EmptyService);
                }
                Route::Service(service.trim().to_string())
            }
            (None, Some(uri)) => Route::Uri(parse_base_uri(uri)?),
        };

        if let Some(limiter) = &config.rate_limiter {
            if limiter.capacity == 0 {
                return Err(RuleError::InvalidRateLimiter("capacity must be at least 1"));
            }
            if !limiter.refill_per_second.is_finite() || limiter.refill_per_second <= 0.0 {
                return Err(RuleError::InvalidRateLimiter(
                    "refillPerSecond must be a positive number",
                ));
            }
        }

        let request_params = config
            .request_param
            .iter()
            .map(|(key, value)| {
                let value = match value {
                    Value::String(s) => s.clone(),
                    Value::Number(n) => n.to_string(),
                    Value::Bool(b) => b.to_string(),
                    _ => return Err(RuleError::InvalidParam(key.clone())),
                };
                Ok((key.clone(), value))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            id: RuleId(index),
            predicate: Predicate {
                path,
                method: MethodMatcher::new(method),
            },
            rate_limiter: config.rate_limiter,
            authority: config.authority.iter().cloned().collect(),
            route,
            request_params,
            request_body: config.request_body.clone(),
            post_processing: config.post_processing.clone(),
            secure_headers: config.secure_http_headers,
        })
    }

    pub fn id(&self) -> RuleId {
        self.id
    }

    pub fn matches(&self, method: &Method, path: &str) -> bool {
        self.predicate.matches(method, path)
    }

    pub fn path(&self) -> &str {
        self.predicate.path.as_str()
    }

    pub fn method(&self) -> Option<&Method> {
        self.predicate.method.method()
    }

    pub fn rate_limiter(&self) -> Option<&RateLimiterConfig> {
        self.rate_limiter.as_ref()
    }

    pub fn authority(&self) -> &BTreeSet<String> {
        &self.authority
    }

    pub fn route(&self) -> &Route {
        &self.route
    }

    pub fn request_params(&self) -> &[(String, String)] {
        &self.request_params
    }

    pub fn request_body(&self) -> &Map<String, Value> {
        &self.request_body
    }

    pub fn post_processing(&self) -> &[PostProcessingStep] {
        &self.post_processing
    }

    /// Advisory; has no runtime effect.
    pub fn secure_headers(&self) -> bool {
        self.secure_headers
    }
}

fn parse_base_uri(raw: &str) -> Result<Url, RuleError> {
    let invalid = |reason: &str| RuleError::InvalidUri {
        uri: raw.to_string(),
        reason: reason.to_string(),
    };
    let url = Url::parse(raw).map_err(|e| invalid(&e.to_string()))?;
    // The dispatcher speaks plain HTTP only.
    if url.scheme() != "http" {
        return Err(invalid("scheme must be http"));
    }
    if url.host_str().is_none() {
        return Err(invalid("host is required"));
    }
    if url.query().is_some() || url.fragment().is_some() {
        return Err(invalid("query and fragment are not allowed"));
    }
    Ok(url)
}
