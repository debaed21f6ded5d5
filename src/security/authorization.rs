//! Rule authority checks.
//!
//! Credentials are validated upstream; the gateway only reads the identity
//! that layer attached to the request and compares it with a rule's
//! `authority` set.

use std::collections::BTreeSet;

use axum::http::HeaderMap;

use crate::config::schema::AuthorizationConfig;
use crate::error::{GatewayError, ValidationDetails};

/// Identity of the caller as established by the authentication layer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Caller {
    pub principal: Option<String>,
    pub roles: BTreeSet<String>,
}

impl Caller {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn with_roles<I, S>(roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            principal: None,
            roles: roles.into_iter().map(Into::into).collect(),
        }
    }

    /// Read principal and roles from the configured headers.
    ///
    /// A roles header that is not valid UTF-8 is a request shape error.
    pub fn from_headers(
        headers: &HeaderMap,
        config: &AuthorizationConfig,
    ) -> Result<Self, GatewayError> {
        let roles = match headers.get(config.roles_header.as_str()) {
            Some(value) => value
                .to_str()
                .map_err(|_| {
                    GatewayError::RequestValidationFailed(ValidationDetails::field(
                        config.roles_header.clone(),
                    ))
                })?
                .split(',')
                .map(str::trim)
                .filter(|r| !r.is_empty())
                .map(String::from)
                .collect(),
            None => BTreeSet::new(),
        };

        let principal = headers
            .get(config.principal_header.as_str())
            .and_then(|v| v.to_str().ok())
            .map(String::from);

        Ok(Self { principal, roles })
    }
}

/// Decides whether a caller may use a rule.
pub trait Authorizer: Send + Sync {
    fn authorize(&self, caller: &Caller, required: &BTreeSet<String>) -> bool;
}

/// Grants access when the caller holds any one of the required roles.
#[derive(Debug, Clone, Copy, Default)]
pub struct RoleAuthorizer;

impl Authorizer for RoleAuthorizer {
    fn authorize(&self, caller: &Caller, required: &BTreeSet<String>) -> bool {
        required.is_empty() || required.iter().any(|role| caller.roles.contains(role))
    }
}
