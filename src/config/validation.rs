//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check every rule compiles (path, method, route target, limiter)
//! - Validate value ranges (timeouts > 0, addresses parse)
//! - Optionally check rules reference known services
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<RuleSet, Vec<ValidationError>>
//! - The compiled rule set is handed back so it is built once per load
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;
use url::Url;

use crate::config::schema::GatewayConfig;
use crate::routing::{RuleCompileError, RuleSet};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("invalid {field} '{value}'")]
    InvalidAddress { field: &'static str, value: String },

    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("service '{service}' has invalid base URL '{url}'")]
    InvalidServiceUrl { service: String, url: String },

    #[error("rule #{index} references unknown service '{service}'")]
    UnknownService { index: usize, service: String },

    #[error(transparent)]
    Rule(#[from] RuleCompileError),
}

pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    compile_config(config).map(|_| ())
}

/// Validate the whole configuration and return its compiled rule set.
pub fn compile_config(config: &GatewayConfig) -> Result<RuleSet, Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field: "listener.bind_address",
            value: config.listener.bind_address.clone(),
        });
    }
    if config.admin.enabled && config.admin.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field: "admin.bind_address",
            value: config.admin.bind_address.clone(),
        });
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::Zero("timeouts.request_secs"));
    }
    if config.timeouts.connect_secs == 0 {
        errors.push(ValidationError::Zero("timeouts.connect_secs"));
    }
    if config.gateway.max_body_bytes == 0 {
        errors.push(ValidationError::Zero("gateway.max_body_bytes"));
    }

    for (service, url) in &config.services {
        let valid = Url::parse(url)
            .map(|u| u.scheme() == "http" && u.host_str().is_some())
            .unwrap_or(false);
        if !valid {
            errors.push(ValidationError::InvalidServiceUrl {
                service: service.clone(),
                url: url.clone(),
            });
        }
    }

    let rules = match RuleSet::compile(&config.rules) {
        Ok(rules) => Some(rules),
        Err(rule_errors) => {
            errors.extend(rule_errors.into_iter().map(ValidationError::Rule));
            None
        }
    };

    if config.gateway.strict_services {
        for (index, rule) in config.rules.iter().enumerate() {
            if let Some(service) = &rule.service {
                if !config.services.contains_key(service.trim()) {
                    errors.push(ValidationError::UnknownService {
                        index,
                        service: service.clone(),
                    });
                }
            }
        }
    }

    match rules {
        Some(rules) if errors.is_empty() => Ok(rules),
        _ => Err(errors),
    }
}
