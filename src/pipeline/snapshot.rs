//! Immutable rule snapshot swapped atomically on reload.

use crate::config::loader::ConfigError;
use crate::config::schema::{AuthorizationConfig, GatewayConfig};
use crate::config::validation::compile_config;
use crate::routing::RuleSet;
use crate::security::RateLimiterRegistry;

/// Rules plus the limiter state that belongs to them.
///
/// Limiters are keyed by rule index, so they live and die with the rule set
/// they were created for.
pub struct RuleSnapshot {
    pub generation: u64,
    pub service_name: String,
    pub authorization: AuthorizationConfig,
    pub rules: RuleSet,
    pub limiters: RateLimiterRegistry,
}

impl RuleSnapshot {
    /// Validate `config` and compile its rules in a single pass.
    pub fn build(config: &GatewayConfig, generation: u64) -> Result<Self, ConfigError> {
        let rules = compile_config(config).map_err(ConfigError::Validation)?;

        Ok(Self {
            generation,
            service_name: config.gateway.name.clone(),
            authorization: config.authorization.clone(),
            rules,
            limiters: RateLimiterRegistry::new(),
        })
    }
}
