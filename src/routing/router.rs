//! Rule lookup.
//!
//! # Responsibilities
//! - Store compiled rules in declaration order
//! - Look up the matching rule for a request
//! - Return the matched rule or an explicit no-match
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - O(n) scan in declaration order; first match wins
//! - Compilation is all-or-nothing: one bad entry rejects the set

use std::sync::Arc;

use axum::http::Method;

use crate::config::schema::RuleConfig;
use crate::routing::rule::{RuleDefinition, RuleError};

/// A compile failure for one entry, with its position.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("rule #{index} ({path}): {source}")]
pub struct RuleCompileError {
    pub index: usize,
    pub path: String,
    #[source]
    pub source: RuleError,
}

/// The ordered, immutable set of rules.
#[derive(Debug, Default)]
pub struct RuleSet {
    rules: Vec<Arc<RuleDefinition>>,
}

impl RuleSet {
    /// Compile every entry; any failure rejects the whole set.
    pub fn compile(configs: &[RuleConfig]) -> Result<Self, Vec<RuleCompileError>> {
        let mut rules = Vec::with_capacity(configs.len());
        let mut errors = Vec::new();

        for (index, config) in configs.iter().enumerate() {
            match RuleDefinition::compile(index, config) {
                Ok(rule) => rules.push(Arc::new(rule)),
                Err(source) => errors.push(RuleCompileError {
                    index,
                    path: config.path.clone(),
                    source,
                }),
            }
        }

        if errors.is_empty() {
            Ok(Self { rules })
        } else {
            Err(errors)
        }
    }

    /// First rule, in declaration order, whose path and method match.
    pub fn match_request(&self, method: &Method, path: &str) -> Option<Arc<RuleDefinition>> {
        self.rules
            .iter()
            .find(|rule| rule.matches(method, path))
            .cloned()
    }

    pub fn rules(&self) -> &[Arc<RuleDefinition>] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
