//! Service name resolution.
//!
//! Discovery itself is external; the gateway only asks a resolver for the
//! base URL of a logical service. The bundled resolver serves a static map
//! from configuration.

use std::collections::{BTreeMap, HashMap};

use url::Url;

pub trait ServiceResolver: Send + Sync {
    /// Base URL for the service, or `None` if it is unknown.
    fn resolve(&self, service: &str) -> Option<Url>;
}

/// Resolver backed by the `[services]` configuration table.
#[derive(Debug, Clone, Default)]
pub struct StaticServiceRegistry {
    services: HashMap<String, Url>,
}

impl StaticServiceRegistry {
    pub fn from_config(services: &BTreeMap<String, String>) -> Self {
        let mut resolved = HashMap::with_capacity(services.len());
        for (name, raw) in services {
            match Url::parse(raw) {
                Ok(url) => {
                    resolved.insert(name.clone(), url);
                }
                Err(e) => tracing::warn!(service = %name, url = %raw, error = %e, "Ignoring invalid service URL"),
            }
        }
        Self { services: resolved }
    }

    pub fn insert(&mut self, name: impl Into<String>, url: Url) {
        self.services.insert(name.into(), url);
    }
}

impl ServiceResolver for StaticServiceRegistry {
    fn resolve(&self, service: &str) -> Option<Url> {
        self.services.get(service).cloned()
    }
}
