//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks, rule compilation)
//!     → GatewayConfig (validated, immutable)
//!     → compiled into a RuleSnapshot held by the pipeline
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs reads new config
//!     → pipeline validates and compiles it once (validation.rs)
//!     → pipeline swaps in a new RuleSnapshot atomically
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require full reload
//! - All fields have defaults to allow minimal configs
//! - A single invalid rule rejects the whole file

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, parse_config, read_config, ConfigError};
pub use schema::{
    AdminConfig, AuthorizationConfig, GatewayConfig, GatewaySettings, ListenerConfig,
    ObservabilityConfig, PostProcessingStep, RateLimiterConfig, RuleConfig, TimeoutConfig,
};
