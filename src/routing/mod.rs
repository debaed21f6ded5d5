//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request (method, path)
//!     → router.rs (rule lookup)
//!     → matcher.rs (evaluate path + method predicates)
//!     → Return: matched RuleDefinition or NoMatch
//!
//! Rule compilation (at load and on reload):
//!     RuleConfig[]
//!     → rule.rs (validate, compile path patterns)
//!     → Freeze as immutable RuleSet
//! ```
//!
//! # Design Decisions
//! - Rules compiled at load time, immutable at runtime
//! - No regex in hot path (segment matching only)
//! - Deterministic: same input always matches same rule
//! - First match wins (declaration order, no specificity ranking)

pub mod matcher;
pub mod router;
pub mod rule;

pub use router::{RuleCompileError, RuleSet};
pub use rule::{Route, RuleDefinition, RuleError, RuleId};
