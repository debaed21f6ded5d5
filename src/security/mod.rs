//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Matched rule:
//!     → authorization.rs (caller roles vs. rule authority)
//!     → rate_limit.rs (per-rule token bucket)
//!     → Pass to rewrite
//! ```
//!
//! # Design Decisions
//! - Authorization runs before rate limiting; denied callers spend no tokens
//! - Fail closed: reject on any check failure
//! - No trust in client input beyond the authentication layer's headers

pub mod authorization;
pub mod rate_limit;

pub use authorization::{Authorizer, Caller, RoleAuthorizer};
pub use rate_limit::{LimiterStatus, RateLimiterRegistry};
