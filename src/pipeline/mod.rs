//! Request pipeline.
//!
//! # Data Flow
//! ```text
//! InboundRequest
//!     → context.rs (RequestContext, Stage)
//!     → orchestrator.rs: match → authorize → rate limit → rewrite
//!                         → dispatch → post-process
//!     → BackendResponse or GatewayError
//! ```
//!
//! Rules and limiter state come from snapshot.rs, swapped whole on reload.

pub mod context;
pub mod orchestrator;
pub mod snapshot;

pub use context::{InboundRequest, RequestContext, Stage};
pub use orchestrator::{Collaborators, Pipeline};
pub use snapshot::RuleSnapshot;
