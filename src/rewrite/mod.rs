//! Request rewriting and response post-processing.
//!
//! # Data Flow
//! ```text
//! Matched rule + inbound request
//!     → request.rs (route resolution, param and body overrides)
//!     → OutboundRequest → dispatch
//!
//! Backend response + rule.postProcessing
//!     → response.rs (ordered steps, all-or-nothing)
//!     → final response
//! ```

pub mod request;
pub mod response;

pub use request::{RequestRewriter, RewriteError};
pub use response::{apply_steps, PostProcessError, StepFailure};
