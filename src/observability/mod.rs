//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Pipeline, config watcher, server:
//!     → logging.rs (structured log events, pretty or JSON)
//!     → metrics.rs (counters and histograms)
//!
//! Consumers:
//!     → stdout
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Request ID is carried as a field on every pipeline log event
//! - Metric updates are no-ops until a recorder is installed

pub mod logging;
pub mod metrics;

pub use logging::init_logging;
