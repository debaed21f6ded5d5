//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Shutdown (shutdown.rs):
//!     Signal received → broadcast → server stops accepting → in-flight drain
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//!     SIGHUP → Re-read the config file and push it to the reload channel
//! ```

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
