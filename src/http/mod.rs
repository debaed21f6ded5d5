//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID and trace layers)
//!     → request.rs (buffer body, assign request id)
//!     → pipeline (match, authorize, limit, rewrite, dispatch, post-process)
//!     → response.rs (backend response or error envelope)
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::{read_inbound, request_id, X_REQUEST_ID};
pub use server::{AppState, HttpServer};
