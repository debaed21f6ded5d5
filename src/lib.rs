//! Rule-driven API gateway library.

pub mod admin;
pub mod config;
pub mod discovery;
pub mod dispatch;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod pipeline;
pub mod rewrite;
pub mod routing;
pub mod security;

pub use config::schema::GatewayConfig;
pub use error::{ErrorKind, GatewayError};
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use pipeline::{Collaborators, Pipeline};
