//! Lightweight API gateway library.
//!
//! Requests pass through access logging, an admission gate (immediate reject
//! or buffered queue), ordered prefix routing, and a single-attempt reverse
//! proxy to the matched route's target.

pub mod admission;
pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod routing;

pub use config::schema::GatewayConfig;
pub use error::GatewayError;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
