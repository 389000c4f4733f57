//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware chain)
//!     → request.rs (request ID)
//!     → access log → admission gate
//!     → routing layer decides target
//!     → forward.rs (rewrite, single upstream attempt)
//!     → response.rs (relay, or error envelope)
//!     → Send to client
//! ```

pub mod forward;
pub mod headers;
pub mod request;
pub mod response;
pub mod server;

pub use forward::ProxyForwarder;
pub use request::{RequestIdExt, X_REQUEST_ID};
pub use response::{Cause, ErrorEnvelope};
pub use server::HttpServer;
