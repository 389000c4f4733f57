//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! gateway.toml (+ optional routes.json)
//!     → loader.rs (parse & deserialize, resolve route table)
//!     → validation.rs (semantic checks)
//!     → GatewayConfig (validated, immutable)
//!     → compiled into RouteTable / admission components at startup
//! ```
//!
//! # Design Decisions
//! - Config is loaded once; changes require a restart
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - Any load or validation failure is fatal at startup

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, load_route_table, ConfigError};
pub use schema::{
    AdmissionConfig, AdmissionPolicy, GatewayConfig, ListenerConfig, ObservabilityConfig,
    RouteConfig, TimeoutConfig,
};
pub use validation::ValidationError;
