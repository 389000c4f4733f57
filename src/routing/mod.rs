//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (method, path)
//!     → router.rs (ordered route scan)
//!     → matcher.rs (evaluate method + path prefix)
//!     → Return: ForwardDecision (route + remainder) or NoMatch
//!
//! Route Compilation (at startup):
//!     RouteConfig[]
//!     → Parse method patterns
//!     → Freeze as immutable RouteTable
//! ```
//!
//! # Design Decisions
//! - Routes compiled at startup, immutable at runtime
//! - No regex in hot path (prefix matching only)
//! - Deterministic: same input always matches same route
//! - First match wins (declaration order)

pub mod matcher;
pub mod router;

pub use matcher::{InvalidMethodPattern, Matcher, MethodMatcher, PathPrefixMatcher};
pub use router::{ForwardDecision, Route, RouteTable, Router};
