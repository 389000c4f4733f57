//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (capacity > 0, refill rate > 0, addresses parse)
//! - Detect routes that can never match
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Target URLs are not rejected here; a bad target answers 502 at forward time

use std::net::SocketAddr;

use url::Url;

use crate::config::schema::{GatewayConfig, RouteConfig};
use crate::routing::MethodMatcher;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("route {index}: path prefix must not be empty")]
    EmptyPathPrefix { index: usize },

    #[error("route {index}: target must not be empty")]
    EmptyTarget { index: usize },

    #[error("route {index}: invalid method {method:?}")]
    InvalidMethod { index: usize, method: String },

    #[error("admission.bucket_capacity must be at least 1")]
    ZeroBucketCapacity,

    #[error("admission.refill_per_second must be a positive number, got {0}")]
    InvalidRefillRate(f64),

    #[error("admission.queue_capacity must be at least 1")]
    ZeroQueueCapacity,

    #[error("invalid {field} {value:?}")]
    InvalidAddress { field: &'static str, value: String },

    #[error("both inline routes and route_table are set; use one source")]
    ConflictingRouteSources,
}

/// Validate a loaded configuration.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    errors.extend(validate_routes(&config.routes));

    if config.admission.bucket_capacity == 0 {
        errors.push(ValidationError::ZeroBucketCapacity);
    }
    let rate = config.admission.refill_per_second;
    if !rate.is_finite() || rate <= 0.0 {
        errors.push(ValidationError::InvalidRefillRate(rate));
    }
    if config.admission.queue_capacity == 0 {
        errors.push(ValidationError::ZeroQueueCapacity);
    }

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field: "listener.bind_address",
            value: config.listener.bind_address.clone(),
        });
    }
    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidAddress {
            field: "observability.metrics_address",
            value: config.observability.metrics_address.clone(),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Validate route rules on their own (used for inline and file routes alike).
pub fn validate_routes(routes: &[RouteConfig]) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    for (index, route) in routes.iter().enumerate() {
        if route.path_prefix.is_empty() {
            errors.push(ValidationError::EmptyPathPrefix { index });
        }
        if route.target.trim().is_empty() {
            errors.push(ValidationError::EmptyTarget { index });
        }
        if MethodMatcher::parse(&route.method).is_err() {
            errors.push(ValidationError::InvalidMethod {
                index,
                method: route.method.clone(),
            });
        }
    }
    errors
}

/// Pairs `(earlier, later)` where the later route can never match.
pub fn shadowed_routes(routes: &[RouteConfig]) -> Vec<(usize, usize)> {
    let mut shadowed = Vec::new();
    for (later, route) in routes.iter().enumerate() {
        let Ok(later_method) = MethodMatcher::parse(&route.method) else {
            continue;
        };
        let covering = routes[..later].iter().position(|earlier| {
            MethodMatcher::parse(&earlier.method)
                .map(|m| m.covers(&later_method))
                .unwrap_or(false)
                && route.path_prefix.starts_with(&earlier.path_prefix)
        });
        if let Some(earlier) = covering {
            shadowed.push((earlier, later));
        }
    }
    shadowed
}

/// Log warnings for routes that validate but look wrong.
pub fn warn_suspicious_routes(routes: &[RouteConfig]) {
    for (index, route) in routes.iter().enumerate() {
        let absolute = Url::parse(&route.target)
            .map(|url| url.has_host())
            .unwrap_or(false);
        if !absolute {
            tracing::warn!(
                route = index,
                target = %route.target,
                "Route target is not an absolute URL; requests will answer 502"
            );
        }
    }

    for (earlier, later) in shadowed_routes(routes) {
        tracing::warn!(
            route = later,
            shadowed_by = earlier,
            path_prefix = %routes[later].path_prefix,
            "Route can never match"
        );
    }
}
