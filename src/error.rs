//! Runtime error taxonomy for the request pipeline.
//!
//! Every variant terminates as an HTTP status plus an [`ErrorEnvelope`].

use std::time::Duration;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::http::response::{Cause, ErrorEnvelope};

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("no route matches {method} {path}")]
    NoRoute { method: String, path: String },

    #[error("rate limit exceeded")]
    RateLimited,

    #[error("Request buffer full")]
    QueueFull,

    #[error("Server shutting down")]
    QueueClosed,

    #[error("invalid target URL {target:?}: {reason}")]
    InvalidTarget { target: String, reason: String },

    #[error("{0}")]
    Upstream(String),

    #[error("upstream request timed out after {0:?}")]
    UpstreamTimeout(Duration),
}

impl GatewayError {
    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::NoRoute { .. } => StatusCode::NOT_FOUND,
            GatewayError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            GatewayError::QueueFull | GatewayError::QueueClosed => StatusCode::SERVICE_UNAVAILABLE,
            GatewayError::InvalidTarget { .. }
            | GatewayError::Upstream(_)
            | GatewayError::UpstreamTimeout(_) => StatusCode::BAD_GATEWAY,
        }
    }

    /// Label used for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            GatewayError::NoRoute { .. } => "no_route",
            GatewayError::RateLimited => "rate_limited",
            GatewayError::QueueFull => "queue_full",
            GatewayError::QueueClosed => "queue_closed",
            GatewayError::InvalidTarget { .. } => "invalid_target",
            GatewayError::Upstream(_) => "upstream",
            GatewayError::UpstreamTimeout(_) => "upstream_timeout",
        }
    }

    pub fn envelope(&self) -> ErrorEnvelope {
        let status = self.status();
        let detail = self.to_string();
        match self {
            GatewayError::NoRoute { .. } => ErrorEnvelope::new(status, "Not Found", detail),
            GatewayError::RateLimited => ErrorEnvelope::new(status, "Too Many Requests", detail),
            GatewayError::QueueFull => {
                ErrorEnvelope::new(status, "Server busy, try again later", detail)
            }
            GatewayError::QueueClosed => ErrorEnvelope::new(status, "Service Unavailable", detail),
            GatewayError::InvalidTarget { reason, .. } => {
                ErrorEnvelope::new(status, "Bad Gateway", detail)
                    .with_cause(Cause::new("target", reason.clone()))
            }
            GatewayError::Upstream(_) | GatewayError::UpstreamTimeout(_) => {
                ErrorEnvelope::new(status, "Bad Gateway", detail)
            }
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        self.envelope().into_response()
    }
}

/// Render an error and its source chain as one line.
pub fn error_chain(error: &(dyn std::error::Error + 'static)) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !message.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = cause.source();
    }
    message
}
