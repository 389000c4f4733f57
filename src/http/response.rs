//! Response handling and transformation.
//!
//! # Responsibilities
//! - Define the error envelope returned for every gateway-generated failure
//! - Relay backend responses to the client with hop-by-hop headers removed
//!
//! # Design Decisions
//! - Streaming responses avoid buffering entire body
//! - Envelope wire shape is `{message, detail, code, causes}`

use axum::{
    body::Body,
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use hyper::body::Incoming;
use serde::{Deserialize, Serialize};

use crate::http::headers::strip_hop_by_hop;

/// One cause attached to an [`ErrorEnvelope`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cause {
    pub field: String,
    pub message: String,
}

impl Cause {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Uniform body for gateway-generated failures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub message: String,
    pub detail: String,
    /// HTTP status code, duplicated in the body.
    pub code: u16,
    #[serde(default)]
    pub causes: Vec<Cause>,
}

impl ErrorEnvelope {
    pub fn new(status: StatusCode, message: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            detail: detail.into(),
            code: status.as_u16(),
            causes: Vec::new(),
        }
    }

    pub fn with_cause(mut self, cause: Cause) -> Self {
        self.causes.push(cause);
        self
    }

    pub fn status(&self) -> StatusCode {
        StatusCode::from_u16(self.code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

impl IntoResponse for ErrorEnvelope {
    fn into_response(self) -> Response {
        let status = self.status();
        match serde_json::to_vec(&self) {
            Ok(bytes) => {
                let mut response = Response::new(Body::from(bytes));
                *response.status_mut() = status;
                response.headers_mut().insert(
                    header::CONTENT_TYPE,
                    HeaderValue::from_static("application/json"),
                );
                response
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to encode error envelope");
                (status, self.message).into_response()
            }
        }
    }
}

/// Convert an upstream response into one we can send to the client.
pub fn relay(upstream: hyper::Response<Incoming>) -> Response {
    let (mut parts, body) = upstream.into_parts();
    strip_hop_by_hop(&mut parts.headers);
    Response::from_parts(parts, Body::new(body))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_wire_shape() {
        let envelope = ErrorEnvelope::new(
            StatusCode::SERVICE_UNAVAILABLE,
            "Server busy, try again later",
            "Request buffer full",
        );
        let value = serde_json::to_value(&envelope).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "message": "Server busy, try again later",
                "detail": "Request buffer full",
                "code": 503,
                "causes": [],
            })
        );
    }

    #[test]
    fn test_envelope_with_cause() {
        let envelope = ErrorEnvelope::new(StatusCode::BAD_GATEWAY, "Bad Gateway", "bad target")
            .with_cause(Cause::new("target", "relative URL without a base"));
        let value = serde_json::to_value(&envelope).unwrap();
        assert_eq!(value["causes"][0]["field"], "target");
    }

    #[tokio::test]
    async fn test_envelope_into_response() {
        let response = ErrorEnvelope::new(StatusCode::TOO_MANY_REQUESTS, "Too Many Requests", "x")
            .into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "application/json"
        );

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let envelope: ErrorEnvelope = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(envelope.code, 429);
        assert_eq!(envelope.message, "Too Many Requests");
    }
}
