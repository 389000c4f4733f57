//! Immediate-reject admission: one token per request or 429.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::admission::token_bucket::TokenBucket;
use crate::error::GatewayError;
use crate::observability::metrics;

/// Middleware function for the shared token bucket gate.
pub async fn rate_limit_middleware(
    State(bucket): State<Arc<TokenBucket>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if bucket.try_acquire() {
        next.run(request).await
    } else {
        tracing::warn!(
            method = %request.method(),
            path = %request.uri().path(),
            "Rate limit exceeded"
        );
        metrics::record_rejected("rate_limit");
        GatewayError::RateLimited.into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode, middleware, routing::get, Router};
    use tower::ServiceExt;

    fn app(bucket: Arc<TokenBucket>) -> Router {
        Router::new()
            .route("/", get(|| async { "ok" }))
            .layer(middleware::from_fn_with_state(bucket, rate_limit_middleware))
    }

    fn request() -> Request<Body> {
        Request::builder().uri("/").body(Body::empty()).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_sixth_request_rejected() {
        let app = app(Arc::new(TokenBucket::new(5, 1.0)));

        for _ in 0..5 {
            let response = app.clone().oneshot(request()).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }

        let response = app.clone().oneshot(request()).await.unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["message"], "Too Many Requests");
        assert_eq!(body["code"], 429);
    }

    #[tokio::test(start_paused = true)]
    async fn test_admits_again_after_refill() {
        let app = app(Arc::new(TokenBucket::new(1, 1.0)));

        assert_eq!(app.clone().oneshot(request()).await.unwrap().status(), StatusCode::OK);
        assert_eq!(
            app.clone().oneshot(request()).await.unwrap().status(),
            StatusCode::TOO_MANY_REQUESTS
        );

        tokio::time::advance(std::time::Duration::from_secs(1)).await;
        assert_eq!(app.clone().oneshot(request()).await.unwrap().status(), StatusCode::OK);
    }
}
