//! Upstream forwarding.
//!
//! # Responsibilities
//! - Resolve the outbound URI from the route target and stripped path
//! - Rewrite `Host`, strip hop-by-hop headers, append `X-Forwarded-For`
//! - Make exactly one upstream attempt under a deadline
//! - Translate every upstream failure into a 502 envelope
//!
//! # Design Decisions
//! - The target is parsed per request so a bad target fails before any I/O
//! - No retries and no failover: one target per rule
//! - Request and response bodies are streamed, never buffered

use std::net::SocketAddr;
use std::time::Duration;

use axum::{
    body::Body,
    extract::ConnectInfo,
    http::{header, uri::PathAndQuery, HeaderValue, Request, Uri, Version},
    response::Response,
};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use url::Url;

use crate::config::TimeoutConfig;
use crate::error::{error_chain, GatewayError};
use crate::http::headers::{append_forwarded_for, strip_hop_by_hop};
use crate::http::response::relay;
use crate::routing::ForwardDecision;

/// Relays requests to the target of a matched route.
#[derive(Clone)]
pub struct ProxyForwarder {
    client: Client<HttpConnector, Body>,
    upstream_timeout: Duration,
}

impl ProxyForwarder {
    pub fn new(timeouts: &TimeoutConfig) -> Self {
        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(Duration::from_secs(timeouts.connect_secs)));
        connector.set_nodelay(true);

        let client = Client::builder(TokioExecutor::new()).build(connector);

        Self {
            client,
            upstream_timeout: Duration::from_secs(timeouts.upstream_secs),
        }
    }

    /// Forward `request` to the route in `decision`.
    pub async fn forward(
        &self,
        request: Request<Body>,
        decision: &ForwardDecision,
    ) -> Result<Response, GatewayError> {
        let (mut parts, body) = request.into_parts();

        let query = parts.uri.query().map(str::to_owned);
        let target = UpstreamTarget::resolve(&decision.route.target, &decision.remainder, query.as_deref())?;

        strip_hop_by_hop(&mut parts.headers);
        parts.headers.insert(header::HOST, target.host.clone());
        if let Some(ConnectInfo(addr)) = parts.extensions.get::<ConnectInfo<SocketAddr>>() {
            append_forwarded_for(&mut parts.headers, addr.ip());
        }
        parts.uri = target.uri.clone();
        parts.version = Version::HTTP_11;

        tracing::debug!(
            method = %parts.method,
            upstream = %target.uri,
            route = decision.route.index,
            "Forwarding request"
        );

        let upstream = Request::from_parts(parts, body);
        match tokio::time::timeout(self.upstream_timeout, self.client.request(upstream)).await {
            Ok(Ok(response)) => Ok(relay(response)),
            Ok(Err(e)) => {
                let detail = error_chain(&e);
                tracing::error!(upstream = %target.uri, error = %detail, "Upstream error");
                Err(GatewayError::Upstream(detail))
            }
            Err(_) => {
                tracing::error!(
                    upstream = %target.uri,
                    timeout = ?self.upstream_timeout,
                    "Upstream request timed out"
                );
                Err(GatewayError::UpstreamTimeout(self.upstream_timeout))
            }
        }
    }
}

/// Outbound URI and `Host` value for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamTarget {
    pub uri: Uri,
    pub host: HeaderValue,
}

impl UpstreamTarget {
    /// Join `target`'s base path with `remainder` and carry `query` over.
    ///
    /// A query on the target itself is kept and precedes the inbound one.
    pub fn resolve(target: &str, remainder: &str, query: Option<&str>) -> Result<Self, GatewayError> {
        let invalid = |reason: String| GatewayError::InvalidTarget {
            target: target.to_string(),
            reason,
        };

        let url = Url::parse(target).map_err(|e| invalid(e.to_string()))?;
        let host = url
            .host_str()
            .ok_or_else(|| invalid("missing host".to_string()))?;
        let authority = match url.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        };

        let base = url.path().trim_end_matches('/');
        // Target query first, then the client's.
        let query = match (url.query().filter(|q| !q.is_empty()), query) {
            (Some(fixed), Some(inbound)) => Some(format!("{}&{}", fixed, inbound)),
            (Some(fixed), None) => Some(fixed.to_string()),
            (None, inbound) => inbound.map(str::to_owned),
        };
        let path_and_query = match query {
            Some(q) => format!("{}{}?{}", base, remainder, q),
            None => format!("{}{}", base, remainder),
        };
        let path_and_query =
            PathAndQuery::try_from(path_and_query).map_err(|e| invalid(e.to_string()))?;

        let uri = Uri::builder()
            .scheme(url.scheme())
            .authority(authority.as_str())
            .path_and_query(path_and_query)
            .build()
            .map_err(|e| invalid(e.to_string()))?;
        let host = HeaderValue::from_str(&authority).map_err(|e| invalid(e.to_string()))?;

        Ok(Self { uri, host })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{Method, StatusCode};
    use crate::routing::{MethodMatcher, Route};

    #[test]
    fn test_path_rewrite() {
        let nested = UpstreamTarget::resolve("http://backend", "/orders/7", None).unwrap();
        assert_eq!(nested.uri, "http://backend/orders/7");
        assert_eq!(nested.host, "backend");

        let root = UpstreamTarget::resolve("http://backend", "/", None).unwrap();
        assert_eq!(root.uri, "http://backend/");
    }

    #[test]
    fn test_target_base_path_and_port() {
        let target = UpstreamTarget::resolve("http://10.0.0.5:8080/v2/", "/users", Some("page=2")).unwrap();
        assert_eq!(target.uri, "http://10.0.0.5:8080/v2/users?page=2");
        assert_eq!(target.host, "10.0.0.5:8080");
    }

    #[test]
    fn test_target_query_is_merged() {
        let both = UpstreamTarget::resolve("http://backend/v1?key=x", "/items", Some("page=2")).unwrap();
        assert_eq!(both.uri, "http://backend/v1/items?key=x&page=2");

        let fixed_only = UpstreamTarget::resolve("http://backend/v1?key=x", "/items", None).unwrap();
        assert_eq!(fixed_only.uri, "http://backend/v1/items?key=x");

        let empty = UpstreamTarget::resolve("http://backend/?", "/items", Some("page=2")).unwrap();
        assert_eq!(empty.uri, "http://backend/items?page=2");
    }

    #[test]
    fn test_invalid_targets() {
        for target in ["backend", "", "mailto:ops@example.com"] {
            let err = UpstreamTarget::resolve(target, "/", None).unwrap_err();
            assert!(
                matches!(err, GatewayError::InvalidTarget { .. }),
                "{target:?} should be rejected"
            );
            assert_eq!(err.status(), StatusCode::BAD_GATEWAY);
        }
    }

    #[tokio::test]
    async fn test_invalid_target_fails_before_io() {
        let forwarder = ProxyForwarder::new(&TimeoutConfig::default());
        let decision = ForwardDecision {
            route: Route::new(0, MethodMatcher::Any, "/x", "not-a-url"),
            remainder: "/".into(),
        };
        let request = Request::builder()
            .method(Method::GET)
            .uri("/x")
            .body(Body::empty())
            .unwrap();

        let err = forwarder.forward(request, &decision).await.unwrap_err();
        assert_eq!(err.envelope().message, "Bad Gateway");
        assert_eq!(err.envelope().causes.len(), 1);
    }

    #[tokio::test]
    async fn test_connection_refused_is_bad_gateway() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let forwarder = ProxyForwarder::new(&TimeoutConfig::default());
        let decision = ForwardDecision {
            route: Route::new(0, MethodMatcher::Any, "/", format!("http://{}", addr)),
            remainder: "/".into(),
        };
        let request = Request::builder().uri("/").body(Body::empty()).unwrap();

        let err = forwarder.forward(request, &decision).await.unwrap_err();
        assert!(matches!(err, GatewayError::Upstream(_)));
        let envelope = err.envelope();
        assert_eq!(envelope.code, 502);
        assert_eq!(envelope.message, "Bad Gateway");
        assert!(!envelope.detail.is_empty());
    }
}
