//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;

use api_gateway::config::{AdmissionPolicy, GatewayConfig, RouteConfig};
use api_gateway::{HttpServer, Shutdown};
use axum::{
    body::Body,
    http::{header, Request},
    Json, Router,
};
use serde_json::{json, Value};
use tokio::net::TcpListener;

/// Start a backend serving `app` on an ephemeral port.
pub async fn start_backend(app: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    addr
}

/// Start a backend that answers every request with a JSON description of it.
pub async fn start_echo_backend() -> SocketAddr {
    start_backend(Router::new().fallback(echo)).await
}

async fn echo(request: Request<Body>) -> Json<Value> {
    let (parts, body) = request.into_parts();
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap_or_default();
    let header = |name: &str| {
        parts
            .headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned)
    };

    Json(json!({
        "method": parts.method.as_str(),
        "path": parts.uri.path(),
        "query": parts.uri.query(),
        "host": header(header::HOST.as_str()),
        "x_forwarded_for": header("x-forwarded-for"),
        "x_request_id": header("x-request-id"),
        "body": String::from_utf8_lossy(&bytes),
    }))
}

/// An address nothing is listening on.
pub fn refused_addr() -> SocketAddr {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap()
}

pub fn route(method: &str, prefix: &str, target: SocketAddr) -> RouteConfig {
    RouteConfig {
        method: method.into(),
        path_prefix: prefix.into(),
        target: format!("http://{}", target),
    }
}

/// Config with a bucket large enough that admission never interferes.
pub fn permissive_config(routes: Vec<RouteConfig>) -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.admission.policy = AdmissionPolicy::Reject;
    config.admission.bucket_capacity = 1_000;
    config.admission.refill_per_second = 1_000.0;
    config.routes = routes;
    config
}

/// Start the gateway on an ephemeral port. Keep the returned [`Shutdown`]
/// alive for as long as the gateway should run.
pub async fn start_gateway(config: GatewayConfig) -> (SocketAddr, Shutdown) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = HttpServer::new(config).unwrap();
    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, server_shutdown).await;
    });

    (addr, shutdown)
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}
