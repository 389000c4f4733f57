//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the health probe and the gateway routes
//! - Wire up middleware (request ID, tracing, access log, admission)
//! - Bind server to listener and own the admission queue worker
//! - Dispatch requests to routing engine
//! - Forward requests to upstream targets

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::admission::{Admission, QueueWorker};
use crate::config::GatewayConfig;
use crate::error::GatewayError;
use crate::http::forward::ProxyForwarder;
use crate::http::request::{propagate_request_id_layer, set_request_id_layer, RequestIdExt};
use crate::observability::{logging::access_log_middleware, metrics};
use crate::routing::{InvalidMethodPattern, RouteTable, Router as ProxyRouter};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub router: Arc<ProxyRouter>,
    pub forwarder: ProxyForwarder,
}

/// HTTP server for the gateway.
pub struct HttpServer {
    router: Router,
    config: GatewayConfig,
    admission: Admission,
    worker: Option<QueueWorker>,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: GatewayConfig) -> Result<Self, InvalidMethodPattern> {
        let table = RouteTable::from_config(&config.routes)?;
        let state = AppState {
            router: Arc::new(ProxyRouter::new(table)),
            forwarder: ProxyForwarder::new(&config.timeouts),
        };
        let (admission, worker) = Admission::from_config(&config.admission);

        let router = Self::build_router(state, &admission);
        Ok(Self {
            router,
            config,
            admission,
            worker,
        })
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(state: AppState, admission: &Admission) -> Router {
        let gateway = Router::new()
            .route("/", any(proxy_handler))
            .route("/{*path}", any(proxy_handler))
            .with_state(state);

        Router::new()
            .route("/health", any(health_handler))
            .merge(admission.layer(gateway))
            .layer(middleware::from_fn(access_log_middleware))
            .layer(
                ServiceBuilder::new()
                    .layer(set_request_id_layer())
                    .layer(TraceLayer::new_for_http().make_span_with(
                        |request: &Request<Body>| {
                            tracing::info_span!(
                                "request",
                                request_id = %request.request_id(),
                                method = %request.method(),
                                uri = %request.uri(),
                            )
                        },
                    ))
                    .layer(propagate_request_id_layer()),
            )
    }

    /// The fully layered router, for in-process use without a listener.
    ///
    /// Under the queue policy nothing is dispatched until [`HttpServer::run`]
    /// spawns the worker.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server, accepting connections on the given listener until
    /// `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            routes = self.config.routes.len(),
            admission = %self.admission.policy(),
            "HTTP server starting"
        );

        let worker = self
            .worker
            .map(|worker| tokio::spawn(worker.run(shutdown.resubscribe())));

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                // A closed channel means every `Shutdown` handle is gone.
                match shutdown.recv().await {
                    Err(broadcast::error::RecvError::Closed) => {
                        tracing::info!("Shutdown coordinator dropped")
                    }
                    _ => tracing::info!("Shutdown signal received"),
                }
            })
            .await?;

        if let Some(worker) = worker {
            if let Err(e) = worker.await {
                tracing::error!(error = %e, "Admission queue worker failed");
            }
        }

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }
}

/// Liveness probe. Never routed, never rate limited.
async fn health_handler() -> (StatusCode, &'static str) {
    (StatusCode::OK, "OK")
}

/// Main proxy handler.
/// Looks up route and forwards request.
async fn proxy_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let start_time = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    let Some(decision) = state.router.match_route(&method, &path) else {
        tracing::warn!(method = %method, path = %path, "No route matched");
        metrics::record_request(method.as_str(), 404, "none", start_time);
        return GatewayError::NoRoute {
            method: method.to_string(),
            path,
        }
        .into_response();
    };

    tracing::info!(
        method = %method,
        path = %path,
        target = %decision.route.target,
        "Forwarding request"
    );

    let route_label = decision.route.path_prefix().to_string();
    let response = match state.forwarder.forward(request, &decision).await {
        Ok(response) => response,
        Err(e) => {
            tracing::warn!(kind = e.kind(), route = decision.route.index, "Forward failed");
            e.into_response()
        }
    };

    metrics::record_request(method.as_str(), response.status().as_u16(), &route_label, start_time);
    response
}
