//! API Gateway
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────────▶ request id ─▶ access log ─▶ admission ─▶ routing ─▶ forward ─▶ Backend
//!                                                  │             │           │
//!                                             429 / 503         404         502
//!     Client Response
//!     ◀────────────── relayed backend response, or error envelope
//!
//!     /health ─▶ 200 "OK" (no admission, no routing)
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use api_gateway::config::{load_config, load_route_table, validation, ConfigError, GatewayConfig};
use api_gateway::observability::{logging, metrics};
use api_gateway::{HttpServer, Shutdown};

#[derive(Parser)]
#[command(name = "api-gateway")]
#[command(about = "Lightweight API gateway with ordered prefix routing and admission control", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "gateway.toml")]
    config: PathBuf,

    /// Override the listener bind address.
    #[arg(short, long)]
    bind: Option<String>,

    /// Load routes from this JSON route table instead of the config file.
    #[arg(short, long)]
    routes: Option<PathBuf>,
}

fn load(cli: &Cli) -> Result<GatewayConfig, ConfigError> {
    let mut config = load_config(&cli.config)?;

    if let Some(path) = &cli.routes {
        config.routes = load_route_table(path)?;
        config.route_table = Some(path.clone());
    }
    if let Some(bind) = &cli.bind {
        config.listener.bind_address = bind.clone();
    }

    validation::validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match load(&cli) {
        Ok(config) => config,
        Err(e) => {
            logging::init_tracing("info");
            tracing::error!(path = %cli.config.display(), error = %e, "Failed to load configuration");
            return Err(e.into());
        }
    };

    logging::init_tracing(&config.observability.log_level);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "api-gateway starting");

    tracing::info!(
        bind_address = %config.listener.bind_address,
        routes = config.routes.len(),
        admission = %config.admission.policy,
        "Configuration loaded"
    );
    if config.routes.is_empty() {
        tracing::warn!("Route table is empty; every routed request will answer 404");
    }
    validation::warn_suspicious_routes(&config.routes);

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => {
                if let Err(e) = metrics::init_metrics(addr) {
                    tracing::error!(error = %e, "Failed to start metrics endpoint");
                }
            }
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    let server = HttpServer::new(config)?;

    let shutdown = Shutdown::new();
    shutdown.trigger_on_signal();
    server.run(listener, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
