//! fusion-ingress server binary.
//!
//! ```text
//!   Client ──► trace ─► request id ─► origin ─► rate limit ─► body limit
//!                                                                │
//!        ◄── response ◄── handler group ◄── router table ◄── decode ◄─┘
//!                         (telemetry recorded after every dispatched request)
//!
//!   startup:  config → logging → metrics → database → cache? → bind → serve
//! ```

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;

use fusion_ingress::config::{load_config, IngressConfig};
use fusion_ingress::lifecycle::{self, signals, DependencySequencer, Shutdown};
use fusion_ingress::observability::{logging, metrics};
use fusion_ingress::routing::{HealthCheck, RouterTable, RoutingError};

#[derive(Debug, Parser)]
#[command(name = "fusion-ingress", version, about = "Ingress layer for the interest-fusion API")]
struct Cli {
    /// TOML configuration file; environment variables override it.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listen port, overriding configuration and PORT.
    #[arg(short, long)]
    port: Option<u16>,

    /// Validate configuration and exit.
    #[arg(long)]
    check_config: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            eprintln!("failed to read .env: {e}");
        }
    }

    let cli = Cli::parse();

    let mut config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("configuration error: {e}");
            return ExitCode::FAILURE;
        }
    };
    if let Some(port) = cli.port {
        config.listener.port = port;
    }

    if cli.check_config {
        println!("configuration OK");
        return ExitCode::SUCCESS;
    }

    logging::init_logging(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "fusion-ingress starting");
    log_config(&config);

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let table = match route_table() {
        Ok(table) => table,
        Err(e) => {
            tracing::error!(error = %e, "Invalid route table");
            return ExitCode::FAILURE;
        }
    };

    let shutdown = Shutdown::new();
    signals::spawn_signal_listener(shutdown.clone());

    let sequencer = DependencySequencer::from_config(&config);
    match lifecycle::launch(config, sequencer, table, shutdown.subscribe()).await {
        Ok(()) => {
            tracing::info!("Shutdown complete");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to start the server");
            ExitCode::FAILURE
        }
    }
}

/// Feature groups are linked in by embedding crates; the binary serves the
/// liveness route alone.
fn route_table() -> Result<RouterTable, RoutingError> {
    let mut table = RouterTable::new();
    table.bind("/", Arc::new(HealthCheck))?;
    Ok(table)
}

fn log_config(config: &IngressConfig) {
    tracing::info!(
        host = %config.listener.host,
        port = config.listener.port,
        trust_forwarded_for = config.listener.trust_forwarded_for,
        allowed_origins = config.cors.allowed_origins.len(),
        rate_limit_enabled = config.rate_limit.enabled,
        rate_limit_max = config.rate_limit.max_requests,
        rate_limit_window_secs = config.rate_limit.window_secs,
        cache_enabled = config.cache.enabled,
        telemetry_enabled = config.telemetry.enabled,
        "Configuration loaded"
    );
}
