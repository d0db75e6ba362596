//! relay-proxy entry point.
//!
//! Wires the subsystems together: configuration, backend pool, selection
//! strategy, health monitor, admin API, and the public HTTP server.

use clap::Parser;
use tokio::net::TcpListener;
use tracing::info;

use relay_proxy::config;
use relay_proxy::health::HealthMonitor;
use relay_proxy::http::HttpServer;
use relay_proxy::lifecycle::Shutdown;
use relay_proxy::observability::{logging, metrics};
use relay_proxy::{admin, ProxyConfig};

#[derive(Parser)]
#[command(name = "relay-proxy")]
#[command(about = "HTTP load balancing reverse proxy", long_about = None)]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "config.toml")]
    config: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config: ProxyConfig = config::load(&args.config)?;

    logging::init(&config.observability);

    info!(
        config = %args.config,
        strategy = ?config.strategy,
        backends = config.backends.len(),
        "relay-proxy starting"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let shutdown = Shutdown::new();

    let server = HttpServer::new(config.clone());
    let pool = server.pool();

    let monitor = HealthMonitor::new(pool.clone(), config.health_check.clone());
    let monitor_shutdown = shutdown.subscribe();
    tokio::spawn(async move {
        monitor.run(monitor_shutdown).await;
    });

    if config.admin.enabled {
        let admin_pool = pool.clone();
        let admin_config = config.admin.clone();
        let admin_shutdown = shutdown.subscribe();
        tokio::spawn(async move {
            if let Err(e) = admin::serve(admin_pool, admin_config, admin_shutdown).await {
                tracing::error!(error = %e, "Admin API server error");
            }
        });
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    let server_shutdown = shutdown.subscribe();

    let signals = tokio::spawn(async move {
        shutdown.listen_for_signals().await;
    });

    server.run(listener, server_shutdown).await?;
    signals.abort();

    info!("Shutdown complete");
    Ok(())
}
