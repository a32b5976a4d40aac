use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use tokio::signal;
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::EnvFilter;

use floodgate::config::FloodgateConfig;
use floodgate::ratelimit::{EvictionSweeper, LimiterRegistry, SystemClock};
use floodgate::wire::{DecisionServer, DecisionService};

/// Fixed-window rate limiting decision service.
#[derive(Debug, Parser)]
#[command(name = "floodgate", version, about)]
struct Args {
    /// YAML configuration file
    #[arg(short, long, env = "FLOODGATE_CONFIG")]
    config: Option<PathBuf>,

    /// Override the listen address from the configuration
    #[arg(short, long)]
    listen: Option<SocketAddr>,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.log_format);

    info!("Starting Floodgate rate limiting service");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let mut config = FloodgateConfig::load(args.config.as_deref())?;
    if let Some(listen) = args.listen {
        config.server.listen_addr = listen;
    }
    info!(listen_addr = %config.server.listen_addr, "Configuration loaded");

    // Refuse to start with a broken limiter
    let registry = Arc::new(LimiterRegistry::from_settings(&config.limiters)?);
    let clock = Arc::new(SystemClock);
    info!(limiters = ?registry.names(), "Limiters initialized");

    let (stop_sweeper, sweeper_shutdown) = watch::channel(false);
    let sweeper = EvictionSweeper::new(
        registry.clone(),
        clock.clone(),
        config.server.sweep_interval(),
    )
    .spawn(sweeper_shutdown);

    let service = Arc::new(DecisionService::new(registry, clock));
    let server = DecisionServer::new(config.server.listen_addr, service);

    server.serve_with_shutdown(shutdown_signal()).await?;

    let _ = stop_sweeper.send(true);
    sweeper.await?;

    info!("Floodgate rate limiting service stopped");
    Ok(())
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(true);

    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

/// Wait for a shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
