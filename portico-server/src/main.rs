// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Portico: HTTP filter chain
//
//  Startup composition: config → filter registry → filter
//  instances (configured, then applied) → wait for shutdown.
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

use clap::Parser;
use portico_core::config::GatewayConfig;
use portico_plugin::manager::FilterManager;
use portico_plugin::registry::FilterRegistry;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "portico", version, about = "Portico: HTTP filter chain with async access logging")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "/etc/portico/portico.yaml")]
    config: PathBuf,

    /// Log level (overridden by RUST_LOG)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Validate the configuration, build every filter, then exit
    #[arg(long)]
    check: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // ── Tracing ──
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level)),
        )
        .with_target(false)
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "Portico starting");

    // ── Config ──
    let config = if cli.config.exists() {
        info!(path = %cli.config.display(), "Loading config file");
        GatewayConfig::load(&cli.config)?
    } else {
        info!("No config file found, using defaults");
        GatewayConfig::default()
    };

    // ── Filter registry ──
    let metrics = config
        .observability
        .prometheus
        .enabled
        .then(prometheus::Registry::new);
    let mut registry = FilterRegistry::new();
    portico_plugins::register_all_with(&mut registry, config.access_log_buffer, metrics.clone());
    info!(filters = ?registry.list(), "Filter plugins registered");

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("portico-worker")
        .build()?;

    rt.block_on(async {
        // ── Filter instances ──
        let manager = FilterManager::from_specs(&registry, &config.filters)?;
        info!(
            instances = ?manager.names(),
            buffer = config.access_log_buffer,
            "Portico is ready"
        );

        if cli.check {
            info!("Configuration check passed");
            return Ok::<(), anyhow::Error>(());
        }

        shutdown_signal().await;
        info!("Shutdown signal received, stopping...");

        if let Some(metrics) = &metrics {
            info!(
                "Access log counters at shutdown:\n{}",
                portico_observability::render_metrics(metrics)
            );
        }

        // Dropping the manager closes every record queue; writers finish
        // what is already queued on their own threads.
        drop(manager);
        info!("Portico stopped");
        Ok::<(), anyhow::Error>(())
    })
}

/// Resolves on SIGINT, or SIGTERM on unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
