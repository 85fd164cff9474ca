//! Prometheus exporter for Lixee Zigbee energy meters.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::sync::watch;
use tracing::{Level, info};
use tracing_subscriber::EnvFilter;

use lixee_exporter_prometheus::config::LogFormat;
use lixee_exporter_prometheus::{
    ExporterConfig, HttpServer, MetricCollector, StateStore, TelemetryListener,
};

/// Prometheus exporter for Lixee Zigbee energy meters.
#[derive(Parser, Debug)]
#[command(name = "lixee-exporter-prometheus")]
#[command(about = "Export Lixee meter readings as Prometheus metrics")]
#[command(version)]
struct Args {
    /// Path to configuration file (JSON5 format).
    #[arg(short, long)]
    config: Option<String>,

    /// HTTP listen address (overrides config).
    #[arg(long)]
    listen: Option<String>,

    /// Key expression to subscribe to (overrides config).
    #[arg(long)]
    key_expr: Option<String>,

    /// Log level (trace, debug, info, warn, error; overrides config).
    #[arg(long)]
    log_level: Option<String>,
}

/// Apply CLI flags on top of the loaded configuration. Flags that were
/// not given leave the file's values in place.
fn apply_overrides(config: &mut ExporterConfig, args: Args) {
    if let Some(listen) = args.listen {
        config.prometheus.listen = listen;
    }
    if let Some(key_expr) = args.key_expr {
        config.subscription.key_expr = key_expr;
    }
    if let Some(log_level) = args.log_level {
        config.logging.level = log_level;
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Load configuration
    let mut config = if let Some(config_path) = &args.config {
        ExporterConfig::load_from_file(config_path)?
    } else {
        ExporterConfig::default()
    };

    // CLI overrides
    apply_overrides(&mut config, args);

    // Initialize logging
    let log_level = config.logging.level.parse().unwrap_or(Level::INFO);
    let filter = EnvFilter::from_default_env()
        .add_directive(format!("lixee_exporter_prometheus={}", log_level).parse()?)
        .add_directive(format!("zenoh={}", Level::WARN).parse()?);

    match config.logging.format {
        LogFormat::Json => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .json()
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::fmt().with_env_filter(filter).init();
        }
    }

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "Starting Lixee Prometheus Exporter"
    );

    // Create shutdown signal
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // The store is the only state shared between the listener and the
    // HTTP handlers; both get it by injection.
    let store = Arc::new(StateStore::new());
    let collector = Arc::new(MetricCollector::new(
        store.clone(),
        &config.prometheus.prefix,
    ));

    let listen_addr = config
        .prometheus
        .listen
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid listen address: {}", e))?;

    let listener = TelemetryListener::new(
        store.clone(),
        config.zenoh.clone(),
        config.subscription.key_expr.clone(),
        config.listener.on_decode_error,
    );
    let http_server = HttpServer::new(
        collector,
        store,
        listen_addr,
        config.prometheus.path.clone(),
    );

    let mut listener_task = tokio::spawn(listener.run(shutdown_rx.clone()));
    let mut http_task = tokio::spawn(http_server.run(shutdown_rx.clone()));

    // The listener and the HTTP server are co-terminal: a fatal error in
    // either one takes the whole process down rather than leaving scrapes
    // serving stale data forever.
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down...");
        }
        _ = async {
            #[cfg(unix)]
            {
                let mut sigterm = tokio::signal::unix::signal(
                    tokio::signal::unix::SignalKind::terminate()
                ).expect("failed to install SIGTERM handler");
                sigterm.recv().await;
            }
            #[cfg(not(unix))]
            {
                std::future::pending::<()>().await;
            }
        } => {
            info!("Received SIGTERM, shutting down...");
        }
        result = &mut listener_task => {
            return match result {
                Ok(Ok(())) => Err(anyhow::anyhow!("Meter listener stopped unexpectedly")),
                Ok(Err(e)) => Err(anyhow::Error::new(e).context("Meter listener failed")),
                Err(e) => Err(anyhow::anyhow!("Meter listener task panicked: {}", e)),
            };
        }
        result = &mut http_task => {
            return match result {
                Ok(Ok(())) => Err(anyhow::anyhow!("HTTP server stopped unexpectedly")),
                Ok(Err(e)) => Err(e.context("HTTP server failed")),
                Err(e) => Err(anyhow::anyhow!("HTTP server task panicked: {}", e)),
            };
        }
    }

    // Signal shutdown and give tasks a moment to finish
    shutdown_tx.send(true)?;

    let _ = tokio::time::timeout(Duration::from_secs(5), async {
        let _ = listener_task.await;
        let _ = http_task.await;
    })
    .await;

    info!("Exporter stopped");
    Ok(())
}
