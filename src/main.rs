//! EmberKV server entry point.
//!
//! Wires together logging, snapshot recovery, the supervisor, and the
//! shutdown signal. The CLI surface is a single optional positional
//! argument: the TCP port (default 6379).

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use emberkv::logging::HourlyLogFile;
use emberkv::server::{Server, ServerConfig};
use emberkv::storage::{snapshot, Keyspace};
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

fn parse_port() -> anyhow::Result<u16> {
    let mut args = std::env::args().skip(1);
    let port = match args.next() {
        None => emberkv::DEFAULT_PORT,
        Some(arg) => arg
            .parse()
            .with_context(|| format!("invalid port '{}'", arg))?,
    };
    if args.next().is_some() {
        anyhow::bail!("usage: emberkv [port]");
    }
    Ok(port)
}

/// Console layer plus hourly-rotated files at `logs/redis-YYYY-MM-DD-HH.log`.
/// The file writer is non-blocking: a background worker drains the queue,
/// and the returned guard flushes it on exit.
fn init_logging() -> anyhow::Result<tracing_appender::non_blocking::WorkerGuard> {
    let log_file = HourlyLogFile::new("logs", "redis").context("failed to open log file")?;
    let (file_writer, guard) = tracing_appender::non_blocking(log_file);

    tracing_subscriber::registry()
        .with(LevelFilter::INFO)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_target(false)
                .with_writer(file_writer),
        )
        .init();

    Ok(guard)
}

/// Resolves when Ctrl+C (or SIGTERM on Unix) is received.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        let mut sigterm =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let port = parse_port()?;
    let _log_guard = init_logging()?;

    info!(version = emberkv::VERSION, port = port, "EmberKV starting");

    let keyspace = Arc::new(Keyspace::new());
    match snapshot::load(&keyspace, Path::new(emberkv::SNAPSHOT_FILE)) {
        Ok(true) => info!(file = emberkv::SNAPSHOT_FILE, keys = keyspace.len(), "Snapshot loaded"),
        Ok(false) => info!("No snapshot found, starting with an empty keyspace"),
        Err(e) => error!(error = %e, "Snapshot load failed, starting with an empty keyspace"),
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("Shutdown signal received");
        let _ = shutdown_tx.send(true);
    });

    let config = ServerConfig {
        port,
        ..ServerConfig::default()
    };
    Server::new(keyspace, config).run(shutdown_rx).await?;

    info!("Goodbye");
    Ok(())
}
