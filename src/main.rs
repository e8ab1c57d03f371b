//! Confabulator - a multi-user line-oriented chat server.
//!
//! Usage: `confabulator <root>` where `<root>` is the directory holding
//! the optional `config.toml` and the SQLite database.

use confabulator::config::{Config, LogFormat};
use confabulator::db::Database;
use confabulator::network::Gateway;
use confabulator::state::Hub;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

/// Resolve the server root from CLI arguments. Supports `-r <path>`,
/// `--root <path>`, or a bare path.
fn resolve_root() -> PathBuf {
    let mut args = std::env::args().skip(1);
    let raw_path = match args.next() {
        Some(flag) if flag == "-r" || flag == "--root" => args.next().unwrap_or_else(|| {
            eprintln!("Missing path after {flag}");
            std::process::exit(1);
        }),
        Some(path) => path,
        None => {
            eprintln!("Usage: confabulator <root>");
            std::process::exit(1);
        }
    };
    PathBuf::from(raw_path)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration first (before tracing, so we can use log_format)
    let root = resolve_root();
    std::fs::create_dir_all(&root)?;

    let config = Config::load(&root).map_err(|e| {
        eprintln!("ERROR: Failed to load config from {}: {e}", root.display());
        e
    })?;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    match config.server.log_format {
        LogFormat::Json => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_target(true)
                .json()
                .init();
        }
        LogFormat::Pretty => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_target(true)
                .init();
        }
    }

    info!(root = %root.display(), "Starting Confabulator");

    let db_path = config.database_path(&root);
    let db = Database::new(&db_path.to_string_lossy()).await?;

    let hub = Arc::new(Hub::new(config.clone(), db));
    hub.load().await?;

    // SIGINT and SIGTERM both run the complete shutdown; a second signal
    // repeats it for connections that arrived in between.
    {
        let hub = Arc::clone(&hub);
        tokio::spawn(async move {
            use tokio::signal::unix::{SignalKind, signal};
            let mut sigint = match signal(SignalKind::interrupt()) {
                Ok(signal) => signal,
                Err(e) => {
                    error!(error = %e, "Failed to install SIGINT handler");
                    return;
                }
            };
            let mut sigterm = match signal(SignalKind::terminate()) {
                Ok(signal) => signal,
                Err(e) => {
                    error!(error = %e, "Failed to install SIGTERM handler");
                    return;
                }
            };
            loop {
                tokio::select! {
                    _ = sigint.recv() => info!("Received SIGINT - initiating complete shutdown"),
                    _ = sigterm.recv() => info!("Received SIGTERM - initiating complete shutdown"),
                }
                hub.run_complete_shutdown().await;
            }
        });
    }

    let gateway = Gateway::bind(config.server.listen, Arc::clone(&hub)).await?;
    gateway.run().await?;

    // Every session is done; persist the registries and leave cleanly.
    hub.save().await?;
    info!("State saved, goodbye");
    Ok(())
}
