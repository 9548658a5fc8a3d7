//! pubhub-server: WebSocket host for the pubhub broadcast hub.
//!
//! Accepts WebSocket connections, registers each peer as a subscriber, and
//! broadcasts every line read from stdin to all live subscribers.

mod channel;
mod connection;
mod protocol;
mod publisher;

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use pubhub_common::HubError;
use pubhub_config::{config_to_toml, write_config, PubhubConfig};
use pubhub_core::PublishCoordinator;
use tokio::net::TcpListener;
use tokio_tungstenite::accept_async;
use tracing_subscriber::EnvFilter;

use crate::connection::handle_connection;
use crate::publisher::run_stdin_publisher;

#[derive(Parser)]
#[command(name = "pubhub-server", about = "WebSocket broadcast hub")]
struct Args {
    /// Path to a config file (defaults to the platform config dir).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listen address, overriding `server.bind`.
    #[arg(short, long)]
    bind: Option<String>,

    /// Log filter directive, overriding `logging.filter`.
    #[arg(long)]
    log_level: Option<String>,

    /// Print the effective config as TOML and exit.
    #[arg(long)]
    print_config: bool,

    /// Write the effective config, annotated, to this path and exit.
    #[arg(long, value_name = "PATH")]
    write_config: Option<PathBuf>,
}

fn load(args: &Args) -> pubhub_common::Result<PubhubConfig> {
    let mut config = match &args.config {
        Some(path) => pubhub_config::load_from_path(path)?,
        None => pubhub_config::load_default()?,
    };
    if let Some(bind) = &args.bind {
        config.server.bind = bind.clone();
    }
    pubhub_config::validation::validate(&config)?;
    Ok(config)
}

fn init_tracing(directive: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(directive))
        .unwrap_or_else(|_| EnvFilter::new("pubhub=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> Result<(), HubError> {
    let args = Args::parse();
    let config = load(&args)?;

    if args.print_config {
        print!("{}", config_to_toml(&config));
        return Ok(());
    }
    if let Some(path) = &args.write_config {
        write_config(path, &config)?;
        println!("wrote {}", path.display());
        return Ok(());
    }

    init_tracing(args.log_level.as_deref().unwrap_or(&config.logging.filter));

    let hub = PublishCoordinator::new(&config.hub);
    let settings = Arc::new(config.server.clone());

    let listener = TcpListener::bind(&settings.bind).await?;
    tracing::info!("pubhub-server listening on {}", settings.bind);

    tokio::spawn(run_stdin_publisher(
        hub.clone(),
        config.hub.serial_publish_max_wait(),
    ));

    // Accept loop.
    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, addr)) => {
                    let hub = hub.clone();
                    let settings = Arc::clone(&settings);
                    tokio::spawn(async move {
                        match accept_async(stream).await {
                            Ok(ws) => handle_connection(ws, addr, hub, settings).await,
                            Err(e) => {
                                tracing::warn!(peer = %addr, error = %e, "WS handshake failed");
                            }
                        }
                    });
                }
                Err(e) => {
                    tracing::warn!(error = %e, "TCP accept error");
                }
            },
            _ = tokio::signal::ctrl_c() => {
                tracing::info!(subscribers = hub.subscriber_count(), "Shutting down");
                return Ok(());
            }
        }
    }
}
