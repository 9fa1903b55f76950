//! RoomQ Audio Player (roomq-ap) - Main entry point
//!
//! Wires the yt-dlp resolver, the simulated transport and the event-backed
//! presenter into a [`PlaybackOrchestrator`] and serves the control API.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use roomq_common::event_log::EventLog;
use roomq_common::events::EventBus;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use roomq_ap::adapters::{EventNotifier, EventPresenter, SimulatedTransport, YtDlp};
use roomq_ap::api;
use roomq_ap::config::Config;
use roomq_ap::playback::PlaybackOrchestrator;
use roomq_ap::services::Services;

/// Command-line arguments for roomq-ap
#[derive(Parser, Debug)]
#[command(name = "roomq-ap")]
#[command(about = "Per-room playback queue service for RoomQ")]
#[command(version)]
struct Args {
    /// Path to the TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port to listen on (overrides the config file)
    #[arg(short, long, env = "ROOMQ_PORT")]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Config is read before tracing so [logging] can set the default filter
    let (config, config_path) =
        Config::load(args.config.as_deref()).context("Failed to load configuration")?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.filter().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    match &config_path {
        Some(path) => info!("Loaded configuration from {}", path.display()),
        None => info!("No configuration file found, using defaults"),
    }

    let port = args.port.unwrap_or(config.server.port);
    info!("Starting RoomQ Audio Player on port {}", port);

    let events = Arc::new(EventBus::new(config.server.event_capacity));
    let event_log = Arc::new(match config.event_log.resolved_path() {
        Some(path) => {
            info!("Event log: {}", path.display());
            EventLog::new(path)
        }
        None => {
            info!("Event log disabled");
            EventLog::disabled()
        }
    });

    let ytdlp = Arc::new(YtDlp::new(config.resolver.clone()));
    let services = Services {
        resolver: ytdlp.clone(),
        catalog: ytdlp,
        transport: Arc::new(SimulatedTransport::new(
            config.transport.simulated_track_length(),
        )),
        presenter: Arc::new(EventPresenter::new(events.clone())),
        notifier: Arc::new(EventNotifier::new(events.clone())),
        event_log: event_log.clone(),
        events: events.clone(),
    };

    let orchestrator = PlaybackOrchestrator::new(services, config.playback.clone());
    info!("Playback orchestrator initialized");

    let app = api::create_router(api::AppState {
        orchestrator,
        events,
        event_log,
        port,
    });

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
