use anyhow::Context;
use clap::Parser;
use std::net::SocketAddr;
use tokio::sync::watch;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use waxwing_core::Database;
use waxwing_server::infra::{app_state::AppState, config::Config};
use waxwing_server::{routes, runtime};

/// Command line arguments for the Waxwing server
#[derive(Parser, Debug)]
#[command(name = "waxwing-server")]
#[command(about = "Scrobble ingestion server with MusicBrainz catalog enrichment")]
struct Args {
    /// Server port (overrides config)
    #[arg(short, long)]
    port: Option<u16>,

    /// Server host (overrides config)
    #[arg(long)]
    host: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = Config::from_env()?;
    if let Some(port) = args.port {
        config.server_port = port;
    }
    if let Some(host) = args.host {
        config.server_host = host;
    }

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=warn,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        host = %config.server_host,
        port = config.server_port,
        poll_interval_ms = config.playback.poll_interval_ms,
        recently_played_interval_ms = config.reconciler.interval_ms,
        job_delay_ms = config.worker.job_delay_ms,
        "configuration loaded"
    );

    let db = Database::connect(&config.database_url, config.queue.clone())
        .await
        .context("database connection failed")?;
    db.migrate().await.context("migrations failed")?;

    let state = AppState::new(config.clone(), db)?;

    // Background loops share one shutdown flag and drain when it flips.
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let loops = runtime::spawn_loops(state.clone(), shutdown_rx);

    let app = routes::create_api_router(state.clone())
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("{}:{}", config.server_host, config.server_port)
        .parse()
        .context("invalid server address")?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, "server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown_tx))
        .await
        .context("server error")?;

    for handle in loops {
        if let Err(e) = handle.await {
            error!(error = %e, "background task panicked");
        }
    }
    info!("shutdown complete");
    Ok(())
}

/// Resolve on SIGINT or SIGTERM and flip the shared shutdown flag so the
/// background loops drain while the HTTP server stops accepting work.
async fn shutdown_signal(shutdown_tx: watch::Sender<bool>) {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("shutdown signal received, draining");
    let _ = shutdown_tx.send(true);
}
