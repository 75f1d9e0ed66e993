use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use ephemera_server::config::ServerConfig;
use ephemera_server::db::pool::{create_pool, run_migrations};
use ephemera_server::engine::reconciler::Reconciler;
use ephemera_server::platform::VoiceStateCache;
use ephemera_server::platform::discord::DiscordClient;
use ephemera_server::web::app_state::AppState;
use ephemera_server::web::router::build_router;

#[derive(Parser)]
#[command(name = "ephemera", about = "On-demand temporary voice channels")]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, default_value = "ephemera.toml")]
    config: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = ServerConfig::load(&cli.config).context("failed to load configuration")?;

    if config.platform.token.is_empty() {
        warn!("no bot token configured; platform calls will be rejected");
    }

    let pool = create_pool(&config.database.url)
        .await
        .context("failed to connect to database")?;
    run_migrations(&pool)
        .await
        .context("failed to run database migrations")?;

    let voice_states = Arc::new(VoiceStateCache::new());
    let platform = DiscordClient::new(
        &config.platform.api_base,
        &config.platform.token,
        config.platform.request_timeout(),
        voice_states.clone(),
    )
    .context("failed to build platform client")?;

    let reconciler = Arc::new(Reconciler::new(
        pool.clone(),
        Arc::new(platform),
        voice_states,
        config.channels.clone(),
    ));

    let (events, inbound) = mpsc::channel(config.reconciler.queue_depth.max(1));
    let cancel = CancellationToken::new();
    let reconciler_task = tokio::spawn(reconciler.run(inbound, cancel.clone()));

    let app_state = Arc::new(AppState {
        events,
        ingest_secret: config.server.ingest_secret.clone(),
    });
    let app = build_router(app_state);

    let listener = tokio::net::TcpListener::bind(&config.server.listen_address)
        .await
        .with_context(|| format!("failed to bind {}", config.server.listen_address))?;

    info!("Ephemera starting on {}", config.server.listen_address);

    let shutdown = cancel.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            shutdown.cancel();
        })
        .await
        .context("server error")?;

    // The server has stopped accepting requests; let the reconciler drain.
    cancel.cancel();
    reconciler_task.await.context("reconciler task panicked")?;
    pool.close().await;
    info!("Ephemera stopped");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to listen for SIGTERM");
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
    info!("shutdown signal received");
}
