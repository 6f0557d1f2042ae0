//! Iran League Exporter — Binary Entrypoint
//! Boots the Axum HTTP server and the background scrape scheduler.

use std::sync::Arc;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use ir_league_exporter::{api, config::AppConfig, metrics::Exporter, scheduler, SnapshotStore};

fn init_tracing(default_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level.to_ascii_lowercase()));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();

    let cfg = match AppConfig::from_env() {
        Ok(cfg) => cfg,
        Err(error) => {
            eprintln!("configuration error: {error:#}");
            std::process::exit(1);
        }
    };
    init_tracing(&cfg.log_level);

    let errors = cfg.validate();
    if !errors.is_empty() {
        for error in &errors {
            tracing::error!("configuration error: {error}");
        }
        std::process::exit(1);
    }

    let store = SnapshotStore::new();
    let exporter = Arc::new(Exporter::new(&cfg)?);
    let worker = scheduler::spawn(Arc::new(cfg.scrape.clone()), store.clone())?;

    let router = api::create_router(
        api::AppState {
            store,
            exporter,
        },
        &cfg.auth,
    );

    let listener =
        tokio::net::TcpListener::bind((cfg.http.host.as_str(), cfg.http.port)).await?;
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        addr = %listener.local_addr()?,
        interval_minutes = cfg.scrape.update_interval_minutes,
        "started Iran League exporter"
    );

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Abandon any in-flight scrape rather than delaying shutdown; an aborted
    // run publishes nothing.
    worker.abort();
    tracing::info!("shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(error) => {
                tracing::error!(%error, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received ctrl-c, shutting down"),
        _ = terminate => tracing::info!("received SIGTERM, shutting down"),
    }
}
