use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use boxoffice_api::{app, AppState};
use boxoffice_booking::{HoldExpiryReaper, JobHandle, OrphanBookingSweeper};
use boxoffice_core::lock::DistributedLock;
use boxoffice_core::{Clock, ReservationSettings, ReservationStore, SystemClock};
use boxoffice_store::app_config::{Config, StorageMode};
use boxoffice_store::{
    DbClient, MemoryLock, MemoryReservationStore, PgReservationStore, RedisClient, RedisLock,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load().context("Failed to load config")?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "boxoffice_api=debug,boxoffice_booking=debug,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Boxoffice API on port {}", config.server.port);

    let settings = config.reservation.settings();
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    match config.storage.mode {
        StorageMode::Postgres => {
            let db = DbClient::new(&config.database.url, config.database.max_connections)
                .await
                .context("Failed to connect to Postgres")?;
            db.migrate().await.context("Failed to run migrations")?;

            let redis = RedisClient::new(&config.redis.url)
                .await
                .context("Failed to create Redis client")?;
            redis.ping().await.context("Failed to reach Redis")?;
            let lock = RedisLock::new(&redis)
                .await
                .context("Failed to open Redis connection")?;

            let store = Arc::new(PgReservationStore::new(db.pool.clone()));
            serve(config.server.port, store, Arc::new(lock), clock, settings).await
        }
        StorageMode::Memory => {
            tracing::warn!("Running with in-memory storage; nothing will be persisted");
            let store = Arc::new(MemoryReservationStore::new());
            serve(config.server.port, store, Arc::new(MemoryLock::new()), clock, settings).await
        }
    }
}

async fn serve<S: ReservationStore>(
    port: u16,
    store: Arc<S>,
    lock: Arc<dyn DistributedLock>,
    clock: Arc<dyn Clock>,
    settings: ReservationSettings,
) -> anyhow::Result<()> {
    let jobs: Vec<JobHandle> = vec![
        Arc::new(HoldExpiryReaper::new(
            Arc::clone(&store),
            Arc::clone(&clock),
            settings.reaper_interval,
        ))
        .start(),
        Arc::new(OrphanBookingSweeper::new(Arc::clone(&store), settings.sweeper_interval)).start(),
    ];

    let app = app(AppState::new(store, lock, clock, settings));

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!("Listening on {}", addr);

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(async {
            shutdown_signal().await;
            tracing::info!("Shutdown signal received, starting graceful shutdown...");
        })
        .await;

    for job in &jobs {
        job.stop().await;
    }

    served.context("HTTP server failed")?;
    tracing::info!("Shutdown complete");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
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
                tracing::error!("Failed to install SIGTERM handler: {}", e);
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
