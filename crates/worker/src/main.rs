//! `transit-worker` -- imports queued projects into their destination
//! namespaces.
//!
//! See [`transit_worker::config::WorkerConfig::from_env`] for the
//! environment variables it reads.

use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use transit_worker::config::WorkerConfig;
use transit_worker::importer::{self, ProjectImporter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "transit_worker=info,transit_db=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = WorkerConfig::from_env()?;

    let pool = transit_db::create_pool(&config.database_url, config.max_connections).await?;
    tracing::info!("Database connection pool created");

    transit_db::health_check(&pool).await?;
    tracing::info!("Database health check passed");

    transit_db::run_migrations(&pool).await?;
    tracing::info!("Database migrations applied");

    let cancel = CancellationToken::new();
    let shutdown = cancel.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for shutdown signal");
            return;
        }
        tracing::info!("Shutdown signal received");
        shutdown.cancel();
    });

    let importer = ProjectImporter::new(pool, config.max_create_attempts)
        .with_stale_after(config.stale_after);
    importer::run(importer, config, cancel).await;

    tracing::info!("Worker stopped");
    Ok(())
}
