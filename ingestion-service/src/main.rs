use anyhow::Result;
use grid_ingest::{config::AppConfig, metrics_server, observability, scheduler::IngestionScheduler};
use sqlx::postgres::PgPoolOptions;

#[tokio::main]
async fn main() -> Result<()> {
    observability::init_tracing();

    // Load configuration
    let cfg = AppConfig::load()?;

    // Start metrics server if configured
    if let Some(metrics_cfg) = &cfg.metrics {
        metrics_server::init(&metrics_cfg.bind_addr);
    }

    let pool = PgPoolOptions::new()
        .max_connections(cfg.database.max_connections)
        .connect(&cfg.database.uri)
        .await?;

    let mut scheduler = IngestionScheduler::new(cfg, pool);
    scheduler.start();

    tokio::signal::ctrl_c().await?;
    scheduler.stop();

    Ok(())
}
