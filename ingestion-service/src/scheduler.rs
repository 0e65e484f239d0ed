use std::{future::Future, pin::Pin, time::Duration};

use futures::future::join_all;
use sqlx::postgres::PgPool;
use time::OffsetDateTime;
use tokio::task::JoinHandle;

use crate::carbon::CarbonCalculator;
use crate::collector::{self, RunStatus, RunSummary};
use crate::collectors::{eia, ercot, EiaCollector, ErcotCollector};
use crate::config::AppConfig;
use crate::registry;
use crate::store::PgGridStore;

/// Drives the source collectors: recurring interval jobs plus manual
/// triggers. Collector failures only ever surface as failed summaries;
/// nothing a collector does can take the scheduler down.
pub struct IngestionScheduler {
    cfg: AppConfig,
    pool: PgPool,
    tasks: Vec<JoinHandle<()>>,
    running: bool,
}

#[derive(thiserror::Error, Debug)]
#[error("unknown source id: {0}")]
pub struct UnknownSource(pub String);

impl IngestionScheduler {
    pub fn new(cfg: AppConfig, pool: PgPool) -> Self {
        Self {
            cfg,
            pool,
            tasks: Vec::new(),
            running: false,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Spawn the recurring jobs. Idempotent; a second call is a no-op.
    pub fn start(&mut self) {
        if self.running {
            tracing::warn!("scheduler already running");
            return;
        }

        // Batch source on its hourly cadence.
        let cfg = self.cfg.clone();
        let pool = self.pool.clone();
        let every = Duration::from_secs(cfg.schedule.batch_interval_minutes * 60);
        self.tasks.push(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            loop {
                ticker.tick().await;
                let summary = run_batch_source(&cfg, &pool, None).await;
                log_summary(&summary);
            }
        }));

        // Realtime snapshot source.
        let cfg = self.cfg.clone();
        let pool = self.pool.clone();
        let every = Duration::from_secs(cfg.schedule.realtime_interval_minutes * 60);
        self.tasks.push(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            loop {
                ticker.tick().await;
                let summary = run_realtime_source(&cfg, &pool).await;
                log_summary(&summary);
            }
        }));

        // Daily batch pass with the extended lookback window.
        let cfg = self.cfg.clone();
        let pool = self.pool.clone();
        self.tasks.push(tokio::spawn(async move {
            loop {
                let wait = seconds_until_hour(OffsetDateTime::now_utc(), cfg.schedule.batch_hour);
                tokio::time::sleep(Duration::from_secs(wait)).await;
                tracing::info!("starting daily batch pass");
                let summary =
                    run_batch_source(&cfg, &pool, Some(cfg.schedule.batch_lookback_hours)).await;
                log_summary(&summary);
            }
        }));

        self.running = true;
        tracing::info!("ingestion scheduler started");
    }

    pub fn stop(&mut self) {
        if !self.running {
            return;
        }
        for task in self.tasks.drain(..) {
            task.abort();
        }
        self.running = false;
        tracing::info!("ingestion scheduler stopped");
    }

    /// Manually run a single source by id.
    pub async fn run_once(&self, source_id: &str) -> Result<RunSummary, UnknownSource> {
        match source_id.to_ascii_uppercase().as_str() {
            eia::SOURCE_NAME => Ok(run_batch_source(&self.cfg, &self.pool, None).await),
            ercot::SOURCE_NAME => Ok(run_realtime_source(&self.cfg, &self.pool).await),
            other => Err(UnknownSource(other.to_string())),
        }
    }

    /// Run every source once, concurrently.
    pub async fn run_all(&self) -> Vec<RunSummary> {
        let runs: Vec<Pin<Box<dyn Future<Output = RunSummary> + Send + '_>>> = vec![
            Box::pin(run_batch_source(&self.cfg, &self.pool, None)),
            Box::pin(run_realtime_source(&self.cfg, &self.pool)),
        ];
        join_all(runs).await
    }
}

async fn run_batch_source(
    cfg: &AppConfig,
    pool: &PgPool,
    lookback_override: Option<i64>,
) -> RunSummary {
    let store = PgGridStore::new(pool.clone());

    // Region rows must exist before metric rows can reference them.
    if let Err(e) = registry::ensure_regions_exist(&store).await {
        tracing::error!(error = %e, "region seeding failed");
    }

    let collector = match EiaCollector::new(
        store,
        &cfg.eia,
        Duration::from_secs(cfg.http.timeout_secs),
        CarbonCalculator::new(cfg.emission_factors.clone()),
    ) {
        Ok(c) => c,
        Err(e) => return RunSummary::failed(eia::SOURCE_NAME, e),
    };

    let collector = match lookback_override {
        Some(hours) => collector.with_lookback(hours),
        None => collector,
    };

    collector::run(&collector).await
}

async fn run_realtime_source(cfg: &AppConfig, pool: &PgPool) -> RunSummary {
    let store = PgGridStore::new(pool.clone());

    let collector = match ErcotCollector::new(
        store,
        &cfg.ercot,
        Duration::from_secs(cfg.http.timeout_secs),
        CarbonCalculator::new(cfg.emission_factors.clone()),
    ) {
        Ok(c) => c,
        Err(e) => return RunSummary::failed(ercot::SOURCE_NAME, e),
    };

    collector::run(&collector).await
}

fn log_summary(summary: &RunSummary) {
    match summary.status {
        RunStatus::Success => tracing::info!(
            source = %summary.source,
            records = summary.records_processed,
            "scheduled collection finished"
        ),
        RunStatus::Failed => tracing::error!(
            source = %summary.source,
            error = summary.error.as_deref().unwrap_or("unknown"),
            "scheduled collection failed"
        ),
    }
}

/// Seconds from `now` until the next occurrence of `hour:00:00` UTC.
fn seconds_until_hour(now: OffsetDateTime, hour: u8) -> u64 {
    let target = now
        .replace_hour(hour)
        .and_then(|t| t.replace_minute(0))
        .and_then(|t| t.replace_second(0))
        .and_then(|t| t.replace_nanosecond(0));

    let Ok(target) = target else {
        // Out-of-range hour; fall back to a day.
        return 24 * 60 * 60;
    };

    let target = if target > now {
        target
    } else {
        target + time::Duration::days(1)
    };

    (target - now).whole_seconds().max(1) as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn seconds_until_hour_later_today() {
        let now = datetime!(2025-01-01 00:30:00 UTC);
        assert_eq!(seconds_until_hour(now, 2), 90 * 60);
    }

    #[test]
    fn seconds_until_hour_wraps_to_tomorrow() {
        let now = datetime!(2025-01-01 03:00:00 UTC);
        assert_eq!(seconds_until_hour(now, 2), 23 * 60 * 60);
    }

    #[test]
    fn seconds_until_hour_never_schedules_now() {
        let now = datetime!(2025-01-01 02:00:00 UTC);
        assert_eq!(seconds_until_hour(now, 2), 24 * 60 * 60);
    }

    #[test]
    fn invalid_hour_falls_back_to_a_day() {
        let now = datetime!(2025-01-01 02:00:00 UTC);
        assert_eq!(seconds_until_hour(now, 99), 24 * 60 * 60);
    }
}
