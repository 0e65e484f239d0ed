use grid_client::domain::GridMetrics;
use time::{
    format_description::well_known::Rfc3339, macros::format_description, Date, OffsetDateTime,
    UtcOffset,
};

/// What a fetched data point describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Demand,
    Generation,
    Interchange,
}

/// One fetched provider data point, before normalization. Lives only within
/// a single collector invocation and is discarded after transform.
#[derive(Debug, Clone)]
pub struct RawRecord {
    pub kind: RecordKind,
    /// Provider-specific source code (balancing authority, utility, ...).
    pub source_code: String,
    pub fuel_code: Option<String>,
    pub value: f64,
    pub period: String,
}

#[derive(thiserror::Error, Debug)]
pub enum CollectorError {
    #[error("collect error: {0}")]
    Collect(String),
    #[error("transform error: {0}")]
    Transform(String),
    #[error("load error: {0}")]
    Load(String),
}

impl From<crate::store::StoreError> for CollectorError {
    fn from(e: crate::store::StoreError) -> Self {
        CollectorError::Load(e.to_string())
    }
}

/// The three-stage ingestion contract every source-specific collector
/// implements. Orchestration lives in [`run`], not in the trait.
#[async_trait::async_trait]
pub trait Collector: Send + Sync {
    fn source_name(&self) -> &str;

    /// Network retrieval. Failures of individual upstream calls are absorbed
    /// inside the implementation (logged, contributing no records); an `Err`
    /// here means the collection attempt as a whole is unusable.
    async fn collect(&self) -> Result<Vec<RawRecord>, CollectorError>;

    /// Pure and deterministic; no I/O, never suspends.
    fn transform(&self, raw: Vec<RawRecord>) -> Result<Vec<GridMetrics>, CollectorError>;

    /// Persist drafts through the store. Returns the number of records
    /// inserted or updated.
    async fn load(&self, records: Vec<GridMetrics>) -> Result<usize, CollectorError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Success,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Success => "success",
            RunStatus::Failed => "failed",
        }
    }
}

/// Uniform report returned to whichever driver invoked the run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub source: String,
    pub started_at: OffsetDateTime,
    pub completed_at: OffsetDateTime,
    pub status: RunStatus,
    pub records_processed: usize,
    pub error: Option<String>,
}

impl RunSummary {
    /// A failed summary for runs that never reached the pipeline (e.g. the
    /// collector could not be constructed).
    pub fn failed(source: &str, error: impl std::fmt::Display) -> Self {
        let now = OffsetDateTime::now_utc();
        Self {
            source: source.to_string(),
            started_at: now,
            completed_at: now,
            status: RunStatus::Failed,
            records_processed: 0,
            error: Some(error.to_string()),
        }
    }
}

/// Execute collect → transform → load and report.
///
/// Any stage error becomes a failed summary; this function never returns an
/// error to the caller.
pub async fn run(collector: &dyn Collector) -> RunSummary {
    let source = collector.source_name().to_string();
    let started_at = OffsetDateTime::now_utc();

    tracing::info!(source = %source, "starting collection");
    metrics::counter!("collector_runs_total", "source" => source.clone()).increment(1);

    let outcome: Result<usize, CollectorError> = async {
        let raw = collector.collect().await?;
        tracing::info!(source = %source, records = raw.len(), "collected raw records");

        let drafts = collector.transform(raw)?;
        tracing::info!(source = %source, records = drafts.len(), "transformed records");

        collector.load(drafts).await
    }
    .await;

    let completed_at = OffsetDateTime::now_utc();
    metrics::histogram!("collector_run_duration_seconds", "source" => source.clone())
        .record((completed_at - started_at).as_seconds_f64());

    match outcome {
        Ok(count) => {
            metrics::counter!("records_loaded_total", "source" => source.clone())
                .increment(count as u64);
            tracing::info!(source = %source, records = count, "collection finished");
            RunSummary {
                source,
                started_at,
                completed_at,
                status: RunStatus::Success,
                records_processed: count,
                error: None,
            }
        }
        Err(e) => {
            metrics::counter!("collector_run_failures_total", "source" => source.clone())
                .increment(1);
            tracing::error!(source = %source, error = %e, "collection failed");
            RunSummary {
                source,
                started_at,
                completed_at,
                status: RunStatus::Failed,
                records_processed: 0,
                error: Some(e.to_string()),
            }
        }
    }
}

/// Parse a provider period into a UTC hour-aligned timestamp.
///
/// Hourly feeds truncate to "2025-11-28T22"; other feeds send full RFC 3339
/// timestamps, which are normalized to the containing hour.
pub fn parse_period(period: &str) -> Option<OffsetDateTime> {
    const TRUNCATED_HOURLY_LEN: usize = 13; // "YYYY-MM-DDTHH"

    if period.len() == TRUNCATED_HOURLY_LEN {
        let (date_part, hour_part) = period.split_once('T')?;
        let date = Date::parse(date_part, format_description!("[year]-[month]-[day]")).ok()?;
        let hour: u8 = hour_part.parse().ok()?;
        return date.with_hms(hour, 0, 0).ok().map(|dt| dt.assume_utc());
    }

    let parsed = OffsetDateTime::parse(period, &Rfc3339).ok()?;
    parsed
        .to_offset(UtcOffset::UTC)
        .replace_minute(0)
        .ok()?
        .replace_second(0)
        .ok()?
        .replace_nanosecond(0)
        .ok()
}
