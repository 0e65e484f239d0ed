use anyhow::Result;
use sqlx::PgPool;
use time::OffsetDateTime;

use crate::domain::{GridMetrics, GridRegion};

const METRICS_COLUMNS: &str = r#"
    timestamp_utc AS ts,
    region_id,
    load_mw,
    forecast_load_mw,
    total_generation_mw,
    generation_by_fuel,
    net_interchange_mw,
    renewable_fraction_pct,
    carbon_intensity_kg_per_mwh,
    lmp_energy_price_usd_mwh,
    source_system
"#;

/// Fetch the latest-known observation for a single region.
pub async fn latest_for_region(pool: &PgPool, region_id: &str) -> Result<Option<GridMetrics>> {
    let sql = format!(
        r#"
        SELECT {METRICS_COLUMNS}
        FROM grid_metrics
        WHERE region_id = $1
        ORDER BY timestamp_utc DESC
        LIMIT 1
        "#
    );

    let row = sqlx::query_as::<_, GridMetrics>(&sql)
        .bind(region_id)
        .fetch_optional(pool)
        .await?;

    Ok(row)
}

/// Fetch a time-ordered window of observations for a single region.
pub async fn range_for_region(
    pool: &PgPool,
    region_id: &str,
    start: OffsetDateTime,
    end: OffsetDateTime,
) -> Result<Vec<GridMetrics>> {
    let sql = format!(
        r#"
        SELECT {METRICS_COLUMNS}
        FROM grid_metrics
        WHERE region_id = $1
          AND timestamp_utc >= $2
          AND timestamp_utc <  $3
        ORDER BY timestamp_utc
        "#
    );

    let rows = sqlx::query_as::<_, GridMetrics>(&sql)
        .bind(region_id)
        .bind(start)
        .bind(end)
        .fetch_all(pool)
        .await?;

    Ok(rows)
}

/// List every registered region.
pub async fn list_regions(pool: &PgPool) -> Result<Vec<GridRegion>> {
    let rows = sqlx::query_as::<_, GridRegion>(
        r#"
        SELECT
            region_id,
            region_name,
            timezone,
            latitude,
            longitude,
            coverage_states,
            region_type
        FROM grid_regions
        ORDER BY region_id
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
