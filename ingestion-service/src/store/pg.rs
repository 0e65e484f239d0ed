use grid_client::domain::{GridMetrics, GridRegion};
use sqlx::{postgres::PgPool, types::Json, Postgres, QueryBuilder};
use time::OffsetDateTime;

use super::{GridStore, MetricsPatch, StoreError};

/// Postgres-backed store over the `grid_metrics` and `grid_regions` tables.
///
/// Schema is applied out-of-band via `sql/schema/*.sql`; uniqueness of
/// (region_id, timestamp_utc) is a table constraint there.
pub struct PgGridStore {
    pool: PgPool,
}

impl PgGridStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl GridStore for PgGridStore {
    async fn fetch_metrics(
        &self,
        region_id: &str,
        ts: OffsetDateTime,
    ) -> Result<Option<GridMetrics>, StoreError> {
        let row = sqlx::query_as::<_, GridMetrics>(
            r#"
            SELECT
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
            FROM grid_metrics
            WHERE region_id = $1
              AND timestamp_utc = $2
            "#,
        )
        .bind(region_id)
        .bind(ts)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    async fn insert_metrics(&self, record: &GridMetrics) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO grid_metrics (
                timestamp_utc, region_id, load_mw, forecast_load_mw,
                total_generation_mw, generation_by_fuel, net_interchange_mw,
                renewable_fraction_pct, carbon_intensity_kg_per_mwh,
                lmp_energy_price_usd_mwh, source_system
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(record.ts)
        .bind(&record.region_id)
        .bind(record.load_mw)
        .bind(record.forecast_load_mw)
        .bind(record.total_generation_mw)
        .bind(&record.generation_by_fuel)
        .bind(record.net_interchange_mw)
        .bind(record.renewable_fraction_pct)
        .bind(record.carbon_intensity_kg_per_mwh)
        .bind(record.lmp_energy_price_usd_mwh)
        .bind(&record.source_system)
        .execute(&self.pool)
        .await?;

        metrics::counter!("grid_metrics_writes_total", "op" => "insert").increment(1);
        Ok(())
    }

    async fn update_metrics(
        &self,
        region_id: &str,
        ts: OffsetDateTime,
        patch: &MetricsPatch,
    ) -> Result<(), StoreError> {
        if patch.is_empty() {
            return Ok(());
        }

        let mut builder = QueryBuilder::<Postgres>::new("UPDATE grid_metrics SET ");

        {
            let mut set = builder.separated(", ");
            if let Some(load) = patch.load_mw {
                set.push("load_mw = ");
                set.push_bind_unseparated(load);
            }
            if let Some(generation) = &patch.generation {
                set.push("total_generation_mw = ");
                set.push_bind_unseparated(generation.total_generation_mw);
                set.push("generation_by_fuel = ");
                set.push_bind_unseparated(Json(generation.generation_by_fuel.clone()));
                set.push("renewable_fraction_pct = ");
                set.push_bind_unseparated(generation.renewable_fraction_pct);
                set.push("carbon_intensity_kg_per_mwh = ");
                set.push_bind_unseparated(generation.carbon_intensity_kg_per_mwh);
            }
            if let Some(interchange) = patch.net_interchange_mw {
                set.push("net_interchange_mw = ");
                set.push_bind_unseparated(interchange);
            }
        }

        builder.push(" WHERE region_id = ");
        builder.push_bind(region_id);
        builder.push(" AND timestamp_utc = ");
        builder.push_bind(ts);

        builder.build().execute(&self.pool).await?;

        metrics::counter!("grid_metrics_writes_total", "op" => "update").increment(1);
        Ok(())
    }

    async fn upsert_metrics(&self, record: &GridMetrics) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO grid_metrics (
                timestamp_utc, region_id, load_mw, forecast_load_mw,
                total_generation_mw, generation_by_fuel, net_interchange_mw,
                renewable_fraction_pct, carbon_intensity_kg_per_mwh,
                lmp_energy_price_usd_mwh, source_system
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (region_id, timestamp_utc) DO UPDATE SET
                load_mw = EXCLUDED.load_mw,
                total_generation_mw = EXCLUDED.total_generation_mw,
                generation_by_fuel = EXCLUDED.generation_by_fuel,
                renewable_fraction_pct = EXCLUDED.renewable_fraction_pct,
                carbon_intensity_kg_per_mwh = EXCLUDED.carbon_intensity_kg_per_mwh
            "#,
        )
        .bind(record.ts)
        .bind(&record.region_id)
        .bind(record.load_mw)
        .bind(record.forecast_load_mw)
        .bind(record.total_generation_mw)
        .bind(&record.generation_by_fuel)
        .bind(record.net_interchange_mw)
        .bind(record.renewable_fraction_pct)
        .bind(record.carbon_intensity_kg_per_mwh)
        .bind(record.lmp_energy_price_usd_mwh)
        .bind(&record.source_system)
        .execute(&self.pool)
        .await?;

        metrics::counter!("grid_metrics_writes_total", "op" => "upsert").increment(1);
        Ok(())
    }

    async fn ensure_region(&self, region: &GridRegion) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO grid_regions (
                region_id, region_name, timezone, latitude, longitude,
                coverage_states, region_type
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (region_id) DO NOTHING
            "#,
        )
        .bind(&region.region_id)
        .bind(&region.region_name)
        .bind(&region.timezone)
        .bind(region.latitude)
        .bind(region.longitude)
        .bind(&region.coverage_states)
        .bind(&region.region_type)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
