use sqlx::types::Json;
use time::OffsetDateTime;

use crate::domain::FuelMix;

/// One normalized grid observation, keyed by (region_id, ts).
///
/// `ts` is UTC and hour-aligned. Uniqueness of the key is enforced by the
/// storage layer; the ingestion path only ever inserts a missing key or
/// selectively patches an existing one.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct GridMetrics {
    pub ts: OffsetDateTime,
    pub region_id: String,
    pub load_mw: f64,
    pub forecast_load_mw: Option<f64>,
    pub total_generation_mw: f64,
    pub generation_by_fuel: Json<FuelMix>,
    pub net_interchange_mw: f64,
    pub renewable_fraction_pct: f64,
    pub carbon_intensity_kg_per_mwh: f64,
    pub lmp_energy_price_usd_mwh: Option<f64>,
    pub source_system: Option<String>,
}

impl GridMetrics {
    /// A zeroed draft for the given key, used as the grouping accumulator
    /// during transform.
    pub fn empty(region_id: impl Into<String>, ts: OffsetDateTime, source: &str) -> Self {
        Self {
            ts,
            region_id: region_id.into(),
            load_mw: 0.0,
            forecast_load_mw: None,
            total_generation_mw: 0.0,
            generation_by_fuel: Json(FuelMix::default()),
            net_interchange_mw: 0.0,
            renewable_fraction_pct: 0.0,
            carbon_intensity_kg_per_mwh: 0.0,
            lmp_energy_price_usd_mwh: None,
            source_system: Some(source.to_string()),
        }
    }
}
