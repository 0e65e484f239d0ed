pub mod pg;

#[cfg(test)]
pub mod memory;

pub use pg::PgGridStore;

use async_trait::async_trait;
use grid_client::domain::{FuelMix, GridMetrics, GridRegion};
use time::OffsetDateTime;

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// The derived generation fields always travel as one bundle: the fuel
/// breakdown and the metrics computed from it are never written
/// independently of each other.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationUpdate {
    pub total_generation_mw: f64,
    pub generation_by_fuel: FuelMix,
    pub renewable_fraction_pct: f64,
    pub carbon_intensity_kg_per_mwh: f64,
}

/// The fields an incoming draft is allowed to write over an existing record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricsPatch {
    pub load_mw: Option<f64>,
    pub generation: Option<GenerationUpdate>,
    pub net_interchange_mw: Option<f64>,
}

impl MetricsPatch {
    pub fn is_empty(&self) -> bool {
        self.load_mw.is_none() && self.generation.is_none() && self.net_interchange_mw.is_none()
    }
}

/// Field-by-field reconciliation of an incoming draft against the stored
/// record for the same (region, timestamp) key.
///
/// A draft assembled from partial endpoint coverage must never degrade
/// previously captured knowledge:
/// - load is written only when the incoming value is strictly positive;
/// - the generation bundle is written only when the incoming total
///   generation is positive;
/// - net interchange is an instantaneous reading, last value wins.
///
/// Fields whose incoming value matches what is already stored are left out
/// of the patch, so re-applying the same draft produces an empty patch. The
/// policy is independent of the storage technology and safe under repeated
/// or interleaved application.
pub fn reconcile(existing: &GridMetrics, incoming: &GridMetrics) -> MetricsPatch {
    let mut patch = MetricsPatch::default();

    if incoming.load_mw > 0.0 && incoming.load_mw != existing.load_mw {
        patch.load_mw = Some(incoming.load_mw);
    }

    if incoming.total_generation_mw > 0.0 {
        let changed = incoming.total_generation_mw != existing.total_generation_mw
            || incoming.generation_by_fuel.0 != existing.generation_by_fuel.0;
        if changed {
            patch.generation = Some(GenerationUpdate {
                total_generation_mw: incoming.total_generation_mw,
                generation_by_fuel: incoming.generation_by_fuel.0.clone(),
                renewable_fraction_pct: incoming.renewable_fraction_pct,
                carbon_intensity_kg_per_mwh: incoming.carbon_intensity_kg_per_mwh,
            });
        }
    }

    if incoming.net_interchange_mw != existing.net_interchange_mw {
        patch.net_interchange_mw = Some(incoming.net_interchange_mw);
    }

    patch
}

/// Persistence seam for the ingestion path: keyed reads, inserts and
/// selective patches over grid metric rows, plus region existence seeding.
#[async_trait]
pub trait GridStore: Send + Sync {
    async fn fetch_metrics(
        &self,
        region_id: &str,
        ts: OffsetDateTime,
    ) -> Result<Option<GridMetrics>, StoreError>;

    async fn insert_metrics(&self, record: &GridMetrics) -> Result<(), StoreError>;

    async fn update_metrics(
        &self,
        region_id: &str,
        ts: OffsetDateTime,
        patch: &MetricsPatch,
    ) -> Result<(), StoreError>;

    /// Snapshot upsert: insert, or overwrite the load and generation fields
    /// wholesale on conflict. Net interchange is left untouched on conflict
    /// because snapshot sources do not report it.
    async fn upsert_metrics(&self, record: &GridMetrics) -> Result<(), StoreError>;

    /// Insert the region if absent; existing rows are never modified.
    /// Returns true when a row was created.
    async fn ensure_region(&self, region: &GridRegion) -> Result<bool, StoreError>;
}
