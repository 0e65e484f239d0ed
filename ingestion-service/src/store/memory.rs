//! In-memory [`GridStore`] applying the same write semantics as the
//! Postgres store, for exercising load-stage behavior in tests.

use std::collections::HashMap;
use std::sync::Mutex;

use grid_client::domain::{GridMetrics, GridRegion};
use time::OffsetDateTime;

use super::{GridStore, MetricsPatch, StoreError};

#[derive(Default)]
pub struct MemoryGridStore {
    metrics: Mutex<HashMap<(String, OffsetDateTime), GridMetrics>>,
    regions: Mutex<HashMap<String, GridRegion>>,
}

impl MemoryGridStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn metrics_count(&self) -> usize {
        self.metrics.lock().unwrap().len()
    }

    pub fn region_count(&self) -> usize {
        self.regions.lock().unwrap().len()
    }

    pub fn get(&self, region_id: &str, ts: OffsetDateTime) -> Option<GridMetrics> {
        self.metrics
            .lock()
            .unwrap()
            .get(&(region_id.to_string(), ts))
            .cloned()
    }
}

#[async_trait::async_trait]
impl GridStore for MemoryGridStore {
    async fn fetch_metrics(
        &self,
        region_id: &str,
        ts: OffsetDateTime,
    ) -> Result<Option<GridMetrics>, StoreError> {
        Ok(self.get(region_id, ts))
    }

    async fn insert_metrics(&self, record: &GridMetrics) -> Result<(), StoreError> {
        self.metrics
            .lock()
            .unwrap()
            .insert((record.region_id.clone(), record.ts), record.clone());
        Ok(())
    }

    async fn update_metrics(
        &self,
        region_id: &str,
        ts: OffsetDateTime,
        patch: &MetricsPatch,
    ) -> Result<(), StoreError> {
        let mut metrics = self.metrics.lock().unwrap();
        if let Some(row) = metrics.get_mut(&(region_id.to_string(), ts)) {
            if let Some(load) = patch.load_mw {
                row.load_mw = load;
            }
            if let Some(generation) = &patch.generation {
                row.total_generation_mw = generation.total_generation_mw;
                row.generation_by_fuel.0 = generation.generation_by_fuel.clone();
                row.renewable_fraction_pct = generation.renewable_fraction_pct;
                row.carbon_intensity_kg_per_mwh = generation.carbon_intensity_kg_per_mwh;
            }
            if let Some(interchange) = patch.net_interchange_mw {
                row.net_interchange_mw = interchange;
            }
        }
        Ok(())
    }

    async fn upsert_metrics(&self, record: &GridMetrics) -> Result<(), StoreError> {
        let mut metrics = self.metrics.lock().unwrap();
        match metrics.get_mut(&(record.region_id.clone(), record.ts)) {
            Some(row) => {
                // Same conflict set as the Postgres upsert: interchange and
                // source are left alone.
                row.load_mw = record.load_mw;
                row.total_generation_mw = record.total_generation_mw;
                row.generation_by_fuel = record.generation_by_fuel.clone();
                row.renewable_fraction_pct = record.renewable_fraction_pct;
                row.carbon_intensity_kg_per_mwh = record.carbon_intensity_kg_per_mwh;
            }
            None => {
                metrics.insert((record.region_id.clone(), record.ts), record.clone());
            }
        }
        Ok(())
    }

    async fn ensure_region(&self, region: &GridRegion) -> Result<bool, StoreError> {
        let mut regions = self.regions.lock().unwrap();
        if regions.contains_key(&region.region_id) {
            return Ok(false);
        }
        regions.insert(region.region_id.clone(), region.clone());
        Ok(true)
    }
}
