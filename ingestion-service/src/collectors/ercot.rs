use std::time::Duration;

use grid_client::domain::{FuelCategory, GridMetrics};
use serde::Deserialize;
use time::{format_description::well_known::Rfc3339, OffsetDateTime};

use crate::carbon::CarbonCalculator;
use crate::collector::{parse_period, Collector, CollectorError, RawRecord, RecordKind};
use crate::config::ErcotConfig;
use crate::store::GridStore;

pub const SOURCE_NAME: &str = "ERCOT";

/// Realtime snapshot collector for the ERCOT public read API.
///
/// Unlike the batch collector this source reports one already-complete
/// snapshot for its own region: system-wide demand plus the current fuel
/// mix. Records are stamped with the current UTC hour at fetch time so
/// transform stays deterministic.
pub struct ErcotCollector<S> {
    store: S,
    http: reqwest::Client,
    base_url: String,
    region_id: String,
    calc: CarbonCalculator,
}

impl<S: GridStore> ErcotCollector<S> {
    pub fn new(
        store: S,
        cfg: &ErcotConfig,
        timeout: Duration,
        calc: CarbonCalculator,
    ) -> Result<Self, CollectorError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CollectorError::Collect(e.to_string()))?;

        Ok(Self {
            store,
            http,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            region_id: cfg.region_id.clone(),
            calc,
        })
    }

    fn snapshot_period() -> String {
        let now = OffsetDateTime::now_utc();
        let hour = now
            .replace_minute(0)
            .and_then(|t| t.replace_second(0))
            .and_then(|t| t.replace_nanosecond(0))
            .unwrap_or(now);
        hour.format(&Rfc3339).unwrap_or_default()
    }

    async fn fetch_demand(&self, period: &str) -> Vec<RawRecord> {
        let url = format!("{}/SystemWideDemand.json", self.base_url);
        match self.fetch_json::<DemandEnvelope>(&url).await {
            Ok(payload) => payload
                .system_wide_demand
                .map(|body| {
                    vec![RawRecord {
                        kind: RecordKind::Demand,
                        source_code: self.region_id.clone(),
                        fuel_code: None,
                        value: body.demand,
                        period: period.to_string(),
                    }]
                })
                .unwrap_or_default(),
            Err(e) => {
                tracing::warn!(error = %e, "demand collection failed");
                metrics::counter!("endpoint_fetch_failures_total", "source" => SOURCE_NAME)
                    .increment(1);
                Vec::new()
            }
        }
    }

    async fn fetch_fuel_mix(&self, period: &str) -> Vec<RawRecord> {
        let url = format!("{}/FuelMix.json", self.base_url);
        match self.fetch_json::<FuelMixEnvelope>(&url).await {
            Ok(payload) => payload
                .fuel_mix
                .into_iter()
                .map(|row| RawRecord {
                    kind: RecordKind::Generation,
                    source_code: self.region_id.clone(),
                    fuel_code: Some(row.fuel_type),
                    value: row.gen_mw,
                    period: period.to_string(),
                })
                .collect(),
            Err(e) => {
                tracing::warn!(error = %e, "fuel mix collection failed");
                metrics::counter!("endpoint_fetch_failures_total", "source" => SOURCE_NAME)
                    .increment(1);
                Vec::new()
            }
        }
    }

    async fn fetch_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T, reqwest::Error> {
        self.http
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
    }
}

#[derive(Deserialize)]
struct DemandEnvelope {
    #[serde(rename = "SystemWideDemand")]
    system_wide_demand: Option<DemandBody>,
}

#[derive(Deserialize)]
struct DemandBody {
    #[serde(rename = "Demand", default)]
    demand: f64,
}

#[derive(Deserialize)]
struct FuelMixEnvelope {
    #[serde(rename = "FuelMix", default)]
    fuel_mix: Vec<FuelMixRow>,
}

#[derive(Deserialize)]
struct FuelMixRow {
    #[serde(rename = "FuelType", default)]
    fuel_type: String,
    #[serde(rename = "GenMW", default)]
    gen_mw: f64,
}

/// Snapshot feeds label fuels by display name rather than code.
fn fuel_category_from_name(name: &str) -> FuelCategory {
    let upper = name.to_ascii_uppercase();
    if upper.contains("GAS") {
        FuelCategory::NaturalGas
    } else if upper.contains("COAL") {
        FuelCategory::Coal
    } else if upper.contains("NUCLEAR") {
        FuelCategory::Nuclear
    } else if upper.contains("WIND") {
        FuelCategory::Wind
    } else if upper.contains("SOLAR") {
        FuelCategory::Solar
    } else if upper.contains("HYDRO") {
        FuelCategory::Hydro
    } else {
        FuelCategory::Other
    }
}

#[async_trait::async_trait]
impl<S: GridStore> Collector for ErcotCollector<S> {
    fn source_name(&self) -> &str {
        SOURCE_NAME
    }

    async fn collect(&self) -> Result<Vec<RawRecord>, CollectorError> {
        let period = Self::snapshot_period();

        let (demand, fuel_mix) = tokio::join!(
            self.fetch_demand(&period),
            self.fetch_fuel_mix(&period),
        );

        let mut all = demand;
        all.extend(fuel_mix);
        Ok(all)
    }

    fn transform(&self, raw: Vec<RawRecord>) -> Result<Vec<GridMetrics>, CollectorError> {
        let Some(first) = raw.first() else {
            return Ok(Vec::new());
        };
        let Some(ts) = parse_period(&first.period) else {
            tracing::warn!(period = %first.period, "could not parse snapshot period");
            return Ok(Vec::new());
        };

        let mut snapshot = GridMetrics::empty(self.region_id.clone(), ts, SOURCE_NAME);

        for record in &raw {
            match record.kind {
                RecordKind::Demand => {
                    if record.value > 0.0 {
                        snapshot.load_mw = record.value;
                    }
                }
                RecordKind::Generation => {
                    let category =
                        fuel_category_from_name(record.fuel_code.as_deref().unwrap_or(""));
                    snapshot.generation_by_fuel.add(category, record.value);
                    snapshot.total_generation_mw += record.value;
                }
                RecordKind::Interchange => {
                    snapshot.net_interchange_mw = record.value;
                }
            }
        }

        snapshot.renewable_fraction_pct = self
            .calc
            .renewable_fraction(&snapshot.generation_by_fuel, snapshot.total_generation_mw);
        snapshot.carbon_intensity_kg_per_mwh = self
            .calc
            .carbon_intensity(&snapshot.generation_by_fuel, snapshot.total_generation_mw);

        // An all-empty snapshot carries no information; skip it.
        if snapshot.load_mw > 0.0 || snapshot.total_generation_mw > 0.0 {
            Ok(vec![snapshot])
        } else {
            Ok(Vec::new())
        }
    }

    async fn load(&self, records: Vec<GridMetrics>) -> Result<usize, CollectorError> {
        let mut written = 0;
        for record in records {
            self.store.upsert_metrics(&record).await?;
            written += 1;
        }
        Ok(written)
    }
}
