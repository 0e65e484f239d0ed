use std::{collections::BTreeMap, time::Duration};

use grid_client::domain::{FuelCategory, GridMetrics};
use serde::Deserialize;
use time::{macros::format_description, OffsetDateTime};

use crate::carbon::CarbonCalculator;
use crate::collector::{parse_period, Collector, CollectorError, RawRecord, RecordKind};
use crate::config::EiaConfig;
use crate::registry;
use crate::store::{reconcile, GridStore};

pub const SOURCE_NAME: &str = "EIA";

/// Hourly balancing-authority collector for the EIA open data API.
///
/// Three independent endpoints (demand, generation by fuel, interchange)
/// are fetched over the same lookback window and reconciled into one record
/// per (region, UTC hour). Coverage differs per endpoint, so any single
/// response only ever contributes partial fields for a key.
pub struct EiaCollector<S> {
    store: S,
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    lookback_hours: i64,
    calc: CarbonCalculator,
}

impl<S: GridStore> EiaCollector<S> {
    pub fn new(
        store: S,
        cfg: &EiaConfig,
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
            api_key: cfg.api_key.clone(),
            lookback_hours: cfg.lookback_hours,
            calc,
        })
    }

    /// Widen the query window, e.g. for the daily batch pass.
    pub fn with_lookback(mut self, hours: i64) -> Self {
        self.lookback_hours = hours;
        self
    }

    fn query_window(&self) -> (String, String) {
        let end = OffsetDateTime::now_utc();
        let start = end - time::Duration::hours(self.lookback_hours);
        (format_hour(start), format_hour(end))
    }

    async fn fetch_series(&self, path: &str, extra_facets: &str, kind: RecordKind) -> Vec<RawRecord> {
        match self.fetch_series_inner(path, extra_facets, kind).await {
            Ok(records) => {
                tracing::info!(endpoint = path, records = records.len(), "collected series");
                records
            }
            Err(e) => {
                // One failed endpoint must not take down the whole pass.
                tracing::error!(endpoint = path, error = %e, "series fetch failed, contributing no records");
                metrics::counter!("endpoint_fetch_failures_total", "source" => SOURCE_NAME)
                    .increment(1);
                Vec::new()
            }
        }
    }

    async fn fetch_series_inner(
        &self,
        path: &str,
        extra_facets: &str,
        kind: RecordKind,
    ) -> Result<Vec<RawRecord>, reqwest::Error> {
        let (start, end) = self.query_window();

        // Built by hand: the API expects literal bracketed facet/sort params.
        let url = format!(
            "{base}{path}\
             ?api_key={key}\
             &frequency=hourly\
             &data[0]=value\
             {extra_facets}\
             &start={start}\
             &end={end}\
             &sort[0][column]=period\
             &sort[0][direction]=desc\
             &length=5000",
            base = self.base_url,
            key = self.api_key,
        );

        let envelope: EiaEnvelope = self
            .http
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(envelope
            .response
            .data
            .into_iter()
            .filter_map(|row| row.into_raw(kind))
            .collect())
    }
}

fn format_hour(ts: OffsetDateTime) -> String {
    let fmt = format_description!("[year]-[month]-[day]T[hour]");
    ts.format(&fmt).unwrap_or_default()
}

#[derive(Deserialize, Default)]
struct EiaEnvelope {
    #[serde(default)]
    response: EiaPayload,
}

#[derive(Deserialize, Default)]
struct EiaPayload {
    #[serde(default)]
    data: Vec<EiaSeriesRow>,
}

#[derive(Deserialize)]
struct EiaSeriesRow {
    period: Option<String>,
    respondent: Option<String>,
    #[serde(rename = "respondent-name")]
    respondent_name: Option<String>,
    fueltype: Option<String>,
    #[serde(default, deserialize_with = "value_as_f64")]
    value: Option<f64>,
}

impl EiaSeriesRow {
    fn into_raw(self, kind: RecordKind) -> Option<RawRecord> {
        // Some series omit `respondent` and only carry a "CODE - Long Name"
        // respondent-name; fall back to its prefix.
        let source_code = self.respondent.or_else(|| {
            self.respondent_name
                .as_deref()
                .and_then(|name| name.split('-').next())
                .map(|prefix| prefix.trim().to_string())
        })?;
        let period = self.period?;

        Some(RawRecord {
            kind,
            source_code,
            fuel_code: self.fueltype,
            value: self.value.unwrap_or(0.0),
            period,
        })
    }
}

/// The API serializes values inconsistently: numbers, quoted numbers, or null.
fn value_as_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Num(f64),
        Text(String),
    }

    Ok(match Option::<Raw>::deserialize(deserializer)? {
        Some(Raw::Num(v)) => Some(v),
        Some(Raw::Text(s)) => s.trim().parse().ok(),
        None => None,
    })
}

/// Provider fuel codes → fuel categories. Unrecognized codes (oil, petroleum
/// coke, batteries, pumped storage, unknown) land in Other.
fn fuel_category(code: &str) -> FuelCategory {
    match code {
        "NG" | "GAS" => FuelCategory::NaturalGas,
        "COL" => FuelCategory::Coal,
        "NUC" => FuelCategory::Nuclear,
        "WND" => FuelCategory::Wind,
        "SUN" | "SOL" => FuelCategory::Solar,
        "WAT" | "HYD" => FuelCategory::Hydro,
        _ => FuelCategory::Other,
    }
}

#[async_trait::async_trait]
impl<S: GridStore> Collector for EiaCollector<S> {
    fn source_name(&self) -> &str {
        SOURCE_NAME
    }

    async fn collect(&self) -> Result<Vec<RawRecord>, CollectorError> {
        let (demand, generation, interchange) = tokio::join!(
            self.fetch_series(
                "/electricity/rto/region-data/data/",
                "&facets[type][]=D",
                RecordKind::Demand,
            ),
            self.fetch_series(
                "/electricity/rto/fuel-type-data/data/",
                "",
                RecordKind::Generation,
            ),
            self.fetch_series(
                "/electricity/rto/interchange-data/data/",
                "",
                RecordKind::Interchange,
            ),
        );

        let mut all = demand;
        all.extend(generation);
        all.extend(interchange);
        Ok(all)
    }

    fn transform(&self, raw: Vec<RawRecord>) -> Result<Vec<GridMetrics>, CollectorError> {
        let mut grouped: BTreeMap<(String, OffsetDateTime), GridMetrics> = BTreeMap::new();

        for record in raw {
            // Codes outside the tracked set are expected, not an error.
            let Some(region_id) = registry::resolve(&record.source_code) else {
                continue;
            };
            let Some(ts) = parse_period(&record.period) else {
                tracing::warn!(period = %record.period, "could not parse period, dropping record");
                continue;
            };

            let entry = grouped
                .entry((region_id.to_string(), ts))
                .or_insert_with(|| GridMetrics::empty(region_id, ts, SOURCE_NAME));

            match record.kind {
                RecordKind::Demand => {
                    // A zero or absent reading from one endpoint must not
                    // erase a load already contributed for this key.
                    if record.value > 0.0 {
                        entry.load_mw = record.value;
                    }
                }
                RecordKind::Generation => {
                    let category = fuel_category(record.fuel_code.as_deref().unwrap_or("OTH"));
                    entry.generation_by_fuel.add(category, record.value);
                    entry.total_generation_mw += record.value;
                }
                RecordKind::Interchange => {
                    entry.net_interchange_mw = record.value;
                }
            }
        }

        let mut result = Vec::with_capacity(grouped.len());
        for (_, mut draft) in grouped {
            draft.renewable_fraction_pct = self
                .calc
                .renewable_fraction(&draft.generation_by_fuel, draft.total_generation_mw);
            draft.carbon_intensity_kg_per_mwh = self
                .calc
                .carbon_intensity(&draft.generation_by_fuel, draft.total_generation_mw);
            result.push(draft);
        }

        Ok(result)
    }

    async fn load(&self, records: Vec<GridMetrics>) -> Result<usize, CollectorError> {
        let mut written = 0;

        for record in records {
            match self.store.fetch_metrics(&record.region_id, record.ts).await? {
                Some(existing) => {
                    let patch = reconcile(&existing, &record);
                    if !patch.is_empty() {
                        self.store
                            .update_metrics(&record.region_id, record.ts, &patch)
                            .await?;
                        written += 1;
                    }
                }
                None => {
                    self.store.insert_metrics(&record).await?;
                    written += 1;
                }
            }
        }

        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryGridStore;
    use time::macros::datetime;

    fn collector() -> EiaCollector<MemoryGridStore> {
        EiaCollector::new(
            MemoryGridStore::new(),
            &EiaConfig {
                base_url: "https://api.example.gov/v2".to_string(),
                api_key: "test-key".to_string(),
                lookback_hours: 24,
            },
            Duration::from_secs(30),
            CarbonCalculator::default(),
        )
        .unwrap()
    }

    fn raw(kind: RecordKind, code: &str, fuel: Option<&str>, value: f64, period: &str) -> RawRecord {
        RawRecord {
            kind,
            source_code: code.to_string(),
            fuel_code: fuel.map(|f| f.to_string()),
            value,
            period: period.to_string(),
        }
    }

    #[test]
    fn fuel_codes_map_onto_fixed_categories() {
        assert_eq!(fuel_category("NG"), FuelCategory::NaturalGas);
        assert_eq!(fuel_category("GAS"), FuelCategory::NaturalGas);
        assert_eq!(fuel_category("COL"), FuelCategory::Coal);
        assert_eq!(fuel_category("NUC"), FuelCategory::Nuclear);
        assert_eq!(fuel_category("WND"), FuelCategory::Wind);
        assert_eq!(fuel_category("SUN"), FuelCategory::Solar);
        assert_eq!(fuel_category("WAT"), FuelCategory::Hydro);
        assert_eq!(fuel_category("BAT"), FuelCategory::Other);
        assert_eq!(fuel_category("PS"), FuelCategory::Other);
        assert_eq!(fuel_category("whatever"), FuelCategory::Other);
    }

    #[test]
    fn quoted_and_numeric_values_both_deserialize() {
        let row: EiaSeriesRow =
            serde_json::from_str(r#"{"period": "2025-01-01T10", "respondent": "ERCO", "value": "123.4"}"#)
                .unwrap();
        assert_eq!(row.value, Some(123.4));

        let row: EiaSeriesRow =
            serde_json::from_str(r#"{"period": "2025-01-01T10", "respondent": "ERCO", "value": 55}"#)
                .unwrap();
        assert_eq!(row.value, Some(55.0));

        let row: EiaSeriesRow =
            serde_json::from_str(r#"{"period": "2025-01-01T10", "respondent": "ERCO", "value": null}"#)
                .unwrap();
        assert_eq!(row.value, None);
    }

    #[test]
    fn respondent_name_prefix_is_the_fallback_code() {
        let row: EiaSeriesRow = serde_json::from_str(
            r#"{"period": "2025-01-01T10", "respondent-name": "ERCO - Electric Reliability Council", "value": 1.0}"#,
        )
        .unwrap();
        let raw = row.into_raw(RecordKind::Demand).unwrap();
        assert_eq!(raw.source_code, "ERCO");
    }

    #[test]
    fn transform_reconciles_partial_records_into_one_per_key() {
        let c = collector();
        let records = c
            .transform(vec![
                raw(RecordKind::Demand, "ERCO", None, 1000.0, "2025-01-01T10"),
                raw(RecordKind::Generation, "ERCO", Some("WND"), 400.0, "2025-01-01T10"),
                raw(RecordKind::Generation, "ERCO", Some("NG"), 600.0, "2025-01-01T10"),
            ])
            .unwrap();

        assert_eq!(records.len(), 1);
        let m = &records[0];
        assert_eq!(m.region_id, "ERCOT");
        assert_eq!(m.ts, datetime!(2025-01-01 10:00:00 UTC));
        assert_eq!(m.load_mw, 1000.0);
        assert_eq!(m.generation_by_fuel.wind_mw, 400.0);
        assert_eq!(m.generation_by_fuel.natural_gas_mw, 600.0);
        assert_eq!(m.total_generation_mw, 1000.0);
        assert_eq!(m.renewable_fraction_pct, 40.0);
        // (400*11 + 600*410) / 1000
        assert_eq!(m.carbon_intensity_kg_per_mwh, 250.4);
    }

    #[test]
    fn alias_codes_attribute_to_the_parent_region() {
        let c = collector();
        let records = c
            .transform(vec![raw(
                RecordKind::Generation,
                "BANC",
                Some("SUN"),
                120.0,
                "2025-01-01T10",
            )])
            .unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].region_id, "CAISO");
    }

    #[test]
    fn unmapped_codes_and_bad_periods_are_dropped() {
        let c = collector();
        let records = c
            .transform(vec![
                raw(RecordKind::Demand, "ZZZZ", None, 1000.0, "2025-01-01T10"),
                raw(RecordKind::Demand, "ERCO", None, 1000.0, "not-a-period"),
            ])
            .unwrap();

        assert!(records.is_empty());
    }

    #[test]
    fn zero_demand_does_not_erase_a_positive_demand_in_the_same_pass() {
        let c = collector();
        let records = c
            .transform(vec![
                raw(RecordKind::Demand, "ERCO", None, 1000.0, "2025-01-01T10"),
                raw(RecordKind::Demand, "ERCO", None, 0.0, "2025-01-01T10"),
            ])
            .unwrap();

        assert_eq!(records[0].load_mw, 1000.0);
    }

    #[test]
    fn keys_differing_in_region_or_hour_stay_separate() {
        let c = collector();
        let records = c
            .transform(vec![
                raw(RecordKind::Demand, "ERCO", None, 1000.0, "2025-01-01T10"),
                raw(RecordKind::Demand, "ERCO", None, 900.0, "2025-01-01T11"),
                raw(RecordKind::Demand, "CISO", None, 800.0, "2025-01-01T10"),
            ])
            .unwrap();

        assert_eq!(records.len(), 3);
    }

    #[tokio::test]
    async fn load_inserts_then_selectively_merges() {
        let c = collector();
        let ts = datetime!(2025-01-01 10:00:00 UTC);

        let first = c
            .transform(vec![
                raw(RecordKind::Demand, "ERCO", None, 1000.0, "2025-01-01T10"),
                raw(RecordKind::Generation, "ERCO", Some("WND"), 400.0, "2025-01-01T10"),
                raw(RecordKind::Generation, "ERCO", Some("NG"), 600.0, "2025-01-01T10"),
            ])
            .unwrap();
        assert_eq!(c.load(first).await.unwrap(), 1);

        // Second batch: only an interchange value and a zero demand.
        let second = c
            .transform(vec![
                raw(RecordKind::Interchange, "ERCO", None, -200.0, "2025-01-01T10"),
                raw(RecordKind::Demand, "ERCO", None, 0.0, "2025-01-01T10"),
            ])
            .unwrap();
        assert_eq!(c.load(second).await.unwrap(), 1);

        let stored = c.store.get("ERCOT", ts).unwrap();
        assert_eq!(stored.load_mw, 1000.0);
        assert_eq!(stored.generation_by_fuel.wind_mw, 400.0);
        assert_eq!(stored.generation_by_fuel.natural_gas_mw, 600.0);
        assert_eq!(stored.total_generation_mw, 1000.0);
        assert_eq!(stored.net_interchange_mw, -200.0);
    }

    #[tokio::test]
    async fn loading_the_same_batch_twice_is_idempotent() {
        let c = collector();
        let ts = datetime!(2025-01-01 10:00:00 UTC);
        let batch = vec![
            raw(RecordKind::Demand, "ERCO", None, 1000.0, "2025-01-01T10"),
            raw(RecordKind::Generation, "ERCO", Some("WND"), 400.0, "2025-01-01T10"),
            raw(RecordKind::Interchange, "ERCO", None, -50.0, "2025-01-01T10"),
        ];

        let drafts = c.transform(batch.clone()).unwrap();
        c.load(drafts).await.unwrap();
        let after_first = c.store.get("ERCOT", ts).unwrap();

        let drafts = c.transform(batch).unwrap();
        let rewritten = c.load(drafts).await.unwrap();
        let after_second = c.store.get("ERCOT", ts).unwrap();

        // Nothing meaningfully new: no row is touched the second time.
        assert_eq!(rewritten, 0);
        assert_eq!(after_second.load_mw, after_first.load_mw);
        assert_eq!(after_second.generation_by_fuel.0, after_first.generation_by_fuel.0);
        assert_eq!(after_second.net_interchange_mw, after_first.net_interchange_mw);
        assert_eq!(
            after_second.carbon_intensity_kg_per_mwh,
            after_first.carbon_intensity_kg_per_mwh
        );
    }
}
