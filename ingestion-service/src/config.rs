use serde::Deserialize;
use std::fs;

use crate::carbon::EmissionFactors;

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub uri: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    /// Timeout applied to every outbound provider call.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct EiaConfig {
    #[serde(default = "default_eia_base_url")]
    pub base_url: String,
    pub api_key: String,
    #[serde(default = "default_lookback_hours")]
    pub lookback_hours: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ErcotConfig {
    #[serde(default = "default_ercot_base_url")]
    pub base_url: String,
    #[serde(default = "default_ercot_region")]
    pub region_id: String,
}

impl Default for ErcotConfig {
    fn default() -> Self {
        Self {
            base_url: default_ercot_base_url(),
            region_id: default_ercot_region(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleConfig {
    /// Batch-source cadence (the provider publishes hourly).
    #[serde(default = "default_batch_interval_minutes")]
    pub batch_interval_minutes: u64,
    /// Realtime snapshot cadence.
    #[serde(default = "default_realtime_interval_minutes")]
    pub realtime_interval_minutes: u64,
    /// UTC hour of the daily batch pass.
    #[serde(default = "default_batch_hour")]
    pub batch_hour: u8,
    /// Lookback window used by the daily batch pass.
    #[serde(default = "default_batch_lookback_hours")]
    pub batch_lookback_hours: i64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            batch_interval_minutes: default_batch_interval_minutes(),
            realtime_interval_minutes: default_realtime_interval_minutes(),
            batch_hour: default_batch_hour(),
            batch_lookback_hours: default_batch_lookback_hours(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    pub bind_addr: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    #[serde(default)]
    pub http: HttpConfig,
    pub eia: EiaConfig,
    #[serde(default)]
    pub ercot: ErcotConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    pub metrics: Option<MetricsConfig>,
    #[serde(default)]
    pub emission_factors: EmissionFactors,
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        use std::env;

        let path =
            env::var("GRID_INGEST_CONFIG").unwrap_or_else(|_| "grid-ingest.toml".to_string());
        let contents = fs::read_to_string(&path)?;
        let cfg: AppConfig = toml::from_str(&contents)?;
        Ok(cfg)
    }
}

fn default_max_connections() -> u32 {
    8
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_eia_base_url() -> String {
    "https://api.eia.gov/v2".to_string()
}

fn default_lookback_hours() -> i64 {
    24
}

fn default_ercot_base_url() -> String {
    "https://www.ercot.com/api/1/services/read".to_string()
}

fn default_ercot_region() -> String {
    "ERCOT".to_string()
}

fn default_batch_interval_minutes() -> u64 {
    60
}

fn default_realtime_interval_minutes() -> u64 {
    5
}

fn default_batch_hour() -> u8 {
    2
}

fn default_batch_lookback_hours() -> i64 {
    72
}
