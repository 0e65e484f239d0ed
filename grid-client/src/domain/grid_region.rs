use sqlx::types::Json;

/// Master entity: a canonical grid-operating area (ISO/RTO, balancing
/// authority, or state-level aggregate). Created once during registry
/// bootstrap and never deleted.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct GridRegion {
    pub region_id: String,
    pub region_name: String,
    pub timezone: String,
    pub latitude: f64,
    pub longitude: f64,
    pub coverage_states: Json<Vec<String>>,
    pub region_type: String,
}
