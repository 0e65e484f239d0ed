//! Static mapping from provider balancing-authority codes to canonical
//! regions, plus the idempotent region-seeding pass.

use std::collections::HashMap;

use grid_client::domain::GridRegion;
use once_cell::sync::Lazy;
use sqlx::types::Json;

use crate::store::{GridStore, StoreError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionClass {
    /// Interconnection / system operator (ISO, RTO).
    Iso,
    /// Standalone balancing authority.
    BalancingAuthority,
    /// State-level aggregate.
    State,
}

impl RegionClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            RegionClass::Iso => "ISO",
            RegionClass::BalancingAuthority => "BA",
            RegionClass::State => "STATE",
        }
    }
}

/// Full descriptive metadata for a canonical region.
#[derive(Debug, Clone, Copy)]
pub struct RegionSpec {
    pub region_id: &'static str,
    pub name: &'static str,
    pub timezone: &'static str,
    pub latitude: f64,
    pub longitude: f64,
    pub states: &'static [&'static str],
    pub class: RegionClass,
}

impl RegionSpec {
    pub fn to_region(&self) -> GridRegion {
        GridRegion {
            region_id: self.region_id.to_string(),
            region_name: self.name.to_string(),
            timezone: self.timezone.to_string(),
            latitude: self.latitude,
            longitude: self.longitude,
            coverage_states: Json(self.states.iter().map(|s| s.to_string()).collect()),
            region_type: self.class.as_str().to_string(),
        }
    }
}

/// A provider source code either names a canonical region outright (primary,
/// with full metadata) or folds a utility-level code up into its parent
/// region (alias, resolution-only — aliases never become region rows).
#[derive(Debug, Clone, Copy)]
pub enum SourceMapping {
    Primary(RegionSpec),
    Alias(&'static str),
}

const fn alias(region_id: &'static str) -> SourceMapping {
    SourceMapping::Alias(region_id)
}

/// Balancing-authority code table. Demand data arrives under the main
/// ISO/RTO codes; generation data is frequently reported per member utility.
pub static SOURCE_CODES: &[(&str, SourceMapping)] = &[
    // Main ISO/RTO codes
    (
        "ERCO",
        SourceMapping::Primary(RegionSpec {
            region_id: "ERCOT",
            name: "Electric Reliability Council of Texas",
            timezone: "US/Central",
            latitude: 31.0,
            longitude: -99.0,
            states: &["TX"],
            class: RegionClass::Iso,
        }),
    ),
    (
        "CISO",
        SourceMapping::Primary(RegionSpec {
            region_id: "CAISO",
            name: "California ISO",
            timezone: "US/Pacific",
            latitude: 37.0,
            longitude: -120.0,
            states: &["CA"],
            class: RegionClass::Iso,
        }),
    ),
    (
        "PJM",
        SourceMapping::Primary(RegionSpec {
            region_id: "PJM",
            name: "PJM Interconnection",
            timezone: "US/Eastern",
            latitude: 40.0,
            longitude: -77.0,
            states: &["PA", "NJ", "MD", "DE", "VA", "WV", "OH", "DC"],
            class: RegionClass::Iso,
        }),
    ),
    (
        "NYIS",
        SourceMapping::Primary(RegionSpec {
            region_id: "NYISO",
            name: "New York ISO",
            timezone: "US/Eastern",
            latitude: 42.0,
            longitude: -75.0,
            states: &["NY"],
            class: RegionClass::Iso,
        }),
    ),
    (
        "ISNE",
        SourceMapping::Primary(RegionSpec {
            region_id: "ISONE",
            name: "ISO New England",
            timezone: "US/Eastern",
            latitude: 42.0,
            longitude: -71.0,
            states: &["MA", "CT", "RI", "NH", "VT", "ME"],
            class: RegionClass::Iso,
        }),
    ),
    (
        "MISO",
        SourceMapping::Primary(RegionSpec {
            region_id: "MISO",
            name: "Midcontinent ISO",
            timezone: "US/Central",
            latitude: 41.0,
            longitude: -89.0,
            states: &["IL", "IN", "MI", "MN", "WI", "IA", "MO", "AR", "LA", "MS"],
            class: RegionClass::Iso,
        }),
    ),
    (
        "SWPP",
        SourceMapping::Primary(RegionSpec {
            region_id: "SPP",
            name: "Southwest Power Pool",
            timezone: "US/Central",
            latitude: 35.0,
            longitude: -98.0,
            states: &["OK", "KS", "NE", "SD", "ND"],
            class: RegionClass::Iso,
        }),
    ),
    // ERCOT utilities
    ("ERCOT", alias("ERCOT")),
    // CAISO utilities
    ("BANC", alias("CAISO")),
    ("LDWP", alias("CAISO")),
    ("TIDC", alias("CAISO")),
    ("IID", alias("CAISO")),
    ("WALC", alias("CAISO")),
    ("AZPS", alias("CAISO")),
    // PJM utilities
    ("AEP", alias("PJM")),
    ("AP", alias("PJM")),
    ("ATSI", alias("PJM")),
    ("BC", alias("PJM")),
    ("CE", alias("PJM")),
    ("DAY", alias("PJM")),
    ("DEOK", alias("PJM")),
    ("DOM", alias("PJM")),
    ("DPL", alias("PJM")),
    ("DUK", alias("PJM")),
    ("EKPC", alias("PJM")),
    ("JC", alias("PJM")),
    ("ME", alias("PJM")),
    ("PE", alias("PJM")),
    ("PEP", alias("PJM")),
    ("PL", alias("PJM")),
    ("PN", alias("PJM")),
    ("PS", alias("PJM")),
    ("RECO", alias("PJM")),
    ("UGI", alias("PJM")),
    // NYISO utilities
    ("NYISO", alias("NYISO")),
    // ISONE utilities
    ("ISONE", alias("ISONE")),
    // MISO utilities
    ("AMIL", alias("MISO")),
    ("AMMO", alias("MISO")),
    ("BREC", alias("MISO")),
    ("CIN", alias("MISO")),
    ("CLEC", alias("MISO")),
    ("CWEP", alias("MISO")),
    ("CWLP", alias("MISO")),
    ("DECO", alias("MISO")),
    ("EAI", alias("MISO")),
    ("EES", alias("MISO")),
    ("EMBA", alias("MISO")),
    ("GRE", alias("MISO")),
    ("HE", alias("MISO")),
    ("LAFA", alias("MISO")),
    ("LAGN", alias("MISO")),
    ("LEPA", alias("MISO")),
    ("LGEE", alias("MISO")),
    ("MEC", alias("MISO")),
    ("MGE", alias("MISO")),
    ("MIUP", alias("MISO")),
    ("MP", alias("MISO")),
    ("MPW", alias("MISO")),
    ("NIPS", alias("MISO")),
    ("NSP", alias("MISO")),
    ("OVEC", alias("MISO")),
    ("SIGE", alias("MISO")),
    ("SIPC", alias("MISO")),
    ("SMMP", alias("MISO")),
    ("SMP", alias("MISO")),
    ("UPPC", alias("MISO")),
    ("WEC", alias("MISO")),
    ("WPS", alias("MISO")),
    ("ALTE", alias("MISO")),
    // SPP utilities
    ("CSWS", alias("SPP")),
    ("EDE", alias("SPP")),
    ("GRDA", alias("SPP")),
    ("INDN", alias("SPP")),
    ("KACY", alias("SPP")),
    ("KCPL", alias("SPP")),
    ("LES", alias("SPP")),
    ("MPS", alias("SPP")),
    ("NPPD", alias("SPP")),
    ("OKGE", alias("SPP")),
    ("OPPD", alias("SPP")),
    ("SECI", alias("SPP")),
    ("SPRM", alias("SPP")),
    ("SPS", alias("SPP")),
    ("WAUE", alias("SPP")),
    ("WFEC", alias("SPP")),
    ("WR", alias("SPP")),
];

static INDEX: Lazy<HashMap<&'static str, &'static SourceMapping>> =
    Lazy::new(|| SOURCE_CODES.iter().map(|(code, mapping)| (*code, mapping)).collect());

/// Resolve a provider source code to its canonical region id.
pub fn resolve(code: &str) -> Option<&'static str> {
    match INDEX.get(code)? {
        SourceMapping::Primary(spec) => Some(spec.region_id),
        SourceMapping::Alias(region_id) => Some(region_id),
    }
}

/// Iterate the primary region specs (the only entries that seed rows).
pub fn primary_regions() -> impl Iterator<Item = &'static RegionSpec> {
    SOURCE_CODES.iter().filter_map(|(_, mapping)| match mapping {
        SourceMapping::Primary(spec) => Some(spec),
        SourceMapping::Alias(_) => None,
    })
}

/// Insert any canonical region not already present. Existing rows are never
/// updated or removed; safe to call on every ingestion cycle.
pub async fn ensure_regions_exist(store: &dyn GridStore) -> Result<usize, StoreError> {
    let mut inserted = 0;
    for spec in primary_regions() {
        if store.ensure_region(&spec.to_region()).await? {
            tracing::info!(region_id = spec.region_id, "registered grid region");
            inserted += 1;
        }
    }
    Ok(inserted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryGridStore;

    #[test]
    fn primary_codes_resolve_to_their_canonical_id() {
        assert_eq!(resolve("ERCO"), Some("ERCOT"));
        assert_eq!(resolve("CISO"), Some("CAISO"));
        assert_eq!(resolve("SWPP"), Some("SPP"));
    }

    #[test]
    fn alias_codes_fold_into_their_parent_region() {
        assert_eq!(resolve("BANC"), Some("CAISO"));
        assert_eq!(resolve("AEP"), Some("PJM"));
        assert_eq!(resolve("NSP"), Some("MISO"));
        assert_eq!(resolve("WR"), Some("SPP"));
    }

    #[test]
    fn unknown_codes_do_not_resolve() {
        assert_eq!(resolve("XXXX"), None);
        assert_eq!(resolve(""), None);
    }

    #[test]
    fn exactly_the_primary_entries_carry_metadata() {
        let primaries: Vec<_> = primary_regions().collect();
        assert_eq!(primaries.len(), 7);
        for spec in primaries {
            assert!(!spec.name.is_empty());
            assert!(!spec.states.is_empty());
        }
    }

    #[test]
    fn every_alias_points_at_a_primary_region() {
        let primary_ids: Vec<&str> = primary_regions().map(|s| s.region_id).collect();
        for (code, mapping) in SOURCE_CODES {
            if let SourceMapping::Alias(region_id) = mapping {
                assert!(
                    primary_ids.contains(region_id),
                    "alias {code} points at unknown region {region_id}"
                );
            }
        }
    }

    #[tokio::test]
    async fn seeding_inserts_only_primaries_and_is_idempotent() {
        let store = MemoryGridStore::new();

        let first = ensure_regions_exist(&store).await.unwrap();
        assert_eq!(first, 7);
        assert_eq!(store.region_count(), 7);

        let second = ensure_regions_exist(&store).await.unwrap();
        assert_eq!(second, 0);
        assert_eq!(store.region_count(), 7);
    }
}
