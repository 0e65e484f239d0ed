use serde::{Deserialize, Serialize};

/// The fixed set of generation-source classes tracked per region.
///
/// Anything a provider reports outside the six named classes (oil, petroleum
/// coke, batteries, pumped storage, unknown) folds into `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FuelCategory {
    NaturalGas,
    Coal,
    Nuclear,
    Wind,
    Solar,
    Hydro,
    Other,
}

impl FuelCategory {
    pub const ALL: [FuelCategory; 7] = [
        FuelCategory::NaturalGas,
        FuelCategory::Coal,
        FuelCategory::Nuclear,
        FuelCategory::Wind,
        FuelCategory::Solar,
        FuelCategory::Hydro,
        FuelCategory::Other,
    ];
}

/// Generation broken down by fuel category, in MW.
///
/// Persisted as a JSONB document; the key names are the wire/storage schema
/// and must not change. The breakdown is not summed automatically — total
/// generation is tracked independently by the caller and may diverge
/// slightly from the sum here when endpoints report asynchronously.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FuelMix {
    #[serde(default)]
    pub natural_gas_mw: f64,
    #[serde(default)]
    pub coal_mw: f64,
    #[serde(default)]
    pub nuclear_mw: f64,
    #[serde(default)]
    pub wind_mw: f64,
    #[serde(default)]
    pub solar_mw: f64,
    #[serde(default)]
    pub hydro_mw: f64,
    #[serde(default)]
    pub other_mw: f64,
}

impl FuelMix {
    pub fn get(&self, category: FuelCategory) -> f64 {
        match category {
            FuelCategory::NaturalGas => self.natural_gas_mw,
            FuelCategory::Coal => self.coal_mw,
            FuelCategory::Nuclear => self.nuclear_mw,
            FuelCategory::Wind => self.wind_mw,
            FuelCategory::Solar => self.solar_mw,
            FuelCategory::Hydro => self.hydro_mw,
            FuelCategory::Other => self.other_mw,
        }
    }

    pub fn add(&mut self, category: FuelCategory, mw: f64) {
        let slot = match category {
            FuelCategory::NaturalGas => &mut self.natural_gas_mw,
            FuelCategory::Coal => &mut self.coal_mw,
            FuelCategory::Nuclear => &mut self.nuclear_mw,
            FuelCategory::Wind => &mut self.wind_mw,
            FuelCategory::Solar => &mut self.solar_mw,
            FuelCategory::Hydro => &mut self.hydro_mw,
            FuelCategory::Other => &mut self.other_mw,
        };
        *slot += mw;
    }

    /// Wind + solar + hydro, the renewable share of the breakdown.
    pub fn renewable_mw(&self) -> f64 {
        self.wind_mw + self.solar_mw + self.hydro_mw
    }

    pub fn entries(&self) -> [(FuelCategory, f64); 7] {
        [
            (FuelCategory::NaturalGas, self.natural_gas_mw),
            (FuelCategory::Coal, self.coal_mw),
            (FuelCategory::Nuclear, self.nuclear_mw),
            (FuelCategory::Wind, self.wind_mw),
            (FuelCategory::Solar, self.solar_mw),
            (FuelCategory::Hydro, self.hydro_mw),
            (FuelCategory::Other, self.other_mw),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_accumulates_into_category() {
        let mut mix = FuelMix::default();
        mix.add(FuelCategory::Wind, 100.0);
        mix.add(FuelCategory::Wind, 50.0);
        mix.add(FuelCategory::Other, 10.0);

        assert_eq!(mix.get(FuelCategory::Wind), 150.0);
        assert_eq!(mix.get(FuelCategory::Other), 10.0);
        assert_eq!(mix.get(FuelCategory::Coal), 0.0);
    }

    #[test]
    fn renewable_mw_sums_wind_solar_hydro() {
        let mix = FuelMix {
            wind_mw: 100.0,
            solar_mw: 20.0,
            hydro_mw: 30.0,
            natural_gas_mw: 500.0,
            ..FuelMix::default()
        };
        assert_eq!(mix.renewable_mw(), 150.0);
    }

    #[test]
    fn serialized_key_names_are_the_storage_schema() {
        let mix = FuelMix {
            natural_gas_mw: 1.0,
            ..FuelMix::default()
        };
        let value = serde_json::to_value(&mix).unwrap();
        assert_eq!(value["natural_gas_mw"], 1.0);
        assert_eq!(value["hydro_mw"], 0.0);
        // Missing keys deserialize as zero.
        let sparse: FuelMix = serde_json::from_str(r#"{"wind_mw": 5.0}"#).unwrap();
        assert_eq!(sparse.wind_mw, 5.0);
        assert_eq!(sparse.coal_mw, 0.0);
    }
}
