use grid_client::domain::{FuelCategory, FuelMix};
use serde::Deserialize;

/// Per-fuel CO₂ emission rates in kg per MWh.
///
/// Defaults are lifecycle figures (EPA eGRID / IPCC); the `other` bucket is a
/// conservative estimate for unclassified generation. Any field can be
/// overridden from the `[emission_factors]` config section for
/// jurisdiction-specific factors.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct EmissionFactors {
    pub natural_gas: f64,
    pub coal: f64,
    pub nuclear: f64,
    pub wind: f64,
    pub solar: f64,
    pub hydro: f64,
    pub other: f64,
}

impl Default for EmissionFactors {
    fn default() -> Self {
        Self {
            natural_gas: 410.0,
            coal: 820.0,
            nuclear: 12.0,
            wind: 11.0,
            solar: 45.0,
            hydro: 24.0,
            other: 500.0,
        }
    }
}

impl EmissionFactors {
    pub fn factor_for(&self, category: FuelCategory) -> f64 {
        match category {
            FuelCategory::NaturalGas => self.natural_gas,
            FuelCategory::Coal => self.coal,
            FuelCategory::Nuclear => self.nuclear,
            FuelCategory::Wind => self.wind,
            FuelCategory::Solar => self.solar,
            FuelCategory::Hydro => self.hydro,
            FuelCategory::Other => self.other,
        }
    }
}

/// Pure derivation of carbon/renewable metrics from a generation mix.
#[derive(Debug, Clone, Default)]
pub struct CarbonCalculator {
    factors: EmissionFactors,
}

impl CarbonCalculator {
    pub fn new(factors: EmissionFactors) -> Self {
        Self { factors }
    }

    /// Generation-weighted average emission rate, kg CO₂ per MWh.
    ///
    /// Returns 0 when there is no generation to weight.
    pub fn carbon_intensity(&self, mix: &FuelMix, total_generation_mw: f64) -> f64 {
        if total_generation_mw <= 0.0 {
            return 0.0;
        }

        let total_emissions: f64 = mix
            .entries()
            .iter()
            .map(|(category, mw)| mw * self.factors.factor_for(*category))
            .sum();

        round2(total_emissions / total_generation_mw)
    }

    /// Share of generation from wind, solar and hydro, in percent.
    pub fn renewable_fraction(&self, mix: &FuelMix, total_generation_mw: f64) -> f64 {
        if total_generation_mw <= 0.0 {
            return 0.0;
        }

        round2(mix.renewable_mw() / total_generation_mw * 100.0)
    }

    /// Total CO₂ in kg for a load held for `hours` at the given intensity.
    pub fn estimate_emissions(&self, load_mw: f64, carbon_intensity: f64, hours: f64) -> f64 {
        round2(load_mw * hours * carbon_intensity)
    }
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}
