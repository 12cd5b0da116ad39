// Data-driven simulation configuration.
//
// `SimulationConfiguration` holds everything a run needs besides the species
// catalog: how many plants of each species to start with, the three
// 12-entry monthly resource profiles, the run length, whether seeding is
// enabled, the world geometry, the RNG seed and the scheduler period. It is
// loaded from JSON at startup and never mutated while a simulation runs.
//
// Monthly profiles are plain 12-entry tables. `MonthlyProfile::seasonal()`
// builds one from a `(min, max)` pair with the triangular June-peak curve in
// `illumination.rs`, which is how the default configuration is made.
//
// See also: `simulator.rs` which owns the configuration, `species.rs` for the
// per-species records the `species_quantities` keys refer to.

use crate::error::ConfigError;
use crate::illumination::SeasonalRange;
use crate::types::{Month, SpeciesId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

// ---------------------------------------------------------------------------
// Monthly profiles
// ---------------------------------------------------------------------------

/// One value per calendar month, January first.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct MonthlyProfile(pub [f32; 12]);

impl MonthlyProfile {
    pub fn constant(value: f32) -> Self {
        Self([value; 12])
    }

    /// Sample a seasonal range for each month.
    pub fn seasonal(range: SeasonalRange) -> Self {
        let mut values = [0.0; 12];
        for month in Month::all() {
            values[month.index()] = range.value(month);
        }
        Self(values)
    }

    pub fn value(&self, month: Month) -> f32 {
        self.0[month.index()]
    }

    fn check(&self, profile: &'static str) -> Result<(), ConfigError> {
        match Month::all().find(|m| !self.value(*m).is_finite()) {
            Some(month) => Err(ConfigError::NonFiniteProfile { profile, month }),
            None => Ok(()),
        }
    }
}

// ---------------------------------------------------------------------------
// Nested parameter groups
// ---------------------------------------------------------------------------

/// World rectangle and grid cell size, in world units.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct WorldConfig {
    pub width: f32,
    pub height: f32,
    pub cell_width: f32,
    pub cell_height: f32,
}

/// Tuning for the seeding step.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SeedingConfig {
    /// Seeding happens every this many months.
    pub interval_months: u32,
    /// Months before shade-tolerant species are placed under canopy.
    pub shade_warmup_months: u64,
    /// Share of a shade-tolerant species' initial batch placed under canopy.
    pub shade_biased_fraction: f32,
    /// Random positions tried per placement before giving up.
    pub placement_attempts: u32,
}

impl Default for SeedingConfig {
    fn default() -> Self {
        Self {
            interval_months: 6,
            shade_warmup_months: 24,
            shade_biased_fraction: 0.5,
            placement_attempts: 10,
        }
    }
}

// ---------------------------------------------------------------------------
// Top-level configuration
// ---------------------------------------------------------------------------

/// Upper bound on `columns x rows` of the world grid. Render snapshots list
/// every cell, so the grid has to stay small enough to walk each tick.
pub const MAX_GRID_CELLS: u64 = 1 << 20;

/// Top-level simulation configuration. Loaded from JSON, never mutated while
/// a simulation runs.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfiguration {
    /// Initial plant count per species. Also the batch size used to
    /// re-introduce a species that has died out.
    pub species_quantities: BTreeMap<SpeciesId, u32>,

    /// Daily hours of light per month.
    pub illumination: MonthlyProfile,

    /// Soil humidity (percent) available per cell per month.
    pub soil_humidity: MonthlyProfile,

    /// Degrees Celsius per month.
    pub temperature: MonthlyProfile,

    /// Run length in months. The scheduler stops once it is reached.
    pub duration_months: u64,

    pub seeding_enabled: bool,

    pub world: WorldConfig,

    #[serde(default)]
    pub seeding: SeedingConfig,

    /// Seed for the simulation RNG. Equal seeds give identical runs.
    #[serde(default)]
    pub seed: u64,

    /// Real-time length of one tick when run on the scheduler. `None` leaves
    /// the scheduler unconfigured; it then refuses to start.
    #[serde(default)]
    pub unit_time_ms: Option<u64>,
}

impl SimulationConfiguration {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let w = &self.world;
        if !(is_positive(w.width) && is_positive(w.height)) {
            return Err(ConfigError::WorldSize {
                width: w.width,
                height: w.height,
            });
        }
        if !(is_positive(w.cell_width) && is_positive(w.cell_height)) {
            return Err(ConfigError::CellSize {
                width: w.cell_width,
                height: w.cell_height,
            });
        }
        let columns = (f64::from(w.width) / f64::from(w.cell_width)).ceil();
        let rows = (f64::from(w.height) / f64::from(w.cell_height)).ceil();
        if columns * rows > MAX_GRID_CELLS as f64 {
            return Err(ConfigError::TooManyCells {
                columns,
                rows,
                max: MAX_GRID_CELLS,
            });
        }
        self.illumination.check("illumination")?;
        self.soil_humidity.check("soil humidity")?;
        self.temperature.check("temperature")?;
        if self.seeding.interval_months == 0 {
            return Err(ConfigError::ZeroSeedingInterval);
        }
        let fraction = self.seeding.shade_biased_fraction;
        if !(0.0..=1.0).contains(&fraction) {
            return Err(ConfigError::ShadeFraction(fraction));
        }
        Ok(())
    }

    pub fn unit_time(&self) -> Option<Duration> {
        self.unit_time_ms.map(Duration::from_millis)
    }
}

/// Finite and strictly positive.
fn is_positive(value: f32) -> bool {
    value.is_finite() && value > 0.0
}

impl Default for SimulationConfiguration {
    /// A temperate forest: the four presets of `InMemoryCatalog::temperate()`
    /// on a 200 x 200 world.
    fn default() -> Self {
        let mut species_quantities = BTreeMap::new();
        species_quantities.insert(SpeciesId(1), 20);
        species_quantities.insert(SpeciesId(2), 20);
        species_quantities.insert(SpeciesId(3), 30);
        species_quantities.insert(SpeciesId(4), 60);

        Self {
            species_quantities,
            illumination: MonthlyProfile::seasonal(SeasonalRange::new(8.0, 16.0)),
            soil_humidity: MonthlyProfile::seasonal(SeasonalRange::new(30.0, 60.0)),
            temperature: MonthlyProfile::seasonal(SeasonalRange::new(0.0, 24.0)),
            duration_months: 12 * 50,
            seeding_enabled: true,
            world: WorldConfig {
                width: 200.0,
                height: 200.0,
                cell_width: 5.0,
                cell_height: 5.0,
            },
            seeding: SeedingConfig::default(),
            seed: 0x5eed,
            unit_time_ms: Some(100),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid_and_roundtrips() {
        let config = SimulationConfiguration::default();
        config.validate().unwrap();
        let json = config.to_json().unwrap();
        let restored = SimulationConfiguration::from_json(&json).unwrap();
        assert_eq!(restored, config);
    }

    #[test]
    fn seasonal_profile_samples_every_month() {
        let profile = MonthlyProfile::seasonal(SeasonalRange::new(0.0, 12.0));
        assert_eq!(profile.value(Month::JUNE), 12.0);
        assert_eq!(profile.value(Month::DECEMBER), 0.0);
        assert_eq!(profile.0[0], 2.0);
    }

    #[test]
    fn config_loads_from_json_string() {
        let json = r#"{
            "species_quantities": { "1": 5, "3": 2 },
            "illumination": [10, 10, 10, 10, 10, 10, 10, 10, 10, 10, 10, 10],
            "soil_humidity": [40, 40, 40, 40, 40, 40, 40, 40, 40, 40, 40, 40],
            "temperature": [1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12],
            "duration_months": 24,
            "seeding_enabled": false,
            "world": { "width": 50.0, "height": 40.0, "cell_width": 5.0, "cell_height": 5.0 }
        }"#;
        let config = SimulationConfiguration::from_json(json).unwrap();
        assert_eq!(config.species_quantities[&SpeciesId(1)], 5);
        assert_eq!(config.temperature.value(Month::new(4).unwrap()), 4.0);
        assert_eq!(config.seeding, SeedingConfig::default());
        assert_eq!(config.unit_time_ms, None);
        assert!(config.unit_time().is_none());
    }

    #[test]
    fn invalid_world_is_rejected() {
        let mut config = SimulationConfiguration::default();
        config.world.cell_width = 0.0;
        assert!(matches!(config.validate(), Err(ConfigError::CellSize { .. })));
    }

    #[test]
    fn infinite_world_is_rejected() {
        let mut config = SimulationConfiguration::default();
        config.world.width = f32::INFINITY;
        assert!(matches!(config.validate(), Err(ConfigError::WorldSize { .. })));

        let mut config = SimulationConfiguration::default();
        config.world.cell_height = f32::INFINITY;
        assert!(matches!(config.validate(), Err(ConfigError::CellSize { .. })));
    }

    #[test]
    fn over_range_json_dimension_is_rejected() {
        let mut config = SimulationConfiguration::default();
        config.world.height = 1.0;
        let json = config
            .to_json()
            .unwrap()
            .replace("\"height\": 1.0", "\"height\": 1e39");
        let parsed = SimulationConfiguration::from_json(&json).unwrap();
        assert!(matches!(parsed.validate(), Err(ConfigError::WorldSize { .. })));
    }

    #[test]
    fn oversized_grid_is_rejected() {
        let mut config = SimulationConfiguration::default();
        config.world = WorldConfig {
            width: 50_000.0,
            height: 50_000.0,
            cell_width: 1.0,
            cell_height: 1.0,
        };
        assert!(matches!(config.validate(), Err(ConfigError::TooManyCells { .. })));

        config.world.cell_width = 50.0;
        config.world.cell_height = 50.0;
        config.validate().unwrap();
    }

    #[test]
    fn non_finite_profile_is_rejected() {
        let mut config = SimulationConfiguration::default();
        config.temperature.0[3] = f32::NAN;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::NonFiniteProfile {
                profile: "temperature",
                ..
            })
        ));
    }

    #[test]
    fn shade_fraction_out_of_range_is_rejected() {
        let mut config = SimulationConfiguration::default();
        config.seeding.shade_biased_fraction = 1.5;
        assert!(matches!(config.validate(), Err(ConfigError::ShadeFraction(_))));
    }
}
