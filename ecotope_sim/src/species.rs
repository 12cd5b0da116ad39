// Species data — data-driven plant templates.
//
// Every behavioral difference between plant species is data in a
// `SpecieProperties` record: how fast it ages, how tall it grows, which
// illumination / soil humidity / temperature ranges it tolerates, and how it
// seeds. The sim uses a single `Plant` type and reads these values once, at
// plant creation, to parameterize the plant's constrainers (see
// `constrainer.rs`) and growth manager (see `growth.rs`).
//
// Records come from an external catalog behind the `SpeciesCatalog` trait.
// `InMemoryCatalog` is the provided implementation: a `BTreeMap` that can be
// built in code or loaded from a JSON array of records. Records are shared
// as `Arc<SpecieProperties>` and never mutated after load.
//
// Named presets (`oak()`, `birch()`, `fern()`, `grass()`) give ready-made
// records used by the default configuration, tests and benchmarks.

use crate::error::CatalogError;
use crate::types::{Rgb, SpeciesId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

// ---------------------------------------------------------------------------
// Parameter groups
// ---------------------------------------------------------------------------

/// A tolerance window for one environmental resource.
///
/// Strength is maximal inside `[prime_min, prime_max]` and falls linearly to
/// its minimum at `min` (below) and `max` (above).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToleranceRange {
    pub min: f32,
    pub prime_min: f32,
    pub prime_max: f32,
    pub max: f32,
}

impl ToleranceRange {
    pub const fn new(min: f32, prime_min: f32, prime_max: f32, max: f32) -> Self {
        Self {
            min,
            prime_min,
            prime_max,
            max,
        }
    }

    pub fn is_ordered(&self) -> bool {
        self.min <= self.prime_min && self.prime_min <= self.prime_max && self.prime_max <= self.max
    }

    /// Midpoint of the prime window.
    pub fn prime_mid(&self) -> f32 {
        (self.prime_min + self.prime_max) / 2.0
    }
}

/// Ageing, in months.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct AgeingProperties {
    /// Age at which the age strength has declined to zero.
    pub max_age: u32,
    /// Age until which the plant is at full age strength.
    pub start_of_decline: u32,
}

/// Growth limits and body proportions.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GrowthProperties {
    /// Height at which growth stops.
    pub max_height: f32,
    /// Height gained in a month at full vigor.
    pub max_monthly_growth: f32,
    /// Canopy radius as a fraction of height.
    pub canopy_ratio: f32,
    /// Root radius as a fraction of height.
    pub root_ratio: f32,
}

/// Reproduction parameters.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SeedingProperties {
    /// Furthest distance from the parent at which a seed may land.
    pub max_distance: f32,
    /// Maximum number of offspring a parent places per seeding cycle.
    pub seed_count: u32,
    /// Age in months from which the plant produces seeds.
    pub maturity_age: u32,
}

// ---------------------------------------------------------------------------
// Species record
// ---------------------------------------------------------------------------

/// Immutable template for every plant of one species.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SpecieProperties {
    pub id: SpeciesId,
    pub name: String,
    /// Preferred display color. Species without one get a palette color
    /// from the simulator's `ColorRegistry`.
    #[serde(default)]
    pub color: Option<Rgb>,
    /// Shade-tolerant species may be spawned under existing canopy once the
    /// forest has had time to establish.
    #[serde(default)]
    pub shade_tolerant: bool,
    pub ageing: AgeingProperties,
    pub growth: GrowthProperties,
    /// Daily hours of light.
    pub illumination: ToleranceRange,
    /// Soil humidity, in percent.
    pub soil_humidity: ToleranceRange,
    /// Degrees Celsius.
    pub temperature: ToleranceRange,
    pub seeding: SeedingProperties,
}

impl SpecieProperties {
    /// Check the invariants the constrainers and growth manager rely on.
    pub fn validate(&self) -> Result<(), CatalogError> {
        for (resource, range) in [
            ("illumination", &self.illumination),
            ("soil humidity", &self.soil_humidity),
            ("temperature", &self.temperature),
        ] {
            if !range.is_ordered() {
                return Err(CatalogError::ToleranceOrder {
                    species: self.id,
                    resource,
                });
            }
        }
        if self.ageing.start_of_decline > self.ageing.max_age {
            return Err(CatalogError::AgeingOrder {
                species: self.id,
                start: self.ageing.start_of_decline,
                max: self.ageing.max_age,
            });
        }
        let g = &self.growth;
        if g.max_height <= 0.0
            || g.max_monthly_growth <= 0.0
            || g.canopy_ratio < 0.0
            || g.root_ratio < 0.0
        {
            return Err(CatalogError::Growth(self.id));
        }
        Ok(())
    }

    /// Long-lived canopy tree. Tall, slow, needs plenty of light.
    pub fn oak(id: SpeciesId) -> Self {
        Self {
            id,
            name: "Oak".into(),
            color: Some(Rgb::new(46, 94, 38)),
            shade_tolerant: false,
            ageing: AgeingProperties {
                max_age: 3600,
                start_of_decline: 2400,
            },
            growth: GrowthProperties {
                max_height: 30.0,
                max_monthly_growth: 0.05,
                canopy_ratio: 0.35,
                root_ratio: 0.25,
            },
            illumination: ToleranceRange::new(2.0, 8.0, 14.0, 20.0),
            soil_humidity: ToleranceRange::new(5.0, 25.0, 60.0, 90.0),
            temperature: ToleranceRange::new(-25.0, 5.0, 25.0, 40.0),
            seeding: SeedingProperties {
                max_distance: 15.0,
                seed_count: 3,
                maturity_age: 240,
            },
        }
    }

    /// Pioneer tree. Grows fast, dies young.
    pub fn birch(id: SpeciesId) -> Self {
        Self {
            id,
            name: "Birch".into(),
            color: Some(Rgb::new(170, 190, 90)),
            shade_tolerant: false,
            ageing: AgeingProperties {
                max_age: 1500,
                start_of_decline: 900,
            },
            growth: GrowthProperties {
                max_height: 20.0,
                max_monthly_growth: 0.12,
                canopy_ratio: 0.25,
                root_ratio: 0.2,
            },
            illumination: ToleranceRange::new(4.0, 9.0, 16.0, 22.0),
            soil_humidity: ToleranceRange::new(10.0, 30.0, 65.0, 95.0),
            temperature: ToleranceRange::new(-35.0, 0.0, 22.0, 35.0),
            seeding: SeedingProperties {
                max_distance: 25.0,
                seed_count: 5,
                maturity_age: 120,
            },
        }
    }

    /// Shade-tolerant understory fern.
    pub fn fern(id: SpeciesId) -> Self {
        Self {
            id,
            name: "Fern".into(),
            color: None,
            shade_tolerant: true,
            ageing: AgeingProperties {
                max_age: 240,
                start_of_decline: 150,
            },
            growth: GrowthProperties {
                max_height: 1.2,
                max_monthly_growth: 0.04,
                canopy_ratio: 0.6,
                root_ratio: 0.5,
            },
            illumination: ToleranceRange::new(0.0, 2.0, 9.0, 16.0),
            soil_humidity: ToleranceRange::new(20.0, 45.0, 85.0, 100.0),
            temperature: ToleranceRange::new(-10.0, 8.0, 24.0, 35.0),
            seeding: SeedingProperties {
                max_distance: 4.0,
                seed_count: 4,
                maturity_age: 24,
            },
        }
    }

    /// Short-lived meadow grass.
    pub fn grass(id: SpeciesId) -> Self {
        Self {
            id,
            name: "Grass".into(),
            color: None,
            shade_tolerant: false,
            ageing: AgeingProperties {
                max_age: 60,
                start_of_decline: 36,
            },
            growth: GrowthProperties {
                max_height: 0.6,
                max_monthly_growth: 0.1,
                canopy_ratio: 0.5,
                root_ratio: 0.4,
            },
            illumination: ToleranceRange::new(3.0, 7.0, 18.0, 24.0),
            soil_humidity: ToleranceRange::new(5.0, 20.0, 70.0, 95.0),
            temperature: ToleranceRange::new(-15.0, 5.0, 30.0, 42.0),
            seeding: SeedingProperties {
                max_distance: 6.0,
                seed_count: 6,
                maturity_age: 6,
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

/// Lookup collaborator supplying species records by id.
pub trait SpeciesCatalog: Send + Sync {
    fn get(&self, id: SpeciesId) -> Option<Arc<SpecieProperties>>;

    /// Every species id the catalog knows, ascending.
    fn ids(&self) -> Vec<SpeciesId>;
}

/// `BTreeMap`-backed catalog.
#[derive(Clone, Debug, Default)]
pub struct InMemoryCatalog {
    species: BTreeMap<SpeciesId, Arc<SpecieProperties>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a record, rejecting invalid records and duplicate ids.
    pub fn insert(&mut self, properties: SpecieProperties) -> Result<(), CatalogError> {
        properties.validate()?;
        if self.species.contains_key(&properties.id) {
            return Err(CatalogError::DuplicateSpecies(properties.id));
        }
        self.species.insert(properties.id, Arc::new(properties));
        Ok(())
    }

    /// Load from a JSON array of `SpecieProperties`.
    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        let records: Vec<SpecieProperties> = serde_json::from_str(json)?;
        let mut catalog = Self::new();
        for record in records {
            catalog.insert(record)?;
        }
        Ok(catalog)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        let records: Vec<&SpecieProperties> = self.species.values().map(|s| s.as_ref()).collect();
        serde_json::to_string_pretty(&records)
    }

    /// The four presets under ids 1 (oak), 2 (birch), 3 (fern), 4 (grass).
    pub fn temperate() -> Self {
        let species = [
            SpecieProperties::oak(SpeciesId(1)),
            SpecieProperties::birch(SpeciesId(2)),
            SpecieProperties::fern(SpeciesId(3)),
            SpecieProperties::grass(SpeciesId(4)),
        ];
        Self {
            species: species
                .into_iter()
                .map(|s| (s.id, Arc::new(s)))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.species.len()
    }

    pub fn is_empty(&self) -> bool {
        self.species.is_empty()
    }
}

impl SpeciesCatalog for InMemoryCatalog {
    fn get(&self, id: SpeciesId) -> Option<Arc<SpecieProperties>> {
        self.species.get(&id).cloned()
    }

    fn ids(&self) -> Vec<SpeciesId> {
        self.species.keys().copied().collect()
    }
}
