// Environment manager — resource grids and per-plant resource queries.
//
// Owns one `SpatialGrid` per resource (illumination, soil humidity,
// temperature) and the footprint each plant currently claims in them. The
// simulator drives it in three steps each tick:
//
//   1. `set_month()` selects the month's values from the three monthly
//      profiles and pushes them into every existing cell through an explicit
//      `MonthContext` (cells created later start from the same context).
//   2. `sample()` answers a plant's exposure: mean illumination over its
//      canopy cells, mean granted humidity over its root cells, and the
//      temperature of the cell containing it.
//   3. `update_footprint()` / `release()` move survivors' claims and drop
//      the claims of the dead.
//
// A footprint's cell lists are remembered so a plant can be released
// without recomputing the circle queries. Cells are never shared between
// grids even though all three use the same geometry.
//
// See also: `illumination.rs`, `soil_humidity.rs`, `temperature.rs` for the
// cell types, `simulator.rs` for the tick that drives this.

use crate::config::{MonthlyProfile, SimulationConfiguration};
use crate::constrainer::ResourceSample;
use crate::grid::{CellList, SpatialGrid};
use crate::illumination::IlluminationCell;
use crate::soil_humidity::{HumidityRequest, SoilHumidityCell};
use crate::temperature::TemperatureCell;
use crate::types::{CellCoord, Month, PlantId, Position};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

/// The current month and the resource values selected for it.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct MonthContext {
    pub month: Month,
    pub illumination: f32,
    pub soil_humidity: f32,
    pub temperature: f32,
}

/// What a plant claims from the environment this month.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Footprint {
    pub plant: PlantId,
    pub position: Position,
    pub height: f32,
    pub canopy_radius: f32,
    pub root_radius: f32,
    pub humidity: HumidityRequest,
}

/// Resource values of one cell, for display.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CellResources {
    pub cell: CellCoord,
    /// Illumination ceiling for the month.
    pub illumination: f32,
    /// Whether a canopy shades the cell.
    pub shaded: bool,
    /// Humidity available for the month.
    pub soil_humidity: f32,
    /// Total humidity requested by the roots in the cell.
    pub soil_humidity_requested: f32,
    pub temperature: f32,
}

#[derive(Clone, Debug)]
struct Claim {
    footprint: Footprint,
    canopy_cells: CellList,
    root_cells: CellList,
}

#[derive(Clone, Debug)]
pub struct EnvironmentManager {
    illumination: SpatialGrid<IlluminationCell>,
    soil_humidity: SpatialGrid<SoilHumidityCell>,
    temperature: SpatialGrid<TemperatureCell>,
    illumination_profile: MonthlyProfile,
    soil_humidity_profile: MonthlyProfile,
    temperature_profile: MonthlyProfile,
    context: MonthContext,
    claims: FxHashMap<PlantId, Claim>,
}

impl EnvironmentManager {
    /// Empty grids with January selected.
    pub fn new(config: &SimulationConfiguration) -> Self {
        let w = &config.world;
        let mut env = Self {
            illumination: SpatialGrid::new(w.width, w.height, w.cell_width, w.cell_height),
            soil_humidity: SpatialGrid::new(w.width, w.height, w.cell_width, w.cell_height),
            temperature: SpatialGrid::new(w.width, w.height, w.cell_width, w.cell_height),
            illumination_profile: config.illumination,
            soil_humidity_profile: config.soil_humidity,
            temperature_profile: config.temperature,
            context: MonthContext {
                month: Month::JANUARY,
                illumination: 0.0,
                soil_humidity: 0.0,
                temperature: 0.0,
            },
            claims: FxHashMap::default(),
        };
        env.set_month(Month::JANUARY);
        env
    }

    /// Select `month`'s profile values for every cell.
    pub fn set_month(&mut self, month: Month) {
        let ctx = MonthContext {
            month,
            illumination: self.illumination_profile.value(month),
            soil_humidity: self.soil_humidity_profile.value(month),
            temperature: self.temperature_profile.value(month),
        };
        self.context = ctx;
        for (_, cell) in self.illumination.iter_mut() {
            cell.set_ceiling(ctx.illumination);
        }
        for (_, cell) in self.soil_humidity.iter_mut() {
            cell.set_available(ctx.soil_humidity);
        }
        for (_, cell) in self.temperature.iter_mut() {
            cell.set_value(ctx.temperature);
        }
    }

    pub fn context(&self) -> MonthContext {
        self.context
    }

    pub fn in_bounds(&self, position: Position) -> bool {
        self.illumination.in_bounds(position)
    }

    /// Register a plant's claims, replacing any previous ones.
    pub fn update_footprint(&mut self, footprint: Footprint) {
        self.release(footprint.plant);
        let ctx = self.context;
        let id = footprint.plant;

        let canopy_cells = self
            .illumination
            .cells_in_radius(footprint.position, footprint.canopy_radius);
        for &coord in &canopy_cells {
            self.illumination
                .get_or_init_with(coord, || IlluminationCell::new(ctx.illumination))
                .set_occupant(id, footprint.height);
        }

        let root_cells = self
            .soil_humidity
            .cells_in_radius(footprint.position, footprint.root_radius);
        for &coord in &root_cells {
            self.soil_humidity
                .get_or_init_with(coord, || SoilHumidityCell::new(ctx.soil_humidity))
                .set_request(id, footprint.humidity);
        }

        self.claims.insert(
            id,
            Claim {
                footprint,
                canopy_cells,
                root_cells,
            },
        );
    }

    /// Drop every claim held by `plant`. Returns whether it had any.
    pub fn release(&mut self, plant: PlantId) -> bool {
        let Some(claim) = self.claims.remove(&plant) else {
            return false;
        };
        for coord in claim.canopy_cells {
            if let Some(cell) = self.illumination.get_mut(coord) {
                cell.remove_occupant(plant);
            }
        }
        for coord in claim.root_cells {
            if let Some(cell) = self.soil_humidity.get_mut(coord) {
                cell.remove_request(plant);
            }
        }
        true
    }

    pub fn footprint(&self, plant: PlantId) -> Option<&Footprint> {
        self.claims.get(&plant).map(|c| &c.footprint)
    }

    pub fn footprint_count(&self) -> usize {
        self.claims.len()
    }

    /// Mean illumination over the plant's canopy cells.
    pub fn illumination(&self, plant: PlantId) -> Option<f32> {
        let claim = self.claims.get(&plant)?;
        let height = claim.footprint.height;
        let values = claim.canopy_cells.iter().map(|&coord| match self.illumination.get(coord) {
            Some(cell) => cell.illumination_for(plant, height),
            None => self.context.illumination,
        });
        Some(mean(values, claim.canopy_cells.len()))
    }

    /// Mean humidity granted over the plant's root cells.
    pub fn soil_humidity(&mut self, plant: PlantId) -> Option<f32> {
        let claim = self.claims.get(&plant)?;
        let grid = &mut self.soil_humidity;
        let mut total = 0.0;
        for &coord in &claim.root_cells {
            if let Some(cell) = grid.get_mut(coord) {
                total += cell.grant_for(plant);
            }
        }
        let count = claim.root_cells.len();
        if count == 0 {
            return Some(0.0);
        }
        Some(total / count as f32)
    }

    /// Temperature of the cell containing `position`.
    pub fn temperature_at(&mut self, position: Position) -> f32 {
        let coord = self.temperature.cell_of(position);
        if !self.temperature.contains_cell(coord) {
            return self.context.temperature;
        }
        let ctx = self.context;
        self.temperature
            .get_or_init_with(coord, || TemperatureCell::new(ctx.temperature))
            .value()
    }

    /// Everything a plant is exposed to this month, or `None` if it has no
    /// registered footprint.
    pub fn sample(&mut self, plant: PlantId) -> Option<ResourceSample> {
        let illumination = self.illumination(plant)?;
        let soil_humidity = self.soil_humidity(plant)?;
        let position = self.claims.get(&plant)?.footprint.position;
        Some(ResourceSample {
            illumination,
            soil_humidity,
            temperature: self.temperature_at(position),
        })
    }

    /// Per-cell resource values for every cell in the world, row by row.
    pub fn cell_resources(&self) -> Vec<CellResources> {
        let ctx = self.context;
        let columns = self.illumination.columns();
        let rows = self.illumination.rows();
        let capacity = usize::try_from(columns)
            .ok()
            .zip(usize::try_from(rows).ok())
            .and_then(|(c, r)| c.checked_mul(r))
            .unwrap_or(0);
        let mut out = Vec::with_capacity(capacity);
        for y in 0..rows {
            for x in 0..columns {
                let cell = CellCoord::new(x, y);
                let light = self.illumination.get(cell);
                let soil = self.soil_humidity.get(cell);
                out.push(CellResources {
                    cell,
                    illumination: light.map_or(ctx.illumination, |c| c.ceiling()),
                    shaded: light.is_some_and(|c| !c.is_empty()),
                    soil_humidity: soil.map_or(ctx.soil_humidity, |c| c.available()),
                    soil_humidity_requested: soil.map_or(0.0, |c| c.total_requested()),
                    temperature: self
                        .temperature
                        .get(cell)
                        .map_or(ctx.temperature, |c| c.value()),
                });
            }
        }
        out
    }

    /// Drop all cells and claims. The month selection is kept.
    pub fn clear(&mut self) {
        self.illumination.clear();
        self.soil_humidity.clear();
        self.temperature.clear();
        self.claims.clear();
    }
}

fn mean(values: impl Iterator<Item = f32>, count: usize) -> f32 {
    if count == 0 {
        return 0.0;
    }
    values.sum::<f32>() / count as f32
}
