// Read-only views of a simulation for external consumers.
//
// - `RenderSnapshot`: what a painter needs each tick. Plants sorted by
//   ascending height (short ones are drawn first, so canopies overlap them),
//   plus the resource values of every cell.
// - `OccupancySnapshot`: one `u8` raster per species marking canopy cover,
//   and a composite of all of them. Species are rasterized in parallel with
//   rayon.
// - `StatisticalSnapshot`: species-keyed point sets handed to a
//   `PointPatternAnalyzer`.
//
// `ColorRegistry` lives here too: a species keeps the color from its
// record if it has one, otherwise it takes the next palette entry, and
// keeps it for the lifetime of the registry.

use crate::environment::CellResources;
use crate::types::{Month, PlantId, Position, Rgb, SpeciesId};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ---------------------------------------------------------------------------
// Colors
// ---------------------------------------------------------------------------

const PALETTE: [Rgb; 10] = [
    Rgb::new(46, 125, 50),
    Rgb::new(156, 204, 101),
    Rgb::new(121, 85, 72),
    Rgb::new(255, 193, 7),
    Rgb::new(0, 150, 136),
    Rgb::new(233, 30, 99),
    Rgb::new(63, 81, 181),
    Rgb::new(255, 87, 34),
    Rgb::new(96, 125, 139),
    Rgb::new(205, 220, 57),
];

/// Per-simulator display colors.
#[derive(Clone, Debug, Default)]
pub struct ColorRegistry {
    assigned: BTreeMap<SpeciesId, Rgb>,
    next_palette: usize,
}

impl ColorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The color for `species`, assigning one on first use.
    pub fn color_for(&mut self, species: SpeciesId, preferred: Option<Rgb>) -> Rgb {
        if let Some(color) = self.assigned.get(&species) {
            return *color;
        }
        let color = preferred.unwrap_or_else(|| {
            let c = PALETTE[self.next_palette % PALETTE.len()];
            self.next_palette += 1;
            c
        });
        self.assigned.insert(species, color);
        color
    }

    pub fn get(&self, species: SpeciesId) -> Option<Rgb> {
        self.assigned.get(&species).copied()
    }
}

// ---------------------------------------------------------------------------
// Render snapshot
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlantRender {
    pub id: PlantId,
    pub species: SpeciesId,
    pub position: Position,
    pub color: Rgb,
    pub height: f32,
    pub canopy_radius: f32,
    pub root_radius: f32,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RenderSnapshot {
    pub elapsed_months: u64,
    pub month: Option<Month>,
    /// Ascending height.
    pub plants: Vec<PlantRender>,
    pub cells: Vec<CellResources>,
}

impl RenderSnapshot {
    /// Build from unsorted plants.
    pub fn new(
        elapsed_months: u64,
        month: Month,
        mut plants: Vec<PlantRender>,
        cells: Vec<CellResources>,
    ) -> Self {
        plants.sort_by(|a, b| a.height.total_cmp(&b.height).then(a.id.cmp(&b.id)));
        Self {
            elapsed_months,
            month: Some(month),
            plants,
            cells,
        }
    }
}

// ---------------------------------------------------------------------------
// Occupancy rasters
// ---------------------------------------------------------------------------

/// Row-major `u8` raster; 255 where covered, 0 elsewhere.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OccupancyRaster {
    pub width: usize,
    pub height: usize,
    pub pixels: Vec<u8>,
}

impl OccupancyRaster {
    pub fn blank(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            pixels: vec![0; width * height],
        }
    }

    pub fn get(&self, x: usize, y: usize) -> Option<u8> {
        if x < self.width && y < self.height {
            Some(self.pixels[y * self.width + x])
        } else {
            None
        }
    }

    pub fn covered(&self) -> usize {
        self.pixels.iter().filter(|p| **p > 0).count()
    }

    fn merge(&mut self, other: &OccupancyRaster) {
        for (dst, src) in self.pixels.iter_mut().zip(&other.pixels) {
            *dst = (*dst).max(*src);
        }
    }
}

/// A disc to rasterize: center and canopy radius.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Disc {
    pub center: Position,
    pub radius: f32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OccupancySnapshot {
    pub elapsed_months: u64,
    pub species: BTreeMap<SpeciesId, OccupancyRaster>,
    pub composite: OccupancyRaster,
}

impl OccupancySnapshot {
    /// Rasterize each species' canopy discs onto a `width x height` image of
    /// the world.
    pub fn build(
        elapsed_months: u64,
        world: (f32, f32),
        resolution: (usize, usize),
        discs: &BTreeMap<SpeciesId, Vec<Disc>>,
    ) -> Self {
        let (width, height) = resolution;
        let species: BTreeMap<SpeciesId, OccupancyRaster> = discs
            .par_iter()
            .map(|(id, discs)| (*id, rasterize(discs, world, resolution)))
            .collect();
        let mut composite = OccupancyRaster::blank(width, height);
        for raster in species.values() {
            composite.merge(raster);
        }
        Self {
            elapsed_months,
            species,
            composite,
        }
    }
}

/// Mark every pixel whose center lies inside a disc. A disc smaller than a
/// pixel still marks the pixel containing its center.
fn rasterize(discs: &[Disc], world: (f32, f32), resolution: (usize, usize)) -> OccupancyRaster {
    let (width, height) = resolution;
    let mut raster = OccupancyRaster::blank(width, height);
    if width == 0 || height == 0 {
        return raster;
    }
    let px_w = world.0 / width as f32;
    let px_h = world.1 / height as f32;
    let max_x = width as i64 - 1;
    let max_y = height as i64 - 1;

    for disc in discs {
        let c = disc.center;
        let cx = ((c.x / px_w).floor() as i64).clamp(0, max_x);
        let cy = ((c.y / px_h).floor() as i64).clamp(0, max_y);
        raster.pixels[cy as usize * width + cx as usize] = u8::MAX;

        let r = disc.radius.max(0.0);
        let x0 = (((c.x - r) / px_w).floor() as i64).clamp(0, max_x);
        let x1 = (((c.x + r) / px_w).floor() as i64).clamp(0, max_x);
        let y0 = (((c.y - r) / px_h).floor() as i64).clamp(0, max_y);
        let y1 = (((c.y + r) / px_h).floor() as i64).clamp(0, max_y);
        for y in y0..=y1 {
            for x in x0..=x1 {
                let center = Position::new((x as f32 + 0.5) * px_w, (y as f32 + 0.5) * px_h);
                if center.distance_squared(c) <= r * r {
                    raster.pixels[y as usize * width + x as usize] = u8::MAX;
                }
            }
        }
    }
    raster
}

// ---------------------------------------------------------------------------
// Statistical snapshot
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StatisticalSnapshot {
    pub elapsed_months: u64,
    pub world_width: f32,
    pub world_height: f32,
    pub points: BTreeMap<SpeciesId, Vec<Position>>,
}

/// External consumer of species point patterns.
pub trait PointPatternAnalyzer: Send {
    fn analyze(&mut self, snapshot: &StatisticalSnapshot);
}

/// Clark-Evans aggregation index per species: the mean nearest-neighbour
/// distance over the value expected for a random pattern of the same
/// density. Below 1 means clumped, above 1 regular. Species with fewer than
/// two plants are left out.
#[derive(Clone, Debug, Default)]
pub struct ClarkEvansAnalyzer {
    pub results: BTreeMap<SpeciesId, f32>,
}

impl ClarkEvansAnalyzer {
    pub fn index(points: &[Position], area: f32) -> Option<f32> {
        if points.len() < 2 || area <= 0.0 {
            return None;
        }
        let n = points.len();
        let total: f32 = points
            .par_iter()
            .enumerate()
            .map(|(i, p)| {
                points
                    .iter()
                    .enumerate()
                    .filter(|(j, _)| *j != i)
                    .map(|(_, q)| p.distance(*q))
                    .fold(f32::INFINITY, f32::min)
            })
            .sum();
        let observed = total / n as f32;
        let density = n as f32 / area;
        let expected = 0.5 / density.sqrt();
        Some(observed / expected)
    }
}

impl PointPatternAnalyzer for ClarkEvansAnalyzer {
    fn analyze(&mut self, snapshot: &StatisticalSnapshot) {
        let area = snapshot.world_width * snapshot.world_height;
        self.results = snapshot
            .points
            .iter()
            .filter_map(|(species, points)| Some((*species, Self::index(points, area)?)))
            .collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_prefers_species_color_then_palette() {
        let mut colors = ColorRegistry::new();
        let own = Rgb::new(1, 2, 3);
        assert_eq!(colors.color_for(SpeciesId(1), Some(own)), own);
        assert_eq!(colors.color_for(SpeciesId(2), None), PALETTE[0]);
        assert_eq!(colors.color_for(SpeciesId(3), None), PALETTE[1]);
        // Stable once assigned.
        assert_eq!(colors.color_for(SpeciesId(2), Some(own)), PALETTE[0]);
        assert_eq!(colors.get(SpeciesId(9)), None);
    }

    #[test]
    fn render_snapshot_sorts_by_height() {
        let plant = |id, height| PlantRender {
            id: PlantId(id),
            species: SpeciesId(1),
            position: Position::new(0.0, 0.0),
            color: PALETTE[0],
            height,
            canopy_radius: 0.0,
            root_radius: 0.0,
        };
        let snap = RenderSnapshot::new(
            3,
            Month::JANUARY,
            vec![plant(1, 5.0), plant(2, 0.5), plant(3, 2.0)],
            Vec::new(),
        );
        let order: Vec<u64> = snap.plants.iter().map(|p| p.id.0).collect();
        assert_eq!(order, vec![2, 3, 1]);
    }

    #[test]
    fn occupancy_marks_discs_and_composite() {
        let mut discs = BTreeMap::new();
        discs.insert(
            SpeciesId(1),
            vec![Disc {
                center: Position::new(5.0, 5.0),
                radius: 2.0,
            }],
        );
        discs.insert(
            SpeciesId(2),
            vec![Disc {
                center: Position::new(17.5, 17.5),
                radius: 0.0,
            }],
        );
        let snap = OccupancySnapshot::build(0, (20.0, 20.0), (20, 20), &discs);
        let first = &snap.species[&SpeciesId(1)];
        assert_eq!(first.get(5, 5), Some(u8::MAX));
        assert_eq!(first.get(0, 0), Some(0));
        assert!(first.covered() >= 9 && first.covered() <= 16);
        let second = &snap.species[&SpeciesId(2)];
        assert_eq!(second.covered(), 1);
        assert_eq!(second.get(17, 17), Some(u8::MAX));
        assert_eq!(snap.composite.covered(), first.covered() + 1);
    }

    #[test]
    fn clark_evans_detects_clumping() {
        let clumped: Vec<Position> = (0..10)
            .map(|i| Position::new(50.0 + i as f32 * 0.1, 50.0))
            .collect();
        let mut regular = Vec::new();
        for i in 0..10 {
            for j in 0..10 {
                regular.push(Position::new(5.0 + i as f32 * 10.0, 5.0 + j as f32 * 10.0));
            }
        }
        let area = 100.0 * 100.0;
        assert!(ClarkEvansAnalyzer::index(&clumped, area).unwrap() < 0.5);
        assert!(ClarkEvansAnalyzer::index(&regular, area).unwrap() > 1.5);
        assert!(ClarkEvansAnalyzer::index(&clumped[..1], area).is_none());
    }
}
