// Plant storage — the only owner of `Plant` values.
//
// Plants are indexed twice and both indices are updated together:
//
// - **Identity arena**: `species -> id -> Plant`, plus an `id -> species`
//   locator so lookups by id alone stay O(log n).
// - **Spatial index**: a `SpatialGrid` whose cells map
//   `species -> exact position -> id`. The exact-position key rejects a
//   second plant on the same coordinate, and per-species maps make
//   "one random parent per cell" sampling cheap.
//
// A plant is in the arena iff it is in the spatial index. Everything outside
// this module refers to plants by `PlantId`.
//
// Ordered maps throughout: iteration order feeds the seeded RNG during
// seeding, so it must not depend on hash seeds.

use crate::error::StorageError;
use crate::grid::SpatialGrid;
use crate::plant::Plant;
use crate::types::{CellCoord, PlantId, Position, PositionKey, SpeciesId};
use rand::Rng;
use std::collections::BTreeMap;

/// Occupants of one spatial cell.
#[derive(Clone, Debug, Default)]
struct SpeciesCell {
    by_species: BTreeMap<SpeciesId, BTreeMap<PositionKey, PlantId>>,
}

impl SpeciesCell {
    fn is_empty(&self) -> bool {
        self.by_species.is_empty()
    }

    fn occupies(&self, key: PositionKey) -> bool {
        self.by_species.values().any(|plants| plants.contains_key(&key))
    }
}

#[derive(Clone, Debug)]
pub struct PlantStorage {
    arena: BTreeMap<SpeciesId, BTreeMap<PlantId, Plant>>,
    locator: BTreeMap<PlantId, SpeciesId>,
    cells: SpatialGrid<SpeciesCell>,
}

impl PlantStorage {
    pub fn new(world_width: f32, world_height: f32, cell_width: f32, cell_height: f32) -> Self {
        Self {
            arena: BTreeMap::new(),
            locator: BTreeMap::new(),
            cells: SpatialGrid::new(world_width, world_height, cell_width, cell_height),
        }
    }

    pub fn in_bounds(&self, position: Position) -> bool {
        self.cells.in_bounds(position)
    }

    /// Whether some plant stands exactly at `position`.
    pub fn is_plant_at_location(&self, position: Position) -> bool {
        self.cells
            .get(self.cells.cell_of(position))
            .is_some_and(|cell| cell.occupies(position.key()))
    }

    /// Store a plant in both indices.
    pub fn add(&mut self, plant: Plant) -> Result<(), StorageError> {
        let position = plant.position();
        if !self.in_bounds(position) {
            return Err(StorageError::OutOfBounds(position));
        }
        if self.locator.contains_key(&plant.id()) {
            return Err(StorageError::DuplicateId(plant.id()));
        }
        if self.is_plant_at_location(position) {
            return Err(StorageError::LocationOccupied(position));
        }

        let (id, species) = (plant.id(), plant.species());
        let coord = self.cells.cell_of(position);
        self.cells
            .get_or_init(coord)
            .by_species
            .entry(species)
            .or_default()
            .insert(position.key(), id);
        self.locator.insert(id, species);
        self.arena.entry(species).or_default().insert(id, plant);
        Ok(())
    }

    /// Take a plant out of both indices.
    pub fn remove(&mut self, id: PlantId) -> Option<Plant> {
        let species = self.locator.remove(&id)?;
        let plants = self.arena.get_mut(&species)?;
        let plant = plants.remove(&id)?;
        if plants.is_empty() {
            self.arena.remove(&species);
        }

        let coord = self.cells.cell_of(plant.position());
        if let Some(cell) = self.cells.get_mut(coord) {
            if let Some(at) = cell.by_species.get_mut(&species) {
                at.remove(&plant.position().key());
                if at.is_empty() {
                    cell.by_species.remove(&species);
                }
            }
            if cell.is_empty() {
                self.cells.remove(coord);
            }
        }
        Some(plant)
    }

    pub fn get(&self, id: PlantId) -> Option<&Plant> {
        let species = self.locator.get(&id)?;
        self.arena.get(species)?.get(&id)
    }

    pub fn get_mut(&mut self, id: PlantId) -> Option<&mut Plant> {
        let species = self.locator.get(&id)?;
        self.arena.get_mut(species)?.get_mut(&id)
    }

    pub fn contains(&self, id: PlantId) -> bool {
        self.locator.contains_key(&id)
    }

    /// Every stored id, ascending.
    pub fn ids(&self) -> Vec<PlantId> {
        self.locator.keys().copied().collect()
    }

    /// All plants, grouped by species.
    pub fn iter(&self) -> impl Iterator<Item = &Plant> {
        self.arena.values().flat_map(|plants| plants.values())
    }

    pub fn len(&self) -> usize {
        self.locator.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locator.is_empty()
    }

    pub fn species_count(&self, species: SpeciesId) -> usize {
        self.arena.get(&species).map_or(0, BTreeMap::len)
    }

    /// Species with at least one stored plant.
    pub fn species_present(&self) -> Vec<SpeciesId> {
        self.arena.keys().copied().collect()
    }

    /// One uniformly random plant of `species` from every cell that holds
    /// it, sparsest cells first (ties by cell coordinate).
    pub fn get_one_plant_per_cell<R: Rng + ?Sized>(
        &self,
        species: SpeciesId,
        rng: &mut R,
    ) -> Vec<PlantId> {
        let mut populated: Vec<(usize, CellCoord, &BTreeMap<PositionKey, PlantId>)> = self
            .cells
            .iter()
            .filter_map(|(coord, cell)| {
                cell.by_species
                    .get(&species)
                    .map(|plants| (plants.len(), coord, plants))
            })
            .collect();
        populated.sort_by_key(|&(count, coord, _)| (count, coord));

        populated
            .into_iter()
            .filter_map(|(count, _, plants)| {
                let pick = rng.random_range(0..count);
                plants.values().nth(pick).copied()
            })
            .collect()
    }

    /// The plant nearest to `position` within `max_radius`, with its
    /// distance. Ties go to the lower id.
    pub fn nearest_plant(&self, position: Position, max_radius: f32) -> Option<(PlantId, f32)> {
        self.nearest_plant_where(position, max_radius, |_| true)
    }

    /// Like `nearest_plant`, considering only plants accepted by `filter`.
    pub fn nearest_plant_where(
        &self,
        position: Position,
        max_radius: f32,
        filter: impl Fn(&Plant) -> bool,
    ) -> Option<(PlantId, f32)> {
        let mut best: Option<(PlantId, f32)> = None;
        for coord in self.cells.cells_in_radius(position, max_radius) {
            let Some(cell) = self.cells.get(coord) else {
                continue;
            };
            for &id in cell.by_species.values().flat_map(|plants| plants.values()) {
                let Some(plant) = self.get(id).filter(|p| filter(p)) else {
                    continue;
                };
                let d = plant.position().distance(position);
                if d > max_radius {
                    continue;
                }
                let closer = match best {
                    None => true,
                    Some((best_id, best_d)) => d < best_d || (d == best_d && id < best_id),
                };
                if closer {
                    best = Some((id, d));
                }
            }
        }
        best
    }

    /// Positions of every plant, keyed by species.
    pub fn species_points(&self) -> BTreeMap<SpeciesId, Vec<Position>> {
        self.arena
            .iter()
            .map(|(species, plants)| (*species, plants.values().map(Plant::position).collect()))
            .collect()
    }

    /// Number of grid cells currently holding at least one plant.
    pub fn occupied_cell_count(&self) -> usize {
        self.cells.len()
    }

    pub fn clear(&mut self) {
        self.arena.clear();
        self.locator.clear();
        self.cells.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::species::SpecieProperties;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use std::collections::BTreeSet;

    const GRASS: SpeciesId = SpeciesId(4);
    const FERN: SpeciesId = SpeciesId(3);

    fn storage() -> PlantStorage {
        PlantStorage::new(100.0, 100.0, 10.0, 10.0)
    }

    fn plant(id: u64, species: SpeciesId, x: f32, y: f32) -> Plant {
        let props = if species == FERN {
            SpecieProperties::fern(species)
        } else {
            SpecieProperties::grass(species)
        };
        Plant::with_resilience(PlantId(id), &props, Position::new(x, y), 500)
    }

    #[test]
    fn add_and_get() {
        let mut s = storage();
        s.add(plant(1, GRASS, 5.0, 5.0)).unwrap();
        s.add(plant(2, FERN, 6.0, 5.0)).unwrap();
        assert_eq!(s.len(), 2);
        assert_eq!(s.get(PlantId(1)).unwrap().species(), GRASS);
        assert_eq!(s.species_count(FERN), 1);
        assert_eq!(s.species_present(), vec![FERN, GRASS]);
        assert_eq!(s.ids(), vec![PlantId(1), PlantId(2)]);
        assert!(s.is_plant_at_location(Position::new(6.0, 5.0)));
        assert!(!s.is_plant_at_location(Position::new(6.5, 5.0)));
    }

    #[test]
    fn rejects_bad_placements() {
        let mut s = storage();
        s.add(plant(1, GRASS, 5.0, 5.0)).unwrap();
        assert_eq!(
            s.add(plant(2, FERN, 5.0, 5.0)),
            Err(StorageError::LocationOccupied(Position::new(5.0, 5.0)))
        );
        assert_eq!(
            s.add(plant(1, GRASS, 7.0, 7.0)),
            Err(StorageError::DuplicateId(PlantId(1)))
        );
        assert_eq!(
            s.add(plant(3, GRASS, 100.0, 5.0)),
            Err(StorageError::OutOfBounds(Position::new(100.0, 5.0)))
        );
        assert_eq!(
            s.add(plant(4, GRASS, -0.5, 5.0)),
            Err(StorageError::OutOfBounds(Position::new(-0.5, 5.0)))
        );
        assert_eq!(s.len(), 1);
    }

    #[test]
    fn removed_plant_is_gone_from_both_indices() {
        let mut s = storage();
        s.add(plant(1, GRASS, 5.0, 5.0)).unwrap();
        s.add(plant(2, GRASS, 15.0, 5.0)).unwrap();
        let removed = s.remove(PlantId(1)).unwrap();
        assert_eq!(removed.id(), PlantId(1));
        assert!(!s.contains(PlantId(1)));
        assert!(s.get(PlantId(1)).is_none());
        assert!(!s.is_plant_at_location(Position::new(5.0, 5.0)));
        assert_eq!(s.occupied_cell_count(), 1);
        assert!(s.remove(PlantId(1)).is_none());

        // The freed spot can be reused.
        s.add(plant(3, FERN, 5.0, 5.0)).unwrap();
        s.remove(PlantId(2));
        s.remove(PlantId(3));
        assert!(s.is_empty());
        assert!(s.species_present().is_empty());
        assert_eq!(s.occupied_cell_count(), 0);
    }

    #[test]
    fn one_plant_per_cell_sparsest_first() {
        let mut s = storage();
        // Three grass plants in cell (0, 0), one in (5, 5), two in (2, 0).
        s.add(plant(1, GRASS, 1.0, 1.0)).unwrap();
        s.add(plant(2, GRASS, 2.0, 1.0)).unwrap();
        s.add(plant(3, GRASS, 3.0, 1.0)).unwrap();
        s.add(plant(4, GRASS, 55.0, 55.0)).unwrap();
        s.add(plant(5, GRASS, 21.0, 1.0)).unwrap();
        s.add(plant(6, GRASS, 22.0, 1.0)).unwrap();
        // Ferns do not count towards grass sampling.
        s.add(plant(7, FERN, 56.0, 56.0)).unwrap();

        let mut rng = ChaCha8Rng::seed_from_u64(1);
        for _ in 0..20 {
            let picks = s.get_one_plant_per_cell(GRASS, &mut rng);
            assert_eq!(picks.len(), 3);
            assert_eq!(picks[0], PlantId(4));
            assert!([PlantId(5), PlantId(6)].contains(&picks[1]));
            assert!([PlantId(1), PlantId(2), PlantId(3)].contains(&picks[2]));
            let cells: BTreeSet<CellCoord> = picks
                .iter()
                .map(|id| s.cells.cell_of(s.get(*id).unwrap().position()))
                .collect();
            assert_eq!(cells.len(), picks.len());
        }
        assert!(s.get_one_plant_per_cell(SpeciesId(99), &mut rng).is_empty());
    }

    #[test]
    fn nearest_plant_respects_radius() {
        let mut s = storage();
        s.add(plant(1, GRASS, 10.0, 10.0)).unwrap();
        s.add(plant(2, FERN, 30.0, 10.0)).unwrap();
        let (id, d) = s.nearest_plant(Position::new(14.0, 10.0), 20.0).unwrap();
        assert_eq!(id, PlantId(1));
        assert!((d - 4.0).abs() < 1e-5);
        assert_eq!(
            s.nearest_plant(Position::new(26.0, 10.0), 20.0).map(|(id, _)| id),
            Some(PlantId(2))
        );
        assert!(s.nearest_plant(Position::new(80.0, 80.0), 5.0).is_none());
    }

    #[test]
    fn filtered_nearest_plant_skips_rejected_plants() {
        let mut s = storage();
        s.add(plant(1, FERN, 10.0, 10.0)).unwrap();
        s.add(plant(2, GRASS, 30.0, 10.0)).unwrap();
        let origin = Position::new(12.0, 10.0);
        let found = s.nearest_plant_where(origin, 25.0, |p| p.species() != FERN);
        assert_eq!(found.map(|(id, _)| id), Some(PlantId(2)));
        assert!(s.nearest_plant_where(origin, 10.0, |p| p.species() != FERN).is_none());
    }

    #[test]
    fn species_points_group_positions() {
        let mut s = storage();
        s.add(plant(1, GRASS, 1.0, 1.0)).unwrap();
        s.add(plant(2, GRASS, 2.0, 2.0)).unwrap();
        s.add(plant(3, FERN, 3.0, 3.0)).unwrap();
        let points = s.species_points();
        assert_eq!(points[&GRASS].len(), 2);
        assert_eq!(points[&FERN], vec![Position::new(3.0, 3.0)]);
        s.clear();
        assert!(s.species_points().is_empty());
        assert!(!s.is_plant_at_location(Position::new(1.0, 1.0)));
    }
}
