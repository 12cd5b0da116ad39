// Uniform spatial grid with lazily created cells.
//
// `SpatialGrid<T>` divides the world rectangle `[0, width) x [0, height)`
// into `columns x rows` cells of `cell_width x cell_height`. A cell's payload
// `T` is only materialized the first time it is touched (`get_or_init`), so a
// sparse forest costs memory proportional to the cells actually used.
//
// The one non-trivial query is `cells_in_radius()`: every cell whose bounding
// box intersects a circle, clamped to the world bounds. It serves both the
// resource footprints (canopy and root radius, see `environment.rs`) and the
// neighbour searches in `storage.rs`.
//
// Cells are kept in a `BTreeMap` keyed by `CellCoord` so iteration order is
// the same on every run; seeded runs must replay identically.

use crate::types::{CellCoord, Position};
use smallvec::SmallVec;
use std::collections::BTreeMap;

/// Cell list returned by footprint queries. Most footprints touch a handful
/// of cells, so the common case stays on the stack.
pub type CellList = SmallVec<[CellCoord; 16]>;

/// Generic uniform grid keyed by integer cell coordinate.
#[derive(Clone, Debug)]
pub struct SpatialGrid<T> {
    world_width: f32,
    world_height: f32,
    cell_width: f32,
    cell_height: f32,
    columns: i32,
    rows: i32,
    cells: BTreeMap<CellCoord, T>,
}

impl<T> SpatialGrid<T> {
    /// Create an empty grid. Dimensions must be positive; the last column
    /// and row may be partial when the world size is not a multiple of the
    /// cell size.
    pub fn new(world_width: f32, world_height: f32, cell_width: f32, cell_height: f32) -> Self {
        assert!(
            world_width.is_finite() && world_height.is_finite(),
            "SpatialGrid: world dimensions must be finite"
        );
        assert!(
            world_width > 0.0 && world_height > 0.0,
            "SpatialGrid: world dimensions must be positive"
        );
        assert!(
            cell_width > 0.0 && cell_height > 0.0,
            "SpatialGrid: cell dimensions must be positive"
        );
        Self {
            world_width,
            world_height,
            cell_width,
            cell_height,
            columns: (world_width / cell_width).ceil() as i32,
            rows: (world_height / cell_height).ceil() as i32,
            cells: BTreeMap::new(),
        }
    }

    pub fn world_width(&self) -> f32 {
        self.world_width
    }

    pub fn world_height(&self) -> f32 {
        self.world_height
    }

    pub fn cell_width(&self) -> f32 {
        self.cell_width
    }

    pub fn cell_height(&self) -> f32 {
        self.cell_height
    }

    pub fn columns(&self) -> i32 {
        self.columns
    }

    pub fn rows(&self) -> i32 {
        self.rows
    }

    /// Whether a position lies inside the world rectangle.
    pub fn in_bounds(&self, pos: Position) -> bool {
        pos.x >= 0.0 && pos.y >= 0.0 && pos.x < self.world_width && pos.y < self.world_height
    }

    /// Whether a cell coordinate addresses a cell inside the world.
    pub fn contains_cell(&self, coord: CellCoord) -> bool {
        coord.x >= 0 && coord.y >= 0 && coord.x < self.columns && coord.y < self.rows
    }

    /// Address of the cell containing `pos`.
    pub fn cell_of(&self, pos: Position) -> CellCoord {
        CellCoord::new(
            (pos.x / self.cell_width).floor() as i32,
            (pos.y / self.cell_height).floor() as i32,
        )
    }

    /// Top-left and bottom-right corners of a cell, in world units.
    pub fn cell_bounds(&self, coord: CellCoord) -> (Position, Position) {
        let min = Position::new(
            coord.x as f32 * self.cell_width,
            coord.y as f32 * self.cell_height,
        );
        let max = Position::new(min.x + self.cell_width, min.y + self.cell_height);
        (min, max)
    }

    /// Every in-bounds cell whose bounding box intersects the circle of
    /// `radius` around `center`, in row-major order. A zero (or negative)
    /// radius yields the cell containing `center` if it is in bounds.
    pub fn cells_in_radius(&self, center: Position, radius: f32) -> CellList {
        let radius = radius.max(0.0);
        let r2 = radius * radius;

        let min_x = ((center.x - radius) / self.cell_width).floor() as i32;
        let max_x = ((center.x + radius) / self.cell_width).floor() as i32;
        let min_y = ((center.y - radius) / self.cell_height).floor() as i32;
        let max_y = ((center.y + radius) / self.cell_height).floor() as i32;

        let min_x = min_x.max(0);
        let min_y = min_y.max(0);
        let max_x = max_x.min(self.columns - 1);
        let max_y = max_y.min(self.rows - 1);

        let mut out = CellList::new();
        for y in min_y..=max_y {
            for x in min_x..=max_x {
                let coord = CellCoord::new(x, y);
                let (lo, hi) = self.cell_bounds(coord);
                // Closest point of the cell rectangle to the circle center.
                let nx = center.x.clamp(lo.x, hi.x);
                let ny = center.y.clamp(lo.y, hi.y);
                if Position::new(nx, ny).distance_squared(center) <= r2 {
                    out.push(coord);
                }
            }
        }
        out
    }

    pub fn get(&self, coord: CellCoord) -> Option<&T> {
        self.cells.get(&coord)
    }

    pub fn get_mut(&mut self, coord: CellCoord) -> Option<&mut T> {
        self.cells.get_mut(&coord)
    }

    /// Return the cell at `coord`, creating it with `init` on first access.
    pub fn get_or_init_with(&mut self, coord: CellCoord, init: impl FnOnce() -> T) -> &mut T {
        self.cells.entry(coord).or_insert_with(init)
    }

    /// Drop a single cell, returning its payload.
    pub fn remove(&mut self, coord: CellCoord) -> Option<T> {
        self.cells.remove(&coord)
    }

    /// Existing cells in coordinate order.
    pub fn iter(&self) -> impl Iterator<Item = (CellCoord, &T)> {
        self.cells.iter().map(|(c, t)| (*c, t))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (CellCoord, &mut T)> {
        self.cells.iter_mut().map(|(c, t)| (*c, t))
    }

    /// Number of materialized cells.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Drop every cell. Used on simulation reset.
    pub fn clear(&mut self) {
        self.cells.clear();
    }
}

impl<T: Default> SpatialGrid<T> {
    /// Return the cell at `coord`, creating a default one on first access.
    pub fn get_or_init(&mut self, coord: CellCoord) -> &mut T {
        self.cells.entry(coord).or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid() -> SpatialGrid<u32> {
        SpatialGrid::new(100.0, 50.0, 10.0, 10.0)
    }

    #[test]
    fn cell_addressing_uses_floor() {
        let g = grid();
        assert_eq!(g.columns(), 10);
        assert_eq!(g.rows(), 5);
        assert_eq!(g.cell_of(Position::new(0.0, 0.0)), CellCoord::new(0, 0));
        assert_eq!(g.cell_of(Position::new(9.99, 10.0)), CellCoord::new(0, 1));
        assert_eq!(g.cell_of(Position::new(55.0, 49.0)), CellCoord::new(5, 4));
    }

    #[test]
    fn partial_last_column_is_counted() {
        let g: SpatialGrid<()> = SpatialGrid::new(95.0, 50.0, 10.0, 10.0);
        assert_eq!(g.columns(), 10);
    }

    #[test]
    fn zero_radius_returns_containing_cell() {
        let g = grid();
        let cells = g.cells_in_radius(Position::new(15.0, 25.0), 0.0);
        assert_eq!(cells.as_slice(), &[CellCoord::new(1, 2)]);
    }

    #[test]
    fn circle_skips_cells_touched_only_by_bounding_square() {
        let g = grid();
        // Center in the middle of cell (5, 2); radius reaches into the four
        // edge neighbours but not the diagonal corners.
        let cells = g.cells_in_radius(Position::new(55.0, 25.0), 6.0);
        assert!(cells.contains(&CellCoord::new(5, 2)));
        assert!(cells.contains(&CellCoord::new(4, 2)));
        assert!(cells.contains(&CellCoord::new(6, 2)));
        assert!(cells.contains(&CellCoord::new(5, 1)));
        assert!(cells.contains(&CellCoord::new(5, 3)));
        assert!(!cells.contains(&CellCoord::new(4, 1)));
        assert!(!cells.contains(&CellCoord::new(6, 3)));
        assert_eq!(cells.len(), 5);
    }

    #[test]
    fn circle_includes_diagonals_when_large_enough() {
        let g = grid();
        // Distance from (55, 25) to the corner (50, 20) is ~7.07.
        let cells = g.cells_in_radius(Position::new(55.0, 25.0), 7.2);
        assert!(cells.contains(&CellCoord::new(4, 1)));
        assert_eq!(cells.len(), 9);
    }

    #[test]
    fn query_is_clamped_to_world_bounds() {
        let g = grid();
        let cells = g.cells_in_radius(Position::new(1.0, 1.0), 30.0);
        assert!(cells.iter().all(|c| g.contains_cell(*c)));
        assert!(cells.contains(&CellCoord::new(0, 0)));

        let far = g.cells_in_radius(Position::new(99.0, 49.0), 1000.0);
        assert_eq!(far.len(), 50);
    }

    #[test]
    fn cells_are_created_lazily_and_cleared() {
        let mut g = grid();
        assert!(g.is_empty());
        *g.get_or_init(CellCoord::new(2, 3)) += 4;
        *g.get_or_init(CellCoord::new(2, 3)) += 1;
        assert_eq!(g.get(CellCoord::new(2, 3)), Some(&5));
        assert_eq!(g.len(), 1);
        g.clear();
        assert!(g.get(CellCoord::new(2, 3)).is_none());
    }

    #[test]
    fn iteration_is_in_coordinate_order() {
        let mut g = grid();
        g.get_or_init_with(CellCoord::new(3, 0), || 1);
        g.get_or_init_with(CellCoord::new(0, 1), || 2);
        g.get_or_init_with(CellCoord::new(1, 0), || 3);
        let order: Vec<CellCoord> = g.iter().map(|(c, _)| c).collect();
        let mut sorted = order.clone();
        sorted.sort();
        assert_eq!(order, sorted);
    }
}
