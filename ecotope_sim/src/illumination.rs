// Illumination cells — occlusion-based light allocation.
//
// Light is not split between plants. Each cell remembers the height of every
// plant whose canopy covers it and tracks the tallest one (the "shade
// caster"). A plant asking for light in that cell gets the whole monthly
// ceiling if it is at least as tall as the shade caster, and nothing
// otherwise. A plant's illumination is the mean over all cells its canopy
// covers, so a plant partially shaded by a neighbour gets a partial share.
//
// Also home of `SeasonalRange`, the triangular month curve shared by every
// resource profile built from a `(min, max)` pair.
//
// See also: `soil_humidity.rs` for the contention-based counterpart,
// `environment.rs` which owns the grid of these cells.

use crate::types::{Month, PlantId};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

/// A `(min, max)` range turned into a yearly curve peaking in June.
///
/// `value(month) = min(max - |6 - month| * (max - min) / 6, max)`, i.e. `max`
/// in June, `min` in December, and a straight line in between.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SeasonalRange {
    pub min: f32,
    pub max: f32,
}

impl SeasonalRange {
    pub const fn new(min: f32, max: f32) -> Self {
        Self { min, max }
    }

    pub fn value(&self, month: Month) -> f32 {
        let distance_from_peak = (6 - month.number() as i32).abs() as f32;
        let step = (self.max - self.min) / 6.0;
        (self.max - distance_from_peak * step).min(self.max)
    }
}

/// Per-cell illumination state.
#[derive(Clone, Debug, Default)]
pub struct IlluminationCell {
    /// Daily hours of light available this month.
    ceiling: f32,
    occupants: FxHashMap<PlantId, f32>,
    /// Tallest occupant and its height. Ties keep the lowest id.
    tallest: Option<(PlantId, f32)>,
}

impl IlluminationCell {
    pub fn new(ceiling: f32) -> Self {
        Self {
            ceiling,
            ..Self::default()
        }
    }

    pub fn ceiling(&self) -> f32 {
        self.ceiling
    }

    pub fn set_ceiling(&mut self, ceiling: f32) {
        self.ceiling = ceiling;
    }

    /// Register or update an occupant's height.
    pub fn set_occupant(&mut self, plant: PlantId, height: f32) {
        self.occupants.insert(plant, height);
        match self.tallest {
            Some((id, h)) if id == plant && height < h => self.recompute_tallest(),
            Some((id, h)) if height > h || (height == h && plant < id) => {
                self.tallest = Some((plant, height));
            }
            Some(_) => {}
            None => self.tallest = Some((plant, height)),
        }
    }

    pub fn remove_occupant(&mut self, plant: PlantId) {
        if self.occupants.remove(&plant).is_none() {
            return;
        }
        if self.tallest.is_some_and(|(id, _)| id == plant) {
            self.recompute_tallest();
        }
    }

    fn recompute_tallest(&mut self) {
        self.tallest = self
            .occupants
            .iter()
            .map(|(id, h)| (*id, *h))
            .max_by(|a, b| a.1.total_cmp(&b.1).then(b.0.cmp(&a.0)));
    }

    /// The current shade caster, if any.
    pub fn tallest(&self) -> Option<(PlantId, f32)> {
        self.tallest
    }

    pub fn is_empty(&self) -> bool {
        self.occupants.is_empty()
    }

    /// Light received by `plant` of the given `height` in this cell: the
    /// whole ceiling when it is (or reaches) the tallest occupant, else zero.
    pub fn illumination_for(&self, plant: PlantId, height: f32) -> f32 {
        match self.tallest {
            None => self.ceiling,
            Some((id, max)) if id == plant || height >= max => self.ceiling,
            Some(_) => 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seasonal_curve_peaks_in_june() {
        let range = SeasonalRange::new(6.0, 18.0);
        assert_eq!(range.value(Month::JUNE), 18.0);
        assert_eq!(range.value(Month::DECEMBER), 6.0);
        assert_eq!(range.value(Month::JANUARY), 8.0);
        assert_eq!(range.value(Month::new(3).unwrap()), 12.0);
        assert_eq!(range.value(Month::new(9).unwrap()), 12.0);
    }

    #[test]
    fn seasonal_curve_is_flat_for_degenerate_range() {
        let range = SeasonalRange::new(10.0, 10.0);
        assert!(Month::all().all(|m| range.value(m) == 10.0));
    }

    #[test]
    fn tallest_occupant_gets_full_ceiling() {
        let mut cell = IlluminationCell::new(12.0);
        cell.set_occupant(PlantId(1), 3.0);
        cell.set_occupant(PlantId(2), 5.0);
        assert_eq!(cell.tallest(), Some((PlantId(2), 5.0)));
        assert_eq!(cell.illumination_for(PlantId(2), 5.0), 12.0);
        assert_eq!(cell.illumination_for(PlantId(1), 3.0), 0.0);
    }

    #[test]
    fn equal_height_shares_full_light() {
        let mut cell = IlluminationCell::new(10.0);
        cell.set_occupant(PlantId(1), 4.0);
        cell.set_occupant(PlantId(2), 4.0);
        assert_eq!(cell.illumination_for(PlantId(1), 4.0), 10.0);
        assert_eq!(cell.illumination_for(PlantId(2), 4.0), 10.0);
    }

    #[test]
    fn removing_shade_caster_promotes_next_tallest() {
        let mut cell = IlluminationCell::new(10.0);
        cell.set_occupant(PlantId(1), 2.0);
        cell.set_occupant(PlantId(2), 6.0);
        cell.set_occupant(PlantId(3), 4.0);
        cell.remove_occupant(PlantId(2));
        assert_eq!(cell.tallest(), Some((PlantId(3), 4.0)));
        assert_eq!(cell.illumination_for(PlantId(3), 4.0), 10.0);
        cell.remove_occupant(PlantId(3));
        cell.remove_occupant(PlantId(1));
        assert!(cell.tallest().is_none());
        assert!(cell.is_empty());
    }

    #[test]
    fn shrinking_shade_caster_is_recomputed() {
        let mut cell = IlluminationCell::new(10.0);
        cell.set_occupant(PlantId(1), 5.0);
        cell.set_occupant(PlantId(2), 3.0);
        cell.set_occupant(PlantId(1), 1.0);
        assert_eq!(cell.tallest(), Some((PlantId(2), 3.0)));
    }

    #[test]
    fn empty_cell_gives_ceiling_to_newcomer() {
        let cell = IlluminationCell::new(7.5);
        assert_eq!(cell.illumination_for(PlantId(9), 0.0), 7.5);
    }
}
