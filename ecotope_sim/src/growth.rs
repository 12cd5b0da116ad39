// Per-plant growth accumulation.
//
// A plant grows only in months where its vigor is positive. The height gain
// is `clamp01(vigor / 100) * max_monthly_growth`, capped at the species'
// `max_height`. Canopy and root radius follow height through fixed
// species ratios, so all three dimensions grow by the same vigor factor and
// none of them ever shrinks.

use crate::constrainer::MAX_STRENGTH;
use crate::species::GrowthProperties;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GrowthManager {
    max_height: f32,
    max_monthly_growth: f32,
    canopy_ratio: f32,
    root_ratio: f32,
    height: f32,
}

impl GrowthManager {
    /// A seed: zero height, zero canopy, zero roots.
    pub fn new(properties: &GrowthProperties) -> Self {
        Self {
            max_height: properties.max_height,
            max_monthly_growth: properties.max_monthly_growth,
            canopy_ratio: properties.canopy_ratio,
            root_ratio: properties.root_ratio,
            height: 0.0,
        }
    }

    /// Apply one month of growth at `vigor`. Returns the height gained.
    pub fn grow(&mut self, vigor: i32) -> f32 {
        if vigor <= 0 {
            return 0.0;
        }
        let factor = (vigor as f32 / MAX_STRENGTH as f32).clamp(0.0, 1.0);
        let before = self.height;
        self.height = (self.height + factor * self.max_monthly_growth).min(self.max_height);
        self.height - before
    }

    pub fn height(&self) -> f32 {
        self.height
    }

    pub fn canopy_radius(&self) -> f32 {
        self.height * self.canopy_ratio
    }

    pub fn root_radius(&self) -> f32 {
        self.height * self.root_ratio
    }

    pub fn is_fully_grown(&self) -> bool {
        self.height >= self.max_height
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> GrowthManager {
        GrowthManager::new(&GrowthProperties {
            max_height: 1.0,
            max_monthly_growth: 0.4,
            canopy_ratio: 0.5,
            root_ratio: 0.25,
        })
    }

    #[test]
    fn no_growth_without_positive_vigor() {
        let mut g = manager();
        assert_eq!(g.grow(0), 0.0);
        assert_eq!(g.grow(-40), 0.0);
        assert_eq!(g.height(), 0.0);
    }

    #[test]
    fn growth_scales_with_vigor() {
        let mut g = manager();
        g.grow(50);
        assert!((g.height() - 0.2).abs() < 1e-6);
        g.grow(100);
        assert!((g.height() - 0.6).abs() < 1e-6);
        assert!((g.canopy_radius() - 0.3).abs() < 1e-6);
        assert!((g.root_radius() - 0.15).abs() < 1e-6);
    }

    #[test]
    fn growth_is_capped_at_max_height() {
        let mut g = manager();
        for _ in 0..10 {
            g.grow(100);
        }
        assert_eq!(g.height(), 1.0);
        assert!(g.is_fully_grown());
        assert_eq!(g.grow(100), 0.0);
    }
}
