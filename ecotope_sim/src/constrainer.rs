// Constrainers — per-factor strength functions.
//
// A plant's health is limited by four independent factors: age,
// illumination, soil humidity and temperature. Each factor is a
// `Constrainer` mapping the plant's current exposure to an integer strength
// in `[MIN_STRENGTH, MAX_STRENGTH]`. The plant's vigor is the minimum of the
// four (see `plant.rs`), so the weakest factor is the bottleneck.
//
// All four shapes are piecewise linear with two segments:
//
//   age:      MAX ─────────┐                 (flat until start_of_decline,
//                          └──────── 0 @ max_age, and on past it)
//
//   resource: -MAX @ min ──/ MAX ───── MAX \── -MAX @ max
//                       prime_min    prime_max
//
// Line coefficients are computed once, from the species record, when the
// plant is created; evaluation is one multiply-add and a clamp.
//
// The set of factors is closed, so `Constrainer` is an enum rather than a
// trait object. Each resource constrainer remembers which side of its prime
// window the last evaluation fell on, so a death can be attributed to
// drought vs. flood, cold vs. heat, or too little vs. too much light.

use crate::species::{AgeingProperties, SpecieProperties, ToleranceRange};
use serde::{Deserialize, Serialize};

pub const MAX_STRENGTH: i32 = 100;
pub const MIN_STRENGTH: i32 = -100;

// ---------------------------------------------------------------------------
// Building blocks
// ---------------------------------------------------------------------------

/// `y = slope * x + intercept`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Line {
    pub slope: f32,
    pub intercept: f32,
}

impl Line {
    /// The line through two points, or `None` when they share an x (a
    /// vertical step, which callers treat as an immediate drop).
    pub fn through(x0: f32, y0: f32, x1: f32, y1: f32) -> Option<Self> {
        let dx = x1 - x0;
        if dx == 0.0 {
            return None;
        }
        let slope = (y1 - y0) / dx;
        Some(Self {
            slope,
            intercept: y0 - slope * x0,
        })
    }

    pub fn eval(&self, x: f32) -> f32 {
        self.slope * x + self.intercept
    }
}

fn clamp_strength(value: f32) -> i32 {
    (value.round() as i32).clamp(MIN_STRENGTH, MAX_STRENGTH)
}

/// Where the last input fell relative to the prime window.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Below,
    #[default]
    Within,
    Above,
}

/// Which factor a constrainer models.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ConstrainerKind {
    Age,
    Illumination,
    SoilHumidity,
    Temperature,
}

/// Resource levels sampled from the environment for one plant.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceSample {
    pub illumination: f32,
    pub soil_humidity: f32,
    pub temperature: f32,
}

/// The inputs every constrainer reads from, gathered once per tick.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Exposure {
    /// Age in months.
    pub age_months: u32,
    /// Mean daily hours of light over the canopy footprint.
    pub illumination: f32,
    /// Mean granted soil humidity over the root footprint.
    pub soil_humidity: f32,
    /// Temperature at the plant's position.
    pub temperature: f32,
}

impl Exposure {
    pub fn new(age_months: u32, sample: ResourceSample) -> Self {
        Self {
            age_months,
            illumination: sample.illumination,
            soil_humidity: sample.soil_humidity,
            temperature: sample.temperature,
        }
    }
}

// ---------------------------------------------------------------------------
// Shapes
// ---------------------------------------------------------------------------

/// Full strength until `start_of_decline`, then a straight line reaching 0 at
/// `max_age`. The line keeps going past `max_age`; only the global strength
/// clamp bounds it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AgeStrength {
    start_of_decline: f32,
    decline: Option<Line>,
}

impl AgeStrength {
    pub fn new(ageing: &AgeingProperties) -> Self {
        let start = ageing.start_of_decline as f32;
        Self {
            start_of_decline: start,
            decline: Line::through(start, MAX_STRENGTH as f32, ageing.max_age as f32, 0.0),
        }
    }

    pub fn strength(&self, age_months: u32) -> i32 {
        let age = age_months as f32;
        if age <= self.start_of_decline {
            return MAX_STRENGTH;
        }
        match self.decline {
            Some(line) => clamp_strength(line.eval(age)),
            // start_of_decline == max_age: the plant drops straight to zero.
            None => 0,
        }
    }
}

/// Two-line window shape shared by the three resource factors.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WindowStrength {
    prime_min: f32,
    prime_max: f32,
    below: Option<Line>,
    above: Option<Line>,
    side: Side,
}

impl WindowStrength {
    pub fn new(range: &ToleranceRange) -> Self {
        let max = MAX_STRENGTH as f32;
        Self {
            prime_min: range.prime_min,
            prime_max: range.prime_max,
            below: Line::through(range.prime_min, max, range.min, -max),
            above: Line::through(range.prime_max, max, range.max, -max),
            side: Side::Within,
        }
    }

    /// Strength for `value`, recording which side of the window it was on.
    pub fn strength(&mut self, value: f32) -> i32 {
        if value < self.prime_min {
            self.side = Side::Below;
            self.below.map_or(MIN_STRENGTH, |l| clamp_strength(l.eval(value)))
        } else if value > self.prime_max {
            self.side = Side::Above;
            self.above.map_or(MIN_STRENGTH, |l| clamp_strength(l.eval(value)))
        } else {
            self.side = Side::Within;
            MAX_STRENGTH
        }
    }

    pub fn side(&self) -> Side {
        self.side
    }
}

// ---------------------------------------------------------------------------
// Constrainer
// ---------------------------------------------------------------------------

/// One of the four limiting factors, parameterized for a species.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Constrainer {
    Age(AgeStrength),
    Illumination(WindowStrength),
    SoilHumidity(WindowStrength),
    Temperature(WindowStrength),
}

impl Constrainer {
    /// The four constrainers for a species, in `ConstrainerKind` order.
    pub fn for_species(properties: &SpecieProperties) -> [Constrainer; 4] {
        [
            Constrainer::Age(AgeStrength::new(&properties.ageing)),
            Constrainer::Illumination(WindowStrength::new(&properties.illumination)),
            Constrainer::SoilHumidity(WindowStrength::new(&properties.soil_humidity)),
            Constrainer::Temperature(WindowStrength::new(&properties.temperature)),
        ]
    }

    pub fn kind(&self) -> ConstrainerKind {
        match self {
            Constrainer::Age(_) => ConstrainerKind::Age,
            Constrainer::Illumination(_) => ConstrainerKind::Illumination,
            Constrainer::SoilHumidity(_) => ConstrainerKind::SoilHumidity,
            Constrainer::Temperature(_) => ConstrainerKind::Temperature,
        }
    }

    /// Evaluate against this tick's exposure.
    pub fn strength(&mut self, exposure: &Exposure) -> i32 {
        match self {
            Constrainer::Age(c) => c.strength(exposure.age_months),
            Constrainer::Illumination(c) => c.strength(exposure.illumination),
            Constrainer::SoilHumidity(c) => c.strength(exposure.soil_humidity),
            Constrainer::Temperature(c) => c.strength(exposure.temperature),
        }
    }

    /// Direction of the last evaluation. Age only ever declines, which is
    /// reported as `Above`.
    pub fn side(&self) -> Side {
        match self {
            Constrainer::Age(_) => Side::Above,
            Constrainer::Illumination(c)
            | Constrainer::SoilHumidity(c)
            | Constrainer::Temperature(c) => c.side(),
        }
    }
}
