// Plant — one individual and its monthly state machine.
//
// A plant aggregates the four constrainers and a growth manager built from
// its species record at birth. Each call to `update()` advances it by one
// month:
//
//   1. age += 1
//   2. evaluate the four constrainers; the minimum is the bottleneck
//   3. pain: +PAIN_INCREMENT while that minimum is negative, else reset to 0
//   4. vigor = minimum - pain
//   5. grow if vigor > 0
//   6. if vigor < 0, die when resilience <= |vigor| * 10
//
// Resilience is drawn once at birth from [0, RESILIENCE_MAX], so a given
// amount of stress kills some individuals and spares others. The cause of
// death is the bottleneck refined by the side of the prime window its last
// input fell on. `Dead` is terminal: further updates are no-ops.
//
// Plants live only in `PlantStorage`; the environment and the simulator
// refer to them by `PlantId`.

use crate::constrainer::{
    Constrainer, ConstrainerKind, Exposure, MAX_STRENGTH, ResourceSample, Side,
};
use crate::environment::Footprint;
use crate::growth::GrowthManager;
use crate::soil_humidity::HumidityRequest;
use crate::species::{SeedingProperties, SpecieProperties};
use crate::types::{PlantId, Position, SpeciesId};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::f32::consts::TAU;

/// Added to a plant's pain every month its pre-pain strength is negative.
pub const PAIN_INCREMENT: i32 = 10;

/// Upper bound (inclusive) of the resilience drawn at birth.
pub const RESILIENCE_MAX: u16 = 1000;

/// Multiplier applied to `|vigor|` before comparing with resilience.
const LETHALITY_FACTOR: i32 = 10;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DeathCause {
    OldAge,
    Underexposure,
    Overexposure,
    Drought,
    Flood,
    Cold,
    Heat,
}

impl DeathCause {
    /// Attribute a death to the bottleneck factor and its direction.
    pub fn from_bottleneck(kind: ConstrainerKind, side: Side) -> Self {
        let low = side == Side::Below;
        match kind {
            ConstrainerKind::Age => DeathCause::OldAge,
            ConstrainerKind::Illumination if low => DeathCause::Underexposure,
            ConstrainerKind::Illumination => DeathCause::Overexposure,
            ConstrainerKind::SoilHumidity if low => DeathCause::Drought,
            ConstrainerKind::SoilHumidity => DeathCause::Flood,
            ConstrainerKind::Temperature if low => DeathCause::Cold,
            ConstrainerKind::Temperature => DeathCause::Heat,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlantStatus {
    Alive,
    Dead(DeathCause),
}

impl PlantStatus {
    pub fn is_alive(self) -> bool {
        self == PlantStatus::Alive
    }
}

#[derive(Clone, Debug)]
pub struct Plant {
    id: PlantId,
    species: SpeciesId,
    position: Position,
    resilience: u16,
    constrainers: [Constrainer; 4],
    growth: GrowthManager,
    seeding: SeedingProperties,
    /// Humidity asked of every cell under the roots each month.
    humidity_demand: f32,
    age_months: u32,
    vigor: i32,
    bottleneck: Option<ConstrainerKind>,
    pain: i32,
    status: PlantStatus,
}

impl Plant {
    /// A newborn plant with a random resilience.
    pub fn new<R: Rng + ?Sized>(
        id: PlantId,
        properties: &SpecieProperties,
        position: Position,
        rng: &mut R,
    ) -> Self {
        let resilience = rng.random_range(0..=RESILIENCE_MAX);
        Self::with_resilience(id, properties, position, resilience)
    }

    /// A newborn plant with a fixed resilience (clamped to `RESILIENCE_MAX`).
    pub fn with_resilience(
        id: PlantId,
        properties: &SpecieProperties,
        position: Position,
        resilience: u16,
    ) -> Self {
        Self {
            id,
            species: properties.id,
            position,
            resilience: resilience.min(RESILIENCE_MAX),
            constrainers: Constrainer::for_species(properties),
            growth: GrowthManager::new(&properties.growth),
            seeding: properties.seeding,
            humidity_demand: properties.soil_humidity.prime_max,
            age_months: 0,
            vigor: MAX_STRENGTH,
            bottleneck: None,
            pain: 0,
            status: PlantStatus::Alive,
        }
    }

    /// Advance one month against the sampled resources.
    pub fn update(&mut self, sample: ResourceSample) -> PlantStatus {
        if !self.status.is_alive() {
            return self.status;
        }
        self.age_months += 1;
        let exposure = Exposure::new(self.age_months, sample);

        // Ties keep the first constrainer in kind order.
        let mut min_strength = i32::MAX;
        let mut bottleneck = 0;
        for (i, constrainer) in self.constrainers.iter_mut().enumerate() {
            let strength = constrainer.strength(&exposure);
            if strength < min_strength {
                min_strength = strength;
                bottleneck = i;
            }
        }
        self.bottleneck = Some(self.constrainers[bottleneck].kind());

        if min_strength < 0 {
            self.pain += PAIN_INCREMENT;
        } else {
            self.pain = 0;
        }
        self.vigor = min_strength - self.pain;

        if self.vigor > 0 {
            self.growth.grow(self.vigor);
        } else if self.vigor < 0
            && i32::from(self.resilience) <= self.vigor.abs() * LETHALITY_FACTOR
        {
            let limiting = &self.constrainers[bottleneck];
            self.status = PlantStatus::Dead(DeathCause::from_bottleneck(
                limiting.kind(),
                limiting.side(),
            ));
        }
        self.status
    }

    /// Current resource claims, for registration with the environment.
    pub fn footprint(&self) -> Footprint {
        Footprint {
            plant: self.id,
            position: self.position,
            height: self.growth.height(),
            canopy_radius: self.growth.canopy_radius(),
            root_radius: self.growth.root_radius(),
            humidity: HumidityRequest::new(self.humidity_demand, self.growth.root_radius()),
        }
    }

    pub fn is_fertile(&self) -> bool {
        self.status.is_alive() && self.age_months >= self.seeding.maturity_age
    }

    /// A uniformly random point within the species' seeding distance. The
    /// result may fall outside the world; placement is checked by storage.
    pub fn seed_position<R: Rng + ?Sized>(&self, rng: &mut R) -> Position {
        let max = self.seeding.max_distance.max(0.0);
        if max == 0.0 {
            return self.position;
        }
        // sqrt keeps the density uniform over the disc.
        let r = max * rng.random_range(0.0..1.0_f32).sqrt();
        let angle = rng.random_range(0.0..TAU);
        Position::new(
            self.position.x + r * angle.cos(),
            self.position.y + r * angle.sin(),
        )
    }

    pub fn id(&self) -> PlantId {
        self.id
    }

    pub fn species(&self) -> SpeciesId {
        self.species
    }

    pub fn position(&self) -> Position {
        self.position
    }

    pub fn resilience(&self) -> u16 {
        self.resilience
    }

    pub fn age_months(&self) -> u32 {
        self.age_months
    }

    pub fn vigor(&self) -> i32 {
        self.vigor
    }

    pub fn pain(&self) -> i32 {
        self.pain
    }

    /// The limiting factor of the last update, if any update has run.
    pub fn bottleneck(&self) -> Option<ConstrainerKind> {
        self.bottleneck
    }

    pub fn status(&self) -> PlantStatus {
        self.status
    }

    pub fn seed_count(&self) -> u32 {
        self.seeding.seed_count
    }

    pub fn max_seed_distance(&self) -> f32 {
        self.seeding.max_distance
    }

    pub fn height(&self) -> f32 {
        self.growth.height()
    }

    pub fn canopy_radius(&self) -> f32 {
        self.growth.canopy_radius()
    }

    pub fn root_radius(&self) -> f32 {
        self.growth.root_radius()
    }

    pub fn growth(&self) -> &GrowthManager {
        &self.growth
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constrainer::MIN_STRENGTH;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn grass() -> SpecieProperties {
        SpecieProperties::grass(SpeciesId(4))
    }

    /// Middle of every prime window for `props`.
    fn ideal(props: &SpecieProperties) -> ResourceSample {
        ResourceSample {
            illumination: props.illumination.prime_mid(),
            soil_humidity: props.soil_humidity.prime_mid(),
            temperature: props.temperature.prime_mid(),
        }
    }

    #[test]
    fn ideal_conditions_grow_without_pain() {
        let props = grass();
        let mut plant = Plant::with_resilience(PlantId(1), &props, Position::new(1.0, 1.0), 0);
        for month in 1..=12 {
            let before = plant.height();
            assert_eq!(plant.update(ideal(&props)), PlantStatus::Alive);
            assert_eq!(plant.age_months(), month);
            assert_eq!(plant.pain(), 0);
            assert_eq!(plant.vigor(), MAX_STRENGTH);
            assert!(plant.height() > before || plant.growth().is_fully_grown());
        }
    }

    #[test]
    fn severe_drought_kills_even_the_most_resilient() {
        let props = grass();
        let mut plant =
            Plant::with_resilience(PlantId(1), &props, Position::new(1.0, 1.0), RESILIENCE_MAX);
        let mut dry = ideal(&props);
        dry.soil_humidity = props.soil_humidity.min - 10.0;

        plant.update(dry);
        assert_eq!(plant.pain(), PAIN_INCREMENT);
        assert_eq!(plant.vigor(), MIN_STRENGTH - PAIN_INCREMENT);
        assert_eq!(plant.bottleneck(), Some(ConstrainerKind::SoilHumidity));

        // 1000 <= 110 * 10
        assert_eq!(plant.status(), PlantStatus::Dead(DeathCause::Drought));
    }

    #[test]
    fn mild_stress_builds_pain_on_a_resilient_plant() {
        let props = grass();
        let mut plant =
            Plant::with_resilience(PlantId(1), &props, Position::new(1.0, 1.0), RESILIENCE_MAX);
        let mut cool = ideal(&props);
        // Slightly below prime_min: small negative strength.
        let t = &props.temperature;
        cool.temperature = t.prime_min - (t.prime_min - t.min) * 0.55;

        plant.update(cool);
        let first = plant.vigor();
        assert!(first < 0);
        assert_eq!(plant.pain(), PAIN_INCREMENT);
        assert!(plant.status().is_alive());

        plant.update(cool);
        assert_eq!(plant.pain(), 2 * PAIN_INCREMENT);
        assert_eq!(plant.vigor(), first - PAIN_INCREMENT);

        plant.update(ideal(&props));
        assert_eq!(plant.pain(), 0);
        assert_eq!(plant.vigor(), MAX_STRENGTH);
    }

    #[test]
    fn no_growth_when_vigor_is_not_positive() {
        let props = grass();
        let mut plant =
            Plant::with_resilience(PlantId(1), &props, Position::new(1.0, 1.0), RESILIENCE_MAX);
        let mut cool = ideal(&props);
        let t = &props.temperature;
        cool.temperature = t.prime_min - (t.prime_min - t.min) * 0.55;
        plant.update(cool);
        assert!(plant.status().is_alive());
        assert_eq!(plant.height(), 0.0);
    }

    #[test]
    fn death_cause_follows_side() {
        let props = grass();
        type Tweak = fn(&mut ResourceSample, &SpecieProperties);
        let cases: [(Tweak, DeathCause); 5] = [
            (|s, p| s.illumination = p.illumination.min - 1.0, DeathCause::Underexposure),
            (|s, p| s.illumination = p.illumination.max + 1.0, DeathCause::Overexposure),
            (|s, p| s.soil_humidity = p.soil_humidity.max + 1.0, DeathCause::Flood),
            (|s, p| s.temperature = p.temperature.min - 1.0, DeathCause::Cold),
            (|s, p| s.temperature = p.temperature.max + 1.0, DeathCause::Heat),
        ];
        for (apply, cause) in cases {
            let mut plant = Plant::with_resilience(PlantId(1), &props, Position::new(0.0, 0.0), 0);
            let mut sample = ideal(&props);
            apply(&mut sample, &props);
            assert_eq!(plant.update(sample), PlantStatus::Dead(cause));
        }
    }

    #[test]
    fn old_age_kills_past_max_age() {
        let props = grass();
        let mut plant = Plant::with_resilience(PlantId(1), &props, Position::new(0.0, 0.0), 0);
        let mut status = PlantStatus::Alive;
        for _ in 0..(props.ageing.max_age * 3) {
            status = plant.update(ideal(&props));
            if !status.is_alive() {
                break;
            }
        }
        assert_eq!(status, PlantStatus::Dead(DeathCause::OldAge));
        assert!(plant.age_months() > props.ageing.max_age);
    }

    #[test]
    fn dead_is_terminal() {
        let props = grass();
        let mut plant = Plant::with_resilience(PlantId(1), &props, Position::new(0.0, 0.0), 0);
        let mut sample = ideal(&props);
        sample.temperature = props.temperature.max + 50.0;
        let dead = plant.update(sample);
        let age = plant.age_months();
        assert_eq!(plant.update(ideal(&props)), dead);
        assert_eq!(plant.age_months(), age);
    }

    #[test]
    fn fertility_starts_at_maturity() {
        let props = grass();
        let mut plant = Plant::with_resilience(PlantId(1), &props, Position::new(0.0, 0.0), 0);
        for _ in 0..props.seeding.maturity_age - 1 {
            plant.update(ideal(&props));
        }
        assert!(!plant.is_fertile());
        plant.update(ideal(&props));
        assert!(plant.is_fertile());
    }

    #[test]
    fn seed_positions_stay_within_distance() {
        let props = SpecieProperties::oak(SpeciesId(1));
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let origin = Position::new(50.0, 50.0);
        let plant = Plant::new(PlantId(1), &props, origin, &mut rng);
        assert!(plant.resilience() <= RESILIENCE_MAX);
        for _ in 0..500 {
            let p = plant.seed_position(&mut rng);
            assert!(p.distance(origin) <= props.seeding.max_distance + 1e-3);
        }
    }

    #[test]
    fn footprint_tracks_growth() {
        let props = grass();
        let mut plant = Plant::with_resilience(PlantId(7), &props, Position::new(2.0, 3.0), 0);
        let fp = plant.footprint();
        assert_eq!(fp.plant, PlantId(7));
        assert_eq!(fp.root_radius, 0.0);
        assert_eq!(fp.humidity.amount, props.soil_humidity.prime_max);

        plant.update(ideal(&props));
        let fp = plant.footprint();
        assert!(fp.height > 0.0);
        assert_eq!(fp.humidity.weight, plant.root_radius());
    }
}
