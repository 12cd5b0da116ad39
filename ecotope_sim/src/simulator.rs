// Simulation state, the monthly tick, and the threaded manager around it.
//
// `Simulation` owns everything a run needs: configuration, the resolved
// species records, the environment grids, plant storage, the seeded RNG,
// the plant id allocator and the elapsed month count. `trigger()` advances
// it by one month:
//
//   1. Resolve the calendar month and select it in the environment.
//   2. Sample every plant's resources and update it, in ascending id order.
//      All samples see last month's footprints.
//   3. Survivors push their new footprints; the dead release theirs and
//      leave storage.
//   4. Every `seeding.interval_months`, if seeding is enabled, reproduce:
//      species still present disperse seeds round-robin from one random
//      fertile parent per cell; configured species that have died out are
//      re-introduced with their initial batch.
//   5. Bump the month count and send a `TickReport` to subscribers.
//
// Plant ids come from a per-simulation allocator that `reset()` does not
// rewind, so an id is never reused.
//
// `SimulatorManager` is the threaded front end. It keeps the `Simulation`
// behind an `Arc<Mutex<_>>`, drives `trigger()` from a `TimeManager`
// callback, and refreshes a render buffer after every tick. Snapshot exports
// run on their own thread and hold the simulation lock only while reading.
// Poisoned locks are recovered, not propagated.
//
// See also: `environment.rs`, `storage.rs`, `plant.rs` for the parts the
// tick drives, `time_manager.rs` for the scheduler, `export.rs` for the
// snapshot types.

use crate::config::SimulationConfiguration;
use crate::environment::EnvironmentManager;
use crate::error::{SimError, StorageError};
use crate::export::{
    ColorRegistry, Disc, OccupancySnapshot, PlantRender, PointPatternAnalyzer, RenderSnapshot,
    StatisticalSnapshot,
};
use crate::plant::{DeathCause, Plant, PlantStatus};
use crate::species::{SpecieProperties, SpeciesCatalog};
use crate::storage::PlantStorage;
use crate::time_manager::TimeManager;
use crate::types::{Month, PlantId, PlantIdAllocator, Position, SpeciesId};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ops::ControlFlow;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Shade-biased placements look for a canopy within this many cells of a
/// random point.
const SHADE_SEARCH_CELLS: f32 = 4.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Death {
    pub plant: PlantId,
    pub species: SpeciesId,
    pub cause: DeathCause,
}

/// Summary of one tick.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TickReport {
    /// Months elapsed after this tick.
    pub elapsed_months: u64,
    /// Calendar month the tick simulated.
    pub month: Month,
    pub population: usize,
    pub births: usize,
    pub deaths: Vec<Death>,
    /// The configured duration has been reached.
    pub finished: bool,
}

// ---------------------------------------------------------------------------
// Simulation
// ---------------------------------------------------------------------------

pub struct Simulation {
    config: SimulationConfiguration,
    catalog: Arc<dyn SpeciesCatalog>,
    species: BTreeMap<SpeciesId, Arc<SpecieProperties>>,
    environment: EnvironmentManager,
    storage: PlantStorage,
    rng: ChaCha8Rng,
    ids: PlantIdAllocator,
    elapsed_months: u64,
    colors: ColorRegistry,
    subscribers: Vec<Sender<TickReport>>,
}

impl Simulation {
    /// Validate the configuration, resolve every configured species and
    /// spawn the initial population.
    pub fn new(
        config: SimulationConfiguration,
        catalog: Arc<dyn SpeciesCatalog>,
    ) -> Result<Self, SimError> {
        config.validate()?;
        let mut species = BTreeMap::new();
        for id in config.species_quantities.keys() {
            let properties = catalog.get(*id).ok_or(SimError::UnknownSpecies(*id))?;
            species.insert(*id, properties);
        }

        let w = config.world;
        let mut sim = Self {
            environment: EnvironmentManager::new(&config),
            storage: PlantStorage::new(w.width, w.height, w.cell_width, w.cell_height),
            rng: ChaCha8Rng::seed_from_u64(config.seed),
            ids: PlantIdAllocator::new(),
            elapsed_months: 0,
            colors: ColorRegistry::new(),
            subscribers: Vec::new(),
            species,
            catalog,
            config,
        };
        sim.spawn_initial_population();
        Ok(sim)
    }

    pub fn config(&self) -> &SimulationConfiguration {
        &self.config
    }

    pub fn storage(&self) -> &PlantStorage {
        &self.storage
    }

    pub fn environment(&self) -> &EnvironmentManager {
        &self.environment
    }

    pub fn elapsed_months(&self) -> u64 {
        self.elapsed_months
    }

    pub fn is_finished(&self) -> bool {
        self.elapsed_months >= self.config.duration_months
    }

    /// Receive a `TickReport` after every tick. Dropped receivers are
    /// pruned on the next send.
    pub fn subscribe(&mut self) -> Receiver<TickReport> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.push(tx);
        rx
    }

    fn properties(&mut self, species: SpeciesId) -> Result<Arc<SpecieProperties>, SimError> {
        if let Some(p) = self.species.get(&species) {
            return Ok(Arc::clone(p));
        }
        let p = self
            .catalog
            .get(species)
            .ok_or(SimError::UnknownSpecies(species))?;
        self.species.insert(species, Arc::clone(&p));
        Ok(p)
    }

    /// Create a plant of `species` at `position` and register it with
    /// storage and the environment.
    pub fn plant_at(
        &mut self,
        species: SpeciesId,
        position: Position,
    ) -> Result<PlantId, SimError> {
        let properties = self.properties(species)?;
        if !self.storage.in_bounds(position) {
            return Err(StorageError::OutOfBounds(position).into());
        }
        if self.storage.is_plant_at_location(position) {
            return Err(StorageError::LocationOccupied(position).into());
        }
        let id = self.ids.allocate();
        let plant = Plant::new(id, &properties, position, &mut self.rng);
        let footprint = plant.footprint();
        self.storage.add(plant)?;
        self.environment.update_footprint(footprint);
        tracing::trace!(%id, %species, %position, "plant added");
        Ok(id)
    }

    /// Advance one month.
    pub fn trigger(&mut self) -> TickReport {
        let month = Month::from_elapsed(self.elapsed_months);
        self.environment.set_month(month);

        let mut survivors = Vec::with_capacity(self.storage.len());
        let mut deaths = Vec::new();
        for id in self.storage.ids() {
            let Some(sample) = self.environment.sample(id) else {
                continue;
            };
            let Some(plant) = self.storage.get_mut(id) else {
                continue;
            };
            match plant.update(sample) {
                PlantStatus::Alive => survivors.push(id),
                PlantStatus::Dead(cause) => deaths.push(Death {
                    plant: id,
                    species: plant.species(),
                    cause,
                }),
            }
        }

        for id in survivors {
            if let Some(plant) = self.storage.get(id) {
                self.environment.update_footprint(plant.footprint());
            }
        }
        for death in &deaths {
            self.environment.release(death.plant);
            self.storage.remove(death.plant);
            tracing::trace!(plant = %death.plant, cause = ?death.cause, "plant died");
        }
        let mut extinct: Vec<SpeciesId> = deaths.iter().map(|d| d.species).collect();
        extinct.sort_unstable();
        extinct.dedup();
        for species in extinct {
            if self.storage.species_count(species) == 0 {
                tracing::info!(%species, month = self.elapsed_months + 1, "species died out");
            }
        }

        let completed = self.elapsed_months + 1;
        let mut births = 0;
        if self.config.seeding_enabled
            && completed % u64::from(self.config.seeding.interval_months) == 0
        {
            births = self.seed();
        }
        self.elapsed_months = completed;

        let report = TickReport {
            elapsed_months: self.elapsed_months,
            month,
            population: self.storage.len(),
            births,
            deaths,
            finished: self.is_finished(),
        };
        tracing::debug!(
            month = report.elapsed_months,
            population = report.population,
            births = report.births,
            deaths = report.deaths.len(),
            "tick"
        );
        self.subscribers.retain(|tx| tx.send(report.clone()).is_ok());
        report
    }

    // -----------------------------------------------------------------------
    // Seeding
    // -----------------------------------------------------------------------

    fn seed(&mut self) -> usize {
        let configured: Vec<(SpeciesId, u32)> = self
            .config
            .species_quantities
            .iter()
            .map(|(id, n)| (*id, *n))
            .collect();
        let mut births = 0;
        for (species, quantity) in configured {
            if self.storage.species_count(species) > 0 {
                births += self.disperse(species);
            } else if quantity > 0 {
                tracing::info!(%species, quantity, "re-introducing species");
                births += self.spawn_batch(species, quantity);
            }
        }
        births
    }

    /// One random fertile parent per cell; each parent drops one seed per
    /// round, for up to `seed_count` rounds.
    fn disperse(&mut self, species: SpeciesId) -> usize {
        let parents: Vec<PlantId> = self
            .storage
            .get_one_plant_per_cell(species, &mut self.rng)
            .into_iter()
            .filter(|id| self.storage.get(*id).is_some_and(Plant::is_fertile))
            .collect();
        let rounds = parents
            .iter()
            .filter_map(|id| self.storage.get(*id))
            .map(Plant::seed_count)
            .max()
            .unwrap_or(0);

        let mut births = 0;
        for round in 0..rounds {
            for parent in &parents {
                let Some(plant) = self.storage.get(*parent) else {
                    continue;
                };
                if round >= plant.seed_count() {
                    continue;
                }
                let position = plant.seed_position(&mut self.rng);
                match self.plant_at(species, position) {
                    Ok(_) => births += 1,
                    Err(e) => tracing::trace!(%parent, error = %e, "seed not placed"),
                }
            }
        }
        births
    }

    fn spawn_initial_population(&mut self) {
        let configured: Vec<(SpeciesId, u32)> = self
            .config
            .species_quantities
            .iter()
            .map(|(id, n)| (*id, *n))
            .collect();
        for (species, quantity) in configured {
            let placed = self.spawn_batch(species, quantity);
            if placed < quantity as usize {
                tracing::warn!(%species, placed, quantity, "initial population short");
            }
        }
    }

    /// Place `quantity` plants at random positions. Shade-tolerant species
    /// past the warm-up period put part of the batch under existing canopy.
    fn spawn_batch(&mut self, species: SpeciesId, quantity: u32) -> usize {
        let Ok(properties) = self.properties(species) else {
            return 0;
        };
        let seeding = self.config.seeding;
        let shaded = if properties.shade_tolerant
            && self.elapsed_months >= seeding.shade_warmup_months
        {
            (quantity as f32 * seeding.shade_biased_fraction).round() as u32
        } else {
            0
        };

        let mut placed = 0;
        for i in 0..quantity {
            for _ in 0..seeding.placement_attempts.max(1) {
                let position = if i < shaded {
                    self.shaded_position(species)
                } else {
                    self.random_position()
                };
                if self.plant_at(species, position).is_ok() {
                    placed += 1;
                    break;
                }
            }
        }
        placed
    }

    fn random_position(&mut self) -> Position {
        let w = self.config.world;
        Position::new(
            self.rng.random_range(0.0..w.width),
            self.rng.random_range(0.0..w.height),
        )
    }

    /// A point under the canopy of the other-species plant nearest to a
    /// random point, or the random point itself when no canopy is close.
    fn shaded_position(&mut self, species: SpeciesId) -> Position {
        let origin = self.random_position();
        let w = self.config.world;
        let radius = SHADE_SEARCH_CELLS * w.cell_width.max(w.cell_height);
        let is_host = |p: &Plant| p.species() != species && p.canopy_radius() > 0.0;
        let host = self
            .storage
            .nearest_plant_where(origin, radius, is_host)
            .and_then(|(id, _)| self.storage.get(id));
        let Some(host) = host else {
            return origin;
        };
        let canopy = host.canopy_radius();
        let center = host.position();
        let r = canopy * self.rng.random_range(0.0..1.0_f32).sqrt();
        let angle = self.rng.random_range(0.0..std::f32::consts::TAU);
        Position::new(center.x + r * angle.cos(), center.y + r * angle.sin())
    }

    // -----------------------------------------------------------------------
    // Reset & snapshots
    // -----------------------------------------------------------------------

    /// Clear every plant and cell, rewind to month zero and respawn the
    /// initial population. Plant ids keep counting.
    pub fn reset(&mut self) {
        self.storage.clear();
        self.environment.clear();
        self.environment.set_month(Month::JANUARY);
        self.elapsed_months = 0;
        self.rng = ChaCha8Rng::seed_from_u64(self.config.seed);
        self.spawn_initial_population();
        tracing::info!(population = self.storage.len(), "simulation reset");
    }

    pub fn render_snapshot(&mut self) -> RenderSnapshot {
        let mut plants = Vec::with_capacity(self.storage.len());
        for plant in self.storage.iter() {
            let preferred = self.species.get(&plant.species()).and_then(|p| p.color);
            plants.push(PlantRender {
                id: plant.id(),
                species: plant.species(),
                position: plant.position(),
                color: self.colors.color_for(plant.species(), preferred),
                height: plant.height(),
                canopy_radius: plant.canopy_radius(),
                root_radius: plant.root_radius(),
            });
        }
        RenderSnapshot::new(
            self.elapsed_months,
            self.environment.context().month,
            plants,
            self.environment.cell_resources(),
        )
    }

    pub fn occupancy_snapshot(&self, resolution: (usize, usize)) -> OccupancySnapshot {
        let mut discs: BTreeMap<SpeciesId, Vec<Disc>> = BTreeMap::new();
        for plant in self.storage.iter() {
            discs.entry(plant.species()).or_default().push(Disc {
                center: plant.position(),
                radius: plant.canopy_radius(),
            });
        }
        let w = self.config.world;
        OccupancySnapshot::build(self.elapsed_months, (w.width, w.height), resolution, &discs)
    }

    pub fn statistical_snapshot(&self) -> StatisticalSnapshot {
        StatisticalSnapshot {
            elapsed_months: self.elapsed_months,
            world_width: self.config.world.width,
            world_height: self.config.world.height,
            points: self.storage.species_points(),
        }
    }
}

// ---------------------------------------------------------------------------
// SimulatorManager
// ---------------------------------------------------------------------------

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Threaded front end: scheduler, render buffer and exports.
pub struct SimulatorManager {
    simulation: Arc<Mutex<Simulation>>,
    render: Arc<Mutex<RenderSnapshot>>,
    scheduler: TimeManager,
}

impl SimulatorManager {
    pub fn new(
        config: SimulationConfiguration,
        catalog: Arc<dyn SpeciesCatalog>,
    ) -> Result<Self, SimError> {
        let unit_time = config.unit_time();
        let mut simulation = Simulation::new(config, catalog)?;
        let render = Arc::new(Mutex::new(simulation.render_snapshot()));
        let simulation = Arc::new(Mutex::new(simulation));

        let scheduler = TimeManager::new(unit_time);
        let (sim, buffer) = (Arc::clone(&simulation), Arc::clone(&render));
        scheduler.register(Box::new(move || {
            let mut sim = lock(&sim);
            if sim.is_finished() {
                return ControlFlow::Break(());
            }
            let report = sim.trigger();
            let snapshot = sim.render_snapshot();
            drop(sim);
            *lock(&buffer) = snapshot;
            if report.finished {
                tracing::info!(months = report.elapsed_months, "simulation finished");
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        }));

        Ok(Self {
            simulation,
            render,
            scheduler,
        })
    }

    /// Run ticks on the scheduler thread until stopped or finished.
    pub fn start(&mut self) -> Result<(), SimError> {
        self.scheduler.start()?;
        tracing::info!("simulation started");
        Ok(())
    }

    /// Stop the scheduler; the tick in progress completes first.
    pub fn stop(&mut self) {
        if self.scheduler.is_running() {
            tracing::info!("simulation stopping");
        }
        self.scheduler.stop();
    }

    pub fn is_running(&self) -> bool {
        self.scheduler.is_running()
    }

    /// Change the real-time length of a tick.
    pub fn set_speed(&self, unit_time: Duration) {
        self.scheduler.set_unit_time(unit_time);
    }

    /// Run one tick on the calling thread.
    pub fn step(&self) -> TickReport {
        let mut sim = lock(&self.simulation);
        let report = sim.trigger();
        let snapshot = sim.render_snapshot();
        drop(sim);
        *lock(&self.render) = snapshot;
        report
    }

    /// Stop, clear, and respawn the initial population.
    pub fn reset(&mut self) {
        self.stop();
        let mut sim = lock(&self.simulation);
        sim.reset();
        let snapshot = sim.render_snapshot();
        drop(sim);
        *lock(&self.render) = snapshot;
    }

    pub fn subscribe(&self) -> Receiver<TickReport> {
        lock(&self.simulation).subscribe()
    }

    /// The snapshot taken after the latest tick.
    pub fn render_snapshot(&self) -> RenderSnapshot {
        lock(&self.render).clone()
    }

    /// Read the simulation under its lock.
    pub fn with_simulation<R>(&self, f: impl FnOnce(&Simulation) -> R) -> R {
        f(&lock(&self.simulation))
    }

    /// Rasterize canopy cover on a worker thread and hand the result to
    /// `callback`.
    pub fn export_occupancy_snapshot<F>(
        &self,
        resolution: (usize, usize),
        callback: F,
    ) -> JoinHandle<()>
    where
        F: FnOnce(OccupancySnapshot) + Send + 'static,
    {
        let simulation = Arc::clone(&self.simulation);
        thread::spawn(move || {
            let snapshot = lock(&simulation).occupancy_snapshot(resolution);
            callback(snapshot);
        })
    }

    /// Collect species point sets on a worker thread, run `analyzer` on them
    /// and hand the analyzer back through `callback`.
    pub fn export_statistical_snapshot<A, F>(&self, mut analyzer: A, callback: F) -> JoinHandle<()>
    where
        A: PointPatternAnalyzer + 'static,
        F: FnOnce(A) + Send + 'static,
    {
        let simulation = Arc::clone(&self.simulation);
        thread::spawn(move || {
            let snapshot = lock(&simulation).statistical_snapshot();
            analyzer.analyze(&snapshot);
            callback(analyzer);
        })
    }
}

impl Drop for SimulatorManager {
    fn drop(&mut self) {
        self.scheduler.stop();
    }
}
