// ecotope_sim — monthly, grid-based plant competition simulator.
//
// Plants of several species compete for illumination, soil humidity and
// temperature spread over a uniform grid. Each plant's health is the minimum
// of four piecewise-linear "constrainer" strengths; that vigor drives growth,
// stress and probabilistic death. Mature plants seed around themselves.
//
// Module overview:
// - `types.rs`:        Position, CellCoord, PlantId, SpeciesId, Month, Rgb.
// - `grid.rs`:         SpatialGrid<T>: lazily populated uniform grid with circle queries.
// - `illumination.rs`: Per-cell occlusion (tallest plant takes the light) + seasonal curve.
// - `soil_humidity.rs`: Per-cell water allocation (surplus / weighted contention).
// - `temperature.rs`:  Per-cell seasonal temperature.
// - `environment.rs`:  EnvironmentManager: the three grids plus per-plant footprints.
// - `constrainer.rs`:  Age / illumination / humidity / temperature strength shapes.
// - `growth.rs`:       Vigor-gated height, canopy and root growth.
// - `plant.rs`:        Plant state machine: vigor, pain, death cause, seeding.
// - `storage.rs`:      PlantStorage: identity arena + spatial index.
// - `time_manager.rs`: Background periodic-callback scheduler.
// - `simulator.rs`:    Simulation (the monthly tick) and SimulatorManager (threads, exports).
// - `export.rs`:       Render, occupancy and statistical snapshots; ColorRegistry.
// - `species.rs`:      SpecieProperties records and the SpeciesCatalog trait.
// - `config.rs`:       SimulationConfiguration loaded from JSON.
// - `error.rs`:        Error enums.
//
// All randomness flows through one seeded ChaCha8 RNG per simulation and all
// iteration that feeds it is over ordered maps, so equal seeds replay
// identically.

pub mod config;
pub mod constrainer;
pub mod environment;
pub mod error;
pub mod export;
pub mod grid;
pub mod growth;
pub mod illumination;
pub mod plant;
pub mod simulator;
pub mod soil_humidity;
pub mod species;
pub mod storage;
pub mod temperature;
pub mod time_manager;
pub mod types;
