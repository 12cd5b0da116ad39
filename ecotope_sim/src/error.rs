// Error types for the simulation library.
//
// Each layer has its own enum (`ConfigError`, `CatalogError`,
// `StorageError`, `SchedulerError`) and `SimError` wraps them for the
// top-level `SimulatorManager` API. Contract violations (an unknown species
// id reaching plant creation, a grid built with non-positive dimensions)
// are panics, not variants here: they indicate a bug in the caller, not a
// condition to recover from.

use crate::types::{Month, PlantId, Position, SpeciesId};
use thiserror::Error;

/// Problems with a `SimulationConfiguration`.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid configuration JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("world dimensions must be finite and positive, got {width} x {height}")]
    WorldSize { width: f32, height: f32 },

    #[error("cell dimensions must be finite and positive, got {width} x {height}")]
    CellSize { width: f32, height: f32 },

    #[error("world grid of {columns} x {rows} cells exceeds the limit of {max}")]
    TooManyCells { columns: f64, rows: f64, max: u64 },

    #[error("{profile} profile has a non-finite value for {month}")]
    NonFiniteProfile { profile: &'static str, month: Month },

    #[error("seeding interval must be at least one month")]
    ZeroSeedingInterval,

    #[error("shade-biased fraction must be within [0, 1], got {0}")]
    ShadeFraction(f32),
}

/// Problems loading or validating species records.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("invalid species catalog JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0} is defined more than once")]
    DuplicateSpecies(SpeciesId),

    #[error("{species}: {resource} tolerance must satisfy min <= prime_min <= prime_max <= max")]
    ToleranceOrder {
        species: SpeciesId,
        resource: &'static str,
    },

    #[error("{species}: start of decline ({start}) is past max age ({max})")]
    AgeingOrder {
        species: SpeciesId,
        start: u32,
        max: u32,
    },

    #[error("{0}: growth parameters must be positive")]
    Growth(SpeciesId),
}

/// Rejected storage mutations.
#[derive(Debug, Error, PartialEq)]
pub enum StorageError {
    #[error("position {0} is outside the world")]
    OutOfBounds(Position),

    #[error("a plant already occupies {0}")]
    LocationOccupied(Position),

    #[error("{0} is already stored")]
    DuplicateId(PlantId),
}

/// Refused scheduler operations.
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("no unit time configured; refusing to start")]
    UnitTimeNotSet,

    #[error("scheduler is already running")]
    AlreadyRunning,

    #[error("failed to spawn scheduler thread: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Top-level error for the `SimulatorManager` API.
#[derive(Debug, Error)]
pub enum SimError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error("configuration references {0}, which is not in the species catalog")]
    UnknownSpecies(SpeciesId),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Scheduler(#[from] SchedulerError),
}

/// A month number outside 1..=12.
#[derive(Debug, Error)]
#[error("month must be within 1..=12, got {0}")]
pub struct InvalidMonth(pub u8);
