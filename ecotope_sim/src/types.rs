// Core types shared across the simulation.
//
// Defines world positions (`Position`), grid cell addresses (`CellCoord`),
// strongly-typed identifiers (`PlantId`, `SpeciesId`), the calendar `Month`,
// and the `Rgb` display color. All types derive `Serialize` and
// `Deserialize` so snapshots and configs can travel as JSON.
//
// **Critical constraint: identity.** A `PlantId` is handed out by the
// simulation's `PlantIdAllocator`, is never changed and is never reused,
// not even across `reset()`.

use crate::error::InvalidMonth;
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Spatial types
// ---------------------------------------------------------------------------

/// A point in world space, in the same units as the configured world size.
///
/// X grows east, Y grows south. The world spans `[0, width) x [0, height)`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

impl Position {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Euclidean distance between two positions.
    pub fn distance(self, other: Self) -> f32 {
        self.distance_squared(other).sqrt()
    }

    pub fn distance_squared(self, other: Self) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }

    /// Exact-coordinate key. Two positions share a key only if both
    /// components are bit-identical, which is what duplicate placement
    /// checks need.
    pub fn key(self) -> PositionKey {
        PositionKey {
            x: self.x.to_bits(),
            y: self.y.to_bits(),
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.2}, {:.2})", self.x, self.y)
    }
}

/// Totally ordered, hashable stand-in for an exact `Position`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PositionKey {
    x: u32,
    y: u32,
}

/// Integer address of a grid cell: `(floor(x / cell_width), floor(y / cell_height))`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellCoord {
    pub x: i32,
    pub y: i32,
}

impl CellCoord {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

impl fmt::Display for CellCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.x, self.y)
    }
}

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// Unique identifier of a plant. Allocated monotonically, never reused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PlantId(pub u64);

impl fmt::Display for PlantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PlantId({})", self.0)
    }
}

/// Identifier of a species record in the species catalog.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SpeciesId(pub u32);

impl fmt::Display for SpeciesId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SpeciesId({})", self.0)
    }
}

/// Hands out `PlantId`s. Lives as long as the simulation that owns it.
#[derive(Clone, Debug, Default)]
pub struct PlantIdAllocator {
    next: u64,
}

impl PlantIdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocate(&mut self) -> PlantId {
        let id = PlantId(self.next);
        self.next += 1;
        id
    }
}

// ---------------------------------------------------------------------------
// Calendar
// ---------------------------------------------------------------------------

/// A calendar month, 1 (January) through 12 (December).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8")]
pub struct Month(u8);

impl TryFrom<u8> for Month {
    type Error = InvalidMonth;

    fn try_from(number: u8) -> Result<Self, Self::Error> {
        Month::new(number).ok_or(InvalidMonth(number))
    }
}

impl Month {
    pub const JANUARY: Month = Month(1);
    pub const JUNE: Month = Month(6);
    pub const DECEMBER: Month = Month(12);

    /// Build a month from its 1-based number. Returns `None` outside 1..=12.
    pub fn new(number: u8) -> Option<Self> {
        (1..=12).contains(&number).then_some(Self(number))
    }

    /// The calendar month reached after `elapsed_months` ticks, starting in
    /// January and wrapping every twelve months.
    pub fn from_elapsed(elapsed_months: u64) -> Self {
        Self((elapsed_months % 12) as u8 + 1)
    }

    pub fn number(self) -> u8 {
        self.0
    }

    /// Zero-based index into 12-entry monthly tables.
    pub fn index(self) -> usize {
        (self.0 - 1) as usize
    }

    pub fn all() -> impl Iterator<Item = Month> {
        (1..=12).map(Month)
    }
}

impl fmt::Display for Month {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const NAMES: [&str; 12] = [
            "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
        ];
        f.write_str(NAMES[self.index()])
    }
}

// ---------------------------------------------------------------------------
// Display color
// ---------------------------------------------------------------------------

/// 8-bit RGB color handed to renderers alongside each plant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}
