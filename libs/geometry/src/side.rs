//! Compass directions.

use serde::{Deserialize, Serialize};

use crate::point::Point;

/// An enumeration of the four compass sides of a map.
#[derive(Debug, Copy, Clone, Hash, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    /// Positive y.
    North,
    /// Negative y.
    South,
    /// Positive x.
    East,
    /// Negative x.
    West,
}

impl Side {
    /// All four sides, in the priority order used when growing a block mesh.
    pub const ALL: [Side; 4] = [Side::East, Side::North, Side::South, Side::West];

    /// Returns the opposite side.
    pub const fn opposite(&self) -> Self {
        match self {
            Self::North => Self::South,
            Self::South => Self::North,
            Self::East => Self::West,
            Self::West => Self::East,
        }
    }

    /// The unit cell offset pointing toward this side.
    pub const fn offset(&self) -> Point {
        match self {
            Self::North => Point::new(0, 1),
            Self::South => Point::new(0, -1),
            Self::East => Point::new(1, 0),
            Self::West => Point::new(-1, 0),
        }
    }
}
