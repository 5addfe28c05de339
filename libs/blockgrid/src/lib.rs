//! Sparse, expandable 2-D (optionally layered) grids stored as a mesh of
//! fixed-size blocks.
//!
//! A [`BlockGrid`] starts as a single block at the origin and grows by whole
//! rows or columns of blocks whenever a write lands outside the allocated
//! area, so maps may extend arbitrarily far in any direction, with negative
//! coordinates, without reallocating what already exists. Storage inside a
//! block is allocated per column on first write.
//!
//! [`GridMap`] specialises the mesh to `f32` occupancy values and carries
//! the map-level transforms: dimension reduction, blurring, occupied-area
//! growth, correlation and map scoring, and the legacy on-disk grid format.
//!
//! # Examples
//!
//! ```
//! # use blockgrid::BlockGrid;
//! let mut grid: BlockGrid<f32> = BlockGrid::new(100, 0.0);
//! grid.put(0.75, -350, 12);
//! assert_eq!(grid.get(-350, 12), 0.75);
//! assert_eq!(grid.get(7000, -7000), 0.0);
//! ```
#![warn(missing_docs)]

mod block;
mod grid;
mod map;

pub use grid::BlockGrid;
pub use map::{GridMap, ReducePick};

/// The default width (and height) of one block, in cells.
pub const DEFAULT_BLOCK_SIZE: i64 = 100;

/// Errors arising from grid file I/O.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An underlying I/O failure.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    /// The file did not match the expected grid format.
    #[error("malformed grid file: {0}")]
    Malformed(String),
}

/// A specialized [`Result`] for grid file I/O.
pub type Result<T> = std::result::Result<T, Error>;
