//! Management of 2-D robot maps: a layered occupancy grid coupled to an
//! ordered list of vector objects, with undo, geometric analyses and
//! converters for the common map file formats.
//!
//! The central type is [`MapCore`]. It owns a [`LayeredGrid`] (an
//! occupancy grid whose cells remember, per drawing layer, every value
//! contributed to them) and a [`VectorModel`] (lines, rectangles and
//! robots in millimetre coordinates). Vector objects are rasterised into
//! the grid as they are added, and can be removed again exactly — cell by
//! cell — which is what makes undo/redo precise.
//!
//! World coordinates are millimetres; a single integer *resolution* (mm
//! per cell, default 100) maps them onto grid cells. Occupancy values live
//! in `[0, 1]` with `-1` meaning *unknown*.
//!
//! # Examples
//!
//! ```
//! use mapcore::MapCore;
//!
//! let mut map = MapCore::new();
//! map.new_map(0, 10_000, 0, 10_000);
//! map.set_line(1_000, 1_000, 5_000, 1_000, 1.0);
//! assert!(map.has_vectors());
//! map.undo();
//! assert!(!map.has_vectors());
//! ```
#![warn(missing_docs)]

mod convert;
mod core;
mod error;
mod formats;
mod layers;
mod model;

pub use crate::core::MapCore;
pub use error::{Error, Result};
pub use formats::stage::StageWorldOptions;
pub use layers::{LayerEntry, LayeredGrid};
pub use model::{ObjectKind, VectorModel, VectorObject};

// The crates whose types appear in this crate's public API.
pub use blockgrid;
pub use geometry;
pub use voronoi;

/// The canonical robot radius in millimetres.
pub const ROBOT_RADIUS: i64 = 220;

/// How many user actions the undo history retains.
pub const NUM_UNDO_STEPS: usize = 10;

/// The largest number of robot runs a map will carry.
pub const MAX_NUM_ROBOT_RUNS: usize = 24;

/// The default map resolution in millimetres per grid cell.
pub const DEFAULT_RESOLUTION: i64 = 100;
