//! The Beesoft map format: four header keywords, then row-major floats
//! stored under an inverted occupancy convention (`1 - v`).
//!
//! Beesoft swaps the axes in its header: `global_mapsize_x` holds the map
//! height and `global_mapsize_y` the width.

use std::io::Write;
use std::path::Path;

use blockgrid::GridMap;
use geometry::prelude::Rect;

use crate::error::{Error, Result};
use crate::formats::TextTokens;
use crate::MapCore;

const KEY_SIZE_X: &str = "robot_specifications->global_mapsize_x";
const KEY_SIZE_Y: &str = "robot_specifications->global_mapsize_y";
const KEY_RESOLUTION: &str = "robot_specifications->resolution";
const KEY_GLOBAL_MAP: &str = "global_map[0]:";

/// Loads a Beesoft map into `map`.
pub(crate) fn load_into(path: &Path, map: &mut GridMap) -> Result<()> {
    let mut tokens = TextTokens::from_file(path)?;
    let unsupported = || Error::UnsupportedFormat("not a Beesoft map".into());

    let mut size_x = 0i64;
    let mut size_y = 0i64;
    let mut _resolution = 0.0f32;

    for _ in 0..4 {
        let key = tokens.expect().map_err(|_| unsupported())?;
        match key.as_str() {
            KEY_SIZE_X => size_y = tokens.expect_f32().map_err(|_| unsupported())? as i64,
            KEY_SIZE_Y => size_x = tokens.expect_f32().map_err(|_| unsupported())? as i64,
            KEY_RESOLUTION => _resolution = tokens.expect_f32().map_err(|_| unsupported())?,
            KEY_GLOBAL_MAP => {
                tokens.expect_f32().map_err(|_| unsupported())?;
                tokens.expect_f32().map_err(|_| unsupported())?;
            }
            _ => return Err(unsupported()),
        }
    }
    if size_x <= 0 || size_y <= 0 {
        return Err(unsupported());
    }

    for x in 0..size_x {
        for y in 0..size_y {
            let v = tokens.expect_f32()?;
            let v = if v >= 0.0 { 1.0 - v } else { -1.0 };
            map.put(v, x, y);
        }
    }
    map.set_bounds(Rect::from_sides(0, 0, size_x - 1, size_y - 1));
    Ok(())
}

/// Saves `map` as a Beesoft map.
pub(crate) fn save_into(path: &Path, map: &GridMap, resolution: f64) -> Result<()> {
    let file = std::fs::File::create(path).map_err(|_| Error::FileSave(path.to_path_buf()))?;
    let mut out = std::io::BufWriter::new(file);
    let io = |_| Error::FileSave(path.to_path_buf());

    let bounds = map.bounds();
    let (width, height) = (bounds.width(), bounds.height());

    writeln!(out, "{KEY_SIZE_X}  {height}").map_err(io)?;
    writeln!(out, "{KEY_SIZE_Y}  {width}").map_err(io)?;
    writeln!(out, "{KEY_RESOLUTION}  {resolution}").map_err(io)?;
    writeln!(out, "{KEY_GLOBAL_MAP} {width} {height}").map_err(io)?;

    for x in bounds.left()..=bounds.right() {
        for y in bounds.bot()..=bounds.top() {
            let v = map.get(x, y);
            let v = if v >= 0.0 { 1.0 - v } else { -1.0 };
            write!(out, "{v} ").map_err(io)?;
        }
        writeln!(out).map_err(io)?;
    }
    out.flush().map_err(io)
}

impl MapCore {
    /// Loads a Beesoft grid map (grid data only).
    pub fn load_beesoft(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let mut map = GridMap::new();
        if let Err(e) = load_into(path, &mut map) {
            self.set_error_strings("Error!", "Failed to parse the grid map file");
            return Err(e);
        }
        self.add_map(map);
        Ok(())
    }

    /// Saves the displayed grid as a Beesoft map.
    pub fn save_beesoft(&mut self, path: impl AsRef<Path>) -> Result<()> {
        if !self.has_map() {
            self.set_error_strings("Error!", "No map loaded");
            return Err(Error::NoMapLoaded);
        }
        let mut map = GridMap::new();
        self.latest_grid_map(&mut map);
        save_into(path.as_ref(), &map, (1.0 / self.resolution as f64) * 100.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn save_load_round_trip_inverts_twice() {
        let mut map = GridMap::new();
        map.put(1.0, 0, 0);
        map.put(0.25, 1, 2);
        map.put(-1.0, 2, 1);
        map.set_bounds(Rect::from_sides(0, 0, 3, 3));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("map.bee");
        save_into(&path, &map, 0.01).unwrap();

        let mut loaded = GridMap::new();
        load_into(&path, &mut loaded).unwrap();
        assert_eq!(loaded.bounds(), map.bounds());
        for x in 0..=3 {
            for y in 0..=3 {
                assert_eq!(loaded.get(x, y), map.get(x, y), "cell ({x},{y})");
            }
        }
    }
}
