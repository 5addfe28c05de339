//! The Point-List format: a trivially parseable list of `x y value`
//! triples under a small header.

use std::io::Write;
use std::path::Path;

use blockgrid::GridMap;
use geometry::prelude::{Point, Rect};

use crate::error::{Error, Result};
use crate::formats::TextTokens;
use crate::MapCore;

impl MapCore {
    /// Loads a `gridpointlist` map.
    pub fn load_point_list(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let mut tokens = TextTokens::from_file(path)?;

        let header = tokens.expect()?;
        if !header.eq_ignore_ascii_case("gridpointlist") {
            self.set_error_strings("Error", "File must start with 'gridpointlist'");
            return Err(Error::parse(tokens.line(), header));
        }

        // Width and height, in either order.
        let mut width = None;
        let mut height = None;
        for _ in 0..2 {
            let key = tokens.expect()?;
            let value = tokens.expect_i64()?;
            match key.to_ascii_lowercase().as_str() {
                "width" if width.is_none() => width = Some(value),
                "height" if height.is_none() => height = Some(value),
                _ => return Err(Error::parse(tokens.line(), key)),
            }
        }

        let mut map = GridMap::new();
        let mut bounds: Option<Rect> = None;
        while !tokens.is_empty() {
            let x = tokens.expect_i64()?;
            let y = tokens.expect_i64()?;
            let v = tokens.expect_f32()?;
            map.put(v, x, y);
            let p = Point::new(x, y);
            bounds = Some(bounds.map_or(Rect::from_point(p), |b| b.expand_to(p)));
        }
        if let Some(bounds) = bounds {
            map.set_bounds(bounds);
        }

        self.add_map(map);
        Ok(())
    }

    /// Saves the displayed grid as a `gridpointlist` map.
    pub fn save_point_list(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if !self.has_map() {
            return Err(Error::NoMapLoaded);
        }
        let file = std::fs::File::create(path).map_err(|_| Error::FileSave(path.to_path_buf()))?;
        let mut out = std::io::BufWriter::new(file);
        let io = |_| Error::FileSave(path.to_path_buf());

        let bounds = self.grid.bounds();
        writeln!(out, "gridpointlist").map_err(io)?;
        writeln!(out, "width {}", bounds.width()).map_err(io)?;
        writeln!(out, "height {}", bounds.height()).map_err(io)?;
        for x in bounds.left()..=bounds.right() {
            for y in bounds.bot()..=bounds.top() {
                writeln!(out, "{x} {y} {}", self.grid.read(x, y)).map_err(io)?;
            }
        }
        out.flush().map_err(io)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn point_list_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cells.gpl");

        let mut map = MapCore::new();
        map.new_map(0, 400, 0, 400);
        map.set_point(1, 1, 0.5);
        map.set_point(3, 2, 1.0);
        map.save_point_list(&path).unwrap();

        let mut loaded = MapCore::new();
        loaded.load_point_list(&path).unwrap();
        assert_eq!(loaded.get_point_val(1, 1), 0.5);
        assert_eq!(loaded.get_point_val(3, 2), 1.0);
        assert_eq!(loaded.get_point_val(0, 0), 0.0);
    }

    #[test]
    fn header_must_match() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.gpl");
        std::fs::write(&path, "pointcloud\n").unwrap();
        let mut map = MapCore::new();
        assert!(map.load_point_list(&path).is_err());
    }
}
