//! The `.pat` path format: planned path lines and goal points, in
//! millimetres.

use std::io::Write;
use std::path::Path;

use geometry::prelude::Point;

use crate::error::{Error, Result};
use crate::formats::TextTokens;
use crate::MapCore;

impl MapCore {
    /// Loads a path file, replacing the current path.
    pub fn load_path(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let mut tokens = TextTokens::from_file(path)?;

        let header = tokens.expect()?;
        if !header.eq_ignore_ascii_case("path") {
            return Err(Error::parse(tokens.line(), header));
        }

        let mut lines = Vec::new();
        let mut goals = Vec::new();

        enum Section {
            Lines,
            Goals,
        }
        let mut section: Option<Section> = None;
        while !tokens.is_empty() {
            let word = tokens.expect()?;
            match word.to_ascii_lowercase().as_str() {
                "lines" => section = Some(Section::Lines),
                "goalpoints" => section = Some(Section::Goals),
                _ => {
                    let first: i64 = word
                        .parse()
                        .map_err(|_| Error::parse(tokens.line(), word.clone()))?;
                    match section {
                        Some(Section::Lines) => {
                            let y1 = tokens.expect_i64()?;
                            let x2 = tokens.expect_i64()?;
                            let y2 = tokens.expect_i64()?;
                            lines.push((Point::new(first, y1), Point::new(x2, y2)));
                        }
                        Some(Section::Goals) => {
                            let y = tokens.expect_i64()?;
                            goals.push(Point::new(first, y));
                        }
                        None => return Err(Error::parse(tokens.line(), word)),
                    }
                }
            }
        }

        self.path_lines = lines;
        self.path_goals = goals;
        Ok(())
    }

    /// Saves the current path to a `.pat` file.
    pub fn save_path(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if self.path_lines.is_empty() && self.path_goals.is_empty() {
            return Err(Error::InvalidArgument("no path to save".into()));
        }
        let file = std::fs::File::create(path).map_err(|_| Error::FileSave(path.to_path_buf()))?;
        let mut out = std::io::BufWriter::new(file);
        let io = |_| Error::FileSave(path.to_path_buf());

        writeln!(out, "path").map_err(io)?;
        if !self.path_lines.is_empty() {
            writeln!(out, "lines").map_err(io)?;
            for (p1, p2) in &self.path_lines {
                writeln!(out, "{} {} {} {}", p1.x, p1.y, p2.x, p2.y).map_err(io)?;
            }
        }
        if !self.path_goals.is_empty() {
            writeln!(out, "goalpoints").map_err(io)?;
            for g in &self.path_goals {
                writeln!(out, "{} {}", g.x, g.y).map_err(io)?;
            }
        }
        out.flush().map_err(io)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("route.pat");

        let mut map = MapCore::new();
        map.path_lines = vec![
            (Point::new(0, 0), Point::new(1000, 0)),
            (Point::new(1000, 0), Point::new(1000, 2500)),
        ];
        map.path_goals = vec![Point::new(1000, 2500)];
        map.save_path(&file).unwrap();

        let mut loaded = MapCore::new();
        loaded.load_path(&file).unwrap();
        assert_eq!(loaded.path_lines(), map.path_lines());
        assert_eq!(loaded.path_goals, map.path_goals);
        assert!(loaded.has_path());
    }
}
