//! The `.vor` Voronoi diagram carrier.
//!
//! Sections are `lines`, `edges`, `vertices` and `delaunaylines`, each a
//! list of coordinate rows. Lines and Delaunay lines are stored in grid
//! units (converted from millimetres on save); edges and vertices are
//! stored as-is.

use std::io::Write;
use std::path::Path;

use geometry::prelude::Segment;

use crate::error::{Error, Result};
use crate::formats::TextTokens;
use crate::MapCore;

impl MapCore {
    /// Loads a `.vor` diagram, replacing the current Voronoi and Delaunay
    /// state.
    pub fn load_voronoi(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let mut tokens = TextTokens::from_file(path)?;

        let header = tokens.expect()?;
        if !header.eq_ignore_ascii_case("voronoi") {
            return Err(Error::parse(tokens.line(), header));
        }

        #[derive(Copy, Clone)]
        enum Section {
            Lines,
            Edges,
            Vertices,
            Delaunay,
        }
        let mut section: Option<Section> = None;

        let mut lines = Vec::new();
        let mut edges = Vec::new();
        let mut vertices = Vec::new();
        let mut delaunay = Vec::new();
        let res = self.resolution as f32;

        while !tokens.is_empty() {
            let word = tokens.expect()?;
            match word.to_ascii_lowercase().as_str() {
                "lines" => section = Some(Section::Lines),
                "edges" => section = Some(Section::Edges),
                "vertices" => section = Some(Section::Vertices),
                "delaunaylines" => section = Some(Section::Delaunay),
                _ => {
                    let first: f32 = word
                        .parse()
                        .map_err(|_| Error::parse(tokens.line(), word.clone()))?;
                    match section {
                        Some(Section::Vertices) => {
                            let y = tokens.expect_f32()?;
                            vertices.push(geometry::prelude::PointF::new(first, y));
                        }
                        Some(s) => {
                            let y1 = tokens.expect_f32()?;
                            let x2 = tokens.expect_f32()?;
                            let y2 = tokens.expect_f32()?;
                            match s {
                                Section::Lines => lines.push(Segment::from_coords(
                                    first * res,
                                    y1 * res,
                                    x2 * res,
                                    y2 * res,
                                )),
                                Section::Edges => {
                                    edges.push(Segment::from_coords(first, y1, x2, y2))
                                }
                                Section::Delaunay => delaunay.push(Segment::from_coords(
                                    first * res,
                                    y1 * res,
                                    x2 * res,
                                    y2 * res,
                                )),
                                Section::Vertices => unreachable!(),
                            }
                        }
                        None => return Err(Error::parse(tokens.line(), word)),
                    }
                }
            }
        }

        self.voronoi_lines = lines;
        self.voronoi_edges = edges;
        self.voronoi_vertices = vertices;
        self.delaunay_lines = delaunay;
        Ok(())
    }

    /// Saves the current Voronoi and Delaunay state to a `.vor` file.
    pub fn save_voronoi(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if self.voronoi_lines.is_empty() && self.delaunay_lines.is_empty() {
            return Err(Error::InvalidArgument("no diagram to save".into()));
        }
        let file = std::fs::File::create(path).map_err(|_| Error::FileSave(path.to_path_buf()))?;
        let mut out = std::io::BufWriter::new(file);
        let io = |_| Error::FileSave(path.to_path_buf());
        let res = self.resolution as f32;

        writeln!(out, "voronoi").map_err(io)?;
        if !self.voronoi_lines.is_empty() {
            writeln!(out, "lines").map_err(io)?;
            for s in &self.voronoi_lines {
                writeln!(
                    out,
                    "{} {} {} {}",
                    s.p1.x / res,
                    s.p1.y / res,
                    s.p2.x / res,
                    s.p2.y / res
                )
                .map_err(io)?;
            }
        }
        if !self.voronoi_edges.is_empty() {
            writeln!(out, "edges").map_err(io)?;
            for s in &self.voronoi_edges {
                writeln!(out, "{} {} {} {}", s.p1.x, s.p1.y, s.p2.x, s.p2.y).map_err(io)?;
            }
        }
        if !self.voronoi_vertices.is_empty() {
            writeln!(out, "vertices").map_err(io)?;
            for v in &self.voronoi_vertices {
                writeln!(out, "{} {}", v.x, v.y).map_err(io)?;
            }
        }
        if !self.delaunay_lines.is_empty() {
            writeln!(out, "delaunaylines").map_err(io)?;
            for s in &self.delaunay_lines {
                writeln!(
                    out,
                    "{} {} {} {}",
                    s.p1.x / res,
                    s.p1.y / res,
                    s.p2.x / res,
                    s.p2.y / res
                )
                .map_err(io)?;
            }
        }
        out.flush().map_err(io)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geometry::prelude::PointF;

    #[test]
    fn voronoi_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("diagram.vor");

        let mut map = MapCore::new();
        map.voronoi_lines = vec![Segment::from_coords(100.0, 0.0, 300.0, 0.0)];
        map.voronoi_edges = vec![Segment::from_coords(1.5, 1.5, 2.5, 2.5)];
        map.voronoi_vertices = vec![PointF::new(1.5, 1.5), PointF::new(2.5, 2.5)];
        map.delaunay_lines = vec![Segment::from_coords(0.0, 0.0, 200.0, 200.0)];
        map.save_voronoi(&file).unwrap();

        let mut loaded = MapCore::new();
        loaded.load_voronoi(&file).unwrap();
        assert_eq!(loaded.voronoi_lines(), map.voronoi_lines());
        assert_eq!(loaded.voronoi_edges(), map.voronoi_edges());
        assert_eq!(loaded.voronoi_vertices(), map.voronoi_vertices());
        assert_eq!(loaded.delaunay_lines(), map.delaunay_lines());
        assert!(loaded.has_voronoi());
    }

    #[test]
    fn header_is_required() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("bad.vor");
        std::fs::write(&file, "delaunay\nlines\n0 0 1 1\n").unwrap();
        let mut map = MapCore::new();
        assert!(map.load_voronoi(&file).is_err());
    }
}
