//! The Saphira `.wld` world format: textual line segments plus at most
//! one robot position.

use std::io::Write;
use std::path::Path;

use geometry::prelude::PointF;

use crate::error::{Error, Result};
use crate::model::{ObjectKind, VectorObject};
use crate::{MapCore, ROBOT_RADIUS};

/// A parsed Saphira world.
pub(crate) struct SaphiraWorld {
    pub(crate) width: i64,
    pub(crate) height: i64,
    pub(crate) origin: (i64, i64),
    /// `(x, y, heading°)`.
    pub(crate) robot: Option<(f32, f32, f32)>,
    pub(crate) lines: Vec<(i64, i64, i64, i64)>,
}

pub(crate) fn parse_file(path: &Path) -> Result<SaphiraWorld> {
    let text = std::fs::read_to_string(path).map_err(|_| Error::FileOpen(path.to_path_buf()))?;

    let mut world = SaphiraWorld {
        width: 0,
        height: 0,
        origin: (0, 0),
        robot: None,
        lines: Vec::new(),
    };

    for (lineno, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with(';') {
            continue;
        }
        let mut words = line.split_whitespace();
        let first = words.next().unwrap();
        let mut num = |w: Option<&str>| -> Result<f64> {
            let w = w.ok_or_else(|| Error::parse(lineno + 1, "<eol>"))?;
            w.parse().map_err(|_| Error::parse(lineno + 1, w))
        };
        match first.to_ascii_lowercase().as_str() {
            "width" => world.width = num(words.next())? as i64,
            "height" => world.height = num(words.next())? as i64,
            "origin" => {
                world.origin = (num(words.next())? as i64, num(words.next())? as i64);
            }
            "position" => {
                world.robot = Some((
                    num(words.next())? as f32,
                    num(words.next())? as f32,
                    num(words.next())? as f32,
                ));
            }
            _ => {
                let x1 = first
                    .parse::<f64>()
                    .map_err(|_| Error::parse(lineno + 1, first))?;
                let y1 = num(words.next())?;
                let x2 = num(words.next())?;
                let y2 = num(words.next())?;
                world
                    .lines
                    .push((x1 as i64, y1 as i64, x2 as i64, y2 as i64));
            }
        }
    }
    Ok(world)
}

impl MapCore {
    /// Loads a Saphira `.wld` vector world. The map starts with the grid
    /// view off: lines live in the vector model until projected.
    pub fn load_saphira_wld(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let world = parse_file(path)?;

        self.set_view_grid_map(false);
        self.set_view_vector_map(true);
        self.reset_all_objects();

        let width = world.width + 10 * self.resolution;
        let height = world.height + 10 * self.resolution;
        let min_x = world.origin.0 - width / 2 - 5;
        let max_x = world.origin.0 + width / 2 + 5;
        let min_y = world.origin.1 - height / 2 - 5;
        let max_y = world.origin.1 + height / 2 + 5;
        self.new_map(min_x, max_x, min_y, max_y);

        for (x1, y1, x2, y2) in &world.lines {
            let layer = self.model.next_negative_layer();
            self.set_object(VectorObject::new(
                layer,
                1.0,
                ObjectKind::Line,
                PointF::new(*x1 as f32, *y1 as f32),
                PointF::new(*x2 as f32, *y2 as f32),
            ));
        }

        if let Some((x, y, heading)) = world.robot {
            let layer = self.model.next_negative_layer();
            let r = ROBOT_RADIUS as f32;
            self.set_object(VectorObject::new(
                layer,
                heading,
                ObjectKind::Robot,
                PointF::new(x - r, y + r),
                PointF::new(x + r, y - r),
            ));
        }

        self.refresh_vector_boundary();
        self.map_average_count = 1;
        Ok(())
    }

    /// Saves the vector objects as a Saphira `.wld` world. Rectangles
    /// become four border lines; the first robot becomes the `position`.
    pub fn save_saphira_wld(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let file = std::fs::File::create(path).map_err(|_| Error::FileSave(path.to_path_buf()))?;
        let mut out = std::io::BufWriter::new(file);
        let io = |_| Error::FileSave(path.to_path_buf());

        const EXTRA_BORDER: i64 = 1000;
        let b = self.vector_boundary;
        let width = b.width() + EXTRA_BORDER;
        let height = b.height() + EXTRA_BORDER;
        let origin_x = b.left() - EXTRA_BORDER / 2;
        let origin_y = b.bot() - EXTRA_BORDER / 2;

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        writeln!(out, ";; {name}").map_err(io)?;
        writeln!(out, ";; Created with the mapcore library").map_err(io)?;
        writeln!(out, "width {width}").map_err(io)?;
        writeln!(out, "height {height}").map_err(io)?;
        writeln!(out, "origin {origin_x} {origin_y}").map_err(io)?;

        if let Some(robot) = self.robots().next() {
            let centre = robot.centre();
            writeln!(
                out,
                "position {} {} {}",
                centre.x as i64, centre.y as i64, robot.value as i64
            )
            .map_err(io)?;
        }

        for object in self.model.objects() {
            let (x1, y1) = (object.p1.x as i64, object.p1.y as i64);
            let (x2, y2) = (object.p2.x as i64, object.p2.y as i64);
            match object.kind {
                ObjectKind::Line if object.p1 != object.p2 => {
                    writeln!(out, ";; line").map_err(io)?;
                    writeln!(out, "{x1} {y1} {x2} {y2}").map_err(io)?;
                }
                ObjectKind::Line | ObjectKind::Rect | ObjectKind::RectFilled => {
                    // Rectangles (and degenerate one-point lines) are
                    // saved as their four borders.
                    let (lo_x, hi_x) = (x1.min(x2), x1.max(x2));
                    let (lo_y, hi_y) = (y1.min(y2), y1.max(y2));
                    writeln!(out, ";; rectangle").map_err(io)?;
                    writeln!(out, "{lo_x} {hi_y} {lo_x} {lo_y}").map_err(io)?;
                    writeln!(out, "{lo_x} {hi_y} {hi_x} {hi_y}").map_err(io)?;
                    writeln!(out, "{lo_x} {lo_y} {hi_x} {lo_y}").map_err(io)?;
                    writeln!(out, "{hi_x} {hi_y} {hi_x} {lo_y}").map_err(io)?;
                }
                ObjectKind::Robot => {}
            }
        }
        out.flush().map_err(io)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_lines_origin_and_robot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("office.wld");
        std::fs::write(
            &path,
            ";; office world\nwidth 5000\nheight 4000\norigin 0 0\n\
             position 100 200 90\n0 0 1000 0\n1000 0 1000 800\n",
        )
        .unwrap();
        let world = parse_file(&path).unwrap();
        assert_eq!(world.width, 5000);
        assert_eq!(world.height, 4000);
        assert_eq!(world.robot, Some((100.0, 200.0, 90.0)));
        assert_eq!(world.lines.len(), 2);
        assert_eq!(world.lines[0], (0, 0, 1000, 0));
    }

    #[test]
    fn load_populates_vector_model() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("two-walls.wld");
        std::fs::write(
            &path,
            "width 4000\nheight 4000\norigin 0 0\n0 0 1000 0\n0 0 0 1000\n",
        )
        .unwrap();
        let mut map = MapCore::new();
        map.load_saphira_wld(&path).unwrap();
        assert_eq!(map.objects().count(), 2);
        // Vectors are not yet projected: negative layers.
        assert!(map.objects().all(|o| o.layer < 0));
    }
}
