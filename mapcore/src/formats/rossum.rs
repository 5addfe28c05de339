//! The Rossum's Playhouse `.wld` writer. Everything is in metres.

use std::io::Write;
use std::path::Path;

use crate::error::{Error, Result};
use crate::model::ObjectKind;
use crate::{MapCore, ROBOT_RADIUS};

const LINE_WIDTH: f32 = 0.05;

impl MapCore {
    /// Saves the vector objects as a Rossum world: lines and rectangles
    /// become walls, robots become `placement` entries.
    pub fn save_rossum(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if self.vector_model().is_empty() {
            return Err(Error::InvalidArgument(
                "a Rossum world needs at least one vector object".into(),
            ));
        }
        let file = std::fs::File::create(path).map_err(|_| Error::FileSave(path.to_path_buf()))?;
        let mut out = std::io::BufWriter::new(file);
        let io = |_| Error::FileSave(path.to_path_buf());

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        writeln!(out, "/*\n{name} exported by mapcore\n*/").map_err(io)?;
        writeln!(out, "units: meters;").map_err(io)?;
        writeln!(out, "caption:\"{name}\";").map_err(io)?;

        let mut wall = 0usize;
        let mut robots = 0usize;

        for object in self.vector_model().objects() {
            let (x1, y1) = (object.p1.x / 1000.0, object.p1.y / 1000.0);
            let (x2, y2) = (object.p2.x / 1000.0, object.p2.y / 1000.0);
            let length = ((x1 - x2).powi(2) + (y1 - y2).powi(2)).sqrt();
            // Degenerate one-point objects would not parse on the other
            // side.
            if length < 0.0001 && object.kind != ObjectKind::Robot {
                continue;
            }

            match object.kind {
                ObjectKind::Line => {
                    writeln!(
                        out,
                        "wall {wall} {{ geometry:\t{x1},\t{y1},\t{x2},\t{y2},\t{LINE_WIDTH}; }}"
                    )
                    .map_err(io)?;
                    wall += 1;
                }
                ObjectKind::Rect => {
                    let (lo_x, hi_x) = (x1.min(x2), x1.max(x2));
                    let (lo_y, hi_y) = (y1.min(y2), y1.max(y2));
                    if (hi_x - lo_x) > LINE_WIDTH && (hi_y - lo_y) > LINE_WIDTH {
                        // Four thin walls along the borders, pulled in by
                        // half a wall width.
                        let h = LINE_WIDTH / 2.0;
                        for (ax, ay, bx, by) in [
                            (lo_x, hi_y - h, hi_x, hi_y - h),
                            (lo_x + h, hi_y, lo_x + h, lo_y),
                            (hi_x - h, hi_y, hi_x - h, lo_y),
                            (lo_x, lo_y + h, hi_x, lo_y + h),
                        ] {
                            writeln!(
                                out,
                                "wall {wall} {{ geometry:\t{ax},\t{ay},\t{bx},\t{by},\t{LINE_WIDTH}; }}"
                            )
                            .map_err(io)?;
                            wall += 1;
                        }
                    } else if (hi_x - lo_x) < (hi_y - lo_y) {
                        // Too thin for four walls: one vertical wall as
                        // wide as the rectangle.
                        let mid = (lo_x + hi_x) / 2.0;
                        writeln!(
                            out,
                            "wall {wall} {{ geometry:\t{mid},\t{hi_y},\t{mid},\t{lo_y},\t{}; }}",
                            hi_x - lo_x
                        )
                        .map_err(io)?;
                        wall += 1;
                    } else {
                        let mid = (lo_y + hi_y) / 2.0;
                        writeln!(
                            out,
                            "wall {wall} {{ geometry:\t{hi_x},\t{mid},\t{lo_x},\t{mid},\t{}; }}",
                            hi_y - lo_y
                        )
                        .map_err(io)?;
                        wall += 1;
                    }
                }
                ObjectKind::RectFilled => {
                    // One wall down the middle, as wide as the rectangle.
                    let mid = (x1 + x2) / 2.0;
                    writeln!(
                        out,
                        "wall {wall} {{ geometry:\t{mid},\t{y1},\t{mid},\t{y2},\t{}; }}",
                        (x1 - x2).abs()
                    )
                    .map_err(io)?;
                    wall += 1;
                }
                ObjectKind::Robot => {
                    let suffix = if robots > 0 {
                        robots.to_string()
                    } else {
                        String::new()
                    };
                    let centre = object.centre();
                    writeln!(out, "placement home{suffix} {{").map_err(io)?;
                    writeln!(out, "\tlabel:\t\t \"Home{suffix}\";").map_err(io)?;
                    writeln!(
                        out,
                        "\tgeometry:\t{}, {}, {}, {};",
                        centre.x / 1000.0,
                        centre.y / 1000.0,
                        object.value,
                        ROBOT_RADIUS as f32 / 1000.0
                    )
                    .map_err(io)?;
                    writeln!(out, "\tlineColor:\tgreen;").map_err(io)?;
                    writeln!(out, "\tlineWidth:\t3;").map_err(io)?;
                    writeln!(out, "}}").map_err(io)?;
                    robots += 1;
                }
            }
        }
        out.flush().map_err(io)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_walls_and_placements() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("arena.wld");

        let mut map = MapCore::new();
        map.new_map(0, 5000, 0, 5000);
        map.set_line(0, 0, 2000, 0, 1.0);
        map.set_rectangle(1000, 1000, 3000, 3000, 1.0);
        map.set_robot(2500, 2500).unwrap();
        map.save_rossum(&path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("units: meters;"));
        assert!(text.contains("wall 0"));
        // The rectangle expands to four walls after the line's one.
        assert!(text.contains("wall 4"));
        assert!(text.contains("placement home {"));
        assert!(text.contains("\"Home\""));
    }
}
