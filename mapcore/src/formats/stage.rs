//! Player/Stage worlds: a `.world` entity file plus a PNM bitmap.

use std::path::{Path, PathBuf};

use geometry::prelude::PointF;
use tracing::debug;
use worldfile::WorldFile;

use crate::error::{Error, Result};
use crate::formats::pnm;
use crate::model::{ObjectKind, VectorObject};
use crate::{MapCore, ROBOT_RADIUS};

/// Options controlling how a Stage world is written.
#[derive(Debug, Copy, Clone)]
pub struct StageWorldOptions {
    /// Give each robot a sonar ring.
    pub has_sonar: bool,
    /// Give each robot a laser.
    pub has_laser: bool,
    /// The port assigned to the first robot; subsequent robots count up.
    pub initial_port: i32,
}

impl Default for StageWorldOptions {
    fn default() -> Self {
        Self {
            has_sonar: true,
            has_laser: false,
            initial_port: 6665,
        }
    }
}

impl MapCore {
    /// Loads a Stage world: parses the `.world` file, resolves units,
    /// loads the referenced PNM bitmap as the grid, and places the robots.
    ///
    /// Worlds with more than one bitmap, or with gzip-compressed images,
    /// are not supported.
    pub fn load_stage_map(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let world = match WorldFile::load(path) {
            Ok(world) => world,
            Err(worldfile::Error::Io(_)) => {
                self.set_error_strings("Error", format!("Could not open {}", path.display()));
                return Err(Error::FileOpen(path.to_path_buf()));
            }
            Err(e) => {
                self.set_error_strings("Error", format!("Could not parse {}", path.display()));
                return Err(e.into());
            }
        };

        self.reset_all_objects();

        // Units default to metres; resolution to 0.1 length units.
        let mut unit_divisor: f32 = 1000.0;
        let mut use_radians = false;
        let mut resolution: f32 = 0.1;
        let mut image: Option<String> = None;
        let mut robots: Vec<(f32, f32, f32)> = Vec::new();

        const MISSING: f64 = 847_463.25;

        for entity in 0..world.num_entities() {
            let kind = world.entity_type(entity);
            if kind.is_empty() {
                match world.get_str(entity, "unit_length") {
                    Some("mm") => unit_divisor = 1.0,
                    Some("cm") => unit_divisor = 10.0,
                    Some(_) => unit_divisor = 1000.0,
                    None => {}
                }
                if world.get_str(entity, "unit_angle") == Some("radians") {
                    use_radians = true;
                }
                let r = world.get_f64(entity, "resolution", -1.0);
                if r != -1.0 {
                    resolution = r as f32;
                }
            } else if kind.eq_ignore_ascii_case("position")
                || kind.eq_ignore_ascii_case("omniposition")
            {
                let x = world.get_tuple_f64(entity, "pose", 0, MISSING);
                let y = world.get_tuple_f64(entity, "pose", 1, MISSING);
                let th = world.get_tuple_f64(entity, "pose", 2, MISSING);
                if x == MISSING || y == MISSING || th == MISSING {
                    continue;
                }
                robots.push((x as f32, y as f32, th as f32));
            } else if kind.eq_ignore_ascii_case("bitmap")
                || kind.eq_ignore_ascii_case("environment")
            {
                if image.is_some() {
                    self.set_error_strings("Error", "Only one bitmap per world is supported");
                    return Err(Error::UnsupportedFormat(
                        "multiple bitmap entities".into(),
                    ));
                }
                let file = world.get_str(entity, "file").unwrap_or_default().to_owned();
                if file.ends_with(".gz") {
                    self.set_error_strings("Error", "Compressed images are not supported");
                    return Err(Error::UnsupportedFormat("gzip-compressed image".into()));
                }
                let r = world.get_f64(entity, "resolution", MISSING);
                if r != MISSING {
                    resolution = r as f32;
                }
                let s = world.get_f64(entity, "scale", MISSING);
                if s != MISSING {
                    resolution = s as f32;
                }
                image = Some(file);
            }
        }

        let Some(image) = image else {
            self.set_error_strings("Error", "The world names no bitmap image");
            return Err(Error::UnsupportedFormat("world has no bitmap".into()));
        };

        let image_path: PathBuf = path
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join(&image);
        debug!(image = %image_path.display(), "loading stage bitmap");
        self.load_image(&image_path)?;

        self.resolution = (resolution * unit_divisor + 0.5) as i64;

        for (x, y, heading) in robots {
            let cx = x * unit_divisor;
            let cy = y * unit_divisor;
            let heading = if use_radians {
                heading.to_degrees()
            } else {
                heading
            };
            let layer = self.model.next_layer();
            let r = ROBOT_RADIUS as f32;
            self.set_object(VectorObject::new(
                layer,
                heading,
                ObjectKind::Robot,
                PointF::new(cx - r, cy + r),
                PointF::new(cx + r, cy - r),
            ));
        }
        Ok(())
    }

    /// Saves a Stage world: a `.world` entity file next to a PNM bitmap
    /// named after it. Cells at or above `occupancy_threshold` become
    /// occupied pixels; the bitmap carries no greyscale grading.
    pub fn save_stage(
        &mut self,
        path: impl AsRef<Path>,
        options: &StageWorldOptions,
        occupancy_threshold: f32,
    ) -> Result<()> {
        use std::io::Write;

        let path = path.as_ref();
        if !self.has_map() {
            return Err(Error::NoMapLoaded);
        }
        if !self.view_grid_map() {
            self.push_all_vectors_onto_grid();
        }

        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "world".to_owned());
        let pnm_name = format!("{stem}.pnm");
        let pnm_path = path
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join(&pnm_name);

        let file = std::fs::File::create(path).map_err(|_| Error::FileSave(path.to_path_buf()))?;
        let mut out = std::io::BufWriter::new(file);
        let io = |_| Error::FileSave(path.to_path_buf());

        writeln!(out, "# {stem}.world exported by mapcore").map_err(io)?;
        writeln!(out, "unit_length \"mm\"").map_err(io)?;
        writeln!(out, "unit_angle \"degrees\"").map_err(io)?;
        writeln!(out, "resolution {}", self.resolution).map_err(io)?;
        writeln!(out).map_err(io)?;
        writeln!(out, "environment (").map_err(io)?;
        writeln!(out, "  file \"{pnm_name}\"").map_err(io)?;
        writeln!(out, "  resolution {}", self.resolution).map_err(io)?;
        writeln!(out, ")").map_err(io)?;

        let bounds = self.map_cell_bounds;
        for (i, robot) in self.robots().enumerate() {
            let centre = robot.centre();
            // Robot poses are relative to the map's south-west corner.
            let x = centre.x - (bounds.left() * self.resolution) as f32;
            let y = centre.y - (bounds.bot() * self.resolution) as f32;
            writeln!(out).map_err(io)?;
            writeln!(out, "position (").map_err(io)?;
            writeln!(out, "  pose [{} {} {}]", x, y, robot.value).map_err(io)?;
            writeln!(out, "  port {}", options.initial_port + i as i32).map_err(io)?;
            if options.has_sonar {
                writeln!(out, "  sonar ( )").map_err(io)?;
            }
            if options.has_laser {
                writeln!(out, "  laser ( )").map_err(io)?;
            }
            writeln!(out, ")").map_err(io)?;
        }
        out.flush().map_err(io)?;

        let inner = self.grid.bounds();
        pnm::save_pnm(&pnm_path, bounds, |x, y| {
            let mut v = self.grid.read(x, y);
            if v == -1.0 {
                // Unknown inside the map reads occupied; the area outside
                // the map (where a robot may be parked) reads free.
                v = if inner.contains(geometry::prelude::Point::new(x, y)) {
                    1.0
                } else {
                    0.0
                };
            }
            // Occupied cells are the non-zero pixels, matching the image
            // loader's convention.
            if v >= occupancy_threshold {
                255
            } else {
                0
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn save_then_load_round_trips_grid_and_robot() {
        let dir = tempfile::tempdir().unwrap();
        let world_path = dir.path().join("arena.world");

        let mut map = MapCore::new();
        map.new_map(0, 1000, 0, 1000);
        map.set_rectangle_filled(200, 200, 400, 400, 1.0);
        map.set_robot(700, 700).unwrap();
        map.save_stage(&world_path, &StageWorldOptions::default(), 0.5)
            .unwrap();

        let mut loaded = MapCore::new();
        loaded.load_stage_map(&world_path).unwrap();
        assert_eq!(loaded.resolution(), 100);
        assert_eq!(loaded.robots().count(), 1);
        // The filled rectangle survives as occupied cells.
        assert_eq!(loaded.get_point_val(3, 3), 1.0);
        assert_eq!(loaded.get_point_val(8, 8), 0.0);
    }

    #[test]
    fn gz_images_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let world_path = dir.path().join("zipped.world");
        std::fs::write(
            &world_path,
            "environment ( file \"cave.pnm.gz\" )\n",
        )
        .unwrap();
        let mut map = MapCore::new();
        assert!(matches!(
            map.load_stage_map(&world_path),
            Err(Error::UnsupportedFormat(_))
        ));
    }
}
