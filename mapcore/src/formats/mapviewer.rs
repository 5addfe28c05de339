//! The MapViewer `.mvm` format: the native carrier holding grid and
//! vector data together.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use blockgrid::GridMap;
use geometry::prelude::{PointF, Rect};
use tracing::debug;

use crate::error::{Error, Result};
use crate::formats::TextTokens;
use crate::model::{ObjectKind, VectorObject};
use crate::MapCore;

/// The result of parsing a `.mvm` file.
pub(crate) struct ParsedMapViewer {
    pub(crate) resolution: i64,
    /// When set, vector coordinates are in millimetres; otherwise they are
    /// scaled by the resolution (older files).
    pub(crate) resolution_off: bool,
    pub(crate) grid: Option<GridMap>,
    pub(crate) objects: Vec<VectorObject>,
    /// Bounding box over all vector coordinates, as stored.
    pub(crate) vector_bounds: Option<(f32, f32, f32, f32)>,
}

enum Section {
    None,
    Grid,
    Vectors,
}

/// Parses a `.mvm` file without touching any map state.
pub(crate) fn parse_file(path: &Path) -> Result<ParsedMapViewer> {
    let mut tokens = TextTokens::from_file(path)?;

    let mut parsed = ParsedMapViewer {
        resolution: crate::DEFAULT_RESOLUTION,
        resolution_off: false,
        grid: None,
        objects: Vec::new(),
        vector_bounds: None,
    };

    let mut section = Section::None;
    let mut west: Option<i64> = None;
    let mut east: Option<i64> = None;
    let mut north: Option<i64> = None;
    let mut south: Option<i64> = None;

    while !tokens.is_empty() {
        let word = tokens.expect()?.to_ascii_lowercase();
        match word.as_str() {
            "gridmap" => section = Section::Grid,
            "vectorobjects" => section = Section::Vectors,
            "resolution" => parsed.resolution = tokens.expect_i64()?,
            "resolution_off" => {
                let flag = tokens.expect()?;
                parsed.resolution_off = match flag.to_ascii_lowercase().as_str() {
                    "true" => true,
                    "false" => false,
                    _ => return Err(Error::parse(tokens.line(), flag)),
                };
            }
            "west" | "east" | "north" | "south" => {
                if !matches!(section, Section::Grid) {
                    return Err(Error::parse(tokens.line(), word));
                }
                let v = tokens.expect_i64()?;
                match word.as_str() {
                    "west" => west = Some(v),
                    "east" => east = Some(v),
                    "north" => north = Some(v),
                    _ => south = Some(v),
                }
            }
            "data" => {
                if !matches!(section, Section::Grid) {
                    return Err(Error::parse(tokens.line(), word));
                }
                let (Some(w), Some(e), Some(n), Some(s)) = (west, east, north, south) else {
                    return Err(Error::parse(tokens.line(), "data"));
                };
                parsed.grid = Some(read_grid_data(&mut tokens, w, e, n, s)?);
            }
            "line" | "rect" | "rectfill" | "robot" => {
                if !matches!(section, Section::Vectors) {
                    return Err(Error::parse(tokens.line(), word));
                }
                let kind = ObjectKind::from_keyword(&word).expect("matched keyword");
                let layer = tokens.expect_i64()?;
                let value = tokens.expect_f32()?;
                let x1 = tokens.expect_f32()?;
                let y1 = tokens.expect_f32()?;
                let x2 = tokens.expect_f32()?;
                let y2 = tokens.expect_f32()?;
                let object = VectorObject::new(
                    layer,
                    value,
                    kind,
                    PointF::new(x1, y1),
                    PointF::new(x2, y2),
                );
                let (lo_x, hi_x) = (x1.min(x2), x1.max(x2));
                let (lo_y, hi_y) = (y1.min(y2), y1.max(y2));
                parsed.vector_bounds = Some(match parsed.vector_bounds {
                    None => (lo_x, hi_x, lo_y, hi_y),
                    Some((a, b, c, d)) => (a.min(lo_x), b.max(hi_x), c.min(lo_y), d.max(hi_y)),
                });
                parsed.objects.push(object);
            }
            _ => return Err(Error::parse(tokens.line(), word)),
        }
    }

    Ok(parsed)
}

/// Reads the column-major cell data, honouring `[n v` run-length groups.
fn read_grid_data(
    tokens: &mut TextTokens,
    west: i64,
    east: i64,
    north: i64,
    south: i64,
) -> Result<GridMap> {
    let mut grid = GridMap::new();
    for x in west..=east {
        let mut y = south;
        while y <= north {
            let token = tokens.expect()?;
            if let Some(stripped) = token.strip_prefix('[') {
                let stripped = stripped.strip_suffix(']').unwrap_or(stripped);
                let run: i64 = stripped
                    .parse()
                    .map_err(|_| Error::parse(tokens.line(), token.clone()))?;
                let value = normalise(tokens.expect_f32()?);
                for _ in 0..run {
                    if y > north {
                        break;
                    }
                    grid.put(value, x, y);
                    y += 1;
                }
            } else {
                let value: f32 = token
                    .parse()
                    .map_err(|_| Error::parse(tokens.line(), token.clone()))?;
                grid.put(normalise(value), x, y);
                y += 1;
            }
        }
    }
    grid.set_bounds(Rect::from_sides(west, south, east, north));
    Ok(grid)
}

/// Clamps a stored cell value into `{-1} ∪ [0, 1]`.
fn normalise(value: f32) -> f32 {
    let value = value.min(1.0);
    if value < 0.0 && value != -1.0 {
        0.0
    } else {
        value
    }
}

/// Formats a cell value the way the files store them: `1`, `0`, `-1`, or
/// a 3-decimal fraction with the leading zero dropped.
fn cell_token(value: f32) -> String {
    if value == 1.0 {
        "1".to_owned()
    } else if value < 0.0 {
        "-1".to_owned()
    } else if value == 0.0 {
        "0".to_owned()
    } else {
        let s = format!("{value:.3}");
        let s = s.trim_end_matches('0').trim_end_matches('.');
        s.strip_prefix('0').unwrap_or(s).to_owned()
    }
}

impl MapCore {
    /// Loads a `.mvm` map, replacing the current contents.
    pub fn load_map_viewer(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let parsed = match parse_file(path) {
            Ok(parsed) => parsed,
            Err(e) => {
                self.set_error_strings(
                    "Error",
                    format!("Failed to parse the file {}", path.display()),
                );
                return Err(e);
            }
        };
        debug!(path = %path.display(), objects = parsed.objects.len(), "loaded mapviewer file");

        self.reset_all_objects();
        self.resolution = parsed.resolution;

        let load_grid = parsed.grid.is_some();
        match parsed.grid {
            Some(grid) => {
                self.add_map(grid);
                self.set_view_grid_map(true);
            }
            None => {
                let (min_x, max_x, min_y, max_y) =
                    parsed.vector_bounds.unwrap_or((0.0, 100.0, 0.0, 100.0));
                self.new_map(min_x as i64, max_x as i64, min_y as i64, max_y as i64);
                self.set_view_grid_map(false);
            }
        }

        let has_vectors = !parsed.objects.is_empty();
        for mut object in parsed.objects {
            object.layer = if load_grid {
                self.model.next_layer()
            } else {
                self.model.next_negative_layer()
            };
            if !parsed.resolution_off {
                let r = self.resolution as f32;
                object.p1 = PointF::new(object.p1.x * r, object.p1.y * r);
                object.p2 = PointF::new(object.p2.x * r, object.p2.y * r);
            }
            self.set_object(object);
        }

        self.set_view_vector_map(has_vectors);
        self.set_view_grid_map(load_grid);
        Ok(())
    }

    /// Saves the map in the `.mvm` format. Grid and vector sections are
    /// both optional.
    ///
    /// When both are saved, objects are lifted off the grid first so the
    /// grid section holds only the painted background, then re-projected.
    pub fn save_map_viewer(
        &mut self,
        path: impl AsRef<Path>,
        save_grid: bool,
        save_vector: bool,
    ) -> Result<()> {
        let path = path.as_ref();
        let file = File::create(path).map_err(|_| Error::FileSave(path.to_path_buf()))?;
        let mut out = BufWriter::new(file);

        let objects: Vec<VectorObject> = self.model.objects().to_vec();
        let lift_objects = !objects.is_empty() && save_grid && save_vector;
        if lift_objects {
            for object in &objects {
                self.grid.pop_object(object, self.resolution);
            }
            self.grid.delete_all_layer_info();
        }

        let io = |_: std::io::Error| Error::FileSave(path.to_path_buf());

        writeln!(out, "resolution {}", self.resolution).map_err(io)?;
        writeln!(out, "resolution_off true").map_err(io)?;

        if save_grid {
            let bounds = self.grid.bounds();
            writeln!(out, "gridmap ").map_err(io)?;
            writeln!(
                out,
                "west {} \neast {} \nnorth {} \nsouth {}",
                bounds.left(),
                bounds.right(),
                bounds.top(),
                bounds.bot()
            )
            .map_err(io)?;
            writeln!(out, "data").map_err(io)?;

            for x in bounds.left()..=bounds.right() {
                let mut y = bounds.bot();
                while y <= bounds.top() {
                    let value = self.grid.read(x, y);
                    let mut run = 1i64;
                    while y + run <= bounds.top() && self.grid.read(x, y + run) == value {
                        run += 1;
                    }
                    if run > 1 {
                        write!(out, "[{run} ").map_err(io)?;
                    }
                    write!(out, "{} ", cell_token(value)).map_err(io)?;
                    y += run;
                }
                writeln!(out).map_err(io)?;
            }
        }

        if save_vector && !objects.is_empty() {
            writeln!(out, "\nvectorobjects").map_err(io)?;
            for object in &objects {
                writeln!(
                    out,
                    "{} {} {} {} {} {} {}",
                    object.kind.keyword(),
                    object.layer,
                    object.value,
                    object.p1.x,
                    object.p1.y,
                    object.p2.x,
                    object.p2.y
                )
                .map_err(io)?;
            }
        }
        out.flush().map_err(io)?;

        if lift_objects {
            let mut by_layer = objects;
            by_layer.sort_by_key(|o| o.layer);
            for object in &by_layer {
                self.grid.push_object(object, self.resolution);
            }
        }
        Ok(())
    }
}
