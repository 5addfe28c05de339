//! The Carmen binary map format: an ASCII comment header followed by
//! tagged, length-prefixed binary records with a little-endian `f32`
//! grid.

use std::io::{Cursor, Read, Seek, SeekFrom, Write};
use std::path::Path;

use blockgrid::GridMap;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use chrono::Local;
use geometry::prelude::Rect;

use crate::error::{Error, Result};
use crate::MapCore;

const LABEL: &[u8] = b"CARMENMAPFILE";
const VERSION: &[u8] = b"v020";

const CREATOR_RECORD: u8 = 1;
const GRIDMAP_RECORD: u8 = 2;

/// Writes a string padded (or truncated) to exactly `n` bytes.
fn write_padded<W: Write>(out: &mut W, s: &str, n: usize) -> std::io::Result<()> {
    let bytes = s.as_bytes();
    let take = bytes.len().min(n);
    out.write_all(&bytes[..take])?;
    for _ in take..n {
        out.write_all(b" ")?;
    }
    Ok(())
}

/// Loads the GRIDMAP record of a Carmen map into `map`.
///
/// Values are clamped into `{-1} ∪ [0, 1]`; near-zero noise snaps to 0.
pub(crate) fn load_into(path: &Path, map: &mut GridMap) -> Result<()> {
    let data = std::fs::read(path).map_err(|_| Error::FileOpen(path.to_path_buf()))?;
    let mut cur = Cursor::new(&data);

    let unsupported = || Error::UnsupportedFormat("not a Carmen map".into());

    // Comment lines.
    loop {
        let mut byte = [0u8; 1];
        cur.read_exact(&mut byte).map_err(|_| unsupported())?;
        if byte[0] == b'#' {
            // To end of line.
            loop {
                cur.read_exact(&mut byte).map_err(|_| unsupported())?;
                if byte[0] == b'\n' {
                    break;
                }
            }
        } else {
            cur.seek(SeekFrom::Current(-1)).map_err(|_| unsupported())?;
            break;
        }
    }

    let mut id = vec![0u8; LABEL.len() + VERSION.len()];
    cur.read_exact(&mut id).map_err(|_| unsupported())?;
    if &id[..LABEL.len()] != LABEL || &id[LABEL.len()..] != VERSION {
        return Err(unsupported());
    }

    loop {
        let record_type = match cur.read_u8() {
            Ok(t) => t,
            Err(_) => return Err(unsupported()),
        };
        let record_size = cur.read_i32::<LittleEndian>().map_err(|_| unsupported())?;
        if record_type != GRIDMAP_RECORD {
            cur.seek(SeekFrom::Current(record_size as i64))
                .map_err(|_| unsupported())?;
            continue;
        }

        let mut description = [0u8; 10];
        cur.read_exact(&mut description).map_err(|_| unsupported())?;
        let size_x = cur.read_i32::<LittleEndian>().map_err(|_| unsupported())?;
        let size_y = cur.read_i32::<LittleEndian>().map_err(|_| unsupported())?;
        let _resolution = cur.read_f32::<LittleEndian>().map_err(|_| unsupported())?;
        if size_x <= 0 || size_y <= 0 {
            return Err(unsupported());
        }

        for x in 0..size_x as i64 {
            for y in 0..size_y as i64 {
                let mut v = cur.read_f32::<LittleEndian>().map_err(|_| unsupported())?;
                if v > 0.0 && v < 0.001 {
                    v = 0.0;
                }
                if v < -1.0 {
                    v = -1.0;
                }
                if v < 0.0 && v > -0.001 {
                    v = 0.0;
                }
                if v > 1.0 {
                    v = 1.0;
                }
                map.put(v, x, y);
            }
        }
        map.set_bounds(Rect::from_sides(0, 0, size_x as i64 - 1, size_y as i64 - 1));
        return Ok(());
    }
}

/// Writes `map` as a Carmen map.
///
/// `resolution` (metres per cell) goes into the text header only; the
/// binary GRIDMAP record stores a fixed resolution of 100, as the
/// historical writer always did. Readers take the grid geometry from the
/// record sizes, so nothing downstream trusts the stored value.
pub(crate) fn save_into(path: &Path, map: &GridMap, resolution: f64) -> Result<()> {
    let file = std::fs::File::create(path).map_err(|_| Error::FileSave(path.to_path_buf()))?;
    let mut out = std::io::BufWriter::new(file);
    let io = |_| Error::FileSave(path.to_path_buf());

    let bounds = map.bounds();
    let size_x = bounds.width() as i32;
    let size_y = bounds.height() as i32;

    let header = format!(
        "#####################################################\n\
         #\n\
         # Carnegie Mellon Robot Toolkit (CARMEN) map file\n\
         #\n\
         # Creation date : {}\n\
         # Map size      : {} x {}\n\
         # Resolution    : {:.1}\n\
         # Origin        : mapcore\n\
         # Description   : occupancy grid export\n\
         #\n\
         #####################################################\n",
        Local::now().format("%a %b %e %H:%M:%S %Y"),
        size_x,
        size_y,
        resolution,
    );
    out.write_all(header.as_bytes()).map_err(io)?;
    out.write_all(LABEL).map_err(io)?;
    out.write_all(VERSION).map_err(io)?;

    // Creator record.
    out.write_u8(CREATOR_RECORD).map_err(io)?;
    let creator_size = 10 + 10 + 8 + 80 + 80;
    out.write_i32::<LittleEndian>(creator_size).map_err(io)?;
    write_padded(&mut out, "CREATOR", 10).map_err(io)?;
    write_padded(&mut out, "UNKNOWN", 10).map_err(io)?;
    out.write_i64::<LittleEndian>(Local::now().timestamp())
        .map_err(io)?;
    write_padded(&mut out, "mapcore map export", 80).map_err(io)?;
    write_padded(&mut out, "occupancy grid", 80).map_err(io)?;

    // Grid map record, column-major little-endian floats.
    out.write_u8(GRIDMAP_RECORD).map_err(io)?;
    let record_size = 10 + 12 + size_x * size_y * 4;
    out.write_i32::<LittleEndian>(record_size).map_err(io)?;
    write_padded(&mut out, "GRIDMAP", 10).map_err(io)?;
    out.write_i32::<LittleEndian>(size_x).map_err(io)?;
    out.write_i32::<LittleEndian>(size_y).map_err(io)?;
    out.write_f32::<LittleEndian>(100.0).map_err(io)?;

    for x in 0..size_x as i64 {
        for y in 0..size_y as i64 {
            let v = map.get(bounds.left() + x, bounds.bot() + y);
            out.write_f32::<LittleEndian>(v).map_err(io)?;
        }
    }
    out.flush().map_err(io)?;
    Ok(())
}

impl MapCore {
    /// Loads a Carmen grid map (grid data only; Carmen maps carry no
    /// vectors).
    pub fn load_carmen(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let mut map = GridMap::new();
        if let Err(e) = load_into(path, &mut map) {
            self.set_error_strings("Error!", "Failed to parse the grid map file");
            return Err(e);
        }
        self.add_map(map);
        Ok(())
    }

    /// Saves the displayed grid as a Carmen map.
    pub fn save_carmen(&mut self, path: impl AsRef<Path>) -> Result<()> {
        if !self.has_map() {
            self.set_error_strings("Error!", "No map loaded");
            return Err(Error::NoMapLoaded);
        }
        let mut map = GridMap::new();
        self.latest_grid_map(&mut map);
        save_into(path.as_ref(), &map, 1.0 / self.resolution as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    #[test]
    fn round_trips_a_random_grid() {
        let mut rng = StdRng::seed_from_u64(42);
        let mut map = GridMap::new();
        for x in 0..64 {
            for y in 0..64 {
                // Stay clear of the loader's sub-0.001 noise snapping.
                let v = if rng.gen_bool(0.1) {
                    -1.0
                } else {
                    rng.gen_range(0.001f32..=1.0)
                };
                map.put(v, x, y);
            }
        }
        map.set_bounds(Rect::from_sides(0, 0, 63, 63));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("map.carmen");
        save_into(&path, &map, 0.01).unwrap();

        let mut loaded = GridMap::new();
        load_into(&path, &mut loaded).unwrap();
        assert_eq!(loaded.bounds(), map.bounds());
        for x in 0..64 {
            for y in 0..64 {
                assert_eq!(loaded.get(x, y), map.get(x, y), "cell ({x},{y})");
            }
        }
    }

    #[test]
    fn rejects_non_carmen_data() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("not.carmen");
        std::fs::write(&path, "gridpointlist\nwidth 2\nheight 2\n").unwrap();
        let mut map = GridMap::new();
        assert!(load_into(&path, &mut map).is_err());
    }
}
