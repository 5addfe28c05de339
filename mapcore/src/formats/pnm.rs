//! Binary greyscale PNM (`P5`) images as occupancy grids.

use std::path::Path;

use blockgrid::GridMap;
use geometry::prelude::Rect;

use crate::error::{Error, Result};
use crate::MapCore;

/// Loads a binary `P5` image; any non-zero pixel becomes an occupied
/// cell. The image's top row maps to the map's north row.
pub(crate) fn load_pnm(path: &Path) -> Result<GridMap> {
    let data = std::fs::read(path).map_err(|_| Error::FileOpen(path.to_path_buf()))?;
    let unsupported = || Error::UnsupportedFormat("not a P5 image".into());

    let mut pos = 0usize;

    let skip_separators = |pos: &mut usize| {
        loop {
            while *pos < data.len() && data[*pos].is_ascii_whitespace() {
                *pos += 1;
            }
            if *pos < data.len() && data[*pos] == b'#' {
                while *pos < data.len() && data[*pos] != b'\n' {
                    *pos += 1;
                }
            } else {
                break;
            }
        }
    };
    let read_number = |pos: &mut usize| -> Option<usize> {
        let start = *pos;
        while *pos < data.len() && data[*pos].is_ascii_digit() {
            *pos += 1;
        }
        std::str::from_utf8(&data[start..*pos]).ok()?.parse().ok()
    };

    if data.len() < 2 || &data[0..2] != b"P5" {
        return Err(unsupported());
    }
    pos += 2;

    skip_separators(&mut pos);
    let width = read_number(&mut pos).ok_or_else(unsupported)?;
    skip_separators(&mut pos);
    let height = read_number(&mut pos).ok_or_else(unsupported)?;
    skip_separators(&mut pos);
    let _maxval = read_number(&mut pos).ok_or_else(unsupported)?;
    // Exactly one separator byte before the raster.
    pos += 1;

    if width == 0 || height == 0 || data.len() < pos + width * height {
        return Err(unsupported());
    }

    let mut map = GridMap::new();
    for row in 0..height {
        let y = (height - 1 - row) as i64;
        for x in 0..width {
            let pixel = data[pos + row * width + x];
            map.put(if pixel > 0 { 1.0 } else { 0.0 }, x as i64, y);
        }
    }
    map.set_bounds(Rect::from_sides(0, 0, width as i64 - 1, height as i64 - 1));
    Ok(map)
}

/// Writes a `P5` image; the callback maps each `(x, y)` cell to a pixel.
pub(crate) fn save_pnm(
    path: &Path,
    bounds: Rect,
    mut pixel: impl FnMut(i64, i64) -> u8,
) -> Result<()> {
    use std::io::Write;
    let file = std::fs::File::create(path).map_err(|_| Error::FileSave(path.to_path_buf()))?;
    let mut out = std::io::BufWriter::new(file);
    let io = |_| Error::FileSave(path.to_path_buf());

    write!(
        out,
        "P5\n# CREATOR: mapcore\n{} {}\n255\n",
        bounds.width(),
        bounds.height()
    )
    .map_err(io)?;
    for y in (bounds.bot()..=bounds.top()).rev() {
        for x in bounds.left()..=bounds.right() {
            out.write_all(&[pixel(x, y)]).map_err(io)?;
        }
    }
    out.flush().map_err(io)
}

impl MapCore {
    /// Loads a `P5` PNM image as the grid map.
    pub fn load_image(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let map = load_pnm(path.as_ref())?;
        self.add_map(map);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pnm_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("img.pnm");

        let bounds = Rect::from_sides(0, 0, 3, 2);
        save_pnm(&path, bounds, |x, y| if x == y { 255 } else { 0 }).unwrap();

        let map = load_pnm(&path).unwrap();
        assert_eq!(map.bounds(), bounds);
        for x in 0..=3 {
            for y in 0..=2 {
                let expected = if x == y { 1.0 } else { 0.0 };
                assert_eq!(map.get(x, y), expected, "cell ({x},{y})");
            }
        }
    }

    #[test]
    fn comments_in_the_header_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("img.pnm");
        let mut bytes = b"P5\n# a comment\n2 2\n255\n".to_vec();
        bytes.extend_from_slice(&[255, 0, 0, 255]);
        std::fs::write(&path, bytes).unwrap();

        let map = load_pnm(&path).unwrap();
        // Top row of the image is the north row of the map.
        assert_eq!(map.get(0, 1), 1.0);
        assert_eq!(map.get(1, 1), 0.0);
        assert_eq!(map.get(0, 0), 0.0);
        assert_eq!(map.get(1, 0), 1.0);
    }
}
