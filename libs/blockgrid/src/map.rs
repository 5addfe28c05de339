//! `f32` occupancy maps and their transforms.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::ops::{Deref, DerefMut};
use std::path::Path;

use geometry::prelude::{floor_div, Rect};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::grid::BlockGrid;
use crate::{Error, Result, DEFAULT_BLOCK_SIZE};

/// Which value survives when several cells collapse into one during
/// dimension reduction.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReducePick {
    /// Keep the largest of the summarised cells.
    Largest,
    /// Keep the smallest of the summarised cells.
    Smallest,
}

/// An occupancy grid: a [`BlockGrid`] of `f32` with default `0.0`.
///
/// Canonical occupancy lives in `[0, 1]` with `1.0` = occupied; `-1.0` is
/// the *unknown* sentinel. The map-level operations (reduction, blurring,
/// correlation, scoring, occupied-area growth) live here; everything else
/// derefs to the underlying [`BlockGrid`].
#[derive(Debug, Clone)]
pub struct GridMap {
    grid: BlockGrid<f32>,
    /// Factor-4 reduction alternates between a north-east and a south-west
    /// window shift on consecutive calls so repeated downsampling does not
    /// drift the map.
    reduce_northeast: bool,
}

impl Default for GridMap {
    fn default() -> Self {
        Self::new()
    }
}

impl Deref for GridMap {
    type Target = BlockGrid<f32>;
    fn deref(&self) -> &Self::Target {
        &self.grid
    }
}

impl DerefMut for GridMap {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.grid
    }
}

impl GridMap {
    /// Creates an empty map with the default block size.
    pub fn new() -> Self {
        Self::with_block_size(DEFAULT_BLOCK_SIZE)
    }

    /// Creates an empty map with the given block size.
    pub fn with_block_size(block_size: i64) -> Self {
        Self::with_default_value(block_size, 0.0)
    }

    /// Creates an empty map whose unwritten cells read as `default`.
    ///
    /// Comparison and averaging operations use maps with defaults of `0.5`
    /// (no information) or `-1.0` (unknown) so that out-of-bounds reads
    /// fall into the right branch.
    pub fn with_default_value(block_size: i64, default: f32) -> Self {
        Self {
            grid: BlockGrid::new(block_size, default),
            reduce_northeast: true,
        }
    }

    /// Moves the contents of `other` into `self`, leaving `other` reset.
    pub fn take(&mut self, other: &mut GridMap) {
        self.grid.take(&mut other.grid);
    }

    /// Map width in cells, from the updated bounds.
    pub fn width(&self) -> i64 {
        self.bounds().width()
    }

    /// Map height in cells, from the updated bounds.
    pub fn height(&self) -> i64 {
        self.bounds().height()
    }

    /// Shrinks the map by `factor` (1, 4 or 9), keeping per window the
    /// value selected by `pick`.
    ///
    /// A factor-4 reduction has no central cell, so each call shifts the
    /// map slightly; consecutive calls alternate the shift direction
    /// (north-east, then south-west) to keep repeated reductions centred.
    ///
    /// # Panics
    ///
    /// Panics on an unsupported factor.
    pub fn reduce(&mut self, factor: u32, pick: ReducePick) {
        assert!(
            matches!(factor, 1 | 4 | 9),
            "unsupported reduction factor {factor}"
        );
        if factor == 1 {
            return;
        }

        let mut old = Self::with_block_size(self.grid.block_size());
        old.grid.take(&mut self.grid);

        let bounds = old.alloc_bounds();
        let (west, east) = (bounds.left(), bounds.right());
        let (south, north) = (bounds.bot(), bounds.top());

        let mut fold = |this: &mut Self, xs: [i64; 2], ys: [i64; 2], tx: i64, ty: i64| {
            let (mut max, mut min) = (f32::MIN, f32::MAX);
            for y in ys[0]..=ys[1] {
                for x in xs[0]..=xs[1] {
                    let v = old.get(x, y);
                    max = max.max(v);
                    min = min.min(v);
                }
            }
            match pick {
                ReducePick::Largest if max != 0.0 => this.put(max, tx, ty),
                ReducePick::Smallest if min != 0.0 => this.put(min, tx, ty),
                _ => {}
            }
        };

        match factor {
            4 => {
                if self.reduce_northeast {
                    self.reduce_northeast = false;
                    let mut y = north - 1;
                    while y > south - 1 {
                        let mut x = west;
                        while x < east {
                            fold(self, [x, x + 1], [y, y + 1], x / 2, y / 2);
                            x += 2;
                        }
                        y -= 2;
                    }
                } else {
                    self.reduce_northeast = true;
                    let mut y = north;
                    while y > south - 1 {
                        let mut x = west + 1;
                        while x < east + 1 {
                            fold(self, [x - 1, x], [y - 1, y], x / 2, y / 2);
                            x += 2;
                        }
                        y -= 2;
                    }
                }
            }
            9 => {
                let mut y = north - 1;
                while y > south {
                    let mut x = west + 1;
                    while x < east {
                        fold(self, [x - 1, x + 1], [y - 1, y + 1], x / 3, y / 3);
                        x += 3;
                    }
                    y -= 3;
                }
            }
            _ => unreachable!(),
        }
    }

    /// Two-pass running-sum box blur with an odd kernel.
    ///
    /// The vertical pass writes into a fresh map, then the horizontal pass
    /// reads that intermediate. Running sums with magnitude below `1e-3`
    /// snap to zero so numeric dust does not smear across empty areas.
    pub fn box_blur(&mut self, kernel_size: u32, box_val: f32) {
        let mut k = kernel_size as i64;
        if k % 2 == 0 {
            k += 1;
        }
        let half = (k - 1) / 2;

        for pass in 0..2 {
            let mut old = Self::with_block_size(self.grid.block_size());
            old.grid.take(&mut self.grid);

            let bounds = old.alloc_bounds();
            let (xmin, xmax) = (bounds.left(), bounds.right());
            let (ymin, ymax) = (bounds.bot(), bounds.top());

            // The two passes are the same loop with the axes swapped.
            let vertical = pass == 0;
            let (amin, amax, bmin, bmax) = if vertical {
                (xmin, xmax, ymin, ymax)
            } else {
                (ymin, ymax, xmin, xmax)
            };
            let read = |o: &Self, a: i64, b: i64| {
                if vertical {
                    o.get(a, b)
                } else {
                    o.get(b, a)
                }
            };

            for a in amin..=amax {
                let mut sum = 0.0f32;
                for i in -half..=half {
                    sum += read(&old, a, bmin + i);
                }
                let v = sum * box_val / k as f32;
                if vertical {
                    self.put(v, a, bmin);
                } else {
                    self.put(v, bmin, a);
                }

                for b in bmin + 1..=bmax {
                    sum += read(&old, a, b + half);
                    sum -= read(&old, a, b - half - 1);
                    if sum.abs() < 1e-3 {
                        sum = 0.0;
                    }
                    let v = sum * box_val / k as f32;
                    if vertical {
                        self.put(v, a, b);
                    } else {
                        self.put(v, b, a);
                    }
                }
            }
        }
    }

    /// Gaussian blur: builds a normalised binomial kernel (outer product of
    /// a Pascal row) and applies it in a single pass.
    pub fn gauss_blur(&mut self, kernel_size: u32) {
        let mut k = kernel_size as i64;
        if k % 2 == 0 {
            k += 1;
        }
        if k < 3 {
            k = 3;
        }
        let half = (k - 1) / 2;

        // Pascal row of order k-1.
        let mut row = vec![1.0f64; k as usize];
        for i in 1..k as usize {
            row[i] = row[i - 1] * (k - i as i64) as f64 / i as f64;
        }
        let mut mask = vec![vec![0.0f64; k as usize]; k as usize];
        let mut total = 0.0;
        for (i, bi) in row.iter().enumerate() {
            for (j, bj) in row.iter().enumerate() {
                mask[i][j] = bi * bj;
                total += mask[i][j];
            }
        }
        for line in mask.iter_mut() {
            for m in line.iter_mut() {
                *m /= total;
            }
        }

        let mut old = Self::with_block_size(self.grid.block_size());
        old.grid.take(&mut self.grid);

        let bounds = old.alloc_bounds();
        for y in bounds.bot()..=bounds.top() {
            for x in bounds.left()..=bounds.right() {
                let mut sum = 0.0f64;
                for (r, line) in mask.iter().enumerate() {
                    for (c, m) in line.iter().enumerate() {
                        sum += old.get(x + c as i64 - half, y + r as i64 - half) as f64 * m;
                    }
                }
                self.put(sum as f32, x, y);
            }
        }
    }

    /// Grows every cell whose value lies in `[lower, upper]` into a disc of
    /// `radius` millimetres (configuration-space dilation).
    ///
    /// A neighbouring cell is painted when its centre lies within `radius`
    /// of the seed cell's centre, unless it already holds a higher value.
    /// `square_size` is the map resolution in millimetres per cell.
    pub fn grow_occupied(&mut self, radius: i64, lower: f32, upper: f32, square_size: i64) -> bool {
        if radius <= 0 || square_size == 0 {
            return false;
        }

        let before = self.bounds();
        let mut old = Self::with_block_size(self.grid.block_size());
        old.grid.take(&mut self.grid);

        let reach = radius / square_size + 1;

        for cx in before.left()..=before.right() {
            let mut cy = before.top();
            while cy >= before.bot() {
                let v = old.get(cx, cy);
                if v >= lower && v <= upper {
                    for dx in -reach..=reach {
                        for dy in -reach..=reach {
                            let (nx, ny) = (cx + dx, cy + dy);
                            if self.get(nx, ny) >= v {
                                continue;
                            }
                            let xdiff = (dx.abs() * square_size) as f64;
                            let ydiff = (dy.abs() * square_size) as f64;
                            if (xdiff * xdiff + ydiff * ydiff).sqrt() <= radius as f64 {
                                self.put(v, nx, ny);
                            }
                        }
                    }
                } else {
                    self.put(v, cx, cy);
                }
                cy -= 1;
            }
        }

        let after = self.bounds();
        self.set_bounds(before.union(after));
        true
    }

    /// Baron's correlation coefficient between two maps, over the union of
    /// their updated bounds. Missing cells read as default. The result is
    /// truncated to 4 decimal places and lies in `[-1, 1]`.
    pub fn correlate(&self, other: &GridMap) -> f64 {
        let bounds = self.bounds().union(other.bounds());
        debug!(?bounds, "correlating maps");

        let mut count = 0u64;
        let (mut avg_a, mut avg_b, mut avg_prod) = (0.0f64, 0.0f64, 0.0f64);
        for y in (bounds.bot()..=bounds.top()).rev() {
            for x in bounds.left()..=bounds.right() {
                count += 1;
                let a = self.get(x, y) as f64;
                let b = other.get(x, y) as f64;
                avg_a += a;
                avg_b += b;
                avg_prod += a * b;
            }
        }
        avg_a /= count as f64;
        avg_b /= count as f64;
        avg_prod /= count as f64;

        let (mut var_a, mut var_b) = (0.0f64, 0.0f64);
        for y in (bounds.bot()..=bounds.top()).rev() {
            for x in bounds.left()..=bounds.right() {
                let a = self.get(x, y) as f64;
                let b = other.get(x, y) as f64;
                var_a += (a - avg_a) * (a - avg_a);
                var_b += (b - avg_b) * (b - avg_b);
            }
        }
        var_a /= count as f64;
        var_b /= count as f64;

        let result = (avg_prod - avg_a * avg_b) / (var_a.sqrt() * var_b.sqrt());
        (result * 10_000.0) as i64 as f64 / 10_000.0
    }

    /// The Martin/Moravec map score: the sum of squared cell differences
    /// over the union of bounds. `0` is a perfect match; lower is better.
    ///
    /// Pairs where both cells read exactly `0.5` (the "no information"
    /// midpoint) are skipped. With `occupied_only`, a pair contributes only
    /// when either cell exceeds `0.5`.
    pub fn score(&self, other: &GridMap, occupied_only: bool) -> f64 {
        let bounds = self.bounds().union(other.bounds());

        let mut score = 0.0f64;
        for x in bounds.left()..=bounds.right() {
            for y in (bounds.bot()..=bounds.top()).rev() {
                let a = self.get(x, y) as f64;
                let b = other.get(x, y) as f64;
                let include = if occupied_only {
                    a > 0.5 || b > 0.5
                } else {
                    !(a == 0.5 && b == 0.5)
                };
                if include {
                    score += (a - b) * (a - b);
                }
            }
        }
        if score < 1e-5 {
            score = 0.0;
        }
        score
    }

    /// Stamps the straight line from `(x1, y1)` to `(x2, y2)` (millimetres)
    /// into the grid at the given resolution.
    ///
    /// Steps along the major axis one cell at a time; with `double_line` a
    /// parallel line one cell to the perpendicular side is stamped as well,
    /// the side chosen by slope sign (or midpoint parity for axis-aligned
    /// lines). Cells are addressed with floor division, so negative
    /// non-integer coordinates round down.
    pub fn add_line(
        &mut self,
        x1: i64,
        y1: i64,
        x2: i64,
        y2: i64,
        value: f32,
        square_size: i64,
        double_line: bool,
    ) -> bool {
        if square_size < 1 {
            return false;
        }
        let ss = square_size;
        let (mut x1, mut y1, mut x2, mut y2) = (x1, y1, x2, y2);

        let sloped = y2 / ss != y1 / ss && x1 / ss != x2 / ss;
        let slope = if sloped {
            (y2 - y1) as f64 / (x2 - x1) as f64
        } else {
            0.0
        };
        let y_intercept = y1 - (slope * x1 as f64) as i64;

        if (y2 - y1).abs() >= (x2 - x1).abs() {
            // Step along y.
            if y2 < y1 {
                std::mem::swap(&mut y1, &mut y2);
                std::mem::swap(&mut x1, &mut x2);
            }
            let offset = if sloped {
                if x1 > x2 {
                    ss
                } else {
                    -ss
                }
            } else if ((x1 + x2) / 2) % ss >= ss / 2 {
                ss
            } else {
                -ss
            };

            let mut y = y1;
            while y < y2 + (ss - (y2 % ss)) {
                let x = if sloped {
                    ((y - y_intercept) as f64 / slope) as i64
                } else {
                    x1
                };
                let (cx, cy) = (floor_div(x, ss), floor_div(y, ss));
                self.put(value, cx, cy);
                if double_line {
                    self.put(value, floor_div(x + offset, ss), cy);
                }
                y += ss;
            }
        } else {
            // Step along x.
            if x2 < x1 {
                std::mem::swap(&mut y1, &mut y2);
                std::mem::swap(&mut x1, &mut x2);
            }
            let offset = if sloped {
                if y1 > y2 {
                    ss
                } else {
                    -ss
                }
            } else if ((y1 + y2) / 2) % ss >= ss / 2 {
                ss
            } else {
                -ss
            };

            let mut x = x1;
            while x < x2 + (ss - (x2 % ss)) {
                let y = if sloped {
                    (slope * x as f64) as i64 + y_intercept
                } else {
                    y1
                };
                let (cx, cy) = (floor_div(x, ss), floor_div(y, ss));
                self.put(value, cx, cy);
                if double_line {
                    self.put(value, cx, floor_div(y + offset, ss));
                }
                x += ss;
            }
        }
        true
    }

    /// Saves the map in the legacy grid format: an ASCII header
    /// `N S E W D R` followed by rows of values, north row first.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut out = BufWriter::new(File::create(path)?);
        let bounds = self.bounds();
        let above = self.depth() - 1;
        writeln!(
            out,
            "{} {} {} {} {} {}",
            bounds.top(),
            bounds.bot(),
            bounds.right(),
            bounds.left(),
            above,
            self.block_size()
        )?;
        for y in (bounds.bot()..=bounds.top()).rev() {
            for x in bounds.left()..=bounds.right() {
                for z in 0..=above {
                    write!(out, "{} ", self.get_at(x, y, z))?;
                }
            }
            writeln!(out)?;
        }
        out.flush()?;
        Ok(())
    }

    /// Loads a map saved by [`save`](Self::save).
    ///
    /// The stored block size is ignored; the grid re-chunks with its own.
    pub fn load<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let reader = BufReader::new(File::open(path)?);
        let mut tokens = Vec::new();
        for line in reader.lines() {
            tokens.extend(
                line?
                    .split_whitespace()
                    .map(str::to_owned)
                    .collect::<Vec<_>>(),
            );
        }
        let mut it = tokens.into_iter();
        let mut header = |name: &str| -> Result<i64> {
            it.next()
                .ok_or_else(|| Error::Malformed(format!("missing {name}")))?
                .parse::<i64>()
                .map_err(|_| Error::Malformed(format!("non-numeric {name}")))
        };
        let north = header("north")?;
        let south = header("south")?;
        let east = header("east")?;
        let west = header("west")?;
        let above = header("above")?;
        let _block_size = header("block size")?;

        if north < south || east < west || above < 0 {
            return Err(Error::Malformed("inverted dimensions".into()));
        }

        let default = *self.grid.default_value();
        self.grid = BlockGrid::with_depth(self.grid.block_size(), above + 1, default);
        'read: for y in (south..=north).rev() {
            for x in west..=east {
                for z in 0..=above {
                    let Some(tok) = it.next() else { break 'read };
                    let v: f32 = tok
                        .parse()
                        .map_err(|_| Error::Malformed(format!("non-numeric cell `{tok}`")))?;
                    self.put_at(v, x, y, z);
                }
            }
        }
        self.set_bounds(Rect::from_sides(west, south, east, north));
        Ok(())
    }
}

/// Convenience conversion: wraps an existing block grid. The reduction
/// shift state starts north-east.
impl From<BlockGrid<f32>> for GridMap {
    fn from(grid: BlockGrid<f32>) -> Self {
        Self {
            grid,
            reduce_northeast: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn box_blur_spreads_a_point() {
        let mut map = GridMap::with_block_size(20);
        map.put(1.0, 10, 10);
        map.box_blur(3, 1.0);
        assert_relative_eq!(map.get(10, 10), 1.0 / 9.0, epsilon = 1e-5);
        assert_relative_eq!(map.get(9, 9), 1.0 / 9.0, epsilon = 1e-5);
        assert_eq!(map.get(10, 14), 0.0);
    }

    #[test]
    fn gauss_blur_uses_binomial_weights() {
        let mut map = GridMap::with_block_size(20);
        map.put(1.0, 10, 10);
        map.gauss_blur(3);
        assert_relative_eq!(map.get(10, 10), 0.25, epsilon = 1e-5);
        assert_relative_eq!(map.get(9, 10), 0.125, epsilon = 1e-5);
        assert_relative_eq!(map.get(9, 9), 0.0625, epsilon = 1e-5);
    }

    #[test]
    fn grow_occupied_paints_an_exact_disk() {
        let mut map = GridMap::with_block_size(20);
        map.put(1.0, 5, 5);
        assert!(map.grow_occupied(250, 1.0, 1.0, 100));
        let bounds = map.alloc_bounds();
        for x in bounds.left()..=bounds.right() {
            for y in bounds.bot()..=bounds.top() {
                let d = (((x - 5) * (x - 5) + (y - 5) * (y - 5)) as f64).sqrt();
                let expected = if d <= 2.5 { 1.0 } else { 0.0 };
                assert_eq!(map.get(x, y), expected, "cell ({x},{y}) at distance {d}");
            }
        }
    }

    #[test]
    fn correlate_is_one_for_identical_maps() {
        let mut a = GridMap::with_block_size(20);
        for i in 0..10 {
            a.put(0.1 * i as f32, i, i);
        }
        let b = a.clone();
        assert_relative_eq!(a.correlate(&b), 1.0, epsilon = 1e-3);
    }

    #[test]
    fn score_is_zero_for_identical_maps_and_positive_otherwise() {
        let mut a = GridMap::with_block_size(20);
        a.put(1.0, 0, 0);
        a.put(0.25, 1, 1);
        let b = a.clone();
        assert_eq!(a.score(&b, false), 0.0);
        let mut c = b.clone();
        c.put(0.0, 0, 0);
        assert_relative_eq!(a.score(&c, false), 1.0, epsilon = 1e-5);
    }

    #[test]
    fn reduce_by_four_alternates_shift() {
        let mut map = GridMap::with_block_size(8);
        map.put(1.0, 0, 0);
        map.put(0.5, 2, 2);
        map.reduce(4, ReducePick::Largest);
        assert_eq!(map.get(0, 0), 1.0);
        assert_eq!(map.get(1, 1), 0.5);
        // The alternation flag must have flipped.
        map.put(0.8, 3, 3);
        map.reduce(4, ReducePick::Largest);
        assert_eq!(map.get(1, 1), 0.8);
    }

    #[test]
    fn add_line_marks_every_crossed_cell() {
        let mut map = GridMap::new();
        map.add_line(100, 100, 300, 100, 0.8, 100, false);
        assert_eq!(map.get(1, 1), 0.8);
        assert_eq!(map.get(2, 1), 0.8);
        assert_eq!(map.get(3, 1), 0.8);
        assert_eq!(map.get(4, 1), 0.0);
    }

    #[test]
    fn save_load_round_trip() {
        let mut map = GridMap::with_block_size(20);
        map.put(1.0, 0, 0);
        map.put(0.5, 3, 2);
        map.put(-1.0, 1, 4);
        map.set_bounds(Rect::from_sides(0, 0, 4, 4));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("grid.map");
        map.save(&path).unwrap();

        let mut loaded = GridMap::with_block_size(20);
        loaded.load(&path).unwrap();
        assert_eq!(loaded.bounds(), map.bounds());
        for y in 0..=4 {
            for x in 0..=4 {
                assert_eq!(loaded.get(x, y), map.get(x, y), "cell ({x},{y})");
            }
        }
    }
}
