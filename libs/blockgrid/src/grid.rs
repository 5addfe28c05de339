//! The sparse block mesh.

use std::cell::Cell;
use std::mem;

use geometry::prelude::{Point, Rect, Side};

use crate::block::{Block, BlockId};
use crate::DEFAULT_BLOCK_SIZE;

/// A sparse 2-D grid of `T`, stored as a rectangular mesh of fixed-size
/// blocks that grows on demand in any compass direction.
///
/// Every grid has a *default* value; cells that were never written, and all
/// coordinates outside the allocated mesh, read as that default. This
/// contract is load-bearing: callers probe neighbours of boundary cells
/// without checking bounds first.
///
/// The grid tracks two rectangles:
/// - the *allocated* bounds, the union of all block extents, and
/// - the *updated* bounds, the tight bounding box of every cell that was
///   ever written with a non-default value. The updated bounds only grow;
///   they are re-seeded by [`reset`](Self::reset).
///
/// An optional third dimension of size `depth` stores per-cell flag layers;
/// most grids use `depth == 1` and the plain [`get`](Self::get) /
/// [`put`](Self::put) accessors.
#[derive(Debug, Clone)]
pub struct BlockGrid<T> {
    blocks: Vec<Option<Block<T>>>,
    block_size: i64,
    depth: i64,
    default: T,
    /// Corner caches; `anchor` is any live block to start lookups from.
    anchor: BlockId,
    nw: BlockId,
    ne: BlockId,
    sw: BlockId,
    se: BlockId,
    /// Lookups walk neighbour links from the block accessed last, which is
    /// observed-constant for local access patterns.
    last_accessed: Cell<Option<BlockId>>,
    alloc: Rect,
    updated: Rect,
    fresh: bool,
}

impl<T: Clone + PartialEq> BlockGrid<T> {
    /// Creates an empty grid with the given block size and default value.
    pub fn new(block_size: i64, default: T) -> Self {
        Self::with_depth(block_size, 1, default)
    }

    /// Creates an empty grid with a third dimension of size `depth`.
    pub fn with_depth(block_size: i64, depth: i64, default: T) -> Self {
        assert!(block_size > 0, "block size must be positive");
        assert!(depth > 0, "depth must be positive");
        let first = Block::new(Point::zero(), block_size);
        Self {
            blocks: vec![Some(first)],
            block_size,
            depth,
            default,
            anchor: BlockId(0),
            nw: BlockId(0),
            ne: BlockId(0),
            sw: BlockId(0),
            se: BlockId(0),
            last_accessed: Cell::new(None),
            alloc: Rect::from_sides(0, 0, block_size - 1, block_size - 1),
            updated: Rect::from_point(Point::zero()),
            fresh: true,
        }
    }

    /// The width (and height) of one block, in cells.
    pub fn block_size(&self) -> i64 {
        self.block_size
    }

    /// The size of the third dimension.
    pub fn depth(&self) -> i64 {
        self.depth
    }

    /// The grid's default value.
    pub fn default_value(&self) -> &T {
        &self.default
    }

    /// The allocated bounds: the union of all block extents.
    pub fn alloc_bounds(&self) -> Rect {
        self.alloc
    }

    /// The updated bounds: the tight bounding box of all cells ever written
    /// with a non-default value, or a zero rectangle at the origin when the
    /// grid is untouched.
    pub fn bounds(&self) -> Rect {
        if self.fresh {
            Rect::from_point(Point::zero())
        } else {
            self.updated
        }
    }

    /// Whether any non-default value was written since the last reset.
    pub fn is_fresh(&self) -> bool {
        self.fresh
    }

    /// Overrides the updated bounds.
    ///
    /// Loaders use this to stamp a map's nominal extent after bulk writes.
    pub fn set_bounds(&mut self, bounds: Rect) {
        self.updated = bounds;
        self.fresh = false;
    }

    /// Reads the cell at `(x, y)` in the base layer.
    ///
    /// Returns the default value for any coordinate outside the allocated
    /// mesh or whose column was never written.
    pub fn get(&self, x: i64, y: i64) -> T {
        self.get_at(x, y, 0)
    }

    /// Reads the cell at `(x, y)` in layer `z`.
    pub fn get_at(&self, x: i64, y: i64, z: i64) -> T {
        if z < 0 || z >= self.depth || !self.alloc.contains(Point::new(x, y)) {
            return self.default.clone();
        }
        match self.find_block(x, y) {
            Ok(id) => {
                let b = self.block(id);
                let lx = (x - b.origin.x) as usize;
                let ly = (y - b.origin.y) as usize;
                b.value_at(lx, ly, z as usize, self.depth as usize)
                    .cloned()
                    .unwrap_or_else(|| self.default.clone())
            }
            Err(_) => self.default.clone(),
        }
    }

    /// Writes the cell at `(x, y)` in the base layer, growing the mesh as
    /// needed.
    pub fn put(&mut self, value: T, x: i64, y: i64) {
        self.put_at(value, x, y, 0);
    }

    /// Writes the cell at `(x, y)` in layer `z`, growing the mesh as needed.
    ///
    /// Returns `false` (and writes nothing) when `z` is out of range.
    pub fn put_at(&mut self, value: T, x: i64, y: i64, z: i64) -> bool {
        if z < 0 || z >= self.depth {
            return false;
        }
        let id = self.ensure(x, y);
        let non_default = value != self.default;
        let (block_size, depth) = (self.block_size as usize, self.depth as usize);
        let default = self.default.clone();
        let b = self.block_mut(id);
        let lx = (x - b.origin.x) as usize;
        let ly = (y - b.origin.y) as usize;
        *b.cell_mut(lx, ly, z as usize, block_size, depth, &default) = value;

        if non_default {
            let p = Point::new(x, y);
            if self.fresh {
                self.fresh = false;
                self.updated = Rect::from_point(p);
            } else {
                self.updated = self.updated.expand_to(p);
            }
        }
        true
    }

    /// Moves the value out of a cell, leaving the default behind.
    ///
    /// Does not allocate and does not touch the updated bounds; absent
    /// cells yield the default.
    pub fn take_cell(&mut self, x: i64, y: i64) -> T {
        if !self.alloc.contains(Point::new(x, y)) {
            return self.default.clone();
        }
        let id = match self.find_block(x, y) {
            Ok(id) => id,
            Err(_) => return self.default.clone(),
        };
        let (block_size, depth) = (self.block_size as usize, self.depth as usize);
        let default = self.default.clone();
        let b = self.block_mut(id);
        let lx = (x - b.origin.x) as usize;
        let ly = (y - b.origin.y) as usize;
        if !b.has_column(lx) {
            return default;
        }
        mem::replace(b.cell_mut(lx, ly, 0, block_size, depth, &default), default.clone())
    }

    /// Copies one row of the base layer into `buf`.
    ///
    /// `buf[0..=(to_x - from_x)]` receives the cells `(from_x..=to_x, y)`,
    /// with the default filled in outside the allocated mesh. Returns
    /// `false` when the arguments are inconsistent (reversed range or
    /// undersized buffer). This is the bulk read path: transforms read rows,
    /// not cells.
    pub fn copy_row(&self, buf: &mut [T], y: i64, from_x: i64, to_x: i64) -> bool {
        self.copy_row_at(buf, y, from_x, to_x, 0)
    }

    /// Copies one row of layer `z` into `buf`. See [`copy_row`](Self::copy_row).
    pub fn copy_row_at(&self, buf: &mut [T], y: i64, from_x: i64, to_x: i64, z: i64) -> bool {
        if from_x > to_x || z < 0 || z >= self.depth {
            return false;
        }
        let n = (to_x - from_x + 1) as usize;
        if buf.len() < n {
            return false;
        }

        if y < self.alloc.bot()
            || y > self.alloc.top()
            || to_x < self.alloc.left()
            || from_x > self.alloc.right()
        {
            for slot in buf[..n].iter_mut() {
                *slot = self.default.clone();
            }
            return true;
        }

        let mut i = 0usize;
        let mut x = from_x;
        while x < self.alloc.left() {
            buf[i] = self.default.clone();
            i += 1;
            x += 1;
        }

        let hi = to_x.min(self.alloc.right());
        let mut cur = match self.find_block(x, y) {
            Ok(id) => id,
            Err(_) => return false,
        };
        while x <= hi {
            let b = self.block(cur);
            let stop = hi.min(b.origin.x + self.block_size - 1);
            let ly = (y - b.origin.y) as usize;
            for xx in x..=stop {
                let lx = (xx - b.origin.x) as usize;
                buf[i] = b
                    .value_at(lx, ly, z as usize, self.depth as usize)
                    .cloned()
                    .unwrap_or_else(|| self.default.clone());
                i += 1;
            }
            x = stop + 1;
            if x <= hi {
                cur = match b.east {
                    Some(e) => e,
                    None => return false,
                };
            }
        }

        while x <= to_x {
            buf[i] = self.default.clone();
            i += 1;
            x += 1;
        }
        true
    }

    /// Releases every block and reinitialises the grid with a single block
    /// at the origin. Block size, depth and default are kept.
    pub fn reset(&mut self) {
        *self = Self::with_depth(self.block_size, self.depth, self.default.clone());
    }

    /// Moves the entire contents of `other` into `self`, leaving `other`
    /// freshly reinitialised.
    ///
    /// Unlike a [`Clone`], no cell data is duplicated. Both grids must
    /// agree on block size and depth for the result to be meaningful, so
    /// `self`'s parameters are replaced by `other`'s.
    pub fn take(&mut self, other: &mut Self) {
        let replacement = Self::with_depth(other.block_size, other.depth, other.default.clone());
        *self = mem::replace(other, replacement);
    }

    /// Restricts the grid to `rect`.
    ///
    /// Blocks wholly outside the rectangle are released; cells outside the
    /// rectangle but inside surviving blocks revert to the default. The
    /// updated bounds are set exactly to the (clamped) rectangle.
    pub fn crop(&mut self, rect: Rect) {
        let rect = rect.intersection(self.bounds()).unwrap_or(rect);

        let mut cropped = Self::with_depth(self.block_size, self.depth, self.default.clone());
        let width = rect.width() as usize;
        let mut row = vec![self.default.clone(); width];
        for z in 0..self.depth {
            for y in rect.bot()..=rect.top() {
                self.copy_row_at(&mut row, y, rect.left(), rect.right(), z);
                for (i, value) in row.iter().enumerate() {
                    if *value != self.default {
                        cropped.put_at(value.clone(), rect.left() + i as i64, y, z);
                    }
                }
            }
        }
        cropped.set_bounds(rect);
        *self = cropped;
    }

    /// Translates the whole grid by `(dx, dy)` cells.
    ///
    /// Every block origin and both bounds rectangles shift by the same
    /// delta; no cell data moves. `O(number of blocks)`.
    pub fn translate(&mut self, dx: i64, dy: i64) {
        let delta = Point::new(dx, dy);
        for slot in self.blocks.iter_mut().flatten() {
            slot.origin += delta;
        }
        self.alloc = self.alloc.translate(delta);
        self.updated = self.updated.translate(delta);
    }

    /// Grows the mesh (if needed) so that `(x, y)` is inside the allocated
    /// bounds, and returns the containing block.
    fn ensure(&mut self, x: i64, y: i64) -> BlockId {
        loop {
            match self.find_block(x, y) {
                Ok(id) => return id,
                Err(side) => {
                    let n = self.blocks_needed(side, x, y);
                    self.grow(side, n);
                }
            }
        }
    }

    /// How many rows/columns of blocks are needed to reach `(x, y)` on the
    /// given side. May undershoot for far coordinates; [`ensure`](Self::ensure)
    /// loops until the lookup succeeds.
    fn blocks_needed(&self, side: Side, x: i64, y: i64) -> i64 {
        let w = self.block_size;
        let n = match side {
            Side::East => (x - self.block(self.se).origin.x) / w,
            Side::West => (self.block(self.nw).origin.x - x) / w,
            Side::North => (y - self.block(self.nw).origin.y) / w,
            Side::South => (self.block(self.sw).origin.y - y) / w,
        };
        n.max(1)
    }

    /// Walks neighbour links from the last accessed block toward `(x, y)`.
    ///
    /// On failure returns the side on which the mesh ran out of blocks;
    /// sides are tried in the order east, north, south, west.
    fn find_block(&self, x: i64, y: i64) -> Result<BlockId, Side> {
        let w = self.block_size;
        let mut cur = self.last_accessed.get().unwrap_or(self.anchor);
        loop {
            let b = self.block(cur);
            if b.contains(x, y, w) {
                self.last_accessed.set(Some(cur));
                return Ok(cur);
            }
            cur = if x >= b.origin.x + w {
                b.east.ok_or(Side::East)?
            } else if y >= b.origin.y + w {
                b.north.ok_or(Side::North)?
            } else if y < b.origin.y {
                b.south.ok_or(Side::South)?
            } else {
                b.west.ok_or(Side::West)?
            };
        }
    }

    /// Appends `times` full rows/columns of blocks on the given side.
    fn grow(&mut self, side: Side, times: i64) {
        for _ in 0..times {
            self.grow_one(side);
        }
    }

    fn grow_one(&mut self, side: Side) {
        let w = self.block_size;
        // Walk the existing edge, hanging one new block off each edge block
        // and chaining the new blocks together as we go.
        let (start, step_toward, offset): (BlockId, Side, Point) = match side {
            Side::East => (self.ne, Side::South, Point::new(w, 0)),
            Side::West => (self.nw, Side::South, Point::new(-w, 0)),
            Side::North => (self.nw, Side::East, Point::new(0, w)),
            Side::South => (self.sw, Side::East, Point::new(0, -w)),
        };

        let mut cur = Some(start);
        let mut prev_new: Option<BlockId> = None;
        let mut first_new: Option<BlockId> = None;
        while let Some(c) = cur {
            let next = self.step(c, step_toward);
            let origin = self.block(c).origin + offset;
            let new_id = self.alloc_block(origin);
            self.link(c, new_id, side);
            if let Some(p) = prev_new {
                self.link(p, new_id, step_toward);
            } else {
                first_new = Some(new_id);
            }
            prev_new = Some(new_id);
            cur = next;
        }

        let first = first_new.expect("edge walk visits at least one block");
        let last = prev_new.expect("edge walk visits at least one block");
        match side {
            Side::East => {
                self.ne = first;
                self.se = last;
                self.alloc = Rect::from_sides(
                    self.alloc.left(),
                    self.alloc.bot(),
                    self.alloc.right() + w,
                    self.alloc.top(),
                );
            }
            Side::West => {
                self.nw = first;
                self.sw = last;
                self.alloc = Rect::from_sides(
                    self.alloc.left() - w,
                    self.alloc.bot(),
                    self.alloc.right(),
                    self.alloc.top(),
                );
            }
            Side::North => {
                self.nw = first;
                self.ne = last;
                self.alloc = Rect::from_sides(
                    self.alloc.left(),
                    self.alloc.bot(),
                    self.alloc.right(),
                    self.alloc.top() + w,
                );
            }
            Side::South => {
                self.sw = first;
                self.se = last;
                self.alloc = Rect::from_sides(
                    self.alloc.left(),
                    self.alloc.bot() - w,
                    self.alloc.right(),
                    self.alloc.top(),
                );
            }
        }
    }

    /// Links `b` and `new` as neighbours with `new` on the given side of `b`.
    fn link(&mut self, b: BlockId, new: BlockId, side: Side) {
        match side {
            Side::North => {
                self.block_mut(b).north = Some(new);
                self.block_mut(new).south = Some(b);
            }
            Side::South => {
                self.block_mut(b).south = Some(new);
                self.block_mut(new).north = Some(b);
            }
            Side::East => {
                self.block_mut(b).east = Some(new);
                self.block_mut(new).west = Some(b);
            }
            Side::West => {
                self.block_mut(b).west = Some(new);
                self.block_mut(new).east = Some(b);
            }
        }
    }

    fn step(&self, b: BlockId, side: Side) -> Option<BlockId> {
        let b = self.block(b);
        match side {
            Side::North => b.north,
            Side::South => b.south,
            Side::East => b.east,
            Side::West => b.west,
        }
    }

    fn alloc_block(&mut self, origin: Point) -> BlockId {
        let id = BlockId(self.blocks.len());
        self.blocks.push(Some(Block::new(origin, self.block_size)));
        id
    }

    fn block(&self, id: BlockId) -> &Block<T> {
        self.blocks[id.0].as_ref().expect("live block index")
    }

    fn block_mut(&mut self, id: BlockId) -> &mut Block<T> {
        self.blocks[id.0].as_mut().expect("live block index")
    }
}

impl<T: Clone + PartialEq> BlockGrid<T> {
    /// Convenience constructor using [`DEFAULT_BLOCK_SIZE`].
    pub fn with_default(default: T) -> Self {
        Self::new(DEFAULT_BLOCK_SIZE, default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::collections::HashMap;

    #[test]
    fn empty_grid_reads_default_everywhere() {
        let grid: BlockGrid<f32> = BlockGrid::new(100, -1.0);
        assert_eq!(grid.get(0, 0), -1.0);
        assert_eq!(grid.get(1_000_000, -1_000_000), -1.0);
        assert!(grid.is_fresh());
    }

    #[test]
    fn writes_round_trip_across_block_boundaries() {
        let mut grid: BlockGrid<f32> = BlockGrid::new(10, 0.0);
        for (x, y) in [(0, 0), (9, 9), (10, 10), (-1, -1), (-10, 25), (35, -3)] {
            grid.put((x * 100 + y) as f32, x, y);
        }
        for (x, y) in [(0, 0), (9, 9), (10, 10), (-1, -1), (-10, 25), (35, -3)] {
            assert_eq!(grid.get(x, y), (x * 100 + y) as f32, "cell ({x},{y})");
        }
    }

    #[test]
    fn random_writes_last_write_wins() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut grid: BlockGrid<f32> = BlockGrid::new(100, 0.0);
        let mut reference: HashMap<(i64, i64), f32> = HashMap::new();
        for _ in 0..2000 {
            let x = rng.gen_range(-10_000..=10_000);
            let y = rng.gen_range(-10_000..=10_000);
            let v = rng.gen_range(0.0f32..=1.0);
            grid.put(v, x, y);
            reference.insert((x, y), v);
        }
        for ((x, y), v) in reference {
            assert_eq!(grid.get(x, y), v);
        }
    }

    #[test]
    fn updated_bounds_are_tight() {
        let mut rng = StdRng::seed_from_u64(99);
        let mut grid: BlockGrid<f32> = BlockGrid::new(50, 0.0);
        let mut bbox: Option<Rect> = None;
        for _ in 0..300 {
            let x = rng.gen_range(-2_000..=2_000);
            let y = rng.gen_range(-2_000..=2_000);
            let v = rng.gen_range(0.1f32..=1.0);
            grid.put(v, x, y);
            let p = Point::new(x, y);
            bbox = Some(bbox.map_or(Rect::from_point(p), |r| r.expand_to(p)));
            // A default write must not move the bounds.
            grid.put(0.0, x + 3_000, y + 3_000);
        }
        assert_eq!(grid.bounds(), bbox.unwrap());
    }

    #[test]
    fn copy_row_pads_with_default_outside_mesh() {
        let mut grid: BlockGrid<f32> = BlockGrid::new(10, 0.5);
        grid.put(1.0, 0, 0);
        grid.put(2.0, 3, 0);
        let mut buf = vec![0.0f32; 9];
        assert!(grid.copy_row(&mut buf, 0, -4, 4));
        assert_eq!(buf, [0.5, 0.5, 0.5, 0.5, 1.0, 0.5, 0.5, 2.0, 0.5]);
    }

    #[test]
    fn copy_row_spans_multiple_blocks() {
        let mut grid: BlockGrid<i32> = BlockGrid::new(4, 0);
        for x in -6..=13 {
            grid.put(x as i32, x, 2);
        }
        let mut buf = vec![0i32; 20];
        assert!(grid.copy_row(&mut buf, 2, -6, 13));
        let expected: Vec<i32> = (-6..=13).collect();
        assert_eq!(buf, expected);
    }

    #[test]
    fn copy_row_rejects_bad_arguments() {
        let grid: BlockGrid<i32> = BlockGrid::new(4, 0);
        let mut buf = vec![0i32; 2];
        assert!(!grid.copy_row(&mut buf, 0, 5, 1));
        assert!(!grid.copy_row(&mut buf, 0, 0, 5));
    }

    #[test]
    fn translate_shifts_cells_and_bounds() {
        let mut grid: BlockGrid<f32> = BlockGrid::new(10, 0.0);
        grid.put(1.0, 2, 3);
        grid.put(0.5, -4, -7);
        let before = grid.bounds();
        grid.translate(100, -50);
        assert_eq!(grid.get(102, -47), 1.0);
        assert_eq!(grid.get(96, -57), 0.5);
        assert_eq!(grid.get(2, 3), 0.0);
        assert_eq!(grid.bounds(), before.translate(Point::new(100, -50)));
    }

    #[test]
    fn crop_releases_outside_and_sets_bounds() {
        let mut grid: BlockGrid<f32> = BlockGrid::new(10, 0.0);
        for x in -20..=20 {
            grid.put(1.0, x, x);
        }
        grid.crop(Rect::from_sides(-5, -5, 5, 5));
        assert_eq!(grid.bounds(), Rect::from_sides(-5, -5, 5, 5));
        assert_eq!(grid.get(0, 0), 1.0);
        assert_eq!(grid.get(-5, -5), 1.0);
        assert_eq!(grid.get(6, 6), 0.0);
        assert_eq!(grid.get(-20, -20), 0.0);
    }

    #[test]
    fn take_moves_contents_and_resets_source() {
        let mut a: BlockGrid<f32> = BlockGrid::new(10, 0.0);
        a.put(0.9, 7, -7);
        let mut b: BlockGrid<f32> = BlockGrid::new(10, 0.0);
        b.take(&mut a);
        assert_eq!(b.get(7, -7), 0.9);
        assert_eq!(a.get(7, -7), 0.0);
        assert!(a.is_fresh());
    }

    #[test]
    fn flag_layers_are_independent() {
        let mut grid: BlockGrid<bool> = BlockGrid::with_depth(10, 4, false);
        grid.put_at(true, 3, 3, 2);
        assert!(!grid.get_at(3, 3, 0));
        assert!(grid.get_at(3, 3, 2));
        assert!(!grid.put_at(true, 0, 0, 4));
    }

    #[test]
    fn take_cell_moves_value_out() {
        let mut grid: BlockGrid<Option<Vec<i32>>> = BlockGrid::new(10, None);
        grid.put(Some(vec![1, 2, 3]), 5, 5);
        assert_eq!(grid.take_cell(5, 5), Some(vec![1, 2, 3]));
        assert_eq!(grid.get(5, 5), None);
        assert_eq!(grid.take_cell(1000, 1000), None);
    }
}
