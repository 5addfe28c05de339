//! Axis-aligned rectangles.

use serde::{Deserialize, Serialize};

use crate::point::Point;
use crate::side::Side;

/// An axis-aligned rectangle, specified by lower-left and upper-right corners.
#[derive(
    Debug, Default, Copy, Clone, Hash, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord,
)]
pub struct Rect {
    /// The lower-left corner.
    p0: Point,
    /// The upper-right corner.
    p1: Point,
}

impl Rect {
    /// Creates a rectangle from two corners, sorting the coordinates.
    pub fn new(p0: Point, p1: Point) -> Self {
        Self {
            p0: Point::new(p0.x.min(p1.x), p0.y.min(p1.y)),
            p1: Point::new(p0.x.max(p1.x), p0.y.max(p1.y)),
        }
    }

    /// Creates a rectangle from all 4 sides (left, bottom, right, top).
    ///
    /// # Panics
    ///
    /// Panics if `left > right` or `bot > top`; use [`Rect::new`] when the
    /// sides may need sorting.
    pub fn from_sides(left: i64, bot: i64, right: i64, top: i64) -> Self {
        assert!(left <= right, "left ({left}) must not exceed right ({right})");
        assert!(bot <= top, "bot ({bot}) must not exceed top ({top})");
        Self {
            p0: Point::new(left, bot),
            p1: Point::new(right, top),
        }
    }

    /// Creates a zero-area rectangle containing the given point.
    #[inline]
    pub const fn from_point(p: Point) -> Self {
        Self { p0: p, p1: p }
    }

    /// The least x-coordinate (west side).
    #[inline]
    pub const fn left(&self) -> i64 {
        self.p0.x
    }

    /// The least y-coordinate (south side).
    #[inline]
    pub const fn bot(&self) -> i64 {
        self.p0.y
    }

    /// The greatest x-coordinate (east side).
    #[inline]
    pub const fn right(&self) -> i64 {
        self.p1.x
    }

    /// The greatest y-coordinate (north side).
    #[inline]
    pub const fn top(&self) -> i64 {
        self.p1.y
    }

    /// The coordinate of the given compass side.
    pub const fn side(&self, side: Side) -> i64 {
        match side {
            Side::West => self.p0.x,
            Side::South => self.p0.y,
            Side::East => self.p1.x,
            Side::North => self.p1.y,
        }
    }

    /// The lower-left corner.
    #[inline]
    pub const fn lower_left(&self) -> Point {
        self.p0
    }

    /// The upper-right corner.
    #[inline]
    pub const fn upper_right(&self) -> Point {
        self.p1
    }

    /// Width measured in whole cells, inclusive of both edge columns.
    #[inline]
    pub const fn width(&self) -> i64 {
        self.p1.x - self.p0.x + 1
    }

    /// Height measured in whole cells, inclusive of both edge rows.
    #[inline]
    pub const fn height(&self) -> i64 {
        self.p1.y - self.p0.y + 1
    }

    /// Returns whether the rectangle contains the point (borders included).
    pub const fn contains(&self, p: Point) -> bool {
        p.x >= self.p0.x && p.x <= self.p1.x && p.y >= self.p0.y && p.y <= self.p1.y
    }

    /// The smallest rectangle containing both `self` and `other`.
    pub fn union(&self, other: Rect) -> Self {
        Self {
            p0: Point::new(self.p0.x.min(other.p0.x), self.p0.y.min(other.p0.y)),
            p1: Point::new(self.p1.x.max(other.p1.x), self.p1.y.max(other.p1.y)),
        }
    }

    /// Expands the rectangle to cover the given point.
    pub fn expand_to(&self, p: Point) -> Self {
        self.union(Rect::from_point(p))
    }

    /// The overlapping region of two rectangles, if any.
    pub fn intersection(&self, other: Rect) -> Option<Self> {
        let left = self.p0.x.max(other.p0.x);
        let bot = self.p0.y.max(other.p0.y);
        let right = self.p1.x.min(other.p1.x);
        let top = self.p1.y.min(other.p1.y);
        (left <= right && bot <= top).then(|| Self::from_sides(left, bot, right, top))
    }

    /// Grows the rectangle outward by `margin` on every side.
    pub fn expand_all(&self, margin: i64) -> Self {
        Self {
            p0: Point::new(self.p0.x - margin, self.p0.y - margin),
            p1: Point::new(self.p1.x + margin, self.p1.y + margin),
        }
    }

    /// Translates the rectangle by the given delta.
    pub fn translate(&self, delta: Point) -> Self {
        Self {
            p0: self.p0 + delta,
            p1: self.p1 + delta,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_sorts_corners() {
        let r = Rect::new(Point::new(5, -2), Point::new(-1, 7));
        assert_eq!(r.left(), -1);
        assert_eq!(r.bot(), -2);
        assert_eq!(r.right(), 5);
        assert_eq!(r.top(), 7);
    }

    #[test]
    fn union_and_intersection() {
        let a = Rect::from_sides(0, 0, 10, 10);
        let b = Rect::from_sides(5, 5, 20, 20);
        assert_eq!(a.union(b), Rect::from_sides(0, 0, 20, 20));
        assert_eq!(a.intersection(b), Some(Rect::from_sides(5, 5, 10, 10)));
        let c = Rect::from_sides(11, 11, 12, 12);
        assert_eq!(a.intersection(c), None);
    }

    #[test]
    fn inclusive_dimensions() {
        let r = Rect::from_sides(0, 0, 0, 0);
        assert_eq!(r.width(), 1);
        assert_eq!(r.height(), 1);
    }
}
