//! 2-D points in cell and world coordinates.

use serde::{Deserialize, Serialize};

/// A point with integer coordinates.
///
/// Used for grid cells (one unit = one cell) and whole-millimetre world
/// positions.
#[derive(
    Debug, Copy, Clone, Default, Hash, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord,
)]
pub struct Point {
    /// The x-coordinate of the point.
    pub x: i64,
    /// The y-coordinate of the point.
    pub y: i64,
}

impl Point {
    /// Creates a new [`Point`] from (x, y) coordinates.
    pub const fn new(x: i64, y: i64) -> Self {
        Self { x, y }
    }

    /// Returns the origin, `(0, 0)`.
    #[inline]
    pub const fn zero() -> Self {
        Self { x: 0, y: 0 }
    }

    /// Euclidean distance to another point.
    pub fn dist(&self, other: Point) -> f64 {
        let dx = (self.x - other.x) as f64;
        let dy = (self.y - other.y) as f64;
        (dx * dx + dy * dy).sqrt()
    }
}

impl std::ops::Add<Point> for Point {
    type Output = Self;
    fn add(self, rhs: Point) -> Self::Output {
        Self::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl std::ops::AddAssign<Point> for Point {
    fn add_assign(&mut self, rhs: Point) {
        self.x += rhs.x;
        self.y += rhs.y;
    }
}

impl std::ops::Sub<Point> for Point {
    type Output = Self;
    fn sub(self, rhs: Point) -> Self::Output {
        Self::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl std::ops::SubAssign<Point> for Point {
    fn sub_assign(&mut self, rhs: Point) {
        self.x -= rhs.x;
        self.y -= rhs.y;
    }
}

impl std::ops::Neg for Point {
    type Output = Self;
    fn neg(self) -> Self::Output {
        Self {
            x: -self.x,
            y: -self.y,
        }
    }
}

impl From<(i64, i64)> for Point {
    fn from(value: (i64, i64)) -> Self {
        Self {
            x: value.0,
            y: value.1,
        }
    }
}

/// A point with single-precision float coordinates.
///
/// Vector-object endpoints are stored this way, in millimetres.
#[derive(Debug, Copy, Clone, Default, Serialize, Deserialize, PartialEq, PartialOrd)]
pub struct PointF {
    /// The x-coordinate of the point.
    pub x: f32,
    /// The y-coordinate of the point.
    pub y: f32,
}

impl PointF {
    /// Creates a new [`PointF`] from (x, y) coordinates.
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Returns the origin, `(0, 0)`.
    #[inline]
    pub const fn zero() -> Self {
        Self { x: 0.0, y: 0.0 }
    }

    /// Euclidean distance to another point.
    pub fn dist(&self, other: PointF) -> f64 {
        let dx = (self.x - other.x) as f64;
        let dy = (self.y - other.y) as f64;
        (dx * dx + dy * dy).sqrt()
    }

    /// Rounds both coordinates down to their containing grid cell.
    ///
    /// Negative non-integer coordinates round down, matching
    /// [`floor_cell`](crate::floor_cell).
    pub fn cell(&self) -> Point {
        Point::new(crate::floor_cell(self.x), crate::floor_cell(self.y))
    }
}

impl std::ops::Add<PointF> for PointF {
    type Output = Self;
    fn add(self, rhs: PointF) -> Self::Output {
        Self::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl std::ops::Sub<PointF> for PointF {
    type Output = Self;
    fn sub(self, rhs: PointF) -> Self::Output {
        Self::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl From<Point> for PointF {
    fn from(value: Point) -> Self {
        Self {
            x: value.x as f32,
            y: value.y as f32,
        }
    }
}

impl From<(f32, f32)> for PointF {
    fn from(value: (f32, f32)) -> Self {
        Self {
            x: value.0,
            y: value.1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cell_rounds_negative_coordinates_down() {
        assert_eq!(PointF::new(2.5, -2.5).cell(), Point::new(2, -3));
        assert_eq!(PointF::new(-2.0, 0.0).cell(), Point::new(-2, 0));
    }

    #[test]
    fn point_arithmetic() {
        let p = Point::new(3, -4) + Point::new(1, 1);
        assert_eq!(p, Point::new(4, -3));
        assert_eq!(-p, Point::new(-4, 3));
        assert_eq!(Point::zero().dist(Point::new(3, 4)), 5.0);
    }
}
