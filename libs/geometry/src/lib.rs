//! 2-D geometric primitives and angle arithmetic for occupancy-grid and
//! vector map manipulation.
//!
//! All angles are in degrees. Undirected line angles live in `[0, 180)`,
//! directed pose angles in `[-180, 180]`, and everything else in `[0, 360)`.
//!
//! # Examples
//!
//! Create a [segment](crate::segment::Segment) and query its angle:
//!
//! ```
//! # use geometry::prelude::*;
//! let seg = Segment::new(PointF::new(0.0, 5.0), PointF::new(10.0, 5.0));
//! assert_eq!(seg.angle(), 0.0);
//! ```
#![warn(missing_docs)]

pub mod point;
pub mod prelude;
pub mod rect;
pub mod segment;
pub mod side;

use crate::point::PointF;
use crate::segment::Segment;

/// Wraps the given angle to the interval `[0, 360)` degrees.
///
/// # Examples
///
/// ```
/// use geometry::wrap_angle;
///
/// assert_eq!(wrap_angle(10.), 10.);
/// assert_eq!(wrap_angle(-10.), 350.);
/// assert_eq!(wrap_angle(725.), 5.);
/// assert_eq!(wrap_angle(-360.), 0.);
/// ```
pub fn wrap_angle(angle: f64) -> f64 {
    ((angle % 360.) + 360.) % 360.
}

/// Wraps a pose angle into `[-180, 180]` degrees.
///
/// # Examples
///
/// ```
/// use geometry::fix_angle;
///
/// assert_eq!(fix_angle(90.), 90.);
/// assert_eq!(fix_angle(450.), 90.);
/// assert_eq!(fix_angle(-270.), 90.);
/// ```
pub fn fix_angle(angle: f64) -> f64 {
    let mut angle = angle;
    if angle >= 360. {
        angle -= 360. * ((angle as i64) / 360) as f64;
    }
    if angle < -360. {
        angle += 360. * ((angle as i64) / -360) as f64;
    }
    if angle <= -180. {
        angle = 180. + (angle + 180.);
    }
    angle
}

/// Converts degrees to radians.
#[inline]
pub fn deg_to_rad(deg: f64) -> f64 {
    deg * std::f64::consts::PI / 180.0
}

/// Converts radians to degrees.
#[inline]
pub fn rad_to_deg(rad: f64) -> f64 {
    rad * 180.0 / std::f64::consts::PI
}

/// Two-argument arctangent returning degrees.
#[inline]
pub fn atan2_deg(y: f64, x: f64) -> f64 {
    rad_to_deg(y.atan2(x))
}

/// Floor division of world coordinates onto grid cells.
///
/// A negative coordinate that does not fall exactly on a cell boundary
/// rounds *down*, so `(-1 mm, resolution 100)` lands in cell `-1`, not `0`.
///
/// # Examples
///
/// ```
/// use geometry::floor_div;
///
/// assert_eq!(floor_div(250, 100), 2);
/// assert_eq!(floor_div(-250, 100), -3);
/// assert_eq!(floor_div(-200, 100), -2);
/// ```
pub fn floor_div(a: i64, b: i64) -> i64 {
    if a < 0 && a % b != 0 {
        a / b - 1
    } else {
        a / b
    }
}

/// Rounds a fractional grid coordinate down to its containing cell.
///
/// Same convention as [`floor_div`]: negative non-integers round down.
#[inline]
pub fn floor_cell(v: f32) -> i64 {
    v.floor() as i64
}

/// Midpoint of two scalars.
#[inline]
pub fn midway(a: f32, b: f32) -> f32 {
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    lo + (hi - lo) / 2.0
}

/// Rotates the point `(x, y)` clockwise about the origin by `th` degrees.
pub fn point_rotate(x: &mut f64, y: &mut f64, th: f64) {
    let (sn, cs) = deg_to_rad(th).sin_cos();
    let (xt, yt) = (*x, *y);
    *x = cs * xt + sn * yt;
    *y = cs * yt - sn * xt;
}

/// Computes the centre of the circle passing through three points.
///
/// Returns `None` when the points are collinear and no circle exists.
pub fn circle_centre_from_3_points(
    p1: PointF,
    p2: PointF,
    p3: PointF,
) -> Option<PointF> {
    // The length of the bisectors is irrelevant: the intersection test
    // treats them as infinite lines.
    let b1 = Segment::bisector_of(p1, p2, 500.0);
    let b2 = Segment::bisector_of(p2, p3, 500.0);
    let (x, y) = b1.intersection(&b2, true, Segment::DEFAULT_HIT_THRESHOLD)?;
    Some(PointF::new(x as f32, y as f32))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn deg_rad_round_trip() {
        let mut x = -10.0;
        while x <= 10.0 {
            assert_relative_eq!(deg_to_rad(rad_to_deg(x)), x, epsilon = 1e-6);
            x += 0.37;
        }
    }

    #[test]
    fn fix_angle_wraps_poses() {
        assert_eq!(fix_angle(0.), 0.);
        assert_eq!(fix_angle(180.), 180.);
        assert_eq!(fix_angle(-180.), 180.);
        assert_eq!(fix_angle(540.), 180.);
    }

    #[test]
    fn circle_centre_of_unit_circle() {
        let c = circle_centre_from_3_points(
            PointF::new(1.0, 0.0),
            PointF::new(0.0, 1.0),
            PointF::new(-1.0, 0.0),
        )
        .unwrap();
        assert_relative_eq!(c.x, 0.0, epsilon = 1e-3);
        assert_relative_eq!(c.y, 0.0, epsilon = 1e-3);
    }

    #[test]
    fn collinear_points_have_no_circle() {
        assert!(circle_centre_from_3_points(
            PointF::new(0.0, 0.0),
            PointF::new(1.0, 1.0),
            PointF::new(2.0, 2.0),
        )
        .is_none());
    }
}
