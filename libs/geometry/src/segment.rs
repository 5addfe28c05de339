//! Line segments and the angle/intersection arithmetic on them.

use serde::{Deserialize, Serialize};

use crate::point::PointF;
use crate::{atan2_deg, point_rotate};

/// A line segment between two floating-point endpoints.
///
/// Two segments compare equal when they join the same pair of points in
/// either order.
#[derive(Debug, Copy, Clone, Default, Serialize, Deserialize)]
pub struct Segment {
    /// The first endpoint.
    pub p1: PointF,
    /// The second endpoint.
    pub p2: PointF,
}

impl PartialEq for Segment {
    fn eq(&self, other: &Self) -> bool {
        (self.p1 == other.p1 && self.p2 == other.p2)
            || (self.p1 == other.p2 && self.p2 == other.p1)
    }
}

impl Segment {
    /// The default slack, in coordinate units, accepted when deciding
    /// whether an intersection point lies on a segment.
    pub const DEFAULT_HIT_THRESHOLD: f64 = 2.0;

    /// Creates a segment between two points.
    pub const fn new(p1: PointF, p2: PointF) -> Self {
        Self { p1, p2 }
    }

    /// Creates a segment from raw endpoint coordinates.
    pub const fn from_coords(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self {
            p1: PointF::new(x1, y1),
            p2: PointF::new(x2, y2),
        }
    }

    /// Builds the segment of the given length centred on `(mid_x, mid_y)`
    /// at the given undirected angle in degrees.
    pub fn from_angle(mid_x: f64, mid_y: f64, angle: f64, length: f64) -> Self {
        let mut angle = angle;
        while angle >= 180.0 {
            angle -= 180.0;
        }
        while angle < 0.0 {
            angle += 180.0;
        }

        let (mut x, mut y) = (length / 2.0, 0.0);
        point_rotate(&mut x, &mut y, -angle);
        let p1 = PointF::new((x + mid_x) as f32, (y + mid_y) as f32);

        let (mut x, mut y) = (length / 2.0, 0.0);
        point_rotate(&mut x, &mut y, -(angle - 180.0));
        let p2 = PointF::new((x + mid_x) as f32, (y + mid_y) as f32);

        Self { p1, p2 }
    }

    /// Builds the perpendicular bisector of the chord `a -> b`, with the
    /// given length.
    pub fn bisector_of(a: PointF, b: PointF, length: f64) -> Self {
        let chord = Segment::new(a, b);
        let mid_x = crate::midway(a.x, b.x) as f64;
        let mid_y = crate::midway(a.y, b.y) as f64;
        Self::from_angle(mid_x, mid_y, chord.angle() + 90.0, length)
    }

    /// The Euclidean length of the segment.
    pub fn length(&self) -> f64 {
        self.p1.dist(self.p2)
    }

    /// The midpoint of the segment.
    pub fn midpoint(&self) -> PointF {
        PointF::new(
            crate::midway(self.p1.x, self.p2.x),
            crate::midway(self.p1.y, self.p2.y),
        )
    }

    /// The undirected angle of the segment in degrees, in `[0, 180)`.
    ///
    /// Horizontal segments report exactly `0`, vertical segments exactly
    /// `90`; everything else is the `atan2` angle truncated to 3 decimal
    /// places so that near-identical segments compare equal.
    pub fn angle(&self) -> f64 {
        let (x1, y1, x2, y2) = (self.p1.x, self.p1.y, self.p2.x, self.p2.y);
        let mut angle = if y1 == y2 && x1 != x2 {
            0.0
        } else if x1 == x2 && y1 != y2 {
            90.0
        } else {
            let a = atan2_deg((y2 - y1) as f64, (x2 - x1) as f64);
            (a * 1000.0) as i64 as f64 / 1000.0
        };
        while angle < 0.0 {
            angle += 180.0;
        }
        while angle >= 180.0 {
            angle -= 180.0;
        }
        angle
    }

    /// Computes the intersection of this segment with another.
    ///
    /// Both lines are written as `A·x + B·y + C = 0` and solved; segments
    /// with equal [`angle`](Self::angle) are treated as parallel and never
    /// intersect. When `infinite` is false the hit is accepted only if, for
    /// each segment, the summed distance from the hit to the segment's
    /// endpoints exceeds the segment length by at most `threshold`.
    pub fn intersection(&self, other: &Segment, infinite: bool, threshold: f64) -> Option<(f64, f64)> {
        if self.angle() == other.angle() {
            return None;
        }

        let (x1, y1) = (self.p1.x as f64, self.p1.y as f64);
        let (x2, y2) = (self.p2.x as f64, self.p2.y as f64);
        let (x3, y3) = (other.p1.x as f64, other.p1.y as f64);
        let (x4, y4) = (other.p2.x as f64, other.p2.y as f64);

        let a1 = y2 - y1;
        let b1 = x1 - x2;
        let c1 = x2 * y1 - x1 * y2;

        let a2 = y4 - y3;
        let b2 = x3 - x4;
        let c2 = x4 * y3 - x3 * y4;

        let den = a1 * b2 - a2 * b1;
        if den == 0.0 {
            return None;
        }

        let x = (-c1 * b2 + c2 * b1) / den;
        let y = (-a1 * c2 + a2 * c1) / den;

        if !infinite {
            let hit = PointF::new(x as f32, y as f32);
            let d = hit.dist(self.p1) + hit.dist(self.p2) - self.length();
            if d.abs() > threshold {
                return None;
            }
            let d = hit.dist(other.p1) + hit.dist(other.p2) - other.length();
            if d.abs() > threshold {
                return None;
            }
        }

        Some((x, y))
    }

    /// Distance from the query point to the nearest point of the segment.
    ///
    /// Follows the perpendicular through the query point; when its foot
    /// misses the segment, the distance to the nearer endpoint is returned.
    pub fn perp_distance_to(&self, x: f32, y: f32) -> f64 {
        let query = PointF::new(x, y);
        let reach = query.dist(self.p1).abs().max(1.0) * 2.5;
        let perp = Segment::from_angle(x as f64, y as f64, self.angle() + 90.0, reach);

        if let Some((ix, iy)) =
            self.intersection(&perp, false, Self::DEFAULT_HIT_THRESHOLD)
        {
            return query.dist(PointF::new(ix as f32, iy as f32));
        }

        query.dist(self.p1).min(query.dist(self.p2))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn axis_aligned_angles_are_exact() {
        assert_eq!(Segment::from_coords(0.0, 5.0, 9.0, 5.0).angle(), 0.0);
        assert_eq!(Segment::from_coords(3.0, 0.0, 3.0, 9.0).angle(), 90.0);
    }

    #[test]
    fn diagonal_angles_wrap_into_the_undirected_range() {
        assert_relative_eq!(
            Segment::from_coords(0.0, 0.0, 1.0, 1.0).angle(),
            45.0,
            epsilon = 1e-2
        );
        // A descending diagonal wraps into [0, 180).
        assert_relative_eq!(
            Segment::from_coords(0.0, 0.0, 1.0, -1.0).angle(),
            135.0,
            epsilon = 1e-2
        );
    }

    #[test]
    fn crossing_segments_intersect() {
        let a = Segment::from_coords(0.0, 0.0, 10.0, 10.0);
        let b = Segment::from_coords(0.0, 10.0, 10.0, 0.0);
        let (x, y) = a.intersection(&b, false, 2.0).unwrap();
        assert_relative_eq!(x, 5.0, epsilon = 1e-6);
        assert_relative_eq!(y, 5.0, epsilon = 1e-6);
    }

    #[test]
    fn parallel_segments_do_not_intersect() {
        let a = Segment::from_coords(0.0, 0.0, 10.0, 0.0);
        let b = Segment::from_coords(0.0, 1.0, 10.0, 1.0);
        assert!(a.intersection(&b, true, 2.0).is_none());
    }

    #[test]
    fn disjoint_segments_only_intersect_when_infinite() {
        let a = Segment::from_coords(0.0, 0.0, 10.0, 0.0);
        let b = Segment::from_coords(20.0, -10.0, 20.0, 10.0);
        assert!(a.intersection(&b, false, 2.0).is_none());
        assert!(a.intersection(&b, true, 2.0).is_some());
    }

    #[test]
    fn intersection_agrees_with_cross_product_reference() {
        // Deterministic pseudo-random batch; compare against the standard
        // parametric formulation.
        let mut state = 0x2545f4914f6cdd1du64;
        let mut rnd = || {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            ((state >> 11) as f64 / (1u64 << 53) as f64) * 200.0 - 100.0
        };
        for _ in 0..1000 {
            let a = Segment::from_coords(rnd() as f32, rnd() as f32, rnd() as f32, rnd() as f32);
            let b = Segment::from_coords(rnd() as f32, rnd() as f32, rnd() as f32, rnd() as f32);
            let got = a.intersection(&b, true, 2.0);
            let (x1, y1) = (a.p1.x as f64, a.p1.y as f64);
            let (x2, y2) = (a.p2.x as f64, a.p2.y as f64);
            let (x3, y3) = (b.p1.x as f64, b.p1.y as f64);
            let (x4, y4) = (b.p2.x as f64, b.p2.y as f64);
            let den = (x1 - x2) * (y3 - y4) - (y1 - y2) * (x3 - x4);
            if den.abs() < 1e-6 {
                continue;
            }
            let t = ((x1 - x3) * (y3 - y4) - (y1 - y3) * (x3 - x4)) / den;
            let (ex, ey) = (x1 + t * (x2 - x1), y1 + t * (y2 - y1));
            if let Some((x, y)) = got {
                assert_relative_eq!(x, ex, epsilon = 1e-3, max_relative = 1e-3);
                assert_relative_eq!(y, ey, epsilon = 1e-3, max_relative = 1e-3);
            }
        }
    }

    #[test]
    fn perp_distance_from_segment_interior_and_ends() {
        let seg = Segment::from_coords(0.0, 0.0, 10.0, 0.0);
        assert_relative_eq!(seg.perp_distance_to(5.0, 3.0), 3.0, epsilon = 1e-3);
        // Beyond the right endpoint the nearest endpoint wins.
        assert_relative_eq!(
            seg.perp_distance_to(14.0, 3.0),
            5.0,
            epsilon = 1e-3
        );
    }

    #[test]
    fn from_angle_recovers_angle_and_length() {
        let seg = Segment::from_angle(10.0, -4.0, 30.0, 8.0);
        assert_relative_eq!(seg.angle(), 30.0, epsilon = 1e-2);
        assert_relative_eq!(seg.length(), 8.0, epsilon = 1e-3);
        let mid = seg.midpoint();
        assert_relative_eq!(mid.x as f64, 10.0, epsilon = 1e-3);
        assert_relative_eq!(mid.y as f64, -4.0, epsilon = 1e-3);
    }
}
