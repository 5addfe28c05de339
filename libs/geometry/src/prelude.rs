//! A prelude exporting the most commonly used items.

pub use crate::point::{Point, PointF};
pub use crate::rect::Rect;
pub use crate::segment::Segment;
pub use crate::side::Side;
pub use crate::{
    atan2_deg, circle_centre_from_3_points, deg_to_rad, fix_angle, floor_cell, floor_div, midway,
    rad_to_deg, wrap_angle,
};
