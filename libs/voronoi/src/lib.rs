//! Voronoi and Delaunay diagram generation for map vectorisation.
//!
//! Sites go in; three streams come out:
//!
//! - *Voronoi lines*: diagram edges clipped to a bounding rectangle,
//! - *Voronoi vertices* (with the three sites that generate each vertex)
//!   and the *vertex pairs* joining them,
//! - *Delaunay edges*: pairs of neighbouring sites.
//!
//! The diagram is built as an incremental Delaunay triangulation whose
//! dual gives the Voronoi structure; every Voronoi vertex is a triangle
//! circumcentre and is therefore exactly equidistant from its three
//! generating sites. Cocircular site sets (grid corners) resolve
//! deterministically, and collinear input degenerates to a chain of
//! Delaunay edges with no Voronoi output. Results are fully determined by
//! the input: no randomisation is used anywhere.
//!
//! # Examples
//!
//! ```
//! use geometry::prelude::PointF;
//! use voronoi::{Bounds, Builder};
//!
//! let sites = [
//!     PointF::new(0.0, 0.0),
//!     PointF::new(4.0, 0.0),
//!     PointF::new(2.0, 3.0),
//! ];
//! let diagram = Builder::new()
//!     .generate_delaunay(true)
//!     .generate(&sites, Bounds::new(-10.0, 10.0, -10.0, 10.0));
//! assert_eq!(diagram.delaunay.len(), 3);
//! assert_eq!(diagram.vertices.len(), 1);
//! ```
#![warn(missing_docs)]

mod triangulate;

use std::collections::BTreeMap;

use geometry::prelude::PointF;
use serde::{Deserialize, Serialize};
use tracing::debug;

use triangulate::{circumcentre, orient, triangulate};

/// The clip rectangle for Voronoi edges.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    /// Least x.
    pub min_x: f64,
    /// Greatest x.
    pub max_x: f64,
    /// Least y.
    pub min_y: f64,
    /// Greatest y.
    pub max_y: f64,
}

impl Bounds {
    /// Creates a clip rectangle; coordinates are sorted if reversed.
    pub fn new(min_x: f64, max_x: f64, min_y: f64, max_y: f64) -> Self {
        Self {
            min_x: min_x.min(max_x),
            max_x: min_x.max(max_x),
            min_y: min_y.min(max_y),
            max_y: min_y.max(max_y),
        }
    }

    fn contains(&self, p: (f64, f64)) -> bool {
        p.0 >= self.min_x && p.0 <= self.max_x && p.1 >= self.min_y && p.1 <= self.max_y
    }
}

/// One Voronoi edge clipped to the bounding rectangle.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoronoiLine {
    /// First endpoint.
    pub p1: PointF,
    /// Second endpoint.
    pub p2: PointF,
    /// One generating site.
    pub site1: PointF,
    /// The other generating site.
    pub site2: PointF,
}

/// A Voronoi vertex and the three sites it is equidistant from.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoronoiVertex {
    /// The vertex position.
    pub position: PointF,
    /// The generating sites.
    pub sites: [PointF; 3],
}

/// A Delaunay edge: a pair of neighbouring sites.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct DelaunayEdge {
    /// One site.
    pub site1: PointF,
    /// The other site.
    pub site2: PointF,
}

/// The generated diagram. All vectors iterate in a deterministic order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Diagram {
    /// Voronoi edges clipped to the bounding rectangle.
    pub lines: Vec<VoronoiLine>,
    /// Voronoi edges whose both ends are diagram vertices (unclipped).
    pub vertex_pairs: Vec<(PointF, PointF)>,
    /// Voronoi vertices.
    pub vertices: Vec<VoronoiVertex>,
    /// Delaunay edges.
    pub delaunay: Vec<DelaunayEdge>,
}

/// Configures and runs diagram generation.
#[derive(Debug, Clone)]
pub struct Builder {
    voronoi: bool,
    delaunay: bool,
    min_distance: f64,
}

impl Default for Builder {
    fn default() -> Self {
        Self::new()
    }
}

impl Builder {
    /// A builder producing Voronoi output only.
    pub fn new() -> Self {
        Self {
            voronoi: true,
            delaunay: false,
            min_distance: 0.0,
        }
    }

    /// Whether to populate the Voronoi streams.
    pub fn generate_voronoi(mut self, enabled: bool) -> Self {
        self.voronoi = enabled;
        self
    }

    /// Whether to populate the Delaunay edge stream.
    pub fn generate_delaunay(mut self, enabled: bool) -> Self {
        self.delaunay = enabled;
        self
    }

    /// The minimum distance two generating sites must be apart for an edge
    /// between them to be emitted.
    ///
    /// This suppresses the noise edges between directly adjacent occupied
    /// cells when vectorising a grid; values below 1.5 cells place edges
    /// between touching cells and are rarely useful.
    pub fn min_distance(mut self, min_distance: f64) -> Self {
        self.min_distance = min_distance;
        self
    }

    /// Generates the diagram for the given sites.
    ///
    /// Exactly coincident sites are deduplicated. Collinear input (two
    /// sites included) yields no Voronoi output and a chain of Delaunay
    /// edges joining consecutive sites.
    pub fn generate(&self, sites: &[PointF], bounds: Bounds) -> Diagram {
        let mut points: Vec<(f64, f64)> = sites
            .iter()
            .map(|p| (p.x as f64, p.y as f64))
            .collect();
        points.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap().then(a.0.partial_cmp(&b.0).unwrap()));
        points.dedup();

        debug!(sites = points.len(), "generating diagram");

        let mut diagram = Diagram::default();
        if points.len() < 2 {
            return diagram;
        }

        if let Some(chain) = collinear_chain(&points) {
            if self.delaunay {
                for pair in chain.windows(2) {
                    diagram.delaunay.push(DelaunayEdge {
                        site1: to_f32(pair[0]),
                        site2: to_f32(pair[1]),
                    });
                }
            }
            return diagram;
        }

        let tri = triangulate(&points);
        let nsites = tri.nsites;

        // Circumcentres of the fully-real triangles are the diagram
        // vertices.
        let mut centres: BTreeMap<usize, (f64, f64)> = BTreeMap::new();
        for (i, t) in tri.triangles.iter().enumerate() {
            if !t.alive || t.v.iter().any(|&v| v >= nsites) {
                continue;
            }
            let c = circumcentre(
                tri.points[t.v[0]],
                tri.points[t.v[1]],
                tri.points[t.v[2]],
            );
            if !c.0.is_finite() || !c.1.is_finite() {
                continue;
            }
            centres.insert(i, c);
            if self.voronoi {
                diagram.vertices.push(VoronoiVertex {
                    position: to_f32(c),
                    sites: [
                        to_f32(tri.points[t.v[0]]),
                        to_f32(tri.points[t.v[1]]),
                        to_f32(tri.points[t.v[2]]),
                    ],
                });
            }
        }

        // Every site-to-site edge of the triangulation, with the triangles
        // on either side of it.
        let mut edge_tris: BTreeMap<(usize, usize), Vec<usize>> = BTreeMap::new();
        for (i, t) in tri.triangles.iter().enumerate() {
            if !t.alive {
                continue;
            }
            let v = t.v;
            for (a, b) in [(v[0], v[1]), (v[1], v[2]), (v[2], v[0])] {
                if a < nsites && b < nsites {
                    edge_tris.entry((a.min(b), a.max(b))).or_default().push(i);
                }
            }
        }

        for ((a, b), tris) in &edge_tris {
            let pa = tri.points[*a];
            let pb = tri.points[*b];
            if self.delaunay {
                diagram.delaunay.push(DelaunayEdge {
                    site1: to_f32(pa),
                    site2: to_f32(pb),
                });
            }
            if !self.voronoi {
                continue;
            }
            let site_dist = ((pa.0 - pb.0).powi(2) + (pa.1 - pb.1).powi(2)).sqrt();
            if site_dist < self.min_distance {
                continue;
            }

            let real: Vec<usize> = tris.iter().copied().filter(|i| centres.contains_key(i)).collect();
            match real.len() {
                2 => {
                    let c1 = centres[&real[0]];
                    let c2 = centres[&real[1]];
                    diagram.vertex_pairs.push((to_f32(c1), to_f32(c2)));
                    if let Some((p1, p2)) = clip_segment(c1, c2, bounds) {
                        diagram.lines.push(VoronoiLine {
                            p1,
                            p2,
                            site1: to_f32(pa),
                            site2: to_f32(pb),
                        });
                    }
                }
                1 => {
                    // Hull edge: an unbounded ray from the circumcentre
                    // along the edge's perpendicular bisector, away from
                    // the triangle's third vertex.
                    let t = &tri.triangles[real[0]];
                    let third = t.v.into_iter().find(|v| *v != *a && *v != *b).unwrap();
                    let pc = tri.points[third];
                    let mid = ((pa.0 + pb.0) / 2.0, (pa.1 + pb.1) / 2.0);
                    let mut dir = (-(pb.1 - pa.1), pb.0 - pa.0);
                    if dir.0 * (mid.0 - pc.0) + dir.1 * (mid.1 - pc.1) < 0.0 {
                        dir = (-dir.0, -dir.1);
                    }
                    let c = centres[&real[0]];
                    if let Some((p1, p2)) = clip_ray(c, dir, bounds) {
                        diagram.lines.push(VoronoiLine {
                            p1,
                            p2,
                            site1: to_f32(pa),
                            site2: to_f32(pb),
                        });
                    }
                }
                _ => {}
            }
        }

        diagram
    }
}

fn to_f32(p: (f64, f64)) -> PointF {
    PointF::new(p.0 as f32, p.1 as f32)
}

/// When all points are collinear, returns them ordered along the line.
fn collinear_chain(points: &[(f64, f64)]) -> Option<Vec<(f64, f64)>> {
    if points.len() == 2 {
        return Some(points.to_vec());
    }
    let a = points[0];
    let b = points[points.len() - 1];
    if points
        .iter()
        .any(|&p| orient(a, b, p).abs() > 1e-9)
    {
        return None;
    }
    let mut chain = points.to_vec();
    if (b.0 - a.0).abs() >= (b.1 - a.1).abs() {
        chain.sort_by(|p, q| p.0.partial_cmp(&q.0).unwrap().then(p.1.partial_cmp(&q.1).unwrap()));
    } else {
        chain.sort_by(|p, q| p.1.partial_cmp(&q.1).unwrap().then(p.0.partial_cmp(&q.0).unwrap()));
    }
    Some(chain)
}

/// Clips the parametric line `p + t·d` for `t` in `[t0, t1]` to `bounds`.
fn clip_param(
    p: (f64, f64),
    d: (f64, f64),
    mut t0: f64,
    mut t1: f64,
    bounds: Bounds,
) -> Option<(f64, f64)> {
    for (pc, dc, lo, hi) in [
        (p.0, d.0, bounds.min_x, bounds.max_x),
        (p.1, d.1, bounds.min_y, bounds.max_y),
    ] {
        if dc == 0.0 {
            if pc < lo || pc > hi {
                return None;
            }
        } else {
            let (ta, tb) = ((lo - pc) / dc, (hi - pc) / dc);
            let (ta, tb) = if ta <= tb { (ta, tb) } else { (tb, ta) };
            t0 = t0.max(ta);
            t1 = t1.min(tb);
            if t0 > t1 {
                return None;
            }
        }
    }
    Some((t0, t1))
}

fn clip_segment(a: (f64, f64), b: (f64, f64), bounds: Bounds) -> Option<(PointF, PointF)> {
    let d = (b.0 - a.0, b.1 - a.1);
    if d.0 == 0.0 && d.1 == 0.0 {
        return bounds.contains(a).then(|| (to_f32(a), to_f32(a)));
    }
    let (t0, t1) = clip_param(a, d, 0.0, 1.0, bounds)?;
    Some((
        to_f32((a.0 + t0 * d.0, a.1 + t0 * d.1)),
        to_f32((a.0 + t1 * d.0, a.1 + t1 * d.1)),
    ))
}

fn clip_ray(origin: (f64, f64), dir: (f64, f64), bounds: Bounds) -> Option<(PointF, PointF)> {
    let len = (dir.0 * dir.0 + dir.1 * dir.1).sqrt();
    if len == 0.0 {
        return None;
    }
    let d = (dir.0 / len, dir.1 / len);
    // Far enough to cross the whole clip rectangle from anywhere relevant.
    let dx = (origin.0 - bounds.min_x).abs().max((origin.0 - bounds.max_x).abs());
    let dy = (origin.1 - bounds.min_y).abs().max((origin.1 - bounds.max_y).abs());
    let reach = dx + dy + (bounds.max_x - bounds.min_x) + (bounds.max_y - bounds.min_y) + 1.0;
    let (t0, t1) = clip_param(origin, d, 0.0, reach, bounds)?;
    Some((
        to_f32((origin.0 + t0 * d.0, origin.1 + t0 * d.1)),
        to_f32((origin.0 + t1 * d.0, origin.1 + t1 * d.1)),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn pf(x: f32, y: f32) -> PointF {
        PointF::new(x, y)
    }

    fn has_edge(edges: &[DelaunayEdge], a: PointF, b: PointF) -> bool {
        edges
            .iter()
            .any(|e| (e.site1 == a && e.site2 == b) || (e.site1 == b && e.site2 == a))
    }

    #[test]
    fn square_yields_four_sides_and_one_diagonal() {
        let sites = [pf(0., 0.), pf(4., 0.), pf(0., 4.), pf(4., 4.)];
        let d = Builder::new()
            .generate_delaunay(true)
            .generate(&sites, Bounds::new(-1.0, 5.0, -1.0, 5.0));

        assert_eq!(d.delaunay.len(), 5);
        assert!(has_edge(&d.delaunay, sites[0], sites[1]));
        assert!(has_edge(&d.delaunay, sites[0], sites[2]));
        assert!(has_edge(&d.delaunay, sites[1], sites[3]));
        assert!(has_edge(&d.delaunay, sites[2], sites[3]));
        let diag1 = has_edge(&d.delaunay, sites[0], sites[3]);
        let diag2 = has_edge(&d.delaunay, sites[1], sites[2]);
        assert!(diag1 ^ diag2, "exactly one diagonal expected");

        // All Voronoi vertices collapse onto the square centre.
        for v in &d.vertices {
            assert_relative_eq!(v.position.x, 2.0, epsilon = 1e-3);
            assert_relative_eq!(v.position.y, 2.0, epsilon = 1e-3);
        }
    }

    #[test]
    fn vertices_are_equidistant_from_their_sites() {
        // A deterministic scatter of sites.
        let mut sites = Vec::new();
        let mut state = 0x9e3779b97f4a7c15u64;
        for _ in 0..40 {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            let x = (state >> 40) as f32 % 97.0;
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            let y = (state >> 40) as f32 % 89.0;
            sites.push(pf(x, y));
        }
        let d = Builder::new().generate(&sites, Bounds::new(-10.0, 110.0, -10.0, 110.0));
        assert!(!d.vertices.is_empty());
        for v in &d.vertices {
            let d0 = v.position.dist(v.sites[0]);
            let d1 = v.position.dist(v.sites[1]);
            let d2 = v.position.dist(v.sites[2]);
            assert_relative_eq!(d0, d1, epsilon = 1e-3, max_relative = 1e-3);
            assert_relative_eq!(d0, d2, epsilon = 1e-3, max_relative = 1e-3);
        }
    }

    #[test]
    fn collinear_sites_give_a_delaunay_chain_and_no_voronoi() {
        let sites = [pf(3., 0.), pf(0., 0.), pf(1., 0.), pf(2., 0.)];
        let d = Builder::new()
            .generate_delaunay(true)
            .generate(&sites, Bounds::new(-5.0, 5.0, -5.0, 5.0));
        assert!(d.lines.is_empty());
        assert!(d.vertices.is_empty());
        assert_eq!(d.delaunay.len(), 3);
        assert!(has_edge(&d.delaunay, pf(0., 0.), pf(1., 0.)));
        assert!(has_edge(&d.delaunay, pf(1., 0.), pf(2., 0.)));
        assert!(has_edge(&d.delaunay, pf(2., 0.), pf(3., 0.)));
    }

    #[test]
    fn min_distance_suppresses_edges_between_close_sites() {
        let sites = [pf(0., 0.), pf(1., 0.), pf(0.5, 10.)];
        let all = Builder::new().generate(&sites, Bounds::new(-20.0, 20.0, -20.0, 20.0));
        let filtered = Builder::new()
            .min_distance(1.5)
            .generate(&sites, Bounds::new(-20.0, 20.0, -20.0, 20.0));
        assert!(filtered.lines.len() < all.lines.len());
    }

    #[test]
    fn two_voronoi_regions_split_by_the_bisector() {
        let sites = [pf(0., 0.), pf(4., 2.)];
        let d = Builder::new()
            .generate_delaunay(true)
            .generate(&sites, Bounds::new(-5.0, 5.0, -5.0, 5.0));
        // Two sites are collinear by definition: a single Delaunay edge.
        assert_eq!(d.delaunay.len(), 1);
        assert!(d.lines.is_empty());
    }

    #[test]
    fn clipping_confines_lines_to_bounds() {
        let sites = [pf(0., 0.), pf(4., 0.), pf(2., 3.), pf(2., -3.)];
        let bounds = Bounds::new(-1.0, 5.0, -4.0, 4.0);
        let d = Builder::new().generate(&sites, bounds);
        assert!(!d.lines.is_empty());
        for line in &d.lines {
            for p in [line.p1, line.p2] {
                assert!(p.x as f64 >= bounds.min_x - 1e-3 && p.x as f64 <= bounds.max_x + 1e-3);
                assert!(p.y as f64 >= bounds.min_y - 1e-3 && p.y as f64 <= bounds.max_y + 1e-3);
            }
        }
    }
}
