//! Grid-to-vector conversion and Voronoi/Delaunay generation.

use blockgrid::{BlockGrid, GridMap};
use geometry::prelude::{floor_cell, Point, PointF, Rect, Segment};
use tracing::{debug, span, Level};
use voronoi::{Bounds, Builder, Diagram};

use crate::core::{between, MapCore};
use crate::error::{Error, Result};
use crate::model::{ObjectKind, VectorObject};

/// Flag planes used while fitting rectangles to cell runs.
const ABOVE: i64 = 0;
const BELOW: i64 = 1;
const RIGHT: i64 = 2;
const LEFT: i64 = 3;

impl MapCore {
    /// Converts the grid to vectors by fitting rectangles around runs of
    /// occupied cells.
    ///
    /// Cells at or above `threshold` count as occupied; occupied cells
    /// surrounded on all four sides by other occupied cells are skipped so
    /// only outlines are traced. Horizontal runs are fitted first, then
    /// vertical runs with the already-covered end cells trimmed off.
    pub fn convert_grid_to_line(&mut self, threshold: f32) -> Result<()> {
        if !self.has_map {
            return Err(Error::NoMapLoaded);
        }
        let _span = span!(Level::DEBUG, "convert_grid_to_line").entered();
        self.begin_bulk_job();

        let bounds = self.grid.bounds();
        let (west, east) = (bounds.left(), bounds.right());
        let (south, north) = (bounds.bot(), bounds.top());
        let t = threshold;

        // Boundary mask: occupied cells that touch at least one
        // non-occupied 4-neighbour.
        let mut mask = GridMap::new();
        for x in west + 1..east {
            for y in south + 1..north {
                if self.grid.read(x, y) >= t {
                    let interior = self.grid.read(x + 1, y) >= t
                        && self.grid.read(x - 1, y) >= t
                        && self.grid.read(x, y + 1) >= t
                        && self.grid.read(x, y - 1) >= t;
                    mask.put(if interior { 0.0 } else { 1.0 }, x, y);
                }
            }
        }

        // Mark, per boundary cell, which sides face free space.
        let mut flags: BlockGrid<bool> = BlockGrid::with_depth(100, 4, false);
        for x in west..=east {
            if self.bulk_cancelled() {
                return Ok(());
            }
            for y in south..=north {
                if mask.get(x, y) < t {
                    continue;
                }
                if mask.get(x - 1, y) < t {
                    flags.put_at(true, x, y, LEFT);
                }
                if mask.get(x + 1, y) < t {
                    flags.put_at(true, x, y, RIGHT);
                }
                if mask.get(x, y + 1) < t {
                    flags.put_at(true, x, y, ABOVE);
                }
                if mask.get(x, y - 1) < t {
                    flags.put_at(true, x, y, BELOW);
                }
            }
        }

        // This conversion cannot be undone.
        self.grid.delete_all_layer_info();
        self.model.reset_undo_info();

        let mut emit = |this: &mut Self, cells: Rect| {
            let p1 = (cells.left() as f32 + 0.01, cells.bot() as f32 + 0.01);
            let p2 = (cells.right() as f32 + 0.99, cells.top() as f32 + 0.99);
            let (x1, y1) = this.grid_to_mm(p1.0, p1.1);
            let (x2, y2) = this.grid_to_mm(p2.0, p2.1);
            let layer = this.model.next_layer();
            this.set_object(VectorObject::new(
                layer,
                1.0,
                ObjectKind::Rect,
                PointF::new(x1 as f32, y1 as f32),
                PointF::new(x2 as f32, y2 as f32),
            ));
        };

        // Horizontal runs.
        for y in south..=north {
            let mut run: Option<(i64, i64)> = None;
            for x in west..=east + 1 {
                let in_run = x <= east
                    && (flags.get_at(x, y, ABOVE) || flags.get_at(x, y, BELOW));
                if in_run {
                    run = Some(run.map_or((x, x), |(s, _)| (s, x)));
                } else if let Some((start, finish)) = run.take() {
                    // Single cells are emitted here only when isolated in
                    // the vertical direction too; otherwise the vertical
                    // pass covers them.
                    let lone = start == finish
                        && !(flags.get_at(start, y, BELOW) && flags.get_at(start, y, ABOVE));
                    if !lone {
                        emit(self, Rect::from_sides(start, y, finish, y));
                    }
                }
            }
        }

        // Vertical runs, with ends already covered horizontally trimmed.
        for x in west..=east {
            let mut run: Option<(i64, i64)> = None;
            for y in south..=north + 1 {
                let in_run = y <= north
                    && (flags.get_at(x, y, LEFT) || flags.get_at(x, y, RIGHT));
                if in_run {
                    run = Some(run.map_or((y, y), |(s, _)| (s, y)));
                } else if let Some((mut start, mut finish)) = run.take() {
                    if start == finish {
                        continue;
                    }
                    if flags.get_at(x, start, LEFT) != flags.get_at(x, start, RIGHT) {
                        start += 1;
                    }
                    if flags.get_at(x, finish, LEFT) != flags.get_at(x, finish, RIGHT) {
                        finish -= 1;
                    }
                    if start <= finish {
                        emit(self, Rect::from_sides(x, start, x, finish));
                    }
                }
            }
        }

        self.set_view_vector_map(true);
        self.set_view_grid_map(false);
        self.job_successful = true;
        Ok(())
    }

    /// Converts the grid to vectors through a Voronoi diagram of the free
    /// cells hugging occupied areas, then joins the fragmented output into
    /// long lines.
    ///
    /// With `filter_by_cell_value`, cells inside `[min_threshold,
    /// max_threshold]` are the obstacles; otherwise cells are picked by
    /// contrast against their neighbours and only `min_threshold` is used.
    /// `value` is the occupancy the produced vectors paint.
    pub fn convert_grid_to_line_with_voronoi(
        &mut self,
        min_threshold: f32,
        max_threshold: f32,
        filter_by_cell_value: bool,
        value: f32,
    ) -> Result<()> {
        if !self.has_map {
            return Err(Error::NoMapLoaded);
        }
        let _span = span!(Level::DEBUG, "convert_grid_to_line_with_voronoi").entered();
        self.begin_bulk_job();

        let (min_t, max_t) = (
            min_threshold.min(max_threshold),
            min_threshold.max(max_threshold),
        );
        let min_dist = if filter_by_cell_value { 2.0 } else { 3.0 };

        // Vectors inside the processed value range are superseded by the
        // fitted lines; drop them from the model (their pixels stay and
        // are vectorised).
        self.model.objects_mut().retain(|o| {
            o.kind == ObjectKind::Robot || !between(o.value as f64, min_t as f64, max_t as f64)
        });

        let bounds = self.grid.bounds();
        let (west, east) = (bounds.left(), bounds.right());
        let (south, north) = (bounds.bot(), bounds.top());

        // Obstacle mask.
        let mut mask = GridMap::new();
        let mut row = vec![0.0f32; bounds.width() as usize];
        if filter_by_cell_value {
            for y in south..=north {
                if self.bulk_cancelled() {
                    return Ok(());
                }
                self.grid.copy_row(&mut row, y, west, east);
                for x in west..=east {
                    let v = row[(x - west) as usize];
                    if !between(v as f64, min_t as f64, max_t as f64) {
                        continue;
                    }
                    let edge_cell = x == west || x == east || y == south || y == north;
                    let interior = !edge_cell
                        && neighbours8(x, y)
                            .into_iter()
                            .all(|(nx, ny)| {
                                between(self.grid.read(nx, ny) as f64, min_t as f64, max_t as f64)
                            });
                    mask.put(if interior { 0.0 } else { 1.0 }, x, y);
                }
            }
        } else {
            for y in south..=north {
                if self.bulk_cancelled() {
                    return Ok(());
                }
                self.grid.copy_row(&mut row, y, west, east);
                for x in west..=east {
                    let v = row[(x - west) as usize];
                    let contrast = neighbours8(x, y)
                        .into_iter()
                        .any(|(nx, ny)| (self.grid.read(nx, ny) - v).abs() >= min_t);
                    if contrast {
                        mask.put(1.0, x, y);
                    }
                }
            }
        }
        mask.set_bounds(bounds);

        // Sites: free cells bordering the mask (8-neighbourhood), offset
        // to cell centres.
        let mut sites = Vec::new();
        for y in south..=north {
            if self.bulk_cancelled() {
                return Ok(());
            }
            for x in (west..=east).rev() {
                if mask.get(x, y) == 1.0 {
                    continue;
                }
                let touches = neighbours8(x, y)
                    .into_iter()
                    .any(|(nx, ny)| mask.get(nx, ny) == 1.0);
                if touches {
                    sites.push(PointF::new(x as f32 + 0.5, y as f32 + 0.5));
                }
            }
        }
        debug!(sites = sites.len(), "voronoi vectorisation sites");

        let diagram = Builder::new().min_distance(min_dist).generate(
            &sites,
            Bounds::new(west as f64, east as f64, south as f64, north as f64),
        );

        // Keep only edges lying on obstacle cells; split into points,
        // axis-aligned joinables, and pass-through skew lines.
        let mut horizontal: Vec<JoinEdge> = Vec::new();
        let mut vertical: Vec<JoinEdge> = Vec::new();
        let mut points: Vec<PointF> = Vec::new();
        let mut finished: Vec<(PointF, PointF)> = Vec::new();

        for line in &diagram.lines {
            let c1 = Point::new(floor_cell(line.p1.x), floor_cell(line.p1.y));
            let c2 = Point::new(floor_cell(line.p2.x), floor_cell(line.p2.y));
            if mask.get(c1.x, c1.y) == 0.0 || mask.get(c2.x, c2.y) == 0.0 {
                continue;
            }
            let e = JoinEdge {
                p1: line.p1,
                p2: line.p2,
                alive: true,
            };
            if line.p1 == line.p2 {
                points.push(line.p1);
            } else if line.p1.y == line.p2.y {
                horizontal.push(e);
            } else if line.p1.x == line.p2.x {
                vertical.push(e);
            } else {
                finished.push((line.p1, line.p2));
            }
        }

        // Join touching collinear runs.
        join_axis_runs(&mut horizontal, true);
        join_axis_runs(&mut vertical, false);

        // Join diagonally adjacent isolated points into short lines;
        // leftovers become single points.
        let mut point_used = vec![false; points.len()];
        let cell_of = |p: &PointF| (floor_cell(p.x), floor_cell(p.y));
        for i in 0..points.len() {
            for j in i + 1..points.len() {
                let (ci, cj) = (cell_of(&points[i]), cell_of(&points[j]));
                if (ci.0 - cj.0).abs() == 1 && (ci.1 - cj.1).abs() == 1 {
                    finished.push((points[i], points[j]));
                    point_used[i] = true;
                    point_used[j] = true;
                }
            }
        }

        // This conversion cannot be undone.
        self.grid.delete_all_layer_info();
        self.model.reset_undo_info();
        self.set_view_grid_map(false);
        self.set_view_vector_map(true);

        for e in horizontal.into_iter().chain(vertical) {
            if e.alive {
                finished.push((e.p1, e.p2));
            }
        }

        for (p1, p2) in finished {
            // The join pass leaves some nearly-zero-length fragments;
            // dropping them loses nothing.
            if p1.dist(p2) < 0.001 {
                continue;
            }
            let layer = self.next_object_layer();
            let (x1, y1) = self.grid_to_mm(p1.x, p1.y);
            let (x2, y2) = self.grid_to_mm(p2.x, p2.y);
            self.set_object(VectorObject::new(
                layer,
                value,
                ObjectKind::Line,
                PointF::new(x1 as f32, y1 as f32),
                PointF::new(x2 as f32, y2 as f32),
            ));
        }
        for (i, p) in points.iter().enumerate() {
            if point_used[i] {
                continue;
            }
            // Isolated points become one-cell rectangles, but only when
            // they sit off the cell grid (on-lattice points are joining
            // artifacts).
            if p.x.fract() == 0.0 || p.y.fract() == 0.0 {
                continue;
            }
            let layer = self.next_object_layer();
            let (x1, y1) = self.grid_to_mm(p.x - 0.499, p.y - 0.499);
            let (x2, y2) = self.grid_to_mm(p.x + 0.499, p.y + 0.499);
            self.set_object(VectorObject::new(
                layer,
                value,
                ObjectKind::Rect,
                PointF::new(x1 as f32, y1 as f32),
                PointF::new(x2 as f32, y2 as f32),
            ));
        }

        self.job_successful = true;
        Ok(())
    }

    /// Generates the Voronoi diagram of the free space between occupied
    /// cells.
    ///
    /// Cells valued inside `[threshold1, threshold2]` (unknown cells
    /// included) are obstacles; only obstacle cells bordering other-valued
    /// cells are used as sites. `min_distance` suppresses edges between
    /// sites closer than that many cells — below about `1.5` edges appear
    /// between directly adjacent obstacle cells and the diagram degrades.
    pub fn generate_voronoi(
        &mut self,
        threshold1: f32,
        threshold2: f32,
        min_distance: f32,
    ) -> Result<()> {
        let diagram = self.site_diagram(threshold1, threshold2, min_distance, true, false)?;
        if self.bulk_cancelled() {
            return Ok(());
        }
        let (t1, t2) = (
            threshold1.min(threshold2) as f64,
            threshold1.max(threshold2) as f64,
        );

        self.clear_voronoi();
        for line in &diagram.lines {
            if self.edge_touches_obstacle(line.p1, line.p2, t1, t2) {
                continue;
            }
            let (x1, y1) = self.grid_to_mm(line.p1.x, line.p1.y);
            let (x2, y2) = self.grid_to_mm(line.p2.x, line.p2.y);
            self.voronoi_lines.push(Segment::from_coords(
                x1 as f32, y1 as f32, x2 as f32, y2 as f32,
            ));
        }
        for (p1, p2) in &diagram.vertex_pairs {
            if self.edge_touches_obstacle(*p1, *p2, t1, t2) {
                continue;
            }
            self.voronoi_edges
                .push(Segment::from_coords(p1.x, p1.y, p2.x, p2.y));
        }
        for vertex in &diagram.vertices {
            let c = Point::new(floor_cell(vertex.position.x), floor_cell(vertex.position.y));
            if !between(self.grid.read(c.x, c.y) as f64, t1, t2) {
                self.voronoi_vertices.push(vertex.position);
            }
        }
        self.job_successful = true;
        Ok(())
    }

    /// Generates the Delaunay triangulation of the obstacle boundary
    /// cells; edges are stored in millimetres.
    pub fn generate_delaunay(
        &mut self,
        threshold1: f32,
        threshold2: f32,
        min_distance: f32,
    ) -> Result<()> {
        let diagram = self.site_diagram(threshold1, threshold2, min_distance, false, true)?;
        if self.bulk_cancelled() {
            return Ok(());
        }

        self.delaunay_lines.clear();
        for edge in &diagram.delaunay {
            let (x1, y1) = self.grid_to_mm(edge.site1.x, edge.site1.y);
            let (x2, y2) = self.grid_to_mm(edge.site2.x, edge.site2.y);
            self.delaunay_lines.push(Segment::from_coords(
                x1 as f32, y1 as f32, x2 as f32, y2 as f32,
            ));
        }
        self.job_successful = true;
        Ok(())
    }

    /// Collects boundary obstacle cells as sites and runs the diagram
    /// generator over them.
    fn site_diagram(
        &mut self,
        threshold1: f32,
        threshold2: f32,
        min_distance: f32,
        make_voronoi: bool,
        make_delaunay: bool,
    ) -> Result<Diagram> {
        if !self.has_map {
            return Err(Error::NoMapLoaded);
        }
        self.begin_bulk_job();
        if !self.view_grid {
            self.push_all_vectors_onto_grid();
        }

        let (t1, t2) = (
            threshold1.min(threshold2) as f64,
            threshold1.max(threshold2) as f64,
        );
        let bounds = self.grid.bounds();
        let mut sites = Vec::new();
        for x in bounds.left()..=bounds.right() {
            if self.bulk_cancelled() {
                return Ok(Diagram::default());
            }
            for y in bounds.bot()..=bounds.top() {
                let mut v = self.grid.read(x, y) as f64;
                if v < 0.0 {
                    // Unknown cells count as obstacles.
                    v = t1;
                }
                if !between(v, t1, t2) {
                    continue;
                }
                let boundary = neighbours8(x, y)
                    .into_iter()
                    .any(|(nx, ny)| !between(self.grid.read(nx, ny) as f64, t1, t2));
                if boundary {
                    sites.push(PointF::new(x as f32 + 0.5, y as f32 + 0.5));
                }
            }
        }
        debug!(sites = sites.len(), "voronoi generation sites");

        Ok(Builder::new()
            .generate_voronoi(make_voronoi)
            .generate_delaunay(make_delaunay)
            .min_distance(min_distance as f64)
            .generate(
                &sites,
                Bounds::new(
                    bounds.left() as f64,
                    bounds.right() as f64,
                    bounds.bot() as f64,
                    bounds.top() as f64,
                ),
            ))
    }

    /// Whether either endpoint of an edge lands on an obstacle cell.
    fn edge_touches_obstacle(&self, p1: PointF, p2: PointF, t1: f64, t2: f64) -> bool {
        let c1 = Point::new(floor_cell(p1.x), floor_cell(p1.y));
        let c2 = Point::new(floor_cell(p2.x), floor_cell(p2.y));
        between(self.grid.read(c1.x, c1.y) as f64, t1, t2)
            || between(self.grid.read(c2.x, c2.y) as f64, t1, t2)
    }
}

fn neighbours8(x: i64, y: i64) -> [(i64, i64); 8] {
    [
        (x + 1, y),
        (x - 1, y),
        (x + 1, y + 1),
        (x + 1, y - 1),
        (x, y + 1),
        (x, y - 1),
        (x - 1, y + 1),
        (x - 1, y - 1),
    ]
}

/// Merges touching collinear axis-aligned edges in place; consumed edges
/// are marked dead.
fn join_axis_runs(edges: &mut [JoinEdge], horizontal: bool) {
    // Sort by the fixed coordinate, then by the start of the varying one.
    let key = |e: &JoinEdge| {
        if horizontal {
            (e.p1.y, e.p1.x.min(e.p2.x))
        } else {
            (e.p1.x, e.p1.y.min(e.p2.y))
        }
    };
    let mut order: Vec<usize> = (0..edges.len()).collect();
    order.sort_by(|&a, &b| {
        key(&edges[a])
            .partial_cmp(&key(&edges[b]))
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut prev: Option<usize> = None;
    for &i in &order {
        let Some(p) = prev else {
            prev = Some(i);
            continue;
        };
        let (fixed_p, fixed_i) = if horizontal {
            (edges[p].p1.y, edges[i].p1.y)
        } else {
            (edges[p].p1.x, edges[i].p1.x)
        };
        let (end_p, start_i) = if horizontal {
            (
                edges[p].p1.x.max(edges[p].p2.x),
                edges[i].p1.x.min(edges[i].p2.x),
            )
        } else {
            (
                edges[p].p1.y.max(edges[p].p2.y),
                edges[i].p1.y.min(edges[i].p2.y),
            )
        };
        if fixed_p == fixed_i && (start_i - end_p).abs() < 0.01 {
            // Extend the previous run over this edge.
            let (start_p, end_i) = if horizontal {
                (
                    edges[p].p1.x.min(edges[p].p2.x),
                    edges[i].p1.x.max(edges[i].p2.x),
                )
            } else {
                (
                    edges[p].p1.y.min(edges[p].p2.y),
                    edges[i].p1.y.max(edges[i].p2.y),
                )
            };
            if horizontal {
                edges[p].p1 = PointF::new(start_p, fixed_p);
                edges[p].p2 = PointF::new(end_i, fixed_p);
            } else {
                edges[p].p1 = PointF::new(fixed_p, start_p);
                edges[p].p2 = PointF::new(fixed_p, end_i);
            }
            edges[i].alive = false;
        } else {
            prev = Some(i);
        }
    }
}

/// A joinable axis-aligned edge.
#[derive(Clone, Copy)]
pub(crate) struct JoinEdge {
    pub(crate) p1: PointF,
    pub(crate) p2: PointF,
    pub(crate) alive: bool,
}
