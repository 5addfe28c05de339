//! The map façade: grid and vector model coupled together.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use blockgrid::GridMap;
use geometry::prelude::{Point, PointF, Rect, Segment};
use tracing::{debug, span, Level};

use crate::error::{Error, Result};
use crate::layers::LayeredGrid;
use crate::model::{Action, ObjectKind, VectorModel, VectorObject};
use crate::{DEFAULT_RESOLUTION, ROBOT_RADIUS};

/// Returns whether `v` lies between `a` and `b` inclusive, in either order.
pub(crate) fn between(v: f64, a: f64, b: f64) -> bool {
    v >= a.min(b) && v <= a.max(b)
}

/// The primary type of the library: owns the layered occupancy grid and
/// the vector model, routes every mutation through both, and carries the
/// derived artefacts (Voronoi and Delaunay graphs, paths).
///
/// All public setters take world coordinates in millimetres unless noted;
/// pixel accessors ([`set_point`](Self::set_point),
/// [`get_point_val`](Self::get_point_val)) take grid cells.
#[derive(Debug, Clone)]
pub struct MapCore {
    pub(crate) grid: LayeredGrid,
    pub(crate) model: VectorModel,
    pub(crate) resolution: i64,
    pub(crate) has_map: bool,
    pub(crate) view_grid: bool,
    pub(crate) view_vector: bool,
    /// The nominal map rectangle in grid cells.
    pub(crate) map_cell_bounds: Rect,
    /// The bounding box of all vector endpoints, millimetres.
    pub(crate) vector_boundary: Rect,
    pub(crate) map_average_count: i64,
    pub(crate) error: Option<(String, String)>,

    /// Voronoi edges in millimetres.
    pub(crate) voronoi_lines: Vec<Segment>,
    /// Vertex-to-vertex connections, grid units.
    pub(crate) voronoi_edges: Vec<Segment>,
    /// Voronoi vertices, grid units.
    pub(crate) voronoi_vertices: Vec<PointF>,
    /// Delaunay edges in millimetres.
    pub(crate) delaunay_lines: Vec<Segment>,
    /// Path lines in millimetres.
    pub(crate) path_lines: Vec<(Point, Point)>,
    /// Path goal points in millimetres.
    pub(crate) path_goals: Vec<Point>,

    cancel: Arc<AtomicBool>,
    pub(crate) job_successful: bool,
}

impl Default for MapCore {
    fn default() -> Self {
        Self::new()
    }
}

impl MapCore {
    /// An empty map core at the default resolution.
    pub fn new() -> Self {
        Self {
            grid: LayeredGrid::new(),
            model: VectorModel::new(),
            resolution: DEFAULT_RESOLUTION,
            has_map: false,
            view_grid: true,
            view_vector: false,
            map_cell_bounds: Rect::from_point(Point::zero()),
            vector_boundary: Rect::from_point(Point::zero()),
            map_average_count: 1,
            error: None,
            voronoi_lines: Vec::new(),
            voronoi_edges: Vec::new(),
            voronoi_vertices: Vec::new(),
            delaunay_lines: Vec::new(),
            path_lines: Vec::new(),
            path_goals: Vec::new(),
            cancel: Arc::new(AtomicBool::new(false)),
            job_successful: true,
        }
    }

    // ----- lifecycle -------------------------------------------------

    /// Creates a fresh empty map covering the given rectangle
    /// (millimetres).
    pub fn new_map(&mut self, min_x: i64, max_x: i64, min_y: i64, max_y: i64) -> bool {
        self.reset_all_objects();

        let cells = Rect::new(
            Point::new(min_x / self.resolution, min_y / self.resolution),
            Point::new(max_x / self.resolution, max_y / self.resolution),
        );
        let mut base = GridMap::new();
        base.set_bounds(cells);
        self.grid.init_from_map(base);

        self.map_cell_bounds = cells;
        self.vector_boundary = Rect::new(Point::new(min_x, min_y), Point::new(max_x, max_y));
        self.map_average_count = 1;
        self.has_map = true;
        true
    }

    /// Installs `map` as the grid contents, replacing everything.
    pub fn add_map(&mut self, map: GridMap) {
        self.reset_all_objects();

        let bounds = map.bounds();
        self.grid.init_from_map(map);
        self.map_cell_bounds = bounds;
        self.vector_boundary = Rect::new(
            Point::new(bounds.left() * self.resolution, bounds.bot() * self.resolution),
            Point::new(bounds.right() * self.resolution, bounds.top() * self.resolution),
        );
        self.map_average_count = 1;
        self.has_map = true;
    }

    /// Empties every structure: grid, vectors, graphs, paths, undo.
    pub fn reset_all_objects(&mut self) {
        self.model.reset();
        self.grid.reset();
        self.voronoi_lines.clear();
        self.voronoi_edges.clear();
        self.voronoi_vertices.clear();
        self.delaunay_lines.clear();
        self.path_lines.clear();
        self.path_goals.clear();
        self.map_average_count = 1;
        self.has_map = false;
    }

    // ----- predicates and simple accessors ---------------------------

    /// Whether a map has been created or loaded.
    pub fn has_map(&self) -> bool {
        self.has_map
    }

    /// Whether a Voronoi diagram is present.
    pub fn has_voronoi(&self) -> bool {
        !self.voronoi_lines.is_empty()
    }

    /// Whether a Delaunay triangulation is present.
    pub fn has_delaunay(&self) -> bool {
        !self.delaunay_lines.is_empty()
    }

    /// Whether a path is present.
    pub fn has_path(&self) -> bool {
        !self.path_lines.is_empty()
    }

    /// Whether any vector objects exist.
    pub fn has_vectors(&self) -> bool {
        !self.model.is_empty()
    }

    /// Whether any robot objects exist.
    pub fn has_robot(&self) -> bool {
        self.model
            .objects()
            .iter()
            .any(|o| o.kind == ObjectKind::Robot)
    }

    /// The resolution in millimetres per grid cell.
    pub fn resolution(&self) -> i64 {
        self.resolution
    }

    /// The map extent in millimetres, or `None` without a map.
    pub fn dimensions(&self) -> Option<Rect> {
        self.has_map.then(|| {
            let b = self.grid.bounds();
            Rect::new(
                Point::new(b.left() * self.resolution, b.bot() * self.resolution),
                Point::new(b.right() * self.resolution, b.top() * self.resolution),
            )
        })
    }

    /// The map extent in grid cells, or `None` without a map.
    pub fn grid_dimensions(&self) -> Option<Rect> {
        self.has_map.then(|| self.grid.bounds())
    }

    /// The layered grid (read-only).
    pub fn layers(&self) -> &LayeredGrid {
        &self.grid
    }

    /// The vector model (read-only).
    pub fn vector_model(&self) -> &VectorModel {
        &self.model
    }

    // ----- coordinate conversion -------------------------------------

    /// Converts grid coordinates to millimetres.
    pub fn grid_to_mm(&self, gx: f32, gy: f32) -> (i64, i64) {
        (
            (gx * self.resolution as f32) as i64,
            (gy * self.resolution as f32) as i64,
        )
    }

    /// Converts millimetres to (fractional) grid coordinates.
    pub fn mm_to_grid(&self, x: i64, y: i64) -> (f32, f32) {
        (
            x as f32 / self.resolution as f32,
            y as f32 / self.resolution as f32,
        )
    }

    // ----- view switches ---------------------------------------------

    /// Whether vector objects are projected into the grid as they are
    /// added.
    pub fn view_grid_map(&self) -> bool {
        self.view_grid
    }

    /// Whether the vector layer is considered visible.
    pub fn view_vector_map(&self) -> bool {
        self.view_vector
    }

    /// Turns grid projection on or off. Turning it on projects every
    /// vector that was added while it was off.
    pub fn set_view_grid_map(&mut self, enabled: bool) {
        if !self.view_grid && enabled && self.model.has_neg_layers {
            self.model.has_neg_layers = false;
            if !self.has_map {
                self.new_map(0, 100, 0, 100);
            }
            self.push_all_vectors_onto_grid();
        }
        self.view_grid = enabled;
    }

    /// Turns the vector view on or off; at least one of the two views
    /// stays active.
    pub fn set_view_vector_map(&mut self, enabled: bool) {
        if !enabled && !self.view_grid {
            self.set_view_grid_map(true);
        }
        self.view_vector = enabled;
    }

    /// Enables per-cell layer tracking (undo support).
    pub fn enable_layer_info(&mut self) {
        self.grid.enable_layers();
    }

    /// Disables layer tracking for faster bulk writes; undo will not see
    /// them.
    pub fn disable_layer_info(&mut self) {
        self.grid.disable_layers();
    }

    /// Assigns positive layers to, and projects, every vector that is not
    /// yet on the grid.
    pub(crate) fn push_all_vectors_onto_grid(&mut self) {
        let mut objects = std::mem::take(self.model.objects_mut());
        for obj in objects.iter_mut() {
            if obj.layer < 0 {
                obj.layer = self.model.next_layer();
                self.grid.push_object(obj, self.resolution);
            }
        }
        *self.model.objects_mut() = objects;
    }

    // ----- pixel operations ------------------------------------------

    /// Sets one grid cell (grid coordinates, not millimetres).
    ///
    /// Consecutive point writes form a single undoable stroke until some
    /// other operation intervenes.
    pub fn set_point(&mut self, x: i64, y: i64, value: f32) {
        if !self.has_map {
            return;
        }
        let layer = self.model.current_layer();
        self.grid.push(x, y, layer, value);
        if !self.model.points_open {
            self.model.points_open = true;
            self.push_user_action(Action::SetPoint, true);
            self.model.point_layers.push_front(layer);
        }
    }

    /// Reads one grid cell; `-1` without a map.
    pub fn get_point_val(&self, x: i64, y: i64) -> f32 {
        if !self.has_map {
            return -1.0;
        }
        self.grid.read(x, y)
    }

    /// Flood-fills 4-connected cells whose value lies within `tolerance`
    /// of the starting cell's. The start position is in millimetres.
    pub fn fill_area(&mut self, x_mm: i64, y_mm: i64, value: f32, tolerance: f64) {
        if !self.has_map {
            return;
        }
        let _span = span!(Level::DEBUG, "fill_area").entered();

        let (gx, gy) = self.mm_to_grid(x_mm, y_mm);
        let start = Point::new(gx as i64, gy as i64);
        let layer = self.model.next_layer();
        let origin_value = self.grid.read(start.x, start.y) as f64;
        let bounds = self.grid.bounds();

        let mut mark = GridMap::with_block_size(50);
        let mut queue = vec![start];
        while let Some(p) = queue.pop() {
            self.grid.push(p.x, p.y, layer, value);
            for (dx, dy) in [(0, 1), (-1, 0), (1, 0), (0, -1)] {
                let n = Point::new(p.x + dx, p.y + dy);
                if mark.get(n.x, n.y) == 1.0 || !bounds.contains(n) {
                    continue;
                }
                let v = self.grid.read(n.x, n.y) as f64;
                if v <= origin_value + tolerance && v >= origin_value - tolerance {
                    mark.put(1.0, n.x, n.y);
                    queue.push(n);
                }
            }
        }

        self.push_user_action(Action::SetPoint, true);
        self.model.point_layers.push_front(layer);
    }

    // ----- vector operations -----------------------------------------

    /// Adds an object to the model, growing the vector boundary, and
    /// projects it into the grid when its layer is positive.
    pub(crate) fn set_object(&mut self, object: VectorObject) {
        let ob = object_mm_bounds(&object);
        if self.model.is_empty() {
            self.vector_boundary = ob;
        } else {
            self.vector_boundary = self.vector_boundary.union(ob);
        }
        self.model.push(object);
        if object.layer > 0 {
            self.grid.push_object(&object, self.resolution);
        }
    }

    /// A fresh layer id for a new object: positive (projected) while the
    /// grid view is on, negative otherwise.
    pub(crate) fn next_object_layer(&mut self) -> i64 {
        if self.view_grid {
            self.model.next_layer()
        } else {
            self.model.next_negative_layer()
        }
    }

    /// Adds a line between two millimetre positions.
    pub fn set_line(&mut self, x1: i64, y1: i64, x2: i64, y2: i64, value: f32) {
        if !self.has_map {
            return;
        }
        let layer = self.next_object_layer();
        self.set_object(VectorObject::new(
            layer,
            value,
            ObjectKind::Line,
            PointF::new(x1 as f32, y1 as f32),
            PointF::new(x2 as f32, y2 as f32),
        ));
        self.push_user_action(Action::SetObject, true);
    }

    /// Adds a rectangle outline between two millimetre corners.
    pub fn set_rectangle(&mut self, x1: i64, y1: i64, x2: i64, y2: i64, value: f32) {
        self.set_rect_kind(x1, y1, x2, y2, value, ObjectKind::Rect);
    }

    /// Adds a filled rectangle between two millimetre corners.
    pub fn set_rectangle_filled(&mut self, x1: i64, y1: i64, x2: i64, y2: i64, value: f32) {
        self.set_rect_kind(x1, y1, x2, y2, value, ObjectKind::RectFilled);
    }

    fn set_rect_kind(&mut self, x1: i64, y1: i64, x2: i64, y2: i64, value: f32, kind: ObjectKind) {
        if !self.has_map {
            return;
        }
        let (x1, x2) = (x1.min(x2), x1.max(x2));
        let (y1, y2) = (y1.min(y2), y1.max(y2));
        let layer = self.next_object_layer();
        self.set_object(VectorObject::new(
            layer,
            value,
            kind,
            PointF::new(x1 as f32, y1 as f32),
            PointF::new(x2 as f32, y2 as f32),
        ));
        self.push_user_action(Action::SetObject, true);
    }

    /// Places a robot disc centred on the given millimetre position and
    /// returns the created object.
    pub fn set_robot(&mut self, centre_x: i64, centre_y: i64) -> Option<VectorObject> {
        if !self.has_map {
            return None;
        }
        let layer = self.model.next_layer();
        let r = ROBOT_RADIUS as f32;
        let object = VectorObject::new(
            layer,
            0.0,
            ObjectKind::Robot,
            PointF::new(centre_x as f32 - r, centre_y as f32 + r),
            PointF::new(centre_x as f32 + r, centre_y as f32 - r),
        );
        self.set_object(object);
        self.push_user_action(Action::SetObject, true);
        Some(object)
    }

    /// Snaps a robot object to the canonical [`ROBOT_RADIUS`] about its
    /// centre. Non-robots pass through unchanged.
    pub fn fix_robot_size(&self, mut object: VectorObject) -> VectorObject {
        if object.kind != ObjectKind::Robot {
            return object;
        }
        let c = object.centre();
        let r = ROBOT_RADIUS as f32;
        object.p1 = PointF::new(c.x - r, c.y + r);
        object.p2 = PointF::new(c.x + r, c.y - r);
        object
    }

    /// Deletes the object with the given layer id.
    pub fn delete_object(&mut self, layer: i64) -> bool {
        if !self.has_map {
            return false;
        }
        let Some(object) = self.model.remove_by_layer(layer) else {
            return false;
        };
        if object.layer > 0 {
            self.grid.pop_object(&object, self.resolution);
        }
        self.model.deleted.push_front(object);
        self.push_user_action(Action::DeleteObject, true);
        true
    }

    /// Looks up an object by its layer id.
    pub fn get_object(&self, layer: i64) -> Option<VectorObject> {
        if !self.has_map {
            return None;
        }
        self.model.find_by_layer(layer).copied()
    }

    /// Replaces the object with layer `layer` by `replacement` (keeping
    /// the original's kind) and returns the new object's layer.
    pub fn replace_object(&mut self, layer: i64, replacement: VectorObject) -> Option<i64> {
        if !self.has_map {
            return None;
        }
        let old = self.model.remove_by_layer(layer)?;

        let mut newer = replacement;
        newer.kind = old.kind;
        if old.layer > 0 {
            self.grid.pop_object(&old, self.resolution);
        }
        if self.view_grid {
            newer.layer = self.model.next_layer();
            self.grid.push_object(&newer, self.resolution);
        } else {
            newer.layer = self.model.next_negative_layer();
        }

        while self.model.replaced.len() > crate::NUM_UNDO_STEPS {
            self.model.replaced.pop_back();
        }
        self.model.replaced.push_front((newer.layer, old));

        self.vector_boundary = self.vector_boundary.union(object_mm_bounds(&newer));
        self.model.push(newer);
        self.push_user_action(Action::ReplaceObject, true);
        Some(newer.layer)
    }

    /// Translates the objects with the given layer ids by `(dx, dy)`
    /// millimetres; returns the new layer ids, in input order.
    pub fn translate_objects(&mut self, layers: &[i64], dx: i64, dy: i64) -> Vec<i64> {
        let mut moved = Vec::new();
        let mut new_layers = Vec::new();

        for &layer in layers {
            let Some(mut object) = self.model.remove_by_layer(layer) else {
                continue;
            };
            if object.layer > 0 {
                self.grid.pop_object(&object, self.resolution);
            }
            object.layer = if self.view_grid {
                self.model.next_layer()
            } else {
                self.model.next_negative_layer()
            };
            self.model
                .replaced
                .push_front((object.layer, object));
            self.push_user_action(Action::ReplaceObject, true);

            object.p1 = PointF::new(object.p1.x + dx as f32, object.p1.y + dy as f32);
            object.p2 = PointF::new(object.p2.x + dx as f32, object.p2.y + dy as f32);
            new_layers.push(object.layer);
            moved.push(object);
        }

        for object in moved {
            self.vector_boundary = self.vector_boundary.union(object_mm_bounds(&object));
            self.model.push(object);
            if self.view_grid {
                self.grid.push_object(&object, self.resolution);
            }
        }
        new_layers
    }

    /// Removes all vector objects (and their grid projections).
    pub fn clear_vectors(&mut self) {
        let objects = std::mem::take(self.model.objects_mut());
        for object in &objects {
            if object.layer > 0 {
                self.grid.pop_object(object, self.resolution);
            }
        }
        self.model.reset_undo_info();
    }

    /// Removes all robot objects; returns whether any were removed.
    pub fn clear_robots(&mut self) -> bool {
        let layers: Vec<i64> = self
            .model
            .objects()
            .iter()
            .filter(|o| o.kind == ObjectKind::Robot)
            .map(|o| o.layer)
            .collect();
        for layer in &layers {
            if let Some(object) = self.model.remove_by_layer(*layer) {
                if object.layer > 0 {
                    self.grid.pop_object(&object, self.resolution);
                }
            }
        }
        !layers.is_empty()
    }

    /// Clears the Voronoi diagram.
    pub fn clear_voronoi(&mut self) {
        self.voronoi_lines.clear();
        self.voronoi_edges.clear();
        self.voronoi_vertices.clear();
    }

    /// Clears the Delaunay triangulation.
    pub fn clear_delaunay(&mut self) {
        self.delaunay_lines.clear();
    }

    /// Clears the loaded/generated paths.
    pub fn clear_paths(&mut self) {
        self.path_lines.clear();
        self.path_goals.clear();
    }

    /// Wipes the grid map back to the default value, keeping vectors.
    pub fn clear_grid_map(&mut self) {
        self.grid.clear_base(0.0);
        self.grid.delete_all_layer_info();
        self.model.reset_undo_info();
    }

    // ----- undo / redo -----------------------------------------------

    fn push_user_action(&mut self, action: Action, clear_undone: bool) {
        for layer in self.model.add_user_action(action, clear_undone) {
            self.grid.delete_layer_permanently(layer);
        }
    }

    fn push_undo_action(&mut self, action: Action) {
        if let Some(layer) = self.model.add_undo_action(action) {
            self.grid.delete_layer_permanently(layer);
        }
    }

    /// Undoes the most recent user action. Returns whether anything was
    /// undone.
    pub fn undo(&mut self) -> bool {
        let Some(action) = self.model.user_actions.pop_front() else {
            return false;
        };
        debug!(?action, "undo");
        match action {
            Action::SetPoint => {
                let Some(layer) = self.model.point_layers.pop_front() else {
                    return false;
                };
                self.model.point_layers_undone.push_front(layer);
                self.grid.delete_layer(layer);
                self.push_undo_action(Action::UndoSetPoint);
                true
            }
            Action::SetObject => {
                let Some(object) = self.model.pop_last() else {
                    return false;
                };
                if object.layer >= 0 {
                    self.grid.pop_object(&object, self.resolution);
                }
                self.model.undone.push_front(object);
                self.push_undo_action(Action::UndoSetObject);
                true
            }
            Action::DeleteObject => {
                let Some(object) = self.model.deleted.pop_front() else {
                    return false;
                };
                self.set_object(object);
                self.push_undo_action(Action::UndoDeleteObject);
                true
            }
            Action::ReplaceObject => {
                let Some((replacer_layer, old)) = self.model.replaced.pop_front() else {
                    return false;
                };
                let Some(newer) = self.model.remove_by_layer(replacer_layer) else {
                    return false;
                };
                if newer.layer > 0 {
                    self.grid.pop_object(&newer, self.resolution);
                }
                self.set_object(old);
                self.model.replaced_undone.push_front((old.layer, newer));
                self.push_undo_action(Action::UndoReplaceObject);
                true
            }
            _ => false,
        }
    }

    /// Redoes the most recently undone action. Returns whether anything
    /// was redone.
    pub fn redo(&mut self) -> bool {
        let Some(action) = self.model.undo_actions.pop_front() else {
            return false;
        };
        debug!(?action, "redo");
        match action {
            Action::UndoSetPoint | Action::UndoDeletePoint => {
                let Some(layer) = self.model.point_layers_undone.pop_front() else {
                    return false;
                };
                self.model.point_layers.push_front(layer);
                self.grid.redo_layer(layer);
                self.push_user_action(Action::SetPoint, false);
                true
            }
            Action::UndoSetObject => {
                let Some(object) = self.model.undone.pop_front() else {
                    return false;
                };
                self.set_object(object);
                self.push_user_action(Action::SetObject, false);
                true
            }
            Action::UndoReplaceObject => {
                let Some((restored_layer, redo_object)) = self.model.replaced_undone.pop_front()
                else {
                    return false;
                };
                let Some(current) = self.model.remove_by_layer(restored_layer) else {
                    return false;
                };
                if current.layer > 0 {
                    self.grid.pop_object(&current, self.resolution);
                }
                self.model
                    .replaced
                    .push_front((redo_object.layer, current));
                self.set_object(redo_object);
                self.push_user_action(Action::ReplaceObject, false);
                true
            }
            _ => false,
        }
    }

    // ----- whole-map transforms --------------------------------------

    /// Changes the resolution, re-projecting every vector object.
    ///
    /// Vector coordinates (millimetres) are unchanged; their grid
    /// rasterisation moves to the new cell size.
    pub fn set_resolution(&mut self, resolution: i64) -> Result<()> {
        if resolution <= 0 {
            return Err(Error::InvalidArgument(format!(
                "resolution must be positive, got {resolution}"
            )));
        }
        if resolution == self.resolution {
            return Ok(());
        }
        self.model.reset_undo_info();

        let objects: Vec<VectorObject> = self.model.objects().to_vec();
        for object in &objects {
            if object.layer > 0 {
                self.grid.pop_object(object, self.resolution);
            }
        }
        self.resolution = resolution;
        for object in &objects {
            if object.layer > 0 {
                self.grid.push_object(object, self.resolution);
            }
        }
        Ok(())
    }

    /// Crops the map to the given millimetre rectangle.
    ///
    /// Grid cells outside are wiped; vector objects are dropped when fully
    /// outside and clipped to the boundary when partially inside.
    pub fn crop_map(&mut self, x1: i64, y1: i64, x2: i64, y2: i64) -> Result<()> {
        if !self.has_map {
            return Err(Error::NoMapLoaded);
        }
        let _span = span!(Level::DEBUG, "crop_map").entered();

        let res = self.resolution as f64;
        let (min_x, max_x) = (x1.min(x2), x1.max(x2));
        let (min_y, max_y) = (y1.min(y2), y1.max(y2));

        let left = (min_x as f64 / res).floor() as i64;
        let right = (max_x as f64 / res).ceil() as i64;
        let bot = (min_y as f64 / res).floor() as i64;
        let top = (max_y as f64 / res).ceil() as i64;
        let cells = Rect::from_sides(left, bot, right, top);

        self.grid.crop(cells);
        self.map_cell_bounds = cells;

        let clip = Rect::from_sides(
            left * self.resolution,
            bot * self.resolution,
            right * self.resolution,
            top * self.resolution,
        );
        self.vector_boundary = clip;
        self.model.reset_undo_info();

        let objects = std::mem::take(self.model.objects_mut());
        let mut kept = Vec::with_capacity(objects.len());
        for object in objects {
            if let Some(clipped) = self.clip_object_to(object, clip) {
                kept.push(clipped);
            }
        }
        *self.model.objects_mut() = kept;
        Ok(())
    }

    /// Clips one object against a millimetre rectangle; `None` drops it.
    fn clip_object_to(&mut self, mut object: VectorObject, clip: Rect) -> Option<VectorObject> {
        let (partial, inside) = object_in_rect(&object, clip);
        if !inside {
            return None;
        }
        match object.kind {
            ObjectKind::Robot => {
                // Robots survive only when fully inside.
                (!partial).then_some(object)
            }
            ObjectKind::Rect | ObjectKind::RectFilled => {
                // An outline rectangle changes which cells its edges
                // cover, so its projection is redone around the clamp.
                let repaint = object.kind == ObjectKind::Rect && object.layer > 0 && partial;
                if repaint {
                    self.grid.pop_object(&object, self.resolution);
                }
                let (lo_x, hi_x) = sort2(object.p1.x, object.p2.x);
                let (lo_y, hi_y) = sort2(object.p1.y, object.p2.y);
                object.p1 = PointF::new(
                    lo_x.max(clip.left() as f32),
                    lo_y.max(clip.bot() as f32),
                );
                object.p2 = PointF::new(
                    hi_x.min(clip.right() as f32),
                    hi_y.min(clip.top() as f32),
                );
                if repaint {
                    self.grid.push_object(&object, self.resolution);
                }
                Some(object)
            }
            ObjectKind::Line => {
                if !partial {
                    return Some(object);
                }
                let borders = border_segments(clip);
                let pt1_in = clip.contains(mm_point(object.p1));
                let pt2_in = clip.contains(mm_point(object.p2));
                let line = object.segment();
                let mut pt1_set = false;
                let mut pt2_set = false;
                for border in borders {
                    if pt1_set && pt2_set {
                        break;
                    }
                    let Some((ix, iy)) =
                        line.intersection(&border, false, Segment::DEFAULT_HIT_THRESHOLD)
                    else {
                        continue;
                    };
                    let hit = PointF::new(ix as f32, iy as f32);
                    if pt1_in {
                        object.p2 = hit;
                        pt2_set = true;
                    } else if pt2_in {
                        object.p1 = hit;
                        pt1_set = true;
                    } else if !pt1_set {
                        object.p1 = hit;
                        pt1_set = true;
                    } else {
                        object.p2 = hit;
                        pt2_set = true;
                    }
                }
                Some(object)
            }
        }
    }

    /// Translates the whole map by `(dx, dy)` millimetres.
    ///
    /// The distances must be whole multiples of the resolution: the grid
    /// can only move by whole cells.
    pub fn translate_map(&mut self, dx: i64, dy: i64) -> Result<()> {
        if !self.has_map {
            return Err(Error::NoMapLoaded);
        }
        if dx % self.resolution != 0 || dy % self.resolution != 0 {
            return Err(Error::InvalidArgument(format!(
                "translate distances ({dx}, {dy}) must be multiples of the resolution {}",
                self.resolution
            )));
        }

        self.grid
            .translate(dx / self.resolution, dy / self.resolution);
        self.model.reset_undo_info();

        let (fx, fy) = (dx as f32, dy as f32);
        for object in self.model.objects_mut() {
            object.p1 = PointF::new(object.p1.x + fx, object.p1.y + fy);
            object.p2 = PointF::new(object.p2.x + fx, object.p2.y + fy);
        }
        for seg in self.voronoi_lines.iter_mut().chain(&mut self.delaunay_lines) {
            seg.p1 = PointF::new(seg.p1.x + fx, seg.p1.y + fy);
            seg.p2 = PointF::new(seg.p2.x + fx, seg.p2.y + fy);
        }
        let (cx, cy) = (
            (dx / self.resolution) as f32,
            (dy / self.resolution) as f32,
        );
        for seg in self.voronoi_edges.iter_mut() {
            seg.p1 = PointF::new(seg.p1.x + cx, seg.p1.y + cy);
            seg.p2 = PointF::new(seg.p2.x + cx, seg.p2.y + cy);
        }
        for v in self.voronoi_vertices.iter_mut() {
            *v = PointF::new(v.x + cx, v.y + cy);
        }
        for (p1, p2) in self.path_lines.iter_mut() {
            *p1 = *p1 + Point::new(dx, dy);
            *p2 = *p2 + Point::new(dx, dy);
        }
        self.vector_boundary = self.vector_boundary.translate(Point::new(dx, dy));
        self.map_cell_bounds = self
            .map_cell_bounds
            .translate(Point::new(dx / self.resolution, dy / self.resolution));
        Ok(())
    }

    /// Rebuilds the base map with every cell mapped through `f`, popping
    /// all vectors first and re-projecting them afterwards under fresh
    /// layers. Used by threshold and negate.
    fn remap_cells(
        &mut self,
        mut cell: impl FnMut(f32) -> f32,
        mut object_value: impl FnMut(f32) -> f32,
    ) -> Result<()> {
        if !self.has_map {
            return Err(Error::NoMapLoaded);
        }

        let mut objects = std::mem::take(self.model.objects_mut());
        for object in &objects {
            self.grid.pop_object(object, self.resolution);
        }
        for object in objects.iter_mut() {
            object.value = object_value(object.value);
            object.layer = self.model.next_negative_layer();
        }
        *self.model.objects_mut() = objects;

        let bounds = self.grid.bounds();
        let mut rebuilt = GridMap::new();
        let mut row = vec![0.0f32; bounds.width() as usize];
        for y in bounds.bot()..=bounds.top() {
            self.grid.copy_row(&mut row, y, bounds.left(), bounds.right());
            for (i, v) in row.iter().enumerate() {
                rebuilt.put(cell(*v), bounds.left() + i as i64, y);
            }
        }
        rebuilt.set_bounds(bounds);

        self.grid.init_from_map(rebuilt);
        self.push_all_vectors_onto_grid();
        self.model.reset_undo_info();
        Ok(())
    }

    /// Reduces the map to `{0, 1}`: cells inside `[min, max]` become `1`,
    /// everything else (unknown included) becomes `0`.
    pub fn threshold_map(&mut self, min: f32, max: f32) -> Result<()> {
        let (min, max) = (min.min(max), min.max(max));
        self.remap_cells(
            |v| {
                if v != -1.0 && between(v as f64, min as f64, max as f64) {
                    1.0
                } else {
                    0.0
                }
            },
            |v| {
                if v != -1.0 && between(v as f64, min as f64, max as f64) {
                    1.0
                } else {
                    0.0
                }
            },
        )
    }

    /// Inverts the map: `v` becomes `1 - v`; unknown (`-1`) cells stay
    /// unknown.
    pub fn negative_map(&mut self) -> Result<()> {
        self.remap_cells(
            |v| if v == -1.0 { v } else { 1.0 - v },
            |v| if v >= 0.0 { 1.0 - v } else { v },
        )
    }

    /// Replaces isolated cells in `[min, max]` that have three or more
    /// 4-neighbours outside that range with the average of those
    /// neighbours. The result is one undoable point layer.
    pub fn smooth_map(&mut self, min: f32, max: f32) -> Result<()> {
        if !self.has_map {
            return Err(Error::NoMapLoaded);
        }
        let bounds = self.grid.bounds();
        let width = (bounds.width() + 2) as usize;
        let mut row = vec![0.0f32; width];
        let mut above = vec![0.0f32; width];
        let mut below = vec![0.0f32; width];

        let mut to_smooth: Vec<(i64, i64, f32)> = Vec::new();
        let (lo, hi) = (min as f64, max as f64);
        for y in bounds.bot()..=bounds.top() {
            self.grid
                .copy_row(&mut row, y, bounds.left() - 1, bounds.right() + 1);
            self.grid
                .copy_row(&mut below, y - 1, bounds.left() - 1, bounds.right() + 1);
            self.grid
                .copy_row(&mut above, y + 1, bounds.left() - 1, bounds.right() + 1);
            for x in bounds.left()..=bounds.right() {
                let i = (x - bounds.left() + 1) as usize;
                if !between(row[i] as f64, lo, hi) {
                    continue;
                }
                let mut count = 0;
                let mut total = 0.0f32;
                for v in [row[i + 1], row[i - 1], below[i], above[i]] {
                    if !between(v as f64, lo, hi) {
                        count += 1;
                        total += v;
                    }
                }
                if count >= 3 {
                    to_smooth.push((x, y, total / count as f32));
                }
            }
        }

        if to_smooth.is_empty() {
            return Ok(());
        }

        self.grid.delete_all_layer_info();
        self.model.reset_undo_info();

        let layer = self.model.next_layer();
        for (x, y, v) in to_smooth {
            self.grid.push(x, y, layer, v);
        }
        self.push_user_action(Action::SetPoint, true);
        self.model.point_layers.push_front(layer);
        Ok(())
    }

    /// Dilates all occupied cells in `[min, max]` by `distance`
    /// millimetres (configuration-space growth). Not undoable.
    pub fn generate_cspace_simple(&mut self, min: f32, max: f32, distance: i64) -> Result<()> {
        if !self.has_map {
            return Err(Error::NoMapLoaded);
        }
        self.grid
            .generate_cspace(distance, min, max, self.resolution);
        self.model.reset_undo_info();
        Ok(())
    }

    /// Folds the grid map stored at `path` into a running per-cell
    /// average; calling this repeatedly with n maps yields the true
    /// n-way mean, not a nested average.
    pub fn average_grid_map(&mut self, path: impl AsRef<std::path::Path>) -> Result<()> {
        if !self.has_map {
            return Err(Error::NoMapLoaded);
        }
        self.begin_bulk_job();

        let mut other = GridMap::with_default_value(blockgrid::DEFAULT_BLOCK_SIZE, -1.0);
        crate::formats::load_grid_file(path.as_ref(), &mut other)?;

        let here = self.grid.bounds();
        let there = other.bounds();
        let overlap = here.intersection(there);
        let union = here.union(there);

        let count = self.map_average_count as f32;
        let mut merged = GridMap::new();
        for x in union.left()..=union.right() {
            if self.bulk_cancelled() {
                return Ok(());
            }
            for y in (union.bot()..=union.top()).rev() {
                let p = Point::new(x, y);
                let mut v1 = if here.contains(p) {
                    self.grid.read(x, y)
                } else {
                    other.get(x, y)
                };
                let mut v2 = match overlap {
                    Some(o) if o.contains(p) => other.get(x, y),
                    _ => v1,
                };
                if v1 == -1.0 {
                    v1 = v2;
                }
                if v2 == -1.0 {
                    v2 = v1;
                }
                merged.put((v1 * count + v2) / (count + 1.0), x, y);
            }
        }

        self.grid.init_from_map(merged);
        self.map_average_count += 1;
        self.model.reset_undo_info();
        self.job_successful = true;
        Ok(())
    }

    /// Correlates this map against the grid map stored at `path`
    /// (Baron's coefficient, `[-1, 1]`).
    pub fn correlate_map(&mut self, path: impl AsRef<std::path::Path>) -> Result<f64> {
        let mut other = GridMap::with_default_value(blockgrid::DEFAULT_BLOCK_SIZE, 0.5);
        crate::formats::load_grid_file(path.as_ref(), &mut other)?;
        let mut this = GridMap::with_default_value(blockgrid::DEFAULT_BLOCK_SIZE, 0.5);
        self.latest_grid_map(&mut this);
        Ok(other.correlate(&this))
    }

    /// Scores this map against the grid map stored at `path` (sum of
    /// squared differences; 0 is a perfect match).
    pub fn map_score_map(
        &mut self,
        path: impl AsRef<std::path::Path>,
        occupied_only: bool,
    ) -> Result<f64> {
        let mut other = GridMap::with_default_value(blockgrid::DEFAULT_BLOCK_SIZE, 0.5);
        crate::formats::load_grid_file(path.as_ref(), &mut other)?;
        let mut this = GridMap::with_default_value(blockgrid::DEFAULT_BLOCK_SIZE, 0.5);
        self.latest_grid_map(&mut this);
        Ok(other.score(&this, occupied_only))
    }

    /// Copies the current grid contents into `into`, row by row.
    pub fn latest_grid_map(&self, into: &mut GridMap) {
        let bounds = self.grid.bounds();
        let mut row = vec![0.0f32; bounds.width() as usize];
        for y in bounds.bot()..=bounds.top() {
            self.grid.copy_row(&mut row, y, bounds.left(), bounds.right());
            for (i, v) in row.iter().enumerate() {
                into.put(*v, bounds.left() + i as i64, y);
            }
        }
        into.set_bounds(bounds);
    }

    // ----- readers ---------------------------------------------------

    /// All vector objects, oldest first.
    pub fn objects(&self) -> impl Iterator<Item = &VectorObject> + '_ {
        self.model.objects().iter()
    }

    /// All robot objects.
    pub fn robots(&self) -> impl Iterator<Item = &VectorObject> + '_ {
        self.model
            .objects()
            .iter()
            .filter(|o| o.kind == ObjectKind::Robot)
    }

    /// Snapshot of the objects with layer ids scrubbed, as handed to
    /// external consumers.
    pub fn all_objects(&self) -> Vec<VectorObject> {
        self.model
            .objects()
            .iter()
            .map(|o| {
                let mut o = *o;
                o.layer = 0;
                o
            })
            .collect()
    }

    /// Voronoi edges in millimetres.
    pub fn voronoi_lines(&self) -> &[Segment] {
        &self.voronoi_lines
    }

    /// Voronoi vertex-to-vertex connections, grid units.
    pub fn voronoi_edges(&self) -> &[Segment] {
        &self.voronoi_edges
    }

    /// Voronoi vertices, grid units.
    pub fn voronoi_vertices(&self) -> &[PointF] {
        &self.voronoi_vertices
    }

    /// Delaunay edges in millimetres.
    pub fn delaunay_lines(&self) -> &[Segment] {
        &self.delaunay_lines
    }

    /// Path lines in millimetres.
    pub fn path_lines(&self) -> &[(Point, Point)] {
        &self.path_lines
    }

    /// Copies one row of the displayed grid. See
    /// [`LayeredGrid::copy_row`].
    pub fn copy_row(&self, buf: &mut [f32], y: i64, from_x: i64, to_x: i64) -> bool {
        self.grid.copy_row(buf, y, from_x, to_x)
    }

    /// Recomputes the vector boundary from the current objects.
    pub fn refresh_vector_boundary(&mut self) {
        for object in self.model.objects() {
            self.vector_boundary = self.vector_boundary.union(object_mm_bounds(object));
        }
    }

    // ----- errors and bulk-job control -------------------------------

    /// Stores a `(title, message)` pair for the next reader.
    pub(crate) fn set_error_strings(&mut self, title: &str, message: impl Into<String>) {
        self.error = Some((title.to_owned(), message.into()));
    }

    /// Takes the pending error pair, clearing it.
    pub fn take_error_strings(&mut self) -> Option<(String, String)> {
        self.error.take()
    }

    /// A handle that can cancel a bulk operation in flight.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    /// Requests cancellation of the running bulk operation.
    pub fn cancel_bulk_job(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }

    /// Whether the last bulk operation ran to completion.
    pub fn job_completed_successfully(&self) -> bool {
        self.job_successful
    }

    pub(crate) fn begin_bulk_job(&mut self) {
        self.cancel.store(false, Ordering::Relaxed);
        self.job_successful = false;
    }

    pub(crate) fn bulk_cancelled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }
}

/// The millimetre bounding box of an object's two stored points.
pub(crate) fn object_mm_bounds(object: &VectorObject) -> Rect {
    Rect::new(mm_point(object.p1), mm_point(object.p2))
}

fn mm_point(p: PointF) -> Point {
    Point::new(p.x as i64, p.y as i64)
}

fn sort2(a: f32, b: f32) -> (f32, f32) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

/// The four border segments of a millimetre rectangle, in the clip order
/// left, top, right, bottom.
fn border_segments(rect: Rect) -> [Segment; 4] {
    let (l, b, r, t) = (
        rect.left() as f32,
        rect.bot() as f32,
        rect.right() as f32,
        rect.top() as f32,
    );
    [
        Segment::from_coords(l, t, l, b),
        Segment::from_coords(l, t, r, t),
        Segment::from_coords(r, b, r, t),
        Segment::from_coords(l, b, r, b),
    ]
}

/// Whether `object` intersects `rect` (millimetres); the first flag is
/// whether the overlap is only partial.
pub(crate) fn object_in_rect(object: &VectorObject, rect: Rect) -> (bool, bool) {
    let pt1_in = rect.contains(mm_point(object.p1));
    let pt2_in = rect.contains(mm_point(object.p2));
    if pt1_in && pt2_in {
        return (false, true);
    }
    if pt1_in || pt2_in {
        return (true, true);
    }
    match object.kind {
        ObjectKind::Rect | ObjectKind::RectFilled | ObjectKind::Robot => {
            let overlaps = object_mm_bounds(object).intersection(rect).is_some();
            (true, overlaps)
        }
        ObjectKind::Line => {
            let line = object.segment();
            let hit = border_segments(rect)
                .iter()
                .any(|b| line.intersection(b, false, 0.0).is_some());
            (true, hit)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn built_map() -> MapCore {
        let mut map = MapCore::new();
        map.new_map(0, 1000, 0, 1000);
        map
    }

    #[test_log::test]
    fn point_then_line_undo_in_reverse_order() {
        let mut map = built_map();
        map.set_point(3, 7, 1.0);
        map.set_line(100, 100, 300, 100, 0.8);

        assert_eq!(map.get_point_val(3, 7), 1.0);
        for x in 1..=3 {
            assert_eq!(map.get_point_val(x, 1), 0.8, "cell ({x},1)");
        }

        // First undo removes only the line.
        assert!(map.undo());
        assert_eq!(map.get_point_val(3, 7), 1.0);
        assert_eq!(map.get_point_val(2, 1), 0.0);

        // Second undo removes only the point.
        assert!(map.undo());
        assert_eq!(map.get_point_val(3, 7), 0.0);
    }

    #[test_log::test]
    fn undo_redo_round_trip_restores_everything() {
        let mut map = built_map();
        map.set_line(0, 0, 400, 0, 1.0);
        map.set_rectangle(100, 100, 500, 500, 0.7);
        map.set_rectangle_filled(600, 600, 900, 900, 0.9);
        let layers: Vec<i64> = map.objects().map(|o| o.layer).collect();

        let bounds = map.grid_dimensions().unwrap();
        let snapshot = |m: &MapCore| -> Vec<f32> {
            let mut cells = Vec::new();
            for y in bounds.bot()..=bounds.top() {
                for x in bounds.left()..=bounds.right() {
                    cells.push(m.get_point_val(x, y));
                }
            }
            cells
        };
        let before = snapshot(&map);

        assert!(map.undo());
        assert!(map.undo());
        assert!(map.undo());
        assert!(!map.has_vectors());

        assert!(map.redo());
        assert!(map.redo());
        assert!(map.redo());

        assert_eq!(snapshot(&map), before);
        let layers_after: Vec<i64> = map.objects().map(|o| o.layer).collect();
        assert_eq!(layers, layers_after);
    }

    #[test]
    fn delete_and_undo_restores_object() {
        let mut map = built_map();
        map.set_line(0, 0, 300, 300, 1.0);
        let layer = map.objects().next().unwrap().layer;
        assert!(map.delete_object(layer));
        assert!(!map.has_vectors());
        assert_eq!(map.get_point_val(1, 1), 0.0);

        assert!(map.undo());
        assert!(map.has_vectors());
        assert_eq!(map.get_point_val(1, 1), 1.0);
    }

    #[test]
    fn replace_object_and_undo() {
        let mut map = built_map();
        map.set_line(0, 0, 300, 0, 1.0);
        let layer = map.objects().next().unwrap().layer;

        let replacement = VectorObject::new(
            0,
            1.0,
            ObjectKind::Line,
            PointF::new(0.0, 200.0),
            PointF::new(300.0, 200.0),
        );
        let new_layer = map.replace_object(layer, replacement).unwrap();
        assert_ne!(new_layer, layer);
        assert_eq!(map.get_point_val(1, 2), 1.0);
        assert_eq!(map.get_point_val(1, 0), 0.0);

        assert!(map.undo());
        assert_eq!(map.get_point_val(1, 0), 1.0);
        assert_eq!(map.get_point_val(1, 2), 0.0);
    }

    #[test]
    fn threshold_then_negate_matches_value_rules() {
        let mut map = built_map();
        map.set_point(0, 0, 0.2);
        map.set_point(1, 0, 0.5);
        map.set_point(2, 0, 0.8);
        map.set_point(3, 0, -1.0);

        map.threshold_map(0.4, 1.0).unwrap();
        assert_eq!(map.get_point_val(0, 0), 0.0);
        assert_eq!(map.get_point_val(1, 0), 1.0);
        assert_eq!(map.get_point_val(2, 0), 1.0);
        assert_eq!(map.get_point_val(3, 0), 0.0);

        map.negative_map().unwrap();
        assert_eq!(map.get_point_val(0, 0), 1.0);
        assert_eq!(map.get_point_val(1, 0), 0.0);
        assert_eq!(map.get_point_val(2, 0), 0.0);
        assert_eq!(map.get_point_val(3, 0), 1.0);
    }

    #[test]
    fn negative_map_preserves_unknown_cells() {
        let mut map = built_map();
        map.set_point(0, 0, -1.0);
        map.set_point(1, 0, 0.8);
        map.negative_map().unwrap();
        assert_eq!(map.get_point_val(0, 0), -1.0);
        assert!((map.get_point_val(1, 0) - 0.2).abs() < 1e-6);
    }

    #[test]
    fn crop_keeps_partial_line_clipped_to_boundary() {
        let mut map = built_map();
        map.set_line(0, 0, 1000, 0, 1.0);
        map.crop_map(200, -50, 800, 50).unwrap();

        let objects: Vec<&VectorObject> = map.objects().collect();
        assert_eq!(objects.len(), 1);
        let line = objects[0];
        let (lo, hi) = sort2(line.p1.x, line.p2.x);
        assert!((lo - 200.0).abs() <= 2.0, "left endpoint was {lo}");
        assert!((hi - 800.0).abs() <= 2.0, "right endpoint was {hi}");
        assert_eq!(line.p1.y, 0.0);
        assert_eq!(line.p2.y, 0.0);
    }

    #[test]
    fn cspace_grows_single_cell_into_disc() {
        let mut map = built_map();
        map.set_point(5, 5, 1.0);
        map.generate_cspace_simple(1.0, 1.0, 250).unwrap();
        for x in 0..=10 {
            for y in 0..=10 {
                let d = (((x - 5) * (x - 5) + (y - 5) * (y - 5)) as f64).sqrt();
                let expected = if d <= 2.5 { 1.0 } else { 0.0 };
                assert_eq!(map.get_point_val(x, y), expected, "cell ({x},{y})");
            }
        }
    }

    #[test]
    fn resolution_change_round_trip_preserves_projection() {
        let mut map = built_map();
        map.set_line(100, 100, 700, 400, 1.0);
        map.set_rectangle(0, 0, 300, 300, 0.6);

        let bounds = map.grid_dimensions().unwrap();
        let mut before = Vec::new();
        for y in bounds.bot()..=bounds.top() {
            for x in bounds.left()..=bounds.right() {
                before.push(map.get_point_val(x, y));
            }
        }

        map.set_resolution(50).unwrap();
        map.set_resolution(100).unwrap();

        let mut after = Vec::new();
        for y in bounds.bot()..=bounds.top() {
            for x in bounds.left()..=bounds.right() {
                after.push(map.get_point_val(x, y));
            }
        }
        assert_eq!(before, after);
    }

    #[test]
    fn translate_requires_whole_cells() {
        let mut map = built_map();
        map.set_point(1, 1, 1.0);
        assert!(matches!(
            map.translate_map(223, 0),
            Err(Error::InvalidArgument(_))
        ));
        map.translate_map(500, -200).unwrap();
        assert_eq!(map.get_point_val(6, -1), 1.0);
        assert_eq!(map.get_point_val(1, 1), 0.0);
    }

    #[test]
    fn translate_moves_vectors_too() {
        let mut map = built_map();
        map.set_line(0, 0, 200, 0, 1.0);
        map.translate_map(300, 100).unwrap();
        let line = map.objects().next().unwrap();
        let (lo, hi) = sort2(line.p1.x, line.p2.x);
        assert_eq!((lo, hi), (300.0, 500.0));
        assert_eq!(line.p1.y, 100.0);
    }

    #[test]
    fn fill_area_floods_within_tolerance() {
        let mut map = built_map();
        // A wall splitting the nominal map area.
        for y in 0..=10 {
            map.set_point(5, y, 1.0);
        }
        map.fill_area(100, 100, 0.7, 0.1);
        assert_eq!(map.get_point_val(1, 1), 0.7);
        assert_eq!(map.get_point_val(4, 9), 0.7);
        // The wall and the far side are untouched.
        assert_eq!(map.get_point_val(5, 5), 1.0);
        assert_eq!(map.get_point_val(7, 5), 0.0);
        // One undo removes the whole fill.
        assert!(map.undo());
        assert_eq!(map.get_point_val(1, 1), 0.0);
        assert_eq!(map.get_point_val(5, 5), 1.0);
    }

    #[test]
    fn robot_helpers() {
        let mut map = built_map();
        let robot = map.set_robot(500, 500).unwrap();
        assert_eq!(robot.kind, ObjectKind::Robot);
        assert!(map.has_robot());
        let fixed = map.fix_robot_size(VectorObject::new(
            0,
            90.0,
            ObjectKind::Robot,
            PointF::new(0.0, 0.0),
            PointF::new(100.0, 0.0),
        ));
        assert_eq!((fixed.p2.x - fixed.p1.x).abs() as i64, 2 * ROBOT_RADIUS);
        assert!(map.clear_robots());
        assert!(!map.has_robot());
    }

    #[test]
    fn error_pair_cleared_by_first_reader() {
        let mut map = MapCore::new();
        map.set_error_strings("Error", "something failed");
        assert!(map.take_error_strings().is_some());
        assert!(map.take_error_strings().is_none());
    }
}
