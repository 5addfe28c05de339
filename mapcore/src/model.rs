//! The vector-object model and its undo bookkeeping.

use std::collections::VecDeque;

use geometry::prelude::{PointF, Segment};
use serde::{Deserialize, Serialize};

use crate::NUM_UNDO_STEPS;

/// What a vector object is.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectKind {
    /// A line segment.
    Line,
    /// A rectangle outline.
    Rect,
    /// A filled rectangle.
    RectFilled,
    /// A robot disc; `value` carries the heading in degrees.
    Robot,
}

impl ObjectKind {
    /// The keyword used for this kind in the MapViewer format.
    pub fn keyword(&self) -> &'static str {
        match self {
            Self::Line => "line",
            Self::Rect => "rect",
            Self::RectFilled => "rectfill",
            Self::Robot => "robot",
        }
    }

    /// Parses a MapViewer keyword.
    pub fn from_keyword(word: &str) -> Option<Self> {
        match word.to_ascii_lowercase().as_str() {
            "line" => Some(Self::Line),
            "rect" => Some(Self::Rect),
            "rectfill" => Some(Self::RectFilled),
            "robot" => Some(Self::Robot),
            _ => None,
        }
    }
}

/// One vector object: a line, rectangle or robot in millimetre
/// coordinates, tagged with its grid layer and occupancy value.
///
/// The `layer` is the unique label under which the object's cells were
/// pushed onto the [`LayeredGrid`](crate::LayeredGrid); it is positive
/// when the object is currently projected into the grid and negative when
/// it exists only in the vector model.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorObject {
    /// The grid layer this object was rasterised under.
    pub layer: i64,
    /// The occupancy value painted by this object (heading for robots).
    pub value: f32,
    /// The object's shape.
    pub kind: ObjectKind,
    /// One endpoint/corner, millimetres.
    pub p1: PointF,
    /// The other endpoint/corner, millimetres.
    pub p2: PointF,
}

impl VectorObject {
    /// Creates an object.
    pub fn new(layer: i64, value: f32, kind: ObjectKind, p1: PointF, p2: PointF) -> Self {
        Self {
            layer,
            value,
            kind,
            p1,
            p2,
        }
    }

    /// The object as a segment between its two stored points.
    pub fn segment(&self) -> Segment {
        Segment::new(self.p1, self.p2)
    }

    /// The centre point (robots are discs about this point).
    pub fn centre(&self) -> PointF {
        self.segment().midpoint()
    }
}

/// Undoable user actions, and the undo records that can re-apply them.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum Action {
    SetPoint,
    SetObject,
    DeleteObject,
    ReplaceObject,
    UndoSetPoint,
    UndoSetObject,
    UndoDeletePoint,
    UndoDeleteObject,
    UndoReplaceObject,
}

impl Action {
    pub(crate) fn is_undo(&self) -> bool {
        matches!(
            self,
            Self::UndoSetPoint
                | Self::UndoSetObject
                | Self::UndoDeletePoint
                | Self::UndoDeleteObject
                | Self::UndoReplaceObject
        )
    }
}

/// The insertion-ordered collection of vector objects together with the
/// bounded queues that drive undo and redo.
///
/// Layer identifiers are issued by two monotonic counters: a positive one
/// starting at [`NUM_UNDO_STEPS`] (the first `NUM_UNDO_STEPS` ids are
/// reserved and never assigned to objects) and a negative one starting at
/// `-2` for objects not currently projected onto the grid.
#[derive(Debug, Clone)]
pub struct VectorModel {
    objects: Vec<VectorObject>,
    pub(crate) deleted: VecDeque<VectorObject>,
    pub(crate) undone: VecDeque<VectorObject>,
    /// Pairs of (layer of the replacing object, the object it replaced).
    pub(crate) replaced: VecDeque<(i64, VectorObject)>,
    pub(crate) replaced_undone: VecDeque<(i64, VectorObject)>,
    pub(crate) point_layers: VecDeque<i64>,
    pub(crate) point_layers_undone: VecDeque<i64>,
    pub(crate) user_actions: VecDeque<Action>,
    pub(crate) undo_actions: VecDeque<Action>,
    /// Whether the current run of point writes has been recorded as a
    /// single undoable action already.
    pub(crate) points_open: bool,
    latest_layer: i64,
    latest_neg_layer: i64,
    pub(crate) has_neg_layers: bool,
}

impl Default for VectorModel {
    fn default() -> Self {
        Self::new()
    }
}

impl VectorModel {
    /// An empty model.
    pub fn new() -> Self {
        Self {
            objects: Vec::new(),
            deleted: VecDeque::new(),
            undone: VecDeque::new(),
            replaced: VecDeque::new(),
            replaced_undone: VecDeque::new(),
            point_layers: VecDeque::new(),
            point_layers_undone: VecDeque::new(),
            user_actions: VecDeque::new(),
            undo_actions: VecDeque::new(),
            points_open: false,
            latest_layer: NUM_UNDO_STEPS as i64,
            latest_neg_layer: -2,
            has_neg_layers: false,
        }
    }

    /// Empties the model and restores the layer counters.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// The objects, oldest first.
    pub fn objects(&self) -> &[VectorObject] {
        &self.objects
    }

    /// Mutable access for bulk transforms (translate, threshold).
    pub(crate) fn objects_mut(&mut self) -> &mut Vec<VectorObject> {
        &mut self.objects
    }

    /// Whether any objects exist.
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// The number of objects.
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Appends an object.
    pub(crate) fn push(&mut self, object: VectorObject) {
        self.objects.push(object);
    }

    /// Removes and returns the most recently added object.
    pub(crate) fn pop_last(&mut self) -> Option<VectorObject> {
        self.objects.pop()
    }

    /// Finds an object by its layer id.
    pub fn find_by_layer(&self, layer: i64) -> Option<&VectorObject> {
        self.objects.iter().find(|o| o.layer == layer)
    }

    /// Removes an object by its layer id, preserving the order of the
    /// remaining objects.
    pub(crate) fn remove_by_layer(&mut self, layer: i64) -> Option<VectorObject> {
        let idx = self.objects.iter().position(|o| o.layer == layer)?;
        Some(self.objects.remove(idx))
    }

    /// Issues the next positive layer id and closes the current point run.
    pub(crate) fn next_layer(&mut self) -> i64 {
        self.points_open = false;
        self.latest_layer += 1;
        self.latest_layer
    }

    /// The layer id the current point run paints into.
    pub(crate) fn current_layer(&self) -> i64 {
        self.latest_layer
    }

    /// Issues the next negative layer id (objects kept off the grid).
    pub(crate) fn next_negative_layer(&mut self) -> i64 {
        self.has_neg_layers = true;
        self.latest_neg_layer -= 1;
        self.latest_neg_layer
    }

    /// Records a user action.
    ///
    /// Keeps the history bounded at [`NUM_UNDO_STEPS`], and — unless the
    /// action is itself an undo, or `clear_undone` is false — discards the
    /// redo artifacts so history stays linear. Returns the ids of point
    /// layers whose bookkeeping must be deleted permanently.
    pub(crate) fn add_user_action(&mut self, action: Action, clear_undone: bool) -> Vec<i64> {
        let mut dead_layers = Vec::new();

        if self.user_actions.len() > NUM_UNDO_STEPS {
            if let Some(oldest) = self.user_actions.pop_back() {
                if oldest == Action::SetPoint {
                    if let Some(layer) = self.point_layers.pop_back() {
                        dead_layers.push(layer);
                    }
                }
            }
        }

        if !action.is_undo() && clear_undone {
            self.undone.clear();
            self.replaced_undone.clear();
            while let Some(layer) = self.point_layers_undone.pop_front() {
                dead_layers.push(layer);
            }
        }

        self.user_actions.push_front(action);
        dead_layers
    }

    /// Records an undo action; returns a point layer to delete permanently
    /// when the bounded queue overflows.
    pub(crate) fn add_undo_action(&mut self, action: Action) -> Option<i64> {
        self.undo_actions.push_front(action);
        if self.undo_actions.len() > NUM_UNDO_STEPS {
            match self.undo_actions.pop_back() {
                Some(Action::UndoSetPoint) => return self.point_layers_undone.pop_back(),
                Some(Action::UndoSetObject) => {
                    self.undone.pop_back();
                }
                Some(Action::UndoDeleteObject) => {
                    self.deleted.pop_back();
                }
                _ => {}
            }
        }
        None
    }

    /// Clears every undo/redo queue (used after operations that cannot be
    /// undone). The objects themselves are untouched.
    pub(crate) fn reset_undo_info(&mut self) {
        self.replaced.clear();
        self.undone.clear();
        self.deleted.clear();
        self.point_layers_undone.clear();
        self.undo_actions.clear();
        self.user_actions.clear();
        self.replaced_undone.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obj(layer: i64) -> VectorObject {
        VectorObject::new(
            layer,
            1.0,
            ObjectKind::Line,
            PointF::new(0.0, 0.0),
            PointF::new(1.0, 1.0),
        )
    }

    #[test]
    fn layer_counters_skip_reserved_ids() {
        let mut model = VectorModel::new();
        assert_eq!(model.next_layer(), NUM_UNDO_STEPS as i64 + 1);
        assert_eq!(model.next_layer(), NUM_UNDO_STEPS as i64 + 2);
        assert_eq!(model.next_negative_layer(), -3);
        assert_eq!(model.next_negative_layer(), -4);
    }

    #[test]
    fn remove_preserves_order() {
        let mut model = VectorModel::new();
        for layer in [11, 12, 13] {
            model.push(obj(layer));
        }
        assert_eq!(model.remove_by_layer(12).unwrap().layer, 12);
        let layers: Vec<i64> = model.objects().iter().map(|o| o.layer).collect();
        assert_eq!(layers, [11, 13]);
    }

    #[test]
    fn user_action_overflow_reports_dead_point_layers() {
        let mut model = VectorModel::new();
        for i in 0..NUM_UNDO_STEPS as i64 + 1 {
            model.point_layers.push_front(100 + i);
            assert!(model.add_user_action(Action::SetPoint, true).is_empty());
        }
        model.point_layers.push_front(999);
        let dead = model.add_user_action(Action::SetPoint, true);
        assert_eq!(dead, vec![100]);
    }

    #[test]
    fn new_user_action_clears_redo_artifacts() {
        let mut model = VectorModel::new();
        model.undone.push_front(obj(20));
        model.point_layers_undone.push_front(21);
        let dead = model.add_user_action(Action::SetObject, true);
        assert!(model.undone.is_empty());
        assert_eq!(dead, vec![21]);
    }
}
