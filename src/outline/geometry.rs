//! Per-entry screen regions used for drag hit-testing.

use crate::models::EntryId;
use std::collections::HashMap;

#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub(crate) struct Rect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    pub fn bottom(&self) -> f64 {
        self.top + self.height
    }

    pub fn right(&self) -> f64 {
        self.left + self.width
    }

    pub fn contains_y(&self, y: f64) -> bool {
        y >= self.top && y < self.bottom()
    }

    pub fn mid_y(&self) -> f64 {
        self.top + self.height / 2.0
    }
}

/// Bounds of an entry's own row and, when it has children, of its children block.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct NodeGeometry {
    pub own: Rect,
    pub children: Option<Rect>,
}

pub(crate) trait GeometryTracker {
    fn register(&mut self, id: &EntryId, geometry: NodeGeometry);

    /// Idempotent; clearing an unknown id is a no-op.
    fn clear(&mut self, id: &EntryId);
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, strum::Display, strum::AsRefStr)]
#[strum(serialize_all = "kebab-case")]
pub(crate) enum DropPlacement {
    Before,
    After,
    /// First child of the target.
    Inside,
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) struct DropTarget {
    pub id: EntryId,
    pub placement: DropPlacement,
}

#[derive(Clone, Debug, Default)]
pub(crate) struct GeometryRegistry {
    regions: HashMap<EntryId, NodeGeometry>,
}

impl GeometryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    pub fn get(&self, id: &EntryId) -> Option<&NodeGeometry> {
        self.regions.get(id)
    }

    pub fn contains(&self, id: &EntryId) -> bool {
        self.regions.contains_key(id)
    }

    /// Finds the row under the pointer.
    ///
    /// Rows for which `accept` returns false (dragged nodes, their descendants, ids that no
    /// longer exist) are skipped, so a stale record never yields a target. Dropping in the
    /// lower half of a row lands after it, or inside it when the pointer is pushed right by
    /// at least `nest_threshold` px. The lower half of a row with a visible children block is
    /// always inside: the slot after such a row sits below its whole subtree.
    pub fn hit_test(
        &self,
        x: f64,
        y: f64,
        nest_threshold: f64,
        accept: impl Fn(&EntryId) -> bool,
    ) -> Option<DropTarget> {
        let (id, g) = self
            .regions
            .iter()
            .filter(|(_, g)| g.own.contains_y(y))
            .filter(|(id, _)| accept(id))
            // Innermost (right-most) row wins when rows overlap vertically.
            .max_by(|(_, a), (_, b)| a.own.left.total_cmp(&b.own.left))?;

        let placement = if y < g.own.mid_y() {
            DropPlacement::Before
        } else if g.children.is_some() || x - g.own.left >= nest_threshold {
            DropPlacement::Inside
        } else {
            DropPlacement::After
        };

        Some(DropTarget {
            id: id.clone(),
            placement,
        })
    }
}

impl GeometryTracker for GeometryRegistry {
    fn register(&mut self, id: &EntryId, geometry: NodeGeometry) {
        self.regions.insert(id.clone(), geometry);
    }

    fn clear(&mut self, id: &EntryId) {
        self.regions.remove(id);
    }
}
