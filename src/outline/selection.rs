//! Block selection across sibling entries.
//!
//! A press on an entry's text arms a gesture anchored at that entry and its depth. Dragging
//! over other entries selects the run of siblings between the anchor and the hovered entry,
//! lifted to the deepest level where both share a parent.

use crate::models::EntryId;
use crate::outline::tree::OutlineTree;
use std::collections::BTreeSet;

#[derive(Clone, Debug, Default)]
pub(crate) struct SelectionState {
    anchor: Option<(EntryId, usize)>,
    gesture: bool,
    selected: Option<BTreeSet<EntryId>>,
}

impl SelectionState {
    pub fn selected(&self) -> Option<&BTreeSet<EntryId>> {
        self.selected.as_ref()
    }

    pub fn contains(&self, id: &EntryId) -> bool {
        self.selected.as_ref().is_some_and(|s| s.contains(id))
    }

    pub fn is_gesture_active(&self) -> bool {
        self.gesture
    }

    pub fn start(&mut self, id: EntryId, depth: usize) {
        self.anchor = Some((id, depth));
        self.gesture = true;
        self.selected = None;
    }

    /// Extends the active gesture over `id`. Returns whether the selection changed.
    pub fn over(&mut self, tree: &OutlineTree, id: &EntryId) -> bool {
        if !self.gesture {
            return false;
        }
        let Some((anchor, _)) = self.anchor.as_ref() else {
            return false;
        };

        let next = if anchor == id {
            // Still inside the anchor's own text: native text selection applies.
            None
        } else {
            sibling_run(tree, anchor, id)
        };
        if next == self.selected {
            return false;
        }
        self.selected = next;
        true
    }

    pub fn end(&mut self) {
        self.gesture = false;
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Drops ids that no longer exist in `tree`.
    pub fn retain(&mut self, tree: &OutlineTree) {
        if let Some(s) = self.selected.as_mut() {
            s.retain(|id| tree.contains(id));
            if s.is_empty() {
                self.selected = None;
            }
        }
        if self
            .anchor
            .as_ref()
            .is_some_and(|(id, _)| !tree.contains(id))
        {
            self.anchor = None;
            self.gesture = false;
        }
    }

    /// Selected ids in render order.
    pub fn ordered(&self, tree: &OutlineTree) -> Vec<EntryId> {
        let Some(s) = self.selected.as_ref() else {
            return vec![];
        };
        tree.visible_preorder()
            .into_iter()
            .filter(|id| s.contains(id))
            .collect()
    }
}

/// Path from the first level below the root down to `id`.
fn path(tree: &OutlineTree, id: &EntryId) -> Vec<EntryId> {
    let mut p = tree.ancestors(id);
    p.push(id.clone());
    p.into_iter().skip(1).collect()
}

fn sibling_run(tree: &OutlineTree, a: &EntryId, b: &EntryId) -> Option<BTreeSet<EntryId>> {
    let pa = path(tree, a);
    let pb = path(tree, b);
    let shared = pa.len().min(pb.len());
    if shared == 0 {
        return None;
    }

    let level = (0..shared)
        .rev()
        .find(|&i| i == 0 || pa[i - 1] == pb[i - 1])?;
    let (from, to) = (&pa[level], &pb[level]);
    let parent = tree.get(from)?.parent.clone()?;

    let siblings = tree.child_ids(&parent);
    let i = siblings.iter().position(|s| s == from)?;
    let j = siblings.iter().position(|s| s == to)?;
    let (lo, hi) = if i <= j { (i, j) } else { (j, i) };
    Some(siblings[lo..=hi].iter().cloned().collect())
}
