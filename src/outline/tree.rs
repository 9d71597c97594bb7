//! Arena-backed outline tree.
//!
//! Entries live in a map keyed by id; each entry keeps its parent id and the ids of its
//! children. Reparenting re-keys those links in one `&mut self` call, so a render never sees
//! a node under two parents or under none.

use crate::models::{utf16_len, EntryId, EntryRecord, FocusDirective};
use crate::outline::error::{OutlineError, StructuralConflict};
use crate::outline::position::{self, cmp_positions, MIN_POSITION_GAP};
use std::collections::{HashMap, HashSet};

type TreeResult<T> = Result<T, StructuralConflict>;

#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Entry {
    pub id: EntryId,
    pub parent: Option<EntryId>,
    pub text: String,
    pub position: f64,
    pub collapsed: bool,

    /// Child ids in insertion order. Never rendered as-is; see `OutlineTree::child_ids`.
    pub children: Vec<EntryId>,

    /// Transient; never persisted.
    pub focus: Option<FocusDirective>,
}

impl Entry {
    fn new(id: EntryId, parent: Option<EntryId>, text: String, position: f64) -> Self {
        Self {
            id,
            parent,
            text,
            position,
            collapsed: false,
            children: vec![],
            focus: None,
        }
    }

    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }
}

/// Insertion point among a parent's children: directly after `after`, or first when `None`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Slot {
    pub parent: EntryId,
    pub after: Option<EntryId>,
}

/// Result of merging a deleted entry into the entry rendered before it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct MergeOutcome {
    pub removed: EntryId,
    pub target: EntryId,
    /// Caret offset in the target where the merged text begins.
    pub caret: usize,
}

#[derive(Clone, Debug)]
pub(crate) struct OutlineTree {
    entries: HashMap<EntryId, Entry>,
    root: EntryId,
    min_gap: f64,
}

impl Default for OutlineTree {
    fn default() -> Self {
        Self::new()
    }
}

impl OutlineTree {
    pub fn new() -> Self {
        Self::with_min_gap(MIN_POSITION_GAP)
    }

    pub fn with_min_gap(min_gap: f64) -> Self {
        let root = EntryId::root();
        let mut entries = HashMap::new();
        entries.insert(root.clone(), Entry::new(root.clone(), None, String::new(), 0.0));
        Self {
            entries,
            root,
            min_gap,
        }
    }

    pub fn root_id(&self) -> &EntryId {
        &self.root
    }

    pub fn get(&self, id: &EntryId) -> Option<&Entry> {
        self.entries.get(id)
    }

    pub fn contains(&self, id: &EntryId) -> bool {
        self.entries.contains_key(id)
    }

    /// Number of entries, root included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    fn entry(&self, id: &EntryId) -> TreeResult<&Entry> {
        self.entries
            .get(id)
            .ok_or_else(|| StructuralConflict::NotFound(id.clone()))
    }

    fn entry_mut(&mut self, id: &EntryId) -> TreeResult<&mut Entry> {
        self.entries
            .get_mut(id)
            .ok_or_else(|| StructuralConflict::NotFound(id.clone()))
    }

    fn non_root(&self, id: &EntryId) -> TreeResult<&Entry> {
        if *id == self.root {
            return Err(StructuralConflict::RootImmutable);
        }
        self.entry(id)
    }

    /// Children of `id` sorted by position. Does not touch stored order.
    pub fn sorted_children(&self, id: &EntryId) -> Vec<&Entry> {
        let Some(e) = self.entries.get(id) else {
            return vec![];
        };
        let mut kids = e
            .children
            .iter()
            .filter_map(|c| self.entries.get(c))
            .collect::<Vec<_>>();
        kids.sort_by(|a, b| cmp_positions(a.position, b.position));
        kids
    }

    pub fn child_ids(&self, id: &EntryId) -> Vec<EntryId> {
        self.sorted_children(id)
            .into_iter()
            .map(|e| e.id.clone())
            .collect()
    }

    /// Sorted siblings of `id` (including itself).
    fn siblings(&self, id: &EntryId) -> TreeResult<Vec<&Entry>> {
        let me = self.entry(id)?;
        let Some(parent) = me.parent.as_ref() else {
            return Ok(vec![me]);
        };
        Ok(self.sorted_children(parent))
    }

    pub fn previous_sibling(&self, id: &EntryId) -> Option<EntryId> {
        let sibs = self.siblings(id).ok()?;
        let idx = sibs.iter().position(|e| e.id == *id)?;
        idx.checked_sub(1).map(|i| sibs[i].id.clone())
    }

    pub fn next_sibling(&self, id: &EntryId) -> Option<EntryId> {
        let sibs = self.siblings(id).ok()?;
        let idx = sibs.iter().position(|e| e.id == *id)?;
        sibs.get(idx + 1).map(|e| e.id.clone())
    }

    pub fn next_sibling_position(&self, id: &EntryId) -> Option<f64> {
        self.next_sibling(id)
            .and_then(|n| self.entries.get(&n))
            .map(|e| e.position)
    }

    /// Depth below the root (root = 0).
    pub fn depth(&self, id: &EntryId) -> Option<usize> {
        let mut depth = 0;
        let mut cur = self.entries.get(id)?;
        while let Some(p) = cur.parent.as_ref() {
            cur = self.entries.get(p)?;
            depth += 1;
        }
        Some(depth)
    }

    /// Ancestor ids from the root down to (not including) `id`.
    pub fn ancestors(&self, id: &EntryId) -> Vec<EntryId> {
        let mut out = vec![];
        let mut cur = self.entries.get(id).and_then(|e| e.parent.clone());
        while let Some(p) = cur {
            cur = self.entries.get(&p).and_then(|e| e.parent.clone());
            out.push(p);
        }
        out.reverse();
        out
    }

    /// True when `candidate` is `ancestor` or lies anywhere below it.
    pub fn is_within(&self, candidate: &EntryId, ancestor: &EntryId) -> bool {
        let mut cur = Some(candidate.clone());
        while let Some(id) = cur {
            if id == *ancestor {
                return true;
            }
            cur = self.entries.get(&id).and_then(|e| e.parent.clone());
        }
        false
    }

    pub fn subtree_ids(&self, id: &EntryId) -> Vec<EntryId> {
        fn walk(tree: &OutlineTree, id: &EntryId, out: &mut Vec<EntryId>) {
            out.push(id.clone());
            for c in tree.child_ids(id) {
                walk(tree, &c, out);
            }
        }

        let mut out = vec![];
        if self.contains(id) {
            walk(self, id, &mut out);
        }
        out
    }

    /// Non-root ids in render order, skipping children of collapsed entries.
    pub fn visible_preorder(&self) -> Vec<EntryId> {
        fn collect(tree: &OutlineTree, parent: &EntryId, out: &mut Vec<EntryId>) {
            for e in tree.sorted_children(parent) {
                out.push(e.id.clone());
                if !e.collapsed {
                    collect(tree, &e.id, out);
                }
            }
        }

        let mut out = vec![];
        collect(self, &self.root, &mut out);
        out
    }

    /// The entry rendered immediately before `id`, if any.
    pub fn previous_visible(&self, id: &EntryId) -> Option<EntryId> {
        let visible = self.visible_preorder();
        let idx = visible.iter().position(|v| v == id)?;
        idx.checked_sub(1).map(|i| visible[i].clone())
    }

    fn position_taken(&self, parent: &EntryId, position: f64, except: Option<&EntryId>) -> bool {
        self.entries.get(parent).is_some_and(|p| {
            p.children.iter().any(|c| {
                Some(c) != except
                    && self
                        .entries
                        .get(c)
                        .is_some_and(|e| e.position == position)
            })
        })
    }

    fn check_position(&self, parent: &EntryId, position: f64, except: Option<&EntryId>) -> TreeResult<()> {
        if !position.is_finite() {
            return Err(StructuralConflict::InvalidPosition(position));
        }
        if self.position_taken(parent, position, except) {
            return Err(StructuralConflict::DuplicatePosition {
                parent: parent.clone(),
                position,
            });
        }
        Ok(())
    }

    /// Inserts a new entry under `parent` at an explicit position.
    pub fn insert(
        &mut self,
        parent: &EntryId,
        id: EntryId,
        text: impl Into<String>,
        position: f64,
    ) -> TreeResult<()> {
        self.entry(parent)?;
        if self.contains(&id) {
            return Err(StructuralConflict::DuplicateId(id));
        }
        self.check_position(parent, position, None)?;

        self.entry_mut(parent)?.children.push(id.clone());
        self.entries.insert(
            id.clone(),
            Entry::new(id, Some(parent.clone()), text.into(), position),
        );
        Ok(())
    }

    /// Inserts a new entry as the sibling directly after `after`, renumbering if needed.
    pub fn insert_after(&mut self, after: &EntryId, id: EntryId, text: impl Into<String>) -> TreeResult<f64> {
        let parent = self
            .non_root(after)?
            .parent
            .clone()
            .ok_or(StructuralConflict::RootImmutable)?;
        let positions = self.slot_positions(
            &Slot {
                parent: parent.clone(),
                after: Some(after.clone()),
            },
            &[],
            1,
        )?;
        let position = positions[0];
        self.insert(&parent, id, text, position)?;
        Ok(position)
    }

    /// Appends a new entry as the last child of `parent`.
    pub fn append(&mut self, parent: &EntryId, id: EntryId, text: impl Into<String>) -> TreeResult<f64> {
        let after = self.child_ids(parent).last().cloned();
        let positions = self.slot_positions(
            &Slot {
                parent: parent.clone(),
                after,
            },
            &[],
            1,
        )?;
        let position = positions[0];
        self.insert(parent, id, text, position)?;
        Ok(position)
    }

    /// Reassigns `1, 2, 3, ...` to the children of `parent` in their current order.
    pub fn renumber(&mut self, parent: &EntryId) {
        self.renumber_except(parent, &[]);
    }

    fn renumber_except(&mut self, parent: &EntryId, skip: &[EntryId]) {
        let ids = self
            .child_ids(parent)
            .into_iter()
            .filter(|c| !skip.contains(c))
            .collect::<Vec<_>>();
        for (id, pos) in ids.iter().zip(position::renumbered(ids.len())) {
            if let Some(e) = self.entries.get_mut(id) {
                e.position = pos;
            }
        }
        log::debug!("renumbered {} children of {parent}", ids.len());
    }

    /// Neighbour positions around `slot`, ignoring `moving`.
    fn slot_bounds(&self, slot: &Slot, moving: &[EntryId]) -> TreeResult<(Option<f64>, Option<f64>)> {
        let sibs = self
            .sorted_children(&slot.parent)
            .into_iter()
            .filter(|e| !moving.contains(&e.id))
            .collect::<Vec<_>>();

        let idx = match slot.after.as_ref() {
            None => 0,
            Some(a) => {
                sibs.iter()
                    .position(|e| e.id == *a)
                    .ok_or_else(|| StructuralConflict::NotFound(a.clone()))?
                    + 1
            }
        };

        let prev = idx.checked_sub(1).map(|i| sibs[i].position);
        let next = sibs.get(idx).map(|e| e.position);
        Ok((prev, next))
    }

    /// `count` fresh positions for `slot`. Renumbers the parent when the gap is exhausted.
    fn slot_positions(&mut self, slot: &Slot, moving: &[EntryId], count: usize) -> TreeResult<Vec<f64>> {
        let (prev, next) = self.slot_bounds(slot, moving)?;
        if let Some(xs) = position::spread(prev, next, count, self.min_gap) {
            return Ok(xs);
        }

        self.renumber_except(&slot.parent, moving);
        let (prev, next) = self.slot_bounds(slot, moving)?;
        position::spread(prev, next, count, self.min_gap).ok_or(StructuralConflict::InvalidPosition(
            prev.or(next).unwrap_or_default(),
        ))
    }

    /// Position for a new sibling right after `id`, renumbering the parent if needed.
    pub fn position_after(&mut self, id: &EntryId) -> TreeResult<f64> {
        let parent = self
            .non_root(id)?
            .parent
            .clone()
            .ok_or(StructuralConflict::RootImmutable)?;
        let xs = self.slot_positions(
            &Slot {
                parent,
                after: Some(id.clone()),
            },
            &[],
            1,
        )?;
        Ok(xs[0])
    }

    /// Whether `position` can be inserted directly after `after` under `parent` as-is.
    pub fn is_free_slot(&self, parent: &EntryId, after: &EntryId, position: f64) -> bool {
        let Ok((prev, next)) = self.slot_bounds(
            &Slot {
                parent: parent.clone(),
                after: Some(after.clone()),
            },
            &[],
        ) else {
            return false;
        };
        position.is_finite()
            && prev.is_none_or(|p| position > p)
            && next.is_none_or(|n| position < n)
    }

    pub fn set_text(&mut self, id: &EntryId, text: impl Into<String>) -> TreeResult<()> {
        self.non_root(id)?;
        self.entry_mut(id)?.text = text.into();
        Ok(())
    }

    pub fn set_collapsed(&mut self, id: &EntryId, collapsed: bool) -> TreeResult<()> {
        self.non_root(id)?;
        self.entry_mut(id)?.collapsed = collapsed;
        Ok(())
    }

    /// Sets a focus directive. Returns `false` when the target no longer exists.
    pub fn set_focus(&mut self, id: &EntryId, directive: FocusDirective) -> bool {
        match self.entries.get_mut(id) {
            Some(e) if *id != self.root => {
                e.focus = Some(directive);
                true
            }
            _ => false,
        }
    }

    /// Clears a consumed focus directive. Returns `false` when there was nothing to clear.
    pub fn clear_focus(&mut self, id: &EntryId) -> bool {
        self.entries
            .get_mut(id)
            .and_then(|e| e.focus.take())
            .is_some()
    }

    /// Moves `id` (with its subtree) under `new_parent` at an explicit position.
    pub fn move_entry(&mut self, id: &EntryId, new_parent: &EntryId, position: f64) -> TreeResult<()> {
        self.non_root(id)?;
        self.entry(new_parent)?;
        if self.is_within(new_parent, id) {
            return Err(StructuralConflict::SelfParenting {
                id: id.clone(),
                parent: new_parent.clone(),
            });
        }
        self.check_position(new_parent, position, Some(id))?;

        self.reattach(id, new_parent, position);
        Ok(())
    }

    /// Moves several entries into `slot`, keeping their given order. All-or-nothing.
    ///
    /// Entries whose ancestor is also being moved travel with that ancestor.
    pub fn move_entries(&mut self, ids: &[EntryId], slot: &Slot) -> TreeResult<Vec<EntryId>> {
        self.entry(&slot.parent)?;
        for id in ids {
            self.non_root(id)?;
            if self.is_within(&slot.parent, id) {
                return Err(StructuralConflict::SelfParenting {
                    id: id.clone(),
                    parent: slot.parent.clone(),
                });
            }
        }

        let tops = ids
            .iter()
            .filter(|id| {
                !self
                    .ancestors(id)
                    .iter()
                    .any(|a| ids.contains(a))
            })
            .fold(Vec::<EntryId>::new(), |mut acc, id| {
                if !acc.contains(id) {
                    acc.push(id.clone());
                }
                acc
            });

        if let Some(a) = slot.after.as_ref() {
            if tops.contains(a) {
                return Err(StructuralConflict::SelfParenting {
                    id: a.clone(),
                    parent: slot.parent.clone(),
                });
            }
            let under_parent = self.entry(a)?.parent.as_ref() == Some(&slot.parent);
            if !under_parent {
                return Err(StructuralConflict::NotFound(a.clone()));
            }
        }

        let positions = self.slot_positions(slot, &tops, tops.len())?;
        for (id, pos) in tops.iter().zip(positions) {
            self.reattach(id, &slot.parent, pos);
        }
        Ok(tops)
    }

    fn reattach(&mut self, id: &EntryId, new_parent: &EntryId, position: f64) {
        let old_parent = self.entries.get(id).and_then(|e| e.parent.clone());
        if let Some(op) = old_parent.and_then(|p| self.entries.get_mut(&p)) {
            op.children.retain(|c| c != id);
        }
        if let Some(np) = self.entries.get_mut(new_parent) {
            np.children.push(id.clone());
        }
        if let Some(e) = self.entries.get_mut(id) {
            e.parent = Some(new_parent.clone());
            e.position = position;
        }
    }

    /// Makes `id` the last child of its previous sibling.
    pub fn indent(&mut self, id: &EntryId) -> TreeResult<EntryId> {
        self.non_root(id)?;
        let prev = self
            .previous_sibling(id)
            .ok_or_else(|| StructuralConflict::NoPreviousEntry(id.clone()))?;
        let after = self.child_ids(&prev).last().cloned();
        self.move_entries(
            std::slice::from_ref(id),
            &Slot {
                parent: prev.clone(),
                after,
            },
        )?;
        self.entry_mut(&prev)?.collapsed = false;
        Ok(prev)
    }

    /// Makes `id` the sibling directly after its parent.
    pub fn outdent(&mut self, id: &EntryId) -> TreeResult<EntryId> {
        let parent = self
            .non_root(id)?
            .parent
            .clone()
            .ok_or(StructuralConflict::RootImmutable)?;
        let grandparent = self
            .entry(&parent)?
            .parent
            .clone()
            .ok_or(StructuralConflict::RootImmutable)?;
        self.move_entries(
            std::slice::from_ref(id),
            &Slot {
                parent: grandparent.clone(),
                after: Some(parent),
            },
        )?;
        Ok(grandparent)
    }

    /// Removes `id` and its whole subtree.
    pub fn remove_subtree(&mut self, id: &EntryId) -> TreeResult<Vec<EntryId>> {
        let parent = self.non_root(id)?.parent.clone();
        let ids = self.subtree_ids(id);
        if let Some(p) = parent.and_then(|p| self.entries.get_mut(&p)) {
            p.children.retain(|c| c != id);
        }
        for x in &ids {
            self.entries.remove(x);
        }
        Ok(ids)
    }

    /// Deletes `id`, appending `text` to the entry rendered before it.
    ///
    /// The deleted entry's children move to the merge target: after its own children when the
    /// target is an earlier entry, or into the deleted entry's slot when the target is the
    /// parent.
    pub fn merge_into_previous(&mut self, id: &EntryId, text: &str) -> TreeResult<MergeOutcome> {
        let me = self.non_root(id)?;
        let parent = me.parent.clone().ok_or(StructuralConflict::RootImmutable)?;
        let kids = self.child_ids(id);
        let target = self
            .previous_visible(id)
            .ok_or_else(|| StructuralConflict::NoPreviousEntry(id.clone()))?;

        let slot = if target == parent {
            Slot {
                parent: parent.clone(),
                after: self.previous_sibling(id),
            }
        } else {
            Slot {
                after: self.child_ids(&target).last().cloned(),
                parent: target,
            }
        };

        let caret = utf16_len(&self.entry(&slot.parent)?.text);
        if slot.parent != parent {
            self.entry_mut(&slot.parent)?.collapsed = false;
        }

        // Detach first so the freed slot can be reused by the children.
        self.entry_mut(&parent)?.children.retain(|c| c != id);
        if !kids.is_empty() {
            let positions = self.slot_positions(&slot, &kids, kids.len())?;
            for (kid, pos) in kids.iter().zip(positions) {
                if let Some(e) = self.entries.get_mut(kid) {
                    e.parent = Some(slot.parent.clone());
                    e.position = pos;
                }
                if let Some(p) = self.entries.get_mut(&slot.parent) {
                    p.children.push(kid.clone());
                }
            }
        }
        self.entries.remove(id);
        self.entry_mut(&slot.parent)?.text.push_str(text);

        Ok(MergeOutcome {
            removed: id.clone(),
            target: slot.parent,
            caret,
        })
    }

    /// Flat records for persistence, root first, then render order.
    pub fn records(&self) -> Vec<EntryRecord> {
        let mut ids = vec![self.root.clone()];
        ids.extend(self.subtree_ids(&self.root).into_iter().skip(1));
        ids.iter()
            .filter_map(|id| self.entries.get(id))
            .map(|e| EntryRecord {
                id: e.id.clone(),
                parent: e.parent.clone(),
                text: e.text.clone(),
                position: e.position,
                collapsed: e.collapsed,
            })
            .collect()
    }

    /// Rebuilds a tree from flat records. The whole set is rejected if any invariant fails.
    pub fn from_records(records: &[EntryRecord], min_gap: f64) -> Result<Self, OutlineError> {
        let roots = records.iter().filter(|r| r.parent.is_none()).collect::<Vec<_>>();
        let [root] = roots.as_slice() else {
            return Err(OutlineError::Snapshot(format!(
                "expected exactly one root, found {}",
                roots.len()
            )));
        };

        let mut entries: HashMap<EntryId, Entry> = HashMap::new();
        for r in records {
            let mut e = Entry::new(r.id.clone(), r.parent.clone(), r.text.clone(), r.position);
            e.collapsed = r.collapsed;
            if entries.insert(r.id.clone(), e).is_some() {
                return Err(OutlineError::Snapshot(format!("duplicate id {}", r.id)));
            }
        }
        for r in records {
            let Some(parent) = r.parent.as_ref() else {
                continue;
            };
            let Some(p) = entries.get_mut(parent) else {
                return Err(OutlineError::Snapshot(format!(
                    "entry {} references missing parent {parent}",
                    r.id
                )));
            };
            p.children.push(r.id.clone());
        }

        let tree = Self {
            entries,
            root: root.id.clone(),
            min_gap,
        };
        tree.check_invariants().map_err(OutlineError::Snapshot)?;
        Ok(tree)
    }

    /// Verifies parent/child links, reachability and sibling position uniqueness.
    pub fn check_invariants(&self) -> Result<(), String> {
        let root = self
            .entries
            .get(&self.root)
            .ok_or_else(|| "root missing".to_string())?;
        if root.parent.is_some() {
            return Err("root has a parent".to_string());
        }

        let mut seen = HashSet::new();
        let mut stack = vec![self.root.clone()];
        while let Some(id) = stack.pop() {
            if !seen.insert(id.clone()) {
                return Err(format!("entry {id} reachable twice"));
            }
            let e = self
                .entries
                .get(&id)
                .ok_or_else(|| format!("dangling child {id}"))?;

            let mut positions = Vec::with_capacity(e.children.len());
            for c in &e.children {
                let child = self
                    .entries
                    .get(c)
                    .ok_or_else(|| format!("dangling child {c} of {id}"))?;
                if child.parent.as_ref() != Some(&id) {
                    return Err(format!("child {c} does not point back to {id}"));
                }
                if !child.position.is_finite() {
                    return Err(format!("entry {c} has non-finite position"));
                }
                positions.push(child.position);
                stack.push(c.clone());
            }
            positions.sort_by(|a, b| cmp_positions(*a, *b));
            if positions.windows(2).any(|w| w[0] >= w[1]) {
                return Err(format!("duplicate sibling positions under {id}"));
            }
        }

        if seen.len() != self.entries.len() {
            return Err(format!(
                "{} entries unreachable from root",
                self.entries.len() - seen.len()
            ));
        }
        Ok(())
    }
}
