//! The single owner of outline state.
//!
//! Controllers never mutate the tree. They emit `Intent`s into the queue owned here, and the
//! host drains it with `process` after each event. Every tree mutation goes through `apply`,
//! which either applies an intent fully or rejects it without side effects.

use crate::config::OutlineConfig;
use crate::models::{utf16_len, EntryId, EntryRecord, FocusDirective};
use crate::outline::controller::{Ambient, ControllerCtx, EntryProps};
use crate::outline::debounce::Debouncer;
use crate::outline::drag::{DragSession, DragState};
use crate::outline::error::{OutlineError, OutlineResult, StructuralConflict};
use crate::outline::geometry::{DropPlacement, DropTarget, GeometryRegistry, GeometryTracker};
use crate::outline::intent::Intent;
use crate::outline::selection::SelectionState;
use crate::outline::tree::{OutlineTree, Slot};
use std::collections::VecDeque;

/// Hands out ids for new entries: `{prefix}-{n}`, skipping ids already in the tree.
#[derive(Clone, Debug)]
pub(crate) struct IdAllocator {
    prefix: String,
    next: u64,
}

impl IdAllocator {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            next: 1,
        }
    }

    pub fn allocate(&mut self, tree: &OutlineTree) -> EntryId {
        loop {
            let id = EntryId::new(format!("{}-{}", self.prefix, self.next));
            self.next += 1;
            if !tree.contains(&id) {
                return id;
            }
        }
    }
}

#[derive(Clone, Debug)]
pub(crate) struct Outline {
    tree: OutlineTree,
    selection: SelectionState,
    drag: DragState,
    geometry: GeometryRegistry,
    timers: Debouncer,
    queue: VecDeque<Intent>,
    ids: IdAllocator,
    config: OutlineConfig,
    revision: u64,
    saved_revision: u64,
    /// Bumped with every revision and whenever on-screen regions may have moved.
    layout_epoch: u64,
}

impl Outline {
    fn with_tree(config: OutlineConfig, tree: OutlineTree, id_prefix: &str) -> Self {
        Self {
            tree,
            selection: SelectionState::default(),
            drag: DragState::default(),
            geometry: GeometryRegistry::new(),
            timers: Debouncer::new(config.debounce_ms),
            queue: VecDeque::new(),
            ids: IdAllocator::new(id_prefix),
            config,
            revision: 0,
            saved_revision: 0,
            layout_epoch: 0,
        }
    }

    /// An empty outline: the root plus one empty, focused entry.
    pub fn seeded(config: OutlineConfig, id_prefix: &str) -> Self {
        let tree = OutlineTree::with_min_gap(config.min_position_gap);
        let mut outline = Self::with_tree(config, tree, id_prefix);
        outline.ensure_editable();
        outline
    }

    /// Rebuilds an outline from persisted records.
    pub fn restore(config: OutlineConfig, records: &[EntryRecord], id_prefix: &str) -> OutlineResult<Self> {
        let tree = OutlineTree::from_records(records, config.min_position_gap)?;
        let mut outline = Self::with_tree(config, tree, id_prefix);
        outline.ensure_editable();
        Ok(outline)
    }

    /// A root with no entries has nothing to type into.
    fn ensure_editable(&mut self) {
        if !self.tree.child_ids(self.tree.root_id()).is_empty() {
            return;
        }
        let id = self.ids.allocate(&self.tree);
        let root = self.tree.root_id().clone();
        if self.tree.append(&root, id.clone(), "").is_ok() {
            self.tree.set_focus(&id, FocusDirective::default());
        }
    }

    pub fn tree(&self) -> &OutlineTree {
        &self.tree
    }

    pub fn config(&self) -> &OutlineConfig {
        &self.config
    }

    pub fn selection(&self) -> &SelectionState {
        &self.selection
    }

    pub fn drag_session(&self) -> Option<&DragSession> {
        self.drag.session()
    }

    pub fn geometry(&self) -> &GeometryRegistry {
        &self.geometry
    }

    pub fn timers(&self) -> &Debouncer {
        &self.timers
    }

    pub fn ambient(&self) -> Ambient<'_> {
        Ambient {
            selection: self.selection.selected(),
            dragged: self.drag.dragged(),
        }
    }

    /// Bumped on every successful tree mutation.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn is_dirty(&self) -> bool {
        self.revision != self.saved_revision
    }

    pub fn mark_saved(&mut self) {
        self.saved_revision = self.revision;
    }

    pub fn records(&self) -> Vec<EntryRecord> {
        self.tree.records()
    }

    pub fn props_for(&self, id: &EntryId, chain: Vec<EntryId>) -> Option<EntryProps> {
        EntryProps::from_tree(&self.tree, id, chain, self.layout_epoch)
    }

    pub fn root_props(&self) -> Option<EntryProps> {
        self.props_for(self.tree.root_id(), vec![])
    }

    /// Borrows the pieces a controller may touch during one event.
    pub fn controller_ctx(&mut self, now_ms: u64) -> ControllerCtx<'_> {
        ControllerCtx {
            tracker: &mut self.geometry,
            timers: &mut self.timers,
            sink: &mut self.queue,
            now_ms,
        }
    }

    /// Drops an entry's geometry and pending commit without going through its controller.
    pub fn forget(&mut self, id: &EntryId) {
        self.geometry.clear(id);
        self.timers.cancel(id);
    }

    pub fn enqueue(&mut self, intent: Intent) {
        self.queue.push_back(intent);
    }

    pub fn pending_intents(&self) -> usize {
        self.queue.len()
    }

    /// Makes every mounted entry re-measure its regions on the next sync (scroll, resize).
    pub fn invalidate_layout(&mut self) {
        self.layout_epoch += 1;
    }

    /// Drains the intent queue without access to live text. Returns how many intents were
    /// handled.
    pub fn process(&mut self) -> usize {
        self.process_with(|_| None)
    }

    /// Drains the intent queue. Returns how many intents were handled.
    ///
    /// `live_text` reads an entry's on-screen text. Before a structural intent is applied,
    /// every entry still waiting on a debounced commit is committed from it, so a merge or
    /// move never works from stale text. Rejected intents are logged and dropped; they never
    /// leave partial changes behind.
    pub fn process_with(&mut self, live_text: impl Fn(&EntryId) -> Option<String>) -> usize {
        let mut handled = 0;
        while let Some(intent) = self.queue.pop_front() {
            handled += 1;
            if intent.is_structural() {
                self.flush_pending(&live_text);
            }
            match self.apply(&intent) {
                Ok(()) => {}
                Err(OutlineError::DragInProgress) => {
                    log::warn!("drag start ignored, a drag is already active: {intent:?}");
                }
                Err(e) => log::debug!("intent rejected: {e} ({intent:?})"),
            }
        }
        handled
    }

    pub fn apply(&mut self, intent: &Intent) -> OutlineResult<()> {
        match intent {
            Intent::ToggleCollapse { id, collapsed } => {
                self.tree.set_collapsed(id, *collapsed)?;
                self.bump();
            }
            Intent::StartDrag {
                id,
                client_x,
                client_y,
            } => self.start_drag(id, *client_x, *client_y)?,
            Intent::DragMove { client_x, client_y } => {
                let hover = self.drop_target(*client_x, *client_y);
                self.drag.update(*client_x, *client_y, hover)?;
            }
            Intent::Drop { client_x, client_y } => self.drop_at(*client_x, *client_y)?,
            Intent::CancelDrag => {
                if self.drag.take().is_some() {
                    log::debug!("drag cancelled");
                }
            }
            Intent::StartSelect { id, depth } => self.selection.start(id.clone(), *depth),
            Intent::SelectOver { id } => {
                self.selection.over(&self.tree, id);
            }
            Intent::EndSelect => self.selection.end(),
            Intent::ClearSelection => self.selection.clear(),
            Intent::CreateEntry {
                parent,
                after,
                position,
                after_text,
            } => self.create_entry(parent, after, *position, after_text)?,
            Intent::DeleteEntry {
                depth,
                id,
                text,
                caret,
            } => {
                log::debug!("merging {id} (depth {depth}, caret {caret}) into previous entry");
                self.timers.cancel(id);
                self.commit_text(id, text)?;
                let merged = self.tree.merge_into_previous(id, text)?;
                self.tree.set_focus(
                    &merged.target,
                    FocusDirective {
                        caret: Some(merged.caret),
                    },
                );
                self.selection.retain(&self.tree);
                self.bump();
            }
            Intent::Indent { id, text, caret } => {
                self.timers.cancel(id);
                self.commit_text(id, text)?;
                self.tree.indent(id)?;
                self.finish_move(id, text, *caret);
            }
            Intent::Outdent { id, text, caret } => {
                self.timers.cancel(id);
                self.commit_text(id, text)?;
                self.tree.outdent(id)?;
                self.finish_move(id, text, *caret);
            }
            Intent::NodeFocused { id } => {
                self.tree.clear_focus(id);
            }
            Intent::CommitText { id, text } => {
                if !self.tree.contains(id) {
                    log::debug!("commit for removed entry {id} dropped");
                    return Ok(());
                }
                self.commit_text(id, text)?;
            }
        }
        Ok(())
    }

    fn bump(&mut self) {
        self.revision += 1;
        self.layout_epoch += 1;
    }

    fn flush_pending(&mut self, live_text: &impl Fn(&EntryId) -> Option<String>) {
        for id in self.timers.pending_ids() {
            let Some(text) = live_text(&id) else {
                continue;
            };
            self.timers.cancel(&id);
            if !self.tree.contains(&id) {
                continue;
            }
            if let Err(e) = self.commit_text(&id, &text) {
                log::debug!("flushing pending commit for {id} failed: {e}");
            }
        }
    }

    /// Stores `text` when it differs. Applied before structural ops so a rejected op keeps the
    /// typing whose commit it cancelled.
    fn commit_text(&mut self, id: &EntryId, text: &str) -> OutlineResult<()> {
        let unchanged = self.tree.get(id).is_some_and(|e| e.text == text);
        if !unchanged {
            self.tree.set_text(id, text)?;
            self.bump();
        }
        Ok(())
    }

    fn create_entry(&mut self, parent: &EntryId, after: &EntryId, position: f64, after_text: &str) -> OutlineResult<()> {
        let anchor = self
            .tree
            .get(after)
            .ok_or_else(|| StructuralConflict::NotFound(after.clone()))?;
        if anchor.parent.as_ref() != Some(parent) {
            return Err(StructuralConflict::NotFound(after.clone()).into());
        }
        self.timers.cancel(after);
        self.commit_text(after, after_text)?;

        let id = self.ids.allocate(&self.tree);
        if self.tree.is_free_slot(parent, after, position) {
            self.tree.insert(parent, id.clone(), "", position)?;
        } else {
            log::debug!("position {position} after {after} is taken, renumbering");
            self.tree.insert_after(after, id.clone(), "")?;
        }
        self.tree.set_focus(&id, FocusDirective::default());
        self.bump();
        Ok(())
    }

    fn finish_move(&mut self, id: &EntryId, text: &str, caret: Option<usize>) {
        let caret = caret.map(|c| c.min(utf16_len(text)));
        self.tree.set_focus(id, FocusDirective { caret });
        self.bump();
    }

    fn start_drag(&mut self, id: &EntryId, x: f64, y: f64) -> OutlineResult<()> {
        if self.drag.is_active() {
            return Err(OutlineError::DragInProgress);
        }
        if *id == *self.tree.root_id() {
            return Err(StructuralConflict::RootImmutable.into());
        }
        if !self.tree.contains(id) {
            return Err(StructuralConflict::NotFound(id.clone()).into());
        }

        let nodes = if self.selection.contains(id) {
            self.selection.ordered(&self.tree)
        } else {
            vec![id.clone()]
        };
        self.selection.end();
        self.drag.start(nodes, x, y)?;
        // Hit-testing needs fresh regions; the page may have scrolled since they were taken.
        self.invalidate_layout();
        Ok(())
    }

    /// Hit-tests the registered geometry, skipping the dragged entries and their subtrees.
    pub fn drop_target(&self, x: f64, y: f64) -> Option<DropTarget> {
        let dragged = self.drag.dragged()?;
        self.geometry.hit_test(x, y, self.config.drop_nest_threshold_px, |id| {
            self.tree.contains(id)
                && id != self.tree.root_id()
                && !dragged.iter().any(|d| self.tree.is_within(id, d))
        })
    }

    fn drop_at(&mut self, x: f64, y: f64) -> OutlineResult<()> {
        let target = self.drop_target(x, y);
        let session = self.drag.take().ok_or(OutlineError::NoDragSession)?;
        let Some(target) = target else {
            log::debug!("drop at ({x}, {y}) has no target, cancelling");
            return Ok(());
        };

        let slot = self.slot_for(&target, &session.nodes)?;
        let moved = self.tree.move_entries(&session.nodes, &slot)?;
        if target.placement == DropPlacement::Inside {
            self.tree.set_collapsed(&target.id, false)?;
        }
        for id in &moved {
            for sub in self.tree.subtree_ids(id) {
                self.timers.cancel(&sub);
            }
        }
        log::debug!("dropped {} entries {} {}", moved.len(), target.placement, target.id);
        self.bump();
        Ok(())
    }

    fn slot_for(&self, target: &DropTarget, moving: &[EntryId]) -> OutlineResult<Slot> {
        if target.placement == DropPlacement::Inside {
            return Ok(Slot {
                parent: target.id.clone(),
                after: None,
            });
        }

        let parent = self
            .tree
            .get(&target.id)
            .and_then(|e| e.parent.clone())
            .ok_or(StructuralConflict::RootImmutable)?;
        let after = match target.placement {
            DropPlacement::After => Some(target.id.clone()),
            _ => {
                let siblings = self
                    .tree
                    .child_ids(&parent)
                    .into_iter()
                    .filter(|s| !moving.contains(s))
                    .collect::<Vec<_>>();
                let idx = siblings
                    .iter()
                    .position(|s| *s == target.id)
                    .ok_or_else(|| StructuralConflict::NotFound(target.id.clone()))?;
                idx.checked_sub(1).map(|i| siblings[i].clone())
            }
        };
        Ok(Slot { parent, after })
    }
}
