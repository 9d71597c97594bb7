//! Headless render loop for tests.
//!
//! `Harness` mounts one `EntryController` per rendered entry the way the component tree does:
//! root first, then visible entries in document order, unmounting entries that disappear.
//! Surfaces are fakes laid out as fixed 24px rows indented 24px per depth level.

use crate::models::EntryId;
use crate::outline::controller::{EntryController, EntryProps, Key, KeyOutcome, KeyPress, TextSurface};
use crate::outline::geometry::Rect;
use crate::outline::intent::Intent;
use crate::outline::orchestrator::Outline;
use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};

pub(crate) const ROW_HEIGHT: f64 = 24.0;
pub(crate) const INDENT: f64 = 24.0;
pub(crate) const ROW_WIDTH: f64 = 320.0;

#[derive(Debug, Default)]
pub(crate) struct FakeSurface {
    text: RefCell<String>,
    caret: Cell<Option<usize>>,
    focused: Cell<bool>,
    own: Cell<Option<Rect>>,
    children: Cell<Option<Rect>>,
}

impl FakeSurface {
    pub fn new(text: &str) -> Self {
        Self {
            text: RefCell::new(text.to_string()),
            own: Cell::new(Some(Rect::new(0.0, 0.0, ROW_WIDTH, ROW_HEIGHT))),
            ..Self::default()
        }
    }

    pub fn set_text(&self, text: &str) {
        *self.text.borrow_mut() = text.to_string();
    }

    pub fn set_caret(&self, caret: Option<usize>) {
        self.caret.set(caret);
    }

    pub fn caret(&self) -> Option<usize> {
        self.caret.get()
    }

    pub fn is_focused(&self) -> bool {
        self.focused.get()
    }

    pub fn blur(&self) {
        self.focused.set(false);
    }

    pub fn set_regions(&self, own: Option<Rect>, children: Option<Rect>) {
        self.own.set(own);
        self.children.set(children);
    }
}

impl TextSurface for FakeSurface {
    fn text(&self) -> String {
        self.text.borrow().clone()
    }

    fn caret_offset(&self) -> Option<usize> {
        self.caret.get()
    }

    fn set_caret_offset(&self, offset: usize) {
        self.caret.set(Some(offset));
        self.focused.set(true);
    }

    fn focus(&self) {
        self.focused.set(true);
    }

    fn own_region(&self) -> Option<Rect> {
        self.own.get()
    }

    fn children_region(&self) -> Option<Rect> {
        self.children.get()
    }
}

pub(crate) struct Harness {
    pub outline: Outline,
    controllers: HashMap<EntryId, EntryController>,
    surfaces: HashMap<EntryId, FakeSurface>,
    rendered: HashMap<EntryId, String>,
    /// Texts committed by debounce timers, in firing order.
    pub commits: Vec<(EntryId, String)>,
    pub now_ms: u64,
}

impl Harness {
    pub fn new(outline: Outline) -> Self {
        let mut h = Self {
            outline,
            controllers: HashMap::new(),
            surfaces: HashMap::new(),
            rendered: HashMap::new(),
            commits: vec![],
            now_ms: 0,
        };
        h.render();
        h
    }

    /// Renders, then drains intents emitted during the render, until quiescent.
    pub fn render(&mut self) {
        for _ in 0..8 {
            self.render_pass();
            if self.process() == 0 {
                break;
            }
        }
    }

    /// Drains intents the way the web host does, reading live text from the fake surfaces.
    fn process(&mut self) -> usize {
        let surfaces = &self.surfaces;
        self.outline.process_with(|id| surfaces.get(id).map(|s| s.text()))
    }

    fn rows(&self) -> Vec<EntryProps> {
        fn walk(outline: &Outline, props: EntryProps, out: &mut Vec<EntryProps>) {
            let expanded = props.is_root || !props.collapsed;
            let chain = props.child_chain();
            let children = props.children.clone();
            out.push(props);
            if expanded {
                for c in &children {
                    if let Some(p) = outline.props_for(c, chain.clone()) {
                        walk(outline, p, out);
                    }
                }
            }
        }

        let mut out = vec![];
        if let Some(root) = self.outline.root_props() {
            walk(&self.outline, root, &mut out);
        }
        out
    }

    fn render_pass(&mut self) {
        let rows = self.rows();
        let live = rows.iter().map(|p| p.id.clone()).collect::<HashSet<_>>();

        let gone = self
            .controllers
            .keys()
            .filter(|id| !live.contains(*id))
            .cloned()
            .collect::<Vec<_>>();
        for id in gone {
            if let Some(mut c) = self.controllers.remove(&id) {
                c.unmount(&mut self.outline.controller_ctx(self.now_ms));
            }
            self.surfaces.remove(&id);
            self.rendered.remove(&id);
        }

        for (i, props) in rows.iter().enumerate() {
            let surface = self
                .surfaces
                .entry(props.id.clone())
                .or_insert_with(|| FakeSurface::new(&props.text));
            if self.rendered.get(&props.id) != Some(&props.text) {
                surface.set_text(&props.text);
                self.rendered.insert(props.id.clone(), props.text.clone());
            }

            // Row 0 is the root, which has no row of its own.
            let row = i.saturating_sub(1) as f64;
            let left = props.depth.saturating_sub(1) as f64 * INDENT;
            let own = Rect::new(left, row * ROW_HEIGHT, ROW_WIDTH, ROW_HEIGHT);
            let below = rows[i + 1..]
                .iter()
                .take_while(|r| r.chain.contains(&props.id))
                .count() as f64;
            let children = (below > 0.0).then(|| {
                Rect::new(left + INDENT, (row + 1.0) * ROW_HEIGHT, ROW_WIDTH, below * ROW_HEIGHT)
            });
            surface.set_regions(Some(own), children);

            let controller = self
                .controllers
                .entry(props.id.clone())
                .or_insert_with(|| EntryController::new(props.id.clone()));
            controller.sync(
                props,
                Some(&*surface as &dyn TextSurface),
                &mut self.outline.controller_ctx(self.now_ms),
            );
        }
    }

    pub fn props(&self, id: &EntryId) -> EntryProps {
        let chain = self.outline.tree().ancestors(id);
        self.outline
            .props_for(id, chain)
            .unwrap_or_else(|| panic!("entry {id} should exist"))
    }

    pub fn surface(&self, id: &EntryId) -> &FakeSurface {
        self.surfaces
            .get(id)
            .unwrap_or_else(|| panic!("entry {id} should be mounted"))
    }

    pub fn is_mounted(&self, id: &EntryId) -> bool {
        self.controllers.get(id).is_some_and(|c| c.is_mounted())
    }

    pub fn mounted_non_root(&self) -> usize {
        let root = self.outline.tree().root_id();
        self.controllers
            .values()
            .filter(|c| c.is_mounted() && c.id() != root)
            .count()
    }

    /// Sends a key to an entry's controller, then processes and re-renders.
    pub fn press(&mut self, id: &EntryId, press: KeyPress) -> KeyOutcome {
        let props = self.props(id);
        let outcome = match self.controllers.get_mut(id) {
            Some(c) => c.on_key(
                &props,
                &press,
                self.surfaces.get(id).map(|s| s as &dyn TextSurface),
                &mut self.outline.controller_ctx(self.now_ms),
            ),
            None => KeyOutcome::default(),
        };
        self.process();
        self.render();
        outcome
    }

    /// Types `c` at the end of the entry's live text at the current clock.
    pub fn type_char(&mut self, id: &EntryId, c: char) -> KeyOutcome {
        let s = self.surface(id);
        let text = format!("{}{c}", s.text());
        s.set_text(&text);
        s.set_caret(Some(crate::models::utf16_len(&text)));
        self.press(id, KeyPress::plain(Key::Char(c)))
    }

    /// Advances the virtual clock, firing due commit timers in deadline order.
    pub fn advance_to(&mut self, t: u64) {
        loop {
            let due = self.outline.timers().due(t);
            if due.is_empty() {
                break;
            }
            for ticket in due {
                self.now_ms = self.now_ms.max(ticket.deadline_ms);
                let surface = self.surfaces.get(&ticket.id);
                let Some(c) = self.controllers.get_mut(&ticket.id) else {
                    continue;
                };
                let fired = c.on_timer(
                    &ticket,
                    surface.map(|s| s as &dyn TextSurface),
                    &mut self.outline.controller_ctx(self.now_ms),
                );
                if fired {
                    let text = surface.map(|s| s.text()).unwrap_or_default();
                    self.commits.push((ticket.id.clone(), text));
                }
            }
            self.process();
            self.render();
        }
        self.now_ms = t;
    }

    /// Runs a pointer handler of the entry's controller, then processes and re-renders.
    pub fn pointer(&mut self, id: &EntryId, f: impl FnOnce(&EntryController, &EntryProps, &mut Vec<Intent>)) {
        let props = self.props(id);
        let mut out = vec![];
        if let Some(c) = self.controllers.get(id) {
            f(c, &props, &mut out);
        }
        self.dispatch(out);
    }

    /// Feeds host-level intents (window pointer events) to the orchestrator.
    pub fn dispatch(&mut self, intents: Vec<Intent>) {
        for i in intents {
            self.outline.enqueue(i);
        }
        self.process();
        self.render();
    }

    /// Pointer coordinates inside `id`'s row, `x_offset` px right of its left edge.
    pub fn point(&self, id: &EntryId, upper_half: bool, x_offset: f64) -> (f64, f64) {
        let g = self
            .outline
            .geometry()
            .get(id)
            .unwrap_or_else(|| panic!("entry {id} should have geometry"));
        let y = if upper_half {
            g.own.top + 2.0
        } else {
            g.own.bottom() - 2.0
        };
        (g.own.left + x_offset, y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OutlineConfig;
    use crate::models::{EntryRecord, FocusDirective};

    fn id(s: &str) -> EntryId {
        EntryId::new(s)
    }

    fn rec(eid: &str, parent: Option<&str>, text: &str, position: f64) -> EntryRecord {
        EntryRecord {
            id: id(eid),
            parent: Some(parent.map(id).unwrap_or_else(EntryId::root)),
            text: text.to_string(),
            position,
            collapsed: false,
        }
    }

    fn harness(entries: Vec<EntryRecord>) -> Harness {
        let mut records = vec![EntryRecord {
            id: EntryId::root(),
            parent: None,
            text: String::new(),
            position: 0.0,
            collapsed: false,
        }];
        records.extend(entries);
        let outline = Outline::restore(OutlineConfig::default(), &records, "n").expect("valid records");
        Harness::new(outline)
    }

    fn assert_geometry_matches_mounts(h: &Harness) {
        assert_eq!(h.outline.geometry().len(), h.mounted_non_root());
        h.outline.tree().check_invariants().unwrap();
    }

    #[test]
    fn test_split_creates_focused_entry_between() {
        let mut h = harness(vec![rec("a", None, "A", 1.0), rec("b", None, "B", 2.0)]);
        h.surface(&id("a")).set_caret(Some(1));

        let out = h.press(&id("a"), KeyPress::plain(Key::Enter));
        assert!(out.prevent_default);

        let order = h.outline.tree().visible_preorder();
        assert_eq!(order.len(), 3);
        assert_eq!((&order[0], &order[2]), (&id("a"), &id("b")));
        let c = &order[1];
        let entry = h.outline.tree().get(c).unwrap();
        assert!(entry.text.is_empty());
        assert!(1.0 < entry.position && entry.position < 2.0);
        assert!(h.surface(c).is_focused());
        // Directive acknowledged and cleared.
        assert!(entry.focus.is_none());
        assert_geometry_matches_mounts(&h);
    }

    #[test]
    fn test_backspace_at_start_merges_with_caret_at_join() {
        let mut h = harness(vec![rec("a", None, "ab", 1.0), rec("b", None, "cd", 2.0)]);
        h.surface(&id("b")).set_caret(Some(0));

        h.press(&id("b"), KeyPress::plain(Key::Backspace));

        assert!(!h.outline.tree().contains(&id("b")));
        assert!(!h.is_mounted(&id("b")));
        assert_eq!(h.surface(&id("a")).text(), "abcd");
        assert_eq!(h.surface(&id("a")).caret(), Some(2));
        assert_geometry_matches_mounts(&h);
    }

    #[test]
    fn test_backspace_mid_text_never_deletes() {
        let mut h = harness(vec![rec("a", None, "ab", 1.0), rec("b", None, "cd", 2.0)]);
        h.surface(&id("b")).set_caret(Some(1));
        h.press(&id("b"), KeyPress::plain(Key::Backspace));
        assert!(h.outline.tree().contains(&id("b")));
    }

    #[test]
    fn test_burst_commits_once_with_final_text() {
        let mut h = harness(vec![rec("a", None, "", 1.0)]);
        // Each keystroke lands before the previous quiet period ends.
        for (t, c) in [(0, 'w'), (50, 'o'), (100, 'r'), (400, 'd')] {
            h.now_ms = t;
            h.type_char(&id("a"), c);
        }
        h.advance_to(699);
        assert!(h.commits.is_empty());
        h.advance_to(2_000);

        assert_eq!(h.commits, vec![(id("a"), "word".to_string())]);
        assert_eq!(h.outline.tree().get(&id("a")).unwrap().text, "word");
    }

    #[test]
    fn test_split_during_quiet_period_commits_nothing() {
        let mut h = harness(vec![rec("a", None, "", 1.0)]);
        h.type_char(&id("a"), 'x');
        h.advance_to(50);
        h.press(&id("a"), KeyPress::plain(Key::Enter));
        h.advance_to(2_000);

        assert!(h.commits.is_empty());
        assert_eq!(h.outline.tree().visible_preorder().len(), 2);
        // The split carried the live text along.
        assert_eq!(h.outline.tree().get(&id("a")).unwrap().text, "x");
    }

    #[test]
    fn test_collapse_unmounts_children_and_their_timers() {
        let mut h = harness(vec![
            rec("a", None, "A", 1.0),
            rec("a1", Some("a"), "", 1.0),
            rec("a2", Some("a"), "", 2.0),
            rec("b", None, "B", 2.0),
        ]);
        assert_eq!(h.mounted_non_root(), 4);
        h.type_char(&id("a1"), 'q');

        h.pointer(&id("a"), |c, p, out| c.on_toggle(p, out));
        assert!(h.outline.tree().get(&id("a")).unwrap().collapsed);
        assert!(!h.is_mounted(&id("a1")));
        assert_eq!(h.mounted_non_root(), 2);
        assert_geometry_matches_mounts(&h);

        h.advance_to(2_000);
        assert!(h.commits.is_empty());

        h.pointer(&id("a"), |c, p, out| c.on_toggle(p, out));
        assert_eq!(h.mounted_non_root(), 4);
        assert_geometry_matches_mounts(&h);
    }

    #[test]
    fn test_drop_inside_nests_dragged_entry() {
        let mut h = harness(vec![
            rec("a", None, "A", 1.0),
            rec("b", None, "B", 2.0),
            rec("c", None, "C", 3.0),
        ]);
        h.pointer(&id("c"), |c, p, out| c.on_handle_down(p, 0.0, 60.0, out));
        assert!(h.outline.drag_session().is_some());

        let (x, y) = h.point(&id("a"), false, 30.0);
        h.dispatch(vec![Intent::DragMove { client_x: x, client_y: y }]);
        let hover = h.outline.drag_session().and_then(|s| s.hover.clone());
        assert_eq!(hover.map(|t| t.id), Some(id("a")));

        h.dispatch(vec![Intent::Drop { client_x: x, client_y: y }]);
        assert!(h.outline.drag_session().is_none());
        assert_eq!(h.outline.tree().child_ids(&id("a")), vec![id("c")]);
        assert_geometry_matches_mounts(&h);
    }

    #[test]
    fn test_drop_before_reorders_siblings() {
        let mut h = harness(vec![
            rec("a", None, "A", 1.0),
            rec("b", None, "B", 2.0),
            rec("c", None, "C", 3.0),
        ]);
        h.pointer(&id("c"), |c, p, out| c.on_handle_down(p, 0.0, 60.0, out));
        let (x, y) = h.point(&id("b"), true, 4.0);
        h.dispatch(vec![Intent::Drop { client_x: x, client_y: y }]);
        assert_eq!(h.outline.tree().visible_preorder(), vec![id("a"), id("c"), id("b")]);
    }

    #[test]
    fn test_drop_onto_own_row_is_cancelled() {
        let mut h = harness(vec![rec("a", None, "A", 1.0), rec("b", None, "B", 2.0)]);
        h.pointer(&id("b"), |c, p, out| c.on_handle_down(p, 0.0, 30.0, out));
        let (x, y) = h.point(&id("b"), false, 30.0);
        h.dispatch(vec![Intent::Drop { client_x: x, client_y: y }]);
        assert!(h.outline.drag_session().is_none());
        assert_eq!(h.outline.tree().visible_preorder(), vec![id("a"), id("b")]);
    }

    #[test]
    fn test_drop_keeps_text_typed_just_before_drag() {
        let mut h = harness(vec![
            rec("a", None, "A", 1.0),
            rec("b", None, "B", 2.0),
            rec("c", None, "C", 3.0),
        ]);
        h.type_char(&id("c"), 'x');
        h.pointer(&id("c"), |c, p, out| c.on_handle_down(p, 0.0, 60.0, out));
        let (x, y) = h.point(&id("a"), true, 4.0);
        h.dispatch(vec![Intent::Drop { client_x: x, client_y: y }]);

        assert_eq!(h.outline.tree().visible_preorder(), vec![id("c"), id("a"), id("b")]);
        assert_eq!(h.outline.tree().get(&id("c")).unwrap().text, "Cx");
        h.advance_to(2_000);
        assert!(h.commits.is_empty());
        assert_eq!(h.surface(&id("c")).text(), "Cx");
    }

    #[test]
    fn test_drop_on_lower_half_of_expanded_parent_becomes_first_child() {
        let mut h = harness(vec![
            rec("a", None, "A", 1.0),
            rec("a1", Some("a"), "A1", 1.0),
            rec("b", None, "B", 2.0),
        ]);
        h.pointer(&id("b"), |c, p, out| c.on_handle_down(p, 0.0, 60.0, out));
        let (x, y) = h.point(&id("a"), false, 2.0);
        h.dispatch(vec![Intent::Drop { client_x: x, client_y: y }]);

        assert_eq!(h.outline.tree().child_ids(&id("a")), vec![id("b"), id("a1")]);
        assert_geometry_matches_mounts(&h);
    }

    #[test]
    fn test_rejected_merge_keeps_typed_text() {
        let mut h = harness(vec![rec("a", None, "", 1.0)]);
        h.type_char(&id("a"), 'x');
        h.surface(&id("a")).set_caret(Some(0));
        h.press(&id("a"), KeyPress::plain(Key::Backspace));

        assert!(h.outline.tree().contains(&id("a")));
        assert_eq!(h.outline.tree().get(&id("a")).unwrap().text, "x");
        assert!(h.outline.is_dirty());
    }

    #[test]
    fn test_merge_uses_target_text_still_in_quiet_period() {
        let mut h = harness(vec![rec("a", None, "A", 1.0), rec("b", None, "B", 2.0)]);
        h.type_char(&id("a"), 'y');
        h.surface(&id("b")).set_caret(Some(0));
        h.press(&id("b"), KeyPress::plain(Key::Backspace));

        assert_eq!(h.outline.tree().get(&id("a")).unwrap().text, "AyB");
        assert_eq!(h.surface(&id("a")).text(), "AyB");
        assert_eq!(h.surface(&id("a")).caret(), Some(2));

        h.advance_to(2_000);
        assert!(h.commits.is_empty());
        assert_eq!(h.outline.tree().get(&id("a")).unwrap().text, "AyB");
    }

    #[test]
    fn test_handle_release_cancels_drag() {
        let mut h = harness(vec![rec("a", None, "A", 1.0)]);
        h.pointer(&id("a"), |c, p, out| c.on_handle_down(p, 0.0, 0.0, out));
        assert!(h.outline.drag_session().is_some());
        h.pointer(&id("a"), |c, _, out| c.on_handle_up(out));
        assert!(h.outline.drag_session().is_none());
    }

    #[test]
    fn test_tab_indents_and_keeps_focus() {
        let mut h = harness(vec![rec("a", None, "A", 1.0), rec("b", None, "B", 2.0)]);
        h.surface(&id("b")).set_caret(Some(1));
        h.surface(&id("b")).blur();
        h.press(&id("b"), KeyPress::plain(Key::Tab));

        assert_eq!(h.outline.tree().child_ids(&id("a")), vec![id("b")]);
        assert!(h.surface(&id("b")).is_focused());
        assert_eq!(h.props(&id("b")).depth, 2);
        assert_geometry_matches_mounts(&h);

        h.press(
            &id("b"),
            KeyPress {
                key: Key::Tab,
                ctrl: false,
                shift: true,
            },
        );
        assert_eq!(h.props(&id("b")).depth, 1);
    }

    #[test]
    fn test_deleted_entry_never_becomes_drop_target() {
        let mut h = harness(vec![
            rec("a", None, "A", 1.0),
            rec("b", None, "B", 2.0),
            rec("c", None, "C", 3.0),
        ]);
        let (x, y) = h.point(&id("b"), false, 2.0);
        h.surface(&id("b")).set_caret(Some(0));
        h.press(&id("b"), KeyPress::plain(Key::Backspace));

        h.pointer(&id("c"), |c, p, out| c.on_handle_down(p, 0.0, 0.0, out));
        let target = h.outline.drop_target(x, y);
        assert!(target.is_none_or(|t| t.id != id("b")));
    }

    #[test]
    fn test_seeded_entry_is_focused_on_first_render() {
        let h = Harness::new(Outline::seeded(OutlineConfig::default(), "s"));
        let first = h.outline.tree().visible_preorder()[0].clone();
        assert!(h.surface(&first).is_focused());
        assert_eq!(h.outline.tree().get(&first).unwrap().focus, None::<FocusDirective>);
    }
}
