//! Per-entry interaction state machine.
//!
//! An `EntryController` sits behind every rendered entry. It turns key presses and pointer
//! presses into `Intent`s, restores focus from one-shot directives, and keeps the entry's
//! geometry registration in step with its mount lifecycle. It owns no tree data: every call
//! receives the current `EntryProps` and a `ControllerCtx` borrowed from the orchestrator.

use crate::models::{EntryId, FocusDirective};
use crate::outline::debounce::{Debouncer, Ticket};
use crate::outline::geometry::{GeometryTracker, NodeGeometry, Rect};
use crate::outline::intent::{Intent, IntentSink};
use crate::outline::position;
use crate::outline::tree::OutlineTree;
use std::collections::BTreeSet;

/// The editable text region of one entry (DOM element in the browser, a fake in tests).
pub(crate) trait TextSurface {
    fn text(&self) -> String;

    /// Caret offset in UTF-16 units, `None` when the caret is not inside this region.
    fn caret_offset(&self) -> Option<usize>;

    fn set_caret_offset(&self, offset: usize);

    fn focus(&self);

    fn own_region(&self) -> Option<Rect>;

    fn children_region(&self) -> Option<Rect>;
}

/// Everything a controller needs to know about its entry for one render pass.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct EntryProps {
    pub id: EntryId,
    pub parent: Option<EntryId>,
    pub text: String,
    pub position: f64,
    /// Position of the next sibling, if any. Bounds the split insert.
    pub next_position: Option<f64>,
    pub collapsed: bool,
    /// Child ids, sorted by position.
    pub children: Vec<EntryId>,
    pub depth: usize,
    pub is_root: bool,
    /// Ancestor ids, root first.
    pub chain: Vec<EntryId>,
    pub auto_focus: Option<FocusDirective>,
    /// Bumped by the orchestrator on every mutation that can move rows on screen.
    pub layout_epoch: u64,
}

impl EntryProps {
    pub fn from_tree(tree: &OutlineTree, id: &EntryId, chain: Vec<EntryId>, layout_epoch: u64) -> Option<Self> {
        let e = tree.get(id)?;
        Some(Self {
            id: id.clone(),
            parent: e.parent.clone(),
            text: e.text.clone(),
            position: e.position,
            next_position: tree.next_sibling_position(id),
            collapsed: e.collapsed,
            children: tree.child_ids(id),
            depth: chain.len(),
            is_root: id == tree.root_id(),
            chain,
            auto_focus: e.focus,
            layout_epoch,
        })
    }

    /// Chain handed to each child.
    pub fn child_chain(&self) -> Vec<EntryId> {
        let mut chain = self.chain.clone();
        chain.push(self.id.clone());
        chain
    }

    fn layout_key(&self) -> LayoutKey {
        LayoutKey {
            position: self.position,
            depth: self.depth,
            children: self.children.clone(),
            collapsed: self.collapsed,
            epoch: self.layout_epoch,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
struct LayoutKey {
    position: f64,
    depth: usize,
    children: Vec<EntryId>,
    collapsed: bool,
    epoch: u64,
}

/// Selection and drag state shared by every entry in a render pass.
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct Ambient<'a> {
    pub selection: Option<&'a BTreeSet<EntryId>>,
    pub dragged: Option<&'a [EntryId]>,
}

/// Render flags derived from props + ambient state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct EntryView {
    pub show_content: bool,
    pub show_toggle: bool,
    pub show_handle: bool,
    pub show_children: bool,
    pub selected: bool,
    pub dragging: bool,
}

impl EntryView {
    pub fn derive(props: &EntryProps, ambient: Ambient<'_>) -> Self {
        let has_children = !props.children.is_empty();
        let sole_dragged = ambient
            .dragged
            .is_some_and(|d| d.len() == 1 && d[0] == props.id);
        let selected = ambient.selection.is_some_and(|s| s.contains(&props.id));

        Self {
            show_content: !props.is_root,
            show_toggle: has_children && !props.is_root,
            show_handle: !sole_dragged && !props.is_root,
            show_children: has_children && !props.collapsed,
            selected,
            dragging: sole_dragged,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Key {
    Enter,
    Backspace,
    Tab,
    Char(char),
    Other(String),
}

impl Key {
    /// Maps a DOM `KeyboardEvent.key` value.
    pub fn parse(key: &str) -> Self {
        match key {
            "Enter" => Key::Enter,
            "Backspace" => Key::Backspace,
            "Tab" => Key::Tab,
            _ => {
                let mut chars = key.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Key::Char(c),
                    _ => Key::Other(key.to_string()),
                }
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct KeyPress {
    pub key: Key,
    pub ctrl: bool,
    pub shift: bool,
}

impl KeyPress {
    pub fn plain(key: Key) -> Self {
        Self {
            key,
            ctrl: false,
            shift: false,
        }
    }
}

/// What the host must do after a key press.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct KeyOutcome {
    pub prevent_default: bool,
    /// A commit timer the host must arm and hand back to `on_timer` when it fires.
    pub arm: Option<Ticket>,
}

impl KeyOutcome {
    fn prevented() -> Self {
        Self {
            prevent_default: true,
            arm: None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub(crate) enum EntryPhase {
    #[default]
    Idle,
    Editing,
    DebouncePending,
    Committed,
    SplitRequested,
    MergeRequested,
}

/// Capabilities a controller borrows from the orchestrator for one call.
pub(crate) struct ControllerCtx<'a> {
    pub tracker: &'a mut dyn GeometryTracker,
    pub timers: &'a mut Debouncer,
    pub sink: &'a mut dyn IntentSink,
    pub now_ms: u64,
}

#[derive(Clone, Debug)]
pub(crate) struct EntryController {
    id: EntryId,
    phase: EntryPhase,
    mounted: bool,
    layout: Option<LayoutKey>,
}

impl EntryController {
    pub fn new(id: EntryId) -> Self {
        Self {
            id,
            phase: EntryPhase::Idle,
            mounted: false,
            layout: None,
        }
    }

    pub fn id(&self) -> &EntryId {
        &self.id
    }

    pub fn phase(&self) -> EntryPhase {
        self.phase
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted
    }

    /// Runs after every render of the entry (mount included).
    ///
    /// Applies a pending focus directive and acknowledges it, and re-registers geometry when
    /// anything layout-affecting changed since the last registration.
    pub fn sync(&mut self, props: &EntryProps, surface: Option<&dyn TextSurface>, ctx: &mut ControllerCtx<'_>) {
        if props.is_root {
            self.mounted = true;
            return;
        }
        let Some(surface) = surface else {
            return;
        };
        self.mounted = true;

        if matches!(
            self.phase,
            EntryPhase::SplitRequested | EntryPhase::MergeRequested
        ) {
            self.phase = EntryPhase::Idle;
        }

        if let Some(directive) = props.auto_focus {
            match directive.caret {
                Some(caret) => surface.set_caret_offset(caret),
                None => surface.focus(),
            }
            ctx.sink.emit(Intent::NodeFocused {
                id: self.id.clone(),
            });
        }

        let key = props.layout_key();
        if self.layout.as_ref() != Some(&key) {
            if let Some(own) = surface.own_region() {
                let children = if props.children.is_empty() {
                    None
                } else {
                    surface.children_region()
                };
                ctx.tracker.register(&self.id, NodeGeometry { own, children });
                self.layout = Some(key);
            }
        }
    }

    /// Tears down: geometry cleared, pending commit dropped.
    pub fn unmount(&mut self, ctx: &mut ControllerCtx<'_>) {
        if !self.mounted {
            return;
        }
        ctx.tracker.clear(&self.id);
        ctx.timers.cancel(&self.id);
        self.mounted = false;
        self.layout = None;
        self.phase = EntryPhase::Idle;
    }

    /// Keyboard dispatch for the entry's text region.
    ///
    /// Priority: split on Enter, merge on Backspace at offset 0, the reserved Ctrl+Z probe,
    /// indent/outdent on Tab, and otherwise a debounced commit.
    pub fn on_key(
        &mut self,
        props: &EntryProps,
        press: &KeyPress,
        surface: Option<&dyn TextSurface>,
        ctx: &mut ControllerCtx<'_>,
    ) -> KeyOutcome {
        if props.is_root || !self.mounted {
            return KeyOutcome::default();
        }
        let (Some(surface), Some(parent)) = (surface, props.parent.as_ref()) else {
            return KeyOutcome::default();
        };

        match &press.key {
            Key::Enter => {
                ctx.timers.cancel(&self.id);
                let position = position::between(Some(props.position), props.next_position)
                    .unwrap_or(props.position);
                ctx.sink.emit(Intent::CreateEntry {
                    parent: parent.clone(),
                    after: self.id.clone(),
                    position,
                    after_text: surface.text(),
                });
                self.phase = EntryPhase::SplitRequested;
                KeyOutcome::prevented()
            }
            Key::Backspace if surface.caret_offset() == Some(0) => {
                ctx.timers.cancel(&self.id);
                ctx.sink.emit(Intent::DeleteEntry {
                    depth: props.depth,
                    id: self.id.clone(),
                    text: surface.text(),
                    caret: 0,
                });
                self.phase = EntryPhase::MergeRequested;
                KeyOutcome::prevented()
            }
            Key::Char('z') | Key::Char('Z') if press.ctrl => {
                // Reserved for undo; only probes the caret for now.
                log::trace!("undo probe on {}: caret {:?}", self.id, surface.caret_offset());
                KeyOutcome::default()
            }
            Key::Tab => {
                ctx.timers.cancel(&self.id);
                let id = self.id.clone();
                let text = surface.text();
                let caret = surface.caret_offset();
                ctx.sink.emit(if press.shift {
                    Intent::Outdent { id, text, caret }
                } else {
                    Intent::Indent { id, text, caret }
                });
                KeyOutcome::prevented()
            }
            _ => {
                let ticket = ctx.timers.schedule(&self.id, ctx.now_ms);
                self.phase = EntryPhase::DebouncePending;
                KeyOutcome {
                    prevent_default: false,
                    arm: Some(ticket),
                }
            }
        }
    }

    /// A commit timer fired. Commits the surface's current text if the ticket is still live.
    pub fn on_timer(&mut self, ticket: &Ticket, surface: Option<&dyn TextSurface>, ctx: &mut ControllerCtx<'_>) -> bool {
        if !self.mounted || ticket.id != self.id {
            return false;
        }
        let Some(surface) = surface else {
            return false;
        };
        if !ctx.timers.complete(ticket) {
            return false;
        }

        ctx.sink.emit(Intent::CommitText {
            id: self.id.clone(),
            text: surface.text(),
        });
        self.phase = EntryPhase::Committed;
        true
    }

    /// Text input happened without a key event we saw (IME, paste).
    pub fn on_input(&mut self, props: &EntryProps, ctx: &mut ControllerCtx<'_>) -> Option<Ticket> {
        if props.is_root || !self.mounted {
            return None;
        }
        self.phase = EntryPhase::DebouncePending;
        Some(ctx.timers.schedule(&self.id, ctx.now_ms))
    }

    pub fn on_handle_down(&self, props: &EntryProps, client_x: f64, client_y: f64, sink: &mut dyn IntentSink) {
        if props.is_root {
            return;
        }
        sink.emit(Intent::StartDrag {
            id: self.id.clone(),
            client_x,
            client_y,
        });
    }

    /// Drag end over a handle is reported as cancellation; drops are resolved by the host.
    pub fn on_handle_up(&self, sink: &mut dyn IntentSink) {
        sink.emit(Intent::CancelDrag);
    }

    pub fn on_content_down(&self, props: &EntryProps, sink: &mut dyn IntentSink) {
        if props.is_root {
            return;
        }
        sink.emit(Intent::StartSelect {
            id: self.id.clone(),
            depth: props.depth,
        });
    }

    pub fn on_content_enter(&self, props: &EntryProps, sink: &mut dyn IntentSink) {
        if props.is_root {
            return;
        }
        sink.emit(Intent::SelectOver {
            id: self.id.clone(),
        });
    }

    pub fn on_toggle(&self, props: &EntryProps, sink: &mut dyn IntentSink) {
        if props.is_root || props.children.is_empty() {
            return;
        }
        sink.emit(Intent::ToggleCollapse {
            id: self.id.clone(),
            collapsed: !props.collapsed,
        });
    }
}
