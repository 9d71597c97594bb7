use crate::models::EntryId;

/// Everything a controller (or the host's pointer handlers) can ask the orchestrator to do.
///
/// Intents are fire-and-forget: the emitter never looks at the outcome.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Intent {
    ToggleCollapse {
        id: EntryId,
        collapsed: bool,
    },
    StartDrag {
        id: EntryId,
        client_x: f64,
        client_y: f64,
    },
    DragMove {
        client_x: f64,
        client_y: f64,
    },
    Drop {
        client_x: f64,
        client_y: f64,
    },
    CancelDrag,
    StartSelect {
        id: EntryId,
        depth: usize,
    },
    SelectOver {
        id: EntryId,
    },
    EndSelect,
    ClearSelection,
    /// New empty sibling directly after `after`. `position` is the emitter's best guess.
    /// `after_text` is the live text of `after`, applied in the same step.
    CreateEntry {
        parent: EntryId,
        after: EntryId,
        position: f64,
        after_text: String,
    },
    DeleteEntry {
        depth: usize,
        id: EntryId,
        text: String,
        caret: usize,
    },
    Indent {
        id: EntryId,
        text: String,
        caret: Option<usize>,
    },
    Outdent {
        id: EntryId,
        text: String,
        caret: Option<usize>,
    },
    NodeFocused {
        id: EntryId,
    },
    CommitText {
        id: EntryId,
        text: String,
    },
}

impl Intent {
    /// Whether applying this intent changes the tree's shape.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            Intent::CreateEntry { .. }
                | Intent::DeleteEntry { .. }
                | Intent::Indent { .. }
                | Intent::Outdent { .. }
                | Intent::Drop { .. }
        )
    }
}

/// Outbound channel from controllers to the orchestrator.
pub(crate) trait IntentSink {
    fn emit(&mut self, intent: Intent);
}

impl IntentSink for Vec<Intent> {
    fn emit(&mut self, intent: Intent) {
        self.push(intent);
    }
}

impl IntentSink for std::collections::VecDeque<Intent> {
    fn emit(&mut self, intent: Intent) {
        self.push_back(intent);
    }
}
