use crate::models::EntryId;
use crate::outline::error::{OutlineError, OutlineResult};
use crate::outline::geometry::DropTarget;

/// One active drag gesture.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct DragSession {
    /// Dragged entries in render order.
    pub nodes: Vec<EntryId>,
    pub origin: (f64, f64),
    pub pointer: (f64, f64),
    /// Where the entries would land if dropped now.
    pub hover: Option<DropTarget>,
}

/// At most one drag at a time.
#[derive(Clone, Debug, Default)]
pub(crate) struct DragState {
    session: Option<DragSession>,
}

impl DragState {
    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    pub fn session(&self) -> Option<&DragSession> {
        self.session.as_ref()
    }

    pub fn dragged(&self) -> Option<&[EntryId]> {
        self.session.as_ref().map(|s| s.nodes.as_slice())
    }

    pub fn start(&mut self, nodes: Vec<EntryId>, x: f64, y: f64) -> OutlineResult<()> {
        if self.session.is_some() {
            return Err(OutlineError::DragInProgress);
        }
        self.session = Some(DragSession {
            nodes,
            origin: (x, y),
            pointer: (x, y),
            hover: None,
        });
        Ok(())
    }

    pub fn update(&mut self, x: f64, y: f64, hover: Option<DropTarget>) -> OutlineResult<()> {
        let s = self.session.as_mut().ok_or(OutlineError::NoDragSession)?;
        s.pointer = (x, y);
        s.hover = hover;
        Ok(())
    }

    pub fn take(&mut self) -> Option<DragSession> {
        self.session.take()
    }
}
