//! Headless outline core: tree, positions, per-entry controllers and the orchestrator.
//!
//! Nothing in here touches the DOM. The browser layer (`crate::editor`) plugs in through
//! `TextSurface`, `GeometryTracker` and `IntentSink`.

pub(crate) mod controller;
pub(crate) mod debounce;
pub(crate) mod drag;
pub(crate) mod error;
pub(crate) mod geometry;
pub(crate) mod intent;
pub(crate) mod orchestrator;
pub(crate) mod position;
pub(crate) mod selection;
pub(crate) mod tree;

#[cfg(test)]
pub(crate) mod testing;

pub(crate) use controller::{EntryController, EntryView, Key, KeyPress, TextSurface};
pub(crate) use debounce::{Ticket, DEFAULT_QUIET_MS};
pub(crate) use error::OutlineError;
pub(crate) use geometry::Rect;
pub(crate) use intent::Intent;
pub(crate) use orchestrator::Outline;
pub(crate) use position::MIN_POSITION_GAP;
