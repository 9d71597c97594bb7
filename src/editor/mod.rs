mod dom;
mod entry;

use crate::cache::{load_outline_snapshot, outline_from_snapshot, save_outline_snapshot};
use crate::outline::{Intent, Outline};
use crate::state::AppContext;
use crate::util::now_ms;
use entry::EntryNode;
use leptos::ev;
use leptos::prelude::*;
use leptos_dom::helpers::window_event_listener;

/// Shared handle every `EntryNode` uses to reach the orchestrator.
///
/// Controller calls mutate the outline untracked (geometry and timer bookkeeping never need a
/// re-render); readers are notified only when intents were queued and processed.
#[derive(Clone, Copy)]
pub(crate) struct OutlineCtx {
    pub outline: RwSignal<Outline>,
    outline_id: StoredValue<String>,
    storage_prefix: StoredValue<String>,
    last_saved_ms: RwSignal<Option<i64>>,
}

impl OutlineCtx {
    /// Runs `f` against the outline, then processes whatever it queued. `None` once the editor
    /// is gone.
    pub fn with_outline<R>(&self, f: impl FnOnce(&mut Outline) -> R) -> Option<R> {
        let r = self.outline.try_update_untracked(f)?;
        self.flush();
        Some(r)
    }

    pub fn dispatch(&self, intents: Vec<Intent>) {
        if intents.is_empty() {
            return;
        }
        let _ = self.outline.try_update_untracked(|o| {
            for i in intents {
                o.enqueue(i);
            }
        });
        self.flush();
    }

    fn flush(&self) {
        let pending = self
            .outline
            .try_with_untracked(|o| o.pending_intents())
            .unwrap_or(0);
        if pending > 0 {
            self.outline.update(|o| {
                o.process_with(dom::live_text);
            });
        }
        self.persist();
    }

    /// Writes a snapshot after any batch that changed the tree.
    fn persist(&self) {
        let Some(Some(entries)) = self
            .outline
            .try_with_untracked(|o| o.is_dirty().then(|| o.records()))
        else {
            return;
        };

        let saved_ms = now_ms();
        save_outline_snapshot(
            &self.storage_prefix.get_value(),
            &self.outline_id.get_value(),
            entries,
            saved_ms,
        );
        self.outline.update_untracked(|o| o.mark_saved());
        self.last_saved_ms.set(Some(saved_ms));
    }
}

#[component]
pub fn OutlineEditor(#[prop(into)] outline_id: String) -> impl IntoView {
    let app_state = expect_context::<AppContext>();
    let config = app_state.0.config.get_value();
    let id_prefix = app_state.0.id_prefix.get_value();

    let stored = load_outline_snapshot(&config.storage_prefix, &outline_id);
    let (initial, load_error) = outline_from_snapshot(&config, &outline_id, stored, &id_prefix);
    app_state
        .0
        .snapshot_error
        .set(load_error.map(|e| e.to_string()));
    app_state.0.last_saved_ms.set(None);
    log::info!(
        "opened outline {outline_id} with {} entries",
        initial.tree().len().saturating_sub(1)
    );

    let root_id = initial.tree().root_id().clone();
    let outline = RwSignal::new(initial);
    let ctx = OutlineCtx {
        outline,
        outline_id: StoredValue::new(outline_id),
        storage_prefix: StoredValue::new(config.storage_prefix.clone()),
        last_saved_ms: app_state.0.last_saved_ms,
    };
    provide_context(ctx);

    // Drags and block selections follow the pointer anywhere in the window.
    let move_handle = window_event_listener(ev::mousemove, move |ev: web_sys::MouseEvent| {
        let dragging = outline
            .try_with_untracked(|o| o.drag_session().is_some())
            .unwrap_or(false);
        if dragging {
            ctx.dispatch(vec![Intent::DragMove {
                client_x: ev.client_x() as f64,
                client_y: ev.client_y() as f64,
            }]);
        }
    });

    let up_handle = window_event_listener(ev::mouseup, move |ev: web_sys::MouseEvent| {
        let (dragging, selecting) = outline
            .try_with_untracked(|o| (o.drag_session().is_some(), o.selection().is_gesture_active()))
            .unwrap_or((false, false));
        let mut out = vec![];
        if dragging {
            out.push(Intent::Drop {
                client_x: ev.client_x() as f64,
                client_y: ev.client_y() as f64,
            });
        }
        if selecting {
            out.push(Intent::EndSelect);
        }
        ctx.dispatch(out);
    });

    // Regions are viewport rects; re-measure when the viewport moves under an active drag.
    let remeasure = move || {
        let dragging = outline
            .try_with_untracked(|o| o.drag_session().is_some())
            .unwrap_or(false);
        if dragging {
            outline.update(|o| o.invalidate_layout());
        }
    };
    let scroll_handle = window_event_listener(ev::scroll, move |_| remeasure());
    let resize_handle = window_event_listener(ev::resize, move |_| remeasure());

    let key_handle = window_event_listener(ev::keydown, move |ev: web_sys::KeyboardEvent| {
        if ev.key() != "Escape" {
            return;
        }
        let (dragging, has_selection) = outline
            .try_with_untracked(|o| (o.drag_session().is_some(), o.selection().selected().is_some()))
            .unwrap_or((false, false));
        let mut out = vec![];
        if dragging {
            out.push(Intent::CancelDrag);
        }
        if has_selection {
            out.push(Intent::ClearSelection);
        }
        ctx.dispatch(out);
    });

    on_cleanup(move || {
        move_handle.remove();
        up_handle.remove();
        key_handle.remove();
        scroll_handle.remove();
        resize_handle.remove();
    });

    view! {
        <div
            class=move || {
                if outline.with(|o| o.drag_session().is_some()) {
                    "outline-editor outline-editor--dragging rounded-md p-3 select-none"
                } else {
                    "outline-editor rounded-md p-3"
                }
            }
        >
            <EntryNode id=root_id chain=vec![] />
        </div>
    }
}
