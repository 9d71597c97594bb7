use super::dom::DomSurface;
use super::OutlineCtx;
use crate::models::EntryId;
use crate::outline::geometry::DropPlacement;
use crate::outline::{EntryController, EntryView, Key, KeyPress, TextSurface, Ticket};
use crate::util::clock_ms;
use icons::ChevronRight;
use leptos::html;
use leptos::prelude::*;
use tw_merge::tw_merge;
use wasm_bindgen::closure::Closure;
use wasm_bindgen::JsCast;

/// One entry row plus its children block. The root renders only its children.
#[component]
pub fn EntryNode(id: EntryId, chain: Vec<EntryId>) -> impl IntoView {
    let ctx = expect_context::<OutlineCtx>();
    let outline = ctx.outline;

    let id_sv = StoredValue::new(id.clone());
    let controller = StoredValue::new(EntryController::new(id.clone()));

    let text_ref: NodeRef<html::Div> = NodeRef::new();
    let row_ref: NodeRef<html::Div> = NodeRef::new();
    let children_ref: NodeRef<html::Div> = NodeRef::new();

    let props = Memo::new(move |_| outline.with(|o| o.props_for(&id_sv.get_value(), chain.clone())));
    let entry_view = Memo::new(move |_| {
        let p = props.get()?;
        Some(outline.with(|o| EntryView::derive(&p, o.ambient())))
    });
    let text = Memo::new(move |_| props.with(|p| p.as_ref().map(|p| p.text.clone())));
    let drop_hint = Memo::new(move |_| {
        outline.with(|o| {
            o.drag_session()
                .and_then(|s| s.hover.as_ref())
                .filter(|t| t.id == id_sv.get_value())
                .map(|t| t.placement)
        })
    });

    let is_root = props.with_untracked(|p| p.as_ref().is_some_and(|p| p.is_root));

    // Reads refs without tracking; safe to call after the entry is gone.
    let surface = move || -> Option<DomSurface> {
        let text_el: web_sys::HtmlElement = text_ref.try_get_untracked().flatten()?.into();
        let row_el = row_ref
            .try_get_untracked()
            .flatten()
            .map(web_sys::HtmlElement::from);
        let children_el = children_ref
            .try_get_untracked()
            .flatten()
            .map(web_sys::HtmlElement::from);
        Some(DomSurface {
            text_el,
            row_el,
            children_el,
        })
    };

    // Text is written into the contenteditable only when the stored text changes, so typing
    // that has not been committed yet is never overwritten by a re-render.
    Effect::new(move |_| {
        let (Some(t), Some(el)) = (text.get(), text_ref.get()) else {
            return;
        };
        if el.text_content().unwrap_or_default() != t {
            el.set_text_content(Some(&t));
        }
    });

    Effect::new(move |_| {
        let Some(p) = props.get() else {
            return;
        };
        let _ = text_ref.get();
        let _ = children_ref.get();
        let s = surface();
        ctx.with_outline(|o| {
            let now = clock_ms();
            controller.update_value(|c| {
                c.sync(&p, s.as_ref().map(|s| s as &dyn TextSurface), &mut o.controller_ctx(now))
            });
        });
    });

    let cleanup_id = id.clone();
    on_cleanup(move || {
        let _ = outline.try_update_untracked(|o| {
            let unmounted = controller
                .try_update_value(|c| c.unmount(&mut o.controller_ctx(clock_ms())))
                .is_some();
            if !unmounted {
                o.forget(&cleanup_id);
            }
        });
    });

    let arm_commit = move |ticket: Ticket| {
        let delay = ticket.deadline_ms.saturating_sub(clock_ms()).min(i32::MAX as u64) as i32;
        let Some(win) = web_sys::window() else {
            return;
        };
        let _ = win.set_timeout_with_callback_and_timeout_and_arguments_0(
            Closure::once_into_js(move || {
                let s = surface();
                ctx.with_outline(|o| {
                    let now = clock_ms();
                    controller.try_update_value(|c| {
                        c.on_timer(&ticket, s.as_ref().map(|s| s as &dyn TextSurface), &mut o.controller_ctx(now))
                    })
                });
            })
            .as_ref()
            .unchecked_ref(),
            delay,
        );
    };

    let on_keydown = move |ev: web_sys::KeyboardEvent| {
        let Some(p) = props.get_untracked() else {
            return;
        };
        let press = KeyPress {
            key: Key::parse(&ev.key()),
            ctrl: ev.ctrl_key() || ev.meta_key(),
            shift: ev.shift_key(),
        };
        let s = surface();
        let outcome = ctx
            .with_outline(|o| {
                let now = clock_ms();
                controller.try_update_value(|c| {
                    c.on_key(&p, &press, s.as_ref().map(|s| s as &dyn TextSurface), &mut o.controller_ctx(now))
                })
            })
            .flatten()
            .unwrap_or_default();

        if outcome.prevent_default {
            ev.prevent_default();
        }
        if let Some(ticket) = outcome.arm {
            arm_commit(ticket);
        }
    };

    let on_input = move |_ev: web_sys::Event| {
        let Some(p) = props.get_untracked() else {
            return;
        };
        let ticket = ctx
            .with_outline(|o| {
                let now = clock_ms();
                controller.try_update_value(|c| c.on_input(&p, &mut o.controller_ctx(now)))
            })
            .flatten()
            .flatten();
        if let Some(ticket) = ticket {
            arm_commit(ticket);
        }
    };

    let on_handle_down = move |ev: web_sys::MouseEvent| {
        let Some(p) = props.get_untracked() else {
            return;
        };
        // Keep the browser from starting a text selection under the handle.
        ev.prevent_default();
        let mut out = vec![];
        controller.with_value(|c| {
            c.on_handle_down(&p, ev.client_x() as f64, ev.client_y() as f64, &mut out)
        });
        ctx.dispatch(out);
    };

    let on_handle_up = move |ev: web_sys::MouseEvent| {
        // Releasing over a valid target is a drop; the window listener handles that.
        let over_target = outline
            .try_with_untracked(|o| o.drop_target(ev.client_x() as f64, ev.client_y() as f64))
            .flatten()
            .is_some();
        if over_target {
            return;
        }
        let mut out = vec![];
        controller.with_value(|c| c.on_handle_up(&mut out));
        ctx.dispatch(out);
    };

    let on_content_down = move |_ev: web_sys::MouseEvent| {
        let Some(p) = props.get_untracked() else {
            return;
        };
        let mut out = vec![];
        controller.with_value(|c| c.on_content_down(&p, &mut out));
        ctx.dispatch(out);
    };

    let on_content_enter = move |_ev: web_sys::MouseEvent| {
        let selecting = outline
            .try_with_untracked(|o| o.selection().is_gesture_active())
            .unwrap_or(false);
        if !selecting {
            return;
        }
        let Some(p) = props.get_untracked() else {
            return;
        };
        let mut out = vec![];
        controller.with_value(|c| c.on_content_enter(&p, &mut out));
        ctx.dispatch(out);
    };

    let on_toggle = move |_ev: web_sys::MouseEvent| {
        let Some(p) = props.get_untracked() else {
            return;
        };
        let mut out = vec![];
        controller.with_value(|c| c.on_toggle(&p, &mut out));
        ctx.dispatch(out);
    };

    let row_class = move || {
        let v = entry_view.get();
        let selected = if v.is_some_and(|v| v.selected) {
            "bg-primary/10 ring-1 ring-primary/30"
        } else {
            ""
        };
        let dragging = if v.is_some_and(|v| v.dragging) {
            "opacity-50"
        } else {
            ""
        };
        let hint = match drop_hint.get() {
            Some(DropPlacement::Before) => "border-t-primary",
            Some(DropPlacement::After) => "border-b-primary",
            Some(DropPlacement::Inside) => "bg-primary/5 ring-1 ring-primary",
            None => "",
        };
        tw_merge!(
            "outline-row flex items-start gap-1 rounded-md border-y-2 border-transparent py-0.5",
            selected,
            dragging,
            hint
        )
    };

    let children_class = if is_root { "space-y-0.5" } else { "space-y-0.5 pl-6" };

    let row = if is_root {
        ().into_any()
    } else {
        view! {
            <div node_ref=row_ref class=row_class data-drop=move || drop_hint.get().map(|p| p.to_string())>
                <button
                    class="mt-0.5 flex h-5 w-5 shrink-0 items-center justify-center text-muted-foreground hover:text-foreground/80 disabled:opacity-0"
                    on:click=on_toggle
                    disabled=move || !entry_view.get().is_some_and(|v| v.show_toggle)
                    title=move || {
                        match props.get() {
                            Some(p) if p.children.is_empty() => "",
                            Some(p) if p.collapsed => "Expand",
                            _ => "Collapse",
                        }
                    }
                >
                    <span class=move || {
                        if entry_view.get().is_some_and(|v| v.show_children) {
                            "inline-flex rotate-90 transition-transform"
                        } else {
                            "inline-flex transition-transform"
                        }
                    }>
                        <ChevronRight class="size-4" />
                    </span>
                </button>
                <span
                    class=move || {
                        if entry_view.get().is_some_and(|v| v.show_handle) {
                            "mt-0.5 h-5 w-4 shrink-0 cursor-grab select-none text-center text-base leading-none text-muted-foreground"
                        } else {
                            "mt-0.5 h-5 w-4 shrink-0 invisible"
                        }
                    }
                    on:mousedown=on_handle_down
                    on:mouseup=on_handle_up
                >
                    "•"
                </span>
                <div
                    node_ref=text_ref
                    data-entry-text=id.to_string()
                    contenteditable="true"
                    spellcheck="false"
                    class="min-h-[20px] min-w-0 flex-1 cursor-text whitespace-pre-wrap text-sm outline-none"
                    on:keydown=on_keydown
                    on:input=on_input
                    on:mousedown=on_content_down
                    on:mouseenter=on_content_enter
                ></div>
            </div>
        }
        .into_any()
    };

    view! {
        <div class="outline-entry" data-entry-id=id.to_string()>
            {row}
            <Show when=move || entry_view.get().is_some_and(|v| v.show_children) fallback=|| ().into_view()>
                <div node_ref=children_ref class=children_class>
                    <For
                        each=move || props.with(|p| p.as_ref().map(|p| p.children.clone()).unwrap_or_default())
                        key=|child| child.clone()
                        children=move |child| {
                            let chain = props
                                .with_untracked(|p| p.as_ref().map(|p| p.child_chain()))
                                .unwrap_or_default();
                            view! { <EntryNode id=child chain=chain /> }.into_any()
                        }
                    />
                </div>
            </Show>
        </div>
    }
}
