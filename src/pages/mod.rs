use crate::cache::remove_outline_snapshot;
use crate::components::ui::{Alert, AlertDescription, Button, ButtonSize, ButtonVariant};
use crate::editor::OutlineEditor;
use crate::state::AppContext;
use crate::util::format_time_of_day;
use leptos::prelude::*;
use leptos_router::params::Params;

pub(crate) const DEFAULT_OUTLINE_ID: &str = "inbox";

#[derive(Params, PartialEq, Clone, Debug)]
pub struct OutlineRouteParams {
    pub outline_id: Option<String>,
}

fn resolve_outline_id(raw: Option<String>) -> String {
    raw.map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| DEFAULT_OUTLINE_ID.to_string())
}

#[component]
pub fn OutlinePage() -> impl IntoView {
    let app_state = expect_context::<AppContext>();
    let params = leptos_router::hooks::use_params::<OutlineRouteParams>();

    // Use closures so params access happens inside a reactive tracking context.
    let outline_id = move || resolve_outline_id(params.get().ok().and_then(|p| p.outline_id));

    // Bumped by "Reset" so the editor remounts from a fresh seed.
    let generation: RwSignal<u32> = RwSignal::new(0);

    let saved_label = move || match app_state.0.last_saved_ms.get() {
        Some(ms) => format!("Saved {}", format_time_of_day(ms)),
        None => "Not saved yet".to_string(),
    };

    let on_reset = move |_| {
        let id = outline_id();
        let prefix = app_state.0.config.with_value(|c| c.storage_prefix.clone());
        remove_outline_snapshot(&prefix, &id);
        log::info!("reset outline {id}");
        generation.update(|g| *g += 1);
    };

    view! {
        <div class="mx-auto max-w-3xl px-4 py-8 space-y-4">
            <header class="flex items-center justify-between gap-3">
                <div class="min-w-0">
                    <h1 class="truncate text-lg font-semibold">{outline_id}</h1>
                    <div class="text-xs text-muted-foreground">{saved_label}</div>
                </div>
                <Button variant=ButtonVariant::Outline size=ButtonSize::Sm on:click=on_reset>
                    "Reset"
                </Button>
            </header>

            <Show when=move || app_state.0.snapshot_error.get().is_some() fallback=|| ().into_view()>
                <Alert class="border-destructive/30">
                    <AlertDescription class="text-destructive text-xs">
                        {move || {
                            format!(
                                "Stored outline could not be loaded and was replaced: {}",
                                app_state.0.snapshot_error.get().unwrap_or_default(),
                            )
                        }}
                    </AlertDescription>
                </Alert>
            </Show>

            {move || {
                let _ = generation.get();
                view! { <OutlineEditor outline_id=outline_id() /> }
            }}

            <p class="text-xs text-muted-foreground">
                "Enter splits, Backspace at the start merges, Tab and Shift+Tab move levels. Drag the bullet to reorder. Esc clears a block selection."
            </p>
        </div>
    }
}
