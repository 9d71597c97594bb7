mod app;
mod cache;
mod components;
mod config;
mod editor;
mod logging;
mod models;
mod outline;
mod pages;
mod state;
mod storage;
mod util;

use crate::app::App;
use crate::config::OutlineConfig;
use leptos::prelude::*;

// Needed for `#[wasm_bindgen(start)]` on the wasm entrypoint.
#[cfg(all(target_arch = "wasm32", not(test)))]
use wasm_bindgen::prelude::wasm_bindgen;

// Only register the WASM start function for normal builds (not for tests),
// otherwise wasm-bindgen-test will end up with multiple entry symbols.
#[cfg_attr(all(target_arch = "wasm32", not(test)), wasm_bindgen(start))]
pub fn main() {
    console_error_panic_hook::set_once();
    let config = OutlineConfig::from_env();
    logging::init(config.level_filter());
    log::info!("starting outline editor (debounce {}ms)", config.debounce_ms);
    mount_to_body(App);
}
