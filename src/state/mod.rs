use crate::config::OutlineConfig;
use leptos::prelude::*;

#[derive(Clone)]
pub(crate) struct AppState {
    pub config: StoredValue<OutlineConfig>,

    /// Prefix for entry ids minted in this page session.
    pub id_prefix: StoredValue<String>,

    /// When the current outline was last written to localStorage.
    pub last_saved_ms: RwSignal<Option<i64>>,

    /// Why the stored snapshot could not be used, if it could not.
    pub snapshot_error: RwSignal<Option<String>>,
}

impl AppState {
    pub fn new(config: OutlineConfig) -> Self {
        Self {
            config: StoredValue::new(config),
            id_prefix: StoredValue::new(crate::util::session_id_prefix()),
            last_saved_ms: RwSignal::new(None),
            snapshot_error: RwSignal::new(None),
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(OutlineConfig::from_env())
    }
}

#[derive(Clone)]
pub(crate) struct AppContext(pub AppState);
