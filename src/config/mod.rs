use serde::{Deserialize, Serialize};

/// Runtime knobs for the outline editor.
///
/// In the browser these come from `window.ENV` (see `OutlineConfig::from_env`); every field
/// falls back to its default.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct OutlineConfig {
    /// Quiet period before a text edit is committed.
    pub debounce_ms: u64,
    /// Horizontal push (px) past a row's left edge that turns "drop after" into "drop inside".
    pub drop_nest_threshold_px: f64,
    /// Smallest gap between sibling positions before siblings are renumbered.
    pub min_position_gap: f64,
    pub log_level: String,
    pub storage_prefix: String,
}

impl Default for OutlineConfig {
    fn default() -> Self {
        Self {
            debounce_ms: crate::outline::DEFAULT_QUIET_MS,
            drop_nest_threshold_px: 24.0,
            min_position_gap: crate::outline::MIN_POSITION_GAP,
            log_level: "info".to_string(),
            storage_prefix: "outline_snapshot".to_string(),
        }
    }
}

impl OutlineConfig {
    /// Reads `window.ENV`.
    ///
    /// Both `OUTLINE_DEBOUNCE_MS` and `outline_debounce_ms` are accepted; the
    /// upper-case key wins when both are set.
    pub fn from_env() -> Self {
        let Some(env) = web_sys::window()
            .and_then(|w| w.get("ENV"))
            .filter(|env| !env.is_undefined() && env.is_object())
        else {
            return Self::default();
        };

        Self::from_lookup(|key| {
            [format!("OUTLINE_{}", key.to_uppercase()), format!("outline_{key}")]
                .iter()
                .filter_map(|k| js_sys::Reflect::get(&env, &k.as_str().into()).ok())
                .find_map(|v| v.as_string().or_else(|| v.as_f64().map(|n| n.to_string())))
        })
    }

    /// Builds a config from a key lookup. Unparseable values are ignored.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        let mut cfg = Self::default();

        if let Some(v) = get("debounce_ms").and_then(|s| s.trim().parse::<u64>().ok()) {
            cfg.debounce_ms = v;
        }
        if let Some(v) = get("drop_nest_threshold_px")
            .and_then(|s| s.trim().parse::<f64>().ok())
            .filter(|v| v.is_finite() && *v >= 0.0)
        {
            cfg.drop_nest_threshold_px = v;
        }
        if let Some(v) = get("min_position_gap")
            .and_then(|s| s.trim().parse::<f64>().ok())
            .filter(|v| v.is_finite() && *v > 0.0)
        {
            cfg.min_position_gap = v;
        }
        if let Some(v) = get("log_level").filter(|s| !s.trim().is_empty()) {
            cfg.log_level = v.trim().to_string();
        }
        if let Some(v) = get("storage_prefix").filter(|s| !s.trim().is_empty()) {
            cfg.storage_prefix = v.trim().to_string();
        }

        cfg
    }

    pub fn level_filter(&self) -> log::LevelFilter {
        self.log_level
            .parse()
            .unwrap_or(log::LevelFilter::Info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let cfg = OutlineConfig::default();
        assert_eq!(cfg.debounce_ms, 300);
        assert_eq!(cfg.drop_nest_threshold_px, 24.0);
        assert_eq!(cfg.level_filter(), log::LevelFilter::Info);
    }

    #[test]
    fn test_from_lookup_overrides_and_ignores_garbage() {
        let env = HashMap::from([
            ("debounce_ms", "150"),
            ("drop_nest_threshold_px", "-3"),
            ("log_level", "debug"),
        ]);
        let cfg = OutlineConfig::from_lookup(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(cfg.debounce_ms, 150);
        assert_eq!(cfg.drop_nest_threshold_px, 24.0);
        assert_eq!(cfg.level_filter(), log::LevelFilter::Debug);
        assert_eq!(cfg.storage_prefix, "outline_snapshot");
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let cfg: OutlineConfig =
            serde_json::from_str(r#"{"debounce_ms": 500}"#).expect("config should parse");
        assert_eq!(cfg.debounce_ms, 500);
        assert_eq!(cfg.min_position_gap, 1e-9);
    }
}
