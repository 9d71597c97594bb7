pub(crate) fn now_ms() -> i64 {
    js_sys::Date::now().round() as i64
}

/// Monotonic-enough clock for debounce bookkeeping.
pub(crate) fn clock_ms() -> u64 {
    now_ms().max(0) as u64
}

/// Short random prefix for ids minted in this page session.
///
/// Falls back to the clock when no entropy source is available.
pub(crate) fn session_id_prefix() -> String {
    let mut buf = [0u8; 4];
    match getrandom::getrandom(&mut buf) {
        Ok(()) => hex(&buf),
        Err(_) => format!("{:x}", clock_ms()),
    }
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// `HH:MM:SS` in the browser's local timezone.
pub(crate) fn format_time_of_day(ms: i64) -> String {
    let d = js_sys::Date::new(&wasm_bindgen::JsValue::from_f64(ms as f64));
    format!(
        "{:02}:{:02}:{:02}",
        d.get_hours(),
        d.get_minutes(),
        d.get_seconds()
    )
}
