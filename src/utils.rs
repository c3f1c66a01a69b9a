/// Routes panics to `console.error` when the `console_error_panic_hook`
/// feature is on. Safe to call more than once.
pub fn set_panic_hook() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

/// Milliseconds from `performance.now()`.
pub fn now() -> f64 {
    web_sys::window()
        .and_then(|window| window.performance())
        .map_or(0.0, |performance| performance.now())
}
