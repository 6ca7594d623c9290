//! Debug-only argument validation.
//!
//! The original client asserted these shapes only in debug builds (`NDEBUG`
//! off), trusting the caller in release builds. The idiomatic Rust
//! equivalent is `debug_assert!` rather than a `cfg(debug_assertions)` stub:
//! the checks below are plain functions so callers can also use them in
//! tests, but call sites that only want the original's "free in release"
//! behavior should gate the call behind `debug_assert!` themselves, as
//! [`EngineClient`](crate::EngineClient)'s `transport`/`set_bpm`/`set_bpb`
//! already do for their numeric ranges.

/// A jack port name must be at least 3 characters and contain a `:`
/// separating client name from port name.
pub fn valid_jack_port(port: &str) -> bool {
    port.len() >= 3 && port.contains(':')
}

/// A parameter/control symbol must start with a letter or underscore and
/// contain only ASCII alphanumerics and underscores thereafter.
pub fn valid_symbol(symbol: &str) -> bool {
    let mut chars = symbol.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// A URI must contain a `:` and no space or double-quote (the latter would
/// break the protocol's lack of interior-quote escaping).
pub fn valid_uri(uri: &str) -> bool {
    uri.contains(':') && !uri.contains(' ') && !uri.contains('"')
}

/// An instance ID must be in the engine's plugin-instance range, or the `-1`
/// sentinel meaning "every instance" (only accepted by `remove`).
pub fn valid_instance(instance: i16, allow_all_sentinel: bool) -> bool {
    (0..crate::client::MAX_MOD_HOST_PLUGIN_INSTANCES).contains(&instance)
        || (allow_all_sentinel && instance == -1)
}
