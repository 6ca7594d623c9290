//! Command framing: wrap arguments, build the wire form of each engine command.
//!
//! Commands are ASCII text, space-separated tokens, NUL-terminated (no
//! trailing newline). An argument containing a space is wrapped in double
//! quotes; there is no interior-quote escape in the current grammar (see
//! [`quote_if_needed`]'s doc comment and the crate-level design notes).

use std::fmt::Write as _;

/// Wrap `arg` in double quotes if it contains a space, otherwise return it
/// unchanged.
///
/// The engine's command grammar has no interior-quote escape: a value
/// containing `"` is not representable. This is a known limitation of the
/// protocol, not something this client can paper over.
pub fn quote_if_needed(arg: &str) -> String {
    if arg.contains(' ') {
        format!("\"{arg}\"")
    } else {
        arg.to_string()
    }
}

/// A flushed parameter value, as used by [`params_flush`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlushedParam<'a> {
    /// Parameter symbol.
    pub symbol: &'a str,
    /// Value to flush.
    pub value: f32,
}

/// Distinguishes a full parameter reset (as if freshly loaded) from a soft
/// reset (scene switch) in [`params_flush`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetTag {
    /// Apply all values as if the plugin was freshly instantiated.
    Full,
    /// Apply all values as part of a scene switch.
    Soft,
}

impl ResetTag {
    fn as_wire_value(self) -> u8 {
        match self {
            ResetTag::Full => 1,
            ResetTag::Soft => 0,
        }
    }
}

/// Processing on/off modes for `feature_enable processing <mode>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessingMode {
    /// Turn processing off, with fade out.
    OffWithFadeOut,
    /// Turn processing off immediately, muting right away.
    OffWithoutFadeOut,
    /// Regular off.
    Off,
    /// Regular on.
    On,
    /// Turn on while reporting feedback data ready.
    OnWithDataReady,
    /// Turn processing on, with fade in.
    OnWithFadeIn,
}

impl ProcessingMode {
    fn as_wire_value(self) -> i32 {
        match self {
            ProcessingMode::OffWithFadeOut => -1,
            ProcessingMode::OffWithoutFadeOut => -2,
            ProcessingMode::Off => 0,
            ProcessingMode::On => 1,
            ProcessingMode::OnWithDataReady => 2,
            ProcessingMode::OnWithFadeIn => 3,
        }
    }
}

pub(crate) fn add(uri: &str, instance: i16) -> String {
    format!("add {} {instance}", quote_if_needed(uri))
}

pub(crate) fn preload(uri: &str, instance: i16) -> String {
    format!("preload {} {instance}", quote_if_needed(uri))
}

pub(crate) fn remove(instance: i16) -> String {
    format!("remove {instance}")
}

pub(crate) fn activate(instance: i16, value: bool) -> String {
    format!("activate {instance} {}", value as u8)
}

pub(crate) fn bypass(instance: i16, value: bool) -> String {
    format!("bypass {instance} {}", value as u8)
}

pub(crate) fn connect(origin: &str, destination: &str) -> String {
    format!(
        "connect {} {}",
        quote_if_needed(origin),
        quote_if_needed(destination)
    )
}

pub(crate) fn disconnect(origin: &str, destination: &str) -> String {
    format!(
        "disconnect {} {}",
        quote_if_needed(origin),
        quote_if_needed(destination)
    )
}

pub(crate) fn disconnect_all(port: &str) -> String {
    format!("disconnect_all {}", quote_if_needed(port))
}

pub(crate) fn param_set(instance: i16, symbol: &str, value: f32) -> String {
    format!("param_set {instance} {symbol} {value}")
}

pub(crate) fn param_get(instance: i16, symbol: &str) -> String {
    format!("param_get {instance} {symbol}")
}

pub(crate) fn params_flush(instance: i16, reset: ResetTag, params: &[FlushedParam<'_>]) -> String {
    let mut msg = format!(
        "params_flush {instance} {} {}",
        reset.as_wire_value(),
        params.len()
    );
    for p in params {
        let _ = write!(msg, " {} {}", p.symbol, p.value);
    }
    msg
}

pub(crate) fn patch_set(instance: i16, uri: &str, value: &str) -> String {
    format!(
        "patch_set {instance} {} {}",
        quote_if_needed(uri),
        quote_if_needed(value)
    )
}

pub(crate) fn patch_get(instance: i16, uri: &str) -> String {
    format!("patch_get {instance} {}", quote_if_needed(uri))
}

pub(crate) fn monitor_audio_levels(port: &str, enable: bool) -> String {
    format!(
        "monitor_audio_levels {} {}",
        quote_if_needed(port),
        enable as u8
    )
}

pub(crate) fn monitor_output(instance: i16, symbol: &str, enable: bool) -> String {
    if enable {
        format!("monitor_output {instance} {symbol}")
    } else {
        format!("monitor_output_off {instance} {symbol}")
    }
}

pub(crate) fn feature_enable_processing(mode: ProcessingMode) -> String {
    format!("feature_enable processing {}", mode.as_wire_value())
}

pub(crate) fn output_data_ready() -> String {
    "output_data_ready".to_string()
}

pub(crate) fn transport(rolling: bool, bpb: f64, bpm: f64) -> String {
    format!("transport {} {bpb} {bpm}", rolling as u8)
}

pub(crate) fn set_bpm(bpm: f64) -> String {
    format!("set_bpm {bpm}")
}

pub(crate) fn set_bpb(bpb: f64) -> String {
    format!("set_bpb {bpb}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quotes_args_with_spaces() {
        assert_eq!(quote_if_needed("system:capture_1"), "system:capture_1");
        assert_eq!(quote_if_needed("a b"), "\"a b\"");
    }

    #[test]
    fn connect_wraps_only_space_containing_ports() {
        assert_eq!(
            connect("system:capture_1", "effect_0:in"),
            "connect system:capture_1 effect_0:in"
        );
    }

    #[test]
    fn params_flush_formats_count_and_pairs() {
        let params = [
            FlushedParam { symbol: "gain", value: 0.5 },
            FlushedParam { symbol: "tone", value: 1.0 },
        ];
        assert_eq!(
            params_flush(3, ResetTag::Soft, &params),
            "params_flush 3 0 2 gain 0.5 tone 1"
        );
    }

    #[test]
    fn processing_mode_wire_values() {
        assert_eq!(
            feature_enable_processing(ProcessingMode::OffWithFadeOut),
            "feature_enable processing -1"
        );
        assert_eq!(
            feature_enable_processing(ProcessingMode::OnWithFadeIn),
            "feature_enable processing 3"
        );
    }
}
