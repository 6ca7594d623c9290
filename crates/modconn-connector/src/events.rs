//! User-facing event types and the capability traits the controller drives
//! them through.
//!
//! Re-architected from a callback base class into a tagged-variant event
//! plus a narrow sink trait: the controller never holds a long-lived
//! reference back into an embedder, it only borrows one for the duration of
//! a single feedback poll.

use modconn_proto::{LogLevel, PatchValue};

/// One decoded, model-resolved feedback event, ready for an embedder to act
/// on (update a UI widget, forward to a remote bridge, log).
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectorEvent {
    /// A control-port parameter changed on a resolved block cell.
    ParameterChanged {
        /// Chain row of the originating block.
        row: usize,
        /// Cell index of the originating block.
        block: usize,
        /// Parameter symbol.
        symbol: String,
        /// New value, already written into the model.
        value: f32,
    },
    /// A patch property changed on a resolved block cell.
    PropertyChanged {
        /// Chain row of the originating block.
        row: usize,
        /// Cell index of the originating block.
        block: usize,
        /// Property URI.
        uri: String,
        /// New value, carried verbatim from the engine.
        value: PatchValue,
    },
    /// An output-only monitor port reported a new value. Never mutates the
    /// model; delivered read-only.
    OutputMonitor {
        /// Chain row of the originating block.
        row: usize,
        /// Cell index of the originating block.
        block: usize,
        /// Output port symbol.
        symbol: String,
        /// Reported value.
        value: f32,
    },
    /// Raw audio level meter update, by jack port monitor index (not
    /// resolved to a block cell).
    AudioMonitor {
        /// Monitor index as assigned by `monitor_audio_levels`.
        index: i32,
        /// Level in the engine's own units.
        value: f32,
    },
    /// Periodic CPU load report.
    CpuLoad {
        /// Average load percentage.
        avg: f32,
        /// Peak load percentage.
        max: f32,
        /// Xrun count since the engine started.
        xruns: u32,
    },
    /// Transport state changed.
    Transport {
        /// Whether transport is rolling.
        rolling: bool,
        /// Beats per bar.
        bpb: f32,
        /// Tempo.
        bpm: f32,
    },
    /// A MIDI CC mapping fired on a resolved block cell.
    MidiMapped {
        /// Chain row of the originating block.
        row: usize,
        /// Cell index of the originating block.
        block: usize,
        /// Parameter symbol.
        symbol: String,
        /// MIDI channel.
        channel: i8,
        /// MIDI CC controller number.
        controller: u8,
        /// Mapped value.
        value: f32,
        /// Mapping range minimum.
        minimum: f32,
        /// Mapping range maximum.
        maximum: f32,
    },
    /// A MIDI program change was received.
    MidiProgramChange {
        /// Program number.
        program: i8,
        /// MIDI channel.
        channel: i8,
    },
    /// A log line forwarded from the engine.
    Log {
        /// Severity/origin tag.
        level: LogLevel,
        /// Message text.
        message: String,
    },
}

/// Capability an embedder implements to receive resolved feedback events for
/// ordinary (non-tool) plugin instances.
///
/// One implementation per embedder (web UI bridge, HMI bridge, CLI harness);
/// none of those embedders are built by this crate.
pub trait EngineEventSink {
    /// Called once per resolved feedback event, in arrival order.
    fn on_event(&mut self, event: ConnectorEvent);
}

/// Capability an embedder implements to receive feedback events originating
/// from the reserved tool-instance ID range (the last
/// [`modconn_proto::MAX_MOD_HOST_TOOL_INSTANCES`] slots of the pool). Tool
/// instances are never tracked by the instance mapper and never resolve to a
/// `(row, block)` cell, so these are delivered as the raw decoded event
/// rather than a cell-resolved [`ConnectorEvent`].
pub trait ToolEventSink {
    /// Called once per tool-instance feedback event, in arrival order.
    fn on_tool_event(&mut self, tool_instance: i32, event: modconn_proto::FeedbackEvent);
}
