//! Feedback routing: translate a decoded [`FeedbackEvent`] into a
//! model-resolved [`ConnectorEvent`] (or a raw tool-instance event) and
//! dispatch it to the embedder's sink.
//!
//! Per spec.md §4.5, plugin instance IDs are resolved via the instance
//! mapper to `(row, block)`; the reserved tool-ID range at the top of the
//! engine's instance space never goes through the mapper and is dispatched
//! to a separate sink instead. Unknown IDs and unresolvable symbols/URIs are
//! dropped silently rather than surfaced as errors — the feedback stream is
//! best-effort and outliving a just-removed block is routine.

use modconn_mapper::InstanceMapper;
use modconn_model::Preset;
use modconn_proto::{FeedbackEvent, MAX_MOD_HOST_PLUGIN_INSTANCES};

use crate::events::{ConnectorEvent, EngineEventSink, ToolEventSink};

fn is_tool_instance(effect_id: i32) -> bool {
    effect_id >= i32::from(MAX_MOD_HOST_PLUGIN_INSTANCES)
}

fn resolve(preset_idx: usize, mapper: &InstanceMapper, effect_id: i32) -> Option<(usize, usize)> {
    if effect_id < 0 {
        return None;
    }
    mapper.get_block_with_id(preset_idx, effect_id as u16)
}

/// Resolve one decoded feedback event against the active preset and mapper,
/// applying whatever model mutation the event kind calls for, and dispatch
/// it to the appropriate sink.
///
/// Returns whether the event wrote a new value into the model that the
/// preset's dirty state should reflect (only a resolved, non-tool
/// `ParameterSet` does: an engine-originated change to a plugin's own
/// parameter is exactly as persistence-relevant as a user-driven one).
pub fn route(
    preset_idx: usize,
    mapper: &InstanceMapper,
    preset: &mut Preset,
    event: FeedbackEvent,
    sink: &mut dyn EngineEventSink,
    tool_sink: &mut dyn ToolEventSink,
) -> bool {
    match event {
        FeedbackEvent::AudioMonitor { index, value } => {
            sink.on_event(ConnectorEvent::AudioMonitor { index, value });
            false
        }
        FeedbackEvent::CpuLoad { avg, max, xruns } => {
            sink.on_event(ConnectorEvent::CpuLoad { avg, max, xruns });
            false
        }
        FeedbackEvent::ParameterSet { effect_id, symbol, value } => {
            if is_tool_instance(effect_id) {
                tool_sink.on_tool_event(effect_id, FeedbackEvent::ParameterSet { effect_id, symbol, value });
                return false;
            }
            let Some((row, block_idx)) = resolve(preset_idx, mapper, effect_id) else { return false };
            let Some(block) = preset.block_mut(row, block_idx) else { return false };
            let Some(idx) = block.parameter_index(&symbol) else { return false };
            block.parameters[idx].value = value;
            sink.on_event(ConnectorEvent::ParameterChanged { row, block: block_idx, symbol, value });
            true
        }
        FeedbackEvent::PatchSet { effect_id, key, value } => {
            if is_tool_instance(effect_id) {
                tool_sink.on_tool_event(effect_id, FeedbackEvent::PatchSet { effect_id, key, value });
                return false;
            }
            let Some((row, block_idx)) = resolve(preset_idx, mapper, effect_id) else { return false };
            sink.on_event(ConnectorEvent::PropertyChanged { row, block: block_idx, uri: key, value });
            false
        }
        FeedbackEvent::OutputMonitor { effect_id, symbol, value } => {
            if is_tool_instance(effect_id) {
                tool_sink.on_tool_event(
                    effect_id,
                    FeedbackEvent::OutputMonitor { effect_id, symbol, value },
                );
                return false;
            }
            // Never mutates the model: an output-only port's value is not
            // stored anywhere to overwrite.
            let Some((row, block_idx)) = resolve(preset_idx, mapper, effect_id) else { return false };
            sink.on_event(ConnectorEvent::OutputMonitor { row, block: block_idx, symbol, value });
            false
        }
        FeedbackEvent::MidiProgramChange { program, channel } => {
            sink.on_event(ConnectorEvent::MidiProgramChange { program, channel });
            false
        }
        FeedbackEvent::MidiMapped { effect_id, symbol, channel, controller, value, minimum, maximum } => {
            if is_tool_instance(effect_id) {
                tool_sink.on_tool_event(
                    effect_id,
                    FeedbackEvent::MidiMapped { effect_id, symbol, channel, controller, value, minimum, maximum },
                );
                return false;
            }
            let Some((row, block_idx)) = resolve(preset_idx, mapper, effect_id) else { return false };
            sink.on_event(ConnectorEvent::MidiMapped {
                row,
                block: block_idx,
                symbol,
                channel,
                controller,
                value,
                minimum,
                maximum,
            });
            false
        }
        FeedbackEvent::Transport { rolling, bpb, bpm } => {
            sink.on_event(ConnectorEvent::Transport { rolling, bpb, bpm });
            false
        }
        FeedbackEvent::Log { level, message } => {
            sink.on_event(ConnectorEvent::Log { level, message });
            false
        }
        FeedbackEvent::DataFinished => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use modconn_metadata::PluginMetadata;
    use modconn_model::Block;
    use modconn_proto::LogLevel;

    #[derive(Default)]
    struct RecordingSink {
        events: Vec<ConnectorEvent>,
    }

    impl EngineEventSink for RecordingSink {
        fn on_event(&mut self, event: ConnectorEvent) {
            self.events.push(event);
        }
    }

    #[derive(Default)]
    struct RecordingToolSink {
        events: Vec<(i32, FeedbackEvent)>,
    }

    impl ToolEventSink for RecordingToolSink {
        fn on_tool_event(&mut self, tool_instance: i32, event: FeedbackEvent) {
            self.events.push((tool_instance, event));
        }
    }

    fn preset_with_block(row: usize, block_idx: usize, mapper: &mut InstanceMapper, preset_idx: usize) -> Preset {
        let mut preset = Preset::empty();
        let meta = PluginMetadata::new("urn:test:gain", 1, 1)
            .with_parameter(modconn_metadata::ParameterMetadata::new("gain", -60.0, 12.0, 0.0));
        *preset.block_mut(row, block_idx).unwrap() = Block::from_plugin_metadata("urn:test:gain", &meta, 1);
        mapper.add(preset_idx, row, block_idx).unwrap();
        preset
    }

    #[test]
    fn parameter_set_resolves_cell_and_updates_model() {
        let mut mapper = InstanceMapper::new();
        let mut preset = preset_with_block(0, 0, &mut mapper, 0);
        let mut sink = RecordingSink::default();
        let mut tool_sink = RecordingToolSink::default();

        route(
            0,
            &mapper,
            &mut preset,
            FeedbackEvent::ParameterSet { effect_id: 0, symbol: "gain".into(), value: 3.0 },
            &mut sink,
            &mut tool_sink,
        );

        assert_eq!(preset.block(0, 0).unwrap().parameters[0].value, 3.0);
        assert_eq!(
            sink.events,
            vec![ConnectorEvent::ParameterChanged { row: 0, block: 0, symbol: "gain".into(), value: 3.0 }]
        );
        assert!(tool_sink.events.is_empty());
    }

    #[test]
    fn unknown_symbol_is_dropped_silently() {
        let mut mapper = InstanceMapper::new();
        let mut preset = preset_with_block(0, 0, &mut mapper, 0);
        let mut sink = RecordingSink::default();
        let mut tool_sink = RecordingToolSink::default();

        route(
            0,
            &mapper,
            &mut preset,
            FeedbackEvent::ParameterSet { effect_id: 0, symbol: "nope".into(), value: 3.0 },
            &mut sink,
            &mut tool_sink,
        );

        assert!(sink.events.is_empty());
    }

    #[test]
    fn unresolved_instance_id_is_dropped() {
        let mapper = InstanceMapper::new();
        let mut preset = Preset::empty();
        let mut sink = RecordingSink::default();
        let mut tool_sink = RecordingToolSink::default();

        route(
            0,
            &mapper,
            &mut preset,
            FeedbackEvent::ParameterSet { effect_id: 42, symbol: "gain".into(), value: 1.0 },
            &mut sink,
            &mut tool_sink,
        );

        assert!(sink.events.is_empty());
    }

    #[test]
    fn tool_instance_id_routes_to_tool_sink_not_model() {
        let mapper = InstanceMapper::new();
        let mut preset = Preset::empty();
        let mut sink = RecordingSink::default();
        let mut tool_sink = RecordingToolSink::default();

        let tool_id = i32::from(MAX_MOD_HOST_PLUGIN_INSTANCES) + 2;
        route(
            0,
            &mapper,
            &mut preset,
            FeedbackEvent::ParameterSet { effect_id: tool_id, symbol: "gain".into(), value: 1.0 },
            &mut sink,
            &mut tool_sink,
        );

        assert!(sink.events.is_empty());
        assert_eq!(tool_sink.events.len(), 1);
        assert_eq!(tool_sink.events[0].0, tool_id);
    }

    #[test]
    fn output_monitor_never_mutates_model() {
        let mut mapper = InstanceMapper::new();
        let mut preset = preset_with_block(0, 0, &mut mapper, 0);
        let before = preset.clone();
        let mut sink = RecordingSink::default();
        let mut tool_sink = RecordingToolSink::default();

        route(
            0,
            &mapper,
            &mut preset,
            FeedbackEvent::OutputMonitor { effect_id: 0, symbol: "meter".into(), value: -6.0 },
            &mut sink,
            &mut tool_sink,
        );

        assert_eq!(preset, before);
        assert_eq!(
            sink.events,
            vec![ConnectorEvent::OutputMonitor { row: 0, block: 0, symbol: "meter".into(), value: -6.0 }]
        );
    }

    #[test]
    fn passthrough_events_do_not_require_resolution() {
        let mapper = InstanceMapper::new();
        let mut preset = Preset::empty();
        let mut sink = RecordingSink::default();
        let mut tool_sink = RecordingToolSink::default();

        route(
            0,
            &mapper,
            &mut preset,
            FeedbackEvent::Log { level: LogLevel::Warn, message: "careful".into() },
            &mut sink,
            &mut tool_sink,
        );

        assert_eq!(sink.events, vec![ConnectorEvent::Log { level: LogLevel::Warn, message: "careful".into() }]);
    }

    #[test]
    fn data_finished_produces_no_event() {
        let mapper = InstanceMapper::new();
        let mut preset = Preset::empty();
        let mut sink = RecordingSink::default();
        let mut tool_sink = RecordingToolSink::default();

        route(0, &mapper, &mut preset, FeedbackEvent::DataFinished, &mut sink, &mut tool_sink);

        assert!(sink.events.is_empty());
        assert!(tool_sink.events.is_empty());
    }
}
