//! Integration tests for the pedalboard controller: reconciling user intents
//! against the model with a dummy (no-socket) engine client.

use std::sync::Mutex;

use modconn_connector::{BindingKind, Connector};
use modconn_metadata::{InMemoryCatalogue, ParameterMetadata, PluginMetadata};
use modconn_model::{persist, DirtyState, Preset, SceneMode, NUM_BLOCKS_PER_PRESET, NUM_PRESETS_PER_BANK};
use modconn_proto::EngineClient;

// `MOD_DEV_HOST` is a process-global env var read once at connect time; tests
// in this file run in the same process, so connecting is serialized through
// this lock to keep one test's dummy-mode window from leaking into another's.
static DUMMY_ENGINE_LOCK: Mutex<()> = Mutex::new(());

fn dummy_engine() -> EngineClient {
    let _guard = DUMMY_ENGINE_LOCK.lock().unwrap();
    std::env::set_var("MOD_DEV_HOST", "1");
    let client = EngineClient::connect().expect("dummy mode never fails to connect");
    std::env::remove_var("MOD_DEV_HOST");
    client
}

fn catalogue() -> InMemoryCatalogue {
    let mut cat = InMemoryCatalogue::new();
    cat.insert(
        PluginMetadata::new("urn:test:2in2out", 2, 2)
            .with_parameter(ParameterMetadata::new("gain", -60.0, 12.0, 0.0)),
    );
    cat.insert(PluginMetadata::new("urn:test:1in1out", 1, 1));
    cat
}

fn empty_bank_paths(dir: &tempfile::TempDir) -> Vec<std::path::PathBuf> {
    let cat = catalogue();
    (0..NUM_PRESETS_PER_BANK)
        .map(|i| {
            let path = dir.path().join(format!("preset_{i}.json"));
            persist::save_preset_file(&path, &Preset::empty()).unwrap();
            let _ = &cat;
            path
        })
        .collect()
}

#[test]
fn loading_an_empty_bank_leaves_no_blocks_and_clean_dirty_state() {
    let cat = catalogue();
    let dir = tempfile::TempDir::new().unwrap();
    let paths = empty_bank_paths(&dir);

    let mut connector = Connector::new(dummy_engine());
    let diagnostics = connector.load_bank_from_preset_files(&paths, 0, &cat).unwrap();

    assert!(diagnostics.is_empty());
    assert_eq!(connector.current().preset_index, 0);
    assert_eq!(connector.current().dirty, DirtyState::Clean);
    for block_idx in 0..NUM_BLOCKS_PER_PRESET {
        assert!(connector.current().preset.block(0, block_idx).unwrap().is_empty());
    }
}

#[test]
fn replace_block_loads_plugin_with_defaulted_parameters() {
    let cat = catalogue();
    let dir = tempfile::TempDir::new().unwrap();
    let paths = empty_bank_paths(&dir);
    let mut connector = Connector::new(dummy_engine());
    connector.load_bank_from_preset_files(&paths, 0, &cat).unwrap();

    connector.replace_block(0, 0, "urn:test:2in2out", false, &cat).unwrap();

    let block = connector.current().preset.block(0, 0).unwrap();
    assert_eq!(block.uri, "urn:test:2in2out");
    assert!(block.enabled);
    assert_eq!(block.parameters[0].symbol, "gain");
    assert_eq!(block.parameters[0].value, 0.0);
    assert_eq!(connector.current().dirty, DirtyState::Dirty);
}

#[test]
fn replace_block_with_empty_uri_clears_the_cell() {
    let cat = catalogue();
    let dir = tempfile::TempDir::new().unwrap();
    let paths = empty_bank_paths(&dir);
    let mut connector = Connector::new(dummy_engine());
    connector.load_bank_from_preset_files(&paths, 0, &cat).unwrap();
    connector.replace_block(0, 0, "urn:test:2in2out", false, &cat).unwrap();

    connector.replace_block(0, 0, "", false, &cat).unwrap();

    assert!(connector.current().preset.block(0, 0).unwrap().is_empty());
}

#[test]
fn replace_block_with_unknown_uri_fails_without_touching_model() {
    let cat = catalogue();
    let dir = tempfile::TempDir::new().unwrap();
    let paths = empty_bank_paths(&dir);
    let mut connector = Connector::new(dummy_engine());
    connector.load_bank_from_preset_files(&paths, 0, &cat).unwrap();

    let result = connector.replace_block(0, 0, "urn:test:does-not-exist", false, &cat);

    assert!(result.is_err());
    assert!(connector.last_error().is_some());
    assert!(connector.current().preset.block(0, 0).unwrap().is_empty());
}

#[test]
fn reorder_block_moves_element_and_preserves_the_rest() {
    let cat = catalogue();
    let dir = tempfile::TempDir::new().unwrap();
    let paths = empty_bank_paths(&dir);
    let mut connector = Connector::new(dummy_engine());
    connector.load_bank_from_preset_files(&paths, 0, &cat).unwrap();

    connector.replace_block(0, 0, "urn:test:2in2out", false, &cat).unwrap();
    connector.replace_block(0, 1, "urn:test:1in1out", false, &cat).unwrap();
    connector.replace_block(0, 2, "urn:test:1in1out", false, &cat).unwrap();

    // [A, B, C, _, _, _] -> reorder(0, 2) -> [B, C, A, _, _, _]
    connector.reorder_block(0, 0, 2).unwrap();

    let uris: Vec<&str> =
        connector.current().preset.chains[0].blocks.iter().map(|b| b.uri.as_str()).collect();
    assert_eq!(uris[0], "urn:test:1in1out");
    assert_eq!(uris[1], "urn:test:1in1out");
    assert_eq!(uris[2], "urn:test:2in2out");
}

#[test]
fn reorder_block_with_orig_equal_dest_is_rejected() {
    let cat = catalogue();
    let dir = tempfile::TempDir::new().unwrap();
    let paths = empty_bank_paths(&dir);
    let mut connector = Connector::new(dummy_engine());
    connector.load_bank_from_preset_files(&paths, 0, &cat).unwrap();

    let result = connector.reorder_block(0, 1, 1);

    assert!(result.is_err());
    assert!(connector.last_error().is_some());
}

#[test]
fn reorder_block_renumbers_bindings_in_the_disturbed_window() {
    let cat = catalogue();
    let dir = tempfile::TempDir::new().unwrap();
    let paths = empty_bank_paths(&dir);
    let mut connector = Connector::new(dummy_engine());
    connector.load_bank_from_preset_files(&paths, 0, &cat).unwrap();
    connector.replace_block(0, 0, "urn:test:2in2out", false, &cat).unwrap();
    connector.replace_block(0, 1, "urn:test:1in1out", false, &cat).unwrap();
    connector.replace_block(0, 2, "urn:test:1in1out", false, &cat).unwrap();
    connector.append_parameter_binding(0, 0, 0, "gain", None, None).unwrap();

    connector.reorder_block(0, 0, 2).unwrap();

    // The gain binding followed its plugin instance from cell 0 to cell 2.
    assert_eq!(connector.current().preset.bindings[0].parameters[0].block, 2);
}

#[test]
fn set_block_parameter_clamps_to_declared_range() {
    let cat = catalogue();
    let dir = tempfile::TempDir::new().unwrap();
    let paths = empty_bank_paths(&dir);
    let mut connector = Connector::new(dummy_engine());
    connector.load_bank_from_preset_files(&paths, 0, &cat).unwrap();
    connector.replace_block(0, 0, "urn:test:2in2out", false, &cat).unwrap();

    connector.set_block_parameter(0, 0, "gain", 999.0, SceneMode::Update).unwrap();

    assert_eq!(connector.current().preset.block(0, 0).unwrap().parameters[0].value, 12.0);
}

#[test]
fn set_block_parameter_on_unknown_symbol_fails() {
    let cat = catalogue();
    let dir = tempfile::TempDir::new().unwrap();
    let paths = empty_bank_paths(&dir);
    let mut connector = Connector::new(dummy_engine());
    connector.load_bank_from_preset_files(&paths, 0, &cat).unwrap();
    connector.replace_block(0, 0, "urn:test:2in2out", false, &cat).unwrap();

    let result = connector.set_block_parameter(0, 0, "does-not-exist", 1.0, SceneMode::Update);

    assert!(result.is_err());
}

#[test]
fn scene_write_lazily_captures_baseline_into_scene_zero() {
    let cat = catalogue();
    let dir = tempfile::TempDir::new().unwrap();
    let paths = empty_bank_paths(&dir);
    let mut connector = Connector::new(dummy_engine());
    connector.load_bank_from_preset_files(&paths, 0, &cat).unwrap();
    connector.replace_block(0, 0, "urn:test:2in2out", false, &cat).unwrap();

    connector.set_block_parameter(0, 0, "gain", 0.3, SceneMode::Update).unwrap();
    connector.switch_scene(2).unwrap();
    connector.set_block_parameter(0, 0, "gain", 0.7, SceneMode::Activate).unwrap();

    let block = connector.current().preset.block(0, 0).unwrap();
    assert!(block.meta.has_scenes);
    assert_eq!(block.scene_values[0].parameters[0], modconn_model::SceneSlot { used: true, value: 0.3 });
    assert_eq!(block.scene_values[2].parameters[0], modconn_model::SceneSlot { used: true, value: 0.7 });
    assert_eq!(block.parameters[0].value, 0.7);
}

#[test]
fn scene_write_reaches_the_last_named_scene_slot() {
    let cat = catalogue();
    let dir = tempfile::TempDir::new().unwrap();
    let paths = empty_bank_paths(&dir);
    let mut connector = Connector::new(dummy_engine());
    connector.load_bank_from_preset_files(&paths, 0, &cat).unwrap();
    connector.replace_block(0, 0, "urn:test:2in2out", false, &cat).unwrap();

    let last_scene = modconn_model::NUM_SCENES_PER_PRESET as u8;
    connector.switch_scene(last_scene).unwrap();
    connector.set_block_parameter(0, 0, "gain", 0.9, SceneMode::Activate).unwrap();

    let block = connector.current().preset.block(0, 0).unwrap();
    assert_eq!(
        block.scene_values[last_scene as usize].parameters[0],
        modconn_model::SceneSlot { used: true, value: 0.9 }
    );
}

#[test]
fn switch_scene_applies_only_used_slots_and_leaves_others_untouched() {
    let cat = catalogue();
    let dir = tempfile::TempDir::new().unwrap();
    let paths = empty_bank_paths(&dir);
    let mut connector = Connector::new(dummy_engine());
    connector.load_bank_from_preset_files(&paths, 0, &cat).unwrap();
    connector.replace_block(0, 0, "urn:test:2in2out", false, &cat).unwrap();

    connector.set_block_parameter(0, 0, "gain", 0.3, SceneMode::Update).unwrap();
    connector.switch_scene(1).unwrap();
    connector.set_block_parameter(0, 0, "gain", 0.9, SceneMode::Activate).unwrap();
    connector.switch_scene(0).unwrap();

    // Scene 0 is the captured baseline (the value before the first scene write).
    assert_eq!(connector.current().preset.block(0, 0).unwrap().parameters[0].value, 0.3);

    connector.switch_scene(1).unwrap();
    assert_eq!(connector.current().preset.block(0, 0).unwrap().parameters[0].value, 0.9);
}

#[test]
fn switch_preset_moves_active_index_and_preserves_edits_in_the_bank() {
    let cat = catalogue();
    let dir = tempfile::TempDir::new().unwrap();
    let paths = empty_bank_paths(&dir);
    let mut connector = Connector::new(dummy_engine());
    connector.load_bank_from_preset_files(&paths, 0, &cat).unwrap();
    connector.replace_block(0, 0, "urn:test:2in2out", false, &cat).unwrap();
    assert_eq!(connector.current().dirty, DirtyState::Dirty);

    connector.switch_preset(1).unwrap();

    assert_eq!(connector.current().preset_index, 1);
    assert_eq!(connector.current().dirty, DirtyState::Clean);
    assert_eq!(connector.bank().preset(0).unwrap().block(0, 0).unwrap().uri, "urn:test:2in2out");

    connector.switch_preset(0).unwrap();
    assert_eq!(connector.current().preset.block(0, 0).unwrap().uri, "urn:test:2in2out");
}

#[test]
fn switch_preset_to_the_current_index_is_a_no_op() {
    let cat = catalogue();
    let dir = tempfile::TempDir::new().unwrap();
    let paths = empty_bank_paths(&dir);
    let mut connector = Connector::new(dummy_engine());
    connector.load_bank_from_preset_files(&paths, 0, &cat).unwrap();
    connector.replace_block(0, 0, "urn:test:2in2out", false, &cat).unwrap();

    connector.switch_preset(0).unwrap();

    // Nothing was torn down and reloaded; the edit is still there and the
    // preset is still dirty since no-op doesn't route through the
    // clean-on-switch path.
    assert_eq!(connector.current().preset.block(0, 0).unwrap().uri, "urn:test:2in2out");
}

#[test]
fn save_then_load_round_trips_the_active_preset() {
    let cat = catalogue();
    let dir = tempfile::TempDir::new().unwrap();
    let paths = empty_bank_paths(&dir);
    let mut connector = Connector::new(dummy_engine());
    connector.load_bank_from_preset_files(&paths, 0, &cat).unwrap();
    connector.replace_block(0, 0, "urn:test:2in2out", false, &cat).unwrap();
    connector.set_block_parameter(0, 0, "gain", -6.0, SceneMode::Update).unwrap();

    let save_path = dir.path().join("saved.json");
    connector.save_current_preset_to_file(&save_path).unwrap();
    assert_eq!(connector.current().dirty, DirtyState::Clean);

    connector.replace_block(0, 0, "", false, &cat).unwrap();
    connector.load_current_preset_from_file(&save_path, false, &cat).unwrap();

    let block = connector.current().preset.block(0, 0).unwrap();
    assert_eq!(block.uri, "urn:test:2in2out");
    assert_eq!(block.parameters[0].value, -6.0);
}

#[test]
fn binding_append_remove_and_fan_out() {
    let cat = catalogue();
    let dir = tempfile::TempDir::new().unwrap();
    let paths = empty_bank_paths(&dir);
    let mut connector = Connector::new(dummy_engine());
    connector.load_bank_from_preset_files(&paths, 0, &cat).unwrap();
    connector.replace_block(0, 0, "urn:test:2in2out", false, &cat).unwrap();

    connector.append_parameter_binding(0, 0, 0, "gain", None, None).unwrap();
    assert_eq!(connector.current().preset.bindings[0].parameters.len(), 1);

    connector.set_binding_value(0, 0.5, SceneMode::Update).unwrap();
    // gain range is [-60, 12]; midpoint normalized value lands at -24.0.
    assert_eq!(connector.current().preset.block(0, 0).unwrap().parameters[0].value, -24.0);

    connector.remove_binding(0, BindingKind::Parameter, 0).unwrap();
    assert!(connector.current().preset.bindings[0].parameters.is_empty());
}

#[test]
fn binding_to_an_empty_cell_is_rejected() {
    let cat = catalogue();
    let dir = tempfile::TempDir::new().unwrap();
    let paths = empty_bank_paths(&dir);
    let mut connector = Connector::new(dummy_engine());
    connector.load_bank_from_preset_files(&paths, 0, &cat).unwrap();

    let result = connector.append_parameter_binding(0, 0, 0, "gain", None, None);

    assert!(result.is_err());
}

#[test]
fn enable_block_sets_bypass_and_marks_dirty() {
    let cat = catalogue();
    let dir = tempfile::TempDir::new().unwrap();
    let paths = empty_bank_paths(&dir);
    let mut connector = Connector::new(dummy_engine());
    connector.load_bank_from_preset_files(&paths, 0, &cat).unwrap();
    connector.replace_block(0, 0, "urn:test:2in2out", false, &cat).unwrap();
    connector.save_current_preset_to_file(&dir.path().join("clean.json")).unwrap();
    assert_eq!(connector.current().dirty, DirtyState::Clean);

    connector.enable_block(0, 0, false, SceneMode::Update).unwrap();

    assert!(!connector.current().preset.block(0, 0).unwrap().enabled);
    assert_eq!(connector.current().dirty, DirtyState::Dirty);
}

#[test]
fn enable_block_with_a_temporary_scene_mode_is_still_fully_dirty() {
    // enableBlock changes the block's own `enabled` flag, which is core
    // preset structure regardless of which scene mode accompanies the call
    // — it must never be folded into `DirtyScenesOnly`.
    let cat = catalogue();
    let dir = tempfile::TempDir::new().unwrap();
    let paths = empty_bank_paths(&dir);
    let mut connector = Connector::new(dummy_engine());
    connector.load_bank_from_preset_files(&paths, 0, &cat).unwrap();
    connector.replace_block(0, 0, "urn:test:2in2out", false, &cat).unwrap();
    connector.save_current_preset_to_file(&dir.path().join("clean.json")).unwrap();
    assert_eq!(connector.current().dirty, DirtyState::Clean);

    connector.enable_block(0, 0, false, SceneMode::ActivateTemporarily).unwrap();

    assert_eq!(connector.current().dirty, DirtyState::Dirty);
}

#[test]
fn enable_block_on_empty_cell_fails() {
    let cat = catalogue();
    let dir = tempfile::TempDir::new().unwrap();
    let paths = empty_bank_paths(&dir);
    let mut connector = Connector::new(dummy_engine());
    connector.load_bank_from_preset_files(&paths, 0, &cat).unwrap();

    let result = connector.enable_block(0, 0, false, SceneMode::Update);

    assert!(result.is_err());
}
