//! JSON preset/bank persistence.
//!
//! Two on-disk shapes share one envelope: `{"version": N, "type": "preset"|"bank", ...}`.
//! A `"preset"` envelope carries one preset under `preset`; a `"bank"` envelope
//! carries exactly [`NUM_PRESETS_PER_BANK`] presets under `presets`. The loader
//! is deliberately permissive: every field is optional, an unresolvable plugin
//! URI demotes its cell to empty rather than failing the whole load, and
//! out-of-range parameter values are clamped. Everything it had to paper over
//! is returned alongside the model as a [`Diagnostic`] list.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::bank::Bank;
use crate::binding::{Bindings, ParameterBinding, PropertyBinding};
use crate::block::Block;
use crate::consts::{NUM_BINDING_ACTUATORS, NUM_PRESETS_PER_BANK, NUM_SCENE_VALUE_SLOTS};
use crate::error::PersistError;
use crate::preset::{Background, Preset};
use crate::validation::Diagnostic;
use modconn_metadata::PluginMetadataProvider;

/// Lowest `version` this loader accepts.
pub const MIN_SUPPORTED_VERSION: u32 = 1;
/// Highest `version` this loader accepts.
pub const MAX_SUPPORTED_VERSION: u32 = 1;
/// `version` written by [`save_preset_file`]/[`save_bank_file`].
pub const CURRENT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct PresetEnvelope {
    version: u32,
    #[serde(rename = "type")]
    kind: String,
    preset: PresetJson,
}

#[derive(Debug, Serialize, Deserialize)]
struct BankEnvelope {
    version: u32,
    #[serde(rename = "type")]
    kind: String,
    presets: Vec<PresetJson>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct PresetJson {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    background: Option<BackgroundJson>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    scenes: HashMap<String, SceneNameJson>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    bindings: HashMap<String, Vec<BindingJson>>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    blocks: HashMap<String, BlockJson>,
}

#[derive(Debug, Serialize, Deserialize)]
struct BackgroundJson {
    #[serde(default)]
    color: u32,
    #[serde(default)]
    style: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct SceneNameJson {
    #[serde(default)]
    name: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct BindingJson {
    block: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    row: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    symbol: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    property: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    min: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    max: Option<f32>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct BlockJson {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    quickpot: Option<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    parameters: HashMap<String, ParamJson>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    properties: HashMap<String, PropJson>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    scenes: HashMap<String, Vec<SceneEntryJson>>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ParamJson {
    symbol: String,
    value: f32,
}

#[derive(Debug, Serialize, Deserialize)]
struct PropJson {
    uri: String,
    value: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct SceneEntryJson {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    symbol: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    uri: Option<String>,
    value: serde_json::Value,
}

fn read_to_string(path: &Path) -> Result<String, PersistError> {
    std::fs::read_to_string(path).map_err(|e| PersistError::read_file(path, e))
}

fn write_string(path: &Path, content: &str) -> Result<(), PersistError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent).map_err(|e| PersistError::create_dir(parent, e))?;
        }
    }
    std::fs::write(path, content).map_err(|e| PersistError::write_file(path, e))
}

fn check_version(version: u32) -> Result<(), PersistError> {
    if (MIN_SUPPORTED_VERSION..=MAX_SUPPORTED_VERSION).contains(&version) {
        Ok(())
    } else {
        Err(PersistError::UnsupportedVersion {
            found: version,
            min: MIN_SUPPORTED_VERSION,
            max: MAX_SUPPORTED_VERSION,
        })
    }
}

/// Load a single-preset JSON file.
pub fn load_preset_file(
    path: impl AsRef<Path>,
    provider: &dyn PluginMetadataProvider,
) -> Result<(Preset, Vec<Diagnostic>), PersistError> {
    let path = path.as_ref();
    let content = read_to_string(path)?;
    let envelope: PresetEnvelope = serde_json::from_str(&content)?;
    check_version(envelope.version)?;
    if envelope.kind != "preset" {
        return Err(PersistError::WrongEnvelopeType { expected: "preset", found: envelope.kind });
    }

    let mut diagnostics = Vec::new();
    let mut preset = preset_from_json(envelope.preset, provider, &mut diagnostics);
    preset.filename = path.to_string_lossy().into_owned();
    Ok((preset, diagnostics))
}

/// Save a single preset as a `"preset"` envelope.
pub fn save_preset_file(path: impl AsRef<Path>, preset: &Preset) -> Result<(), PersistError> {
    let envelope = PresetEnvelope {
        version: CURRENT_VERSION,
        kind: "preset".to_string(),
        preset: preset_to_json(preset),
    };
    let content = serde_json::to_string_pretty(&envelope)?;
    write_string(path.as_ref(), &content)
}

/// Load a bank from one JSON file per preset (`paths.len()` must equal
/// [`NUM_PRESETS_PER_BANK`]).
pub fn load_bank_from_preset_files(
    paths: &[impl AsRef<Path>],
    provider: &dyn PluginMetadataProvider,
) -> Result<(Bank, Vec<Diagnostic>), PersistError> {
    if paths.len() != NUM_PRESETS_PER_BANK {
        return Err(PersistError::WrongPresetCount { found: paths.len(), expected: NUM_PRESETS_PER_BANK });
    }

    let mut diagnostics = Vec::new();
    let mut presets = Vec::with_capacity(paths.len());
    for path in paths {
        let (preset, mut diags) = load_preset_file(path, provider)?;
        diagnostics.append(&mut diags);
        presets.push(preset);
    }

    let bank = Bank::from_presets(presets)
        .expect("length checked above against NUM_PRESETS_PER_BANK");
    Ok((bank, diagnostics))
}

/// Load a bank from a single combined `"bank"` envelope file.
pub fn load_bank_file(
    path: impl AsRef<Path>,
    provider: &dyn PluginMetadataProvider,
) -> Result<(Bank, Vec<Diagnostic>), PersistError> {
    let path = path.as_ref();
    let content = read_to_string(path)?;
    let envelope: BankEnvelope = serde_json::from_str(&content)?;
    check_version(envelope.version)?;
    if envelope.kind != "bank" {
        return Err(PersistError::WrongEnvelopeType { expected: "bank", found: envelope.kind });
    }
    if envelope.presets.len() != NUM_PRESETS_PER_BANK {
        return Err(PersistError::WrongPresetCount {
            found: envelope.presets.len(),
            expected: NUM_PRESETS_PER_BANK,
        });
    }

    let mut diagnostics = Vec::new();
    let presets = envelope
        .presets
        .into_iter()
        .map(|p| preset_from_json(p, provider, &mut diagnostics))
        .collect();

    let bank = Bank::from_presets(presets)
        .expect("length checked above against NUM_PRESETS_PER_BANK");
    Ok((bank, diagnostics))
}

/// Save a bank as a single combined `"bank"` envelope file.
pub fn save_bank_file(path: impl AsRef<Path>, bank: &Bank) -> Result<(), PersistError> {
    let envelope = BankEnvelope {
        version: CURRENT_VERSION,
        kind: "bank".to_string(),
        presets: bank.iter().map(preset_to_json).collect(),
    };
    let content = serde_json::to_string_pretty(&envelope)?;
    write_string(path.as_ref(), &content)
}

fn preset_from_json(
    json: PresetJson,
    provider: &dyn PluginMetadataProvider,
    diagnostics: &mut Vec<Diagnostic>,
) -> Preset {
    let mut preset = Preset::empty();
    preset.name = json.name.unwrap_or_default();

    if let Some(bg) = json.background {
        preset.background = Background { color: bg.color, style: bg.style };
    }

    for (idx_str, scene) in json.scenes {
        if let Ok(idx) = idx_str.parse::<usize>() {
            if let Some(slot) = preset.scene_names.get_mut(idx) {
                *slot = scene.name;
            }
        }
    }

    for (actuator_str, entries) in json.bindings {
        let Ok(actuator) = actuator_str.parse::<usize>() else { continue };
        if actuator >= NUM_BINDING_ACTUATORS {
            continue;
        }
        let bindings = &mut preset.bindings[actuator];
        apply_binding_entries(bindings, entries);
    }

    for (key, block_json) in json.blocks {
        let Some((row, block)) = parse_cell_key(&key) else { continue };
        apply_block_json(&mut preset, row, block, block_json, provider, diagnostics);
    }

    preset
}

fn apply_binding_entries(bindings: &mut Bindings, entries: Vec<BindingJson>) {
    for entry in entries {
        let row = entry.row.unwrap_or(0);
        if let Some(symbol) = entry.symbol {
            bindings.parameters.push(ParameterBinding {
                row,
                block: entry.block,
                min: entry.min,
                max: entry.max,
                parameter_symbol: symbol,
                parameter_index: None,
                value_changes_not_saved: false,
            });
        } else if let Some(property) = entry.property {
            bindings.properties.push(PropertyBinding {
                row,
                block: entry.block,
                property_uri: property,
                property_index: None,
            });
        }
    }
}

fn parse_cell_key(key: &str) -> Option<(usize, usize)> {
    let (row_str, block_str) = key.split_once(':')?;
    Some((row_str.parse().ok()?, block_str.parse().ok()?))
}

fn apply_block_json(
    preset: &mut Preset,
    row: usize,
    block_idx: usize,
    json: BlockJson,
    provider: &dyn PluginMetadataProvider,
    diagnostics: &mut Vec<Diagnostic>,
) {
    let uri = json.uri.unwrap_or_default();
    if uri.is_empty() {
        return;
    }

    let Some(meta) = provider.lookup(&uri) else {
        diagnostics.push(Diagnostic::UnknownPluginUri {
            row: row as u8,
            block: block_idx as u8,
            uri,
        });
        return;
    };

    let mut block = Block::from_plugin_metadata(&uri, meta, NUM_SCENE_VALUE_SLOTS);
    block.enabled = json.enabled.unwrap_or(true);
    if let Some(qp) = json.quickpot {
        block.quick_pot_symbol = qp;
    }

    for param_json in json.parameters.into_values() {
        if let Some(idx) = block.parameter_index(&param_json.symbol) {
            let param = &mut block.parameters[idx];
            let clamped = param.clamp(param_json.value);
            if (clamped - param_json.value).abs() > f32::EPSILON {
                diagnostics.push(Diagnostic::ClampedParameterValue {
                    row: row as u8,
                    block: block_idx as u8,
                    symbol: param_json.symbol.clone(),
                    found: param_json.value,
                    clamped,
                });
            }
            param.value = clamped;
        }
    }

    for prop_json in json.properties.into_values() {
        if let Some(idx) = block.property_index(&prop_json.uri) {
            block.properties[idx].value = prop_json.value;
        }
    }

    for (scene_str, entries) in json.scenes {
        let Ok(scene_idx) = scene_str.parse::<usize>() else { continue };
        if scene_idx >= block.scene_values.len() {
            continue;
        }
        for entry in entries {
            apply_scene_entry(&mut block, scene_idx, entry, row, block_idx, diagnostics);
        }
    }

    if let Some(cell) = preset.block_mut(row, block_idx) {
        *cell = block;
    }
}

fn apply_scene_entry(
    block: &mut Block,
    scene_idx: usize,
    entry: SceneEntryJson,
    row: usize,
    block_idx: usize,
    diagnostics: &mut Vec<Diagnostic>,
) {
    if let Some(symbol) = entry.symbol {
        let Some(param_idx) = block.parameter_index(&symbol) else { return };
        if block.parameters[param_idx].meta.output {
            diagnostics.push(Diagnostic::IgnoredOutputOnlyScene {
                row: row as u8,
                block: block_idx as u8,
                symbol,
                scene: scene_idx as u8,
            });
            return;
        }
        let value = entry.value.as_f64().unwrap_or(0.0) as f32;
        let scene = &mut block.scene_values[scene_idx];
        scene.enabled = true;
        if scene.parameters.len() <= param_idx {
            scene.parameters.resize(param_idx + 1, Default::default());
        }
        scene.parameters[param_idx] = crate::scene::SceneSlot { used: true, value };
    } else if let Some(uri) = entry.uri {
        let Some(prop_idx) = block.property_index(&uri) else { return };
        let value = entry.value.as_str().unwrap_or_default().to_string();
        let scene = &mut block.scene_values[scene_idx];
        scene.enabled = true;
        if scene.properties.len() <= prop_idx {
            scene.properties.resize(prop_idx + 1, Default::default());
        }
        scene.properties[prop_idx] = crate::scene::SceneSlot { used: true, value };
    }
}

fn preset_to_json(preset: &Preset) -> PresetJson {
    let mut json = PresetJson {
        name: Some(preset.name.clone()),
        background: Some(BackgroundJson {
            color: preset.background.color,
            style: preset.background.style.clone(),
        }),
        scenes: HashMap::new(),
        bindings: HashMap::new(),
        blocks: HashMap::new(),
    };

    for (idx, name) in preset.scene_names.iter().enumerate() {
        if !name.is_empty() {
            json.scenes.insert(idx.to_string(), SceneNameJson { name: name.clone() });
        }
    }

    for (actuator, bindings) in preset.bindings.iter().enumerate() {
        if bindings.is_empty() {
            continue;
        }
        let mut entries = Vec::new();
        for binding in &bindings.parameters {
            entries.push(BindingJson {
                block: binding.block,
                row: Some(binding.row),
                symbol: Some(binding.parameter_symbol.clone()),
                property: None,
                min: binding.min,
                max: binding.max,
            });
        }
        for binding in &bindings.properties {
            entries.push(BindingJson {
                block: binding.block,
                row: Some(binding.row),
                symbol: None,
                property: Some(binding.property_uri.clone()),
                min: None,
                max: None,
            });
        }
        json.bindings.insert(actuator.to_string(), entries);
    }

    for (row_idx, chain) in preset.chains.iter().enumerate() {
        for (block_idx, block) in chain.blocks.iter().enumerate() {
            if block.is_empty() {
                continue;
            }
            json.blocks.insert(format!("{row_idx}:{block_idx}"), block_to_json(block));
        }
    }

    json
}

fn block_to_json(block: &Block) -> BlockJson {
    let mut parameters = HashMap::new();
    for (idx, param) in block.parameters.iter().enumerate() {
        parameters.insert(
            idx.to_string(),
            ParamJson { symbol: param.symbol.clone(), value: param.value },
        );
    }

    let mut properties = HashMap::new();
    for (idx, prop) in block.properties.iter().enumerate() {
        properties.insert(idx.to_string(), PropJson { uri: prop.uri.clone(), value: prop.value.clone() });
    }

    let mut scenes = HashMap::new();
    for (scene_idx, scene) in block.scene_values.iter().enumerate() {
        if !scene.enabled {
            continue;
        }
        let mut entries = Vec::new();
        for (param_idx, slot) in scene.parameters.iter().enumerate() {
            if !slot.used {
                continue;
            }
            if let Some(param) = block.parameters.get(param_idx) {
                entries.push(SceneEntryJson {
                    symbol: Some(param.symbol.clone()),
                    uri: None,
                    value: serde_json::json!(slot.value),
                });
            }
        }
        for (prop_idx, slot) in scene.properties.iter().enumerate() {
            if !slot.used {
                continue;
            }
            if let Some(prop) = block.properties.get(prop_idx) {
                entries.push(SceneEntryJson {
                    symbol: None,
                    uri: Some(prop.uri.clone()),
                    value: serde_json::json!(slot.value),
                });
            }
        }
        if !entries.is_empty() {
            scenes.insert(scene_idx.to_string(), entries);
        }
    }

    BlockJson {
        uri: Some(block.uri.clone()),
        enabled: Some(block.enabled),
        quickpot: Some(block.quick_pot_symbol.clone()),
        parameters,
        properties,
        scenes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use modconn_metadata::{InMemoryCatalogue, ParameterMetadata, PluginMetadata};

    fn catalogue() -> InMemoryCatalogue {
        let mut cat = InMemoryCatalogue::new();
        cat.insert(
            PluginMetadata::new("urn:test:gain", 2, 2)
                .with_parameter(ParameterMetadata::new("gain", -60.0, 12.0, 0.0)),
        );
        cat
    }

    #[test]
    fn round_trips_a_preset_with_one_block() {
        let cat = catalogue();
        let mut preset = Preset::empty();
        preset.name = "Test".to_string();
        let meta = cat.lookup("urn:test:gain").unwrap();
        let block = Block::from_plugin_metadata("urn:test:gain", meta, NUM_SCENE_VALUE_SLOTS);
        *preset.block_mut(0, 0).unwrap() = block;
        preset.block_mut(0, 0).unwrap().parameters[0].value = 3.0;

        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("preset.json");
        save_preset_file(&path, &preset).unwrap();

        let (loaded, diagnostics) = load_preset_file(&path, &cat).unwrap();
        assert!(diagnostics.is_empty());
        assert_eq!(loaded.name, "Test");
        assert_eq!(loaded.block(0, 0).unwrap().uri, "urn:test:gain");
        assert_eq!(loaded.block(0, 0).unwrap().parameters[0].value, 3.0);
    }

    #[test]
    fn unknown_uri_demotes_to_empty_cell_with_diagnostic() {
        let cat = catalogue();
        let json = r#"{"version":1,"type":"preset","preset":{"blocks":{"0:0":{"uri":"urn:test:missing"}}}}"#;
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("preset.json");
        std::fs::write(&path, json).unwrap();

        let (preset, diagnostics) = load_preset_file(&path, &cat).unwrap();
        assert!(preset.block(0, 0).unwrap().is_empty());
        assert_eq!(diagnostics.len(), 1);
        assert!(matches!(diagnostics[0], Diagnostic::UnknownPluginUri { .. }));
    }

    #[test]
    fn out_of_range_value_is_clamped_with_diagnostic() {
        let cat = catalogue();
        let json = r#"{"version":1,"type":"preset","preset":{"blocks":{"0:0":{"uri":"urn:test:gain","parameters":{"0":{"symbol":"gain","value":99.0}}}}}}"#;
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("preset.json");
        std::fs::write(&path, json).unwrap();

        let (preset, diagnostics) = load_preset_file(&path, &cat).unwrap();
        assert_eq!(preset.block(0, 0).unwrap().parameters[0].value, 12.0);
        assert_eq!(diagnostics.len(), 1);
    }

    #[test]
    fn rejects_unsupported_version() {
        let cat = catalogue();
        let json = r#"{"version":99,"type":"preset","preset":{}}"#;
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("preset.json");
        std::fs::write(&path, json).unwrap();

        let err = load_preset_file(&path, &cat).unwrap_err();
        assert!(matches!(err, PersistError::UnsupportedVersion { .. }));
    }

    #[test]
    fn load_bank_from_preset_files_requires_exact_count() {
        let cat = catalogue();
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("a.json");
        save_preset_file(&path, &Preset::empty()).unwrap();

        let err = load_bank_from_preset_files(&[&path], &cat).unwrap_err();
        assert!(matches!(err, PersistError::WrongPresetCount { .. }));
    }
}
