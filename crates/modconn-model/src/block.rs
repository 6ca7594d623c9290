//! A single chain-row cell: empty, or hosting one plugin instance.

use crate::parameter::Parameter;
use crate::property::Property;
use crate::scene::{SceneValues, TemporarySceneState};
use modconn_metadata::PluginMetadata;

/// Derived, non-persisted metadata about a block's plugin, cached from
/// [`PluginMetadata`] at load time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BlockMeta {
    /// Whether this block currently has per-scene tracking enabled.
    pub has_scenes: bool,
    /// Hardware actuator bound to this block's bypass pseudo-parameter, if any.
    pub enable_hwbinding: Option<u8>,
    /// Pending temporary scene-state change to the enable flag.
    pub enable_temp_scene_state: TemporarySceneState,
    /// Index into `parameters` of the quick-pot target, if resolved.
    pub quick_pot_index: Option<usize>,
    /// Count of parameters currently tracked in at least one scene.
    pub num_parameters_in_scenes: usize,
    /// Count of properties currently tracked in at least one scene.
    pub num_properties_in_scenes: usize,
    /// Declared audio input port count.
    pub num_inputs: u8,
    /// Declared audio output port count.
    pub num_outputs: u8,
    /// Declared CV/sidechain input port count.
    pub num_side_inputs: u8,
    /// Declared CV/sidechain output port count.
    pub num_side_outputs: u8,
    /// Display name.
    pub name: String,
    /// Display abbreviation.
    pub abbreviation: String,
}

impl BlockMeta {
    fn from_plugin_metadata(meta: &PluginMetadata) -> Self {
        Self {
            num_inputs: meta.num_inputs,
            num_outputs: meta.num_outputs,
            num_side_inputs: meta.num_side_inputs,
            num_side_outputs: meta.num_side_outputs,
            name: meta.name.clone(),
            abbreviation: meta.abbreviation.clone(),
            ..Self::default()
        }
    }
}

/// A chain-row cell: either empty (`uri` is empty) or hosting one plugin.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Block {
    /// Whether the block is enabled (not bypassed).
    pub enabled: bool,
    /// Symbol of the parameter assigned to the quick-pot encoder, empty if none.
    pub quick_pot_symbol: String,
    /// Plugin URI; empty means the cell is unoccupied.
    pub uri: String,
    /// Derived metadata, not persisted.
    pub meta: BlockMeta,
    /// Dense parameter array, indexed by declaration order.
    pub parameters: Vec<Parameter>,
    /// Property list.
    pub properties: Vec<Property>,
    /// Per-scene override table, one entry per scene slot (scene 0 is baseline).
    pub scene_values: Vec<SceneValues>,
}

impl Block {
    /// The empty-cell sentinel block.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Whether this cell holds no plugin.
    pub fn is_empty(&self) -> bool {
        self.uri.is_empty()
    }

    /// Construct a freshly-loaded block from plugin metadata, with all
    /// parameters at their declared defaults and no scene tracking.
    ///
    /// `num_scene_slots` is the total count of scene-value slots to allocate
    /// (the baseline slot plus every named scene — see
    /// [`NUM_SCENE_VALUE_SLOTS`](crate::NUM_SCENE_VALUE_SLOTS)), not just the
    /// number of named scenes.
    pub fn from_plugin_metadata(uri: &str, meta: &PluginMetadata, num_scene_slots: usize) -> Self {
        let parameters = meta
            .parameters
            .iter()
            .map(|p| Parameter {
                symbol: p.symbol.clone(),
                value: p.default,
                meta: crate::parameter::ParameterMeta {
                    hwbinding: None,
                    temp_scene_state: TemporarySceneState::None,
                    active: true,
                    default: p.default,
                    min: p.min,
                    max: p.max,
                    name: p.name.clone(),
                    short_name: p.name.clone(),
                    unit: p.unit.clone(),
                    output: p.output,
                },
            })
            .collect();

        let properties = meta
            .properties
            .iter()
            .map(|p| Property {
                uri: p.uri.clone(),
                value: p.default.clone().unwrap_or_default(),
                meta: crate::property::PropertyMeta {
                    hwbinding: None,
                    temp_scene_state: TemporarySceneState::None,
                    default: None,
                    min: None,
                    max: None,
                    default_path: None,
                    name: p.name.clone(),
                    short_name: p.name.clone(),
                },
            })
            .collect();

        let mut block_meta = BlockMeta::from_plugin_metadata(meta);
        block_meta.quick_pot_index = meta
            .default_quick_pot()
            .or_else(|| meta.first_settable_parameter());

        let quick_pot_symbol = block_meta
            .quick_pot_index
            .and_then(|i| meta.parameters.get(i))
            .map(|p| p.symbol.clone())
            .unwrap_or_default();

        Self {
            enabled: true,
            quick_pot_symbol,
            uri: uri.to_string(),
            meta: block_meta,
            parameters,
            properties,
            scene_values: vec![SceneValues::new(); num_scene_slots],
        }
    }

    /// Index of a parameter by symbol, if present.
    pub fn parameter_index(&self, symbol: &str) -> Option<usize> {
        self.parameters.iter().position(|p| p.symbol == symbol)
    }

    /// Index of a property by URI, if present.
    pub fn property_index(&self, uri: &str) -> Option<usize> {
        self.properties.iter().position(|p| p.uri == uri)
    }
}
