//! Preset and "current active preset" state.

use crate::binding::Bindings;
use crate::chain::ChainRow;
use crate::consts::{NUM_BINDING_ACTUATORS, NUM_BLOCK_CHAIN_ROWS, NUM_SCENES_PER_PRESET};

/// Background styling hint for a preset, opaque to the connector itself.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Background {
    /// Packed RGB(A) color.
    pub color: u32,
    /// Style identifier string, meaningful only to the UI.
    pub style: String,
}

/// A saved pedalboard configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct Preset {
    /// Index of the scene active when this preset was last saved.
    pub scene: u8,
    /// Display name.
    pub name: String,
    /// Source filename, if loaded from or saved to disk.
    pub filename: String,
    /// One binding list per hardware actuator.
    pub bindings: Vec<Bindings>,
    /// Background styling hint.
    pub background: Background,
    /// Display name for each scene slot.
    pub scene_names: [String; NUM_SCENES_PER_PRESET],
    /// Opaque preset identifier.
    pub uuid: [u8; 16],
    /// Chain rows.
    pub chains: Vec<ChainRow>,
}

impl Preset {
    /// An empty preset: no plugins loaded, no bindings, default scene names.
    pub fn empty() -> Self {
        Self {
            scene: 0,
            name: String::new(),
            filename: String::new(),
            bindings: (0..NUM_BINDING_ACTUATORS).map(|_| Bindings::default()).collect(),
            background: Background::default(),
            scene_names: std::array::from_fn(|_| String::new()),
            uuid: [0; 16],
            chains: (0..NUM_BLOCK_CHAIN_ROWS).map(|_| ChainRow::empty()).collect(),
        }
    }

    /// The block at `(row, block)`, if in range.
    pub fn block(&self, row: usize, block: usize) -> Option<&crate::block::Block> {
        self.chains.get(row)?.blocks.get(block)
    }

    /// Mutable access to the block at `(row, block)`, if in range.
    pub fn block_mut(&mut self, row: usize, block: usize) -> Option<&mut crate::block::Block> {
        self.chains.get_mut(row)?.blocks.get_mut(block)
    }
}

impl Default for Preset {
    fn default() -> Self {
        Self::empty()
    }
}

/// Tri-state dirty flag for the active preset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DirtyState {
    /// No unsaved changes.
    #[default]
    Clean,
    /// Unsaved changes affecting scene values only.
    DirtyScenesOnly,
    /// Unsaved changes affecting anything else.
    Dirty,
}

impl DirtyState {
    /// Whether this state should be treated as dirty for save-prompt purposes.
    pub fn is_dirty(self) -> bool {
        !matches!(self, DirtyState::Clean)
    }
}

/// The currently active preset, plus the extra bookkeeping that only makes
/// sense for the "live" slot (as opposed to a passive bank peer).
#[derive(Debug, Clone, PartialEq)]
pub struct Current {
    /// The active preset's own state.
    pub preset: Preset,
    /// Scene to switch to automatically on preset load, absent a saved scene state.
    pub default_scene: u8,
    /// Index of this preset within its bank.
    pub preset_index: u8,
    /// Count of plugin instances currently loaded for this preset.
    pub num_loaded_plugins: u32,
    /// Unsaved-changes tracking.
    pub dirty: DirtyState,
}

impl Current {
    /// A fresh current state wrapping an empty preset at bank index 0.
    pub fn empty() -> Self {
        Self {
            preset: Preset::empty(),
            default_scene: 0,
            preset_index: 0,
            num_loaded_plugins: 0,
            dirty: DirtyState::Clean,
        }
    }
}

impl Default for Current {
    fn default() -> Self {
        Self::empty()
    }
}
