//! Scene state: per-block parameter/property overrides, switchable at runtime.

/// Whether a just-made scene-related change is permanent or provisional.
///
/// A temporary change is discarded on the next preset switch if the preset
/// was never saved; a permanent one is written back on save.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TemporarySceneState {
    /// No pending temporary change.
    #[default]
    None,
    /// Scenes were just activated, but only temporarily.
    Activate,
    /// Scenes were just cleared, but only temporarily.
    Clear,
}

/// How a write to a block parameter/property/binding interacts with scenes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SceneMode {
    /// Enable scenes on this block if not already active.
    Activate,
    /// Sync all parameter values into the active scene (same effect as clearing it).
    Clear,
    /// Update the value only; do not activate scenes.
    Update,
    /// [`SceneMode::Activate`], but discarded if the preset is never saved.
    ActivateTemporarily,
    /// [`SceneMode::Clear`], but reverted if the preset is never saved.
    ClearTemporarily,
    /// [`SceneMode::Update`], but discarded if the preset is never saved.
    UpdateTemporarily,
}

impl SceneMode {
    /// Whether this mode should activate per-scene tracking for the block.
    pub fn activates(self) -> bool {
        matches!(self, SceneMode::Activate | SceneMode::ActivateTemporarily)
    }

    /// Whether this mode clears (re-syncs) the active scene's values.
    pub fn clears(self) -> bool {
        matches!(self, SceneMode::Clear | SceneMode::ClearTemporarily)
    }

    /// Whether this mode is one of the three "temporarily" variants.
    pub fn is_temporary(self) -> bool {
        matches!(
            self,
            SceneMode::ActivateTemporarily | SceneMode::ClearTemporarily | SceneMode::UpdateTemporarily
        )
    }
}

/// Recorded value for one `(block, scene)` pair — either a parameter value
/// or a property value string, keyed positionally by the block's parameter
/// or property index.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SceneSlot<T> {
    /// Whether this slot holds a meaningful value for this scene.
    pub used: bool,
    /// The recorded value.
    pub value: T,
}

impl<T: Default> Default for SceneSlot<T> {
    fn default() -> Self {
        Self { used: false, value: T::default() }
    }
}

/// One scene's worth of overrides for a single block.
///
/// Scene 0 is reserved as the "captured baseline" — the value a parameter
/// had immediately before its first scene-tracked write.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SceneValues {
    /// Whether scene tracking is active for this block at all.
    pub enabled: bool,
    /// Per-parameter-index override slots.
    pub parameters: Vec<SceneSlot<f32>>,
    /// Per-property-index override slots.
    pub properties: Vec<SceneSlot<String>>,
}

impl SceneValues {
    /// An empty, disabled scene-values record.
    pub fn new() -> Self {
        Self::default()
    }
}
