//! Hardware actuator bindings.

/// A binding from one actuator to one block's numeric parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterBinding {
    /// Chain row of the bound block.
    pub row: u8,
    /// Cell index of the bound block.
    pub block: u8,
    /// Range override minimum, falls back to the parameter's own minimum if absent.
    pub min: Option<f32>,
    /// Range override maximum, falls back to the parameter's own maximum if absent.
    pub max: Option<f32>,
    /// Symbol of the bound parameter.
    pub parameter_symbol: String,
    /// Resolved parameter index, cached at bind time; not persisted.
    pub parameter_index: Option<usize>,
    /// Whether changes driven through this binding should be excluded from persistence.
    pub value_changes_not_saved: bool,
}

/// A binding from one actuator to one block's property.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyBinding {
    /// Chain row of the bound block.
    pub row: u8,
    /// Cell index of the bound block.
    pub block: u8,
    /// URI of the bound property.
    pub property_uri: String,
    /// Resolved property index, cached at bind time; not persisted.
    pub property_index: Option<usize>,
}

/// A single actuator's ordered binding list and last-known fan-out value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Bindings {
    /// Display name for this actuator.
    pub name: String,
    /// Parameter bindings, in actuator order.
    pub parameters: Vec<ParameterBinding>,
    /// Property bindings, in actuator order.
    pub properties: Vec<PropertyBinding>,
    /// Normalized `[0, 1]` value last written through this actuator.
    pub value: f64,
}

impl Bindings {
    /// Whether this actuator has no bindings at all.
    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty() && self.properties.is_empty()
    }

    /// Remove every binding referencing `(row, block)`.
    pub fn remove_block(&mut self, row: u8, block: u8) {
        self.parameters.retain(|b| !(b.row == row && b.block == block));
        self.properties.retain(|b| !(b.row == row && b.block == block));
    }

    /// Apply `perm` to the block index of every binding referencing `row`.
    ///
    /// Used after `reorderBlock` shifts every cell between `orig` and `dest`
    /// by one position, to keep bindings attached to the plugin instance
    /// they were bound to, not the cell index.
    pub fn renumber_row(&mut self, row: u8, perm: impl Fn(u8) -> u8) {
        for binding in &mut self.parameters {
            if binding.row == row {
                binding.block = perm(binding.block);
            }
        }
        for binding in &mut self.properties {
            if binding.row == row {
                binding.block = perm(binding.block);
            }
        }
    }

    /// Retarget every binding referencing exactly `(row, block)` to
    /// `(new_row, new_block)`, possibly in a different row.
    ///
    /// Used after `swapBlockRow` moves a single block across rows, to keep
    /// bindings attached to the plugin instance they were bound to.
    pub fn retarget_block(&mut self, row: u8, block: u8, new_row: u8, new_block: u8) {
        for binding in &mut self.parameters {
            if binding.row == row && binding.block == block {
                binding.row = new_row;
                binding.block = new_block;
            }
        }
        for binding in &mut self.properties {
            if binding.row == row && binding.block == block {
                binding.row = new_row;
                binding.block = new_block;
            }
        }
    }
}
