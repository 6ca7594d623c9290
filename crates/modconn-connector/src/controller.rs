//! The pedalboard controller: owns the engine connection, the instance
//! arena, and the bank/current-preset model, and keeps all three in sync as
//! the editor drives operations against it.

use std::path::Path;

use modconn_mapper::{
    compute_dual_mono, connect_all, reconcile_plan, widen_range, CellIds, InstanceMapper,
    ReconcileAction,
};
use modconn_metadata::PluginMetadataProvider;
use modconn_model::{
    persist, Bank, Block, Current, Diagnostic, DirtyState, ParameterBinding, Preset,
    PropertyBinding, SceneMode, SceneSlot, SceneValues, NUM_BLOCKS_PER_PRESET, NUM_BLOCK_CHAIN_ROWS,
    NUM_PRESETS_PER_BANK, NUM_SCENE_VALUE_SLOTS,
};
use modconn_proto::{EngineClient, FlushedParam, ResetTag};

use crate::error::{ConnectorError, ConnectorResult};
use crate::events::{EngineEventSink, ToolEventSink};

use tracing::{debug, warn};

/// Which of a binding's two list a binding operation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingKind {
    /// A [`ParameterBinding`].
    Parameter,
    /// A [`PropertyBinding`].
    Property,
}

/// Owns the engine connection and the active bank/preset model, and
/// reconciles one against the other as the editor drives it.
///
/// Every public operation records its own failure in [`Connector::last_error`]
/// in addition to returning it, mirroring the "bool return plus sticky error
/// string" idiom the engine client itself uses.
pub struct Connector {
    engine: EngineClient,
    mapper: InstanceMapper,
    bank: Bank,
    current: Current,
    last_error: Option<String>,
}

impl Connector {
    /// Wrap an already-connected engine client with an empty bank and
    /// current preset.
    pub fn new(engine: EngineClient) -> Self {
        Self {
            engine,
            mapper: InstanceMapper::new(),
            bank: Bank::empty(),
            current: Current::empty(),
            last_error: None,
        }
    }

    /// The most recent operation's error message, if the last operation
    /// failed.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Read-only view of the active preset and its bookkeeping.
    pub fn current(&self) -> &Current {
        &self.current
    }

    /// Read-only view of the bank of peer presets.
    pub fn bank(&self) -> &Bank {
        &self.bank
    }

    fn track<T>(&mut self, result: ConnectorResult<T>) -> ConnectorResult<T> {
        if let Err(err) = &result {
            self.last_error = Some(err.to_string());
        } else {
            self.last_error = None;
        }
        result
    }

    fn touch_dirty(&mut self, scene_only: bool) {
        self.current.dirty = match (self.current.dirty, scene_only) {
            (DirtyState::Clean, true) => DirtyState::DirtyScenesOnly,
            (DirtyState::Clean, false) => DirtyState::Dirty,
            (DirtyState::DirtyScenesOnly, true) => DirtyState::DirtyScenesOnly,
            (DirtyState::DirtyScenesOnly, false) => DirtyState::Dirty,
            (DirtyState::Dirty, _) => DirtyState::Dirty,
        };
    }

    // ---- engine plumbing shared by several operations ----

    fn apply_port_ops(&mut self, ops: &[modconn_mapper::PortOp]) -> ConnectorResult<()> {
        use modconn_mapper::PortOp;
        for op in ops {
            match op {
                PortOp::Connect(a, b) => self.engine.connect(a, b)?,
                PortOp::Disconnect(a, b) => self.engine.disconnect(a, b)?,
                PortOp::DisconnectAll(port) => self.engine.disconnect_all(port)?,
            }
        }
        Ok(())
    }

    fn flush_block(&mut self, preset_idx: usize, row: usize, block_idx: usize, block: &Block) -> ConnectorResult<()> {
        let ids = self.mapper.get(preset_idx, row, block_idx);
        let Some(id) = ids.id else { return Ok(()) };

        if !block.parameters.is_empty() {
            let params: Vec<FlushedParam> = block
                .parameters
                .iter()
                .map(|p| FlushedParam { symbol: &p.symbol, value: p.value })
                .collect();
            self.engine.params_flush(id as i16, ResetTag::Full, &params)?;
            if let Some(pair) = ids.pair {
                self.engine.params_flush(pair as i16, ResetTag::Full, &params)?;
            }
        }
        for prop in &block.properties {
            self.engine.patch_set(id as i16, &prop.uri, &prop.value)?;
            if let Some(pair) = ids.pair {
                self.engine.patch_set(pair as i16, &prop.uri, &prop.value)?;
            }
        }
        Ok(())
    }

    fn apply_bypass(&mut self, preset_idx: usize, row: usize, block_idx: usize, enabled: bool) -> ConnectorResult<()> {
        let ids = self.mapper.get(preset_idx, row, block_idx);
        let Some(id) = ids.id else { return Ok(()) };
        self.engine.bypass(id as i16, !enabled)?;
        if let Some(pair) = ids.pair {
            self.engine.bypass(pair as i16, !enabled)?;
        }
        Ok(())
    }

    fn teardown_block(&mut self, preset_idx: usize, row: usize, block_idx: usize) -> ConnectorResult<()> {
        let ids = self.mapper.remove(preset_idx, row, block_idx);
        if let Some(id) = ids.id {
            self.engine.remove(id as i16)?;
        }
        if let Some(pair) = ids.pair {
            self.engine.remove(pair as i16)?;
        }
        Ok(())
    }

    /// Tear down every instance currently tracked by the mapper, across
    /// every preset slot, and reset the arena.
    fn teardown_everything(&mut self, num_rows: usize) -> ConnectorResult<()> {
        for preset_idx in 0..NUM_PRESETS_PER_BANK {
            for row in 0..num_rows {
                for block in 0..NUM_BLOCKS_PER_PRESET {
                    self.teardown_block(preset_idx, row, block)?;
                }
            }
        }
        self.mapper.reset();
        Ok(())
    }

    /// Allocate instances and push parameter/property state for one preset's
    /// worth of blocks. `active` controls whether instances are fully
    /// activated (`add`) or merely preloaded for a later fade-in switch, and
    /// whether the row's jack graph is actually wired.
    fn instantiate_preset(&mut self, preset_idx: usize, preset: &Preset, active: bool) -> ConnectorResult<()> {
        for (row_idx, chain) in preset.chains.iter().enumerate() {
            let dual_mono = compute_dual_mono(chain);
            for (block_idx, block) in chain.blocks.iter().enumerate() {
                if block.is_empty() {
                    continue;
                }
                let id = self
                    .mapper
                    .add(preset_idx, row_idx, block_idx)
                    .ok_or_else(|| ConnectorError::logic("instance pool exhausted"))?;
                if active {
                    self.engine.add(&block.uri, id as i16)?;
                } else {
                    self.engine.preload(&block.uri, id as i16)?;
                }
                if dual_mono[block_idx] {
                    let pair = self
                        .mapper
                        .add_pair(preset_idx, row_idx, block_idx)
                        .ok_or_else(|| ConnectorError::logic("instance pool exhausted"))?;
                    if active {
                        self.engine.add(&block.uri, pair as i16)?;
                    } else {
                        self.engine.preload(&block.uri, pair as i16)?;
                    }
                }
                self.flush_block(preset_idx, row_idx, block_idx, block)?;
                self.apply_bypass(preset_idx, row_idx, block_idx, block.enabled)?;
            }
            if active {
                let cell_ids: Vec<CellIds> =
                    (0..chain.blocks.len()).map(|b| self.mapper.get(preset_idx, row_idx, b)).collect();
                let range = (0, chain.blocks.len().saturating_sub(1));
                let ops = connect_all(chain, &cell_ids, &dual_mono, range);
                self.apply_port_ops(&ops)?;
            }
        }
        Ok(())
    }

    // ---- persistence ----

    /// Load a bank from one JSON preset file per slot, tear down whatever is
    /// currently instantiated, and bring the bank up: the preset at
    /// `initial_index` becomes active and wired, the other two are preloaded
    /// only.
    pub fn load_bank_from_preset_files(
        &mut self,
        paths: &[impl AsRef<Path>],
        initial_index: usize,
        provider: &dyn PluginMetadataProvider,
    ) -> ConnectorResult<Vec<Diagnostic>> {
        let result = (|| {
            if initial_index >= NUM_PRESETS_PER_BANK {
                return Err(ConnectorError::logic("preset index out of range"));
            }
            self.teardown_everything(NUM_BLOCK_CHAIN_ROWS)?;

            let (bank, diagnostics) = persist::load_bank_from_preset_files(paths, provider)?;
            self.bank = bank;
            let active_preset = self.bank.preset(initial_index).expect("index validated above").clone();
            self.current = Current {
                preset: active_preset,
                default_scene: 0,
                preset_index: initial_index as u8,
                num_loaded_plugins: 0,
                dirty: DirtyState::Clean,
            };

            for idx in 0..NUM_PRESETS_PER_BANK {
                let active = idx == initial_index;
                let preset = if active {
                    self.current.preset.clone()
                } else {
                    self.bank.preset(idx).expect("bank has NUM_PRESETS_PER_BANK slots").clone()
                };
                self.instantiate_preset(idx, &preset, active)?;
            }
            Ok(diagnostics)
        })();
        self.track(result)
    }

    /// Load a bank from a single JSON bank file (the alternate on-disk shape
    /// to [`Connector::load_bank_from_preset_files`]), tear down whatever is
    /// currently instantiated, and bring the bank up the same way.
    pub fn load_bank_from_single_file(
        &mut self,
        path: impl AsRef<Path>,
        initial_index: usize,
        provider: &dyn PluginMetadataProvider,
    ) -> ConnectorResult<Vec<Diagnostic>> {
        let result = (|| {
            if initial_index >= NUM_PRESETS_PER_BANK {
                return Err(ConnectorError::logic("preset index out of range"));
            }
            self.teardown_everything(NUM_BLOCK_CHAIN_ROWS)?;

            let (bank, diagnostics) = persist::load_bank_file(path, provider)?;
            self.bank = bank;
            let active_preset = self.bank.preset(initial_index).expect("index validated above").clone();
            self.current = Current {
                preset: active_preset,
                default_scene: 0,
                preset_index: initial_index as u8,
                num_loaded_plugins: 0,
                dirty: DirtyState::Clean,
            };

            for idx in 0..NUM_PRESETS_PER_BANK {
                let active = idx == initial_index;
                let preset = if active {
                    self.current.preset.clone()
                } else {
                    self.bank.preset(idx).expect("bank has NUM_PRESETS_PER_BANK slots").clone()
                };
                self.instantiate_preset(idx, &preset, active)?;
            }
            Ok(diagnostics)
        })();
        self.track(result)
    }

    /// Save the active bank (the active preset folded back into its slot) to
    /// a single JSON bank file.
    pub fn save_current_bank_to_file(&mut self, path: impl AsRef<Path>) -> ConnectorResult<()> {
        let result = (|| {
            let preset_idx = self.current.preset_index as usize;
            self.bank.replace(preset_idx, self.current.preset.clone());
            persist::save_bank_file(path, &self.bank)?;
            Ok(())
        })();
        self.track(result)
    }

    /// Replace the active preset's content from a single JSON file, tearing
    /// down and reinstantiating its engine instances. If `replace_default`,
    /// the loaded preset also becomes the bank's stored peer at the current
    /// index.
    pub fn load_current_preset_from_file(
        &mut self,
        path: impl AsRef<Path>,
        replace_default: bool,
        provider: &dyn PluginMetadataProvider,
    ) -> ConnectorResult<Vec<Diagnostic>> {
        let result = (|| {
            let preset_idx = self.current.preset_index as usize;
            for row in 0..self.current.preset.chains.len() {
                for block in 0..NUM_BLOCKS_PER_PRESET {
                    self.teardown_block(preset_idx, row, block)?;
                }
            }

            let (preset, diagnostics) = persist::load_preset_file(path, provider)?;
            if replace_default {
                self.bank.replace(preset_idx, preset.clone());
            }
            self.current.preset = preset;
            self.current.dirty = DirtyState::Clean;

            let snapshot = self.current.preset.clone();
            self.instantiate_preset(preset_idx, &snapshot, true)?;
            Ok(diagnostics)
        })();
        self.track(result)
    }

    /// Save the active preset to a single JSON file and clear its dirty flag.
    pub fn save_current_preset_to_file(&mut self, path: impl AsRef<Path>) -> ConnectorResult<()> {
        let result = (|| {
            persist::save_preset_file(path, &self.current.preset)?;
            self.current.dirty = DirtyState::Clean;
            Ok(())
        })();
        self.track(result)
    }

    // ---- preset/scene switching ----

    /// Switch the active preset slot, fading processing out, deactivating
    /// the outgoing preset's instances, activating the incoming preset's
    /// preloaded instances, and fading back in.
    ///
    /// The outgoing preset's live edits are folded back into the bank before
    /// the switch, so the bank's stored peer for that slot is always exactly
    /// what was last playing — there is no separately tracked "preloaded but
    /// stale" state to reconcile on the way back in.
    pub fn switch_preset(&mut self, new_index: usize) -> ConnectorResult<()> {
        let result = (|| {
            if new_index >= NUM_PRESETS_PER_BANK {
                return Err(ConnectorError::logic("preset index out of range"));
            }
            let old_index = self.current.preset_index as usize;
            if new_index == old_index {
                return Ok(());
            }

            self.bank.replace(old_index, self.current.preset.clone());
            let incoming = self.bank.preset(new_index).expect("index validated above").clone();

            {
                let mut guard = self.engine.fade_guarded_batch()?;
                for row in 0..self.current.preset.chains.len() {
                    for block in 0..NUM_BLOCKS_PER_PRESET {
                        let ids = self.mapper.get(old_index, row, block);
                        if let Some(id) = ids.id {
                            guard.client().activate(id as i16, false)?;
                        }
                        if let Some(pair) = ids.pair {
                            guard.client().activate(pair as i16, false)?;
                        }
                    }
                }
                for row in 0..incoming.chains.len() {
                    for block in 0..NUM_BLOCKS_PER_PRESET {
                        let ids = self.mapper.get(new_index, row, block);
                        if let Some(id) = ids.id {
                            guard.client().activate(id as i16, true)?;
                        }
                        if let Some(pair) = ids.pair {
                            guard.client().activate(pair as i16, true)?;
                        }
                    }
                }
            }

            for (row_idx, chain) in incoming.chains.iter().enumerate() {
                let dual_mono = compute_dual_mono(chain);
                let cell_ids: Vec<CellIds> =
                    (0..chain.blocks.len()).map(|b| self.mapper.get(new_index, row_idx, b)).collect();
                let range = (0, chain.blocks.len().saturating_sub(1));
                let ops = connect_all(chain, &cell_ids, &dual_mono, range);
                self.apply_port_ops(&ops)?;
            }

            self.current = Current {
                preset: incoming,
                default_scene: 0,
                preset_index: new_index as u8,
                num_loaded_plugins: 0,
                dirty: DirtyState::Clean,
            };
            debug!(old_index, new_index, "switched active preset");
            Ok(())
        })();
        self.track(result)
    }

    /// Switch the active scene, flushing every tracked parameter/property
    /// override into the engine and the model.
    pub fn switch_scene(&mut self, scene_index: u8) -> ConnectorResult<()> {
        let result = (|| {
            let preset_idx = self.current.preset_index as usize;
            let num_rows = self.current.preset.chains.len();
            for row in 0..num_rows {
                let num_blocks = self.current.preset.chains[row].blocks.len();
                for block_idx in 0..num_blocks {
                    let Some(block) = self.current.preset.block_mut(row, block_idx) else { continue };
                    if block.is_empty() || !block.meta.has_scenes {
                        continue;
                    }
                    let Some(scene) = block.scene_values.get(scene_index as usize) else { continue };
                    if !scene.enabled {
                        continue;
                    }

                    let mut flushed_params = Vec::new();
                    for (idx, slot) in scene.parameters.iter().enumerate() {
                        if slot.used {
                            if let Some(param) = block.parameters.get_mut(idx) {
                                param.value = slot.value;
                                flushed_params.push((idx, slot.value));
                            }
                        }
                    }
                    let flushed_props: Vec<(usize, String)> = scene
                        .properties
                        .iter()
                        .enumerate()
                        .filter(|(_, slot)| slot.used)
                        .map(|(idx, slot)| (idx, slot.value.clone()))
                        .collect();
                    for (idx, value) in &flushed_props {
                        if let Some(prop) = block.properties.get_mut(*idx) {
                            prop.value = value.clone();
                        }
                    }

                    let ids = self.mapper.get(preset_idx, row, block_idx);
                    let Some(id) = ids.id else { continue };
                    if !flushed_params.is_empty() {
                        let params: Vec<FlushedParam> = flushed_params
                            .iter()
                            .filter_map(|(idx, value)| {
                                self.current
                                    .preset
                                    .block(row, block_idx)
                                    .and_then(|b| b.parameters.get(*idx))
                                    .map(|p| FlushedParam { symbol: &p.symbol, value: *value })
                            })
                            .collect();
                        self.engine.params_flush(id as i16, ResetTag::Soft, &params)?;
                        if let Some(pair) = ids.pair {
                            self.engine.params_flush(pair as i16, ResetTag::Soft, &params)?;
                        }
                    }
                    for (idx, value) in &flushed_props {
                        let Some(uri) =
                            self.current.preset.block(row, block_idx).and_then(|b| b.properties.get(*idx)).map(|p| p.uri.clone())
                        else {
                            continue;
                        };
                        self.engine.patch_set(id as i16, &uri, value)?;
                        if let Some(pair) = ids.pair {
                            self.engine.patch_set(pair as i16, &uri, value)?;
                        }
                    }
                }
            }
            self.current.preset.scene = scene_index;
            self.touch_dirty(true);
            Ok(())
        })();
        self.track(result)
    }

    // ---- block operations ----

    /// Set a block's bypass state, optionally folding the change into the
    /// active scene via `scene_mode`.
    pub fn enable_block(&mut self, row: usize, block_idx: usize, enabled: bool, scene_mode: SceneMode) -> ConnectorResult<()> {
        let result = (|| {
            let preset_idx = self.current.preset_index as usize;
            let block = self
                .current
                .preset
                .block_mut(row, block_idx)
                .ok_or_else(|| ConnectorError::logic("cell out of range"))?;
            if block.is_empty() {
                return Err(ConnectorError::logic("cannot enable an empty cell"));
            }
            block.enabled = enabled;
            if scene_mode.activates() || scene_mode.clears() {
                block.meta.has_scenes = true;
                block.meta.enable_temp_scene_state =
                    if enabled { modconn_model::TemporarySceneState::Activate } else { modconn_model::TemporarySceneState::Clear };
            }
            self.apply_bypass(preset_idx, row, block_idx, enabled)?;
            self.touch_dirty(false);
            Ok(())
        })();
        self.track(result)
    }

    /// Replace the plugin loaded at a cell (or clear it, for an empty
    /// `uri`), re-running dual-mono reconciliation and rewiring the row.
    pub fn replace_block(
        &mut self,
        row: usize,
        block_idx: usize,
        uri: &str,
        clear_bindings: bool,
        provider: &dyn PluginMetadataProvider,
    ) -> ConnectorResult<()> {
        let result = (|| {
            let preset_idx = self.current.preset_index as usize;
            self.teardown_block(preset_idx, row, block_idx)?;

            if clear_bindings {
                for actuator in &mut self.current.preset.bindings {
                    actuator.remove_block(row as u8, block_idx as u8);
                }
            }

            let new_block = if uri.is_empty() {
                Block::empty()
            } else {
                let meta = provider.lookup(uri).ok_or_else(|| {
                    warn!(uri, row, block_idx, "unknown plugin uri on replaceBlock");
                    ConnectorError::logic(format!("unknown plugin uri: {uri}"))
                })?;
                Block::from_plugin_metadata(uri, meta, NUM_SCENE_VALUE_SLOTS)
            };

            let chain = self
                .current
                .preset
                .chains
                .get_mut(row)
                .ok_or_else(|| ConnectorError::logic("row out of range"))?;
            if block_idx >= chain.blocks.len() {
                return Err(ConnectorError::logic("block out of range"));
            }
            chain.blocks[block_idx] = new_block;

            let dual_mono = compute_dual_mono(chain);
            if !chain.blocks[block_idx].is_empty() {
                let id = self
                    .mapper
                    .add(preset_idx, row, block_idx)
                    .ok_or_else(|| ConnectorError::logic("instance pool exhausted"))?;
                self.engine.add(&chain.blocks[block_idx].uri.clone(), id as i16)?;
                if dual_mono[block_idx] {
                    let pair = self
                        .mapper
                        .add_pair(preset_idx, row, block_idx)
                        .ok_or_else(|| ConnectorError::logic("instance pool exhausted"))?;
                    self.engine.add(&self.current.preset.chains[row].blocks[block_idx].uri.clone(), pair as i16)?;
                }
                let block_snapshot = self.current.preset.chains[row].blocks[block_idx].clone();
                self.flush_block(preset_idx, row, block_idx, &block_snapshot)?;
                self.apply_bypass(preset_idx, row, block_idx, block_snapshot.enabled)?;
            }

            let chain = &self.current.preset.chains[row];
            let dual_mono = compute_dual_mono(chain);
            let range = widen_range(block_idx, chain.blocks.len());
            let cell_ids: Vec<CellIds> = (0..chain.blocks.len()).map(|b| self.mapper.get(preset_idx, row, b)).collect();
            let ops = connect_all(chain, &cell_ids, &dual_mono, range);
            self.apply_port_ops(&ops)?;

            self.touch_dirty(false);
            Ok(())
        })();
        self.track(result)
    }

    /// Move a block from `orig` to `dest` within a row, shifting the blocks
    /// between them and renumbering any bindings that referenced a shifted
    /// cell.
    pub fn reorder_block(&mut self, row: usize, orig: usize, dest: usize) -> ConnectorResult<()> {
        let result = (|| {
            if orig == dest {
                return Err(ConnectorError::logic("reorderBlock requires orig != dest"));
            }
            let preset_idx = self.current.preset_index as usize;
            self.mapper.reorder(preset_idx, row, orig, dest);

            let chain = self
                .current
                .preset
                .chains
                .get_mut(row)
                .ok_or_else(|| ConnectorError::logic("row out of range"))?;
            let moved = chain.blocks.remove(orig);
            chain.blocks.insert(dest, moved);

            let perm = shift_permutation(orig, dest);
            let row_u8 = row as u8;
            for actuator in &mut self.current.preset.bindings {
                actuator.renumber_row(row_u8, |b| perm(b as usize) as u8);
            }

            let chain = &self.current.preset.chains[row];
            let dual_mono = compute_dual_mono(chain);
            let lo = orig.min(dest);
            let hi = orig.max(dest);
            let range = (lo.saturating_sub(1), (hi + 1).min(chain.blocks.len().saturating_sub(1)));
            let cell_ids: Vec<CellIds> = (0..chain.blocks.len()).map(|b| self.mapper.get(preset_idx, row, b)).collect();
            let ops = connect_all(chain, &cell_ids, &dual_mono, range);
            self.apply_port_ops(&ops)?;

            self.touch_dirty(false);
            Ok(())
        })();
        self.track(result)
    }

    /// Move a block from one row's cell to another row's empty cell.
    ///
    /// Dual-mono reconciliation runs over both the source and destination
    /// rows after the move, since either row's upstream-stereo propagation
    /// can change as a result.
    pub fn swap_block_row(&mut self, src_row: usize, src_block: usize, dst_row: usize, dst_block: usize) -> ConnectorResult<()> {
        let result = (|| {
            let dest_occupied = self
                .current
                .preset
                .block(dst_row, dst_block)
                .map(|b| !b.is_empty())
                .ok_or_else(|| ConnectorError::logic("destination cell out of range"))?;
            if dest_occupied {
                return Err(ConnectorError::logic("destination cell must be empty"));
            }
            let preset_idx = self.current.preset_index as usize;
            self.mapper.swap(preset_idx, src_row, src_block, dst_row, dst_block);

            let moved = std::mem::replace(
                &mut self.current.preset.chains[src_row].blocks[src_block],
                Block::empty(),
            );
            self.current.preset.chains[dst_row].blocks[dst_block] = moved;

            let (src_row_u8, src_block_u8) = (src_row as u8, src_block as u8);
            let (dst_row_u8, dst_block_u8) = (dst_row as u8, dst_block as u8);
            for actuator in &mut self.current.preset.bindings {
                actuator.retarget_block(src_row_u8, src_block_u8, dst_row_u8, dst_block_u8);
            }

            for &row in &[src_row, dst_row] {
                self.reconcile_row_pairs(preset_idx, row)?;
                let chain = &self.current.preset.chains[row];
                let dual_mono = compute_dual_mono(chain);
                let range = (0, chain.blocks.len().saturating_sub(1));
                let cell_ids: Vec<CellIds> = (0..chain.blocks.len()).map(|b| self.mapper.get(preset_idx, row, b)).collect();
                let ops = connect_all(chain, &cell_ids, &dual_mono, range);
                self.apply_port_ops(&ops)?;
            }

            self.touch_dirty(false);
            Ok(())
        })();
        self.track(result)
    }

    fn reconcile_row_pairs(&mut self, preset_idx: usize, row: usize) -> ConnectorResult<()> {
        let chain = &self.current.preset.chains[row];
        let dual_mono = compute_dual_mono(chain);
        let cell_ids: Vec<CellIds> = (0..chain.blocks.len()).map(|b| self.mapper.get(preset_idx, row, b)).collect();
        let actions = reconcile_plan(&cell_ids, &dual_mono);
        for action in actions {
            match action {
                ReconcileAction::AllocatePair(block_idx) => {
                    let uri = self.current.preset.chains[row].blocks[block_idx].uri.clone();
                    let pair = self
                        .mapper
                        .add_pair(preset_idx, row, block_idx)
                        .ok_or_else(|| ConnectorError::logic("instance pool exhausted"))?;
                    self.engine.add(&uri, pair as i16)?;
                    let block_snapshot = self.current.preset.chains[row].blocks[block_idx].clone();
                    self.flush_block(preset_idx, row, block_idx, &block_snapshot)?;
                    self.apply_bypass(preset_idx, row, block_idx, block_snapshot.enabled)?;
                }
                ReconcileAction::FreePair(block_idx) => {
                    if let Some(pair) = self.mapper.remove_pair(preset_idx, row, block_idx) {
                        self.engine.remove(pair as i16)?;
                    }
                }
            }
        }
        Ok(())
    }

    /// Set one control-port parameter on a block, optionally folding the
    /// change into the active scene.
    pub fn set_block_parameter(
        &mut self,
        row: usize,
        block_idx: usize,
        symbol: &str,
        value: f32,
        scene_mode: SceneMode,
    ) -> ConnectorResult<()> {
        let result = (|| {
            let preset_idx = self.current.preset_index as usize;
            let active_scene = self.current.preset.scene as usize;
            let block = self
                .current
                .preset
                .block_mut(row, block_idx)
                .ok_or_else(|| ConnectorError::logic("cell out of range"))?;
            if block.is_empty() {
                return Err(ConnectorError::logic("cannot set a parameter on an empty cell"));
            }
            let param_idx = block
                .parameter_index(symbol)
                .ok_or_else(|| ConnectorError::logic(format!("unknown parameter: {symbol}")))?;
            let clamped = block.parameters[param_idx].clamp(value);
            let old_value = block.parameters[param_idx].value;
            block.parameters[param_idx].value = clamped;

            if scene_mode.activates() {
                record_scene_param(block, active_scene, param_idx, clamped, old_value);
            } else if scene_mode.clears() {
                block.meta.has_scenes = true;
                let values: Vec<(usize, f32)> = block.parameters.iter().map(|p| p.value).enumerate().collect();
                for (idx, v) in values {
                    record_scene_param(block, active_scene, idx, v, v);
                }
            }

            let ids = self.mapper.get(preset_idx, row, block_idx);
            if let Some(id) = ids.id {
                self.engine.param_set(id as i16, symbol, clamped)?;
                if let Some(pair) = ids.pair {
                    self.engine.param_set(pair as i16, symbol, clamped)?;
                }
            }

            self.touch_dirty(scene_mode.is_temporary() || matches!(scene_mode, SceneMode::Activate | SceneMode::Clear));
            Ok(())
        })();
        self.track(result)
    }

    /// Set one patch property on a block, optionally folding the change
    /// into the active scene.
    pub fn set_block_property(
        &mut self,
        row: usize,
        block_idx: usize,
        uri: &str,
        value: &str,
        scene_mode: SceneMode,
    ) -> ConnectorResult<()> {
        let result = (|| {
            let preset_idx = self.current.preset_index as usize;
            let active_scene = self.current.preset.scene as usize;
            let block = self
                .current
                .preset
                .block_mut(row, block_idx)
                .ok_or_else(|| ConnectorError::logic("cell out of range"))?;
            if block.is_empty() {
                return Err(ConnectorError::logic("cannot set a property on an empty cell"));
            }
            let prop_idx = block
                .property_index(uri)
                .ok_or_else(|| ConnectorError::logic(format!("unknown property: {uri}")))?;
            let old_value = block.properties[prop_idx].value.clone();
            block.properties[prop_idx].value = value.to_string();

            if scene_mode.activates() {
                record_scene_property(block, active_scene, prop_idx, value.to_string(), old_value);
            } else if scene_mode.clears() {
                block.meta.has_scenes = true;
                let values: Vec<(usize, String)> =
                    block.properties.iter().map(|p| p.value.clone()).enumerate().collect();
                for (idx, v) in values {
                    record_scene_property(block, active_scene, idx, v.clone(), v);
                }
            }

            let ids = self.mapper.get(preset_idx, row, block_idx);
            if let Some(id) = ids.id {
                self.engine.patch_set(id as i16, uri, value)?;
                if let Some(pair) = ids.pair {
                    self.engine.patch_set(pair as i16, uri, value)?;
                }
            }

            self.touch_dirty(scene_mode.is_temporary() || matches!(scene_mode, SceneMode::Activate | SceneMode::Clear));
            Ok(())
        })();
        self.track(result)
    }

    // ---- bindings ----

    /// Append a new parameter binding to an actuator's list.
    pub fn append_parameter_binding(
        &mut self,
        actuator: usize,
        row: u8,
        block: u8,
        symbol: &str,
        min: Option<f32>,
        max: Option<f32>,
    ) -> ConnectorResult<()> {
        let result = (|| {
            let idx = self
                .current
                .preset
                .block(row as usize, block as usize)
                .filter(|b| !b.is_empty())
                .ok_or_else(|| ConnectorError::logic("cannot bind an empty cell"))?
                .parameter_index(symbol)
                .ok_or_else(|| ConnectorError::logic(format!("unknown parameter: {symbol}")))?;

            let actuator_bindings = self
                .current
                .preset
                .bindings
                .get_mut(actuator)
                .ok_or_else(|| ConnectorError::logic("actuator out of range"))?;
            actuator_bindings.parameters.push(ParameterBinding {
                row,
                block,
                min,
                max,
                parameter_symbol: symbol.to_string(),
                parameter_index: Some(idx),
                value_changes_not_saved: false,
            });

            if let Some(b) = self.current.preset.block_mut(row as usize, block as usize) {
                b.parameters[idx].meta.hwbinding = Some(actuator as u8);
            }
            self.touch_dirty(false);
            Ok(())
        })();
        self.track(result)
    }

    /// Append a new property binding to an actuator's list.
    pub fn append_property_binding(&mut self, actuator: usize, row: u8, block: u8, uri: &str) -> ConnectorResult<()> {
        let result = (|| {
            let idx = self
                .current
                .preset
                .block(row as usize, block as usize)
                .filter(|b| !b.is_empty())
                .ok_or_else(|| ConnectorError::logic("cannot bind an empty cell"))?
                .property_index(uri)
                .ok_or_else(|| ConnectorError::logic(format!("unknown property: {uri}")))?;

            let actuator_bindings = self
                .current
                .preset
                .bindings
                .get_mut(actuator)
                .ok_or_else(|| ConnectorError::logic("actuator out of range"))?;
            actuator_bindings.properties.push(PropertyBinding {
                row,
                block,
                property_uri: uri.to_string(),
                property_index: Some(idx),
            });

            if let Some(b) = self.current.preset.block_mut(row as usize, block as usize) {
                b.properties[idx].meta.hwbinding = Some(actuator as u8);
            }
            self.touch_dirty(false);
            Ok(())
        })();
        self.track(result)
    }

    /// Remove the binding at `index` in an actuator's parameter or property
    /// list.
    pub fn remove_binding(&mut self, actuator: usize, kind: BindingKind, index: usize) -> ConnectorResult<()> {
        let result = (|| {
            let actuator_bindings = self
                .current
                .preset
                .bindings
                .get_mut(actuator)
                .ok_or_else(|| ConnectorError::logic("actuator out of range"))?;
            match kind {
                BindingKind::Parameter => {
                    if index >= actuator_bindings.parameters.len() {
                        return Err(ConnectorError::logic("binding index out of range"));
                    }
                    actuator_bindings.parameters.remove(index);
                }
                BindingKind::Property => {
                    if index >= actuator_bindings.properties.len() {
                        return Err(ConnectorError::logic("binding index out of range"));
                    }
                    actuator_bindings.properties.remove(index);
                }
            }
            self.touch_dirty(false);
            Ok(())
        })();
        self.track(result)
    }

    /// Move a binding within an actuator's parameter or property list.
    pub fn reorder_binding(&mut self, actuator: usize, kind: BindingKind, orig: usize, dest: usize) -> ConnectorResult<()> {
        let result = (|| {
            let actuator_bindings = self
                .current
                .preset
                .bindings
                .get_mut(actuator)
                .ok_or_else(|| ConnectorError::logic("actuator out of range"))?;
            match kind {
                BindingKind::Parameter => {
                    if orig >= actuator_bindings.parameters.len() || dest >= actuator_bindings.parameters.len() {
                        return Err(ConnectorError::logic("binding index out of range"));
                    }
                    let moved = actuator_bindings.parameters.remove(orig);
                    actuator_bindings.parameters.insert(dest, moved);
                }
                BindingKind::Property => {
                    if orig >= actuator_bindings.properties.len() || dest >= actuator_bindings.properties.len() {
                        return Err(ConnectorError::logic("binding index out of range"));
                    }
                    let moved = actuator_bindings.properties.remove(orig);
                    actuator_bindings.properties.insert(dest, moved);
                }
            }
            self.touch_dirty(false);
            Ok(())
        })();
        self.track(result)
    }

    /// Fan a normalized `[0, 1]` actuator value out to every parameter and
    /// property bound to it, scaling with each binding's own range override
    /// (falling back to the parameter's declared range).
    pub fn set_binding_value(&mut self, actuator: usize, normalized: f64, scene_mode: SceneMode) -> ConnectorResult<()> {
        let result = (|| {
            let actuator_bindings = self
                .current
                .preset
                .bindings
                .get(actuator)
                .ok_or_else(|| ConnectorError::logic("actuator out of range"))?;
            let parameters = actuator_bindings.parameters.clone();
            let properties = actuator_bindings.properties.clone();

            for binding in &parameters {
                let Some(block) = self.current.preset.block(binding.row as usize, binding.block as usize) else {
                    continue;
                };
                let Some(param_idx) = block.parameter_index(&binding.parameter_symbol) else { continue };
                let param = &block.parameters[param_idx];
                let min = binding.min.unwrap_or(param.meta.min);
                let max = binding.max.unwrap_or(param.meta.max);
                let value = min + (max - min) * normalized as f32;
                self.set_block_parameter(binding.row as usize, binding.block as usize, &binding.parameter_symbol, value, scene_mode)?;
            }
            for binding in &properties {
                let Some(block) = self.current.preset.block(binding.row as usize, binding.block as usize) else {
                    continue;
                };
                let Some(prop_idx) = block.property_index(&binding.property_uri) else { continue };
                let prop = &block.properties[prop_idx];
                let (min, max) = (prop.meta.min.unwrap_or(0.0), prop.meta.max.unwrap_or(1.0));
                let value = min + (max - min) * normalized as f32;
                self.set_block_property(binding.row as usize, binding.block as usize, &binding.property_uri, &value.to_string(), scene_mode)?;
            }

            if let Some(actuator_bindings) = self.current.preset.bindings.get_mut(actuator) {
                actuator_bindings.value = normalized;
            }
            Ok(())
        })();
        self.track(result)
    }

    // ---- feedback ----

    /// Drain every pending feedback message, resolve it against the
    /// instance mapper, apply model-mutating effects, and dispatch to the
    /// appropriate sink.
    pub fn poll_feedback(&mut self, sink: &mut dyn EngineEventSink, tool_sink: &mut dyn ToolEventSink) -> ConnectorResult<()> {
        let result = (|| {
            let mut dirtied = false;
            while let Some(event) = self.engine.poll_feedback()? {
                dirtied |= crate::feedback::route(
                    self.current.preset_index as usize,
                    &self.mapper,
                    &mut self.current.preset,
                    event,
                    sink,
                    tool_sink,
                );
            }
            if dirtied {
                self.touch_dirty(false);
            }
            Ok(())
        })();
        self.track(result)
    }
}

/// Build the `(row, block) -> (row, block)` permutation a `reorderBlock`
/// move induces: `orig` lands on `dest`, and every cell strictly between
/// them shifts one slot toward `orig`'s old position.
fn shift_permutation(orig: usize, dest: usize) -> impl Fn(usize) -> usize {
    move |idx| {
        if idx == orig {
            dest
        } else if orig < dest && idx > orig && idx <= dest {
            idx - 1
        } else if dest < orig && idx >= dest && idx < orig {
            idx + 1
        } else {
            idx
        }
    }
}

fn ensure_param_slot(scene: &mut SceneValues, idx: usize) {
    if scene.parameters.len() <= idx {
        scene.parameters.resize(idx + 1, SceneSlot::default());
    }
}

fn ensure_property_slot(scene: &mut SceneValues, idx: usize) {
    if scene.properties.len() <= idx {
        scene.properties.resize(idx + 1, SceneSlot::default());
    }
}

/// Record a parameter write into the active scene, lazily capturing
/// `old_value` into scene 0 (the baseline) the first time this parameter is
/// ever scene-tracked.
fn record_scene_param(block: &mut Block, active_scene: usize, param_idx: usize, new_value: f32, old_value: f32) {
    block.meta.has_scenes = true;
    if active_scene != 0 {
        if let Some(baseline) = block.scene_values.get_mut(0) {
            baseline.enabled = true;
            ensure_param_slot(baseline, param_idx);
            if !baseline.parameters[param_idx].used {
                baseline.parameters[param_idx] = SceneSlot { used: true, value: old_value };
            }
        }
    }
    if let Some(scene) = block.scene_values.get_mut(active_scene) {
        scene.enabled = true;
        ensure_param_slot(scene, param_idx);
        scene.parameters[param_idx] = SceneSlot { used: true, value: new_value };
    }
}

/// Property analogue of [`record_scene_param`].
fn record_scene_property(block: &mut Block, active_scene: usize, prop_idx: usize, new_value: String, old_value: String) {
    block.meta.has_scenes = true;
    if active_scene != 0 {
        if let Some(baseline) = block.scene_values.get_mut(0) {
            baseline.enabled = true;
            ensure_property_slot(baseline, prop_idx);
            if !baseline.properties[prop_idx].used {
                baseline.properties[prop_idx] = SceneSlot { used: true, value: old_value };
            }
        }
    }
    if let Some(scene) = block.scene_values.get_mut(active_scene) {
        scene.enabled = true;
        ensure_property_slot(scene, prop_idx);
        scene.properties[prop_idx] = SceneSlot { used: true, value: new_value };
    }
}
