//! Bounded instance-ID arena: the `(preset, row, block) -> {id, pair}` relation.
//!
//! Transcribed from the engine's own instance table: a fixed-size grid
//! indexed by preset and cell, backed by a bit-set over the pool of engine
//! instance numbers it is allowed to hand out. `add`/`add_pair` scan for the
//! lowest free index (so allocation order is deterministic and ID reuse
//! within a preset never happens before the prior occupant is released);
//! `remove`/`remove_pair` clear a pool bit, which is already O(1).

use modconn_model::{NUM_BLOCKS_PER_PRESET, NUM_BLOCK_CHAIN_ROWS, NUM_PRESETS_PER_BANK};

/// Cells per preset across all chain rows.
pub const CELLS_PER_PRESET: usize = NUM_BLOCK_CHAIN_ROWS * NUM_BLOCKS_PER_PRESET;

/// Upper bound on concurrently live instance IDs: two per cell (primary plus
/// dual-mono pair), across every preset in the bank.
pub const NMAX: usize = 2 * CELLS_PER_PRESET * NUM_PRESETS_PER_BANK;

/// The engine's own plugin-instance ID space, duplicated from
/// `modconn_proto::client` rather than depending on that crate just for two
/// constants. Must track the engine's configuration if it ever changes.
const MAX_MOD_HOST_PLUGIN_INSTANCES: usize = 9990;
/// Slots at the top of the engine's ID space reserved for tool instances.
const MAX_MOD_HOST_TOOL_INSTANCES: usize = 10;

const _: () = assert!(NMAX <= MAX_MOD_HOST_PLUGIN_INSTANCES - MAX_MOD_HOST_TOOL_INSTANCES);

/// An engine instance identifier, drawn from the bounded pool.
pub type InstanceId = u16;

/// The pair of engine instance IDs (if any) occupying one cell.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CellIds {
    /// The cell's primary instance, if the cell is occupied.
    pub id: Option<InstanceId>,
    /// The cell's dual-mono pair instance, if the block is currently paired.
    pub pair: Option<InstanceId>,
}

impl CellIds {
    /// Whether this cell is currently occupied at all.
    pub fn is_set(&self) -> bool {
        self.id.is_some()
    }
}

/// Bounded arena mapping `(preset, row, block)` cells to engine instance IDs.
///
/// Fixed-size: no heap allocation beyond the two flat arrays sized from
/// compile-time constants, matching the engine's own table sizing.
#[derive(Debug, Clone)]
pub struct InstanceMapper {
    table: [[CellIds; CELLS_PER_PRESET]; NUM_PRESETS_PER_BANK],
    pool: [bool; NMAX],
}

impl InstanceMapper {
    /// An arena with every cell unset and every pool slot free.
    pub fn new() -> Self {
        Self {
            table: [[CellIds::default(); CELLS_PER_PRESET]; NUM_PRESETS_PER_BANK],
            pool: [false; NMAX],
        }
    }

    fn cell_index(row: usize, block: usize) -> usize {
        row * NUM_BLOCKS_PER_PRESET + block
    }

    fn claim_lowest_free(&mut self) -> Option<InstanceId> {
        let idx = self.pool.iter().position(|occupied| !occupied)?;
        self.pool[idx] = true;
        Some(idx as InstanceId)
    }

    fn release(&mut self, id: InstanceId) {
        self.pool[id as usize] = false;
    }

    /// The IDs currently occupying a cell.
    pub fn get(&self, preset: usize, row: usize, block: usize) -> CellIds {
        self.table[preset][Self::cell_index(row, block)]
    }

    /// Allocate a primary ID for a cell. Precondition: the cell is unset.
    ///
    /// Returns `None` if the pool is exhausted.
    pub fn add(&mut self, preset: usize, row: usize, block: usize) -> Option<InstanceId> {
        let cell = Self::cell_index(row, block);
        debug_assert!(
            self.table[preset][cell].id.is_none(),
            "add() on a cell that already has a primary id"
        );
        let id = self.claim_lowest_free()?;
        self.table[preset][cell].id = Some(id);
        Some(id)
    }

    /// Allocate a pair ID for a cell. Precondition: `id` is set and `pair`
    /// is not.
    ///
    /// Returns `None` if the pool is exhausted.
    pub fn add_pair(&mut self, preset: usize, row: usize, block: usize) -> Option<InstanceId> {
        let cell = Self::cell_index(row, block);
        debug_assert!(
            self.table[preset][cell].id.is_some(),
            "add_pair() on a cell with no primary id"
        );
        debug_assert!(
            self.table[preset][cell].pair.is_none(),
            "add_pair() on a cell that already has a pair"
        );
        let id = self.claim_lowest_free()?;
        self.table[preset][cell].pair = Some(id);
        Some(id)
    }

    /// Free both IDs occupying a cell and clear it, returning the IDs freed.
    pub fn remove(&mut self, preset: usize, row: usize, block: usize) -> CellIds {
        let cell = Self::cell_index(row, block);
        let freed = std::mem::take(&mut self.table[preset][cell]);
        if let Some(id) = freed.id {
            self.release(id);
        }
        if let Some(pair) = freed.pair {
            self.release(pair);
        }
        freed
    }

    /// Free only the pair ID occupying a cell, leaving the primary intact.
    pub fn remove_pair(&mut self, preset: usize, row: usize, block: usize) -> Option<InstanceId> {
        let cell = Self::cell_index(row, block);
        let pair = self.table[preset][cell].pair.take();
        if let Some(id) = pair {
            self.release(id);
        }
        pair
    }

    /// Move the cell at `orig` to `dest` within a row, carrying its IDs,
    /// shifting every cell between by one position.
    ///
    /// Implemented as a walk of adjacent swaps rather than a full rotation,
    /// so the cost is proportional to the distance moved and every
    /// intermediate cell ends up exactly where a `Vec::remove`/`insert` pair
    /// would have put it.
    pub fn reorder(&mut self, preset: usize, row: usize, orig: usize, dest: usize) {
        if orig == dest {
            return;
        }
        let base = row * NUM_BLOCKS_PER_PRESET;
        let row_slice = &mut self.table[preset][base..base + NUM_BLOCKS_PER_PRESET];
        if orig < dest {
            for i in orig..dest {
                row_slice.swap(i, i + 1);
            }
        } else {
            for i in (dest..orig).rev() {
                row_slice.swap(i, i + 1);
            }
        }
    }

    /// Exchange the IDs of two cells, possibly in different rows.
    pub fn swap(&mut self, preset: usize, row_a: usize, block_a: usize, row_b: usize, block_b: usize) {
        let a = Self::cell_index(row_a, block_a);
        let b = Self::cell_index(row_b, block_b);
        let preset_table = &mut self.table[preset];
        preset_table.swap(a, b);
    }

    /// Find which `(row, block)` a primary engine instance ID belongs to.
    pub fn get_block_with_id(&self, preset: usize, id: InstanceId) -> Option<(usize, usize)> {
        self.table[preset].iter().position(|c| c.id == Some(id)).map(|cell| {
            (cell / NUM_BLOCKS_PER_PRESET, cell % NUM_BLOCKS_PER_PRESET)
        })
    }

    /// Clear every cell and release every pool slot.
    pub fn reset(&mut self) {
        self.table = [[CellIds::default(); CELLS_PER_PRESET]; NUM_PRESETS_PER_BANK];
        self.pool = [false; NMAX];
    }
}

impl Default for InstanceMapper {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_allocates_lowest_free_id() {
        let mut mapper = InstanceMapper::new();
        let a = mapper.add(0, 0, 0).unwrap();
        let b = mapper.add(0, 0, 1).unwrap();
        assert_eq!(a, 0);
        assert_eq!(b, 1);
    }

    #[test]
    fn remove_frees_id_for_reuse() {
        let mut mapper = InstanceMapper::new();
        mapper.add(0, 0, 0).unwrap();
        let ids = mapper.remove(0, 0, 0);
        assert_eq!(ids.id, Some(0));
        assert_eq!(ids.pair, None);

        let reused = mapper.add(0, 0, 1).unwrap();
        assert_eq!(reused, 0, "freed id should be the lowest free and thus reused");
    }

    #[test]
    fn pair_is_distinct_from_primary() {
        let mut mapper = InstanceMapper::new();
        let id = mapper.add(0, 0, 0).unwrap();
        let pair = mapper.add_pair(0, 0, 0).unwrap();
        assert_ne!(id, pair);
        assert_eq!(mapper.get(0, 0, 0), CellIds { id: Some(id), pair: Some(pair) });
    }

    #[test]
    fn remove_pair_keeps_primary() {
        let mut mapper = InstanceMapper::new();
        let id = mapper.add(0, 0, 0).unwrap();
        mapper.add_pair(0, 0, 0).unwrap();
        let freed = mapper.remove_pair(0, 0, 0);
        assert!(freed.is_some());
        assert_eq!(mapper.get(0, 0, 0), CellIds { id: Some(id), pair: None });
    }

    #[test]
    fn reorder_moves_element_forward_shifting_between() {
        let mut mapper = InstanceMapper::new();
        let ids: Vec<_> = (0..3).map(|b| mapper.add(0, 0, b).unwrap()).collect();
        // [A, B, C, _, _, _] -> reorder(0, 2) -> [B, C, A, _, _, _]
        mapper.reorder(0, 0, 0, 2);
        assert_eq!(mapper.get(0, 0, 0).id, Some(ids[1]));
        assert_eq!(mapper.get(0, 0, 1).id, Some(ids[2]));
        assert_eq!(mapper.get(0, 0, 2).id, Some(ids[0]));
    }

    #[test]
    fn reorder_moves_element_backward_shifting_between() {
        let mut mapper = InstanceMapper::new();
        let ids: Vec<_> = (0..3).map(|b| mapper.add(0, 0, b).unwrap()).collect();
        // [A, B, C] -> reorder(2, 0) -> [C, A, B]
        mapper.reorder(0, 0, 2, 0);
        assert_eq!(mapper.get(0, 0, 0).id, Some(ids[2]));
        assert_eq!(mapper.get(0, 0, 1).id, Some(ids[0]));
        assert_eq!(mapper.get(0, 0, 2).id, Some(ids[1]));
    }

    #[test]
    fn swap_exchanges_two_cells_across_rows() {
        let mut mapper = InstanceMapper::new();
        let a = mapper.add(0, 0, 0).unwrap();
        let b = mapper.add(0, 0, 1).unwrap();
        mapper.swap(0, 0, 0, 0, 1);
        assert_eq!(mapper.get(0, 0, 0).id, Some(b));
        assert_eq!(mapper.get(0, 0, 1).id, Some(a));
    }

    #[test]
    fn get_block_with_id_resolves_cell() {
        let mut mapper = InstanceMapper::new();
        let id = mapper.add(1, 0, 3).unwrap();
        assert_eq!(mapper.get_block_with_id(1, id), Some((0, 3)));
        assert_eq!(mapper.get_block_with_id(0, id), None);
    }

    #[test]
    fn ids_do_not_collide_across_presets_until_pool_exhausted() {
        let mut mapper = InstanceMapper::new();
        let a = mapper.add(0, 0, 0).unwrap();
        let b = mapper.add(1, 0, 0).unwrap();
        assert_ne!(a, b, "each preset gets its own slice of the shared pool");
    }

    #[test]
    fn reset_clears_table_and_pool() {
        let mut mapper = InstanceMapper::new();
        mapper.add(0, 0, 0).unwrap();
        mapper.reset();
        assert_eq!(mapper.get(0, 0, 0), CellIds::default());
        assert_eq!(mapper.add(0, 0, 0), Some(0));
    }
}
