//! Property-based tests for the jack-graph arithmetic in `modconn_mapper`.
//!
//! Randomized chain-row shapes, checked against the invariants
//! `compute_dual_mono`/`widen_range` are documented to hold for any input
//! rather than the handful of fixed cases the unit tests below them cover.

use modconn_mapper::{compute_dual_mono, widen_range};
use modconn_metadata::PluginMetadata;
use modconn_model::{Block, ChainRow, NUM_BLOCKS_PER_PRESET};
use proptest::prelude::*;

#[derive(Debug, Clone, Copy)]
struct BlockSpec {
    empty: bool,
    mono_in: bool,
    multi_out: bool,
}

fn block_spec() -> impl Strategy<Value = BlockSpec> {
    (any::<bool>(), any::<bool>(), any::<bool>())
        .prop_map(|(empty, mono_in, multi_out)| BlockSpec { empty, mono_in, multi_out })
}

fn build_row(capture_stereo: bool, specs: &[BlockSpec]) -> ChainRow {
    let mut row = ChainRow::empty();
    row.capture = if capture_stereo {
        ["system:capture_1".into(), "system:capture_2".into()]
    } else {
        ["system:capture_1".into(), "system:capture_1".into()]
    };
    for (idx, spec) in specs.iter().enumerate() {
        row.blocks[idx] = if spec.empty {
            Block::empty()
        } else {
            let num_in = if spec.mono_in { 1 } else { 2 };
            let num_out = if spec.multi_out { 2 } else { 1 };
            let meta = PluginMetadata::new("urn:test:dual-mono-prop", num_in, num_out);
            Block::from_plugin_metadata("urn:test:dual-mono-prop", &meta, 1)
        };
    }
    row
}

proptest! {
    /// `compute_dual_mono` always returns one entry per block cell, and a
    /// cell is only ever reported paired if it's non-empty and mono-input:
    /// a stereo-input block or an empty cell is never dual-mono.
    #[test]
    fn dual_mono_matches_length_and_only_pairs_nonempty_mono_in_blocks(
        capture_stereo in any::<bool>(),
        specs in prop::collection::vec(block_spec(), 0..=NUM_BLOCKS_PER_PRESET),
    ) {
        let row = build_row(capture_stereo, &specs);
        let dual = compute_dual_mono(&row);

        prop_assert_eq!(dual.len(), row.blocks.len());
        for (idx, spec) in specs.iter().enumerate() {
            if dual[idx] {
                prop_assert!(!spec.empty, "an empty cell must never be reported paired");
                prop_assert!(spec.mono_in, "a stereo-input block must never be reported paired");
            }
        }
    }

    /// A mono capture with every block mono-input never produces a pair:
    /// there is no stereo signal anywhere upstream to reconstruct.
    #[test]
    fn all_mono_chain_after_mono_capture_never_pairs(
        multi_outs in prop::collection::vec(any::<bool>(), 0..=NUM_BLOCKS_PER_PRESET),
    ) {
        let specs: Vec<BlockSpec> = multi_outs
            .iter()
            .map(|&multi_out| BlockSpec { empty: false, mono_in: true, multi_out })
            .collect();
        let row = build_row(false, &specs);
        let dual = compute_dual_mono(&row);
        prop_assert!(dual.iter().all(|&paired| !paired));
    }

    /// `widen_range` always returns a window that contains `index`, clamped
    /// to `[0, len)`, spanning at most the cell before and after it.
    #[test]
    fn widen_range_contains_index_and_stays_in_bounds(
        len in 1usize..=32,
        index in 0usize..32,
    ) {
        let index = index % len;
        let (start, end) = widen_range(index, len);
        prop_assert!(start <= index);
        prop_assert!(index <= end);
        prop_assert!(end < len);
        prop_assert!(end - start <= 2);
    }
}
