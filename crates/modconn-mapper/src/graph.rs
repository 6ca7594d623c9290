//! Pure jack-port arithmetic: deciding which blocks need a dual-mono pair
//! and producing the connect/disconnect operations that realize a chain
//! row's routing.
//!
//! Nothing here touches the engine. Every function is a plain
//! computation over [`ChainRow`] and [`CellIds`] snapshots; the connector
//! crate is the one that turns a [`PortOp`] list into actual engine calls
//! and a [`ReconcileAction`] list into actual `add`/`remove` instance calls.

use modconn_model::ChainRow;

use crate::instance::{CellIds, InstanceId};

/// A single jack connection change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PortOp {
    /// Connect the source port to the destination port.
    Connect(String, String),
    /// Disconnect the source port from the destination port.
    Disconnect(String, String),
    /// Disconnect every connection touching this port.
    DisconnectAll(String),
}

/// A step needed to bring a block's instance pairing in line with the
/// dual-mono state computed for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileAction {
    /// The block at this index needs a pair instance allocated.
    AllocatePair(usize),
    /// The block at this index has a pair instance it no longer needs.
    FreePair(usize),
}

fn audio_symbol(prefix: &str, index: usize, total: usize) -> String {
    if total <= 1 {
        prefix.to_string()
    } else {
        format!("{prefix}{}", index + 1)
    }
}

fn instance_port(id: InstanceId, prefix: &str, index: usize, total: usize) -> String {
    format!("effect_{id}:{}", audio_symbol(prefix, index, total))
}

fn block_in_ports(ids: CellIds, paired: bool, num_inputs: u8) -> Vec<String> {
    let Some(id) = ids.id else { return Vec::new() };
    if paired {
        let pair = ids.pair.expect("dual-mono block is missing its pair id");
        vec![instance_port(id, "in", 0, 1), instance_port(pair, "in", 0, 1)]
    } else {
        let total = num_inputs.max(1) as usize;
        (0..total).map(|i| instance_port(id, "in", i, total)).collect()
    }
}

fn block_out_ports(ids: CellIds, paired: bool, num_outputs: u8) -> Vec<String> {
    let Some(id) = ids.id else { return Vec::new() };
    if paired {
        let pair = ids.pair.expect("dual-mono block is missing its pair id");
        vec![instance_port(id, "out", 0, 1), instance_port(pair, "out", 0, 1)]
    } else {
        let total = num_outputs.max(1) as usize;
        (0..total).map(|i| instance_port(id, "out", i, total)).collect()
    }
}

fn capture_ports(chain: &ChainRow) -> Vec<String> {
    if chain.capture_is_stereo() {
        vec![chain.capture[0].clone(), chain.capture[1].clone()]
    } else {
        vec![chain.capture[0].clone()]
    }
}

fn playback_ports(chain: &ChainRow) -> Vec<String> {
    if chain.playback[0] != chain.playback[1] {
        vec![chain.playback[0].clone(), chain.playback[1].clone()]
    } else {
        vec![chain.playback[0].clone()]
    }
}

/// Connect every upstream port to every downstream port it should feed.
///
/// A single upstream port feeding several downstream ports is widened
/// (mono source duplicated to every destination); equal-length lists are
/// connected pairwise; a multi-port upstream feeding a single downstream
/// port only connects the first (there is no implicit downmix).
fn fan_connect(ups: &[String], downs: &[String]) -> Vec<PortOp> {
    if ups.is_empty() || downs.is_empty() {
        return Vec::new();
    }
    let zipped = ups.len().min(downs.len());
    let mut ops: Vec<PortOp> = ups[..zipped]
        .iter()
        .zip(&downs[..zipped])
        .map(|(u, d)| PortOp::Connect(u.clone(), d.clone()))
        .collect();
    if downs.len() > ups.len() {
        let last = ups.last().expect("ups is non-empty").clone();
        ops.extend(downs[zipped..].iter().map(|d| PortOp::Connect(last.clone(), d.clone())));
    }
    ops
}

/// Walk a chain row left to right and decide, for each cell, whether it
/// must run as a dual-mono pair: a mono-input block fed by a stereo
/// upstream signal.
///
/// Defined inductively: the row starts stereo if its two capture ports
/// differ. A mono-input block paired against a stereo upstream produces a
/// stereo result (its primary and pair instances reconstruct the two
/// channels); a mono-input block fed mono stays mono; a block whose own
/// inputs are already stereo just passes its own output arity through.
/// Empty cells pass the incoming state through unchanged.
pub fn compute_dual_mono(chain: &ChainRow) -> Vec<bool> {
    let mut upstream_stereo = chain.capture_is_stereo();
    let mut dual = Vec::with_capacity(chain.blocks.len());
    for block in &chain.blocks {
        if block.is_empty() {
            dual.push(false);
            continue;
        }
        let mono_in = block.meta.num_inputs <= 1;
        let paired = mono_in && upstream_stereo;
        dual.push(paired);
        upstream_stereo = if paired {
            true
        } else if mono_in {
            false
        } else {
            block.meta.num_outputs > 1
        };
    }
    dual
}

/// Expand a single changed index into the range of neighbors whose
/// connections may also need to be recomputed (the block immediately
/// before and after it).
pub fn widen_range(index: usize, len: usize) -> (usize, usize) {
    if len == 0 {
        return (0, 0);
    }
    let start = index.saturating_sub(1);
    let end = (index + 1).min(len - 1);
    (start, end)
}

/// Produce the full set of jack operations to realize a chain row's
/// routing, given its current instance assignments and dual-mono state.
///
/// Disconnects every port in `range` plus the row's endpoints before
/// reconnecting, so calling this twice in a row over the same state is a
/// no-op at the jack graph level (each call just tears down and rebuilds
/// the identical set of connections).
pub fn connect_all(
    chain: &ChainRow,
    cell_ids: &[CellIds],
    dual_mono: &[bool],
    range: (usize, usize),
) -> Vec<PortOp> {
    let mut ops = Vec::new();
    let (start, end) = range;
    let last_index = chain.blocks.len().saturating_sub(1);
    let end = end.min(last_index);

    for port in capture_ports(chain) {
        ops.push(PortOp::DisconnectAll(port));
    }
    for port in playback_ports(chain) {
        ops.push(PortOp::DisconnectAll(port));
    }
    for idx in start..=end {
        let Some(ids) = cell_ids.get(idx) else { continue };
        if !ids.is_set() {
            continue;
        }
        let paired = dual_mono.get(idx).copied().unwrap_or(false);
        for port in block_in_ports(*ids, paired, chain.blocks[idx].meta.num_inputs) {
            ops.push(PortOp::DisconnectAll(port));
        }
        for port in block_out_ports(*ids, paired, chain.blocks[idx].meta.num_outputs) {
            ops.push(PortOp::DisconnectAll(port));
        }
    }

    let Some(first) = chain.first_loaded_in_range(0, last_index) else {
        ops.extend(fan_connect(&capture_ports(chain), &playback_ports(chain)));
        return ops;
    };
    let last = chain
        .last_loaded_in_range(0, last_index)
        .expect("first_loaded_in_range returned Some so last must too");

    let first_ins = block_in_ports(
        cell_ids[first],
        dual_mono.get(first).copied().unwrap_or(false),
        chain.blocks[first].meta.num_inputs,
    );
    ops.extend(fan_connect(&capture_ports(chain), &first_ins));

    let mut prev = first;
    for idx in (first + 1)..=last {
        if chain.blocks[idx].is_empty() {
            continue;
        }
        let prev_outs = block_out_ports(
            cell_ids[prev],
            dual_mono.get(prev).copied().unwrap_or(false),
            chain.blocks[prev].meta.num_outputs,
        );
        let cur_ins = block_in_ports(
            cell_ids[idx],
            dual_mono.get(idx).copied().unwrap_or(false),
            chain.blocks[idx].meta.num_inputs,
        );
        ops.extend(fan_connect(&prev_outs, &cur_ins));
        prev = idx;
    }

    let last_outs = block_out_ports(
        cell_ids[last],
        dual_mono.get(last).copied().unwrap_or(false),
        chain.blocks[last].meta.num_outputs,
    );
    ops.extend(fan_connect(&last_outs, &playback_ports(chain)));

    ops
}

/// Diff the desired dual-mono state against which cells currently have a
/// pair instance, producing the allocate/free steps needed to catch up.
///
/// Purely a plan: the caller is responsible for actually allocating or
/// freeing pair IDs in an [`InstanceMapper`](crate::InstanceMapper) and
/// issuing the corresponding engine `add`/`remove` calls.
pub fn reconcile_plan(cell_ids: &[CellIds], dual_mono: &[bool]) -> Vec<ReconcileAction> {
    cell_ids
        .iter()
        .zip(dual_mono.iter())
        .enumerate()
        .filter_map(|(idx, (ids, &wants_pair))| {
            let has_pair = ids.pair.is_some();
            if wants_pair && !has_pair && ids.is_set() {
                Some(ReconcileAction::AllocatePair(idx))
            } else if !wants_pair && has_pair {
                Some(ReconcileAction::FreePair(idx))
            } else {
                None
            }
        })
        .collect()
}
