//! A chain row: an ordered sequence of block cells with dedicated capture
//! and playback endpoints.

use crate::block::Block;
use crate::consts::NUM_BLOCKS_PER_PRESET;

/// One chain row: `NUM_BLOCKS_PER_PRESET` cells plus the row's jack
/// capture/playback endpoints.
#[derive(Debug, Clone, PartialEq)]
pub struct ChainRow {
    /// Block cells, left to right.
    pub blocks: Vec<Block>,
    /// The two capture (input) jack ports feeding this row.
    pub capture: [String; 2],
    /// The two playback (output) jack ports this row feeds.
    pub playback: [String; 2],
    /// Engine instance IDs currently connected to `capture`, if any.
    pub capture_id: [Option<u16>; 2],
    /// Engine instance IDs currently connected to `playback`, if any.
    pub playback_id: [Option<u16>; 2],
}

impl ChainRow {
    /// A row with `NUM_BLOCKS_PER_PRESET` empty cells and no endpoints bound.
    pub fn empty() -> Self {
        Self {
            blocks: vec![Block::empty(); NUM_BLOCKS_PER_PRESET],
            capture: [String::new(), String::new()],
            playback: [String::new(), String::new()],
            capture_id: [None, None],
            playback_id: [None, None],
        }
    }

    /// Whether the row's two capture endpoints differ (a genuinely stereo input).
    pub fn capture_is_stereo(&self) -> bool {
        self.capture[0] != self.capture[1]
    }

    /// Index of the first non-empty block in `[start, end]`, if any.
    pub fn first_loaded_in_range(&self, start: usize, end: usize) -> Option<usize> {
        (start..=end.min(self.blocks.len().saturating_sub(1)))
            .find(|&i| !self.blocks[i].is_empty())
    }

    /// Index of the last non-empty block in `[start, end]`, if any.
    pub fn last_loaded_in_range(&self, start: usize, end: usize) -> Option<usize> {
        (start..=end.min(self.blocks.len().saturating_sub(1)))
            .rev()
            .find(|&i| !self.blocks[i].is_empty())
    }

    /// Whether any block in the row is non-empty.
    pub fn has_any_loaded(&self) -> bool {
        self.blocks.iter().any(|b| !b.is_empty())
    }
}
