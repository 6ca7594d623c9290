//! Diagnostics produced by the tolerant JSON loader.
//!
//! Per the JSON-tolerance design: a load always returns a usable model, plus
//! a list of diagnostics describing whatever it had to paper over (an
//! unknown plugin URI, a clamped out-of-range value, a scene entry dropped
//! because it targeted an output-only parameter).

use std::fmt;

/// One thing the loader had to tolerate while building a usable model.
#[derive(Debug, Clone, PartialEq)]
pub enum Diagnostic {
    /// A block referenced a URI not found in the metadata catalogue; the
    /// cell was left empty.
    UnknownPluginUri {
        /// Chain row of the affected block.
        row: u8,
        /// Cell index of the affected block.
        block: u8,
        /// The URI that could not be resolved.
        uri: String,
    },
    /// A parameter value was outside its declared range and was clamped.
    ClampedParameterValue {
        /// Chain row of the affected block.
        row: u8,
        /// Cell index of the affected block.
        block: u8,
        /// Parameter symbol.
        symbol: String,
        /// Value as found in the file.
        found: f32,
        /// Value after clamping.
        clamped: f32,
    },
    /// A scene entry targeted an output-only parameter and was dropped.
    IgnoredOutputOnlyScene {
        /// Chain row of the affected block.
        row: u8,
        /// Cell index of the affected block.
        block: u8,
        /// Parameter symbol.
        symbol: String,
        /// Scene index the entry was dropped from.
        scene: u8,
    },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::UnknownPluginUri { row, block, uri } => {
                write!(f, "unknown plugin uri '{uri}' at ({row}, {block}), cell left empty")
            }
            Diagnostic::ClampedParameterValue { row, block, symbol, found, clamped } => {
                write!(
                    f,
                    "parameter '{symbol}' at ({row}, {block}) value {found} clamped to {clamped}"
                )
            }
            Diagnostic::IgnoredOutputOnlyScene { row, block, symbol, scene } => {
                write!(
                    f,
                    "scene {scene} entry for output-only parameter '{symbol}' at ({row}, {block}) ignored"
                )
            }
        }
    }
}
