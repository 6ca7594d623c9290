//! Error types for preset/bank persistence.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while loading or saving preset/bank JSON.
#[derive(Debug, Error)]
pub enum PersistError {
    /// Failed to read a file.
    #[error("failed to read file '{path}': {source}")]
    ReadFile {
        /// Path of the file that could not be read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to write a file.
    #[error("failed to write file '{path}': {source}")]
    WriteFile {
        /// Path of the file that could not be written.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to create a directory.
    #[error("failed to create directory '{path}': {source}")]
    CreateDir {
        /// Path of the directory that could not be created.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse JSON.
    #[error("failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// The envelope's `type` field did not match what the caller asked to load.
    #[error("expected envelope type '{expected}', found '{found}'")]
    WrongEnvelopeType {
        /// The type the caller expected.
        expected: &'static str,
        /// The type actually found in the file.
        found: String,
    },

    /// The envelope's `version` field fell outside the loader's accepted range.
    #[error("unsupported preset version {found} (accepted range [{min}, {max}])")]
    UnsupportedVersion {
        /// Version found in the file.
        found: u32,
        /// Minimum accepted version.
        min: u32,
        /// Maximum accepted version.
        max: u32,
    },

    /// A bank file did not contain exactly the expected number of presets.
    #[error("bank file has {found} presets, expected {expected}")]
    WrongPresetCount {
        /// Number of presets found.
        found: usize,
        /// Number of presets expected.
        expected: usize,
    },
}

impl PersistError {
    /// Create a read-file error.
    pub fn read_file(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PersistError::ReadFile { path: path.into(), source }
    }

    /// Create a write-file error.
    pub fn write_file(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PersistError::WriteFile { path: path.into(), source }
    }

    /// Create a create-directory error.
    pub fn create_dir(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PersistError::CreateDir { path: path.into(), source }
    }
}
