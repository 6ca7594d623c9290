//! Error types for the engine protocol client.

use thiserror::Error;

/// Errors that can occur while talking to the audio engine.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// The socket could not be opened, connected, read from, or written to.
    #[error("transport error: {0}")]
    Transport(String),

    /// A reply was received but did not match the expected framing
    /// (`"resp "` prefix, NUL terminator, well-formed payload).
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The engine replied with a negative error code.
    #[error("engine reported error: {0}")]
    Reported(&'static str),

    /// A debug-mode argument validation check failed.
    #[error("invalid argument: {0}")]
    Validation(String),
}

impl EngineError {
    pub(crate) fn transport(msg: impl Into<String>) -> Self {
        EngineError::Transport(msg.into())
    }

    pub(crate) fn protocol(msg: impl Into<String>) -> Self {
        EngineError::Protocol(msg.into())
    }
}

/// Convenience alias for engine client results.
pub type EngineResult<T> = Result<T, EngineError>;

/// Translate a negative engine response code to its fixed error string.
///
/// Transcribed from the engine's `HostError` enum; unmapped codes fall back
/// to `"unknown error"`.
pub fn error_code_to_string(code: i32) -> &'static str {
    match code {
        0 => "success",
        -1 => "invalid instance",
        -2 => "instance already exists",
        -3 => "instance does not exist",
        -4 => "instance is unlicensed",
        -101 => "invalid URI",
        -102 => "instantiation failure",
        -103 => "invalid parameter symbol",
        -104 => "invalid preset uri",
        -105 => "failed to load state",
        -201 => "failed to create jack client",
        -202 => "failed to activate jack client",
        -203 => "failed to deactivate jack client",
        -204 => "failed to register jack port",
        -205 => "failed to connect jack ports",
        -206 => "failed to disconnect jack ports",
        -207 => "value out of range",
        -301 => "assignment already exists",
        -302 => "invalid assignment operation",
        -303 => "assignment list is full",
        -304 => "assignment failed",
        -305 => "assignment is unused",
        -401 => "control chain is unavailable",
        -402 => "ableton link is unavailable",
        -403 => "HMI is unavailable",
        -404 => "external UI is unavailable",
        -901 => "failed to allocate memory",
        -902 => "invalid operation",
        _ => "unknown error",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_codes_map_to_fixed_strings() {
        assert_eq!(error_code_to_string(-1), "invalid instance");
        assert_eq!(error_code_to_string(-103), "invalid parameter symbol");
    }

    #[test]
    fn unknown_negative_code_falls_back() {
        assert_eq!(error_code_to_string(-12345), "unknown error");
    }
}
