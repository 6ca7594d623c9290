//! Engine protocol client: the line-oriented TCP control protocol spoken by
//! the out-of-process realtime audio engine.
//!
//! This crate owns framing, command construction, reply/feedback decoding
//! and connection management. It knows nothing about presets, banks or
//! instance bookkeeping — that lives in `modconn-model` and `modconn-mapper`.

mod client;
mod command;
mod error;
mod feedback;
mod scopes;
mod transport;
mod validate;

pub use client::{EngineClient, MAX_MOD_HOST_PLUGIN_INSTANCES, MAX_MOD_HOST_TOOL_INSTANCES};
pub use command::{FlushedParam, ProcessingMode, ResetTag};
pub use error::{error_code_to_string, EngineError, EngineResult};
pub use feedback::{FeedbackEvent, LogLevel, PatchValue, VectorValue};
pub use scopes::{FadeGuardScope, NonBlockingScope};
pub use transport::is_dummy_mode;
pub use validate::{valid_jack_port, valid_symbol, valid_uri};
