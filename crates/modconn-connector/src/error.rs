//! Error type for the pedalboard connector.

use thiserror::Error;

/// Errors a controller operation can fail with.
#[derive(Debug, Error)]
pub enum ConnectorError {
    /// The engine client reported a transport, protocol, or engine-side error.
    #[error(transparent)]
    Engine(#[from] modconn_proto::EngineError),

    /// Loading or saving a preset/bank file failed.
    #[error(transparent)]
    Persist(#[from] modconn_model::PersistError),

    /// An operation precondition was violated (reorder with `orig == dest`,
    /// binding to an empty cell, an unknown plugin URI on `replaceBlock`,
    /// an out-of-range cell or actuator index, and similar caller errors).
    #[error("{0}")]
    Logic(String),
}

impl ConnectorError {
    pub(crate) fn logic(msg: impl Into<String>) -> Self {
        ConnectorError::Logic(msg.into())
    }
}

/// Convenience alias for controller results.
pub type ConnectorResult<T> = Result<T, ConnectorError>;
