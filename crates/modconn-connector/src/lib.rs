//! The pedalboard connector: the stateful controller that reconciles the
//! user-visible bank/preset model against the realtime audio engine.
//!
//! This crate ties together `modconn-proto` (the engine wire protocol),
//! `modconn-mapper` (instance-ID arena and jack-graph arithmetic) and
//! `modconn-model` (the data model and JSON persistence) into the single
//! [`Connector`] type an embedder (web UI bridge, HMI bridge, CLI harness)
//! drives. None of those embedders live here — only the capability traits
//! in [`events`] they implement to receive feedback.

mod controller;
mod error;
mod events;
mod feedback;

pub use controller::{BindingKind, Connector};
pub use error::{ConnectorError, ConnectorResult};
pub use events::{ConnectorEvent, EngineEventSink, ToolEventSink};
