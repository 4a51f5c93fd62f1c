/*
[INPUT]:  Failure sources (workload steps, confirmation gate, transitions, config IO/YAML)
[OUTPUT]: Structured pipeline error type shared by every component
[POS]:    Error handling layer - unified error types for the core crate
[UPDATE]: When adding new failure sources or changing error messages
*/

use thiserror::Error;

use crate::phase::Phase;
use crate::state_machine::{RunEvent, RunPhase};

/// Main error type for the pipeline core
#[derive(Error, Debug)]
pub enum PipelineError {
    /// The underlying computation of a phase failed
    #[error("{phase} failed at {percent}%: {message}")]
    Workload {
        phase: Phase,
        percent: u8,
        message: String,
    },

    /// The confirmation responder was dropped without an answer
    #[error("confirmation dialog closed without an answer")]
    ConfirmationDropped,

    /// A run received an event its current phase cannot accept
    #[error("invalid run transition: {from:?} -> {event:?}")]
    InvalidTransition { from: RunPhase, event: RunEvent },

    /// Configuration rejected by validation
    #[error("configuration error: {0}")]
    Config(String),

    /// Reading a configuration file failed
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration YAML could not be parsed
    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl PipelineError {
    /// Create a workload failure for a phase step
    pub fn workload(phase: Phase, percent: u8, message: impl Into<String>) -> Self {
        PipelineError::Workload {
            phase,
            percent,
            message: message.into(),
        }
    }
}

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;
