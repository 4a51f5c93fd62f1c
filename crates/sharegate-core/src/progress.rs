/*
[INPUT]:  Phase ticks, confirmation decisions and cancellation inside a run
[OUTPUT]: ProgressState values, stop causes and run identifiers
[POS]:    Data model - values flowing through the progress broadcast
[UPDATE]: When changing the progress vocabulary or its log rendering
*/

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of one run inside a session. Later runs always compare greater.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RunId(u64);

impl RunId {
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "run-{}", self.0)
    }
}

/// Progress of one phase as seen by observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ProgressState {
    Start,
    Doing { percent: u8 },
    Stop,
}

impl ProgressState {
    pub fn is_stop(&self) -> bool {
        matches!(self, ProgressState::Stop)
    }

    /// Line printed into the view log for this state.
    pub fn log_line(&self) -> String {
        match self {
            ProgressState::Start => "--- START ---".to_string(),
            ProgressState::Doing { percent } => format!("doing {percent}%..."),
            ProgressState::Stop => "---!!! STOP !!!---".to_string(),
        }
    }
}

/// Path through which a Stop was reached. Only used for publication rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopCause {
    /// Phase reached its last percent
    Completed,
    /// Workload failed; the failure went to the error channel
    Failed,
    /// Confirmation answered `false`, share phase skipped
    Skipped,
    /// User cancel signal truncated the run
    Cancelled,
}

impl StopCause {
    /// Whether this Stop collapses into an immediately preceding Stop.
    pub fn collapses_into_previous(self) -> bool {
        matches!(self, StopCause::Cancelled)
    }
}

/// A progress value tagged with the run that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressEvent {
    pub run_id: RunId,
    pub state: ProgressState,
}
