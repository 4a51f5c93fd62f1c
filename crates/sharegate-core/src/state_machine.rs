/*
[INPUT]:  RunPhase and RunEvent values from the orchestrator
[OUTPUT]: Validated run phase transitions
[POS]:    Run domain logic - state machine for one run's lifecycle
[UPDATE]: When run phases or their transitions change
*/

use crate::error::{PipelineError, Result};

/// Observable phases of the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunPhase {
    Idle,
    Generating,
    AwaitingConfirmation,
    Sharing,
    Terminated,
}

/// Events that move a run between phases
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunEvent {
    Start,
    PhaseStopped,
    Confirmed(bool),
    Cancelled,
}

impl RunPhase {
    pub fn is_active(self) -> bool {
        !matches!(self, RunPhase::Idle | RunPhase::Terminated)
    }
}

/// State machine managing one run's phase transitions
#[derive(Debug, Clone)]
pub struct RunStateMachine {
    current: RunPhase,
}

impl RunStateMachine {
    pub fn new() -> Self {
        Self {
            current: RunPhase::Idle,
        }
    }

    /// Next phase for `event`, or `None` if the pair is illegal
    pub fn next(from: RunPhase, event: RunEvent) -> Option<RunPhase> {
        match (from, event) {
            // Switch-latest: any phase may start over.
            (_, RunEvent::Start) => Some(RunPhase::Generating),
            (RunPhase::Generating, RunEvent::PhaseStopped) => Some(RunPhase::AwaitingConfirmation),
            (RunPhase::AwaitingConfirmation, RunEvent::Confirmed(true)) => Some(RunPhase::Sharing),
            (RunPhase::AwaitingConfirmation, RunEvent::Confirmed(false)) => {
                Some(RunPhase::Terminated)
            }
            (RunPhase::Sharing, RunEvent::PhaseStopped) => Some(RunPhase::Terminated),
            (phase, RunEvent::Cancelled) if phase.is_active() => Some(RunPhase::Terminated),
            _ => None,
        }
    }

    /// Perform a state transition
    pub fn transition(&mut self, event: RunEvent) -> Result<RunPhase> {
        let next = Self::next(self.current, event).ok_or(PipelineError::InvalidTransition {
            from: self.current,
            event,
        })?;
        self.current = next;
        Ok(next)
    }
}

impl Default for RunStateMachine {
    fn default() -> Self {
        Self::new()
    }
}
