/*
[INPUT]:  Workload implementation, PhaseConfig cadence, run-scoped cancellation tokens
[OUTPUT]: Start/Doing/Stop progress published for one phase, failures on the error channel
[POS]:    Work layer - one unit of simulated long-running work
[UPDATE]: When changing tick cadence, failure containment or cancellation points
*/

use std::fmt;
use std::sync::Arc;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::broadcast::Broadcaster;
use crate::config::PhaseConfig;
use crate::error::{PipelineError, Result};
use crate::progress::{ProgressState, RunId, StopCause};

/// The two interchangeable units of work in a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Generate,
    Share,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Generate => f.write_str("generate"),
            Phase::Share => f.write_str("share"),
        }
    }
}

/// The computation behind each progress tick.
pub trait Workload: Send + Sync + fmt::Debug {
    /// Perform the work for `percent`. An error ends the phase early.
    fn step(&self, phase: Phase, percent: u8) -> Result<()>;
}

/// Always succeeds; progress is driven purely by the tick cadence.
#[derive(Debug, Default, Clone, Copy)]
pub struct SimulatedWorkload;

impl Workload for SimulatedWorkload {
    fn step(&self, _phase: Phase, _percent: u8) -> Result<()> {
        Ok(())
    }
}

/// Fails once `phase` reaches `percent`; every other step succeeds.
#[derive(Debug, Clone, Copy)]
pub struct FailingWorkload {
    pub phase: Phase,
    pub percent: u8,
}

impl Workload for FailingWorkload {
    fn step(&self, phase: Phase, percent: u8) -> Result<()> {
        if phase == self.phase && percent == self.percent {
            return Err(PipelineError::workload(
                phase,
                percent,
                "simulated workload failure",
            ));
        }
        Ok(())
    }
}

/// How a phase ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseOutcome {
    /// Reached the last percent; Stop published
    Completed,
    /// Workload failed; error and Stop published
    Failed,
    /// User cancel observed; nothing further published
    Cancelled,
    /// Run superseded or session torn down; nothing further published
    Aborted,
}

/// Tokens observed at every suspension point of a run.
#[derive(Debug, Clone)]
pub struct RunScope {
    pub run_id: RunId,
    /// Supersession and teardown. Silent: no Stop follows.
    pub abort: CancellationToken,
    /// User cancel. The run publishes its terminal Stop.
    pub cancel: CancellationToken,
}

/// Run one phase: Start, Doing(first..=last) one tick apart (first tick immediate), Stop.
pub async fn run_phase(
    phase: Phase,
    workload: &Arc<dyn Workload>,
    config: &PhaseConfig,
    broadcaster: &Broadcaster,
    scope: &RunScope,
) -> PhaseOutcome {
    let run_id = scope.run_id;
    broadcaster.publish_progress(run_id, ProgressState::Start);

    let mut ticker = tokio::time::interval(config.tick_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    for percent in config.first_percent..=config.last_percent {
        tokio::select! {
            biased;
            _ = scope.abort.cancelled() => {
                debug!(run_id = %run_id, %phase, percent, "phase aborted");
                return PhaseOutcome::Aborted;
            }
            _ = scope.cancel.cancelled() => {
                debug!(run_id = %run_id, %phase, percent, "phase cancelled");
                return PhaseOutcome::Cancelled;
            }
            _ = ticker.tick() => {}
        }

        if let Err(err) = workload.step(phase, percent) {
            warn!(run_id = %run_id, %phase, percent, error = %err, "workload failed; stopping phase");
            broadcaster.publish_error(run_id, err);
            broadcaster.publish_stop(run_id, StopCause::Failed);
            return PhaseOutcome::Failed;
        }

        broadcaster.publish_progress(run_id, ProgressState::Doing { percent });
    }

    broadcaster.publish_stop(run_id, StopCause::Completed);
    PhaseOutcome::Completed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BroadcastConfig;
    use std::time::Duration;
    use tokio::sync::broadcast;
    use tokio::time::Instant;

    fn setup() -> (Arc<Broadcaster>, RunScope) {
        let broadcaster = Arc::new(Broadcaster::new(&BroadcastConfig {
            stop_settle_ms: 300,
            capacity: 512,
        }));
        let run_id = RunId::new(1);
        broadcaster.begin_run(run_id);
        let scope = RunScope {
            run_id,
            abort: CancellationToken::new(),
            cancel: CancellationToken::new(),
        };
        (broadcaster, scope)
    }

    fn drain(rx: &mut broadcast::Receiver<crate::progress::ProgressEvent>) -> Vec<ProgressState> {
        std::iter::from_fn(|| rx.try_recv().ok())
            .map(|event| event.state)
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn completed_phase_emits_full_sequence_at_fixed_cadence() {
        let (broadcaster, scope) = setup();
        let mut rx = broadcaster.subscribe_progress();
        let workload: Arc<dyn Workload> = Arc::new(SimulatedWorkload);

        let started = Instant::now();
        let outcome = run_phase(
            Phase::Generate,
            &workload,
            &PhaseConfig::default(),
            &broadcaster,
            &scope,
        )
        .await;

        assert_eq!(outcome, PhaseOutcome::Completed);
        // 100 ticks, the first one immediate.
        assert_eq!(Instant::now() - started, Duration::from_millis(99 * 25));

        let mut expected = vec![ProgressState::Start];
        expected.extend((1..=100).map(|percent| ProgressState::Doing { percent }));
        expected.push(ProgressState::Stop);
        assert_eq!(drain(&mut rx), expected);
    }

    #[tokio::test(start_paused = true)]
    async fn failing_step_publishes_error_then_stop() {
        let (broadcaster, scope) = setup();
        let mut progress = broadcaster.subscribe_progress();
        let mut errors = broadcaster.subscribe_errors();
        let workload: Arc<dyn Workload> = Arc::new(FailingWorkload {
            phase: Phase::Share,
            percent: 5,
        });

        let outcome = run_phase(
            Phase::Share,
            &workload,
            &PhaseConfig::default(),
            &broadcaster,
            &scope,
        )
        .await;

        assert_eq!(outcome, PhaseOutcome::Failed);
        assert_eq!(
            drain(&mut progress),
            vec![
                ProgressState::Start,
                ProgressState::Doing { percent: 1 },
                ProgressState::Doing { percent: 2 },
                ProgressState::Doing { percent: 3 },
                ProgressState::Doing { percent: 4 },
                ProgressState::Stop,
            ]
        );
        let event = errors.try_recv().unwrap();
        assert!(matches!(
            *event.error,
            PipelineError::Workload { phase: Phase::Share, percent: 5, .. }
        ));
        assert!(errors.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_truncates_before_next_tick() {
        let (broadcaster, scope) = setup();
        let mut rx = broadcaster.subscribe_progress();
        let workload: Arc<dyn Workload> = Arc::new(SimulatedWorkload);

        let cancel = scope.cancel.clone();
        tokio::spawn(async move {
            // Doing(37) is emitted at 36 * 25ms.
            tokio::time::sleep(Duration::from_millis(36 * 25 + 10)).await;
            cancel.cancel();
        });

        let outcome = run_phase(
            Phase::Generate,
            &workload,
            &PhaseConfig::default(),
            &broadcaster,
            &scope,
        )
        .await;

        assert_eq!(outcome, PhaseOutcome::Cancelled);
        let states = drain(&mut rx);
        assert_eq!(states.last(), Some(&ProgressState::Doing { percent: 37 }));
        assert_eq!(states.len(), 38);
    }

    #[tokio::test(start_paused = true)]
    async fn abort_wins_over_cancel() {
        let (broadcaster, scope) = setup();
        scope.cancel.cancel();
        scope.abort.cancel();
        let workload: Arc<dyn Workload> = Arc::new(SimulatedWorkload);

        let outcome = run_phase(
            Phase::Share,
            &workload,
            &PhaseConfig::default(),
            &broadcaster,
            &scope,
        )
        .await;
        assert_eq!(outcome, PhaseOutcome::Aborted);
    }
}
