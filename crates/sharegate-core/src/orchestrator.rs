/*
[INPUT]:  Start/cancel intents, Workload, PipelineConfig, Broadcaster, CancelController, UI handle
[OUTPUT]: Tokio tasks running generate -> confirm -> share/skip, at most one at a time
[POS]:    Execution layer - run supervision with switch-latest semantics
[UPDATE]: When changing run phases, supersession or shutdown guarantees
*/

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::broadcast::{Broadcaster, RunOutcome, RunReport};
use crate::cancel::CancelController;
use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::phase::{Phase, PhaseOutcome, RunScope, Workload, run_phase};
use crate::progress::{RunId, StopCause};
use crate::state_machine::{RunEvent, RunPhase, RunStateMachine};
use crate::view::UiHandle;

const RUN_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(1);

/// Latest known phase of the current run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunStatus {
    pub run_id: Option<RunId>,
    pub phase: RunPhase,
}

impl RunStatus {
    fn idle() -> Self {
        Self {
            run_id: None,
            phase: RunPhase::Idle,
        }
    }
}

#[derive(Debug)]
struct ActiveRun {
    run_id: RunId,
    abort: CancellationToken,
    handle: JoinHandle<()>,
}

struct RunShared {
    config: PipelineConfig,
    workload: Arc<dyn Workload>,
    broadcaster: Arc<Broadcaster>,
    cancel: Arc<CancelController>,
    ui: UiHandle,
    status: watch::Sender<RunStatus>,
}

/// Owns "which run is current". Every other component only sees a run through its scope.
pub struct Orchestrator {
    shared: Arc<RunShared>,
    active: Option<ActiveRun>,
    next_id: RunId,
    shutdown: CancellationToken,
}

impl Orchestrator {
    pub(crate) fn new(
        config: PipelineConfig,
        workload: Arc<dyn Workload>,
        broadcaster: Arc<Broadcaster>,
        cancel: Arc<CancelController>,
        ui: UiHandle,
        shutdown: CancellationToken,
    ) -> Self {
        let (status, _) = watch::channel(RunStatus::idle());
        Self {
            shared: Arc::new(RunShared {
                config,
                workload,
                broadcaster,
                cancel,
                ui,
                status,
            }),
            active: None,
            next_id: RunId::new(1),
            shutdown,
        }
    }

    pub fn state(&self) -> watch::Receiver<RunStatus> {
        self.shared.status.subscribe()
    }

    pub fn active_run(&self) -> Option<RunId> {
        self.active
            .as_ref()
            .filter(|run| !run.handle.is_finished())
            .map(|run| run.run_id)
    }

    /// Start a fresh run, superseding whatever run is in flight.
    ///
    /// Returns `None` once the session is shutting down.
    pub fn start(&mut self) -> Option<RunId> {
        if self.shutdown.is_cancelled() {
            return None;
        }

        if let Some(previous) = self.active.take() {
            if !previous.handle.is_finished() {
                info!(run_id = %previous.run_id, "superseding active run");
            }
            previous.abort.cancel();
        }

        let run_id = self.next_id;
        self.next_id = run_id.next();

        if !self.shared.broadcaster.begin_run(run_id) {
            return None;
        }
        let cancel = self.shared.cancel.arm(run_id);
        let abort = self.shutdown.child_token();
        self.shared.status.send_replace(RunStatus {
            run_id: Some(run_id),
            phase: RunPhase::Idle,
        });

        let driver = RunDriver {
            shared: self.shared.clone(),
            scope: RunScope {
                run_id,
                abort: abort.clone(),
                cancel,
            },
            machine: RunStateMachine::new(),
        };
        let handle = tokio::spawn(driver.drive());
        self.active = Some(ActiveRun {
            run_id,
            abort,
            handle,
        });
        Some(run_id)
    }

    /// Forward a cancel signal to the current run, if any.
    pub fn cancel(&self) -> bool {
        self.shared.cancel.cancel()
    }

    /// Abort the active run and wait briefly for it to exit.
    pub async fn shutdown(&mut self) {
        let Some(run) = self.active.take() else {
            return;
        };
        run.abort.cancel();

        let mut handle = run.handle;
        let deadline = Instant::now() + RUN_SHUTDOWN_TIMEOUT;
        tokio::select! {
            res = &mut handle => {
                if let Err(join_err) = res {
                    if join_err.is_panic() {
                        warn!(run_id = %run.run_id, "run panicked: {join_err}");
                    }
                }
            }
            _ = tokio::time::sleep_until(deadline) => {
                handle.abort();
                warn!(run_id = %run.run_id, "run shutdown timed out after {RUN_SHUTDOWN_TIMEOUT:?}");
            }
        }
    }
}

impl Drop for Orchestrator {
    fn drop(&mut self) {
        if let Some(run) = self.active.take() {
            run.abort.cancel();
            run.handle.abort();
        }
    }
}

enum Decision {
    Answer(bool),
    Cancelled,
    Aborted,
}

struct RunDriver {
    shared: Arc<RunShared>,
    scope: RunScope,
    machine: RunStateMachine,
}

impl RunDriver {
    async fn drive(mut self) {
        let run_id = self.scope.run_id;
        info!(run_id = %run_id, "run starting");
        self.advance(RunEvent::Start);

        let outcome = self.pipeline().await;
        self.shared.cancel.disarm(run_id);

        match outcome {
            Some(outcome) => {
                info!(run_id = %run_id, ?outcome, "run terminated");
                self.shared
                    .broadcaster
                    .publish_report(RunReport { run_id, outcome });
            }
            None => debug!(run_id = %run_id, "run discarded"),
        }
    }

    /// `None` means the run was superseded or torn down and must stay silent.
    async fn pipeline(&mut self) -> Option<RunOutcome> {
        match self.phase(Phase::Generate).await {
            PhaseOutcome::Aborted => return None,
            PhaseOutcome::Cancelled => return Some(self.cancelled()),
            PhaseOutcome::Completed | PhaseOutcome::Failed => {}
        }
        self.advance(RunEvent::PhaseStopped);

        let confirmed = match self.confirm().await {
            Decision::Answer(confirmed) => confirmed,
            Decision::Cancelled => return Some(self.cancelled()),
            Decision::Aborted => return None,
        };
        self.advance(RunEvent::Confirmed(confirmed));

        if !confirmed {
            self.shared
                .broadcaster
                .publish_stop(self.scope.run_id, StopCause::Skipped);
            return Some(RunOutcome::Completed { shared: false });
        }

        match self.phase(Phase::Share).await {
            PhaseOutcome::Aborted => None,
            PhaseOutcome::Cancelled => Some(self.cancelled()),
            PhaseOutcome::Completed | PhaseOutcome::Failed => {
                self.advance(RunEvent::PhaseStopped);
                Some(RunOutcome::Completed { shared: true })
            }
        }
    }

    async fn phase(&self, phase: Phase) -> PhaseOutcome {
        info!(run_id = %self.scope.run_id, %phase, "phase starting");
        let outcome = run_phase(
            phase,
            &self.shared.workload,
            &self.shared.config.phase,
            &self.shared.broadcaster,
            &self.scope,
        )
        .await;
        info!(run_id = %self.scope.run_id, %phase, ?outcome, "phase finished");
        outcome
    }

    async fn confirm(&self) -> Decision {
        let run_id = self.scope.run_id;
        let answer = self.shared.ui.request_confirmation(run_id);

        tokio::select! {
            biased;
            _ = self.scope.abort.cancelled() => {
                self.shared.ui.dismiss_confirmation(run_id);
                Decision::Aborted
            }
            _ = self.scope.cancel.cancelled() => {
                self.shared.ui.dismiss_confirmation(run_id);
                Decision::Cancelled
            }
            res = answer => match res {
                Ok(confirmed) => {
                    info!(run_id = %run_id, confirmed, "confirmation answered");
                    Decision::Answer(confirmed)
                }
                Err(_) => {
                    warn!(run_id = %run_id, "confirmation dialog closed; treating as declined");
                    self.shared
                        .broadcaster
                        .publish_error(run_id, PipelineError::ConfirmationDropped);
                    Decision::Answer(false)
                }
            }
        }
    }

    fn cancelled(&mut self) -> RunOutcome {
        self.shared
            .broadcaster
            .publish_stop(self.scope.run_id, StopCause::Cancelled);
        self.advance(RunEvent::Cancelled);
        RunOutcome::Cancelled
    }

    fn advance(&mut self, event: RunEvent) {
        let run_id = self.scope.run_id;
        match self.machine.transition(event) {
            Ok(phase) => {
                self.shared.status.send_if_modified(|status| {
                    if status.run_id != Some(run_id) {
                        return false;
                    }
                    status.phase = phase;
                    true
                });
            }
            Err(err) => warn!(run_id = %run_id, error = %err, "run transition rejected"),
        }
    }
}
