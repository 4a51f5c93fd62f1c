/*
[INPUT]:  Progress, error and run-report publications from the active run
[OUTPUT]: Fan-out via tokio broadcast channels, gated on the current run
[POS]:    Distribution layer - decouples the pipeline from any number of observers
[UPDATE]: When changing supersession gating or the Stop settle rule
*/

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::Instant;
use tracing::debug;

use crate::config::BroadcastConfig;
use crate::error::PipelineError;
use crate::progress::{ProgressEvent, ProgressState, RunId, StopCause};

/// A contained failure, delivered to error subscribers exactly once.
#[derive(Debug, Clone)]
pub struct ErrorEvent {
    pub run_id: RunId,
    pub error: Arc<PipelineError>,
}

/// How a run that was not superseded ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Pipeline ran to its end; `shared` tells whether the share phase executed
    Completed { shared: bool },
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunReport {
    pub run_id: RunId,
    pub outcome: RunOutcome,
}

#[derive(Debug, Default)]
struct RunGate {
    current: Option<RunId>,
    closed: bool,
    last_stop: Option<Instant>,
}

impl RunGate {
    fn admits(&self, run_id: RunId) -> bool {
        !self.closed && self.current == Some(run_id)
    }
}

/// Session-owned fan-out for progress, errors and run reports.
///
/// Publishing never blocks: subscribers that fall behind the channel capacity
/// lose their oldest values. Only the current run may publish; anything from a
/// superseded run, or after `close`, is dropped.
#[derive(Debug)]
pub struct Broadcaster {
    gate: Mutex<RunGate>,
    progress_tx: broadcast::Sender<ProgressEvent>,
    error_tx: broadcast::Sender<ErrorEvent>,
    report_tx: broadcast::Sender<RunReport>,
    stop_settle: Duration,
}

impl Broadcaster {
    pub fn new(config: &BroadcastConfig) -> Self {
        let capacity = config.capacity.max(1);
        let (progress_tx, _) = broadcast::channel(capacity);
        let (error_tx, _) = broadcast::channel(capacity);
        let (report_tx, _) = broadcast::channel(capacity);

        Self {
            gate: Mutex::new(RunGate::default()),
            progress_tx,
            error_tx,
            report_tx,
            stop_settle: config.stop_settle(),
        }
    }

    pub fn subscribe_progress(&self) -> broadcast::Receiver<ProgressEvent> {
        self.progress_tx.subscribe()
    }

    pub fn subscribe_errors(&self) -> broadcast::Receiver<ErrorEvent> {
        self.error_tx.subscribe()
    }

    pub fn subscribe_reports(&self) -> broadcast::Receiver<RunReport> {
        self.report_tx.subscribe()
    }

    /// Make `run_id` the only run allowed to publish. Returns `false` once closed.
    pub fn begin_run(&self, run_id: RunId) -> bool {
        let mut gate = self.gate();
        if gate.closed {
            return false;
        }
        if let Some(previous) = gate.current.replace(run_id) {
            debug!(previous = %previous, run_id = %run_id, "run superseded");
        }
        gate.last_stop = None;
        true
    }

    pub fn is_current(&self, run_id: RunId) -> bool {
        self.gate().admits(run_id)
    }

    /// Stop all further deliveries. Idempotent.
    pub fn close(&self) {
        let mut gate = self.gate();
        gate.closed = true;
        gate.current = None;
    }

    pub fn is_closed(&self) -> bool {
        self.gate().closed
    }

    /// Publish a Start or Doing value. A Stop passed here counts as a completed phase.
    pub fn publish_progress(&self, run_id: RunId, state: ProgressState) -> bool {
        if state.is_stop() {
            return self.publish_stop(run_id, StopCause::Completed);
        }

        let mut gate = self.gate();
        if !gate.admits(run_id) {
            debug!(run_id = %run_id, ?state, "progress dropped for inactive run");
            return false;
        }
        gate.last_stop = None;
        let _ = self.progress_tx.send(ProgressEvent { run_id, state });
        true
    }

    /// Publish a Stop reached through `cause`.
    ///
    /// A collapsing cause arriving within the settle window of the previous Stop
    /// (with nothing published in between) is not delivered.
    pub fn publish_stop(&self, run_id: RunId, cause: StopCause) -> bool {
        let mut gate = self.gate();
        if !gate.admits(run_id) {
            debug!(run_id = %run_id, ?cause, "stop dropped for inactive run");
            return false;
        }

        let now = Instant::now();
        if cause.collapses_into_previous() {
            if let Some(previous) = gate.last_stop {
                if now.duration_since(previous) < self.stop_settle {
                    debug!(run_id = %run_id, ?cause, "stop collapsed into previous stop");
                    return false;
                }
            }
        }

        gate.last_stop = Some(now);
        let _ = self.progress_tx.send(ProgressEvent {
            run_id,
            state: ProgressState::Stop,
        });
        true
    }

    pub fn publish_error(&self, run_id: RunId, error: PipelineError) -> bool {
        let gate = self.gate();
        if !gate.admits(run_id) {
            debug!(run_id = %run_id, error = %error, "error dropped for inactive run");
            return false;
        }
        let _ = self.error_tx.send(ErrorEvent {
            run_id,
            error: Arc::new(error),
        });
        true
    }

    pub fn publish_report(&self, report: RunReport) -> bool {
        let gate = self.gate();
        if !gate.admits(report.run_id) {
            return false;
        }
        let _ = self.report_tx.send(report);
        true
    }

    fn gate(&self) -> MutexGuard<'_, RunGate> {
        self.gate.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
