/*
[INPUT]:  Cancel intents from the dispatcher, arm/disarm from the orchestrator
[OUTPUT]: CancellationToken signalled for the currently armed run only
[POS]:    Control layer - user cancellation of the active run
[UPDATE]: When changing which runs a cancel signal can reach
*/

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::progress::RunId;

#[derive(Debug)]
struct Armed {
    run_id: RunId,
    token: CancellationToken,
}

/// Routes cancel signals to whichever run is armed at the moment of the call.
///
/// Each run gets a fresh token, so a signal can never leak into a later run.
#[derive(Debug, Default)]
pub struct CancelController {
    armed: Mutex<Option<Armed>>,
    signals_sent: AtomicU64,
}

impl CancelController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm a fresh token for `run_id`, replacing any previous run.
    pub fn arm(&self, run_id: RunId) -> CancellationToken {
        let token = CancellationToken::new();
        *self.armed() = Some(Armed {
            run_id,
            token: token.clone(),
        });
        token
    }

    /// Disarm, but only if `run_id` is still the armed run.
    pub fn disarm(&self, run_id: RunId) -> bool {
        let mut armed = self.armed();
        if armed.as_ref().is_some_and(|a| a.run_id == run_id) {
            *armed = None;
            return true;
        }
        false
    }

    /// Signal the armed run. Returns `false` when nothing is armed.
    pub fn cancel(&self) -> bool {
        let armed = self.armed();
        match armed.as_ref() {
            Some(a) if !a.token.is_cancelled() => {
                a.token.cancel();
                self.signals_sent.fetch_add(1, Ordering::Relaxed);
                info!(run_id = %a.run_id, "cancel signal sent");
                true
            }
            Some(a) => {
                debug!(run_id = %a.run_id, "run already cancelled");
                false
            }
            None => {
                debug!("cancel ignored; no active run");
                false
            }
        }
    }

    pub fn armed_run(&self) -> Option<RunId> {
        self.armed().as_ref().map(|a| a.run_id)
    }

    pub fn signals_sent(&self) -> u64 {
        self.signals_sent.load(Ordering::Relaxed)
    }

    fn armed(&self) -> MutexGuard<'_, Option<Armed>> {
        self.armed.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_without_armed_run_is_noop() {
        let controller = CancelController::new();
        assert!(!controller.cancel());
        assert_eq!(controller.signals_sent(), 0);
    }

    #[test]
    fn cancel_reaches_armed_run_once() {
        let controller = CancelController::new();
        let token = controller.arm(RunId::new(1));

        assert!(controller.cancel());
        assert!(token.is_cancelled());
        assert!(!controller.cancel());
        assert_eq!(controller.signals_sent(), 1);
    }

    #[test]
    fn cancel_never_reaches_a_later_run() {
        let controller = CancelController::new();
        let first = controller.arm(RunId::new(1));
        controller.cancel();

        let second = controller.arm(RunId::new(2));
        assert!(first.is_cancelled());
        assert!(!second.is_cancelled());
    }

    #[test]
    fn disarm_ignores_stale_run() {
        let controller = CancelController::new();
        controller.arm(RunId::new(1));
        controller.arm(RunId::new(2));

        assert!(!controller.disarm(RunId::new(1)));
        assert_eq!(controller.armed_run(), Some(RunId::new(2)));
        assert!(controller.disarm(RunId::new(2)));
        assert!(!controller.cancel());
    }
}
