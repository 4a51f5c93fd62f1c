/*
[INPUT]:  Progress/error/report subscriptions, UI commands from the dispatcher and runs
[OUTPUT]: Ordered calls into the View and Navigator collaborators
[POS]:    UI-facing execution context - the only caller of view/navigator methods
[UPDATE]: When the view contract or the confirmation hand-off changes
[UPDATE]: Dismiss an open confirmation when its run is cancelled or superseded
[UPDATE]: 2026-10-16 Poll errors ahead of progress so a failure precedes its Stop
*/

use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::broadcast::{ErrorEvent, RunOutcome, RunReport};
use crate::error::PipelineError;
use crate::progress::{ProgressEvent, RunId};

const FINISHED_LINE: &str = "all finished!";
const CONFIRM_SHOWN_LINE: &str = "Show a confirmation dialog...";

/// Screen-side sinks. Implementations must return quickly.
pub trait View: Send + Sync {
    fn print_log(&self, message: &str);

    fn clear_log(&self);

    fn show_error(&self, error: &PipelineError);

    /// Present a yes/no dialog; answer through `reply` exactly once.
    ///
    /// Dropping `reply` without answering counts as a closed dialog.
    fn show_confirm_dialog(&self, reply: ConfirmReply);

    /// Called when the run waiting on the open dialog went away.
    fn dismiss_confirm_dialog(&self) {}
}

pub trait Navigator: Send + Sync {
    fn go_back(&self);
}

/// One-shot responder handed to `View::show_confirm_dialog`.
#[derive(Debug)]
pub struct ConfirmReply {
    tx: oneshot::Sender<bool>,
}

impl ConfirmReply {
    /// A reply and the receiver that observes its answer.
    pub fn channel() -> (Self, oneshot::Receiver<bool>) {
        let (tx, rx) = oneshot::channel();
        (Self { tx }, rx)
    }

    pub fn answer(self, confirmed: bool) {
        let _ = self.tx.send(confirmed);
    }

    /// Whether anyone is still waiting for the answer.
    pub fn is_pending(&self) -> bool {
        !self.tx.is_closed()
    }
}

#[derive(Debug)]
pub(crate) enum UiCommand {
    ClearLog,
    GoBack,
    Confirm {
        run_id: RunId,
        forward: oneshot::Sender<bool>,
    },
    DismissConfirm {
        run_id: RunId,
    },
}

/// Sender side of the UI context, cloned into the dispatcher and every run.
#[derive(Debug, Clone)]
pub(crate) struct UiHandle {
    tx: mpsc::UnboundedSender<UiCommand>,
}

impl UiHandle {
    pub(crate) fn channel() -> (Self, mpsc::UnboundedReceiver<UiCommand>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub(crate) fn clear_log(&self) {
        let _ = self.tx.send(UiCommand::ClearLog);
    }

    pub(crate) fn go_back(&self) {
        let _ = self.tx.send(UiCommand::GoBack);
    }

    /// Ask the UI context to show the dialog. The receiver yields the single answer,
    /// or an error if the dialog was closed or the UI context is gone.
    pub(crate) fn request_confirmation(&self, run_id: RunId) -> oneshot::Receiver<bool> {
        let (forward, rx) = oneshot::channel();
        let _ = self.tx.send(UiCommand::Confirm { run_id, forward });
        rx
    }

    pub(crate) fn dismiss_confirmation(&self, run_id: RunId) {
        let _ = self.tx.send(UiCommand::DismissConfirm { run_id });
    }
}

struct PendingConfirm {
    run_id: RunId,
    answer: oneshot::Receiver<bool>,
    forward: oneshot::Sender<bool>,
}

/// Receivers drained by the UI loop. Subscribed before any run can publish.
pub(crate) struct UiSources {
    pub(crate) commands: mpsc::UnboundedReceiver<UiCommand>,
    pub(crate) progress: broadcast::Receiver<ProgressEvent>,
    pub(crate) errors: broadcast::Receiver<ErrorEvent>,
    pub(crate) reports: broadcast::Receiver<RunReport>,
}

struct UiContext {
    view: Arc<dyn View>,
    navigator: Arc<dyn Navigator>,
    shutdown: CancellationToken,
}

impl UiContext {
    fn deliver(&self, f: impl FnOnce(&dyn View)) {
        if self.shutdown.is_cancelled() {
            return;
        }
        f(self.view.as_ref());
    }
}

/// Serialise every observer-facing effect onto one task.
///
/// Errors are polled first so a failure is shown before the Stop it causes.
/// Progress comes next so a run's Stop reaches the view before the dialog it
/// leads to and before that run's completion line.
pub(crate) async fn run_ui_loop(
    view: Arc<dyn View>,
    navigator: Arc<dyn Navigator>,
    sources: UiSources,
    shutdown: CancellationToken,
) {
    let UiSources {
        mut commands,
        mut progress,
        mut errors,
        mut reports,
    } = sources;
    let ctx = UiContext {
        view,
        navigator,
        shutdown: shutdown.clone(),
    };
    let mut pending: Option<PendingConfirm> = None;

    loop {
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            res = errors.recv() => match res {
                Ok(event) => ctx.deliver(|view| view.show_error(&event.error)),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "ui lagged behind error broadcast");
                }
                Err(RecvError::Closed) => break,
            },
            res = progress.recv() => match res {
                Ok(event) => ctx.deliver(|view| view.print_log(&event.state.log_line())),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "ui lagged behind progress broadcast");
                }
                Err(RecvError::Closed) => break,
            },
            res = reports.recv() => match res {
                Ok(RunReport { outcome: RunOutcome::Completed { .. }, .. }) => {
                    ctx.deliver(|view| view.print_log(FINISHED_LINE));
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "ui lagged behind run reports");
                }
                Err(RecvError::Closed) => break,
            },
            answer = next_answer(&mut pending) => {
                let Some(confirm) = pending.take() else { continue };
                match answer {
                    Ok(confirmed) => {
                        ctx.deliver(|view| {
                            view.print_log(&format!("Confirmation dialog returns {confirmed}"));
                        });
                        let _ = confirm.forward.send(confirmed);
                    }
                    Err(_) => {
                        debug!(run_id = %confirm.run_id, "confirmation dialog closed without answer");
                    }
                }
            }
            cmd = commands.recv() => match cmd {
                Some(cmd) => handle_command(&ctx, &mut pending, cmd),
                None => break,
            },
        }
    }

    debug!("ui loop stopped");
}

fn handle_command(ctx: &UiContext, pending: &mut Option<PendingConfirm>, cmd: UiCommand) {
    match cmd {
        UiCommand::ClearLog => ctx.deliver(|view| view.clear_log()),
        UiCommand::GoBack => {
            if !ctx.shutdown.is_cancelled() {
                ctx.navigator.go_back();
            }
        }
        UiCommand::Confirm { run_id, forward } => {
            if let Some(stale) = pending.take() {
                debug!(run_id = %stale.run_id, "replacing stale confirmation");
                ctx.deliver(|view| view.dismiss_confirm_dialog());
            }
            let (reply, answer) = ConfirmReply::channel();
            *pending = Some(PendingConfirm {
                run_id,
                answer,
                forward,
            });
            ctx.deliver(|view| {
                view.print_log(CONFIRM_SHOWN_LINE);
                view.show_confirm_dialog(reply);
            });
        }
        UiCommand::DismissConfirm { run_id } => {
            if pending.as_ref().is_some_and(|p| p.run_id == run_id) {
                *pending = None;
                ctx.deliver(|view| view.dismiss_confirm_dialog());
            }
        }
    }
}

async fn next_answer(
    pending: &mut Option<PendingConfirm>,
) -> Result<bool, oneshot::error::RecvError> {
    match pending.as_mut() {
        Some(confirm) => (&mut confirm.answer).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broadcast::Broadcaster;
    use crate::config::BroadcastConfig;
    use crate::phase::Phase;
    use crate::progress::{ProgressState, StopCause};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Default)]
    struct Recorder {
        lines: Mutex<Vec<String>>,
        held: Mutex<Option<ConfirmReply>>,
        auto_answer: Option<bool>,
        dismissed: AtomicUsize,
        backs: AtomicUsize,
    }

    impl View for Recorder {
        fn print_log(&self, message: &str) {
            self.lines.lock().unwrap().push(message.to_string());
        }

        fn clear_log(&self) {
            self.lines.lock().unwrap().clear();
        }

        fn show_error(&self, error: &PipelineError) {
            self.print_log(&format!("error: {error}"));
        }

        fn show_confirm_dialog(&self, reply: ConfirmReply) {
            match self.auto_answer {
                Some(confirmed) => reply.answer(confirmed),
                None => *self.held.lock().unwrap() = Some(reply),
            }
        }

        fn dismiss_confirm_dialog(&self) {
            self.held.lock().unwrap().take();
            self.dismissed.fetch_add(1, Ordering::SeqCst);
        }
    }

    impl Navigator for Recorder {
        fn go_back(&self) {
            self.backs.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct LoopUnderTest {
        ui: UiHandle,
        shutdown: CancellationToken,
        handle: tokio::task::JoinHandle<()>,
        hub: Broadcaster,
    }

    fn spawn_loop(recorder: Arc<Recorder>) -> LoopUnderTest {
        let hub = Broadcaster::new(&BroadcastConfig::default());
        let (ui, commands) = UiHandle::channel();
        let sources = UiSources {
            commands,
            progress: hub.subscribe_progress(),
            errors: hub.subscribe_errors(),
            reports: hub.subscribe_reports(),
        };
        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(run_ui_loop(
            recorder.clone(),
            recorder,
            sources,
            shutdown.clone(),
        ));
        LoopUnderTest {
            ui,
            shutdown,
            handle,
            hub,
        }
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn answer_is_logged_before_it_is_forwarded() {
        let recorder = Arc::new(Recorder {
            auto_answer: Some(true),
            ..Default::default()
        });
        let LoopUnderTest { ui, hub: _hub, .. } = spawn_loop(recorder.clone());

        let answer = ui.request_confirmation(RunId::new(1));
        assert_eq!(answer.await, Ok(true));
        assert_eq!(
            *recorder.lines.lock().unwrap(),
            vec![CONFIRM_SHOWN_LINE, "Confirmation dialog returns true"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn dismiss_only_applies_to_matching_run() {
        let recorder = Arc::new(Recorder::default());
        let LoopUnderTest { ui, hub: _hub, .. } = spawn_loop(recorder.clone());

        let answer = ui.request_confirmation(RunId::new(1));
        settle().await;
        assert!(recorder.held.lock().unwrap().is_some());

        ui.dismiss_confirmation(RunId::new(2));
        settle().await;
        assert_eq!(recorder.dismissed.load(Ordering::SeqCst), 0);

        ui.dismiss_confirmation(RunId::new(1));
        settle().await;
        assert_eq!(recorder.dismissed.load(Ordering::SeqCst), 1);
        assert!(answer.await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn newer_confirmation_replaces_stale_dialog() {
        let recorder = Arc::new(Recorder::default());
        let LoopUnderTest { ui, hub: _hub, .. } = spawn_loop(recorder.clone());

        let stale = ui.request_confirmation(RunId::new(1));
        let fresh = ui.request_confirmation(RunId::new(2));
        settle().await;
        assert_eq!(recorder.dismissed.load(Ordering::SeqCst), 1);
        assert!(stale.await.is_err());

        let reply = recorder.held.lock().unwrap().take().unwrap();
        reply.answer(false);
        assert_eq!(fresh.await, Ok(false));
    }

    #[tokio::test(start_paused = true)]
    async fn nothing_reaches_navigator_after_shutdown() {
        let recorder = Arc::new(Recorder::default());
        let LoopUnderTest {
            ui,
            shutdown,
            handle,
            hub: _hub,
        } = spawn_loop(recorder.clone());

        shutdown.cancel();
        ui.go_back();
        handle.await.unwrap();
        assert_eq!(recorder.backs.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn failure_is_shown_before_its_stop() {
        let recorder = Arc::new(Recorder::default());
        let LoopUnderTest { ui: _ui, hub, .. } = spawn_loop(recorder.clone());
        let run_id = RunId::new(1);
        hub.begin_run(run_id);

        hub.publish_progress(run_id, ProgressState::Start);
        settle().await;
        hub.publish_error(
            run_id,
            PipelineError::workload(Phase::Generate, 5, "disk full"),
        );
        hub.publish_stop(run_id, StopCause::Failed);
        settle().await;

        assert_eq!(
            *recorder.lines.lock().unwrap(),
            vec![
                "--- START ---",
                "error: generate failed at 5%: disk full",
                "---!!! STOP !!!---",
            ]
        );
    }

    #[test]
    fn reply_reports_pending_until_receiver_drops() {
        let (reply, rx) = ConfirmReply::channel();
        assert!(reply.is_pending());
        drop(rx);
        assert!(!reply.is_pending());
    }
}
