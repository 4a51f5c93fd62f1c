/*
[INPUT]:  Session bindings under test
[OUTPUT]: Recording View/Navigator fakes and session helpers
[POS]:    Test infrastructure - shared across all integration tests
[UPDATE]: When the view contract changes or new fixtures are needed
*/

//! Common test utilities for sharegate-core integration tests

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use sharegate_core::{
    Click, ConfirmReply, Navigator, PipelineConfig, PipelineError, Session, View, Workload,
};
use tokio::sync::{mpsc, watch};

pub const START: &str = "--- START ---";
pub const STOP: &str = "---!!! STOP !!!---";
pub const FINISHED: &str = "all finished!";
pub const CONFIRM_SHOWN: &str = "Show a confirmation dialog...";

/// How the fake view answers a confirmation dialog.
#[derive(Debug, Clone, Copy)]
pub enum ConfirmMode {
    Answer(bool),
    /// Keep the reply so the test decides later.
    Hold,
    /// Drop the reply without answering.
    Close,
}

pub struct RecordingView {
    lines: Mutex<Vec<String>>,
    errors: Mutex<Vec<String>>,
    held: Mutex<Option<ConfirmReply>>,
    mode: ConfirmMode,
    clears: AtomicUsize,
    dismissals: AtomicUsize,
    changes: watch::Sender<usize>,
}

impl RecordingView {
    pub fn new(mode: ConfirmMode) -> Arc<Self> {
        let (changes, _) = watch::channel(0);
        Arc::new(Self {
            lines: Mutex::new(Vec::new()),
            errors: Mutex::new(Vec::new()),
            held: Mutex::new(None),
            mode,
            clears: AtomicUsize::new(0),
            dismissals: AtomicUsize::new(0),
            changes,
        })
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap().clone()
    }

    pub fn errors(&self) -> Vec<String> {
        self.errors.lock().unwrap().clone()
    }

    pub fn count(&self, line: &str) -> usize {
        self.lines.lock().unwrap().iter().filter(|l| *l == line).count()
    }

    pub fn clears(&self) -> usize {
        self.clears.load(Ordering::SeqCst)
    }

    pub fn dismissals(&self) -> usize {
        self.dismissals.load(Ordering::SeqCst)
    }

    pub fn take_held(&self) -> Option<ConfirmReply> {
        self.held.lock().unwrap().take()
    }

    /// Wait (in virtual time) until `done` holds for the recorded lines.
    pub async fn wait_until(&self, done: impl Fn(&[String]) -> bool) {
        let mut changes = self.changes.subscribe();
        let waited = tokio::time::timeout(Duration::from_secs(60), async {
            loop {
                if done(&self.lines.lock().unwrap()) {
                    return;
                }
                if changes.changed().await.is_err() {
                    return;
                }
            }
        })
        .await;
        assert!(waited.is_ok(), "timed out; lines so far: {:?}", self.lines());
    }

    pub async fn wait_for_line(&self, line: &str) {
        self.wait_until(|lines| lines.iter().any(|l| l == line)).await;
    }

    fn touch(&self) {
        self.changes.send_modify(|n| *n += 1);
    }
}

impl View for RecordingView {
    fn print_log(&self, message: &str) {
        self.lines.lock().unwrap().push(message.to_string());
        self.touch();
    }

    fn clear_log(&self) {
        self.lines.lock().unwrap().clear();
        self.clears.fetch_add(1, Ordering::SeqCst);
        self.touch();
    }

    fn show_error(&self, error: &PipelineError) {
        self.errors.lock().unwrap().push(error.to_string());
        self.touch();
    }

    fn show_confirm_dialog(&self, reply: ConfirmReply) {
        match self.mode {
            ConfirmMode::Answer(confirmed) => reply.answer(confirmed),
            ConfirmMode::Hold => *self.held.lock().unwrap() = Some(reply),
            ConfirmMode::Close => drop(reply),
        }
    }

    fn dismiss_confirm_dialog(&self) {
        self.held.lock().unwrap().take();
        self.dismissals.fetch_add(1, Ordering::SeqCst);
        self.touch();
    }
}

#[derive(Default)]
pub struct RecordingNavigator {
    backs: AtomicUsize,
}

impl RecordingNavigator {
    pub fn backs(&self) -> usize {
        self.backs.load(Ordering::SeqCst)
    }
}

impl Navigator for RecordingNavigator {
    fn go_back(&self) {
        self.backs.fetch_add(1, Ordering::SeqCst);
    }
}

pub struct Harness {
    pub session: Session,
    pub view: Arc<RecordingView>,
    pub navigator: Arc<RecordingNavigator>,
    pub clicks: mpsc::UnboundedSender<Click>,
}

impl Harness {
    pub fn click(&self, click: Click) {
        self.clicks.send(click).unwrap();
    }
}

pub fn bind(mode: ConfirmMode) -> Harness {
    bind_with(mode, None)
}

pub fn bind_with(mode: ConfirmMode, workload: Option<Arc<dyn Workload>>) -> Harness {
    let view = RecordingView::new(mode);
    let navigator = Arc::new(RecordingNavigator::default());
    let (clicks, rx) = mpsc::unbounded_channel();
    let config = PipelineConfig::default();

    let session = match workload {
        Some(workload) => {
            Session::bind_with_workload(view.clone(), navigator.clone(), rx, config, workload)
        }
        None => Session::bind(view.clone(), navigator.clone(), rx, config),
    }
    .unwrap();

    Harness {
        session,
        view,
        navigator,
        clicks,
    }
}

/// Lines printed by one phase: START, doing 1..=last, STOP.
pub fn phase_lines(last: u8) -> Vec<String> {
    let mut lines = vec![START.to_string()];
    lines.extend((1..=last).map(|percent| format!("doing {percent}%...")));
    lines.push(STOP.to_string());
    lines
}
