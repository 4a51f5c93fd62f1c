/*
[INPUT]:  View/Navigator calls from the session's UI loop, y/n answers from keys
[OUTPUT]: Log lines, status message and pending dialog state read by the renderer
[POS]:    TUI side of the view contract
[UPDATE]: When the view contract or the dialog handling changes
*/

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio_util::sync::CancellationToken;
use tracing::debug;

use sharegate_core::{ConfirmReply, Navigator, PipelineError, View};

use super::log::{LogBuffer, LogBufferHandle};

/// Shared screen state. The session writes into it, the draw loop reads it.
pub(super) struct TermView {
    log: LogBufferHandle,
    status: Mutex<String>,
    confirm: Mutex<Option<ConfirmReply>>,
    closed: CancellationToken,
}

impl TermView {
    pub(super) fn new(log_capacity: usize) -> Self {
        Self {
            log: Arc::new(Mutex::new(LogBuffer::new(log_capacity))),
            status: Mutex::new("Ready".to_string()),
            confirm: Mutex::new(None),
            closed: CancellationToken::new(),
        }
    }

    pub(super) fn log(&self) -> &LogBufferHandle {
        &self.log
    }

    pub(super) fn status(&self) -> String {
        lock(&self.status).clone()
    }

    pub(super) fn has_pending_confirm(&self) -> bool {
        lock(&self.confirm)
            .as_ref()
            .is_some_and(ConfirmReply::is_pending)
    }

    /// Answer the open dialog. Returns `false` if none was open.
    pub(super) fn answer(&self, confirmed: bool) -> bool {
        match lock(&self.confirm).take() {
            Some(reply) => {
                reply.answer(confirmed);
                true
            }
            None => false,
        }
    }

    /// Fires once the navigator was asked to go back.
    pub(super) fn closed(&self) -> &CancellationToken {
        &self.closed
    }

    fn set_status(&self, message: String) {
        *lock(&self.status) = message;
    }
}

impl View for TermView {
    fn print_log(&self, message: &str) {
        super::log::lock(&self.log).push_line(message.to_string());
    }

    fn clear_log(&self) {
        super::log::lock(&self.log).clear();
        self.set_status("Log cleared".to_string());
    }

    fn show_error(&self, error: &PipelineError) {
        self.set_status(format!("Error: {error}"));
    }

    fn show_confirm_dialog(&self, reply: ConfirmReply) {
        if lock(&self.confirm).replace(reply).is_some() {
            debug!("replaced an unanswered confirmation dialog");
        }
    }

    fn dismiss_confirm_dialog(&self) {
        lock(&self.confirm).take();
    }
}

impl Navigator for TermView {
    fn go_back(&self) {
        self.closed.cancel();
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
