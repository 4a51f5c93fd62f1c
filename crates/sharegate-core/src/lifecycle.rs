/*
[INPUT]:  Tasks spawned on behalf of one bound session
[OUTPUT]: A single release point that cancels and aborts all of them
[POS]:    Execution layer - ownership of session-scoped tasks
[UPDATE]: When adding long-lived tasks to a session
*/

use std::future::Future;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Every task a session owns, released together.
///
/// Dropping the group releases it.
#[derive(Debug, Default)]
pub struct TaskGroup {
    token: CancellationToken,
    handles: Vec<(&'static str, JoinHandle<()>)>,
    released: bool,
}

impl TaskGroup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Token cancelled on release. Tasks should exit when it fires.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn spawn<F>(&mut self, name: &'static str, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(future);
        self.track(name, handle);
    }

    /// Take ownership of an already spawned task.
    pub fn track(&mut self, name: &'static str, handle: JoinHandle<()>) {
        if self.released {
            handle.abort();
            return;
        }
        self.handles.push((name, handle));
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Cancel the token and abort every task. Safe to call more than once.
    pub fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        self.token.cancel();
        for (name, handle) in self.handles.drain(..) {
            if !handle.is_finished() {
                debug!(task = name, "aborting session task");
            }
            handle.abort();
        }
    }

    pub fn is_released(&self) -> bool {
        self.released
    }
}

impl Drop for TaskGroup {
    fn drop(&mut self) {
        self.release();
    }
}
