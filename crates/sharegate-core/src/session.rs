/*
[INPUT]:  View/Navigator collaborators, raw click channel, PipelineConfig, Workload
[OUTPUT]: A bound session: input gate, intent dispatcher and UI loop tasks
[POS]:    Entry point - wires every component for one screen binding
[UPDATE]: When adding session-scoped tasks or changing teardown order
[UPDATE]: 2026-10-16 Validate the config before any task is spawned
*/

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::broadcast::{Broadcaster, ErrorEvent, RunReport};
use crate::cancel::CancelController;
use crate::config::PipelineConfig;
use crate::error::Result;
use crate::input::{Click, Intent, run_input_gate};
use crate::lifecycle::TaskGroup;
use crate::orchestrator::{Orchestrator, RunStatus};
use crate::phase::{SimulatedWorkload, Workload};
use crate::progress::ProgressEvent;
use crate::view::{Navigator, UiHandle, UiSources, View, run_ui_loop};

/// One binding of the pipeline to a view. Unbinding (or dropping) releases everything.
pub struct Session {
    broadcaster: Arc<Broadcaster>,
    cancel: Arc<CancelController>,
    state: watch::Receiver<RunStatus>,
    group: TaskGroup,
}

impl Session {
    /// Bind with the simulated workload. Must be called inside a Tokio runtime.
    pub fn bind(
        view: Arc<dyn View>,
        navigator: Arc<dyn Navigator>,
        clicks: mpsc::UnboundedReceiver<Click>,
        config: PipelineConfig,
    ) -> Result<Self> {
        Self::bind_with_workload(view, navigator, clicks, config, Arc::new(SimulatedWorkload))
    }

    /// Fails with `PipelineError::Config` before spawning anything if `config` is invalid.
    pub fn bind_with_workload(
        view: Arc<dyn View>,
        navigator: Arc<dyn Navigator>,
        clicks: mpsc::UnboundedReceiver<Click>,
        config: PipelineConfig,
        workload: Arc<dyn Workload>,
    ) -> Result<Self> {
        config.validate()?;

        let mut group = TaskGroup::new();
        let shutdown = group.token();

        let broadcaster = Arc::new(Broadcaster::new(&config.broadcast));
        let cancel = Arc::new(CancelController::new());
        let (ui, commands) = UiHandle::channel();

        // Subscribe before anything can publish.
        let sources = UiSources {
            commands,
            progress: broadcaster.subscribe_progress(),
            errors: broadcaster.subscribe_errors(),
            reports: broadcaster.subscribe_reports(),
        };

        let orchestrator = Orchestrator::new(
            config.clone(),
            workload,
            broadcaster.clone(),
            cancel.clone(),
            ui.clone(),
            shutdown.clone(),
        );
        let state = orchestrator.state();

        let (intent_tx, intent_rx) = mpsc::unbounded_channel();
        group.spawn(
            "ui-loop",
            run_ui_loop(view, navigator, sources, shutdown.clone()),
        );
        group.spawn(
            "dispatcher",
            run_dispatcher(intent_rx, orchestrator, ui, shutdown.clone()),
        );
        group.spawn(
            "input-gate",
            run_input_gate(clicks, config.input, intent_tx, shutdown),
        );

        info!(tasks = group.len(), "session bound");
        Ok(Self {
            broadcaster,
            cancel,
            state,
            group,
        })
    }

    /// Stop every delivery and release all session tasks. Idempotent.
    pub fn unbind(&mut self) {
        if self.group.is_released() {
            return;
        }
        self.broadcaster.close();
        self.group.release();
        info!("session unbound");
    }

    pub fn is_bound(&self) -> bool {
        !self.group.is_released()
    }

    pub fn subscribe_progress(&self) -> broadcast::Receiver<ProgressEvent> {
        self.broadcaster.subscribe_progress()
    }

    pub fn subscribe_errors(&self) -> broadcast::Receiver<ErrorEvent> {
        self.broadcaster.subscribe_errors()
    }

    pub fn subscribe_reports(&self) -> broadcast::Receiver<RunReport> {
        self.broadcaster.subscribe_reports()
    }

    pub fn run_state(&self) -> watch::Receiver<RunStatus> {
        self.state.clone()
    }

    pub fn cancel_signals_sent(&self) -> u64 {
        self.cancel.signals_sent()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.unbind();
    }
}

async fn run_dispatcher(
    mut intents: mpsc::UnboundedReceiver<Intent>,
    mut orchestrator: Orchestrator,
    ui: UiHandle,
    shutdown: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            intent = intents.recv() => match intent {
                Some(Intent::Start) => {
                    orchestrator.start();
                }
                Some(Intent::Cancel) => {
                    orchestrator.cancel();
                }
                Some(Intent::ClearLog) => ui.clear_log(),
                Some(Intent::Close) => ui.go_back(),
                None => break,
            },
        }
    }

    orchestrator.shutdown().await;
    debug!("dispatcher stopped");
}
