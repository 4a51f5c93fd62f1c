/*
[INPUT]:  PipelineConfig, Workload, optional trace buffer, shutdown token
[OUTPUT]: Ratatui run loop bound to a pipeline session until close or shutdown
[POS]:    TUI runtime loop
[UPDATE]: When changing the input thread, redraw cadence or session teardown
*/

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use crossterm::event::Event as CrosstermEvent;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use sharegate_core::{PipelineConfig, Session, Workload};

use super::keys::{KeyAction, map_key};
use super::log::LogBufferHandle;
use super::terminal::TerminalGuard;
use super::ui::draw_ui;
use super::view::TermView;

const UI_TICK_INTERVAL: Duration = Duration::from_millis(50);
const INPUT_POLL_INTERVAL: Duration = Duration::from_millis(100);

enum UiEvent {
    Input(CrosstermEvent),
}

pub async fn run_tui(
    config: PipelineConfig,
    workload: Arc<dyn Workload>,
    trace: Option<LogBufferHandle>,
    shutdown: CancellationToken,
) -> Result<()> {
    let view = Arc::new(TermView::new(config.log.capacity));
    let (clicks, clicks_rx) = mpsc::unbounded_channel();
    let mut session =
        Session::bind_with_workload(view.clone(), view.clone(), clicks_rx, config, workload)
            .context("bind pipeline session")?;
    let run_state = session.run_state();

    let mut terminal = TerminalGuard::new()?;
    let (event_tx, mut event_rx) = mpsc::unbounded_channel();
    let input_shutdown = CancellationToken::new();
    let input_shutdown_clone = input_shutdown.clone();

    tokio::task::spawn_blocking(move || {
        while !input_shutdown_clone.is_cancelled() {
            if crossterm::event::poll(INPUT_POLL_INTERVAL).unwrap_or(false) {
                if let Ok(event) = crossterm::event::read() {
                    if event_tx.send(UiEvent::Input(event)).is_err() {
                        break;
                    }
                }
            }
        }
    });

    let mut tick = tokio::time::interval(UI_TICK_INTERVAL);
    tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let result = loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                info!("shutdown requested");
                break Ok(());
            }
            _ = view.closed().cancelled() => {
                info!("close requested");
                break Ok(());
            }
            _ = tick.tick() => {}
            maybe_event = event_rx.recv() => match maybe_event {
                Some(UiEvent::Input(CrosstermEvent::Key(key))) => {
                    match map_key(key, view.has_pending_confirm()) {
                        KeyAction::Click(click) => {
                            let _ = clicks.send(click);
                        }
                        KeyAction::Answer(confirmed) => {
                            if !view.answer(confirmed) {
                                debug!("answer key ignored; no dialog open");
                            }
                        }
                        KeyAction::Ignore => {}
                    }
                }
                Some(UiEvent::Input(_)) => {}
                None => break Ok(()),
            },
        }

        let status = *run_state.borrow();
        if let Err(err) = terminal.draw(|frame| draw_ui(frame, &view, trace.as_ref(), status)) {
            break Err(err);
        }
    };

    session.unbind();
    input_shutdown.cancel();
    result
}
