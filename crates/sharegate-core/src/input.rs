/*
[INPUT]:  Raw click events from the view (start, cancel, clear log, close)
[OUTPUT]: Debounced/throttled intents for the session dispatcher
[POS]:    Input layer - click filtering ahead of the orchestrator
[UPDATE]: When changing debounce/throttle policy per click kind
*/

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::InputConfig;

/// Raw click sources exposed by a view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Click {
    Start,
    Cancel,
    ClearLog,
    Close,
}

/// Clean intent emitted once a click survives the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Intent {
    Start,
    Cancel,
    ClearLog,
    Close,
}

impl Click {
    const ALL: [Click; 4] = [Click::Start, Click::Cancel, Click::ClearLog, Click::Close];

    fn slot(self) -> usize {
        match self {
            Click::Start => 0,
            Click::Cancel => 1,
            Click::ClearLog => 2,
            Click::Close => 3,
        }
    }

    fn intent(self) -> Intent {
        match self {
            Click::Start => Intent::Start,
            Click::Cancel => Intent::Cancel,
            Click::ClearLog => Intent::ClearLog,
            Click::Close => Intent::Close,
        }
    }
}

/// Debounce slots per click kind plus the leading throttle window for start.
///
/// Time is passed in by the caller so the policy can be driven by any clock.
#[derive(Debug, Clone)]
pub struct GateState {
    debounce: Duration,
    start_throttle: Duration,
    pending: [Option<Instant>; 4],
    throttle_until: Option<Instant>,
}

impl GateState {
    pub fn new(config: &InputConfig) -> Self {
        Self {
            debounce: config.debounce(),
            start_throttle: config.start_throttle(),
            pending: [None; 4],
            throttle_until: None,
        }
    }

    /// Record a raw click; restarts that kind's debounce window.
    pub fn on_click(&mut self, click: Click, now: Instant) {
        self.pending[click.slot()] = Some(now + self.debounce);
    }

    /// Earliest instant at which `fire_due` can produce an intent.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.iter().flatten().min().copied()
    }

    /// Release every debounced click whose window elapsed by `now`, in deadline order.
    pub fn fire_due(&mut self, now: Instant) -> Vec<Intent> {
        let mut due: Vec<(Instant, Click)> = Click::ALL
            .iter()
            .filter_map(|click| {
                let slot = &mut self.pending[click.slot()];
                match *slot {
                    Some(deadline) if deadline <= now => {
                        *slot = None;
                        Some((deadline, *click))
                    }
                    _ => None,
                }
            })
            .collect();
        due.sort_by_key(|(deadline, _)| *deadline);

        let mut intents = Vec::with_capacity(due.len());
        for (emitted_at, click) in due {
            if click == Click::Start {
                if self.throttle_until.is_some_and(|until| emitted_at < until) {
                    debug!("start click dropped by throttle window");
                    continue;
                }
                self.throttle_until = Some(emitted_at + self.start_throttle);
            }
            intents.push(click.intent());
        }
        intents
    }
}

/// Drive a `GateState` from the raw click channel until shutdown or the channel closes.
///
/// Pending debounces are discarded when the gate stops.
pub async fn run_input_gate(
    mut clicks: mpsc::UnboundedReceiver<Click>,
    config: InputConfig,
    intents: mpsc::UnboundedSender<Intent>,
    shutdown: CancellationToken,
) {
    let mut gate = GateState::new(&config);

    loop {
        let deadline = gate.next_deadline();
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            _ = wait_until(deadline) => {
                for intent in gate.fire_due(Instant::now()) {
                    debug!(?intent, "intent released");
                    if intents.send(intent).is_err() {
                        return;
                    }
                }
            }
            click = clicks.recv() => {
                match click {
                    Some(click) => gate.on_click(click, Instant::now()),
                    None => break,
                }
            }
        }
    }

    debug!("input gate stopped");
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
