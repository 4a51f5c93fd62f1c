/*
[INPUT]:  Public API exports for sharegate-core crate
[OUTPUT]: Module declarations and public re-exports
[POS]:    Crate root - library entry point
[UPDATE]: When adding new modules or public exports
*/

pub mod broadcast;
pub mod cancel;
pub mod config;
pub mod error;
pub mod input;
pub mod lifecycle;
pub mod orchestrator;
pub mod phase;
pub mod progress;
pub mod session;
pub mod state_machine;
pub mod view;

pub use broadcast::{Broadcaster, ErrorEvent, RunOutcome, RunReport};
pub use cancel::CancelController;
pub use config::PipelineConfig;
pub use error::{PipelineError, Result};
pub use input::{Click, Intent};
pub use orchestrator::{Orchestrator, RunStatus};
pub use phase::{FailingWorkload, Phase, SimulatedWorkload, Workload};
pub use progress::{ProgressEvent, ProgressState, RunId};
pub use session::Session;
pub use state_machine::RunPhase;
pub use view::{ConfirmReply, Navigator, View};
