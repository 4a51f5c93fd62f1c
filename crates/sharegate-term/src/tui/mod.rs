/*
[INPUT]:  PipelineConfig, Workload, trace buffer and shutdown token from main
[OUTPUT]: Ratatui-based terminal front-end bound to a pipeline session
[POS]:    TUI module for the sharegate binary
[UPDATE]: When changing TUI layout, keybindings, or runtime controls
*/

mod keys;
mod log;
mod runtime;
mod terminal;
mod ui;
mod view;

pub use log::{LogBuffer, LogBufferHandle, LogWriterFactory, TRACE_BUFFER_CAPACITY};
pub use runtime::run_tui;
