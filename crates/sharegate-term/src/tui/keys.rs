/*
[INPUT]:  Crossterm key events, whether a confirmation dialog is open
[OUTPUT]: Clicks for the session or answers for the open dialog
[POS]:    TUI key bindings
[UPDATE]: When adding or changing hotkeys
*/

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

use sharegate_core::Click;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum KeyAction {
    Click(Click),
    Answer(bool),
    Ignore,
}

pub(super) fn map_key(key: KeyEvent, dialog_open: bool) -> KeyAction {
    if key.kind != KeyEventKind::Press {
        return KeyAction::Ignore;
    }
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        return match key.code {
            KeyCode::Char('c') => KeyAction::Click(Click::Close),
            _ => KeyAction::Ignore,
        };
    }

    match key.code {
        KeyCode::Char('y') | KeyCode::Char('Y') if dialog_open => KeyAction::Answer(true),
        KeyCode::Char('n') | KeyCode::Char('N') if dialog_open => KeyAction::Answer(false),
        KeyCode::Char('s') => KeyAction::Click(Click::Start),
        KeyCode::Char('c') => KeyAction::Click(Click::Cancel),
        KeyCode::Char('l') => KeyAction::Click(Click::ClearLog),
        // Back and quit share one close stream.
        KeyCode::Char('q') | KeyCode::Esc | KeyCode::Backspace => KeyAction::Click(Click::Close),
        _ => KeyAction::Ignore,
    }
}
