/*
[INPUT]:  TermView state, run status snapshot, optional trace buffer
[OUTPUT]: Status bar, Log/Trace panels, hotkey footer and confirmation overlay
[POS]:    TUI rendering
[UPDATE]: When changing TUI layout or palette
*/

use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Wrap};

use sharegate_core::{RunPhase, RunStatus};

use super::log::{LogBufferHandle, lock};
use super::view::TermView;

pub(super) fn draw_ui(
    frame: &mut ratatui::Frame,
    view: &TermView,
    trace: Option<&LogBufferHandle>,
    status: RunStatus,
) {
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(5),
            Constraint::Length(3),
        ])
        .split(frame.area());

    draw_status(frame, layout[0], view, status);

    match trace {
        Some(trace) => {
            let middle = Layout::default()
                .direction(Direction::Horizontal)
                .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
                .split(layout[1]);
            draw_lines(frame, middle[0], view.log(), "Log");
            draw_lines(frame, middle[1], trace, "Trace");
        }
        None => draw_lines(frame, layout[1], view.log(), "Log"),
    }

    draw_footer(frame, layout[2]);

    if view.has_pending_confirm() {
        let area = frame.area();
        draw_confirm(frame, area);
    }
}

fn draw_status(frame: &mut ratatui::Frame, area: Rect, view: &TermView, status: RunStatus) {
    let run = status
        .run_id
        .map(|id| id.to_string())
        .unwrap_or_else(|| "-".to_string());
    let line = Line::from(vec![
        Span::styled("Run ", header_style()),
        Span::raw(format!(" {run}  ")),
        Span::styled("Phase ", header_style()),
        Span::styled(format!(" {}  ", phase_label(status.phase)), phase_style(status.phase)),
        Span::raw(view.status()),
    ]);
    let widget = Paragraph::new(line).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(border_style())
            .title("Status"),
    );
    frame.render_widget(widget, area);
}

fn draw_lines(frame: &mut ratatui::Frame, area: Rect, buffer: &LogBufferHandle, title: &str) {
    let available = area.height.saturating_sub(2) as usize;
    let (lines, total) = {
        let guard = lock(buffer);
        (guard.tail(available), guard.len())
    };

    let text = lines.into_iter().map(Line::from).collect::<Vec<_>>();
    let widget = Paragraph::new(text).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(border_style())
            .title(format!("{title} ({total})")),
    );
    frame.render_widget(widget, area);
}

fn draw_footer(frame: &mut ratatui::Frame, area: Rect) {
    let key_style = Style::default()
        .fg(Color::Black)
        .bg(Color::Yellow)
        .add_modifier(Modifier::BOLD);
    let line = Line::from(vec![
        Span::styled("[s]", key_style),
        Span::raw(" Start  "),
        Span::styled("[c]", key_style),
        Span::raw(" Cancel  "),
        Span::styled("[l]", key_style),
        Span::raw(" Clear log  "),
        Span::styled("[y/n]", key_style),
        Span::raw(" Answer  "),
        Span::styled("[q/Esc]", key_style),
        Span::raw(" Close"),
    ]);
    let widget = Paragraph::new(line)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(border_style())
                .title("Hotkeys"),
        )
        .wrap(Wrap { trim: true });
    frame.render_widget(widget, area);
}

fn draw_confirm(frame: &mut ratatui::Frame, area: Rect) {
    let popup = centered(area, 44, 5);
    let text = Text::from(vec![
        Line::from("Share the generated result?"),
        Line::from(""),
        Line::from("[y] Yes    [n] No"),
    ]);
    let widget = Paragraph::new(text).alignment(Alignment::Center).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Yellow))
            .title("Confirm"),
    );
    frame.render_widget(Clear, popup);
    frame.render_widget(widget, popup);
}

fn centered(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    }
}

fn phase_label(phase: RunPhase) -> &'static str {
    match phase {
        RunPhase::Idle => "idle",
        RunPhase::Generating => "generating",
        RunPhase::AwaitingConfirmation => "awaiting confirmation",
        RunPhase::Sharing => "sharing",
        RunPhase::Terminated => "finished",
    }
}

fn phase_style(phase: RunPhase) -> Style {
    if phase.is_active() {
        Style::default()
            .fg(Color::LightGreen)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::Gray)
    }
}

fn border_style() -> Style {
    Style::default().fg(Color::Magenta)
}

fn header_style() -> Style {
    Style::default()
        .fg(Color::Black)
        .bg(Color::Cyan)
        .add_modifier(Modifier::BOLD)
}
