//! Status bar rendering with keybindings and state indicators

use crate::ui::theme::DEFAULT_THEME;
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};

/// Run state shown at the right end of the bar
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunIndicator {
    Input,
    Playing,
    Error,
    End,
    Start,
    None,
}

pub struct StatusRenderData<'a> {
    pub message: &'a str,
    pub current_step: usize,
    pub total_steps: usize,
    pub finished: bool,
    pub indicator: RunIndicator,
}

/// Render the status bar at the bottom
pub fn render_status_bar(frame: &mut Frame, area: Rect, data: StatusRenderData<'_>) {
    let layout = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(area);

    let is_error = data.indicator == RunIndicator::Error;
    let total = if data.finished {
        data.total_steps.to_string()
    } else {
        // Suspended runs grow once input is supplied
        format!("{}+", data.total_steps)
    };
    let step_bg = match data.indicator {
        RunIndicator::Error => DEFAULT_THEME.error,
        RunIndicator::Input => DEFAULT_THEME.secondary,
        _ => DEFAULT_THEME.primary,
    };

    let left_spans = vec![
        Span::styled(
            format!(" Step {}/{} ", (data.current_step + 1).min(data.total_steps), total),
            Style::default()
                .bg(step_bg)
                .fg(Color::Black)
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(
            " | ",
            Style::default()
                .bg(DEFAULT_THEME.current_line_bg)
                .fg(DEFAULT_THEME.comment),
        ),
        Span::styled(
            format!(" {} ", data.message),
            Style::default()
                .bg(DEFAULT_THEME.current_line_bg)
                .fg(if is_error { DEFAULT_THEME.error } else { DEFAULT_THEME.fg }),
        ),
    ];
    frame.render_widget(
        Paragraph::new(Line::from(left_spans))
            .style(Style::default().bg(DEFAULT_THEME.current_line_bg))
            .alignment(Alignment::Left),
        layout[0],
    );

    let key_style = Style::default().bg(DEFAULT_THEME.comment).fg(Color::Black);
    let desc_style = Style::default()
        .bg(DEFAULT_THEME.current_line_bg)
        .fg(DEFAULT_THEME.fg);
    let sep_style = Style::default()
        .bg(DEFAULT_THEME.current_line_bg)
        .fg(DEFAULT_THEME.comment);

    let mut right_spans = if data.indicator == RunIndicator::Input {
        vec![
            Span::styled(" ↵ ", key_style),
            Span::styled(" send input ", desc_style),
            Span::styled("│", sep_style),
            Span::styled(" ", desc_style),
            Span::styled(" ← ", key_style),
            Span::styled(" step back ", desc_style),
            Span::styled("│", sep_style),
            Span::styled(" ", desc_style),
            Span::styled(" esc ", key_style),
            Span::styled(" quit ", desc_style),
        ]
    } else {
        vec![
            Span::styled(" ←/→ ", key_style),
            Span::styled(" step ", desc_style),
            Span::styled("│", sep_style),
            Span::styled(" ", desc_style),
            Span::styled(" ⎵ ", key_style),
            Span::styled(" play ", desc_style),
            Span::styled("│", sep_style),
            Span::styled(" ", desc_style),
            Span::styled(" ↵ / ⌫ ", key_style),
            Span::styled(" end/start ", desc_style),
            Span::styled("│", sep_style),
            Span::styled(" ", desc_style),
            Span::styled("q", key_style),
            Span::styled(" quit ", desc_style),
        ]
    };

    let badge = match data.indicator {
        RunIndicator::Input => Some((" ⌨ INPUT ", DEFAULT_THEME.secondary)),
        RunIndicator::Playing => Some((" ▶ PLAYING ", DEFAULT_THEME.secondary)),
        RunIndicator::Error => Some((" ERROR ", DEFAULT_THEME.error)),
        RunIndicator::End => Some((" END ", DEFAULT_THEME.error)),
        RunIndicator::Start => Some((" START ", DEFAULT_THEME.success)),
        RunIndicator::None => None,
    };
    if let Some((text, color)) = badge {
        right_spans.push(Span::styled("│", sep_style));
        right_spans.push(Span::styled(
            text,
            Style::default()
                .bg(color)
                .fg(Color::Black)
                .add_modifier(Modifier::BOLD),
        ));
    }

    frame.render_widget(
        Paragraph::new(Line::from(right_spans))
            .style(Style::default().bg(DEFAULT_THEME.current_line_bg))
            .alignment(Alignment::Right),
        layout[1],
    );
}
