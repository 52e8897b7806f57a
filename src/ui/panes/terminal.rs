//! Console output pane rendering

use super::utils::{pane_block, visible_items, ScrollState};
use crate::ui::theme::DEFAULT_THEME;
use ratatui::{
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{List, ListItem, Padding, Paragraph},
    Frame,
};

/// Pending `input()` shown under the output
pub struct InputLine<'a> {
    pub buffer: &'a str,
}

/// Render the console output of the current step
pub fn render_terminal_pane(
    frame: &mut Frame,
    area: Rect,
    stdout: &str,
    input: Option<InputLine<'_>>,
    is_focused: bool,
    scroll_state: &mut ScrollState,
) {
    let block = pane_block(" Console Output ", is_focused);

    if stdout.is_empty() && input.is_none() {
        let paragraph = Paragraph::new("(no output)")
            .block(block)
            .style(Style::default().fg(DEFAULT_THEME.comment));
        frame.render_widget(paragraph, area);
        return;
    }

    let mut lines: Vec<&str> = stdout.split('\n').collect();
    // A prompt awaiting input sits on the last, unterminated line
    let prompt_line = if input.is_some() { lines.pop() } else { None };
    if lines.last() == Some(&"") {
        lines.pop();
    }

    let mut items: Vec<ListItem> = lines
        .iter()
        .map(|line| ListItem::new(line.to_string()).style(Style::default().fg(DEFAULT_THEME.fg)))
        .collect();

    if let Some(input) = input {
        items.push(ListItem::new(Line::from(vec![
            Span::styled(prompt_line.unwrap_or_default().to_string(), Style::default().fg(DEFAULT_THEME.fg)),
            Span::styled(
                input.buffer.to_string(),
                Style::default()
                    .fg(DEFAULT_THEME.secondary)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::styled("▏", Style::default().fg(DEFAULT_THEME.secondary)),
        ])));
    }

    let block = block.padding(Padding::new(1, 0, 0, 0));
    let items = visible_items(items, area, scroll_state, true);
    frame.render_widget(List::new(items).block(block), area);
}
