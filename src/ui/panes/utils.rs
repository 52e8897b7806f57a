//! Helpers shared by the list-based panes

use crate::ui::theme::DEFAULT_THEME;
use ratatui::{
    layout::Rect,
    style::{Modifier, Style},
    widgets::{Block, Borders, ListItem},
};

/// Scroll position of a list pane
#[derive(Debug, Clone, Copy, Default)]
pub struct ScrollState {
    pub offset: usize,
    pub prev_item_count: usize,
}

pub fn pane_block(title: &str, is_focused: bool) -> Block<'_> {
    let border_style = if is_focused {
        Style::default()
            .fg(DEFAULT_THEME.border_focused)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(DEFAULT_THEME.border_normal)
    };
    Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(border_style)
}

/// Rows of `items` that fit in `area`.
///
/// With `follow_growth`, the view jumps to the bottom whenever the list grew
/// since the last render; otherwise the user's offset is only clamped.
pub fn visible_items<'a>(
    items: Vec<ListItem<'a>>,
    area: Rect,
    scroll_state: &mut ScrollState,
    follow_growth: bool,
) -> Vec<ListItem<'a>> {
    let total_items = items.len();
    let visible_height = area.height.saturating_sub(2).max(1) as usize;
    let max_scroll = total_items.saturating_sub(visible_height);

    if follow_growth && total_items > scroll_state.prev_item_count {
        scroll_state.offset = max_scroll;
    } else {
        scroll_state.offset = scroll_state.offset.min(max_scroll);
    }
    scroll_state.prev_item_count = total_items;

    items
        .into_iter()
        .skip(scroll_state.offset)
        .take(visible_height)
        .collect()
}

/// Split `text` into pieces of at most `width` characters
pub fn wrap_chars(text: &str, width: usize) -> Vec<String> {
    if width == 0 || text.chars().count() <= width {
        return vec![text.to_string()];
    }
    let chars: Vec<char> = text.chars().collect();
    chars.chunks(width).map(|chunk| chunk.iter().collect()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrap_chars_counts_characters() {
        assert_eq!(wrap_chars("abcdef", 4), vec!["abcd", "ef"]);
        assert_eq!(wrap_chars("ééé", 2), vec!["éé", "é"]);
        assert_eq!(wrap_chars("short", 10), vec!["short"]);
    }

    #[test]
    fn test_growth_scrolls_to_bottom() {
        let area = Rect::new(0, 0, 10, 5);
        let mut state = ScrollState::default();
        let items: Vec<ListItem> = (0..10).map(|i| ListItem::new(i.to_string())).collect();
        let shown = visible_items(items.clone(), area, &mut state, true);
        assert_eq!(shown.len(), 3);
        assert_eq!(state.offset, 7);

        state.offset = 2;
        visible_items(items, area, &mut state, true);
        assert_eq!(state.offset, 2);
    }
}
