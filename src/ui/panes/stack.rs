//! Variables pane rendering: call stack, scopes and call history
//!
//! The pane lists, top to bottom:
//! - the user frames active at the step, innermost first, with their arguments
//! - local variables, then names visible from enclosing scopes
//! - the call tree reconstructed from the step's call events, with return
//!   values and still-running calls marked

use super::utils::{pane_block, visible_items, wrap_chars, ScrollState};
use crate::tracer::calls::{CallEvent, CallId};
use crate::tracer::step::Step;
use crate::ui::theme::DEFAULT_THEME;
use indexmap::IndexMap;
use ratatui::{
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{List, ListItem},
    Frame,
};
use rustc_hash::FxHashMap;

/// One row of the call tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallRow {
    pub depth: usize,
    pub call_id: CallId,
    pub label: String,
    pub returned: Option<String>,
    pub active: bool,
}

/// Flatten call events into tree rows in call order
pub fn call_tree(events: &[CallEvent], active: &[CallId]) -> Vec<CallRow> {
    let mut depths: FxHashMap<CallId, usize> = FxHashMap::default();
    let mut rows: Vec<CallRow> = Vec::new();
    let mut row_of: FxHashMap<CallId, usize> = FxHashMap::default();

    for event in events {
        match event {
            CallEvent::Call {
                call_id,
                parent_call_id,
                function_name,
                args_repr,
                ..
            } => {
                let depth = parent_call_id
                    .and_then(|parent| depths.get(&parent))
                    .map_or(0, |d| d + 1);
                depths.insert(*call_id, depth);
                row_of.insert(*call_id, rows.len());
                rows.push(CallRow {
                    depth,
                    call_id: *call_id,
                    label: format!("{}({})", function_name, args_repr),
                    returned: None,
                    active: active.contains(call_id),
                });
            }
            CallEvent::Return {
                call_id,
                return_value_repr,
                ..
            } => {
                if let Some(row) = row_of.get(call_id).and_then(|i| rows.get_mut(*i)) {
                    row.returned = Some(return_value_repr.clone());
                }
            }
        }
    }
    rows
}

fn section_header(title: &str) -> ListItem<'static> {
    ListItem::new(Line::from(Span::styled(
        title.to_string(),
        Style::default()
            .fg(DEFAULT_THEME.primary)
            .add_modifier(Modifier::BOLD),
    )))
}

fn empty_row(text: &str) -> ListItem<'static> {
    ListItem::new(format!("  {}", text)).style(Style::default().fg(DEFAULT_THEME.comment))
}

fn variable_rows(variables: &IndexMap<String, String>, width: usize, items: &mut Vec<ListItem<'static>>) {
    if variables.is_empty() {
        items.push(empty_row("(none)"));
        return;
    }
    for (name, value) in variables {
        let prefix = format!("  {} = ", name);
        let room = width.saturating_sub(prefix.chars().count()).max(8);
        for (i, piece) in wrap_chars(value, room).into_iter().enumerate() {
            let head = if i == 0 {
                Span::styled(prefix.clone(), Style::default().fg(DEFAULT_THEME.fg))
            } else {
                Span::raw(" ".repeat(prefix.chars().count()))
            };
            items.push(ListItem::new(Line::from(vec![
                head,
                Span::styled(piece, Style::default().fg(DEFAULT_THEME.number)),
            ])));
        }
    }
}

/// Render the variables pane for `step`
pub fn render_stack_pane(
    frame: &mut Frame,
    area: Rect,
    step: Option<&Step>,
    is_focused: bool,
    scroll_state: &mut ScrollState,
) {
    let block = pane_block(" Variables & Calls ", is_focused);
    let content_width = area.width.saturating_sub(2) as usize;
    let mut items: Vec<ListItem> = Vec::new();

    let Some(step) = step else {
        items.push(empty_row("(no steps recorded)"));
        frame.render_widget(List::new(items).block(block), area);
        return;
    };

    items.push(section_header("Call Stack"));
    if step.stack_info.current_frames.is_empty() {
        items.push(empty_row("(empty)"));
    }
    for (depth, view) in step.stack_info.current_frames.iter().enumerate() {
        let name_style = if depth == 0 {
            Style::default()
                .fg(DEFAULT_THEME.function)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(DEFAULT_THEME.muted_function)
        };
        items.push(ListItem::new(Line::from(vec![
            Span::styled("▸ ", Style::default().fg(DEFAULT_THEME.secondary)),
            Span::styled(format!("{}({})", view.function, view.arguments), name_style),
            Span::styled(format!("  line {}", view.line), Style::default().fg(DEFAULT_THEME.comment)),
        ])));
    }

    items.push(section_header("Locals"));
    variable_rows(&step.locals, content_width, &mut items);
    if !step.globals.is_empty() {
        items.push(section_header("Globals"));
        variable_rows(&step.globals, content_width, &mut items);
    }

    let rows = call_tree(&step.stack_info.historical_events, &step.stack_info.active_call_ids);
    items.push(section_header("Call History"));
    if rows.is_empty() {
        items.push(empty_row("(no calls)"));
    }
    for row in rows {
        let indent = "  ".repeat(row.depth + 1);
        let mut spans = vec![
            Span::raw(indent),
            Span::styled(
                row.label,
                Style::default().fg(if row.active {
                    DEFAULT_THEME.function
                } else {
                    DEFAULT_THEME.muted_function
                }),
            ),
        ];
        match row.returned {
            Some(value) => {
                spans.push(Span::styled(" → ", Style::default().fg(DEFAULT_THEME.comment)));
                spans.push(Span::styled(value, Style::default().fg(DEFAULT_THEME.return_value)));
            }
            None if row.active => {
                spans.push(Span::styled(" (running)", Style::default().fg(DEFAULT_THEME.secondary)));
            }
            None => {}
        }
        items.push(ListItem::new(Line::from(spans)));
    }

    let items = visible_items(items, area, scroll_state, false);
    frame.render_widget(List::new(items).block(block), area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn call(id: CallId, parent: Option<CallId>, name: &str) -> CallEvent {
        CallEvent::Call {
            call_id: id,
            parent_call_id: parent,
            function_name: name.to_string(),
            args_repr: String::new(),
            line_no_in_function: 1,
            timestamp_step: 0,
        }
    }

    #[test]
    fn test_call_tree_nests_by_parent() {
        let events = vec![
            call(2, None, "outer"),
            call(3, Some(2), "inner"),
            CallEvent::Return {
                call_id: 3,
                return_value_repr: "7".to_string(),
                timestamp_step: 2,
            },
            call(4, None, "later"),
        ];
        let rows = call_tree(&events, &[4]);
        let summary: Vec<(usize, &str, Option<&str>, bool)> = rows
            .iter()
            .map(|r| (r.depth, r.label.as_str(), r.returned.as_deref(), r.active))
            .collect();
        assert_eq!(
            summary,
            vec![
                (0, "outer()", None, false),
                (1, "inner()", Some("7"), false),
                (0, "later()", None, true),
            ]
        );
    }
}
