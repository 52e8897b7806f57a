//! Object graph pane rendering
//!
//! One block per graph node: its names, type and address, then its contents
//! and its outgoing references. Nodes only reachable through other objects
//! are listed after directly bound ones and shown dimmed.

use super::utils::{pane_block, visible_items, wrap_chars, ScrollState};
use crate::tracer::graph::{GraphNode, Payload};
use crate::ui::theme::DEFAULT_THEME;
use ratatui::{
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{List, ListItem},
    Frame,
};

fn content_rows(node: &GraphNode) -> Vec<(String, String)> {
    match &node.payload {
        Some(Payload::Fields(fields)) => fields
            .iter()
            .map(|f| (format!(".{}", f.name), format!("{}  ({})", f.value, f.type_name)))
            .collect(),
        Some(Payload::Elements(elements)) => elements
            .iter()
            .map(|e| (format!("[{}]", e.index), e.value_repr.clone()))
            .collect(),
        Some(Payload::Pairs(pairs)) => pairs
            .iter()
            .map(|p| (p.key_repr.clone(), p.value_repr.clone()))
            .collect(),
        Some(Payload::SetElements(elements)) => elements
            .iter()
            .map(|e| ("∈".to_string(), e.value_repr.clone()))
            .collect(),
        Some(Payload::Array(preview)) => {
            let mut rows = vec![(
                "shape".to_string(),
                format!("{} {} (ndim {}, size {})", preview.shape, preview.dtype, preview.ndim, preview.size),
            )];
            rows.extend(preview.string_preview.lines().map(|l| (String::new(), l.to_string())));
            rows
        }
        None => Vec::new(),
    }
}

/// Render the object graph of the current step
pub fn render_graph_pane(
    frame: &mut Frame,
    area: Rect,
    nodes: &[GraphNode],
    is_focused: bool,
    scroll_state: &mut ScrollState,
) {
    let block = pane_block(" Object Graph ", is_focused);
    let content_width = area.width.saturating_sub(2) as usize;
    let mut items: Vec<ListItem> = Vec::new();

    if nodes.is_empty() {
        items.push(ListItem::new("(no objects)").style(Style::default().fg(DEFAULT_THEME.comment)));
    }

    for (i, node) in nodes.iter().enumerate() {
        let name_style = if node.has_direct_reference {
            Style::default()
                .fg(DEFAULT_THEME.function)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(DEFAULT_THEME.muted_function)
        };
        let mut header = vec![
            Span::styled(node.name.clone(), name_style),
            Span::raw(" "),
            Span::styled(node.type_name.clone(), Style::default().fg(DEFAULT_THEME.type_name)),
        ];
        if let Some(length) = node.length {
            header.push(Span::styled(format!("[{}]", length), Style::default().fg(DEFAULT_THEME.comment)));
        }
        header.push(Span::styled(
            format!(" @ {}", node.memory_address),
            Style::default().fg(DEFAULT_THEME.comment),
        ));
        items.push(ListItem::new(Line::from(header)));

        if let Some(error) = &node.error {
            items.push(ListItem::new(format!("  ! {}", error)).style(Style::default().fg(DEFAULT_THEME.error)));
        }

        for (label, value) in content_rows(node) {
            let prefix = if label.is_empty() {
                "    ".to_string()
            } else {
                format!("  {}: ", label)
            };
            let room = content_width.saturating_sub(prefix.chars().count()).max(8);
            for (j, piece) in wrap_chars(&value, room).into_iter().enumerate() {
                let head = if j == 0 {
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

        for reference in &node.references {
            items.push(ListItem::new(Line::from(vec![
                Span::styled("  ↪ ", Style::default().fg(DEFAULT_THEME.secondary)),
                Span::styled(reference.field_name.clone(), Style::default().fg(DEFAULT_THEME.fg)),
                Span::styled(
                    format!(" → {} 0x{:x}", reference.target_type.name(), reference.target_id),
                    Style::default().fg(DEFAULT_THEME.comment),
                ),
            ])));
        }

        if i + 1 < nodes.len() {
            items.push(ListItem::new(""));
        }
    }

    let items = visible_items(items, area, scroll_state, false);
    frame.render_widget(List::new(items).block(block), area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracer::graph::{Element, VizType};

    #[test]
    fn test_element_rows() {
        let node = GraphNode {
            viz_type: VizType::Array,
            id: 1,
            name: "xs".to_string(),
            type_name: "list".to_string(),
            memory_address: "0x1".to_string(),
            has_direct_reference: true,
            references: Vec::new(),
            length: Some(1),
            payload: Some(Payload::Elements(vec![Element {
                index: 0,
                value_repr: "5".to_string(),
            }])),
            error: None,
        };
        assert_eq!(content_rows(&node), vec![("[0]".to_string(), "5".to_string())]);
    }
}
