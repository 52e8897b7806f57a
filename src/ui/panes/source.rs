//! Source code pane rendering with syntax highlighting
//!
//! Displays the submitted program with basic Python highlighting. The line of
//! the current step is highlighted; a failing step or a pending `input()`
//! paints the whole line in the error or input colour.

use crate::ui::theme::DEFAULT_THEME;
use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};

use super::utils::pane_block;

/// How the current line is marked
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineMark {
    Current,
    Error,
    Input,
}

/// Simple syntax highlighting for a line of Python
fn highlight_source_code(line: &str) -> Line<'static> {
    let mut spans = Vec::new();
    let mut current_word = String::new();
    let chars: Vec<char> = line.chars().collect();
    let mut i = 0;

    let flush = |word: &mut String, spans: &mut Vec<Span<'static>>, is_call: bool| {
        if !word.is_empty() {
            spans.push(Span::styled(word.clone(), get_keyword_style(word, is_call)));
            word.clear();
        }
    };

    while i < chars.len() {
        let c = chars[i];

        if c == '#' {
            flush(&mut current_word, &mut spans, false);
            let rest: String = chars[i..].iter().collect();
            spans.push(Span::styled(rest, Style::default().fg(DEFAULT_THEME.comment)));
            break;
        }

        if c == '"' || c == '\'' {
            flush(&mut current_word, &mut spans, false);
            let mut end = i + 1;
            while end < chars.len() && chars[end] != c {
                end += if chars[end] == '\\' { 2 } else { 1 };
            }
            let end = (end + 1).min(chars.len());
            let literal: String = chars[i..end].iter().collect();
            spans.push(Span::styled(literal, Style::default().fg(DEFAULT_THEME.string)));
            i = end;
            continue;
        }

        if !c.is_alphanumeric() && c != '_' {
            flush(&mut current_word, &mut spans, c == '(');
            let style = match c {
                '{' | '}' | '(' | ')' | '[' | ']' => Style::default().fg(DEFAULT_THEME.primary),
                _ => Style::default().fg(DEFAULT_THEME.fg),
            };
            spans.push(Span::styled(c.to_string(), style));
            i += 1;
            continue;
        }

        current_word.push(c);
        i += 1;
    }
    flush(&mut current_word, &mut spans, false);

    Line::from(spans)
}

fn get_keyword_style(word: &str, is_call: bool) -> Style {
    match word {
        "int" | "str" | "float" | "bool" | "list" | "dict" | "set" | "tuple" | "object" => {
            Style::default().fg(DEFAULT_THEME.type_name)
        }
        "def" | "class" | "return" | "if" | "elif" | "else" | "while" | "for" | "in" | "not"
        | "and" | "or" | "is" | "import" | "from" | "as" | "try" | "except" | "finally"
        | "raise" | "pass" | "break" | "continue" | "lambda" | "global" | "nonlocal" | "del"
        | "assert" => Style::default()
            .fg(DEFAULT_THEME.keyword)
            .add_modifier(Modifier::BOLD),
        "True" | "False" | "None" => Style::default().fg(DEFAULT_THEME.number),
        _ if word.chars().next().is_some_and(|c| c.is_ascii_digit()) => {
            Style::default().fg(DEFAULT_THEME.number)
        }
        _ if is_call => Style::default().fg(DEFAULT_THEME.function),
        _ => Style::default().fg(DEFAULT_THEME.fg),
    }
}

/// Scroll state for the source pane
#[derive(Debug, Clone, Copy, Default)]
pub struct SourceScrollState {
    pub offset: usize,
    /// Visual row the current line is kept on while stepping
    pub target_line_row: Option<usize>,
}

/// Render the source code pane
pub fn render_source_pane(
    frame: &mut Frame,
    area: Rect,
    source_code: &str,
    current_line: Option<usize>,
    mark: LineMark,
    is_focused: bool,
    scroll_state: &mut SourceScrollState,
) {
    let block = pane_block(" Source Code ", is_focused);
    let lines: Vec<&str> = source_code.lines().collect();
    let total_lines = lines.len();
    let visible_height = area.height.saturating_sub(2).max(1) as usize;

    let target_row = scroll_state
        .target_line_row
        .unwrap_or(visible_height / 2)
        .min(visible_height.saturating_sub(1));
    scroll_state.target_line_row = Some(target_row);

    if let Some(line) = current_line.filter(|line| (1..=total_lines).contains(line)) {
        let max_scroll = total_lines.saturating_sub(visible_height);
        scroll_state.offset = (line - 1).saturating_sub(target_row).min(max_scroll);
    }

    let visible_lines: Vec<Line> = lines
        .iter()
        .enumerate()
        .skip(scroll_state.offset)
        .take(visible_height)
        .map(|(idx, line)| {
            let line_num = idx + 1;
            let is_current = Some(line_num) == current_line;
            let mut content = highlight_source_code(line);

            let num_style = if is_current {
                let color = match mark {
                    LineMark::Error => DEFAULT_THEME.error,
                    _ => DEFAULT_THEME.secondary,
                };
                Style::default().fg(color).add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(DEFAULT_THEME.comment)
            };

            if is_current {
                match mark {
                    LineMark::Current => {
                        let background = Style::default().bg(DEFAULT_THEME.current_line_bg);
                        for span in &mut content.spans {
                            span.style = span.style.patch(background);
                        }
                    }
                    LineMark::Error | LineMark::Input => {
                        let (bg, fg) = match mark {
                            LineMark::Error => (DEFAULT_THEME.error, Color::White),
                            _ => (DEFAULT_THEME.secondary, Color::Black),
                        };
                        let style = Style::default().bg(bg).fg(fg).add_modifier(Modifier::BOLD);
                        for span in &mut content.spans {
                            span.style = style;
                        }
                    }
                }
            }

            let mut spans = vec![Span::styled(format!("{:4} ", line_num), num_style)];
            spans.extend(content.spans);
            Line::from(spans)
        })
        .collect();

    frame.render_widget(Paragraph::new(visible_lines).block(block), area);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(line: &Line) -> Vec<String> {
        line.spans.iter().map(|s| s.content.to_string()).collect()
    }

    #[test]
    fn test_strings_and_comments_stay_whole() {
        let line = highlight_source_code("x = 'a # b'  # note");
        let parts = texts(&line);
        assert!(parts.contains(&"'a # b'".to_string()));
        assert_eq!(parts.last().map(String::as_str), Some("# note"));
    }

    #[test]
    fn test_keywords_and_calls() {
        let line = highlight_source_code("def f(n): return len(n)");
        let keyword = line.spans.iter().find(|s| s.content == "def").unwrap();
        assert_eq!(keyword.style.fg, Some(DEFAULT_THEME.keyword));
        let call = line.spans.iter().find(|s| s.content == "len").unwrap();
        assert_eq!(call.style.fg, Some(DEFAULT_THEME.function));
    }
}
