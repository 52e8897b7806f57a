//! Main TUI application state and logic

use super::panes::{
    render_graph_pane, render_source_pane, render_stack_pane, render_status_bar, render_terminal_pane, InputLine,
    LineMark, RunIndicator, ScrollState, SourceScrollState, StatusRenderData,
};
use crate::tracer::session::{RunRequest, RunResponse, Session};
use crate::tracer::step::Step;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind};
use ratatui::{
    backend::Backend,
    layout::{Constraint, Direction, Layout},
    Frame, Terminal,
};
use std::io;
use std::time::{Duration, Instant};

/// Which pane is currently focused
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusedPane {
    Source,
    Terminal,
    Stack,
    Graph,
}

impl FocusedPane {
    /// Move focus to the next pane (clockwise: source -> terminal -> stack -> graph)
    pub fn next(self) -> Self {
        match self {
            FocusedPane::Source => FocusedPane::Terminal,
            FocusedPane::Terminal => FocusedPane::Stack,
            FocusedPane::Stack => FocusedPane::Graph,
            FocusedPane::Graph => FocusedPane::Source,
        }
    }

    /// Move focus to the previous pane (counter-clockwise)
    pub fn prev(self) -> Self {
        match self {
            FocusedPane::Source => FocusedPane::Graph,
            FocusedPane::Terminal => FocusedPane::Source,
            FocusedPane::Stack => FocusedPane::Terminal,
            FocusedPane::Graph => FocusedPane::Stack,
        }
    }
}

/// The main application state
pub struct App {
    pub session: Session,

    /// Trace of the latest run
    pub response: RunResponse,

    /// Index of the displayed step
    pub position: usize,

    pub focused_pane: FocusedPane,

    pub source_scroll: SourceScrollState,
    pub terminal_scroll: ScrollState,
    pub stack_scroll: ScrollState,
    pub graph_scroll: ScrollState,

    /// Text typed for a pending `input()`
    pub input_buffer: String,

    pub should_quit: bool,
    pub status_message: String,
    pub is_playing: bool,
    pub last_play_time: Instant,
}

impl App {
    pub fn new(session: Session, response: RunResponse) -> Self {
        let status_message = response
            .error
            .as_deref()
            .and_then(|error| error.lines().last())
            .map(str::to_string)
            .unwrap_or_else(|| "Ready!".to_string());
        App {
            session,
            response,
            position: 0,
            focused_pane: FocusedPane::Source,
            source_scroll: SourceScrollState::default(),
            terminal_scroll: ScrollState::default(),
            stack_scroll: ScrollState::default(),
            graph_scroll: ScrollState::default(),
            input_buffer: String::new(),
            should_quit: false,
            status_message,
            is_playing: false,
            last_play_time: Instant::now(),
        }
    }

    pub fn current_step(&self) -> Option<&Step> {
        self.response.trace.get(self.position)
    }

    fn is_at_end(&self) -> bool {
        self.position + 1 >= self.response.trace.len()
    }

    /// Prompt of the pending `input()` when the last step is displayed
    pub fn awaiting_input(&self) -> Option<&str> {
        if self.is_at_end() {
            self.response.input_prompt()
        } else {
            None
        }
    }

    /// Run the TUI application
    pub fn run<B: Backend>(&mut self, terminal: &mut Terminal<B>) -> io::Result<()> {
        loop {
            terminal.draw(|f| self.render(f))?;

            if self.should_quit {
                break;
            }

            if self.is_playing && self.last_play_time.elapsed() >= Duration::from_millis(700) {
                if !self.step_forward() {
                    self.is_playing = false;
                    self.status_message = "Playback complete".to_string();
                }
                self.last_play_time = Instant::now();
            }

            if event::poll(Duration::from_millis(50))? {
                if let Event::Key(key) = event::read()? {
                    if key.kind == KeyEventKind::Press {
                        self.handle_key_event(key);
                    }
                }
            }
        }

        Ok(())
    }

    fn render(&mut self, frame: &mut Frame) {
        let main_chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(0), Constraint::Length(1)])
            .split(frame.area());

        let columns = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
            .split(main_chunks[0]);

        // Left column: Source (top) | Console (bottom)
        let left_rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Percentage(65), Constraint::Percentage(35)])
            .split(columns[0]);

        // Right column: Variables (top) | Object graph (bottom)
        let right_rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
            .split(columns[1]);

        let awaiting = self.awaiting_input().is_some();
        let step = self.response.trace.get(self.position);
        let is_error = step.is_some_and(|s| s.error.is_some());
        let mark = if is_error {
            LineMark::Error
        } else if awaiting {
            LineMark::Input
        } else {
            LineMark::Current
        };
        let current_line = step
            .and_then(|s| usize::try_from(s.line_no).ok())
            .filter(|line| *line > 0);

        let source = self.session.code().unwrap_or_default();
        render_source_pane(
            frame,
            left_rows[0],
            source,
            current_line,
            mark,
            self.focused_pane == FocusedPane::Source,
            &mut self.source_scroll,
        );

        let stdout = step.map(|s| s.stdout.as_str()).unwrap_or_default();
        let input = awaiting.then(|| InputLine {
            buffer: &self.input_buffer,
        });
        render_terminal_pane(
            frame,
            left_rows[1],
            stdout,
            input,
            self.focused_pane == FocusedPane::Terminal,
            &mut self.terminal_scroll,
        );

        render_stack_pane(
            frame,
            right_rows[0],
            step,
            self.focused_pane == FocusedPane::Stack,
            &mut self.stack_scroll,
        );

        let nodes = step.map(|s| s.visualizables.as_slice()).unwrap_or_default();
        render_graph_pane(
            frame,
            right_rows[1],
            nodes,
            self.focused_pane == FocusedPane::Graph,
            &mut self.graph_scroll,
        );

        let indicator = if awaiting {
            RunIndicator::Input
        } else if is_error {
            RunIndicator::Error
        } else if self.is_playing {
            RunIndicator::Playing
        } else if self.is_at_end() {
            RunIndicator::End
        } else if self.position == 0 {
            RunIndicator::Start
        } else {
            RunIndicator::None
        };
        render_status_bar(
            frame,
            main_chunks[1],
            StatusRenderData {
                message: &self.status_message,
                current_step: self.position,
                total_steps: self.response.trace.len(),
                finished: self.response.finished,
                indicator,
            },
        );
    }

    fn scroll(&mut self, down: bool) {
        let offset = match self.focused_pane {
            FocusedPane::Source => {
                // Moving the view down moves the current line up visually
                if let Some(row) = self.source_scroll.target_line_row {
                    self.source_scroll.target_line_row =
                        Some(if down { row.saturating_sub(1) } else { row.saturating_add(1) });
                }
                return;
            }
            FocusedPane::Terminal => &mut self.terminal_scroll.offset,
            FocusedPane::Stack => &mut self.stack_scroll.offset,
            FocusedPane::Graph => &mut self.graph_scroll.offset,
        };
        *offset = if down { offset.saturating_add(1) } else { offset.saturating_sub(1) };
    }

    /// Handle keyboard events
    pub fn handle_key_event(&mut self, key: KeyEvent) {
        if self.awaiting_input().is_some() {
            match key.code {
                KeyCode::Esc => self.should_quit = true,
                KeyCode::Enter => self.submit_input(),
                KeyCode::Backspace => {
                    self.input_buffer.pop();
                }
                KeyCode::Char(c) => self.input_buffer.push(c),
                KeyCode::Left => {
                    self.step_backward();
                }
                KeyCode::Tab => self.focused_pane = self.focused_pane.next(),
                KeyCode::BackTab => self.focused_pane = self.focused_pane.prev(),
                KeyCode::Up => self.scroll(false),
                KeyCode::Down => self.scroll(true),
                _ => {}
            }
            return;
        }

        match key.code {
            KeyCode::Char('q') | KeyCode::Char('Q') | KeyCode::Esc => {
                self.should_quit = true;
            }
            KeyCode::Char(c @ '1'..='9') => {
                self.is_playing = false;
                let n = c.to_digit(10).unwrap_or(1);
                let stepped = (0..n).take_while(|_| self.step_forward()).count();
                self.status_message = format!("Stepped forward {} step(s)", stepped);
            }
            KeyCode::Tab => self.focused_pane = self.focused_pane.next(),
            KeyCode::BackTab => self.focused_pane = self.focused_pane.prev(),
            KeyCode::Left => {
                self.is_playing = false;
                self.step_backward();
            }
            KeyCode::Right => {
                self.is_playing = false;
                if !self.step_forward() {
                    self.status_message = "Already at the last step".to_string();
                }
            }
            KeyCode::Up => self.scroll(false),
            KeyCode::Down => self.scroll(true),
            KeyCode::Char(' ') => {
                self.is_playing = !self.is_playing;
                self.status_message = if self.is_playing { "Playing..." } else { "Paused" }.to_string();
                self.last_play_time = Instant::now();
            }
            KeyCode::Enter => {
                self.is_playing = false;
                self.position = self.response.trace.len().saturating_sub(1);
                self.status_message = "Jumped to end".to_string();
                self.terminal_scroll.offset = usize::MAX;
            }
            KeyCode::Backspace => {
                self.is_playing = false;
                self.position = 0;
                self.status_message = "Jumped to start".to_string();
            }
            _ => {}
        }
    }

    /// Show the next step; false at the end of the trace
    pub fn step_forward(&mut self) -> bool {
        if self.is_at_end() {
            return false;
        }
        self.position += 1;
        self.terminal_scroll.offset = usize::MAX;
        self.status_message = match self.current_step().and_then(|s| s.error.as_deref()) {
            Some(error) => error.lines().last().unwrap_or_default().to_string(),
            None => "Stepped forward".to_string(),
        };
        true
    }

    pub fn step_backward(&mut self) -> bool {
        if self.position == 0 {
            self.status_message = "Already at the first step".to_string();
            return false;
        }
        self.position -= 1;
        self.status_message = "Stepped backward".to_string();
        true
    }

    /// Continue the suspended run with the typed value
    pub fn submit_input(&mut self) {
        let value = std::mem::take(&mut self.input_buffer);
        let request = RunRequest::resume(value, self.response.updated_all_inputs.clone());
        let resumed_at = self.position;
        self.response = self.session.submit(request);
        self.position = resumed_at.min(self.response.trace.len().saturating_sub(1));
        self.step_forward();
        self.status_message = match (&self.response.error, self.response.input_prompt()) {
            (Some(error), _) => error.lines().last().unwrap_or_default().to_string(),
            (None, Some(prompt)) => format!("Waiting for input: {}", prompt),
            (None, None) => "Input sent".to_string(),
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TracerConfig;
    use crossterm::event::KeyModifiers;

    fn press(app: &mut App, code: KeyCode) {
        app.handle_key_event(KeyEvent::new(code, KeyModifiers::NONE));
    }

    fn app_for(source: &str) -> App {
        let mut session = Session::new(TracerConfig::default());
        let response = session.submit(RunRequest::new(source));
        App::new(session, response)
    }

    #[test]
    fn test_navigation_is_clamped() {
        let mut app = app_for("a = 1\nb = 2\nc = 3\n");
        assert_eq!(app.position, 0);
        press(&mut app, KeyCode::Left);
        assert_eq!(app.position, 0);
        press(&mut app, KeyCode::Enter);
        assert_eq!(app.position, app.response.trace.len() - 1);
        press(&mut app, KeyCode::Right);
        assert_eq!(app.position, app.response.trace.len() - 1);
        press(&mut app, KeyCode::Backspace);
        assert_eq!(app.position, 0);
    }

    #[test]
    fn test_typed_input_continues_run() {
        let mut app = app_for("name = input('Name? ')\nprint('hi', name)\n");
        assert_eq!(app.awaiting_input(), Some("Name? "));
        for c in "bo".chars() {
            press(&mut app, KeyCode::Char(c));
        }
        press(&mut app, KeyCode::Enter);
        assert!(app.response.finished);
        assert_eq!(app.response.updated_all_inputs, vec!["bo".to_string()]);
        assert!(app.input_buffer.is_empty());
        let last = app.response.trace.last().unwrap();
        assert_eq!(last.stdout, "Name? bo\nhi bo\n");
    }

    #[test]
    fn test_focus_cycles() {
        let mut pane = FocusedPane::Source;
        for _ in 0..4 {
            pane = pane.next();
        }
        assert_eq!(pane, FocusedPane::Source);
        assert_eq!(FocusedPane::Source.prev(), FocusedPane::Graph);
    }
}
