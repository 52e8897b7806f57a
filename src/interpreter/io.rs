//! Console channels
//!
//! Programs write to stdout and read from stdin through a [`Console`] handle.
//! By default both channels are the host process's. [`Console::redirect`]
//! swaps stdout for an in-memory buffer and stdin for an interceptor that
//! delegates reads to the execution hook; the returned [`Redirected`] guard
//! puts the previous channels back when dropped, whichever way the run ended.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::io::{BufRead, Write};
use std::rc::Rc;

#[derive(Debug, Clone, PartialEq)]
enum Stdout {
    Host,
    Capture(String),
}

/// Where `input()` gets its lines from
#[derive(Debug, Clone, PartialEq)]
pub enum Stdin {
    Host,
    /// Delegated to the hook, inside a frame attributed to `origin`/`routine`
    Intercepted {
        origin: Rc<str>,
        routine: &'static str,
    },
    /// Pre-supplied lines, echoed as they are consumed
    Scripted(VecDeque<String>),
}

#[derive(Debug)]
struct ConsoleState {
    stdout: Stdout,
    stdin: Stdin,
}

/// Shared handle to the console channels
#[derive(Debug, Clone)]
pub struct Console {
    state: Rc<RefCell<ConsoleState>>,
}

impl Default for Console {
    fn default() -> Self {
        Console::new()
    }
}

impl Console {
    /// Console bound to the host process
    pub fn new() -> Self {
        Console {
            state: Rc::new(RefCell::new(ConsoleState {
                stdout: Stdout::Host,
                stdin: Stdin::Host,
            })),
        }
    }

    /// Console that feeds `input()` from `lines` and writes to the host stdout
    pub fn scripted(lines: impl IntoIterator<Item = String>) -> Self {
        let console = Console::new();
        console.state.borrow_mut().stdin = Stdin::Scripted(lines.into_iter().collect());
        console
    }

    /// Capture stdout and intercept stdin until the guard is dropped
    pub fn redirect(&self, origin: Rc<str>, routine: &'static str) -> Redirected {
        let mut state = self.state.borrow_mut();
        let previous_stdout = std::mem::replace(&mut state.stdout, Stdout::Capture(String::new()));
        let previous_stdin = std::mem::replace(&mut state.stdin, Stdin::Intercepted { origin, routine });
        Redirected {
            console: self.clone(),
            previous: Some((previous_stdout, previous_stdin)),
        }
    }

    pub fn is_redirected(&self) -> bool {
        matches!(self.state.borrow().stdout, Stdout::Capture(_))
    }

    pub fn write(&self, text: &str) {
        let mut state = self.state.borrow_mut();
        match &mut state.stdout {
            Stdout::Capture(buffer) => buffer.push_str(text),
            Stdout::Host => {
                let mut out = std::io::stdout().lock();
                // A closed host stdout must not abort the program being run
                let _ = out.write_all(text.as_bytes());
                let _ = out.flush();
            }
        }
    }

    /// Everything captured since the last redirect
    pub fn captured(&self) -> String {
        match &self.state.borrow().stdout {
            Stdout::Capture(buffer) => buffer.clone(),
            Stdout::Host => String::new(),
        }
    }

    pub(crate) fn stdin(&self) -> Stdin {
        self.state.borrow().stdin.clone()
    }

    pub(crate) fn next_scripted(&self) -> Option<String> {
        match &mut self.state.borrow_mut().stdin {
            Stdin::Scripted(lines) => lines.pop_front(),
            _ => None,
        }
    }

    /// One line from the host stdin without its terminator; `None` at end of input
    pub(crate) fn read_host_line(&self) -> Option<String> {
        let mut line = String::new();
        match std::io::stdin().lock().read_line(&mut line) {
            Ok(0) | Err(_) => None,
            Ok(_) => {
                let trimmed = line.trim_end_matches(['\n', '\r']).len();
                line.truncate(trimmed);
                Some(line)
            }
        }
    }
}

/// Guard restoring the console channels active before [`Console::redirect`]
#[derive(Debug)]
pub struct Redirected {
    console: Console,
    previous: Option<(Stdout, Stdin)>,
}

impl Redirected {
    pub fn console(&self) -> &Console {
        &self.console
    }
}

impl Drop for Redirected {
    fn drop(&mut self) {
        if let Some((stdout, stdin)) = self.previous.take() {
            let mut state = self.console.state.borrow_mut();
            state.stdout = stdout;
            state.stdin = stdin;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redirect_captures_and_restores() {
        let console = Console::new();
        {
            let guard = console.redirect(Rc::from("tracer.rs"), "read_input");
            guard.console().write("hello\n");
            assert!(console.is_redirected());
            assert_eq!(console.captured(), "hello\n");
            assert!(matches!(console.stdin(), Stdin::Intercepted { .. }));
        }
        assert!(!console.is_redirected());
        assert_eq!(console.stdin(), Stdin::Host);
    }

    #[test]
    fn test_restores_when_unwinding() {
        let console = Console::new();
        let cloned = console.clone();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(move || {
            let _guard = cloned.redirect(Rc::from("tracer.rs"), "read_input");
            panic!("boom");
        }));
        assert!(result.is_err());
        assert!(!console.is_redirected());
    }

    #[test]
    fn test_scripted_lines() {
        let console = Console::scripted(vec!["a".to_string(), "b".to_string()]);
        assert_eq!(console.next_scripted().as_deref(), Some("a"));
        assert_eq!(console.next_scripted().as_deref(), Some("b"));
        assert_eq!(console.next_scripted(), None);
    }
}
