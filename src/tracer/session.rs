//! Tracing sessions
//!
//! A [`Session`] survives across [`RunRequest`]s. Every request interprets
//! the submission from the top with a fresh [`Tracer`]; console input
//! answered earlier is replayed from the session's history, so a run that
//! stopped on `input()` resumes by re-running with one more value.
//!
//! Replay is only faithful for deterministic programs. A submission that
//! reads the clock or otherwise diverges between runs may take a different
//! path on a continuation; this is not detected.

use super::errors::TranslateError;
use super::recorder::{panic_message, FinalState, InputHistory, Tracer, READ_INPUT_ROUTINE, RECORDER_ORIGIN};
use super::sanitize::sanitize;
use super::step::Step;
use super::translate::{is_native, translate, Translator};
use crate::config::TracerConfig;
use crate::interpreter::constants::USER_SUBMISSION_MARKER;
use crate::interpreter::{Console, EntryFrame, Halt, Interpreter, Unwind};
use crate::parser::parse::{ParseError, Parser};
use serde::{Deserialize, Serialize};
use std::rc::Rc;

const SESSION_ORIGIN: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/", file!());

/// Stack of the interpretation thread; deep enough for the default call depth
/// in unoptimized builds
const RUN_STACK_SIZE: usize = 256 * 1024 * 1024;

/// One submission, either a fresh run or a continuation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunRequest {
    pub code: String,
    pub language: String,
    /// Value answering the pending input request
    pub injected_input: Option<String>,
    pub all_previous_inputs: Vec<String>,
    pub is_continuation: bool,
}

impl Default for RunRequest {
    fn default() -> Self {
        RunRequest {
            code: String::new(),
            language: "Python".to_string(),
            injected_input: None,
            all_previous_inputs: Vec::new(),
            is_continuation: false,
        }
    }
}

impl RunRequest {
    pub fn new(code: impl Into<String>) -> Self {
        RunRequest {
            code: code.into(),
            ..RunRequest::default()
        }
    }

    /// Continue a suspended run with `value`
    pub fn resume(value: impl Into<String>, all_previous_inputs: Vec<String>) -> Self {
        RunRequest {
            injected_input: Some(value.into()),
            all_previous_inputs,
            is_continuation: true,
            ..RunRequest::default()
        }
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunResponse {
    pub trace: Vec<Step>,
    pub finished: bool,
    /// Error of the last step, if any
    pub error: Option<String>,
    pub updated_all_inputs: Vec<String>,
}

impl RunResponse {
    /// Prompt of the pending input request, if the run is suspended
    pub fn input_prompt(&self) -> Option<&str> {
        if self.finished {
            return None;
        }
        self.trace
            .last()
            .and_then(|step| step.input_request.as_ref())
            .map(|request| request.prompt.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Running,
    SuspendedOnInput { prompt: String },
    Finished,
    Failed,
}

/// What ended one interpretation pass
enum Outcome {
    Completed,
    Suspended { prompt: String },
    Stopped,
    Failed { error: String, user_line: Option<usize> },
}

/// Long-lived state across submissions and their continuations.
///
/// A continuation does not resume a paused interpreter: the program runs
/// again from the top and earlier answers are replayed in order. Traces stay
/// identical only while the program's control flow depends on nothing but its
/// source and those answers.
pub struct Session {
    config: TracerConfig,
    translator: Option<Box<dyn Translator>>,
    state: SessionState,
    /// Runnable source of the current submission
    code: Option<String>,
    inputs: Vec<String>,
}

impl Session {
    pub fn new(config: TracerConfig) -> Self {
        Session {
            config,
            translator: None,
            state: SessionState::Idle,
            code: None,
            inputs: Vec::new(),
        }
    }

    pub fn with_translator(mut self, translator: Box<dyn Translator>) -> Self {
        self.translator = Some(translator);
        self
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn config(&self) -> &TracerConfig {
        &self.config
    }

    /// Source run by the current submission, after translation
    pub fn code(&self) -> Option<&str> {
        self.code.as_deref()
    }

    /// Input values supplied so far
    pub fn inputs(&self) -> &[String] {
        &self.inputs
    }

    /// Drop the cached submission and input history
    pub fn reset(&mut self) {
        tracing::debug!("resetting session");
        self.state = SessionState::Idle;
        self.code = None;
        self.inputs.clear();
    }

    /// Run a submission or continue the suspended one
    pub fn submit(&mut self, request: RunRequest) -> RunResponse {
        let previous = if request.is_continuation {
            tracing::info!(inputs = self.inputs.len(), "continuing suspended run");
            if self.inputs.is_empty() {
                request.all_previous_inputs
            } else {
                std::mem::take(&mut self.inputs)
            }
        } else {
            self.reset();
            request.all_previous_inputs
        };

        // A continuation on a session that never ran falls back to the submitted code
        let code = match self.code.clone() {
            Some(code) => code,
            None => match self.prepare(&request.code, &request.language) {
                Ok(code) => {
                    self.code = Some(code.clone());
                    code
                }
                Err(message) => return self.setup_failure(message, previous),
            },
        };

        self.state = SessionState::Running;
        let inputs = InputHistory::new(previous, request.injected_input);
        let (response, state) = run_on_worker(&self.config, &code, inputs);
        self.state = state;
        self.inputs = response.updated_all_inputs.clone();
        response
    }

    /// Runnable source for a fresh submission, translating foreign languages
    fn prepare(&self, code: &str, language: &str) -> Result<String, String> {
        let code = if is_native(language) {
            code.to_string()
        } else {
            let Some(translator) = self.translator.as_deref() else {
                return Err(TranslateError::Unavailable {
                    language: language.to_string(),
                }
                .to_string());
            };
            let translated = translate(translator, code, language);
            if translated.trim_start().starts_with("Error:") {
                return Err(translated);
            }
            translated
        };
        if code.trim().is_empty() {
            return Err("No Python code to debug.".to_string());
        }
        Ok(code)
    }

    fn setup_failure(&mut self, message: String, inputs: Vec<String>) -> RunResponse {
        tracing::warn!(error = %message, "submission rejected before execution");
        self.state = SessionState::Failed;
        self.inputs = inputs.clone();
        let step = Step::terminal(0, "Error Setup/Conversion", Some(message.clone()));
        RunResponse {
            trace: vec![step],
            finished: true,
            error: Some(message),
            updated_all_inputs: inputs,
        }
    }
}

/// Interpret on a dedicated thread whose stack outlasts the engine's
/// recursion limit, whatever thread the caller is on
fn run_on_worker(config: &TracerConfig, code: &str, inputs: InputHistory) -> (RunResponse, SessionState) {
    let joined = std::thread::scope(|scope| {
        std::thread::Builder::new()
            .name("pytrace-run".to_string())
            .stack_size(RUN_STACK_SIZE)
            .spawn_scoped(scope, move || run(config, code, inputs))
            .map(|handle| handle.join())
    });
    let message = match joined {
        Ok(Ok(outcome)) => return outcome,
        Ok(Err(payload)) => panic_message(&*payload),
        Err(err) => format!("cannot start the run: {}", err),
    };
    tracing::error!(error = %message, "interpretation pass died");
    let error = format!("Tracer internal error: {}", message);
    let response = RunResponse {
        trace: vec![Step::terminal(0, "<Debugger Error>", Some(error.clone()))],
        finished: true,
        error: Some(error),
        updated_all_inputs: Vec::new(),
    };
    (response, SessionState::Failed)
}

fn run(config: &TracerConfig, code: &str, inputs: InputHistory) -> (RunResponse, SessionState) {
    let console = Console::new();
    let _redirect = console.redirect(Rc::from(RECORDER_ORIGIN), READ_INPUT_ROUTINE);
    let mut tracer = Tracer::new(config.clone(), code, console.clone(), inputs);

    let program = match Parser::new(code).and_then(|mut parser| parser.parse_program()) {
        Ok(program) => program,
        Err(err) => return syntax_failure(code, &err, tracer),
    };

    let (result, final_state) = {
        let mut interpreter = Interpreter::new(console.clone())
            .with_hook(&mut tracer)
            .with_entry_frame(EntryFrame {
                origin: Rc::from(SESSION_ORIGIN),
                routine: "run_session".to_string(),
                line: line!() as usize,
            })
            .with_max_call_depth(config.max_call_depth);
        let result = interpreter.run(&program, code);
        let outcome = match result {
            Ok(()) => Outcome::Completed,
            Err(Unwind::Halt(Halt::InputRequested { prompt })) => Outcome::Suspended { prompt },
            Err(Unwind::Halt(Halt::Stopped)) => Outcome::Stopped,
            Err(Unwind::Error(exception)) => {
                let origin_is_user = exception.innermost_origin() == Some(USER_SUBMISSION_MARKER);
                let user_line = exception
                    .traceback
                    .iter()
                    .find(|entry| entry.origin.as_ref() == USER_SUBMISSION_MARKER)
                    .map(|entry| entry.line);
                let raw = interpreter.format_exception(&exception);
                Outcome::Failed {
                    error: sanitize(&raw, origin_is_user),
                    user_line,
                }
            }
        };
        let globals = interpreter.globals();
        let final_state = FinalState::capture(interpreter.heap(), &globals, console.captured(), config);
        (outcome, final_state)
    };

    let (finished, state) = match result {
        Outcome::Suspended { prompt } => {
            tracing::info!(prompt = %prompt, "run suspended on input");
            tracer.suspend(&prompt);
            (false, SessionState::SuspendedOnInput { prompt })
        }
        Outcome::Stopped => {
            tracing::warn!("run stopped by the tracer");
            (true, SessionState::Failed)
        }
        Outcome::Failed { error, user_line } => {
            tracing::info!(line = ?user_line, "run failed");
            tracer.fail_at_runtime(error, user_line, final_state.stdout);
            (true, SessionState::Failed)
        }
        Outcome::Completed => {
            tracing::info!(steps = tracer.steps().len(), "run completed");
            tracer.finish(final_state);
            (true, SessionState::Finished)
        }
    };
    (response(tracer, finished), state)
}

fn syntax_failure(code: &str, err: &ParseError, mut tracer: Tracer) -> (RunResponse, SessionState) {
    let line = err.location.line;
    let text = code
        .lines()
        .nth(line.saturating_sub(1))
        .map(str::trim)
        .filter(|text| !text.is_empty());
    let mut raw = format!("SyntaxError: {}\n  File \"{}\", line {}", err.message, USER_SUBMISSION_MARKER, line);
    if let Some(text) = text {
        raw.push_str(&format!("\n    {}", text));
    }
    tracing::info!(line, message = %err.message, "submission does not parse");

    // Nothing ran, so the module namespace holds no user variables
    let step = Step {
        line_no: line as i64,
        ..Step::terminal(0, text.unwrap_or("Syntax Error"), Some(sanitize(&raw, true)))
    };
    tracer.push_error_step(step);
    (response(tracer, true), SessionState::Failed)
}

fn response(tracer: Tracer, finished: bool) -> RunResponse {
    let (steps, inputs) = tracer.into_parts();
    let trace = steps.into_steps();
    RunResponse {
        error: trace.last().and_then(|step| step.error.clone()),
        trace,
        finished,
        updated_all_inputs: inputs.into_values(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    struct Echo;

    impl Translator for Echo {
        fn translate(&self, code: &str, _language: &str) -> Result<String, TranslateError> {
            Ok(format!("Here you go:\n```python\n{}\n```", code))
        }
    }

    #[test]
    fn test_empty_submission_is_setup_failure() {
        let mut session = Session::new(TracerConfig::default());
        let response = session.submit(RunRequest::new("   \n"));
        assert!(response.finished);
        assert_eq!(response.trace.len(), 1);
        assert_eq!(response.trace[0].code, "Error Setup/Conversion");
        assert_eq!(response.error.as_deref(), Some("No Python code to debug."));
    }

    #[test]
    fn test_foreign_language_without_translator() {
        let mut session = Session::new(TracerConfig::default());
        let response = session.submit(RunRequest::new("int x = 1;").with_language("C"));
        assert!(response.finished);
        assert!(response.error.unwrap().starts_with("Error: No translator"));
    }

    #[test]
    fn test_translated_code_runs() {
        let mut session = Session::new(TracerConfig::default()).with_translator(Box::new(Echo));
        let response = session.submit(RunRequest::new("x = 41 + 1").with_language("Pseudo"));
        assert!(response.finished);
        assert_eq!(session.code(), Some("x = 41 + 1"));
        assert_eq!(response.trace.last().unwrap().locals.get("x").map(String::as_str), Some("42"));
    }

    #[test]
    fn test_state_follows_outcome() {
        let mut session = Session::new(TracerConfig::default());
        assert_eq!(session.state(), &SessionState::Idle);
        session.submit(RunRequest::new("name = input('who? ')\n"));
        assert_eq!(
            session.state(),
            &SessionState::SuspendedOnInput {
                prompt: "who? ".to_string()
            }
        );
        session.submit(RunRequest::resume("ada", Vec::new()));
        assert_eq!(session.state(), &SessionState::Finished);
        assert_eq!(session.inputs(), ["ada".to_string()]);
        session.submit(RunRequest::new("1 / 0\n"));
        assert_eq!(session.state(), &SessionState::Failed);
    }
}
