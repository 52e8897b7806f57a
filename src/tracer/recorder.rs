//! Step recorder
//!
//! [`Tracer`] is the [`ExecutionHook`] installed for one run. It snapshots
//! every user line into a [`Step`], feeds frame entries and exits to the
//! [`CallLog`] and answers intercepted `input()` calls from the input history.
//! Lines of non-user frames are passed over without a snapshot.
//!
//! A failure while recording (including a panic) never reaches the host: it
//! becomes a terminal error step and the run is stopped.

use super::calls::{CallLog, CallRecord};
use super::errors::TraceError;
use super::frames::{arguments, stack_view};
use super::graph::{extract, GraphNode};
use super::origin::FrameOrigin;
use super::render::{is_structural, Renderer};
use super::sanitize::sanitize;
use super::step::{InputRequest, StackInfo, Step, StepLog};
use crate::config::TracerConfig;
use crate::interpreter::hooks::{ExecutionHook, FrameRef, HookAction, InputReply};
use crate::interpreter::io::Console;
use crate::memory::heap::Heap;
use crate::memory::value::{ObjectId, Value};
use indexmap::IndexMap;
use rustc_hash::FxHashSet;
use std::panic::{self, AssertUnwindSafe};

/// Origin reported by frames this file pushes
pub const RECORDER_ORIGIN: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/", file!());

/// Routine name of the frame wrapping an intercepted console read
pub const READ_INPUT_ROUTINE: &str = "read_input";

/// Console input supplied so far, replayed in order
#[derive(Debug, Clone, Default)]
pub struct InputHistory {
    values: Vec<String>,
    next: usize,
    staged: Option<String>,
}

impl InputHistory {
    /// History replaying `previous`, then answering one read with `injected`
    pub fn new(previous: Vec<String>, injected: Option<String>) -> Self {
        InputHistory {
            values: previous,
            next: 0,
            staged: injected,
        }
    }

    /// Next answer: an unconsumed recorded value, else the staged one
    pub fn next_value(&mut self) -> Option<String> {
        if let Some(value) = self.values.get(self.next) {
            self.next += 1;
            return Some(value.clone());
        }
        let value = self.staged.take()?;
        self.values.push(value.clone());
        self.next = self.values.len();
        Some(value)
    }

    pub fn values(&self) -> &[String] {
        &self.values
    }

    pub fn into_values(self) -> Vec<String> {
        self.values
    }
}

/// Module-level state captured once the program stopped
#[derive(Debug, Clone, Default)]
pub struct FinalState {
    pub stdout: String,
    pub graph: Vec<GraphNode>,
    pub module_vars: IndexMap<String, String>,
}

impl FinalState {
    pub fn capture(heap: &Heap, globals: &[(String, Value)], stdout: String, config: &TracerConfig) -> Self {
        let graph = extract(heap, globals, config);
        let renderer = Renderer::new(heap, &graph.tracked, config);
        FinalState {
            stdout,
            module_vars: visible_variables(heap, globals, &renderer),
            graph: graph.nodes,
        }
    }
}

/// Variables shown in the variables view, rendered against the step's graph
fn visible_variables(heap: &Heap, scope: &[(String, Value)], renderer: &Renderer<'_>) -> IndexMap<String, String> {
    scope
        .iter()
        .filter(|(name, value)| !name.starts_with("__") && !is_structural(heap, value))
        .map(|(name, value)| (name.clone(), renderer.render_default(value)))
        .collect()
}

pub struct Tracer {
    config: TracerConfig,
    source_lines: Vec<String>,
    console: Console,
    steps: StepLog,
    calls: CallLog,
    inputs: InputHistory,
    /// Set after an internal failure; every later notification stops the run
    stopped: bool,
}

impl Tracer {
    pub fn new(config: TracerConfig, source: &str, console: Console, inputs: InputHistory) -> Self {
        Tracer {
            steps: StepLog::new(config.max_steps),
            config,
            source_lines: source.lines().map(str::to_string).collect(),
            console,
            calls: CallLog::new(),
            inputs,
            stopped: false,
        }
    }

    pub fn steps(&self) -> &StepLog {
        &self.steps
    }

    pub fn into_parts(self) -> (StepLog, InputHistory) {
        (self.steps, self.inputs)
    }

    /// Stripped text of a 1-based source line
    pub fn source_line(&self, line: usize) -> Option<&str> {
        line.checked_sub(1)
            .and_then(|i| self.source_lines.get(i))
            .map(|text| text.trim())
    }

    fn stack_info(&self) -> StackInfo {
        StackInfo {
            current_frames: Vec::new(),
            historical_events: self.calls.events_until(self.steps.next_index()),
            active_call_ids: self.calls.active_ids(),
        }
    }

    fn record_step(&mut self, frame: FrameRef<'_>) -> Result<(), TraceError> {
        let heap = frame.heap();
        let locals = frame.locals();
        let enclosing = frame.enclosing();
        let mut visible = enclosing.clone();
        visible.extend(locals.iter().cloned());

        let graph = extract(heap, &visible, &self.config);
        let renderer = Renderer::new(heap, &graph.tracked, &self.config);
        let index = self.steps.next_index();
        let line = frame.line();

        let step = Step {
            step: index,
            line_no: line as i64,
            code: self.source_line(line).unwrap_or_default().to_string(),
            stdout: self.console.captured(),
            locals: visible_variables(heap, &locals, &renderer),
            globals: visible_variables(heap, &enclosing, &renderer),
            stack_info: StackInfo {
                current_frames: stack_view(frame, &renderer, &self.config),
                historical_events: self.calls.events_until(index),
                active_call_ids: self.calls.active_ids(),
            },
            visualizables: graph.nodes,
            error: None,
            input_request: None,
        };
        self.steps.push(step)
    }

    /// Terminal step for a failure inside the recorder
    fn fail_internally(&mut self, line: usize, err: TraceError) {
        tracing::error!(%err, line, "tracer internal error while recording a step");
        let raw = format!(
            "Tracer internal error in record_step: {}\nTraceback (most recent call last):\n  File \"{}\", line {}, in record_step",
            err,
            RECORDER_ORIGIN,
            line!()
        );
        let error = sanitize(&raw, false);
        let step = Step {
            line_no: line as i64,
            stdout: self.console.captured(),
            stack_info: self.stack_info(),
            ..Step::terminal(self.steps.next_index(), "<Debugger Error in record_step>", Some(error))
        };
        self.push_error_step(step);
        self.stopped = true;
    }

    /// Append a terminal error step unless the last step already carries that error
    pub fn push_error_step(&mut self, step: Step) {
        match self.steps.last_mut() {
            Some(last) if last.error.is_some() && last.error == step.error => {
                last.stdout = step.stdout;
                last.stack_info = step.stack_info;
            }
            _ => self.steps.push_terminal(step),
        }
    }

    /// Mark the last step as waiting for input
    pub fn suspend(&mut self, prompt: &str) {
        let stdout = self.console.captured();
        if let Some(last) = self.steps.last_mut() {
            last.input_request = Some(InputRequest {
                prompt: prompt.to_string(),
            });
            last.stdout = stdout;
        }
    }

    /// Fold the final program state into the last step after a normal finish
    pub fn finish(&mut self, final_state: FinalState) {
        let stack_info = StackInfo {
            current_frames: Vec::new(),
            historical_events: self.calls.events().to_vec(),
            active_call_ids: Vec::new(),
        };
        match self.steps.last_mut() {
            Some(last) => {
                last.stdout = final_state.stdout;
                last.visualizables = final_state.graph;
                last.locals = final_state.module_vars;
                last.globals = IndexMap::new();
                last.stack_info = stack_info;
            }
            None => {
                let step = Step {
                    stdout: final_state.stdout,
                    locals: final_state.module_vars,
                    visualizables: final_state.graph,
                    stack_info,
                    ..Step::terminal(self.steps.next_index(), "Finished (No user lines traced)", None)
                };
                self.steps.push_terminal(step);
            }
        }
    }

    /// Terminal step for an uncaught exception in the program
    pub fn fail_at_runtime(&mut self, error: String, user_line: Option<usize>, stdout: String) {
        let last = self.steps.last().cloned();
        let line_no = user_line
            .map(|line| line as i64)
            .or_else(|| last.as_ref().map(|s| s.line_no))
            .unwrap_or(-1);
        let stack_info = StackInfo {
            current_frames: last
                .as_ref()
                .map(|s| s.stack_info.current_frames.clone())
                .unwrap_or_default(),
            historical_events: self.calls.events().to_vec(),
            active_call_ids: self.calls.active_ids(),
        };
        let mut step = Step {
            line_no,
            stdout,
            stack_info,
            ..Step::terminal(self.steps.next_index(), "<Error during execution>", Some(error))
        };
        if let Some(last) = last {
            step.code = last.code;
            step.locals = last.locals;
            step.globals = last.globals;
            step.visualizables = last.visualizables;
        }
        self.push_error_step(step);
    }

    fn call_record(&self, frame: &FrameRef<'_>) -> CallRecord {
        let untracked: FxHashSet<ObjectId> = FxHashSet::default();
        let renderer = Renderer::new(frame.heap(), &untracked, &self.config);
        CallRecord {
            function_name: frame.routine().to_string(),
            args_repr: arguments(frame, &renderer, &self.config),
            line: frame.line(),
        }
    }
}

pub(super) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

impl ExecutionHook for Tracer {
    fn on_line(&mut self, frame: FrameRef<'_>) -> HookAction {
        if self.stopped {
            return HookAction::Stop;
        }
        if !FrameOrigin::classify(frame.origin(), frame.routine()).is_user() {
            return HookAction::Continue;
        }
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.record_step(frame)));
        let err = match outcome {
            Ok(Ok(())) => return HookAction::Continue,
            Ok(Err(err)) => err,
            Err(payload) => TraceError::Panic {
                routine: "record_step",
                message: panic_message(payload.as_ref()),
            },
        };
        self.fail_internally(frame.line(), err);
        HookAction::Stop
    }

    fn on_call(&mut self, frame: FrameRef<'_>) -> HookAction {
        if self.stopped {
            return HookAction::Stop;
        }
        let visible = FrameOrigin::classify(frame.origin(), frame.routine()).is_user() && !frame.is_module();
        let record = visible.then(|| self.call_record(&frame));
        self.calls.on_call(record, self.steps.next_index());
        HookAction::Continue
    }

    fn on_return(&mut self, frame: FrameRef<'_>, value: &Value) -> HookAction {
        if self.stopped {
            return HookAction::Stop;
        }
        let untracked: FxHashSet<ObjectId> = FxHashSet::default();
        let renderer = Renderer::new(frame.heap(), &untracked, &self.config);
        self.calls
            .on_return(self.steps.next_index(), || renderer.render_default(value));
        HookAction::Continue
    }

    fn read_input(&mut self, prompt: &str, _frame: FrameRef<'_>) -> InputReply {
        match self.inputs.next_value() {
            Some(value) => {
                self.console.write(&format!("{}{}\n", prompt, value));
                InputReply::Line(value)
            }
            None => {
                self.console.write(prompt);
                tracing::debug!(prompt, "input requested with no value available");
                InputReply::Suspend
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_history_replays_then_takes_staged_value() {
        let mut history = InputHistory::new(vec!["a".to_string()], Some("b".to_string()));
        assert_eq!(history.next_value().as_deref(), Some("a"));
        assert_eq!(history.next_value().as_deref(), Some("b"));
        assert_eq!(history.next_value(), None);
        assert_eq!(history.values(), ["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_error_steps_are_merged() {
        let mut tracer = Tracer::new(TracerConfig::default(), "x = 1", Console::new(), InputHistory::default());
        tracer.push_error_step(Step::terminal(0, "x", Some("boom".to_string())));
        tracer.push_error_step(Step {
            stdout: "out".to_string(),
            ..Step::terminal(1, "x", Some("boom".to_string()))
        });
        assert_eq!(tracer.steps().len(), 1);
        assert_eq!(tracer.steps().steps()[0].stdout, "out");
    }

    #[test]
    fn test_finish_without_steps() {
        let mut tracer = Tracer::new(TracerConfig::default(), "", Console::new(), InputHistory::default());
        tracer.finish(FinalState::default());
        let step = &tracer.steps().steps()[0];
        assert_eq!(step.code, "Finished (No user lines traced)");
        assert_eq!(step.line_no, -1);
    }

    #[test]
    fn test_recorder_origin_is_tracer_internal() {
        assert_eq!(
            FrameOrigin::classify(RECORDER_ORIGIN, READ_INPUT_ROUTINE),
            FrameOrigin::TracerInternal
        );
    }
}
