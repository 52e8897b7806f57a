// Recorded execution steps

use super::calls::{CallEvent, CallId};
use super::errors::TraceError;
use super::graph::GraphNode;
use indexmap::IndexMap;
use serde::Serialize;

/// One frame of the call-stack view
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FrameView {
    pub function: String,
    pub line: usize,
    pub arguments: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StackInfo {
    /// Innermost frame first
    pub current_frames: Vec<FrameView>,
    pub historical_events: Vec<CallEvent>,
    pub active_call_ids: Vec<CallId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InputRequest {
    pub prompt: String,
}

/// Snapshot of program state at one user line
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Step {
    pub step: usize,
    /// 1-based source line, `-1` when no line applies
    pub line_no: i64,
    pub code: String,
    /// Console output produced so far
    pub stdout: String,
    pub locals: IndexMap<String, String>,
    /// Names visible from enclosing scopes and not shadowed by locals
    pub globals: IndexMap<String, String>,
    pub visualizables: Vec<GraphNode>,
    pub error: Option<String>,
    pub stack_info: StackInfo,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_request: Option<InputRequest>,
}

impl Step {
    /// Terminal step carrying only a message and an error
    pub fn terminal(step: usize, code: impl Into<String>, error: Option<String>) -> Self {
        Step {
            step,
            line_no: -1,
            code: code.into(),
            stdout: String::new(),
            locals: IndexMap::new(),
            globals: IndexMap::new(),
            visualizables: Vec::new(),
            error,
            stack_info: StackInfo::default(),
            input_request: None,
        }
    }
}

/// Steps of one run, bounded in number
#[derive(Debug, Clone)]
pub struct StepLog {
    steps: Vec<Step>,
    max_steps: usize,
}

impl StepLog {
    pub fn new(max_steps: usize) -> Self {
        StepLog {
            steps: Vec::new(),
            max_steps,
        }
    }

    /// Append a step; fails once the limit is reached
    pub fn push(&mut self, step: Step) -> Result<(), TraceError> {
        if self.steps.len() >= self.max_steps {
            return Err(TraceError::StepLimit {
                limit: self.max_steps,
            });
        }
        self.steps.push(step);
        Ok(())
    }

    /// Append a terminal step regardless of the limit
    pub fn push_terminal(&mut self, step: Step) {
        self.steps.push(step);
    }

    /// Index the next step will get
    pub fn next_index(&self) -> usize {
        self.steps.len()
    }

    pub fn get(&self, index: usize) -> Option<&Step> {
        self.steps.get(index)
    }

    pub fn last(&self) -> Option<&Step> {
        self.steps.last()
    }

    pub fn last_mut(&mut self) -> Option<&mut Step> {
        self.steps.last_mut()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn into_steps(self) -> Vec<Step> {
        self.steps
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limit_rejects_regular_steps_only() {
        let mut log = StepLog::new(1);
        log.push(Step::terminal(0, "a", None)).unwrap();
        let err = log.push(Step::terminal(1, "b", None)).unwrap_err();
        assert!(matches!(err, TraceError::StepLimit { limit: 1 }));
        log.push_terminal(Step::terminal(1, "c", Some("boom".into())));
        assert_eq!(log.len(), 2);
        assert_eq!(log.next_index(), 2);
        assert_eq!(log.last().and_then(|s| s.error.as_deref()), Some("boom"));
    }

    #[test]
    fn test_input_request_only_serialized_when_present() {
        let mut step = Step::terminal(0, "x = input()", None);
        let json = serde_json::to_value(&step).unwrap();
        assert!(json.get("input_request").is_none());
        assert_eq!(json["line_no"], -1);
        step.input_request = Some(InputRequest {
            prompt: "? ".to_string(),
        });
        let json = serde_json::to_value(&step).unwrap();
        assert_eq!(json["input_request"]["prompt"], "? ");
    }
}
