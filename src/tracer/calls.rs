//! Call event log
//!
//! Every frame entry consumes the next call id and is pushed on the active
//! stack. Only user calls are written to the log and pushed on the logged
//! stack, so internal frames never become parents: a call made from inside
//! an engine frame is parented to the nearest logged ancestor. A return is
//! logged only when the frame it closes is the top of the logged stack, which
//! pairs every logged return with an earlier logged call.

use serde::Serialize;

pub type CallId = u64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CallEvent {
    Call {
        call_id: CallId,
        parent_call_id: Option<CallId>,
        function_name: String,
        args_repr: String,
        line_no_in_function: usize,
        timestamp_step: usize,
    },
    Return {
        call_id: CallId,
        return_value_repr: String,
        timestamp_step: usize,
    },
}

impl CallEvent {
    pub fn call_id(&self) -> CallId {
        match self {
            CallEvent::Call { call_id, .. } | CallEvent::Return { call_id, .. } => *call_id,
        }
    }

    pub fn timestamp_step(&self) -> usize {
        match self {
            CallEvent::Call { timestamp_step, .. } | CallEvent::Return { timestamp_step, .. } => {
                *timestamp_step
            }
        }
    }
}

/// What the log records about a visible call
#[derive(Debug, Clone)]
pub struct CallRecord {
    pub function_name: String,
    pub args_repr: String,
    pub line: usize,
}

#[derive(Debug, Default, Clone)]
pub struct CallLog {
    counter: CallId,
    events: Vec<CallEvent>,
    active: Vec<CallId>,
    logged: Vec<CallId>,
}

impl CallLog {
    pub fn new() -> Self {
        CallLog::default()
    }

    /// Register a frame entry. `record` is `None` for frames hidden from the log.
    pub fn on_call(&mut self, record: Option<CallRecord>, step: usize) -> CallId {
        self.counter += 1;
        let call_id = self.counter;
        self.active.push(call_id);
        if let Some(record) = record {
            self.events.push(CallEvent::Call {
                call_id,
                parent_call_id: self.logged.last().copied(),
                function_name: record.function_name,
                args_repr: record.args_repr,
                line_no_in_function: record.line,
                timestamp_step: step,
            });
            self.logged.push(call_id);
        }
        call_id
    }

    /// Register a frame exit; `render` produces the return value text only
    /// when the return is logged
    pub fn on_return(&mut self, step: usize, render: impl FnOnce() -> String) {
        let Some(call_id) = self.active.pop() else {
            return;
        };
        if self.logged.last() == Some(&call_id) {
            self.logged.pop();
            self.events.push(CallEvent::Return {
                call_id,
                return_value_repr: render(),
                timestamp_step: step,
            });
        }
    }

    pub fn events(&self) -> &[CallEvent] {
        &self.events
    }

    /// Events that happened at or before `step`
    pub fn events_until(&self, step: usize) -> Vec<CallEvent> {
        self.events
            .iter()
            .filter(|e| e.timestamp_step() <= step)
            .cloned()
            .collect()
    }

    /// Ids of logged calls that have not returned yet, outermost first
    pub fn active_ids(&self) -> Vec<CallId> {
        self.logged.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn record(name: &str) -> Option<CallRecord> {
        Some(CallRecord {
            function_name: name.to_string(),
            args_repr: String::new(),
            line: 1,
        })
    }

    fn parent_of(log: &CallLog, id: CallId) -> Option<CallId> {
        log.events().iter().find_map(|e| match e {
            CallEvent::Call {
                call_id,
                parent_call_id,
                ..
            } if *call_id == id => *parent_call_id,
            _ => None,
        })
    }

    #[test]
    fn test_hidden_frames_consume_ids_without_parenting() {
        let mut log = CallLog::new();
        let module = log.on_call(None, 0);
        let outer = log.on_call(record("outer"), 1);
        let engine = log.on_call(None, 2);
        let key = log.on_call(record("key"), 2);
        assert_eq!((module, outer, engine, key), (1, 2, 3, 4));
        assert_eq!(parent_of(&log, outer), None);
        assert_eq!(parent_of(&log, key), Some(outer));
        assert_eq!(log.active_ids(), vec![outer, key]);

        log.on_return(3, || "1".to_string());
        log.on_return(3, unreachable_render);
        log.on_return(4, || "None".to_string());
        log.on_return(4, unreachable_render);
        assert!(log.active_ids().is_empty());
        let returns: Vec<CallId> = log
            .events()
            .iter()
            .filter(|e| matches!(e, CallEvent::Return { .. }))
            .map(CallEvent::call_id)
            .collect();
        assert_eq!(returns, vec![key, outer]);
    }

    fn unreachable_render() -> String {
        panic!("hidden frame return must not be rendered")
    }

    #[test]
    fn test_unbalanced_return_is_ignored() {
        let mut log = CallLog::new();
        log.on_return(0, String::new);
        assert!(log.events().is_empty());
    }

    #[test]
    fn test_events_until() {
        let mut log = CallLog::new();
        log.on_call(record("f"), 0);
        log.on_return(2, || "None".to_string());
        assert_eq!(log.events_until(1).len(), 1);
        assert_eq!(log.events_until(2).len(), 2);
    }

    #[test]
    fn test_serialized_shape() {
        let mut log = CallLog::new();
        log.on_call(record("f"), 0);
        let json = serde_json::to_value(&log.events()[0]).unwrap();
        assert_eq!(json["type"], "call");
        assert_eq!(json["function_name"], "f");
        assert!(json["parent_call_id"].is_null());
    }
}
