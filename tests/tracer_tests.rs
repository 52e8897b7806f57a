// End-to-end tests driving the tracer through a session

use pretty_assertions::assert_eq;
use pytrace::config::TracerConfig;
use pytrace::tracer::calls::CallEvent;
use pytrace::tracer::graph::{Payload, VizType};
use pytrace::tracer::session::{RunRequest, RunResponse, Session};
use pytrace::tracer::Step;

fn trace(source: &str) -> RunResponse {
    let mut session = Session::new(TracerConfig::default());
    session.submit(RunRequest::new(source))
}

fn last(response: &RunResponse) -> &Step {
    response.trace.last().expect("trace is never empty")
}

#[test]
fn test_steps_are_numbered_from_zero() {
    let response = trace("total = 0\nfor i in range(3):\n    total += i\nprint(total)\n");
    assert!(response.finished);
    assert!(response.error.is_none());
    for (index, step) in response.trace.iter().enumerate() {
        assert_eq!(step.step, index);
    }
    let lines: Vec<i64> = response.trace.iter().map(|s| s.line_no).collect();
    assert_eq!(lines, vec![1, 2, 3, 2, 3, 2, 3, 2, 4]);
    assert_eq!(last(&response).stdout, "3\n");
}

#[test]
fn test_aliases_share_one_node() {
    let response = trace("x = [1, 2]\ny = x\nz = {\"a\": x}\n");
    let step = last(&response);
    assert_eq!(step.visualizables.len(), 2);

    let list = step
        .visualizables
        .iter()
        .find(|node| node.viz_type == VizType::Array)
        .expect("list node");
    let dict = step
        .visualizables
        .iter()
        .find(|node| node.viz_type == VizType::Dict)
        .expect("dict node");
    assert_eq!(list.names(), vec!["x", "y"]);
    assert_eq!(dict.name, "z");
    assert_eq!(dict.references.len(), 1);
    assert_eq!(dict.references[0].field_name, "val_for_key('a')");
    assert_eq!(dict.references[0].target_id, list.id);
    assert_eq!(
        step.locals.get("x").map(String::as_str),
        Some(format!("➔ list[2] @ {}", list.memory_address).as_str())
    );
}

#[test]
fn test_self_referencing_list_terminates() {
    let response = trace("a = [1]\na.append(a)\nprint(len(a))\n");
    assert!(response.finished);
    let step = last(&response);
    assert_eq!(step.stdout, "2\n");
    assert_eq!(step.visualizables.len(), 1);
    let node = &step.visualizables[0];
    assert_eq!(node.references.len(), 1);
    assert_eq!(node.references[0].field_name, "[1]");
    assert_eq!(node.references[0].target_id, node.id);

    let Some(Payload::Elements(elements)) = &node.payload else {
        panic!("list payload expected");
    };
    assert_eq!(elements[0].value_repr, "1");
    assert_eq!(elements[1].value_repr, format!("➔ list[2] @ {}", node.memory_address));
}

#[test]
fn test_every_return_follows_its_call() {
    let source = r#"
def leaf(n):
    return n * 2

def outer(n):
    return leaf(n) + leaf(n + 1)

print(outer(1))
"#;
    let response = trace(source);
    assert!(response.finished);
    let events = &last(&response).stack_info.historical_events;

    let mut calls = Vec::new();
    for event in events {
        match event {
            CallEvent::Call { call_id, .. } => calls.push(*call_id),
            CallEvent::Return { call_id, .. } => {
                assert!(calls.contains(call_id), "return without a call: {:?}", call_id)
            }
        }
    }
    assert_eq!(calls.len(), 3);

    let outer_id = events
        .iter()
        .find_map(|event| match event {
            CallEvent::Call {
                call_id, function_name, ..
            } if function_name == "outer" => Some(*call_id),
            _ => None,
        })
        .expect("outer was logged");
    let leaf_parents: Vec<_> = events
        .iter()
        .filter_map(|event| match event {
            CallEvent::Call {
                function_name,
                parent_call_id,
                ..
            } if function_name == "leaf" => Some(*parent_call_id),
            _ => None,
        })
        .collect();
    assert_eq!(leaf_parents, vec![Some(outer_id), Some(outer_id)]);
}

#[test]
fn test_each_input_suspends_then_resumes() {
    let source = "a = input('a? ')\nb = input('b? ')\nc = input('c? ')\nprint(a + b + c)\n";
    let mut session = Session::new(TracerConfig::default());

    let mut response = session.submit(RunRequest::new(source));
    let mut inputs = Vec::new();
    for (prompt, answer) in [("a? ", "1"), ("b? ", "2"), ("c? ", "3")] {
        assert!(!response.finished);
        assert_eq!(response.input_prompt(), Some(prompt));
        assert_eq!(response.updated_all_inputs, inputs);
        response = session.submit(RunRequest::resume(answer, inputs.clone()));
        inputs.push(answer.to_string());
    }

    assert!(response.finished);
    assert!(response.error.is_none());
    assert_eq!(response.updated_all_inputs, vec!["1", "2", "3"]);
    assert_eq!(last(&response).stdout, "a? 1\nb? 2\nc? 3\n123\n");
}

#[test]
fn test_syntax_error_is_a_single_step() {
    let response = trace("x = 1\nif x\n    print(x)\n");
    assert!(response.finished);
    assert_eq!(response.trace.len(), 1);
    let error = response.error.expect("syntax error reported");
    assert!(error.contains("SyntaxError"), "{}", error);
    assert!(!error.contains(env!("CARGO_MANIFEST_DIR")), "{}", error);
    assert_eq!(response.trace[0].line_no, 2);
}

#[test]
fn test_runtime_error_keeps_last_state() {
    let source = "def f(n):\n    return 10 / n\n\nx = 5\nprint(f(x))\nprint(f(0))\n";
    let response = trace(source);
    assert!(response.finished);
    let error = response.error.clone().expect("runtime error reported");
    assert!(error.contains("ZeroDivisionError"), "{}", error);
    assert!(!error.contains(env!("CARGO_MANIFEST_DIR")), "{}", error);

    let errored: Vec<&Step> = response.trace.iter().filter(|s| s.error.is_some()).collect();
    assert_eq!(errored.len(), 1);
    let step = last(&response);
    assert_eq!(step.line_no, 2);
    assert_eq!(step.stdout, "2.0\n");
}

#[test]
fn test_fresh_sessions_are_deterministic() {
    let source = r#"
class Node:
    def __init__(self, value):
        self.value = value
        self.next = None

head = Node(1)
head.next = Node(2)
items = {"head": head, "values": [1, 2, 3]}
"#;
    let first = trace(source);
    let second = trace(source);
    assert_eq!(first, second);
    assert!(first.trace.iter().all(|step| step.input_request.is_none()));
}

#[test]
fn test_program_without_lines_still_finishes() {
    let response = trace("# nothing to run\n");
    assert!(response.finished);
    assert_eq!(response.trace.len(), 1);
    assert_eq!(response.trace[0].code, "Finished (No user lines traced)");
}

#[test]
fn test_runaway_recursion_is_a_runtime_error() {
    let response = trace("def f(n):\n    return f(n + 1)\n\nf(0)\n");
    assert!(response.finished);
    let error = response.error.clone().expect("recursion reported");
    assert!(error.contains("RecursionError"), "{}", error);
    assert_eq!(last(&response).line_no, 2);
}

#[test]
fn test_continuation_without_history_uses_submitted_code() {
    let mut session = Session::new(TracerConfig::default());
    let request = RunRequest {
        code: "a = input('a? ')\nprint(a)\n".to_string(),
        ..RunRequest::resume("5", Vec::new())
    };
    let response = session.submit(request);
    assert!(response.finished);
    assert!(response.error.is_none());
    assert_eq!(response.updated_all_inputs, vec!["5"]);
    assert_eq!(last(&response).stdout, "a? 5\n5\n");
}

#[test]
fn test_step_limit_stops_the_run() {
    let config = TracerConfig {
        max_steps: 5,
        ..TracerConfig::default()
    };
    let mut session = Session::new(config);
    let response = session.submit(RunRequest::new("n = 0\nwhile True:\n    n += 1\n"));
    assert!(response.finished);
    assert_eq!(response.trace.len(), 6);
    for (index, step) in response.trace.iter().enumerate() {
        assert_eq!(step.step, index);
    }
    let step = last(&response);
    assert_eq!(step.code, "<Debugger Error in record_step>");
    let error = response.error.clone().expect("internal failure reported");
    assert!(error.contains("step limit of 5 exceeded"), "{}", error);
    assert!(!error.contains(env!("CARGO_MANIFEST_DIR")), "{}", error);
}

#[test]
fn test_calls_through_builtins_keep_the_user_parent() {
    let source = r#"
def k(x):
    return -x

def outer(xs):
    return sorted(xs, key=k)

print(outer([3, 1, 2]))
"#;
    let response = trace(source);
    assert!(response.finished);
    let step = last(&response);
    assert_eq!(step.stdout, "[3, 2, 1]\n");

    let events = &step.stack_info.historical_events;
    let outer_id = events
        .iter()
        .find_map(|event| match event {
            CallEvent::Call {
                call_id, function_name, ..
            } if function_name == "outer" => Some(*call_id),
            _ => None,
        })
        .expect("outer was logged");
    let key_parents: Vec<_> = events
        .iter()
        .filter_map(|event| match event {
            CallEvent::Call {
                function_name,
                parent_call_id,
                ..
            } if function_name == "k" => Some(*parent_call_id),
            _ => None,
        })
        .collect();
    assert_eq!(key_parents, vec![Some(outer_id); 3]);
}
