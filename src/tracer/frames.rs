//! Call-stack views
//!
//! Argument lists and the simplified call stack shown with every step.

use super::origin::FrameOrigin;
use super::render::{truncate, Renderer};
use super::step::FrameView;
use crate::config::TracerConfig;
use crate::interpreter::hooks::FrameRef;
use crate::memory::heap::HeapObject;
use crate::memory::scope::scope_get;
use crate::memory::value::Value;

/// Display name of a user frame's routine
pub fn display_name(routine: &str) -> String {
    match routine {
        "<module>" => "(Global Scope)".to_string(),
        "<lambda>" => "lambda".to_string(),
        other => other.to_string(),
    }
}

/// `self` / `cls` of a user class rendered by class name
fn receiver_text(frame: &FrameRef<'_>, name: &str, value: &Value, limit: usize) -> Option<String> {
    let heap = frame.heap();
    let (class_name, description) = match (name, heap.deref(value)?) {
        ("self", HeapObject::Instance(instance)) => match heap.get(instance.class)? {
            HeapObject::Class(class) if !class.builtin => (class.name.as_str(), "object"),
            _ => return None,
        },
        ("cls", HeapObject::Class(class)) if !class.builtin => (class.name.as_str(), "class"),
        _ => return None,
    };
    let room = limit.saturating_sub(description.len() + 3);
    if class_name.chars().count() <= room {
        Some(format!("<{} {}>", class_name, description))
    } else if room > 3 {
        Some(format!("<{} {}>", truncate(class_name, room - 3), description))
    } else {
        Some(format!("<{}>", description))
    }
}

/// `name=value` list of a frame's parameters, including `*args` and `**kwargs`
pub fn arguments(frame: &FrameRef<'_>, renderer: &Renderer<'_>, config: &TracerConfig) -> String {
    let Some(params) = frame.parameters() else {
        return String::new();
    };
    let heap = frame.heap();
    let scope = frame.locals_scope();
    let mut parts = Vec::new();

    for param in params.positional.iter().chain(&params.kwonly) {
        let Some(value) = scope_get(scope, &param.name) else {
            continue;
        };
        let text = receiver_text(frame, &param.name, &value, config.argument_repr_length)
            .unwrap_or_else(|| renderer.render(&value, config.argument_repr_length));
        parts.push(format!("{}={}", param.name, text));
    }

    if let Some(name) = &params.varargs {
        if let Some(HeapObject::Tuple(items)) = scope_get(scope, name).as_ref().and_then(|v| heap.deref(v)) {
            let items: Vec<String> = items
                .iter()
                .map(|item| renderer.render(item, config.variadic_repr_length))
                .collect();
            parts.push(format!("*{}=({})", name, items.join(", ")));
        }
    }

    if let Some(name) = &params.varkw {
        if let Some(HeapObject::Dict(map)) = scope_get(scope, name).as_ref().and_then(|v| heap.deref(v)) {
            let items: Vec<String> = map
                .values()
                .map(|(key, value)| {
                    let key = key.as_str().map(str::to_string).unwrap_or_else(|| renderer.render_default(key));
                    format!("{}={}", key, renderer.render(value, config.variadic_repr_length))
                })
                .collect();
            parts.push(format!("**{}={{{}}}", name, items.join(", ")));
        }
    }
    parts.join(", ")
}

/// User frames from `frame` outwards, walking at most `stack_depth` frames
pub fn stack_view(frame: FrameRef<'_>, renderer: &Renderer<'_>, config: &TracerConfig) -> Vec<FrameView> {
    let mut views = Vec::new();
    let mut current = Some(frame);
    let mut walked = 0;
    while let Some(frame) = current {
        if walked >= config.stack_depth {
            break;
        }
        if FrameOrigin::classify(frame.origin(), frame.routine()).is_user() {
            views.push(FrameView {
                function: display_name(frame.routine()),
                line: frame.line(),
                arguments: arguments(&frame, renderer, config),
            });
        }
        current = frame.back();
        walked += 1;
    }
    views
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_names() {
        assert_eq!(display_name("<module>"), "(Global Scope)");
        assert_eq!(display_name("<lambda>"), "lambda");
        assert_eq!(display_name("fib"), "fib");
    }
}
