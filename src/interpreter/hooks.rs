//! Instrumentation protocol between the interpreter and an observer
//!
//! An [`ExecutionHook`] is notified before every statement, on every frame entry
//! and exit, and whenever user code reads console input while stdin is
//! intercepted. Each notification receives a [`FrameRef`], a read-only view of
//! one frame of the live call stack that can walk to its callers.

use crate::memory::heap::Heap;
use crate::memory::scope::{scope_entries, ScopeRef};
use crate::memory::stack::{FrameKind, StackFrame};
use crate::memory::value::Value;
use crate::parser::ast::Parameters;
use std::rc::Rc;

/// What the interpreter should do after a notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookAction {
    Continue,
    /// Abort interpretation; no further notifications are delivered
    Stop,
}

/// Answer to an intercepted console read
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputReply {
    Line(String),
    /// No value is available; the run halts with an input request
    Suspend,
}

/// Observer of a running program
pub trait ExecutionHook {
    /// Called before each statement and loop-header evaluation
    fn on_line(&mut self, frame: FrameRef<'_>) -> HookAction;

    /// Called after a frame is pushed and its arguments are bound
    fn on_call(&mut self, frame: FrameRef<'_>) -> HookAction;

    /// Called before a frame is popped; `value` is `None` on exceptional exit
    fn on_return(&mut self, frame: FrameRef<'_>, value: &Value) -> HookAction;

    /// Called by `input()` while stdin is intercepted
    fn read_input(&mut self, prompt: &str, frame: FrameRef<'_>) -> InputReply;
}

/// Read-only view of one frame of the live call stack
#[derive(Clone, Copy)]
pub struct FrameRef<'a> {
    frames: &'a [StackFrame],
    index: usize,
    heap: &'a Heap,
}

impl<'a> FrameRef<'a> {
    /// View of the innermost frame
    pub(crate) fn top(frames: &'a [StackFrame], heap: &'a Heap) -> Option<Self> {
        let index = frames.len().checked_sub(1)?;
        Some(FrameRef {
            frames,
            index,
            heap,
        })
    }

    fn frame(&self) -> &'a StackFrame {
        &self.frames[self.index]
    }

    /// Source file the frame's code comes from
    pub fn origin(&self) -> &'a str {
        &self.frame().origin
    }

    /// Routine name (`<module>`, `<lambda>`, a function or class name)
    pub fn routine(&self) -> &'a str {
        &self.frame().function_name
    }

    /// Line currently executing in this frame
    pub fn line(&self) -> usize {
        self.frame().line
    }

    pub fn kind(&self) -> FrameKind {
        self.frame().kind
    }

    pub fn is_module(&self) -> bool {
        self.frame().is_module()
    }

    /// Local bindings in insertion order (module frames return the module namespace)
    pub fn locals(&self) -> Vec<(String, Value)> {
        scope_entries(&self.frame().locals)
    }

    /// Module namespace the frame's code resolves globals in
    pub fn globals(&self) -> Vec<(String, Value)> {
        scope_entries(&self.frame().globals)
    }

    /// Names visible from enclosing function scopes and then the module, innermost
    /// binding first, excluding names the frame binds itself
    pub fn enclosing(&self) -> Vec<(String, Value)> {
        let frame = self.frame();
        let mut visible: Vec<(String, Value)> = Vec::new();
        let scopes = frame.closure.iter().chain(std::iter::once(&frame.globals));
        for scope in scopes {
            if Rc::ptr_eq(scope, &frame.locals) {
                continue;
            }
            for (name, value) in scope_entries(scope) {
                if !visible.iter().any(|(seen, _)| *seen == name) {
                    visible.push((name, value));
                }
            }
        }
        let locals = frame.locals.borrow();
        visible.retain(|(name, _)| !locals.contains_key(name));
        visible
    }

    pub fn locals_scope(&self) -> &'a ScopeRef {
        &self.frame().locals
    }

    /// Declared parameters of the running function
    pub fn parameters(&self) -> Option<&'a Parameters> {
        self.frame().params.as_deref()
    }

    /// The calling frame
    pub fn back(&self) -> Option<FrameRef<'a>> {
        let index = self.index.checked_sub(1)?;
        Some(FrameRef {
            frames: self.frames,
            index,
            heap: self.heap,
        })
    }

    /// Heap the frame's values live on
    pub fn heap(&self) -> &'a Heap {
        self.heap
    }
}

impl std::fmt::Debug for FrameRef<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameRef")
            .field("routine", &self.routine())
            .field("origin", &self.origin())
            .field("line", &self.line())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::scope::new_scope;

    #[test]
    fn test_back_walks_to_outermost() {
        let globals = new_scope();
        let mut outer = StackFrame::native("host", Rc::from("host.rs"), globals.clone());
        outer.line = 3;
        let inner = StackFrame::module(Rc::from("<string>"), globals);
        let frames = vec![outer, inner];
        let heap = Heap::new();

        let top = FrameRef::top(&frames, &heap).unwrap();
        assert_eq!(top.routine(), "<module>");
        assert!(top.is_module());
        let back = top.back().unwrap();
        assert_eq!(back.routine(), "host");
        assert_eq!(back.line(), 3);
        assert!(back.back().is_none());
    }
}
