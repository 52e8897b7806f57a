//! Call stack implementation
//!
//! This module provides the call stack for function execution:
//! - [`Stack`]: The call stack containing frames
//! - [`StackFrame`]: A single activation record (module, function, class body,
//!   or a host/engine/tracer frame that runs no user code)
//!
//! # Origins
//!
//! Every frame records the file it notionally comes from. User code always runs
//! under [`USER_SUBMISSION_MARKER`](crate::interpreter::constants::USER_SUBMISSION_MARKER);
//! builtins that call back into user code push a frame attributed to the engine's
//! own source files, and the host that starts a run supplies its own entry frame.
//! The tracer uses these origins to separate user frames from infrastructure.

use super::heap::NameInfo;
use super::scope::{new_scope, ScopeRef};
use super::value::{ObjectId, Value};
use crate::parser::ast::Parameters;
use indexmap::IndexMap;
use std::rc::Rc;

/// What kind of code a frame executes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    Module,
    Function,
    Class,
    /// Host, engine or tracer frame, never executes user statements
    Native,
}

/// Stack frame for one activation
#[derive(Debug, Clone)]
pub struct StackFrame {
    pub function_name: String,
    pub kind: FrameKind,
    /// Source file the frame's code comes from
    pub origin: Rc<str>,
    pub line: usize,
    pub locals: ScopeRef,
    pub globals: ScopeRef,
    /// Enclosing function scopes, innermost first
    pub closure: Rc<[ScopeRef]>,
    pub params: Option<Rc<Parameters>>,
    pub names: Option<Rc<NameInfo>>,
    /// Function object being executed, for `super()` and display
    pub function: Option<ObjectId>,
    /// Class whose body defined the running function, for zero-argument `super()`
    pub defining_class: Option<ObjectId>,
    /// Comprehension variables, innermost last; shadow locals during evaluation
    comprehension_scopes: Vec<IndexMap<String, Value>>,
}

impl StackFrame {
    pub fn new(function_name: impl Into<String>, kind: FrameKind, origin: Rc<str>, globals: ScopeRef) -> Self {
        StackFrame {
            function_name: function_name.into(),
            kind,
            origin,
            line: 0,
            locals: new_scope(),
            globals,
            closure: Rc::from(Vec::new()),
            params: None,
            names: None,
            function: None,
            defining_class: None,
            comprehension_scopes: Vec::new(),
        }
    }

    /// Module frame: locals and globals are the same namespace
    pub fn module(origin: Rc<str>, globals: ScopeRef) -> Self {
        let mut frame = StackFrame::new("<module>", FrameKind::Module, origin, globals.clone());
        frame.locals = globals;
        frame
    }

    /// Native frame for host, engine or tracer code
    pub fn native(function_name: impl Into<String>, origin: Rc<str>, globals: ScopeRef) -> Self {
        StackFrame::new(function_name, FrameKind::Native, origin, globals)
    }

    pub fn is_module(&self) -> bool {
        self.kind == FrameKind::Module
    }

    /// Whether a name is local to this frame by static analysis
    pub fn is_local_name(&self, name: &str) -> bool {
        match (&self.names, self.kind) {
            (Some(names), _) => names.locals.contains(name),
            (None, FrameKind::Class) => true,
            _ => false,
        }
    }

    pub fn is_declared_global(&self, name: &str) -> bool {
        self.names.as_ref().is_some_and(|n| n.globals.contains(name))
    }

    pub fn is_declared_nonlocal(&self, name: &str) -> bool {
        self.names.as_ref().is_some_and(|n| n.nonlocals.contains(name))
    }

    /// Enter a comprehension scope
    pub fn push_scope(&mut self) {
        self.comprehension_scopes.push(IndexMap::new());
    }

    /// Exit the current comprehension scope
    pub fn pop_scope(&mut self) {
        self.comprehension_scopes.pop();
    }

    pub fn in_comprehension(&self) -> bool {
        !self.comprehension_scopes.is_empty()
    }

    /// Bind a comprehension variable in the innermost comprehension scope
    pub fn bind_comprehension_var(&mut self, name: &str, value: Value) -> bool {
        match self.comprehension_scopes.last_mut() {
            Some(scope) => {
                scope.insert(name.to_string(), value);
                true
            }
            None => false,
        }
    }

    /// Look up a comprehension variable, innermost scope first
    pub fn comprehension_var(&self, name: &str) -> Option<Value> {
        self.comprehension_scopes
            .iter()
            .rev()
            .find_map(|scope| scope.get(name).cloned())
    }
}

/// The call stack
#[derive(Debug, Clone, Default)]
pub struct Stack {
    frames: Vec<StackFrame>,
}

impl Stack {
    pub fn new() -> Self {
        Stack { frames: Vec::new() }
    }

    /// Push a new stack frame
    pub fn push_frame(&mut self, frame: StackFrame) {
        self.frames.push(frame);
    }

    /// Pop the top stack frame
    pub fn pop_frame(&mut self) -> Option<StackFrame> {
        self.frames.pop()
    }

    /// Get the current (top) frame
    pub fn current_frame(&self) -> Option<&StackFrame> {
        self.frames.last()
    }

    /// Get a mutable reference to the current frame
    pub fn current_frame_mut(&mut self) -> Option<&mut StackFrame> {
        self.frames.last_mut()
    }

    /// Get all frames, outermost first
    pub fn frames(&self) -> &[StackFrame] {
        &self.frames
    }

    /// Get the depth of the call stack
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Check if stack is empty
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}
