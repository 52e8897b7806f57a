//! Execution engine for the Python interpreter
//!
//! [`Interpreter`] owns the heap, the call stack and the module namespace of
//! one run. A run executes the program inside three frames: the host's entry
//! frame ([`EntryFrame`]), an engine bootstrap frame and the user `<module>`
//! frame. Every frame the engine enters is announced to the optional
//! [`ExecutionHook`], and every statement is announced before it executes.
//!
//! Statement and expression evaluation live in sibling modules as further
//! `impl Interpreter` blocks.

use super::constants::{DEFAULT_MAX_CALL_DEPTH, MAIN_MODULE_NAME, USER_SUBMISSION_MARKER};
use super::errors::{
    Exception, ExceptionValue, Exec, Halt, RuntimeError, TraceEntry, Unwind, EXCEPTION_HIERARCHY,
};
use super::hooks::{ExecutionHook, FrameRef, HookAction, InputReply};
use super::io::{Console, Stdin};
use crate::memory::heap::{Class, Heap, HeapObject, Instance};
use crate::memory::scope::{new_scope, scope_entries, scope_get, Namespace, ScopeRef};
use crate::memory::stack::{FrameKind, Stack, StackFrame};
use crate::memory::value::{Builtin, BuiltinType, ObjectId, Value};
use crate::parser::ast::Program;
use indexmap::IndexMap;
use rustc_hash::FxHashMap;
use std::rc::Rc;

const BOOTSTRAP_ORIGIN: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/", file!());

/// Frame of the host code that starts a run; outermost entry of every traceback
#[derive(Debug, Clone)]
pub struct EntryFrame {
    pub origin: Rc<str>,
    pub routine: String,
    pub line: usize,
}

impl Default for EntryFrame {
    fn default() -> Self {
        EntryFrame {
            origin: Rc::from(BOOTSTRAP_ORIGIN),
            routine: "run_program".to_string(),
            line: line!() as usize,
        }
    }
}

/// The main interpreter that executes a Python program
pub struct Interpreter<'h> {
    pub(crate) heap: Heap,
    pub(crate) stack: Stack,
    /// Namespace of the `__main__` module
    pub(crate) globals: ScopeRef,
    pub(crate) console: Console,
    hook: Option<&'h mut dyn ExecutionHook>,
    /// Builtin exception classes by name
    exception_classes: IndexMap<&'static str, ObjectId>,
    /// Imported modules, created on first import
    pub(crate) modules: FxHashMap<String, Value>,
    source_lines: Vec<String>,
    entry: EntryFrame,
    user_origin: Rc<str>,
    pub(crate) max_call_depth: usize,
    pub(crate) call_depth: usize,
    /// Set once the hook stops the run; nothing executes afterwards
    halted: bool,
    /// Exceptions currently being handled, innermost last (for bare `raise`)
    pub(crate) handling: Vec<Exception>,
}

impl<'h> Interpreter<'h> {
    /// Create an interpreter writing to and reading from `console`
    pub fn new(console: Console) -> Self {
        let mut heap = Heap::new();
        let mut exception_classes: IndexMap<&'static str, ObjectId> = IndexMap::new();
        for (name, base) in EXCEPTION_HIERARCHY {
            let bases = base
                .and_then(|b| exception_classes.get(b))
                .map(|id| vec![Value::Ref(*id)])
                .unwrap_or_default();
            let id = heap.allocate(HeapObject::Class(Class {
                name: name.to_string(),
                bases,
                attrs: Namespace::default(),
                builtin: true,
            }));
            exception_classes.insert(*name, id);
        }

        let globals = new_scope();
        globals
            .borrow_mut()
            .insert("__name__".to_string(), Value::str(MAIN_MODULE_NAME));

        Interpreter {
            heap,
            stack: Stack::new(),
            globals,
            console,
            hook: None,
            exception_classes,
            modules: FxHashMap::default(),
            source_lines: Vec::new(),
            entry: EntryFrame::default(),
            user_origin: Rc::from(USER_SUBMISSION_MARKER),
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
            call_depth: 0,
            halted: false,
            handling: Vec::new(),
        }
    }

    /// Attach an observer notified of every line, call and return
    pub fn with_hook(mut self, hook: &'h mut dyn ExecutionHook) -> Self {
        self.hook = Some(hook);
        self
    }

    /// Frame reported as the host's caller of the program
    pub fn with_entry_frame(mut self, entry: EntryFrame) -> Self {
        self.entry = entry;
        self
    }

    pub fn with_max_call_depth(mut self, depth: usize) -> Self {
        self.max_call_depth = depth;
        self
    }

    /// Execute a parsed program. `source` supplies the lines quoted in tracebacks.
    pub fn run(&mut self, program: &Program, source: &str) -> Result<(), Unwind> {
        self.source_lines = source.lines().map(str::to_string).collect();
        self.halted = false;

        let mut host = StackFrame::native(
            self.entry.routine.clone(),
            self.entry.origin.clone(),
            self.globals.clone(),
        );
        host.line = self.entry.line;
        let mut bootstrap = StackFrame::native("exec", Rc::from(BOOTSTRAP_ORIGIN), self.globals.clone());
        bootstrap.line = line!() as usize;
        self.stack.push_frame(host);
        self.stack.push_frame(bootstrap);

        let module = StackFrame::module(self.user_origin.clone(), self.globals.clone());
        let result = self.run_frame(module, |this| {
            this.exec_block(&program.body)?;
            Ok(Value::None)
        });

        let result = match result {
            Err(Unwind::Error(mut exception)) => {
                for frame in self.stack.frames().iter().rev() {
                    exception.traceback.push(TraceEntry {
                        origin: frame.origin.clone(),
                        line: frame.line,
                        routine: frame.function_name.clone(),
                    });
                }
                Err(Unwind::Error(exception))
            }
            Err(halt) => Err(halt),
            Ok(_) => Ok(()),
        };
        self.stack.pop_frame();
        self.stack.pop_frame();
        result
    }

    pub fn heap(&self) -> &Heap {
        &self.heap
    }

    pub fn console(&self) -> &Console {
        &self.console
    }

    /// Bindings of the `__main__` namespace in definition order
    pub fn globals(&self) -> Vec<(String, Value)> {
        scope_entries(&self.globals)
    }

    /// Text of a source line (1-based)
    pub fn source_line(&self, line: usize) -> Option<&str> {
        line.checked_sub(1)
            .and_then(|i| self.source_lines.get(i))
            .map(String::as_str)
    }

    pub(crate) fn user_origin(&self) -> Rc<str> {
        self.user_origin.clone()
    }

    pub(crate) fn frame(&self) -> Result<&StackFrame, RuntimeError> {
        self.stack
            .current_frame()
            .ok_or_else(|| RuntimeError::Internal("empty call stack".to_string()))
    }

    pub(crate) fn frame_mut(&mut self) -> Result<&mut StackFrame, RuntimeError> {
        self.stack
            .current_frame_mut()
            .ok_or_else(|| RuntimeError::Internal("empty call stack".to_string()))
    }

    pub(crate) fn alloc(&mut self, object: HeapObject) -> Value {
        Value::Ref(self.heap.allocate(object))
    }

    pub(crate) fn object(&self, id: ObjectId) -> Result<&HeapObject, RuntimeError> {
        self.heap.get(id).ok_or_else(|| RuntimeError::missing_object(id))
    }

    pub(crate) fn object_mut(&mut self, id: ObjectId) -> Result<&mut HeapObject, RuntimeError> {
        self.heap
            .get_mut(id)
            .ok_or_else(|| RuntimeError::missing_object(id))
    }

    pub(crate) fn type_name(&self, value: &Value) -> String {
        self.heap.type_name(value)
    }

    // ---- frames and hook notifications ----

    /// Frame for engine code that calls back into user code
    pub(crate) fn native_frame(&self, routine: &str, origin: &'static str, line: u32) -> StackFrame {
        let mut frame = StackFrame::native(routine, Rc::from(origin), self.globals.clone());
        frame.line = line as usize;
        frame
    }

    /// Push `frame`, announce it, run `body` in it, announce its exit and pop it.
    /// Exceptions leaving the frame gain a traceback entry for it.
    pub(crate) fn run_frame(
        &mut self,
        frame: StackFrame,
        body: impl FnOnce(&mut Self) -> Exec<Value>,
    ) -> Exec<Value> {
        self.stack.push_frame(frame);
        let result = self.notify_call().and_then(|()| body(self));
        let result = match result {
            Ok(value) => self.notify_return(&value).map(|()| value),
            Err(Unwind::Error(mut exception)) => {
                if let Some(frame) = self.stack.current_frame() {
                    exception.traceback.push(TraceEntry {
                        origin: frame.origin.clone(),
                        line: frame.line,
                        routine: frame.function_name.clone(),
                    });
                }
                self.notify_return(&Value::None)
                    .and(Err(Unwind::Error(exception)))
            }
            Err(halt) => Err(halt),
        };
        self.stack.pop_frame();
        result
    }

    fn apply(&mut self, action: HookAction) -> Exec<()> {
        match action {
            HookAction::Continue => Ok(()),
            HookAction::Stop => {
                self.halted = true;
                Err(Halt::Stopped.into())
            }
        }
    }

    /// Record the line about to execute and announce it
    pub(crate) fn notify_line(&mut self, line: usize) -> Exec<()> {
        if self.halted {
            return Err(Halt::Stopped.into());
        }
        if let Some(frame) = self.stack.current_frame_mut() {
            frame.line = line;
        }
        let Some(hook) = self.hook.as_deref_mut() else {
            return Ok(());
        };
        let Some(frame) = FrameRef::top(self.stack.frames(), &self.heap) else {
            return Ok(());
        };
        let action = hook.on_line(frame);
        self.apply(action)
    }

    fn notify_call(&mut self) -> Exec<()> {
        if self.halted {
            return Err(Halt::Stopped.into());
        }
        let Some(hook) = self.hook.as_deref_mut() else {
            return Ok(());
        };
        let Some(frame) = FrameRef::top(self.stack.frames(), &self.heap) else {
            return Ok(());
        };
        let action = hook.on_call(frame);
        self.apply(action)
    }

    fn notify_return(&mut self, value: &Value) -> Exec<()> {
        if self.halted {
            return Err(Halt::Stopped.into());
        }
        let Some(hook) = self.hook.as_deref_mut() else {
            return Ok(());
        };
        let Some(frame) = FrameRef::top(self.stack.frames(), &self.heap) else {
            return Ok(());
        };
        let action = hook.on_return(frame, value);
        self.apply(action)
    }

    /// Read one console line for `input()`
    pub(crate) fn read_line(&mut self, prompt: &str) -> Exec<String> {
        let eof = || RuntimeError::EOFError("EOF when reading a line".to_string());
        match self.console.stdin() {
            Stdin::Host => {
                self.console.write(prompt);
                Ok(self.console.read_host_line().ok_or_else(eof)?)
            }
            Stdin::Scripted(_) => {
                let line = self.console.next_scripted().ok_or_else(eof)?;
                self.console.write(&format!("{}{}\n", prompt, line));
                Ok(line)
            }
            Stdin::Intercepted { origin, routine } => {
                let mut frame = StackFrame::native(routine, origin, self.globals.clone());
                frame.line = 1;
                let prompt = prompt.to_string();
                let value = self.run_frame(frame, |this| this.ask_hook(&prompt))?;
                Ok(value.as_str().unwrap_or_default().to_string())
            }
        }
    }

    fn ask_hook(&mut self, prompt: &str) -> Exec<Value> {
        let Some(hook) = self.hook.as_deref_mut() else {
            return Err(RuntimeError::EOFError("EOF when reading a line".to_string()).into());
        };
        let Some(frame) = FrameRef::top(self.stack.frames(), &self.heap) else {
            return Err(RuntimeError::Internal("empty call stack".to_string()).into());
        };
        match hook.read_input(prompt, frame) {
            InputReply::Line(line) => Ok(Value::str(&line)),
            InputReply::Suspend => {
                self.halted = true;
                Err(Halt::InputRequested {
                    prompt: prompt.to_string(),
                }
                .into())
            }
        }
    }

    // ---- names ----

    pub(crate) fn builtin_name(&self, name: &str) -> Option<Value> {
        Builtin::lookup(name)
            .map(Value::Builtin)
            .or_else(|| BuiltinType::lookup(name).map(Value::Type))
            .or_else(|| self.exception_classes.get(name).map(|id| Value::Ref(*id)))
    }

    fn global_or_builtin(&self, name: &str) -> Exec<Value> {
        let frame = self.frame()?;
        scope_get(&frame.globals, name)
            .or_else(|| self.builtin_name(name))
            .ok_or_else(|| RuntimeError::NameError(format!("name '{}' is not defined", name)).into())
    }

    /// Resolve a name: comprehension variables, locals, enclosing functions, globals, builtins
    pub(crate) fn load_name(&self, name: &str) -> Exec<Value> {
        let frame = self.frame()?;
        if let Some(value) = frame.comprehension_var(name) {
            return Ok(value);
        }
        match frame.kind {
            FrameKind::Function if frame.is_declared_global(name) => {}
            FrameKind::Function if frame.is_local_name(name) && !frame.is_declared_nonlocal(name) => {
                return scope_get(&frame.locals, name).ok_or_else(|| {
                    RuntimeError::UnboundLocalError(format!(
                        "cannot access local variable '{}' where it is not associated with a value",
                        name
                    ))
                    .into()
                });
            }
            FrameKind::Function | FrameKind::Class => {
                if frame.kind == FrameKind::Class {
                    if let Some(value) = scope_get(&frame.locals, name) {
                        return Ok(value);
                    }
                }
                if let Some(value) = frame.closure.iter().find_map(|scope| scope_get(scope, name)) {
                    return Ok(value);
                }
                if frame.is_declared_nonlocal(name) {
                    return Err(RuntimeError::NameError(format!(
                        "cannot access free variable '{}' where it is not associated with a value in enclosing scope",
                        name
                    ))
                    .into());
                }
            }
            FrameKind::Module | FrameKind::Native => {}
        }
        self.global_or_builtin(name)
    }

    /// Scope an assignment to `name` binds in for the current frame
    fn binding_scope(&self, name: &str) -> Exec<ScopeRef> {
        let frame = self.frame()?;
        if frame.kind != FrameKind::Function {
            return Ok(frame.locals.clone());
        }
        if frame.is_declared_global(name) {
            return Ok(frame.globals.clone());
        }
        if frame.is_declared_nonlocal(name) {
            return frame
                .closure
                .iter()
                .find(|scope| scope.borrow().contains_key(name))
                .or_else(|| frame.closure.first())
                .cloned()
                .ok_or_else(|| {
                    RuntimeError::SyntaxError(format!("no binding for nonlocal '{}' found", name)).into()
                });
        }
        Ok(frame.locals.clone())
    }

    pub(crate) fn store_name(&mut self, name: &str, value: Value) -> Exec<()> {
        let scope = self.binding_scope(name)?;
        scope.borrow_mut().insert(name.to_string(), value);
        Ok(())
    }

    pub(crate) fn delete_name(&mut self, name: &str) -> Exec<()> {
        let scope = self.binding_scope(name)?;
        let removed = scope.borrow_mut().shift_remove(name);
        match removed {
            Some(_) => Ok(()),
            None => Err(RuntimeError::NameError(format!("name '{}' is not defined", name)).into()),
        }
    }

    /// Enclosing function scopes a function created in the current frame captures
    pub(crate) fn capture_closure(&self) -> Exec<Rc<[ScopeRef]>> {
        let frame = self.frame()?;
        Ok(match frame.kind {
            FrameKind::Function => std::iter::once(frame.locals.clone())
                .chain(frame.closure.iter().cloned())
                .collect(),
            FrameKind::Class => frame.closure.clone(),
            FrameKind::Module | FrameKind::Native => Rc::from(Vec::new()),
        })
    }

    // ---- exceptions ----

    pub(crate) fn exception_class(&self, name: &str) -> Result<ObjectId, RuntimeError> {
        self.exception_classes
            .get(name)
            .copied()
            .ok_or_else(|| RuntimeError::Internal(format!("missing exception class {}", name)))
    }

    /// Whether `class` derives from `BaseException`
    pub(crate) fn is_exception_class(&self, class: ObjectId) -> bool {
        self.exception_classes
            .get("BaseException")
            .is_some_and(|base| self.heap.is_subclass(class, *base))
    }

    pub(crate) fn exception_class_of(&self, exception: &Exception) -> Result<ObjectId, RuntimeError> {
        match &exception.value {
            ExceptionValue::Builtin(err) => self.exception_class(err.class_name()),
            ExceptionValue::Object(id) => match self.object(*id)? {
                HeapObject::Instance(instance) => Ok(instance.class),
                _ => Err(RuntimeError::Internal("exception is not an instance".to_string())),
            },
        }
    }

    /// Heap instance for the exception, created on first use
    pub(crate) fn materialize_exception(&mut self, exception: &mut Exception) -> Result<Value, RuntimeError> {
        let err = match &exception.value {
            ExceptionValue::Object(id) => return Ok(Value::Ref(*id)),
            ExceptionValue::Builtin(err) => err.clone(),
        };
        let class = self.exception_class(err.class_name())?;
        let args = if err.message().is_empty() {
            Vec::new()
        } else {
            vec![Value::str(err.message())]
        };
        let id = self.heap.allocate(HeapObject::Instance(Instance {
            class,
            fields: Namespace::default(),
            args: Some(args),
        }));
        exception.value = ExceptionValue::Object(id);
        Ok(Value::Ref(id))
    }

    /// `except <handler>:` test; `handler` is a class or a tuple of classes
    pub(crate) fn exception_matches(&self, exception: &Exception, handler: &Value) -> Exec<bool> {
        let class = self.exception_class_of(exception)?;
        let candidates: Vec<Value> = match self.heap.deref(handler) {
            Some(HeapObject::Tuple(items)) => items.clone(),
            _ => vec![handler.clone()],
        };
        for candidate in candidates {
            match candidate {
                Value::Ref(id) if matches!(self.heap.get(id), Some(HeapObject::Class(_))) => {
                    if self.heap.is_subclass(class, id) {
                        return Ok(true);
                    }
                }
                _ => {
                    return Err(RuntimeError::type_error(
                        "catching classes that do not inherit from BaseException is not allowed",
                    )
                    .into())
                }
            }
        }
        Ok(false)
    }

    /// Exception to raise for `raise value`
    pub(crate) fn exception_from_value(&mut self, value: Value) -> Exec<Exception> {
        let id = match &value {
            Value::Ref(id) => *id,
            _ => return Err(RuntimeError::type_error("exceptions must derive from BaseException").into()),
        };
        match self.object(id)? {
            HeapObject::Class(_) if self.is_exception_class(id) => {
                let instance = self.instantiate(id, Default::default())?;
                let instance_id = instance
                    .as_ref_id()
                    .ok_or_else(|| RuntimeError::Internal("exception constructor returned a scalar".into()))?;
                Ok(Exception::new(ExceptionValue::Object(instance_id)))
            }
            HeapObject::Instance(instance) if self.is_exception_class(instance.class) => {
                Ok(Exception::new(ExceptionValue::Object(id)))
            }
            _ => Err(RuntimeError::type_error("exceptions must derive from BaseException").into()),
        }
    }

    /// `str()` of an exception instance: its user `__str__`, or its arguments
    pub(crate) fn exception_str(&mut self, id: ObjectId) -> Exec<String> {
        let (class, args) = match self.object(id)? {
            HeapObject::Instance(instance) => (instance.class, instance.args.clone().unwrap_or_default()),
            _ => return Ok(String::new()),
        };
        if let Some((owner, _)) = self.heap.class_lookup(class, "__str__") {
            if !matches!(self.heap.get(owner), Some(HeapObject::Class(c)) if c.builtin) {
                let text = self.call_method(Value::Ref(id), "__str__", Vec::new())?;
                return self.to_str(&text);
            }
        }
        match args.as_slice() {
            [] => Ok(String::new()),
            [single] => self.to_str(single),
            _ => {
                let tuple = self.alloc(HeapObject::Tuple(args));
                self.repr(&tuple)
            }
        }
    }

    /// Final line of a traceback, e.g. `ZeroDivisionError: division by zero`
    pub fn exception_summary(&mut self, exception: &Exception) -> String {
        match &exception.value {
            ExceptionValue::Builtin(err) => err.to_string(),
            ExceptionValue::Object(id) => {
                let id = *id;
                let name = match self.heap.get(id) {
                    Some(HeapObject::Instance(instance)) => self.heap.class_name(instance.class),
                    _ => "Exception".to_string(),
                };
                match self.exception_str(id) {
                    Ok(text) if !text.is_empty() => format!("{}: {}", name, text),
                    _ => name,
                }
            }
        }
    }

    /// Python-style traceback text, outermost frame first
    pub fn format_exception(&mut self, exception: &Exception) -> String {
        let mut out = String::from("Traceback (most recent call last):\n");
        for entry in exception.traceback.iter().rev() {
            out.push_str(&format!(
                "  File \"{}\", line {}, in {}\n",
                entry.origin, entry.line, entry.routine
            ));
            if entry.origin.as_ref() == USER_SUBMISSION_MARKER {
                if let Some(text) = self.source_line(entry.line).map(str::trim) {
                    if !text.is_empty() {
                        out.push_str(&format!("    {}\n", text));
                    }
                }
            }
        }
        out.push_str(&self.exception_summary(exception));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exception_classes_allocated_first() {
        let interpreter = Interpreter::new(Console::new());
        let base = interpreter.exception_class("BaseException").unwrap();
        let zero = interpreter.exception_class("ZeroDivisionError").unwrap();
        let arithmetic = interpreter.exception_class("ArithmeticError").unwrap();
        assert!(interpreter.heap.is_subclass(zero, arithmetic));
        assert!(interpreter.is_exception_class(zero));
        assert_eq!(base.address(), crate::interpreter::constants::HEAP_ADDRESS_START);
    }

    #[test]
    fn test_builtin_names() {
        let interpreter = Interpreter::new(Console::new());
        assert_eq!(interpreter.builtin_name("len"), Some(Value::Builtin(Builtin::Len)));
        assert_eq!(interpreter.builtin_name("list"), Some(Value::Type(BuiltinType::List)));
        assert!(interpreter.builtin_name("ValueError").is_some());
        assert_eq!(interpreter.builtin_name("nope"), None);
    }
}
