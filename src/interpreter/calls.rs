//! Calls: argument binding, user functions, classes and instances

use super::engine::Interpreter;
use super::errors::{Exec, Flow, RuntimeError};
use super::statements::analyze_function;
use crate::memory::heap::{Class, Function, HeapObject, Instance};
use crate::memory::scope::{Namespace, ScopeRef};
use crate::memory::stack::{FrameKind, StackFrame};
use crate::memory::value::{BuiltinType, ObjectId, Value};
use crate::parser::ast::{ClassDef, FunctionDef};
use std::cell::RefCell;
use std::rc::Rc;

/// Evaluated arguments of one call
#[derive(Debug, Clone, Default)]
pub(crate) struct CallArgs {
    pub positional: Vec<Value>,
    pub keywords: Vec<(String, Value)>,
}

impl CallArgs {
    pub fn positional(values: Vec<Value>) -> Self {
        CallArgs {
            positional: values,
            keywords: Vec::new(),
        }
    }

    pub fn push_keyword(&mut self, name: String, value: Value) -> Result<(), RuntimeError> {
        if self.keywords.iter().any(|(k, _)| *k == name) {
            return Err(RuntimeError::type_error(format!(
                "got multiple values for keyword argument '{}'",
                name
            )));
        }
        self.keywords.push((name, value));
        Ok(())
    }

    /// Remove and return a keyword argument
    pub fn take_keyword(&mut self, name: &str) -> Option<Value> {
        let index = self.keywords.iter().position(|(k, _)| k == name)?;
        Some(self.keywords.remove(index).1)
    }

    /// Fail if any keyword argument was not consumed
    pub fn no_keywords(&self, function: &str) -> Result<(), RuntimeError> {
        match self.keywords.first() {
            Some((name, _)) => Err(RuntimeError::type_error(format!(
                "{}() got an unexpected keyword argument '{}'",
                function, name
            ))),
            None => Ok(()),
        }
    }

    /// Check the positional count is within `min..=max`
    pub fn arity(&self, function: &str, min: usize, max: usize) -> Result<(), RuntimeError> {
        let given = self.positional.len();
        if given >= min && given <= max {
            return Ok(());
        }
        let message = if min == max {
            format!(
                "{}() takes exactly {} argument{} ({} given)",
                function,
                min,
                if min == 1 { "" } else { "s" },
                given
            )
        } else if given < min {
            format!(
                "{}() takes at least {} argument{} ({} given)",
                function,
                min,
                if min == 1 { "" } else { "s" },
                given
            )
        } else {
            format!(
                "{}() takes at most {} argument{} ({} given)",
                function,
                max,
                if max == 1 { "" } else { "s" },
                given
            )
        };
        Err(RuntimeError::type_error(message))
    }
}

fn plural(n: usize, word: &str) -> String {
    if n == 1 {
        format!("{} {}", n, word)
    } else {
        format!("{} {}s", n, word)
    }
}

/// `'a'`, `'a' and 'b'`, `'a', 'b', and 'c'`
fn quoted_list(names: &[&str]) -> String {
    let quoted: Vec<String> = names.iter().map(|n| format!("'{}'", n)).collect();
    match quoted.as_slice() {
        [] => String::new(),
        [one] => one.clone(),
        [a, b] => format!("{} and {}", a, b),
        [rest @ .., last] => format!("{}, and {}", rest.join(", "), last),
    }
}

impl Interpreter<'_> {
    /// Call any callable value
    pub(crate) fn call_value(&mut self, callee: Value, mut args: CallArgs) -> Exec<Value> {
        let id = match &callee {
            Value::Builtin(builtin) => return self.call_builtin(*builtin, args),
            Value::Type(ty) => return self.construct(*ty, args),
            Value::Ref(id) => *id,
            other => {
                return Err(RuntimeError::type_error(format!(
                    "'{}' object is not callable",
                    self.type_name(other)
                ))
                .into())
            }
        };
        match self.object(id)? {
            HeapObject::Function(_) => self.call_function(id, args),
            HeapObject::BoundMethod { receiver, function } => {
                let function = function.clone();
                args.positional.insert(0, receiver.clone());
                self.call_value(function, args)
            }
            HeapObject::NativeMethod { receiver, name } => {
                let (receiver, name) = (receiver.clone(), name.clone());
                self.call_native_method(receiver, &name, args)
            }
            HeapObject::Class(_) => self.instantiate(id, args),
            HeapObject::StaticMethod(inner) => {
                let inner = inner.clone();
                self.call_value(inner, args)
            }
            HeapObject::Instance(instance) if self.user_method(instance.class, "__call__").is_some() => {
                self.call_attribute(callee, "__call__", args)
            }
            _ => Err(RuntimeError::type_error(format!(
                "'{}' object is not callable",
                self.type_name(&callee)
            ))
            .into()),
        }
    }

    /// `receiver.name(args)` without materializing a bound method
    pub(crate) fn call_attribute(&mut self, receiver: Value, name: &str, mut args: CallArgs) -> Exec<Value> {
        if self.has_native_method(&receiver, name) {
            return self.call_native_method(receiver, name, args);
        }
        if let Some(HeapObject::Instance(instance)) = self.heap.deref(&receiver) {
            if !instance.fields.contains_key(name) {
                if let Some(function) = self.user_method(instance.class, name) {
                    args.positional.insert(0, receiver);
                    return self.call_function(function, args);
                }
            }
        }
        let callee = self.get_attribute(&receiver, name)?;
        self.call_value(callee, args)
    }

    /// Call a method with positional arguments only
    pub(crate) fn call_method(&mut self, receiver: Value, name: &str, args: Vec<Value>) -> Exec<Value> {
        self.call_attribute(receiver, name, CallArgs::positional(args))
    }

    /// User-defined function `name` found along the MRO of `class`
    pub(crate) fn user_method(&self, class: ObjectId, name: &str) -> Option<ObjectId> {
        let (owner, value) = self.heap.class_lookup(class, name)?;
        if matches!(self.heap.get(owner), Some(HeapObject::Class(c)) if c.builtin) {
            return None;
        }
        let id = value.as_ref_id()?;
        matches!(self.heap.get(id), Some(HeapObject::Function(_))).then_some(id)
    }

    /// User dunder method of an instance value
    pub(crate) fn instance_method(&self, value: &Value, name: &str) -> Option<ObjectId> {
        match self.heap.deref(value) {
            Some(HeapObject::Instance(instance)) => self.user_method(instance.class, name),
            _ => None,
        }
    }

    /// Call a user-defined function in a new frame
    pub(crate) fn call_function(&mut self, id: ObjectId, args: CallArgs) -> Exec<Value> {
        let function = match self.object(id)? {
            HeapObject::Function(function) => function.clone(),
            _ => return Err(RuntimeError::Internal("call target is not a function".into()).into()),
        };
        if self.call_depth >= self.max_call_depth {
            return Err(RuntimeError::RecursionError("maximum recursion depth exceeded".into()).into());
        }
        let locals = self.bind_arguments(&function, args)?;

        let mut frame = StackFrame::new(
            function.def.name.clone(),
            FrameKind::Function,
            self.user_origin(),
            function.globals.clone(),
        );
        frame.locals = locals;
        frame.closure = function.closure.clone();
        frame.params = Some(function.params.clone());
        frame.names = Some(function.names.clone());
        frame.function = Some(id);
        frame.defining_class = function.defining_class;
        frame.line = function.def.location.line;

        let def = function.def.clone();
        self.call_depth += 1;
        let result = self.run_frame(frame, |this| match this.exec_block(&def.body)? {
            Flow::Return(value) => Ok(value),
            _ => Ok(Value::None),
        });
        self.call_depth -= 1;
        result
    }

    /// Bind call arguments to parameters, producing the new frame's locals
    fn bind_arguments(&mut self, function: &Function, mut args: CallArgs) -> Exec<ScopeRef> {
        let params = &function.params;
        let name = &function.def.name;
        let mut bound: Vec<Option<Value>> = vec![None; params.positional.len()];
        let mut kwonly: Vec<Option<Value>> = vec![None; params.kwonly.len()];

        let given = args.positional.len();
        let mut extra = Vec::new();
        for (i, value) in args.positional.drain(..).enumerate() {
            match bound.get_mut(i) {
                Some(slot) => *slot = Some(value),
                None => extra.push(value),
            }
        }
        if !extra.is_empty() && params.varargs.is_none() {
            let max = params.positional.len();
            let min = function.defaults.iter().filter(|d| d.is_none()).count();
            let takes = if min == max {
                plural(max, "positional argument")
            } else {
                format!("from {} to {} positional arguments", min, max)
            };
            return Err(RuntimeError::type_error(format!(
                "{}() takes {} but {} {} given",
                name,
                takes,
                given,
                if given == 1 { "was" } else { "were" }
            ))
            .into());
        }

        let mut var_keywords = crate::memory::heap::DictMap::new();
        for (key, value) in args.keywords.drain(..) {
            if let Some(i) = params.positional.iter().position(|p| p.name == key) {
                if bound[i].is_some() {
                    return Err(RuntimeError::type_error(format!(
                        "{}() got multiple values for argument '{}'",
                        name, key
                    ))
                    .into());
                }
                bound[i] = Some(value);
            } else if let Some(i) = params.kwonly.iter().position(|p| p.name == key) {
                kwonly[i] = Some(value);
            } else if params.varkw.is_some() {
                let key = Value::str(&key);
                self.dict_insert(&mut var_keywords, key, value)?;
            } else {
                return Err(RuntimeError::type_error(format!(
                    "{}() got an unexpected keyword argument '{}'",
                    name, key
                ))
                .into());
            }
        }

        let mut missing = Vec::new();
        for (i, slot) in bound.iter_mut().enumerate() {
            if slot.is_none() {
                match function.defaults.get(i).cloned().flatten() {
                    Some(default) => *slot = Some(default),
                    None => missing.push(params.positional[i].name.as_str()),
                }
            }
        }
        if !missing.is_empty() {
            return Err(RuntimeError::type_error(format!(
                "{}() missing {}: {}",
                name,
                plural(missing.len(), "required positional argument"),
                quoted_list(&missing)
            ))
            .into());
        }
        for (i, slot) in kwonly.iter_mut().enumerate() {
            if slot.is_none() {
                match function.kw_defaults.get(i).cloned().flatten() {
                    Some(default) => *slot = Some(default),
                    None => missing.push(params.kwonly[i].name.as_str()),
                }
            }
        }
        if !missing.is_empty() {
            return Err(RuntimeError::type_error(format!(
                "{}() missing {}: {}",
                name,
                plural(missing.len(), "required keyword-only argument"),
                quoted_list(&missing)
            ))
            .into());
        }

        let mut locals = Namespace::new();
        for (param, value) in params.positional.iter().zip(bound) {
            locals.insert(param.name.clone(), value.unwrap_or_default());
        }
        if let Some(varargs) = &params.varargs {
            let tuple = self.alloc(HeapObject::Tuple(extra));
            locals.insert(varargs.clone(), tuple);
        }
        for (param, value) in params.kwonly.iter().zip(kwonly) {
            locals.insert(param.name.clone(), value.unwrap_or_default());
        }
        if let Some(varkw) = &params.varkw {
            let dict = self.alloc(HeapObject::Dict(var_keywords));
            locals.insert(varkw.clone(), dict);
        }
        Ok(Rc::new(RefCell::new(locals)))
    }

    /// Create a function object for a `def` or `lambda` in the current frame
    pub(crate) fn make_function(&mut self, def: &Rc<FunctionDef>) -> Exec<Value> {
        let mut defaults = Vec::with_capacity(def.params.positional.len());
        for param in &def.params.positional {
            defaults.push(match &param.default {
                Some(expr) => Some(self.eval(expr)?),
                None => None,
            });
        }
        let mut kw_defaults = Vec::with_capacity(def.params.kwonly.len());
        for param in &def.params.kwonly {
            kw_defaults.push(match &param.default {
                Some(expr) => Some(self.eval(expr)?),
                None => None,
            });
        }

        let frame = self.frame()?;
        let qualname = match frame.kind {
            FrameKind::Function => {
                let outer = match frame.function.and_then(|f| self.heap.get(f)) {
                    Some(HeapObject::Function(outer)) => outer.qualname.clone(),
                    _ => frame.function_name.clone(),
                };
                format!("{}.<locals>.{}", outer, def.name)
            }
            FrameKind::Class => format!("{}.{}", frame.function_name, def.name),
            FrameKind::Module | FrameKind::Native => def.name.clone(),
        };
        let globals = frame.globals.clone();
        let closure = self.capture_closure()?;

        let function = Function {
            def: def.clone(),
            qualname,
            params: Rc::new(def.params.clone()),
            defaults,
            kw_defaults,
            globals,
            closure,
            names: Rc::new(analyze_function(def)),
            defining_class: None,
        };
        Ok(self.alloc(HeapObject::Function(function)))
    }

    /// Execute a `class` statement
    pub(crate) fn define_class(&mut self, def: &ClassDef) -> Exec<()> {
        let decorators = self.eval_all(&def.decorators)?;
        let mut bases = Vec::new();
        for base in self.eval_all(&def.bases)? {
            match &base {
                Value::Type(BuiltinType::Object) => {}
                Value::Ref(id) if matches!(self.heap.get(*id), Some(HeapObject::Class(_))) => bases.push(base),
                Value::Type(ty) => {
                    return Err(RuntimeError::type_error(format!(
                        "inheriting from builtin type '{}' is not supported",
                        ty.name()
                    ))
                    .into())
                }
                other => {
                    return Err(RuntimeError::type_error(format!(
                        "bases must be types, not '{}'",
                        self.type_name(other)
                    ))
                    .into())
                }
            }
        }

        let namespace = crate::memory::scope::new_scope();
        let mut frame = StackFrame::new(
            def.name.clone(),
            FrameKind::Class,
            self.user_origin(),
            self.frame()?.globals.clone(),
        );
        frame.locals = namespace.clone();
        frame.closure = self.capture_closure()?;
        frame.line = def.location.line;
        self.run_frame(frame, |this| {
            this.exec_block(&def.body)?;
            Ok(Value::None)
        })?;

        let attrs = namespace.borrow().clone();
        let members: Vec<Value> = attrs.values().cloned().collect();
        let class = self.heap.allocate(HeapObject::Class(Class {
            name: def.name.clone(),
            bases,
            attrs,
            builtin: false,
        }));
        for member in members {
            let target = match self.heap.deref(&member) {
                Some(HeapObject::StaticMethod(inner) | HeapObject::ClassMethod(inner)) => inner.clone(),
                _ => member,
            };
            if let Some(HeapObject::Function(function)) = target.as_ref_id().and_then(|id| self.heap.get_mut(id)) {
                function.defining_class = Some(class);
            }
        }

        let mut value = Value::Ref(class);
        for decorator in decorators.into_iter().rev() {
            value = self.call_value(decorator, CallArgs::positional(vec![value]))?;
        }
        self.store_name(&def.name, value)
    }

    /// Create an instance of a user or exception class and run its `__init__`
    pub(crate) fn instantiate(&mut self, class: ObjectId, args: CallArgs) -> Exec<Value> {
        let is_exception = self.is_exception_class(class);
        let instance = self.alloc(HeapObject::Instance(Instance {
            class,
            fields: Namespace::default(),
            args: is_exception.then(|| args.positional.clone()),
        }));
        match self.user_method(class, "__init__") {
            Some(init) => {
                let mut args = args;
                args.positional.insert(0, instance.clone());
                let result = self.call_function(init, args)?;
                if !result.is_none() {
                    return Err(RuntimeError::type_error(format!(
                        "__init__() should return None, not '{}'",
                        self.type_name(&result)
                    ))
                    .into());
                }
            }
            None if is_exception => args.no_keywords(&self.heap.class_name(class))?,
            None => {
                if !args.positional.is_empty() || !args.keywords.is_empty() {
                    return Err(RuntimeError::type_error(format!(
                        "{}() takes no arguments",
                        self.heap.class_name(class)
                    ))
                    .into());
                }
            }
        }
        Ok(instance)
    }

    /// Zero-argument `super()` inside a method, or `super(Class, obj)`
    pub(crate) fn make_super(&mut self, args: CallArgs) -> Exec<Value> {
        let (class, receiver) = match args.positional.as_slice() {
            [class, receiver] => match class {
                Value::Ref(id) if matches!(self.heap.get(*id), Some(HeapObject::Class(_))) => (*id, receiver.clone()),
                _ => return Err(RuntimeError::type_error("super() argument 1 must be a type").into()),
            },
            [] => {
                let frame = self.frame()?;
                let class = frame
                    .defining_class
                    .ok_or_else(|| RuntimeError::Runtime("super(): no arguments".into()))?;
                let first = frame
                    .params
                    .as_ref()
                    .and_then(|p| p.positional.first())
                    .map(|p| p.name.clone())
                    .ok_or_else(|| RuntimeError::Runtime("super(): no arguments".into()))?;
                let receiver = crate::memory::scope::scope_get(&frame.locals, &first)
                    .ok_or_else(|| RuntimeError::Runtime("super(): arg[0] deleted".into()))?;
                (class, receiver)
            }
            _ => return Err(RuntimeError::type_error("super() takes 0 or 2 arguments").into()),
        };
        Ok(self.alloc(HeapObject::Super { class, receiver }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quoted_list() {
        assert_eq!(quoted_list(&["a"]), "'a'");
        assert_eq!(quoted_list(&["a", "b"]), "'a' and 'b'");
        assert_eq!(quoted_list(&["a", "b", "c"]), "'a', 'b', and 'c'");
    }

    #[test]
    fn test_arity_messages() {
        let args = CallArgs::positional(vec![Value::Int(1), Value::Int(2)]);
        assert!(args.arity("len", 1, 1).is_err());
        assert!(args.arity("pow", 2, 3).is_ok());
        let err = args.arity("abs", 1, 1).unwrap_err();
        assert_eq!(err.to_string(), "TypeError: abs() takes exactly 1 argument (2 given)");
    }
}
